//! The grammar VM
//!
//! # Architecture
//!
//! ```text
//! Language ──► Resolver ──► Evaluator ──► SourceTree ──► Vec<Tag> ──► tree / formats
//!                              │
//!                        FrameStack (one Production per frame)
//! ```
//!
//! - [`tag`]: the output vocabulary
//! - [`matcher`] and [`instruction`]: what productions ask for, and with which effects
//! - [`language`]: grammar tables, languages and the resolver over their dependency DAG
//! - [`production`]: rule factories and the step-function protocol
//! - [`source`]: the source/tree collaborator and its in-memory implementation
//! - [`frame`]: the match frame stack
//! - [`evaluator`]: the instruction loop
//! - [`tree`]: rebuilds a node tree from a finished tag stream
//! - [`formats`]: serializers for tag streams
//! - [`grammars`]: built-in languages
//!
//! Parsing is a pure function of (language, root matcher, input): [`parse`] runs the
//! evaluator over a [`MemoryTree`] and returns everything it recorded.

pub mod error;
pub mod evaluator;
pub mod formats;
pub mod frame;
pub mod grammars;
pub mod instruction;
pub mod language;
pub mod matcher;
pub mod production;
pub mod source;
pub mod tag;
pub mod testing;
pub mod tree;

pub use error::{VmError, VmResult};
pub use evaluator::{Evaluator, EvaluatorOptions};
pub use instruction::{Effects, Instruction, MatchOptions, Verb};
pub use language::{Grammar, Language, Resolver};
pub use matcher::{Matcher, SourcePattern};
pub use production::{rule, steps, Production, Rule, RuleProps, Script, Step, StepContext};
pub use source::{Input, MatchRange, MemoryTree, SourceTree, Written};
pub use tag::{Attributes, NodeFlags, Reference, Tag};

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info_span;

/// Everything a finished parse produced.
#[derive(Debug, Clone)]
pub struct Parse {
    pub tags: Vec<Tag>,
    /// The fragment's range: the whole input.
    pub range: MatchRange,
    pub writes: Vec<Written>,
    /// Attributes bound after their node opened, keyed by the `OpenNode` tag index.
    pub bound_attributes: BTreeMap<usize, Attributes>,
}

/// Parse `input` with `matcher` as the root of `language`, using default options.
pub fn parse(language: Arc<Language>, matcher: Matcher, input: Input) -> VmResult<Parse> {
    parse_with(&Evaluator::new(language), matcher, input)
}

pub fn parse_with(evaluator: &Evaluator, matcher: Matcher, input: Input) -> VmResult<Parse> {
    let span = info_span!("parse", language = %evaluator.resolver().root().canonical_url);
    let _guard = span.enter();

    let mut tree = MemoryTree::new(input);
    let range = evaluator.run(&mut tree, matcher, None)?;
    let writes = tree.writes().to_vec();
    let bound_attributes = tree.bound_attributes();
    Ok(Parse {
        tags: tree.into_tags(),
        range,
        writes,
        bound_attributes,
    })
}
