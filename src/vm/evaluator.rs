//! The evaluator: a cooperative, single-threaded VM loop
//!
//! The evaluator owns the frame stack and drives exactly one production at a time. Each
//! step of the active production yields an instruction, which is interpreted here:
//!
//! - `eat`, `eatMatch`, `match`, `guard`, `holdFor`, `holdForMatch` classify their matcher
//!   (raw text, gap, null, array slot, or a node/cover type resolved through the language
//!   scope) and either recognize it in place or push a new frame for its production
//! - `fail` aborts the active rule
//! - `write`, `openSpan`, `closeSpan`, `bindAttribute` pass through to the source/tree
//!
//! When a production returns, its frame completes: emptiness is checked against the
//! grammar, closing tags are emitted for nodes and for the fragment, the frame's branch is
//! accepted or rejected according to its effects, and the result is threaded back to the
//! parent as a [`MatchRange`] or null. Failures with `abort` effects cascade to the parent
//! until some frame's effects absorb them.
//!
//! ## Tail calls
//!
//! A production may return one final instruction. When that instruction has `eat` effects
//! and the returning frame is transparent (a cover or a plain production), the new frame
//! overwrites the returning frame's slot instead of nesting under it. Otherwise the
//! returning frame waits, and completes as soon as its child hands back a value.
//!
//! ## Holds
//!
//! A hold is only legal as a returned instruction. It emits a `Shift` tag, after which the
//! next opened node adopts the most recently closed node as its first child and takes over
//! that node's slot, so no reference precedes it.

use super::error::{VmError, VmResult};
use super::frame::{CaptureRange, Frame, FrameStack, FRAGMENT_TYPE};
use super::instruction::{Effects, Instruction, MatchOptions, OnFailure, OnSuccess, Verb};
use super::language::{Language, Resolver};
use super::matcher::{merge_references, Matcher, NodeMatcher, OpenMatcher, SourcePattern};
use super::production::{Production, RuleProps, Step, StepContext};
use super::source::{MatchRange, SourcePosition, SourceTree};
use super::tag::{Attributes, NodeFlags, Reference, Tag};
use std::sync::Arc;
use tagvm_config::EngineConfig;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorOptions {
    pub max_frame_depth: usize,
    /// Whether interpolation points in the input may be matched at all.
    pub allow_gaps: bool,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            max_frame_depth: 4096,
            allow_gaps: true,
        }
    }
}

impl From<&EngineConfig> for EvaluatorOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_frame_depth: config.max_frame_depth,
            allow_gaps: config.allow_gaps,
        }
    }
}

/// Runs a root matcher of a language against a [`SourceTree`].
#[derive(Debug, Clone)]
pub struct Evaluator {
    resolver: Resolver,
    options: EvaluatorOptions,
}

impl Evaluator {
    pub fn new(language: Arc<Language>) -> Self {
        Self {
            resolver: Resolver::new(language),
            options: EvaluatorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EvaluatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn options(&self) -> EvaluatorOptions {
        self.options
    }

    /// Parse the whole source with `root`, returning the range of the finished fragment.
    pub fn run<S: SourceTree>(
        &self,
        source: &mut S,
        root: Matcher,
        props: Option<serde_json::Value>,
    ) -> VmResult<MatchRange> {
        if let Some(ref_matcher) = &root.ref_matcher {
            return Err(VmError::InvalidRootReference {
                name: ref_matcher.name.clone(),
            });
        }

        let mut run = Run {
            resolver: &self.resolver,
            source,
            stack: FrameStack::new(self.options.max_frame_depth),
            root,
            gaps_allowed: self.options.allow_gaps,
            failure: None,
        };
        run.start(props)?;
        run.drive()
    }
}

/// The root frame's production: match the root matcher once.
struct FragmentProduction {
    instruction: Option<Instruction>,
}

impl Production for FragmentProduction {
    fn step(&mut self, _cx: &StepContext, _input: Option<MatchRange>) -> Step {
        match self.instruction.take() {
            Some(instruction) => Step::Yield(instruction),
            None => Step::Return(None),
        }
    }
}

/// What the loop does next.
enum Flow {
    /// Step the top frame's production with a value.
    Resume(Option<MatchRange>),
    /// The top frame's production is finished (or aborted).
    Complete { failed: bool },
}

enum Completion {
    /// The fragment finished and the whole input was consumed.
    Done(MatchRange),
    Continue(Flow),
}

/// Result of interpreting one matching instruction.
enum Outcome {
    Matched(Option<MatchRange>),
    Failed,
    /// Failed because a type that may not be empty matched nothing.
    Empty(String),
    Pushed,
}

struct Run<'r, S: SourceTree> {
    resolver: &'r Resolver,
    source: &'r mut S,
    stack: FrameStack,
    root: Matcher,
    gaps_allowed: bool,
    /// Why the current failure cascade started, when it was an empty match.
    failure: Option<VmError>,
}

impl<'r, S: SourceTree> Run<'r, S> {
    fn start(&mut self, props: Option<serde_json::Value>) -> VmResult<()> {
        let language = Arc::clone(self.resolver.root());
        self.source.init(&language.canonical_url);

        let mut instruction = Instruction::eat(Matcher::gap());
        if let Some(props) = props {
            instruction = instruction.with_props(props);
        }

        let fragment = Frame {
            language_scope: vec![Arc::clone(&language)],
            language: Arc::clone(&language),
            node_type: FRAGMENT_TYPE.to_string(),
            is_node: false,
            is_cover: false,
            effects: Effects::EAT,
            production: Some(Box::new(FragmentProduction {
                instruction: Some(instruction),
            })),
            range: CaptureRange::default(),
            merged_reference: Reference::anonymous(),
            parent: None,
            depth: 0,
            branched: false,
            returning: false,
            allow_empty: true,
        };
        self.stack.push(fragment)?;
        self.source.start_frame(0, FRAGMENT_TYPE);

        self.source.advance(Tag::Doctype {
            language: language.canonical_url.clone(),
            attributes: Attributes::new(),
        });
        self.stack.start_capture(self.source.mark());
        self.source.advance(Tag::OpenFragment {
            flags: NodeFlags::default().with_gap(self.gaps_allowed),
        });
        debug!(language = %language.canonical_url, root = %self.root, "parse started");
        Ok(())
    }

    fn drive(&mut self) -> VmResult<MatchRange> {
        let mut flow = Flow::Resume(None);
        loop {
            flow = match flow {
                Flow::Resume(value) => match self.step_top(value)? {
                    Step::Yield(instruction) => self.dispatch(instruction, false)?,
                    Step::Return(Some(instruction)) => self.dispatch(instruction, true)?,
                    Step::Return(None) => Flow::Complete { failed: false },
                },
                Flow::Complete { failed } => match self.complete(failed)? {
                    Completion::Done(range) => return Ok(range),
                    Completion::Continue(next) => next,
                },
            };
        }
    }

    fn step_top(&mut self, value: Option<MatchRange>) -> VmResult<Step> {
        let state = self.source.state();
        let consumed = state.position.offset;
        let Some(frame) = self.stack.top_mut() else {
            return Err(VmError::ParseFailed { consumed });
        };
        let cx = StepContext { state };
        Ok(match frame.production.as_mut() {
            Some(production) => production.step(&cx, value),
            None => Step::Return(None),
        })
    }

    fn dispatch(&mut self, instruction: Instruction, tail: bool) -> VmResult<Flow> {
        trace!(instruction = %instruction, tail, depth = self.stack.len(), "dispatch");
        match instruction {
            Instruction::Match {
                verb,
                matcher,
                props,
                options,
            } => {
                let effects = Effects::for_verb(verb);
                match self.dispatch_match(verb, matcher, props, options, tail)? {
                    Outcome::Pushed => Ok(Flow::Resume(None)),
                    Outcome::Matched(value) => Ok(self.after_value(value, tail)),
                    outcome @ (Outcome::Failed | Outcome::Empty(_)) => {
                        self.failure = match outcome {
                            Outcome::Empty(node_type) => Some(VmError::EmptyMatch { node_type }),
                            _ => None,
                        };
                        match effects.failure {
                            OnFailure::Abort => Ok(Flow::Complete { failed: true }),
                            OnFailure::Null => Ok(self.after_value(None, tail)),
                        }
                    }
                }
            }
            Instruction::Fail => {
                self.failure = None;
                Ok(Flow::Complete { failed: true })
            }
            Instruction::Write { text, options } => {
                self.source.write(&text, options.as_ref());
                Ok(self.after_value(None, tail))
            }
            Instruction::OpenSpan(name) => {
                self.source.open_span(&name);
                Ok(self.after_value(None, tail))
            }
            Instruction::CloseSpan(name) => {
                self.source.close_span(&name);
                Ok(self.after_value(None, tail))
            }
            Instruction::BindAttribute { key, value } => {
                self.source.bind_attribute(&key, value);
                Ok(self.after_value(None, tail))
            }
        }
    }

    /// A returned instruction's value is the production's own result.
    fn after_value(&self, value: Option<MatchRange>, tail: bool) -> Flow {
        if tail {
            Flow::Complete { failed: false }
        } else {
            Flow::Resume(value)
        }
    }

    fn top(&self) -> VmResult<&Frame> {
        self.stack.top().ok_or(VmError::ParseFailed {
            consumed: self.source.state().position.offset,
        })
    }

    fn dispatch_match(
        &mut self,
        verb: Verb,
        matcher: Matcher,
        props: Option<serde_json::Value>,
        options: MatchOptions,
        tail: bool,
    ) -> VmResult<Outcome> {
        let effects = Effects::for_verb(verb);
        let top = self.top()?;

        if verb.is_hold() && !tail {
            return Err(VmError::InvalidHold {
                node_type: matcher.to_string(),
                reason: "hold instructions must be returned from productions".to_string(),
            });
        }

        let matcher = if top.is_fragment() && matcher.node_matcher == NodeMatcher::Gap {
            self.root.clone()
        } else {
            matcher
        };

        if verb.is_hold() && matcher.open().is_none() {
            return Err(VmError::InvalidHold {
                node_type: matcher.to_string(),
                reason: "hold needs a node matcher".to_string(),
            });
        }

        let own = self.own_reference(&matcher);

        match &matcher.node_matcher {
            NodeMatcher::Literal(_) | NodeMatcher::Pattern(_) => {
                let Some(pattern) = matcher.source_pattern() else {
                    return Ok(Outcome::Failed);
                };
                Ok(self.match_text(&pattern, effects, &own))
            }
            NodeMatcher::Gap => self.match_gap(effects, &own),
            NodeMatcher::Null => self.match_null(effects, &own),
            NodeMatcher::Array => self.match_array(effects, &own),
            NodeMatcher::Node(open) => {
                self.match_node(verb, effects, open, own, props, options, tail)
            }
        }
    }

    /// The matcher's own reference, with gap permission gated by the evaluator options.
    fn own_reference(&self, matcher: &Matcher) -> Reference {
        let mut reference = matcher.resolved_reference();
        reference.flags.has_gap = self.gaps_allowed && reference.flags.has_gap;
        reference
    }

    /// Merge `own` with the reference accumulated by the transparent frame on top.
    fn merged_reference(&self, own: &Reference) -> VmResult<Reference> {
        let top = self.top()?;
        if top.is_transparent() {
            merge_references(&top.merged_reference, own)
        } else {
            Ok(own.clone())
        }
    }

    /// Emit a slot reference, introducing array slots once per node. A node opened right
    /// after a `Shift` occupies the shifted node's slot and gets no reference.
    fn emit_reference(&mut self, reference: &Reference) {
        if matches!(self.source.last_tag(), Some(Tag::Shift { .. })) {
            return;
        }
        if reference.is_array && !self.source.has_reference(&reference.name) {
            self.introduce_array(reference);
        }
        self.source.advance(reference.to_tag());
    }

    fn introduce_array(&mut self, reference: &Reference) {
        let mut introducer = reference.clone();
        introducer.is_array = true;
        introducer.flags.expression = false;
        self.source.advance(introducer.to_tag());
        self.source.advance(Tag::ArrayInitializer);
    }

    fn view(
        &self,
        name: &str,
        tags: std::ops::Range<usize>,
        start: SourcePosition,
        end: SourcePosition,
    ) -> MatchRange {
        MatchRange {
            name: name.to_string(),
            tags,
            start,
            end,
            text: self.source.text_between(start, end),
        }
    }

    fn match_text(
        &mut self,
        pattern: &SourcePattern,
        effects: Effects,
        own: &Reference,
    ) -> Outcome {
        let Some(text) = self.source.match_source(pattern) else {
            return Outcome::Failed;
        };
        let start = self.source.mark();
        let end = SourcePosition::new(start.position.offset + text.len(), start.position.gaps);

        if effects.success == OnSuccess::Keep && !text.is_empty() {
            self.stack.start_capture(start);
            self.source.advance(Tag::literal(text));
        }

        let tags = start.tag..self.source.tag_count();
        Outcome::Matched(Some(self.view(&own.name, tags, start.position, end)))
    }

    fn match_gap(&mut self, effects: Effects, own: &Reference) -> VmResult<Outcome> {
        if !self.gaps_allowed || !self.source.state().at_gap {
            return Ok(Outcome::Failed);
        }
        let merged = self.merged_reference(own)?;
        let start = self.source.mark();
        let end = SourcePosition::new(start.position.offset, start.position.gaps + 1);

        if effects.success == OnSuccess::Keep {
            self.stack.start_capture(start);
            self.emit_reference(&merged);
            self.source.advance(Tag::Gap);
        }

        let tags = start.tag..self.source.tag_count();
        Ok(Outcome::Matched(Some(self.view(
            &merged.name,
            tags,
            start.position,
            end,
        ))))
    }

    fn match_null(&mut self, effects: Effects, own: &Reference) -> VmResult<Outcome> {
        let merged = self.merged_reference(own)?;
        if effects.success == OnSuccess::Keep && !self.source.has_reference(&merged.name) {
            self.stack.start_capture(self.source.mark());
            if merged.is_array {
                self.introduce_array(&merged);
            } else {
                self.emit_reference(&merged);
                self.source.advance(Tag::Null);
            }
        }
        Ok(Outcome::Matched(None))
    }

    fn match_array(&mut self, effects: Effects, own: &Reference) -> VmResult<Outcome> {
        let merged = self.merged_reference(own)?;
        if effects.success == OnSuccess::Keep && !self.source.has_reference(&merged.name) {
            self.stack.start_capture(self.source.mark());
            self.introduce_array(&merged);
        }
        Ok(Outcome::Matched(None))
    }

    #[allow(clippy::too_many_arguments)]
    fn match_node(
        &mut self,
        verb: Verb,
        effects: Effects,
        open: &OpenMatcher,
        own: Reference,
        props: Option<serde_json::Value>,
        options: MatchOptions,
        tail: bool,
    ) -> VmResult<Outcome> {
        let top = self.top()?;
        let language = self
            .resolver
            .resolve(&top.language_scope, open.language.as_deref())?;
        let grammar = &language.grammar;
        let node_type = open.node_type.as_str();
        let is_node = grammar.is_node(node_type) && !options.suppress_node;
        let is_cover = grammar.is_cover(node_type);
        let is_hold = verb.is_hold();
        let state = self.source.state();

        if open.flags.token && !is_node {
            return Err(VmError::TokenMustBeNode {
                node_type: node_type.to_string(),
            });
        }

        if is_hold {
            if !(is_node || is_cover) {
                return Err(VmError::InvalidHold {
                    node_type: node_type.to_string(),
                    reason: "hold target must be a node or cover type".to_string(),
                });
            }
            if !matches!(self.source.last_tag(), Some(Tag::CloseNode | Tag::Gap)) {
                return Err(VmError::InvalidHold {
                    node_type: node_type.to_string(),
                    reason: "there is no completed node to hold".to_string(),
                });
            }
        }

        let should_interpolate = state.at_gap
            && self.gaps_allowed
            && !open.flags.trivia
            && (is_node || is_cover)
            && own.flags.has_gap
            && !options.suppress_gap
            && !is_hold;

        let mut intrinsic = None;
        if let Some(pattern) = &open.intrinsic {
            if !should_interpolate {
                match self.source.match_source(pattern) {
                    Some(text) => intrinsic = Some(text),
                    None => return Ok(Outcome::Failed),
                }
            }
        }

        let merged = if is_hold {
            if top.is_transparent() {
                top.merged_reference.clone()
            } else {
                Reference::anonymous()
            }
        } else {
            self.merged_reference(&own)?
        };

        if should_interpolate {
            return self.match_gap(effects, &own);
        }

        if let (Some(text), true) = (&intrinsic, open.flags.token) {
            return Ok(self.match_token(effects, open, &language, merged, text.clone()));
        }

        let rule = language.production(node_type)?;
        let mut attributes = grammar.attributes_for(node_type);
        attributes.extend(open.attributes.clone());
        let unbound_attributes = grammar.unbound_attributes_for(node_type);
        for key in &unbound_attributes {
            attributes
                .entry(key.clone())
                .or_insert(serde_json::Value::Null);
        }

        let production = rule(RuleProps {
            value: props,
            state,
            language: Arc::clone(&language),
            node_type: node_type.to_string(),
            attributes: attributes.clone(),
            intrinsic,
            unbound_attributes,
        });

        let language_scope = if is_node {
            vec![Arc::clone(&language)]
        } else {
            let mut scope = top.language_scope.clone();
            let current = scope.last().map(|l| Arc::ptr_eq(l, &language)).unwrap_or(false);
            if !current {
                scope.push(Arc::clone(&language));
            }
            scope
        };

        let splice = tail && effects == Effects::EAT && top.is_transparent();

        let frame = Frame {
            language: Arc::clone(&language),
            language_scope,
            node_type: node_type.to_string(),
            is_node,
            is_cover,
            effects,
            production: Some(production),
            range: CaptureRange::default(),
            merged_reference: merged.clone(),
            parent: None,
            depth: 0,
            branched: false,
            returning: false,
            allow_empty: grammar.is_emptyable(node_type),
        };

        if splice {
            if let Some(mut replaced) = self.stack.splice(frame) {
                debug!(
                    from = %replaced.node_type,
                    to = node_type,
                    depth = replaced.depth,
                    "tail call spliced"
                );
                self.finalize(&mut replaced)?;
            }
        } else {
            if tail {
                if let Some(top) = self.stack.top_mut() {
                    top.returning = true;
                }
            }
            self.stack.push(frame)?;
            if effects.branches() {
                self.source.branch();
                if let Some(top) = self.stack.top_mut() {
                    top.branched = true;
                }
            }
        }

        let depth = self.stack.len() - 1;
        self.source.start_frame(depth, node_type);
        debug!(
            node_type,
            language = %language.canonical_url,
            depth,
            verb = %verb,
            reference = %merged,
            "frame pushed"
        );

        if is_hold {
            self.stack.start_capture(self.source.mark());
            self.source.advance(Tag::Shift {
                name: own.name.clone(),
            });
        }

        if is_node {
            self.stack.start_capture(self.source.mark());
            self.emit_reference(&merged);
            self.source.advance(Tag::OpenNode {
                flags: NodeFlags {
                    has_gap: self.gaps_allowed && !open.flags.token,
                    ..open.flags
                },
                language: language.canonical_url.clone(),
                node_type: node_type.to_string(),
                attributes,
            });
        }

        Ok(Outcome::Pushed)
    }

    /// Self-closing token: the intrinsic text is the node's only content.
    fn match_token(
        &mut self,
        effects: Effects,
        open: &OpenMatcher,
        language: &Language,
        merged: Reference,
        text: String,
    ) -> Outcome {
        let node_type = open.node_type.as_str();
        if text.is_empty() && !language.grammar.is_emptyable(node_type) {
            debug!(node_type, "empty token rejected");
            return Outcome::Empty(node_type.to_string());
        }

        let start = self.source.mark();
        let end = SourcePosition::new(start.position.offset + text.len(), start.position.gaps);

        if effects.success == OnSuccess::Keep {
            let mut attributes = language.grammar.attributes_for(node_type);
            attributes.extend(open.attributes.clone());

            self.stack.start_capture(start);
            self.emit_reference(&merged);
            self.source.advance(Tag::OpenNode {
                flags: open.flags,
                language: language.canonical_url.clone(),
                node_type: node_type.to_string(),
                attributes,
            });
            if !text.is_empty() {
                self.source.advance(Tag::literal(text));
            }
            self.source.advance(Tag::CloseNode);
        }

        let tags = start.tag..self.source.tag_count();
        Outcome::Matched(Some(self.view(&merged.name, tags, start.position, end)))
    }

    /// Force a production to unwind, running its cleanup in the zombie state.
    fn finalize(&mut self, frame: &mut Frame) -> VmResult<()> {
        let Some(production) = frame.production.as_mut() else {
            return Ok(());
        };
        for instruction in production.finalize() {
            match instruction {
                Instruction::Write { text, options } => {
                    self.source.write(&text, options.as_ref());
                }
                other => {
                    return Err(VmError::ZombieViolation {
                        node_type: frame.node_type.clone(),
                        verb: other.verb_name().to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Finish the top frame and decide how the loop continues.
    fn complete(&mut self, failed: bool) -> VmResult<Completion> {
        let position = self.source.state().position;
        let top = self.top()?;
        let empty = top.range.is_empty_at(position);
        let failing = failed || (empty && !top.allow_empty);
        let (is_node, is_fragment) = (top.is_node, top.is_fragment());

        if failing && !failed {
            let node_type = top.node_type.clone();
            debug!(node_type = %node_type, "empty match");
            self.failure = Some(VmError::EmptyMatch { node_type });
        }

        if !failing {
            if is_node {
                self.source.advance(Tag::CloseNode);
            }
            if is_fragment {
                self.source.advance(Tag::CloseFragment);
            }
            self.stack.end_capture(self.source.mark());
        }

        let Some(mut frame) = self.stack.pop() else {
            return Err(VmError::ParseFailed {
                consumed: position.offset,
            });
        };

        let value = match (failing, frame.range.start, frame.range.end) {
            (false, Some(start), Some(end)) => {
                let name = frame.merged_reference.name.as_str();
                Some(self.view(name, start.tag..end.tag, start.position, end.position))
            }
            _ => None,
        };

        self.finalize(&mut frame)?;

        if frame.branched {
            if failing || frame.effects.success == OnSuccess::Discard {
                self.source.reject();
            } else {
                self.source.accept();
            }
        } else if failing {
            self.source.throw();
        }
        if failing {
            frame.range.end = None;
        }
        self.source.end_frame(frame.depth);

        debug!(
            node_type = %frame.node_type,
            depth = frame.depth,
            failing,
            branched = frame.branched,
            "frame popped"
        );

        if frame.parent.is_none() {
            debug_assert!(self.stack.is_empty(), "frames left above the fragment");
            debug_assert_eq!(self.source.branch_depth(), 0, "unbalanced source branches");
            if failing {
                return Err(self.failure.take().unwrap_or(VmError::ParseFailed {
                    consumed: position.offset,
                }));
            }
            let state = self.source.state();
            if !state.done {
                return Err(VmError::IncompleteConsumption {
                    consumed: state.position.offset,
                    total: self.source.total_len(),
                });
            }
            return match value {
                Some(range) => Ok(Completion::Done(range)),
                None => Err(VmError::ParseFailed {
                    consumed: state.position.offset,
                }),
            };
        }

        if failing && frame.effects.failure == OnFailure::Abort {
            return Ok(Completion::Continue(Flow::Complete { failed: true }));
        }

        if self.top()?.returning {
            Ok(Completion::Continue(Flow::Complete { failed: false }))
        } else {
            Ok(Completion::Continue(Flow::Resume(value)))
        }
    }
}
