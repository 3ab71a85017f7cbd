//! The source/tree collaborator
//!
//! The evaluator never touches characters or tag storage directly. Everything it needs from
//! the outside world goes through [`SourceTree`]:
//!
//! - cursor state and text recognition (`state`, `match_source`, `text_between`)
//! - tag emission (`advance`), which also moves the cursor past literal text and gaps
//! - transactions (`branch`, `accept`, `reject`) for speculative matching
//! - frame notifications (`start_frame`, `end_frame`, `throw`)
//! - out-of-band side channels (`write`, `open_span`, `close_span`, `bind_attribute`)
//!
//! [`MemoryTree`] is the in-memory implementation used by [`crate::vm::parse`] and the tests.
//!
//! ## Positions
//!
//! Input is text interleaved with interpolation points (gaps). A [`SourcePosition`] counts
//! both: the byte offset into the text and the number of gaps already consumed. Positions
//! order lexicographically, so a consumed gap makes a match non-empty even though it adds no
//! text.

use super::matcher::SourcePattern;
use super::tag::{Attributes, Tag};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use tracing::trace;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourcePosition {
    pub offset: usize,
    pub gaps: usize,
}

impl SourcePosition {
    pub fn new(offset: usize, gaps: usize) -> Self {
        Self { offset, gaps }
    }
}

/// Snapshot of the cursor visible to productions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceState {
    pub position: SourcePosition,
    pub at_gap: bool,
    pub done: bool,
}

/// A point in both the tag stream and the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pub tag: usize,
    pub position: SourcePosition,
}

/// The transparent view of a completed match handed back to the calling production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRange {
    /// Slot name the match was stored under.
    pub name: String,
    /// Tag indices covered by the match. Stale once the match was discarded.
    pub tags: Range<usize>,
    pub start: SourcePosition,
    pub end: SourcePosition,
    pub text: String,
}

impl MatchRange {
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Text with interpolation points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Input {
    text: String,
    gaps: Vec<usize>,
}

/// Marker used by [`Input::from_template`].
pub const GAP_MARKER: &str = "${}";

impl Input {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            gaps: Vec::new(),
        }
    }

    /// Append text.
    pub fn text(mut self, text: &str) -> Self {
        self.text.push_str(text);
        self
    }

    /// Append an interpolation point.
    pub fn gap(mut self) -> Self {
        self.gaps.push(self.text.len());
        self
    }

    /// Read `${}` markers as interpolation points.
    pub fn from_template(template: &str) -> Self {
        let mut input = Input::default();
        let mut parts = template.split(GAP_MARKER).peekable();
        while let Some(part) = parts.next() {
            input = input.text(part);
            if parts.peek().is_some() {
                input = input.gap();
            }
        }
        input
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn gap_offsets(&self) -> &[usize] {
        &self.gaps
    }

    pub fn end(&self) -> SourcePosition {
        SourcePosition::new(self.text.len(), self.gaps.len())
    }
}

/// An out-of-band `write` recorded by the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Written {
    pub text: String,
    pub options: Option<serde_json::Value>,
}

pub trait SourceTree {
    fn init(&mut self, _language: &str) {}

    fn state(&self) -> SourceState;

    /// Number of tags emitted so far.
    fn tag_count(&self) -> usize;

    fn last_tag(&self) -> Option<&Tag>;

    /// Size of the input, used in diagnostics.
    fn total_len(&self) -> usize;

    fn mark(&self) -> Mark {
        Mark {
            tag: self.tag_count(),
            position: self.state().position,
        }
    }

    fn text_between(&self, start: SourcePosition, end: SourcePosition) -> String;

    /// Recognize `pattern` at the cursor without consuming anything.
    fn match_source(&self, pattern: &SourcePattern) -> Option<String>;

    /// Emit a tag. Literals and gaps move the cursor. Returns the tag's index.
    fn advance(&mut self, tag: Tag) -> usize;

    /// Whether the innermost open node already received a reference named `name`.
    fn has_reference(&self, name: &str) -> bool;

    fn start_frame(&mut self, _depth: usize, _node_type: &str) {}

    fn end_frame(&mut self, _depth: usize) {}

    fn branch(&mut self);

    fn accept(&mut self);

    fn reject(&mut self);

    /// A frame without its own branch failed.
    fn throw(&mut self) {}

    fn branch_depth(&self) -> usize;

    fn write(&mut self, text: &str, options: Option<&serde_json::Value>);

    fn open_span(&mut self, name: &str);

    fn close_span(&mut self, name: &str);

    /// Bind an attribute of the innermost open node.
    fn bind_attribute(&mut self, key: &str, value: serde_json::Value);
}

#[derive(Debug, Clone, PartialEq)]
struct OpenEntry {
    tag: usize,
    names: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct Snapshot {
    position: SourcePosition,
    tag_count: usize,
    open: Vec<OpenEntry>,
    writes: usize,
    spans: Vec<String>,
    bound: usize,
}

/// An in-memory [`SourceTree`] over an [`Input`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTree {
    input: Input,
    language: Option<String>,
    position: SourcePosition,
    tags: Vec<Tag>,
    open: Vec<OpenEntry>,
    writes: Vec<Written>,
    spans: Vec<String>,
    bound: Vec<(usize, String, serde_json::Value)>,
    branches: Vec<Snapshot>,
}

impl MemoryTree {
    pub fn new(input: Input) -> Self {
        Self {
            input,
            ..Self::default()
        }
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn writes(&self) -> &[Written] {
        &self.writes
    }

    /// Spans currently open, outermost first.
    pub fn open_spans(&self) -> &[String] {
        &self.spans
    }

    /// Attributes bound after their node was opened, keyed by the open tag's index.
    pub fn bound_attributes(&self) -> BTreeMap<usize, Attributes> {
        let mut bound: BTreeMap<usize, Attributes> = BTreeMap::new();
        for (tag, key, value) in &self.bound {
            bound
                .entry(*tag)
                .or_default()
                .insert(key.clone(), value.clone());
        }
        bound
    }

    pub fn into_tags(self) -> Vec<Tag> {
        self.tags
    }

    fn next_gap(&self) -> Option<usize> {
        self.input.gaps.get(self.position.gaps).copied()
    }

    /// Text between the cursor and the next unconsumed gap.
    fn visible(&self) -> &str {
        let end = self
            .next_gap()
            .unwrap_or(self.input.text.len())
            .max(self.position.offset);
        &self.input.text[self.position.offset..end]
    }
}

impl SourceTree for MemoryTree {
    fn init(&mut self, language: &str) {
        self.language = Some(language.to_string());
    }

    fn state(&self) -> SourceState {
        SourceState {
            position: self.position,
            at_gap: self.next_gap() == Some(self.position.offset),
            done: self.position == self.input.end(),
        }
    }

    fn tag_count(&self) -> usize {
        self.tags.len()
    }

    fn last_tag(&self) -> Option<&Tag> {
        self.tags.last()
    }

    fn total_len(&self) -> usize {
        self.input.text.len()
    }

    fn text_between(&self, start: SourcePosition, end: SourcePosition) -> String {
        self.input
            .text
            .get(start.offset..end.offset)
            .unwrap_or_default()
            .to_string()
    }

    fn match_source(&self, pattern: &SourcePattern) -> Option<String> {
        let visible = self.visible();
        let len = pattern.match_len(visible)?;
        Some(visible[..len].to_string())
    }

    fn advance(&mut self, tag: Tag) -> usize {
        match &tag {
            Tag::OpenNode { .. } | Tag::OpenFragment { .. } => self.open.push(OpenEntry {
                tag: self.tags.len(),
                names: BTreeSet::new(),
            }),
            Tag::CloseNode | Tag::CloseFragment => {
                self.open.pop();
            }
            Tag::Reference { name, .. } => {
                if let Some(entry) = self.open.last_mut() {
                    entry.names.insert(name.clone());
                }
            }
            Tag::Literal { text } => self.position.offset += text.len(),
            Tag::Gap => self.position.gaps += 1,
            Tag::Doctype { .. } | Tag::Null | Tag::Shift { .. } | Tag::ArrayInitializer => {}
        }
        trace!(index = self.tags.len(), tag = %tag, "advance");
        self.tags.push(tag);
        self.tags.len() - 1
    }

    fn has_reference(&self, name: &str) -> bool {
        self.open
            .last()
            .map(|entry| entry.names.contains(name))
            .unwrap_or(false)
    }

    fn branch(&mut self) {
        self.branches.push(Snapshot {
            position: self.position,
            tag_count: self.tags.len(),
            open: self.open.clone(),
            writes: self.writes.len(),
            spans: self.spans.clone(),
            bound: self.bound.len(),
        });
    }

    fn accept(&mut self) {
        self.branches.pop();
    }

    fn reject(&mut self) {
        if let Some(snapshot) = self.branches.pop() {
            self.position = snapshot.position;
            self.tags.truncate(snapshot.tag_count);
            self.open = snapshot.open;
            self.writes.truncate(snapshot.writes);
            self.spans = snapshot.spans;
            self.bound.truncate(snapshot.bound);
        }
    }

    fn branch_depth(&self) -> usize {
        self.branches.len()
    }

    fn write(&mut self, text: &str, options: Option<&serde_json::Value>) {
        self.writes.push(Written {
            text: text.to_string(),
            options: options.cloned(),
        });
    }

    fn open_span(&mut self, name: &str) {
        self.spans.push(name.to_string());
    }

    fn close_span(&mut self, name: &str) {
        if let Some(index) = self.spans.iter().rposition(|span| span == name) {
            self.spans.remove(index);
        }
    }

    fn bind_attribute(&mut self, key: &str, value: serde_json::Value) {
        if let Some(entry) = self.open.last() {
            self.bound.push((entry.tag, key.to_string(), value));
        }
    }
}
