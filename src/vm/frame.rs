//! The match frame stack
//!
//! Frames live in an index-based arena with parent indices. The arena is strictly LIFO: the
//! active frame is always the top, and a tail call overwrites the top slot instead of
//! pushing a new one, so stack depth follows tree nesting rather than grammar call depth.
//!
//! ## Captured ranges
//!
//! A frame's range is left-skewed. The start is recorded lazily by [`FrameStack::start_capture`]
//! the first time anything is emitted on the frame's behalf, and that same mark is written
//! into every ancestor that has not recorded a start yet (a chain of transparent cover frames
//! wrapping one concrete node all start where the node's reference starts). The end is
//! recorded exactly once, when the frame completes successfully.

use super::error::{VmError, VmResult};
use super::instruction::Effects;
use super::language::Language;
use super::production::Production;
use super::source::{Mark, SourcePosition};
use super::tag::Reference;
use std::fmt;
use std::sync::Arc;

pub type FrameId = usize;

/// Type name of the root frame.
pub const FRAGMENT_TYPE: &str = "#fragment";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureRange {
    pub start: Option<Mark>,
    pub end: Option<Mark>,
}

impl CaptureRange {
    /// Whether the range would cover no input if it ended at `position`. A range with no
    /// start never consumed anything.
    pub fn is_empty_at(&self, position: SourcePosition) -> bool {
        self.start
            .map(|start| start.position == position)
            .unwrap_or(true)
    }
}

/// One in-progress rule invocation.
pub struct Frame {
    pub language: Arc<Language>,
    /// Languages relative lookups are anchored in, innermost last. Reset at concrete nodes.
    pub language_scope: Vec<Arc<Language>>,
    pub node_type: String,
    pub is_node: bool,
    pub is_cover: bool,
    pub effects: Effects,
    pub production: Option<Box<dyn Production>>,
    pub range: CaptureRange,
    /// The slot the frame's result lands in, accumulated across transparent frames.
    pub merged_reference: Reference,
    pub parent: Option<FrameId>,
    pub depth: usize,
    /// Whether the frame opened its own branch of the source.
    pub branched: bool,
    /// The production finished and the frame waits for its tail child's value.
    pub returning: bool,
    /// Whether every type in the slot accepts a zero-width match.
    pub allow_empty: bool,
}

impl Frame {
    pub fn is_fragment(&self) -> bool {
        self.depth == 0
    }

    /// Transparent frames forward references to the node they eventually produce.
    pub fn is_transparent(&self) -> bool {
        !self.is_node && !self.is_fragment()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("node_type", &self.node_type)
            .field("language", &self.language.canonical_url)
            .field("depth", &self.depth)
            .field("is_node", &self.is_node)
            .field("is_cover", &self.is_cover)
            .field("effects", &self.effects)
            .field("range", &self.range)
            .field("merged_reference", &self.merged_reference)
            .field("branched", &self.branched)
            .field("returning", &self.returning)
            .finish()
    }
}

#[derive(Debug)]
pub struct FrameStack {
    frames: Vec<Frame>,
    max_depth: usize,
}

impl FrameStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            max_depth,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn top_id(&self) -> Option<FrameId> {
        self.frames.len().checked_sub(1)
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id)
    }

    /// Push a frame as a child of the current top. Parent and depth are assigned here.
    pub fn push(&mut self, mut frame: Frame) -> VmResult<FrameId> {
        if self.frames.len() >= self.max_depth {
            return Err(VmError::FrameDepthExceeded {
                limit: self.max_depth,
            });
        }
        frame.parent = self.top_id();
        frame.depth = self.frames.len();
        self.frames.push(frame);
        Ok(self.frames.len() - 1)
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Replace the top frame with `frame`, which takes over the slot's parent, depth, range
    /// start, branch and effects. Returns the replaced frame so its production can be
    /// finalized.
    pub fn splice(&mut self, mut frame: Frame) -> Option<Frame> {
        let slot = self.frames.last_mut()?;
        frame.parent = slot.parent;
        frame.depth = slot.depth;
        frame.range.start = slot.range.start;
        frame.branched = slot.branched;
        frame.effects = slot.effects;
        frame.allow_empty = slot.allow_empty && frame.allow_empty;
        Some(std::mem::replace(slot, frame))
    }

    /// Record `mark` as the start of the top frame and of every ancestor still lacking one.
    pub fn start_capture(&mut self, mark: Mark) {
        for frame in self.frames.iter_mut().rev() {
            if frame.range.start.is_some() {
                break;
            }
            frame.range.start = Some(mark);
        }
    }

    /// Record the end of the top frame. Frames that never started start here too.
    pub fn end_capture(&mut self, mark: Mark) -> Option<CaptureRange> {
        let frame = self.frames.last_mut()?;
        debug_assert!(frame.range.end.is_none(), "range end recorded twice");
        if frame.range.start.is_none() {
            frame.range.start = Some(mark);
        }
        frame.range.end = Some(mark);
        Some(frame.range)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }
}
