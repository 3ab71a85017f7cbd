//! Matchers describe what a single rule invocation is trying to recognize
//!
//! A [`Matcher`] pairs an optional reference matcher (which child slot the result lands in)
//! with a node matcher (what to recognize). Node matchers come in six shapes:
//!
//! - `Node`: a grammar type, possibly in another language, optionally with an intrinsic
//!   literal or pattern matched directly against the source
//! - `Literal` / `Pattern`: raw text recognized in place, emitted as `Literal` tags
//! - `Gap`: an interpolation point of the input
//! - `Null`: an explicitly empty slot
//! - `Array`: an explicitly empty array slot

use super::error::VmError;
use super::tag::{Attributes, NodeFlags, Reference, ReferenceFlags, ANONYMOUS};
use regex::Regex;
use std::fmt;

/// A regular expression anchored at the cursor.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, VmError> {
        let regex = Regex::new(&format!("^(?:{})", source)).map_err(|e| VmError::Pattern {
            pattern: source.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Length in bytes of the match at the start of `haystack`, if any.
    pub fn match_len(&self, haystack: &str) -> Option<usize> {
        self.regex.find(haystack).map(|m| m.end())
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.source)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Something that can be matched against raw source text.
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePattern {
    Literal(String),
    Pattern(Pattern),
}

impl SourcePattern {
    /// Length in bytes of the match at the start of `haystack`, if any.
    pub fn match_len(&self, haystack: &str) -> Option<usize> {
        match self {
            SourcePattern::Literal(text) => haystack.starts_with(text.as_str()).then(|| text.len()),
            SourcePattern::Pattern(pattern) => pattern.match_len(haystack),
        }
    }
}

impl fmt::Display for SourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourcePattern::Literal(text) => write!(f, "{:?}", text),
            SourcePattern::Pattern(pattern) => write!(f, "{:?}", pattern),
        }
    }
}

/// Selects the child slot a match result is stored in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefMatcher {
    pub name: String,
    pub is_array: bool,
    pub flags: ReferenceFlags,
}

impl RefMatcher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_array: false,
            flags: ReferenceFlags::default(),
        }
    }

    pub fn to_reference(&self) -> Reference {
        Reference::new(self.name.clone(), self.is_array).with_flags(self.flags)
    }
}

/// The open-tag half of a node matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenMatcher {
    pub flags: NodeFlags,
    /// Relative language name or absolute canonical URL; `None` means the current language.
    pub language: Option<String>,
    pub node_type: String,
    pub intrinsic: Option<SourcePattern>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeMatcher {
    Node(OpenMatcher),
    Literal(String),
    Pattern(Pattern),
    Gap,
    Null,
    Array,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Matcher {
    pub ref_matcher: Option<RefMatcher>,
    pub node_matcher: NodeMatcher,
}

impl Matcher {
    pub fn node(node_type: impl Into<String>) -> Self {
        Self::from_node_matcher(NodeMatcher::Node(OpenMatcher {
            flags: NodeFlags::default(),
            language: None,
            node_type: node_type.into(),
            intrinsic: None,
            attributes: Attributes::new(),
        }))
    }

    /// A self-closing token node whose text is recognized by `intrinsic`.
    pub fn token(node_type: impl Into<String>, intrinsic: SourcePattern) -> Self {
        Self::from_node_matcher(NodeMatcher::Node(OpenMatcher {
            flags: NodeFlags::token(),
            language: None,
            node_type: node_type.into(),
            intrinsic: Some(intrinsic),
            attributes: Attributes::new(),
        }))
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Self::from_node_matcher(NodeMatcher::Literal(text.into()))
    }

    pub fn pattern(source: &str) -> Result<Self, VmError> {
        Ok(Self::from_node_matcher(NodeMatcher::Pattern(Pattern::new(
            source,
        )?)))
    }

    /// A raw pattern matcher from an already compiled [`Pattern`].
    pub fn regex(pattern: Pattern) -> Self {
        Self::from_node_matcher(NodeMatcher::Pattern(pattern))
    }

    pub fn gap() -> Self {
        Self::from_node_matcher(NodeMatcher::Gap)
    }

    pub fn null() -> Self {
        Self::from_node_matcher(NodeMatcher::Null)
    }

    pub fn array() -> Self {
        Self::from_node_matcher(NodeMatcher::Array)
    }

    fn from_node_matcher(node_matcher: NodeMatcher) -> Self {
        Self {
            ref_matcher: None,
            node_matcher,
        }
    }

    /// Store the result under `name`.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        match &mut self.ref_matcher {
            Some(ref_matcher) => ref_matcher.name = name,
            None => self.ref_matcher = Some(RefMatcher::new(name)),
        }
        self
    }

    /// Store the result in an array slot named `name`.
    pub fn in_array(self, name: impl Into<String>) -> Self {
        let mut matcher = self.named(name);
        if let Some(ref_matcher) = &mut matcher.ref_matcher {
            ref_matcher.is_array = true;
        }
        matcher
    }

    /// Permit an interpolation point in this slot.
    pub fn allow_gap(mut self) -> Self {
        let ref_matcher = self
            .ref_matcher
            .get_or_insert_with(|| RefMatcher::new(ANONYMOUS));
        ref_matcher.flags.has_gap = true;
        self
    }

    pub fn in_language(mut self, language: impl Into<String>) -> Self {
        if let NodeMatcher::Node(open) = &mut self.node_matcher {
            open.language = Some(language.into());
        }
        self
    }

    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        if let NodeMatcher::Node(open) = &mut self.node_matcher {
            open.flags = flags;
        }
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        if let NodeMatcher::Node(open) = &mut self.node_matcher {
            open.attributes.insert(key.into(), value);
        }
        self
    }

    pub fn with_intrinsic(mut self, intrinsic: SourcePattern) -> Self {
        if let NodeMatcher::Node(open) = &mut self.node_matcher {
            open.intrinsic = Some(intrinsic);
        }
        self
    }

    pub fn open(&self) -> Option<&OpenMatcher> {
        match &self.node_matcher {
            NodeMatcher::Node(open) => Some(open),
            _ => None,
        }
    }

    /// The reference this matcher asks for, defaulting to the anonymous slot.
    pub fn resolved_reference(&self) -> Reference {
        self.ref_matcher
            .as_ref()
            .map(RefMatcher::to_reference)
            .unwrap_or_else(Reference::anonymous)
    }

    /// Raw text matcher, if this matcher is recognized directly against the source.
    pub fn source_pattern(&self) -> Option<SourcePattern> {
        match &self.node_matcher {
            NodeMatcher::Literal(text) => Some(SourcePattern::Literal(text.clone())),
            NodeMatcher::Pattern(pattern) => Some(SourcePattern::Pattern(pattern.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref_matcher) = &self.ref_matcher {
            write!(f, "{}", ref_matcher.to_reference())?;
            write!(f, ": ")?;
        }
        match &self.node_matcher {
            NodeMatcher::Node(open) => match &open.language {
                Some(language) => write!(f, "<{}:{}>", language, open.node_type),
                None => write!(f, "<{}>", open.node_type),
            },
            NodeMatcher::Literal(text) => write!(f, "{:?}", text),
            NodeMatcher::Pattern(pattern) => write!(f, "{:?}", pattern),
            NodeMatcher::Gap => write!(f, "<//>"),
            NodeMatcher::Null => write!(f, "null"),
            NodeMatcher::Array => write!(f, "[]"),
        }
    }
}

/// Merge the reference accumulated by transparent (cover or helper) frames with the one a
/// nested matcher asks for. At most one of them may carry an explicit name.
pub fn merge_references(outer: &Reference, inner: &Reference) -> Result<Reference, VmError> {
    let flags = ReferenceFlags {
        expression: outer.flags.expression || inner.flags.expression,
        has_gap: outer.flags.has_gap || inner.flags.has_gap,
    };

    let merged = match (outer.is_anonymous(), inner.is_anonymous()) {
        (true, _) => inner.clone(),
        (false, true) => outer.clone(),
        (false, false) => {
            if outer.name != inner.name || outer.is_array != inner.is_array {
                return Err(VmError::DoubleSpecifiedPath {
                    outer: outer.to_string(),
                    inner: inner.to_string(),
                });
            }
            outer.clone()
        }
    };

    Ok(merged.with_flags(flags))
}
