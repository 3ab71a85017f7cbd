//! Output tags
//!
//! The evaluator's only product is an append-only sequence of tags. Together they describe a
//! lossless concrete syntax tree:
//!
//! - `Doctype` comes first and names the root language
//! - `OpenFragment` / `CloseFragment` bracket the whole parse
//! - `OpenNode` / `CloseNode` nest arbitrarily and always close in stack order
//! - `Reference` names the slot the following value lands in; `ArrayInitializer` marks a
//!   slot that accumulates several values
//! - `Null` and `Gap` are zero-width placeholders, `Literal` carries matched source text
//! - `Shift` re-parents the most recently closed node into the node opened next
//!
//! Tags never change once emitted. Attribute values bound after a node was opened are kept
//! out-of-band by the source/tree collaborator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Static or bound attribute values of a node.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// The anonymous reference name. Merging treats it as "no name given".
pub const ANONYMOUS: &str = ".";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeFlags {
    #[serde(default, skip_serializing_if = "is_false")]
    pub token: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub trivia: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub escape: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_gap: bool,
}

impl NodeFlags {
    pub fn token() -> Self {
        Self {
            token: true,
            ..Self::default()
        }
    }

    pub fn trivia() -> Self {
        Self {
            trivia: true,
            ..Self::default()
        }
    }

    pub fn with_gap(mut self, has_gap: bool) -> Self {
        self.has_gap = has_gap;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceFlags {
    #[serde(default, skip_serializing_if = "is_false")]
    pub expression: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_gap: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A reference to a child slot of the enclosing node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    pub is_array: bool,
    #[serde(default)]
    pub flags: ReferenceFlags,
}

impl Reference {
    pub fn new(name: impl Into<String>, is_array: bool) -> Self {
        Self {
            name: name.into(),
            is_array,
            flags: ReferenceFlags::default(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS, false)
    }

    pub fn is_anonymous(&self) -> bool {
        self.name == ANONYMOUS
    }

    pub fn with_flags(mut self, flags: ReferenceFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn to_tag(&self) -> Tag {
        Tag::Reference {
            name: self.name.clone(),
            is_array: self.is_array,
            flags: self.flags,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_array {
            write!(f, "{}[]", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// A single element of the output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Tag {
    Doctype {
        language: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attributes: Attributes,
    },
    OpenFragment {
        #[serde(default)]
        flags: NodeFlags,
    },
    CloseFragment,
    OpenNode {
        #[serde(default)]
        flags: NodeFlags,
        language: String,
        node_type: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attributes: Attributes,
    },
    CloseNode,
    Reference {
        name: String,
        is_array: bool,
        #[serde(default)]
        flags: ReferenceFlags,
    },
    Null,
    Gap,
    Shift {
        name: String,
    },
    ArrayInitializer,
    Literal {
        text: String,
    },
}

impl Tag {
    pub fn literal(text: impl Into<String>) -> Self {
        Tag::Literal { text: text.into() }
    }

    pub fn reference(name: impl Into<String>, is_array: bool) -> Self {
        Reference::new(name, is_array).to_tag()
    }

    pub fn open_node(
        flags: NodeFlags,
        language: impl Into<String>,
        node_type: impl Into<String>,
        attributes: Attributes,
    ) -> Self {
        Tag::OpenNode {
            flags,
            language: language.into(),
            node_type: node_type.into(),
            attributes,
        }
    }

    /// Short kind name, used by the text format and by diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Tag::Doctype { .. } => "Doctype",
            Tag::OpenFragment { .. } => "OpenFragment",
            Tag::CloseFragment => "CloseFragment",
            Tag::OpenNode { .. } => "OpenNode",
            Tag::CloseNode => "CloseNode",
            Tag::Reference { .. } => "Reference",
            Tag::Null => "Null",
            Tag::Gap => "Gap",
            Tag::Shift { .. } => "Shift",
            Tag::ArrayInitializer => "ArrayInitializer",
            Tag::Literal { .. } => "Literal",
        }
    }

    /// Tags that may directly follow a non-array reference.
    pub fn is_reference_value(&self) -> bool {
        matches!(
            self,
            Tag::Null | Tag::Gap | Tag::OpenNode { .. } | Tag::Literal { .. }
        )
    }

    pub fn opens(&self) -> bool {
        matches!(self, Tag::OpenNode { .. } | Tag::OpenFragment { .. })
    }

    pub fn closes(&self) -> bool {
        matches!(self, Tag::CloseNode | Tag::CloseFragment)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Doctype { language, .. } => write!(f, "<!doctype {}>", language),
            Tag::OpenFragment { flags } if flags.has_gap => write!(f, "<$>"),
            Tag::OpenFragment { .. } => write!(f, "<>"),
            Tag::CloseFragment => write!(f, "</>"),
            Tag::OpenNode {
                flags,
                node_type,
                attributes,
                ..
            } => {
                let sigil = if flags.token { "*" } else { "" };
                let trivia = if flags.trivia { "#" } else { "" };
                write!(f, "<{}{}{}", trivia, sigil, node_type)?;
                for (key, value) in attributes {
                    write!(f, " {}={}", key, value)?;
                }
                write!(f, ">")
            }
            Tag::CloseNode => write!(f, "</>"),
            Tag::Reference { name, is_array, .. } => {
                if *is_array {
                    write!(f, "{}[]:", name)
                } else {
                    write!(f, "{}:", name)
                }
            }
            Tag::Null => write!(f, "null"),
            Tag::Gap => write!(f, "<//>"),
            Tag::Shift { name } => write!(f, "^^^ {}", name),
            Tag::ArrayInitializer => write!(f, "[]"),
            Tag::Literal { text } => write!(f, "{:?}", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_values() {
        assert!(Tag::Null.is_reference_value());
        assert!(Tag::Gap.is_reference_value());
        assert!(Tag::literal("x").is_reference_value());
        assert!(!Tag::CloseNode.is_reference_value());
        assert!(!Tag::ArrayInitializer.is_reference_value());
    }

    #[test]
    fn display_is_compact() {
        let open = Tag::open_node(NodeFlags::token(), "digits", "Number", Attributes::new());
        assert_eq!(open.to_string(), "<*Number>");
        assert_eq!(Tag::reference("items", true).to_string(), "items[]:");
        assert_eq!(Tag::literal("42").to_string(), "\"42\"");
    }

    #[test]
    fn serializes_with_type_field() {
        let json = serde_json::to_value(Tag::reference("left", false)).unwrap();
        assert_eq!(json["type"], "reference");
        assert_eq!(json["name"], "left");
        assert_eq!(json["is_array"], false);

        let back: Tag = serde_json::from_value(json).unwrap();
        assert_eq!(back, Tag::reference("left", false));
    }
}
