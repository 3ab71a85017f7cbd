//! Tree reconstruction
//!
//! Replays a finished tag stream into nested [`Node`]s, checking the stream's structural
//! rules on the way: a single doctype, a single fragment, balanced open/close tags, every
//! non-array reference followed by exactly one value, and every `Shift` followed by the node
//! that adopts the shifted one.
//!
//! Reconstruction is lossless: [`Node::source_text`] reproduces the parsed input, writing
//! interpolation points back as `${}`.

use super::frame::FRAGMENT_TYPE;
use super::source::GAP_MARKER;
use super::tag::{Attributes, NodeFlags, Tag};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub language: String,
    pub node_type: String,
    #[serde(skip_serializing_if = "is_default_flags")]
    pub flags: NodeFlags,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    pub children: Vec<Child>,
}

fn is_default_flags(flags: &NodeFlags) -> bool {
    *flags == NodeFlags::default()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Child {
    Literal { text: String },
    Property {
        name: String,
        is_array: bool,
        value: Value,
    },
    /// Introduces an array slot on the node.
    ArrayInitializer { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Value {
    Node(Node),
    Literal(String),
    Null,
    Gap,
}

impl Node {
    fn new(language: String, node_type: String, flags: NodeFlags, attributes: Attributes) -> Self {
        Self {
            language,
            node_type,
            flags,
            attributes,
            children: Vec::new(),
        }
    }

    pub fn is_fragment(&self) -> bool {
        self.node_type == FRAGMENT_TYPE
    }

    /// The first value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.children.iter().find_map(|child| match child {
            Child::Property {
                name: property,
                value,
                ..
            } if property == name => Some(value),
            _ => None,
        })
    }

    /// Every value stored under `name`, in source order.
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.children.iter().filter_map(move |child| match child {
            Child::Property {
                name: property,
                value,
                ..
            } if property == name => Some(value),
            _ => None,
        })
    }

    /// The node stored under `name`, if any.
    pub fn node(&self, name: &str) -> Option<&Node> {
        match self.get(name) {
            Some(Value::Node(node)) => Some(node),
            _ => None,
        }
    }

    /// Whether the node declared an array slot named `name`.
    pub fn has_array(&self, name: &str) -> bool {
        self.children.iter().any(|child| {
            matches!(child, Child::ArrayInitializer { name: array } if array == name)
        })
    }

    /// Reassemble the source text covered by this node.
    pub fn source_text(&self) -> String {
        let mut out = String::new();
        self.write_source(&mut out);
        out
    }

    fn write_source(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Child::Literal { text } => out.push_str(text),
                Child::Property { value, .. } => match value {
                    Value::Node(node) => node.write_source(out),
                    Value::Literal(text) => out.push_str(text),
                    Value::Gap => out.push_str(GAP_MARKER),
                    Value::Null => {}
                },
                Child::ArrayInitializer { .. } => {}
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeError {
    /// A tag appeared where the stream's structure does not allow it
    Unexpected {
        index: usize,
        tag: String,
        reason: &'static str,
    },
    /// The stream ended before the fragment closed
    Unterminated,
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::Unexpected { index, tag, reason } => {
                write!(f, "Unexpected tag {} at {}: {}", tag, index, reason)
            }
            TreeError::Unterminated => write!(f, "Tag stream ended before the fragment closed"),
        }
    }
}

impl std::error::Error for TreeError {}

struct Slot {
    name: String,
    is_array: bool,
}

struct Shifted {
    shift_name: String,
    slot: Slot,
    value: Value,
}

struct Builder {
    language: Option<String>,
    stack: Vec<(Node, Option<Slot>)>,
    pending: Option<Slot>,
    shifted: Option<Shifted>,
    done: Option<Node>,
}

/// Rebuild the fragment node described by `tags`.
pub fn build(tags: &[Tag]) -> Result<Node, TreeError> {
    let mut builder = Builder {
        language: None,
        stack: Vec::new(),
        pending: None,
        shifted: None,
        done: None,
    };
    for (index, tag) in tags.iter().enumerate() {
        builder.push(index, tag)?;
    }
    builder.done.ok_or(TreeError::Unterminated)
}

impl Builder {
    fn push(&mut self, index: usize, tag: &Tag) -> Result<(), TreeError> {
        let unexpected = |reason| TreeError::Unexpected {
            index,
            tag: tag.to_string(),
            reason,
        };

        if self.done.is_some() {
            return Err(unexpected("the fragment is already closed"));
        }
        if self.shifted.is_some() && !matches!(tag, Tag::OpenNode { .. }) {
            return Err(unexpected("a shift must be followed by the adopting node"));
        }
        if self.pending.is_some() && !tag.is_reference_value() && *tag != Tag::ArrayInitializer {
            return Err(unexpected("a reference must be followed by its value"));
        }

        match tag {
            Tag::Doctype { language, .. } => {
                if self.language.is_some() || index != 0 {
                    return Err(unexpected("the doctype must come first"));
                }
                self.language = Some(language.clone());
            }
            Tag::OpenFragment { flags } => {
                if !self.stack.is_empty() {
                    return Err(unexpected("fragments do not nest"));
                }
                let language = self
                    .language
                    .clone()
                    .ok_or_else(|| unexpected("missing doctype"))?;
                let fragment =
                    Node::new(language, FRAGMENT_TYPE.to_string(), *flags, Attributes::new());
                self.stack.push((fragment, None));
            }
            Tag::CloseFragment => {
                if self.stack.len() != 1 {
                    return Err(unexpected("unclosed nodes inside the fragment"));
                }
                self.done = self.stack.pop().map(|(fragment, _)| fragment);
            }
            Tag::OpenNode {
                flags,
                language,
                node_type,
                attributes,
            } => {
                if self.stack.is_empty() {
                    return Err(unexpected("nodes must be inside the fragment"));
                }
                let mut node =
                    Node::new(language.clone(), node_type.clone(), *flags, attributes.clone());
                let slot = match (self.shifted.take(), self.pending.take()) {
                    (Some(shifted), _) => {
                        node.children.push(Child::Property {
                            name: shifted.shift_name,
                            is_array: false,
                            value: shifted.value,
                        });
                        shifted.slot
                    }
                    (None, Some(slot)) => slot,
                    (None, None) => return Err(unexpected("a node needs a reference")),
                };
                self.stack.push((node, Some(slot)));
            }
            Tag::CloseNode => {
                if self.stack.len() < 2 {
                    return Err(unexpected("no open node to close"));
                }
                if let Some((node, Some(slot))) = self.stack.pop() {
                    self.attach(slot, Value::Node(node));
                }
            }
            Tag::Reference { name, is_array, .. } => {
                if self.stack.is_empty() {
                    return Err(unexpected("references must be inside the fragment"));
                }
                self.pending = Some(Slot {
                    name: name.clone(),
                    is_array: *is_array,
                });
            }
            Tag::ArrayInitializer => match self.pending.take() {
                Some(slot) if slot.is_array => {
                    self.push_child(Child::ArrayInitializer { name: slot.name });
                }
                _ => return Err(unexpected("an array initializer needs an array reference")),
            },
            Tag::Null => {
                let slot = self.pending.take().ok_or_else(|| unexpected("null needs a reference"))?;
                self.attach(slot, Value::Null);
            }
            Tag::Gap => {
                let slot = self
                    .pending
                    .take()
                    .ok_or_else(|| unexpected("a gap needs a reference"))?;
                self.attach(slot, Value::Gap);
            }
            Tag::Literal { text } => match self.pending.take() {
                Some(slot) => self.attach(slot, Value::Literal(text.clone())),
                None => {
                    if !self.push_child(Child::Literal { text: text.clone() }) {
                        return Err(unexpected("text must be inside the fragment"));
                    }
                }
            },
            Tag::Shift { name } => {
                let last = self.current_opt().and_then(|node| node.children.pop());
                match last {
                    Some(Child::Property {
                        name: slot_name,
                        is_array,
                        value: value @ (Value::Node(_) | Value::Gap),
                    }) => {
                        self.shifted = Some(Shifted {
                            shift_name: name.clone(),
                            slot: Slot {
                                name: slot_name,
                                is_array,
                            },
                            value,
                        });
                    }
                    Some(other) => {
                        self.push_child(other);
                        return Err(unexpected("only a completed node can be shifted"));
                    }
                    None => return Err(unexpected("nothing to shift")),
                }
            }
        }
        Ok(())
    }

    fn current_opt(&mut self) -> Option<&mut Node> {
        self.stack.last_mut().map(|(node, _)| node)
    }

    /// Append to the innermost open node. Returns false outside the fragment.
    fn push_child(&mut self, child: Child) -> bool {
        match self.current_opt() {
            Some(node) => {
                node.children.push(child);
                true
            }
            None => false,
        }
    }

    fn attach(&mut self, slot: Slot, value: Value) {
        self.push_child(Child::Property {
            name: slot.name,
            is_array: slot.is_array,
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: Vec<Tag>) -> Vec<Tag> {
        let mut tags = vec![
            Tag::Doctype {
                language: "lang".to_string(),
                attributes: Attributes::new(),
            },
            Tag::OpenFragment {
                flags: NodeFlags::default(),
            },
        ];
        tags.extend(body);
        tags.push(Tag::CloseFragment);
        tags
    }

    fn open(node_type: &str) -> Tag {
        Tag::open_node(NodeFlags::default(), "lang", node_type, Attributes::new())
    }

    #[test]
    fn rebuilds_nested_properties() {
        let tags = doc(vec![
            Tag::reference(".", false),
            open("Pair"),
            Tag::reference("left", false),
            open("Number"),
            Tag::literal("1"),
            Tag::CloseNode,
            Tag::literal(","),
            Tag::reference("right", false),
            Tag::Null,
            Tag::CloseNode,
        ]);
        let fragment = build(&tags).unwrap();
        assert!(fragment.is_fragment());
        let pair = fragment.node(".").unwrap();
        assert_eq!(pair.node_type, "Pair");
        assert_eq!(pair.node("left").unwrap().source_text(), "1");
        assert_eq!(pair.get("right"), Some(&Value::Null));
        assert_eq!(fragment.source_text(), "1,");
    }

    #[test]
    fn lookups_outlive_the_key() {
        let tags = doc(vec![
            Tag::reference("left", false),
            open("Number"),
            Tag::literal("7"),
            Tag::CloseNode,
        ]);
        let fragment = build(&tags).unwrap();
        let (value, node) = {
            let key = String::from("left");
            (fragment.get(&key), fragment.node(&key))
        };
        assert!(matches!(value, Some(Value::Node(_))));
        assert_eq!(node.map(Node::source_text), Some("7".to_string()));
    }

    #[test]
    fn arrays_collect_values_in_order() {
        let tags = doc(vec![
            Tag::reference("items", true),
            Tag::ArrayInitializer,
            Tag::reference("items", true),
            Tag::Gap,
            Tag::reference("items", true),
            Tag::Gap,
        ]);
        let fragment = build(&tags).unwrap();
        assert!(fragment.has_array("items"));
        assert_eq!(fragment.values("items").count(), 2);
        assert_eq!(fragment.source_text(), "${}${}");
    }

    #[test]
    fn shift_reparents_the_last_node() {
        let tags = doc(vec![
            Tag::reference(".", false),
            open("Number"),
            Tag::literal("1"),
            Tag::CloseNode,
            Tag::Shift {
                name: "left".to_string(),
            },
            open("Binary"),
            Tag::literal("+"),
            Tag::reference("right", false),
            open("Number"),
            Tag::literal("2"),
            Tag::CloseNode,
            Tag::CloseNode,
        ]);
        let fragment = build(&tags).unwrap();
        assert_eq!(fragment.values(".").count(), 1);
        let binary = fragment.node(".").unwrap();
        assert_eq!(binary.node_type, "Binary");
        assert_eq!(binary.node("left").unwrap().source_text(), "1");
        assert_eq!(fragment.source_text(), "1+2");
    }

    #[test]
    fn rejects_dangling_references() {
        let tags = doc(vec![Tag::reference("x", false), Tag::CloseNode]);
        assert!(matches!(
            build(&tags),
            Err(TreeError::Unexpected {
                reason: "a reference must be followed by its value",
                ..
            })
        ));
    }

    #[test]
    fn rejects_unbalanced_streams() {
        let mut tags = doc(vec![Tag::reference(".", false), open("Number")]);
        tags.pop();
        assert_eq!(build(&tags), Err(TreeError::Unterminated));

        let tags = doc(vec![Tag::reference(".", false), open("Number")]);
        assert!(build(&tags).is_err());
    }

    #[test]
    fn shift_needs_a_completed_node() {
        let tags = doc(vec![Tag::Shift {
            name: "left".to_string(),
        }]);
        assert!(matches!(
            build(&tags),
            Err(TreeError::Unexpected {
                reason: "nothing to shift",
                ..
            })
        ));
    }
}
