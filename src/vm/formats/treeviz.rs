//! Treeviz: the rebuilt node tree, one line per child
//!
//! Nesting is drawn with box connectors. Each line shows the slot name and the value:
//!
//! ```text
//! └─ .: Binary
//!   ├─ left: Number "1"
//!   ├─ " + "
//!   └─ right: Number "2"
//! ```
//!
//! Token nodes show their text inline and have no child lines.

use super::registry::{FormatError, Formatter};
use crate::vm::tag::Tag;
use crate::vm::tree::{self, Child, Node, Value};

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let mut truncated = s.chars().take(max_chars).collect::<String>();
        truncated.push_str("...");
        truncated
    } else {
        s.to_string()
    }
}

pub fn to_treeviz_str(fragment: &Node) -> String {
    let mut result = String::new();
    append_children(&mut result, fragment, "");
    result
}

fn append_children(result: &mut String, node: &Node, prefix: &str) {
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        append_child(result, child, prefix, i + 1 == count);
    }
}

fn append_child(result: &mut String, child: &Child, prefix: &str, is_last: bool) {
    let connector = if is_last { "└─" } else { "├─" };
    let new_prefix = format!("{}{}", prefix, if is_last { "  " } else { "│ " });

    match child {
        Child::Literal { text } => {
            result.push_str(&format!("{}{} {:?}\n", prefix, connector, truncate(text, 30)));
        }
        Child::ArrayInitializer { name } => {
            result.push_str(&format!("{}{} {}: []\n", prefix, connector, name));
        }
        Child::Property {
            name,
            is_array,
            value,
        } => {
            let label = if *is_array {
                format!("{}[]", name)
            } else {
                name.clone()
            };
            match value {
                Value::Node(node) if node.flags.token => {
                    result.push_str(&format!(
                        "{}{} {}: {} {:?}\n",
                        prefix,
                        connector,
                        label,
                        node.node_type,
                        truncate(&node.source_text(), 30)
                    ));
                }
                Value::Node(node) => {
                    result.push_str(&format!(
                        "{}{} {}: {}\n",
                        prefix, connector, label, node.node_type
                    ));
                    append_children(result, node, &new_prefix);
                }
                Value::Literal(text) => {
                    result.push_str(&format!("{}{} {}: {:?}\n", prefix, connector, label, text));
                }
                Value::Null => {
                    result.push_str(&format!("{}{} {}: null\n", prefix, connector, label));
                }
                Value::Gap => {
                    result.push_str(&format!("{}{} {}: <//>\n", prefix, connector, label));
                }
            }
        }
    }
}

pub struct TreevizFormatter;

impl Formatter for TreevizFormatter {
    fn name(&self) -> &str {
        "treeviz"
    }

    fn serialize(&self, tags: &[Tag]) -> Result<String, FormatError> {
        let fragment =
            tree::build(tags).map_err(|err| FormatError::SerializationError(err.to_string()))?;
        Ok(to_treeviz_str(&fragment))
    }

    fn description(&self) -> &str {
        "Rebuilt tree, one line per child"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::grammars::arithmetic;
    use crate::vm::parse;
    use crate::vm::source::Input;

    #[test]
    fn draws_nested_slots() {
        let parse = parse(
            arithmetic::language(),
            arithmetic::document(),
            Input::new("1 + 2"),
        )
        .unwrap();
        let output = TreevizFormatter.serialize(&parse.tags).unwrap();
        assert_eq!(
            output,
            "└─ .: Program\n  \
             └─ expression: Binary\n    \
             ├─ left: Number \"1\"\n    \
             ├─ \" \"\n    \
             ├─ operator: Operator \"+\"\n    \
             ├─ \" \"\n    \
             └─ right: Number \"2\"\n"
        );
    }

    #[test]
    fn long_text_is_truncated() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }
}
