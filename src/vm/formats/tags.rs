//! Compact textual notation: one tag per line, nodes indented by depth.
//!
//! ```text
//! <!doctype urn:tagvm:digits>
//! <$>
//!   .:
//!   <*Number>
//!     "42"
//!   </>
//! </>
//! ```

use super::registry::{FormatError, Formatter};
use crate::vm::tag::Tag;

pub fn to_tags_str(tags: &[Tag]) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    for tag in tags {
        if tag.closes() {
            depth = depth.saturating_sub(1);
        }
        out.push_str(&"  ".repeat(depth));
        out.push_str(&tag.to_string());
        out.push('\n');
        if tag.opens() {
            depth += 1;
        }
    }
    out
}

pub struct TagsFormatter;

impl Formatter for TagsFormatter {
    fn name(&self) -> &str {
        "tags"
    }

    fn serialize(&self, tags: &[Tag]) -> Result<String, FormatError> {
        Ok(to_tags_str(tags))
    }

    fn description(&self) -> &str {
        "One tag per line"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::tag::{Attributes, NodeFlags};

    #[test]
    fn indents_by_nesting() {
        let tags = vec![
            Tag::OpenFragment {
                flags: NodeFlags::default(),
            },
            Tag::reference(".", false),
            Tag::open_node(NodeFlags::token(), "digits", "Number", Attributes::new()),
            Tag::literal("42"),
            Tag::CloseNode,
            Tag::CloseFragment,
        ];
        insta::assert_snapshot!(to_tags_str(&tags), @r###"
        <>
          .:
          <*Number>
            "42"
          </>
        </>
        "###);
    }
}
