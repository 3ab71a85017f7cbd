//! Testing utilities for tag streams
//!
//! Asserting on raw `Vec<Tag>` values is verbose and hides the shape of the tree. This
//! module offers a fluent assertion API over the compact textual notation instead:
//!
//! ```rust-example
//! use tagvm::vm::testing::assert_tags;
//!
//! assert_tags(&parse.tags)
//!     .well_formed()
//!     .body(&[".:", "<*Number>", "\"42\"", "</>"]);
//! ```
//!
//! `body` compares everything between `OpenFragment` and `CloseFragment`, so tests do not
//! repeat the doctype and fragment boilerplate.

use super::tag::Tag;
use super::tree;

/// Tags between the fragment brackets.
pub fn body(tags: &[Tag]) -> &[Tag] {
    let start = tags
        .iter()
        .position(|tag| matches!(tag, Tag::OpenFragment { .. }))
        .map(|index| index + 1)
        .unwrap_or(0);
    let end = tags
        .iter()
        .rposition(|tag| *tag == Tag::CloseFragment)
        .unwrap_or(tags.len());
    &tags[start..end.max(start)]
}

/// Each tag in the compact textual notation.
pub fn render(tags: &[Tag]) -> Vec<String> {
    tags.iter().map(ToString::to_string).collect()
}

/// Check the structural rules every finished stream obeys.
pub fn check_well_formed(tags: &[Tag]) -> Result<(), String> {
    if !matches!(tags.first(), Some(Tag::Doctype { .. })) {
        return Err("stream must start with a doctype".to_string());
    }
    if !matches!(tags.get(1), Some(Tag::OpenFragment { .. })) {
        return Err("doctype must be followed by the fragment".to_string());
    }
    if tags.last() != Some(&Tag::CloseFragment) {
        return Err("stream must end by closing the fragment".to_string());
    }

    let mut depth = 0usize;
    for (index, tag) in tags.iter().enumerate() {
        if tag.opens() {
            depth += 1;
        }
        if tag.closes() {
            depth = depth
                .checked_sub(1)
                .ok_or_else(|| format!("unbalanced close at {}", index))?;
        }
        if let Tag::Reference { is_array, .. } = tag {
            let next = tags.get(index + 1);
            let valid = match next {
                Some(Tag::ArrayInitializer) => *is_array,
                Some(next) => next.is_reference_value(),
                None => false,
            };
            if !valid {
                return Err(format!("reference at {} is not followed by a value", index));
            }
        }
    }
    if depth != 0 {
        return Err(format!("{} unclosed tags", depth));
    }
    tree::build(tags).map(|_| ()).map_err(|err| err.to_string())
}

pub fn assert_tags(tags: &[Tag]) -> TagsAssertion<'_> {
    TagsAssertion { tags }
}

pub struct TagsAssertion<'a> {
    tags: &'a [Tag],
}

impl<'a> TagsAssertion<'a> {
    pub fn well_formed(self) -> Self {
        if let Err(problem) = check_well_formed(self.tags) {
            panic!(
                "Malformed tag stream: {}\n{}",
                problem,
                render(self.tags).join("\n")
            );
        }
        self
    }

    /// Compare the fragment body with the expected textual notation.
    pub fn body(self, expected: &[&str]) -> Self {
        let actual = render(body(self.tags));
        assert_eq!(
            actual, expected,
            "Tag stream body differs\nactual:\n{}",
            actual.join("\n")
        );
        self
    }

    pub fn len(self, expected: usize) -> Self {
        assert_eq!(
            self.tags.len(),
            expected,
            "Expected {} tags, found {}:\n{}",
            expected,
            self.tags.len(),
            render(self.tags).join("\n")
        );
        self
    }

    /// Assert that no tag of `kind` (see [`Tag::kind`]) was emitted.
    pub fn lacks(self, kind: &str) -> Self {
        if let Some(index) = self.tags.iter().position(|tag| tag.kind() == kind) {
            panic!(
                "Unexpected {} at {}:\n{}",
                kind,
                index,
                render(self.tags).join("\n")
            );
        }
        self
    }

    pub fn source_text(self, expected: &str) -> Self {
        let fragment = tree::build(self.tags).unwrap_or_else(|err| panic!("{}", err));
        assert_eq!(fragment.source_text(), expected);
        self
    }
}
