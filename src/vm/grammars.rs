//! Built-in languages
//!
//! Small grammars written against the table API. They back the command-line host and serve
//! as worked examples of covers, tokens, holds, array slots and cross-language references.

pub mod arithmetic;
pub mod digits;

use super::language::Language;
use super::matcher::Matcher;
use std::sync::Arc;

/// Names accepted by [`by_name`].
pub const NAMES: &[&str] = &["arithmetic", "digits"];

/// A built-in language together with the matcher that parses a whole document in it.
pub fn by_name(name: &str) -> Option<(Arc<Language>, Matcher)> {
    match name {
        "arithmetic" => Some((arithmetic::language(), arithmetic::document())),
        "digits" => Some((digits::language(), digits::document())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_resolves() {
        for name in NAMES {
            let (language, _) = by_name(name).unwrap();
            assert!(language.canonical_url.ends_with(name));
        }
        assert!(by_name("cobol").is_none());
    }
}
