//! Unsigned decimal numbers.
//!
//! `Number` is a token node recognized by its intrinsic pattern; `Numeral` is a cover that
//! other languages reach through a dependency.

use crate::vm::instruction::Instruction;
use crate::vm::language::{Grammar, Language};
use crate::vm::matcher::{Matcher, Pattern, SourcePattern};
use crate::vm::production::Script;
use once_cell::sync::Lazy;
use std::sync::Arc;

pub const URL: &str = "urn:tagvm:digits";

static DIGITS: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"\d+").unwrap());

/// A self-closing `Number` token.
pub fn number() -> Matcher {
    Matcher::token("Number", SourcePattern::Pattern(DIGITS.clone()))
}

pub fn document() -> Matcher {
    Matcher::node("Numeral")
}

pub fn grammar() -> Grammar {
    Grammar::builder()
        .node("Number")
        .cover("Numeral", ["Number"])
        .production(
            "Numeral",
            Script::returning_rule(Vec::new(), Instruction::eat(number())),
        )
        .build()
}

pub fn language() -> Arc<Language> {
    Arc::new(Language::new(URL, grammar()))
}
