//! Instructions yielded by productions and the effects policy attached to each verb

use super::matcher::Matcher;
use std::fmt;

/// What happens to a successful match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnSuccess {
    Keep,
    Discard,
}

/// What happens to a failed match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    Abort,
    Null,
}

/// The {success, failure} policy governing a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effects {
    pub success: OnSuccess,
    pub failure: OnFailure,
}

impl Effects {
    pub const EAT: Effects = Effects {
        success: OnSuccess::Keep,
        failure: OnFailure::Abort,
    };

    pub fn for_verb(verb: Verb) -> Self {
        let (success, failure) = match verb {
            Verb::Eat | Verb::HoldFor => (OnSuccess::Keep, OnFailure::Abort),
            Verb::EatMatch | Verb::HoldForMatch => (OnSuccess::Keep, OnFailure::Null),
            Verb::Match => (OnSuccess::Discard, OnFailure::Null),
            Verb::Guard => (OnSuccess::Discard, OnFailure::Abort),
        };
        Effects { success, failure }
    }

    /// Whether matching under these effects needs a speculative sub-state of the source.
    pub fn branches(&self) -> bool {
        self.success == OnSuccess::Discard || self.failure == OnFailure::Null
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Eat,
    EatMatch,
    Match,
    Guard,
    HoldFor,
    HoldForMatch,
}

impl Verb {
    pub fn is_hold(&self) -> bool {
        matches!(self, Verb::HoldFor | Verb::HoldForMatch)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Eat => "eat",
            Verb::EatMatch => "eatMatch",
            Verb::Match => "match",
            Verb::Guard => "guard",
            Verb::HoldFor => "holdFor",
            Verb::HoldForMatch => "holdForMatch",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Treat a node type as a plain production: no reference, no open/close tags.
    pub suppress_node: bool,
    /// Recurse into the production even when the source sits at an interpolation point.
    pub suppress_gap: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Match {
        verb: Verb,
        matcher: Matcher,
        props: Option<serde_json::Value>,
        options: MatchOptions,
    },
    Fail,
    Write {
        text: String,
        options: Option<serde_json::Value>,
    },
    OpenSpan(String),
    CloseSpan(String),
    BindAttribute {
        key: String,
        value: serde_json::Value,
    },
}

impl Instruction {
    pub fn with_verb(verb: Verb, matcher: Matcher) -> Self {
        Instruction::Match {
            verb,
            matcher,
            props: None,
            options: MatchOptions::default(),
        }
    }

    pub fn eat(matcher: Matcher) -> Self {
        Self::with_verb(Verb::Eat, matcher)
    }

    pub fn eat_match(matcher: Matcher) -> Self {
        Self::with_verb(Verb::EatMatch, matcher)
    }

    pub fn peek(matcher: Matcher) -> Self {
        Self::with_verb(Verb::Match, matcher)
    }

    pub fn guard(matcher: Matcher) -> Self {
        Self::with_verb(Verb::Guard, matcher)
    }

    pub fn hold_for(matcher: Matcher) -> Self {
        Self::with_verb(Verb::HoldFor, matcher)
    }

    pub fn hold_for_match(matcher: Matcher) -> Self {
        Self::with_verb(Verb::HoldForMatch, matcher)
    }

    pub fn write(text: impl Into<String>) -> Self {
        Instruction::Write {
            text: text.into(),
            options: None,
        }
    }

    pub fn bind_attribute(key: impl Into<String>, value: serde_json::Value) -> Self {
        Instruction::BindAttribute {
            key: key.into(),
            value,
        }
    }

    /// Attach a props payload handed to the invoked production.
    pub fn with_props(mut self, value: serde_json::Value) -> Self {
        if let Instruction::Match { props, .. } = &mut self {
            *props = Some(value);
        }
        self
    }

    pub fn with_options(mut self, new_options: MatchOptions) -> Self {
        if let Instruction::Match { options, .. } = &mut self {
            *options = new_options;
        }
        self
    }

    pub fn verb_name(&self) -> &'static str {
        match self {
            Instruction::Match { verb, .. } => verb.as_str(),
            Instruction::Fail => "fail",
            Instruction::Write { .. } => "write",
            Instruction::OpenSpan(_) => "openSpan",
            Instruction::CloseSpan(_) => "closeSpan",
            Instruction::BindAttribute { .. } => "bindAttribute",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Match { verb, matcher, .. } => write!(f, "{}({})", verb, matcher),
            Instruction::Write { text, .. } => write!(f, "write({:?})", text),
            Instruction::OpenSpan(name) | Instruction::CloseSpan(name) => {
                write!(f, "{}({})", self.verb_name(), name)
            }
            Instruction::BindAttribute { key, value } => {
                write!(f, "bindAttribute({}, {})", key, value)
            }
            Instruction::Fail => write!(f, "fail()"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_effects_table() {
        let eat = Effects::for_verb(Verb::Eat);
        assert_eq!((eat.success, eat.failure), (OnSuccess::Keep, OnFailure::Abort));
        assert!(!eat.branches());

        let eat_match = Effects::for_verb(Verb::EatMatch);
        assert_eq!(eat_match.failure, OnFailure::Null);
        assert!(eat_match.branches());

        let peek = Effects::for_verb(Verb::Match);
        assert_eq!((peek.success, peek.failure), (OnSuccess::Discard, OnFailure::Null));

        let guard = Effects::for_verb(Verb::Guard);
        assert_eq!((guard.success, guard.failure), (OnSuccess::Discard, OnFailure::Abort));
        assert!(guard.branches());

        assert_eq!(Effects::for_verb(Verb::HoldFor), Effects::EAT);
        assert_eq!(Effects::for_verb(Verb::HoldForMatch), eat_match);
    }

    #[test]
    fn display_names_verb_and_matcher() {
        let instr = Instruction::eat_match(Matcher::node("Number").named("value"));
        assert_eq!(instr.to_string(), "eatMatch(value: <Number>)");
        assert_eq!(Instruction::Fail.verb_name(), "fail");
    }
}
