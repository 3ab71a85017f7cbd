//! Arithmetic expressions over `digits` numbers
//!
//! ```text
//! Program    := _ expression:Expression _
//! Expression := Atom (^^^ left: Chain)?           cover
//! Chain      := Binary (^^^ left: Chain)?         cover
//! Binary     := _ operator:Operator _ right:Atom  node
//! Atom       := Group | List | digits:Numeral     cover
//! Group      := "(" _ expression:Expression _ ")"
//! List       := "[" _ items[]:(Expression _ ("," _)?)* "]"
//! ```
//!
//! Operators share one precedence level and associate to the left: after each operand the
//! expression holds the finished node and continues with a `Binary` that adopts it as its
//! `left` child. Interpolation points are accepted where an `Atom` is expected, so a gap can
//! start an expression inside a group or list and still be followed by an operator.

use crate::vm::grammars::digits;
use crate::vm::instruction::Instruction;
use crate::vm::language::{Grammar, Language};
use crate::vm::matcher::{Matcher, Pattern, SourcePattern};
use crate::vm::production::{rule, steps, Script, Step};
use once_cell::sync::Lazy;
use std::sync::Arc;

pub const URL: &str = "urn:tagvm:arithmetic";

static WHITESPACE: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"[ \t\r\n]*").unwrap());
static OPERATOR: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"[-+*/]").unwrap());
static OPERATOR_AHEAD: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"[ \t\r\n]*[-+*/]").unwrap());

fn whitespace() -> Instruction {
    Instruction::eat(Matcher::regex(WHITESPACE.clone()))
}

fn operator_ahead() -> Instruction {
    Instruction::peek(Matcher::regex(OPERATOR_AHEAD.clone()))
}

fn hold_chain() -> Instruction {
    Instruction::hold_for(Matcher::node("Chain").named("left"))
}

/// The matcher for a whole document: an expression with surrounding whitespace.
pub fn document() -> Matcher {
    Matcher::node("Program")
}

pub fn expression() -> Matcher {
    Matcher::node("Expression")
}

pub fn grammar() -> Grammar {
    Grammar::builder()
        .node("Program")
        .node("Binary")
        .node("Operator")
        .node("Group")
        .node("List")
        .cover("Expression", ["Binary", "Group", "List", "Number"])
        .cover("Chain", ["Binary"])
        .cover("Atom", ["Group", "List", "Number"])
        .production(
            "Program",
            Script::rule(vec![
                whitespace(),
                Instruction::eat(expression().named("expression")),
                whitespace(),
            ]),
        )
        .production(
            "Expression",
            rule(|_| {
                steps(0u8, |state, cx, input| {
                    *state += 1;
                    match *state {
                        1 => Step::Yield(Instruction::eat(Matcher::node("Atom").allow_gap())),
                        2 if cx.at_end() => Step::Return(None),
                        2 => Step::Yield(operator_ahead()),
                        _ => Step::Return(input.map(|_| hold_chain())),
                    }
                })
            }),
        )
        .production(
            "Chain",
            rule(|_| {
                steps(0u8, |state, cx, input| {
                    *state += 1;
                    match *state {
                        1 => Step::Yield(Instruction::eat(Matcher::node("Binary"))),
                        2 if cx.at_end() => Step::Return(None),
                        2 => Step::Yield(operator_ahead()),
                        _ => Step::Return(input.map(|_| hold_chain())),
                    }
                })
            }),
        )
        .production(
            "Binary",
            Script::rule(vec![
                whitespace(),
                Instruction::eat(
                    Matcher::token("Operator", SourcePattern::Pattern(OPERATOR.clone()))
                        .named("operator"),
                ),
                whitespace(),
                Instruction::eat(Matcher::node("Atom").named("right").allow_gap()),
            ]),
        )
        .production(
            "Atom",
            rule(|_| {
                steps(0u8, |state, _cx, input| {
                    *state += 1;
                    match (*state, input.is_some()) {
                        (1, _) => Step::Yield(Instruction::peek(Matcher::literal("("))),
                        (2, true) => Step::Return(Some(Instruction::eat(Matcher::node("Group")))),
                        (2, false) => Step::Yield(Instruction::peek(Matcher::literal("["))),
                        (3, true) => Step::Return(Some(Instruction::eat(Matcher::node("List")))),
                        _ => Step::Return(Some(Instruction::eat(
                            Matcher::node("Numeral").in_language("digits"),
                        ))),
                    }
                })
            }),
        )
        .production(
            "Group",
            Script::returning_rule(
                vec![
                    Instruction::eat(Matcher::literal("(")),
                    whitespace(),
                    Instruction::eat(expression().named("expression")),
                    whitespace(),
                ],
                Instruction::eat(Matcher::literal(")")),
            ),
        )
        .production("List", rule(|_| list()))
        .build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListState {
    Open,
    Space,
    Slot,
    Item,
    AfterItem,
    Separator,
    AfterSeparator,
    Done,
}

fn list() -> Box<dyn crate::vm::production::Production> {
    steps(ListState::Open, |state, _cx, input| {
        let close = || Step::Return(Some(Instruction::eat(Matcher::literal("]"))));
        match *state {
            ListState::Open => {
                *state = ListState::Space;
                Step::Yield(Instruction::eat(Matcher::literal("[")))
            }
            ListState::Space => {
                *state = ListState::Slot;
                Step::Yield(whitespace())
            }
            ListState::Slot => {
                *state = ListState::Item;
                Step::Yield(Instruction::eat(Matcher::array().in_array("items")))
            }
            ListState::Item => {
                *state = ListState::AfterItem;
                Step::Yield(Instruction::eat_match(expression().in_array("items")))
            }
            ListState::AfterItem if input.is_some() => {
                *state = ListState::Separator;
                Step::Yield(whitespace())
            }
            ListState::Separator => {
                *state = ListState::AfterSeparator;
                Step::Yield(Instruction::eat_match(Matcher::literal(",")))
            }
            ListState::AfterSeparator if input.is_some() => {
                *state = ListState::Item;
                Step::Yield(whitespace())
            }
            ListState::AfterItem | ListState::AfterSeparator => {
                *state = ListState::Done;
                close()
            }
            ListState::Done => Step::Return(None),
        }
    })
}

pub fn language() -> Arc<Language> {
    Arc::new(Language::new(URL, grammar()).with_dependency("digits", digits::language()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::source::Input;
    use crate::vm::tree::{self, Value};
    use crate::vm::{parse, VmError};

    fn tree_of(text: &str) -> tree::Node {
        let parse = parse(language(), document(), Input::from_template(text)).unwrap();
        tree::build(&parse.tags).unwrap()
    }

    #[test]
    fn numbers_come_from_digits() {
        let fragment = tree_of("42");
        let program = fragment.node(".").unwrap();
        let number = program.node("expression").unwrap();
        assert_eq!(number.node_type, "Number");
        assert_eq!(number.language, digits::URL);
        assert!(number.flags.token);
    }

    #[test]
    fn operators_associate_left() {
        let fragment = tree_of("1 - 2 - 3");
        let outer = fragment.node(".").unwrap().node("expression").unwrap();
        assert_eq!(outer.node_type, "Binary");
        assert_eq!(outer.node("right").unwrap().source_text(), "3");

        let inner = outer.node("left").unwrap();
        assert_eq!(inner.node_type, "Binary");
        assert_eq!(inner.node("left").unwrap().source_text(), "1");
        assert_eq!(inner.node("operator").unwrap().source_text(), "-");
        assert_eq!(fragment.source_text(), "1 - 2 - 3");
    }

    #[test]
    fn groups_nest() {
        let fragment = tree_of("(1 + 2) * 3");
        let binary = fragment.node(".").unwrap().node("expression").unwrap();
        let group = binary.node("left").unwrap();
        assert_eq!(group.node_type, "Group");
        assert_eq!(group.node("expression").unwrap().node_type, "Binary");
    }

    #[test]
    fn lists_fill_an_array_slot() {
        let fragment = tree_of("[1, 2 + 3, 4]");
        let list = fragment.node(".").unwrap().node("expression").unwrap();
        assert_eq!(list.node_type, "List");
        assert!(list.has_array("items"));
        let items: Vec<_> = list
            .values("items")
            .map(|value| match value {
                Value::Node(node) => node.node_type.as_str(),
                _ => "?",
            })
            .collect();
        assert_eq!(items, vec!["Number", "Binary", "Number"]);
    }

    #[test]
    fn empty_list_still_declares_its_slot() {
        let fragment = tree_of("[]");
        let list = fragment.node(".").unwrap().node("expression").unwrap();
        assert!(list.has_array("items"));
        assert_eq!(list.values("items").count(), 0);
    }

    #[test]
    fn gaps_fill_operands() {
        let fragment = tree_of("${} + 1");
        let binary = fragment.node(".").unwrap().node("expression").unwrap();
        assert_eq!(binary.get("left"), Some(&Value::Gap));
        assert_eq!(fragment.source_text(), "${} + 1");
    }

    #[test]
    fn gaps_open_nested_expressions() {
        let fragment = tree_of("(${} / 0)");
        let group = fragment.node(".").unwrap().node("expression").unwrap();
        assert_eq!(group.node_type, "Group");
        let binary = group.node("expression").unwrap();
        assert_eq!(binary.node_type, "Binary");
        assert_eq!(binary.get("left"), Some(&Value::Gap));

        let fragment = tree_of("[0, ${} + 1]");
        let list = fragment.node(".").unwrap().node("expression").unwrap();
        let items: Vec<_> = list
            .values("items")
            .map(|value| match value {
                Value::Node(node) => node.node_type.as_str(),
                _ => "?",
            })
            .collect();
        assert_eq!(items, vec!["Number", "Binary"]);
        assert_eq!(fragment.source_text(), "[0, ${} + 1]");
    }

    #[test]
    fn trailing_operator_fails() {
        let err = parse(language(), document(), Input::new("1 +")).unwrap_err();
        assert_eq!(err, VmError::ParseFailed { consumed: 3 });
    }
}
