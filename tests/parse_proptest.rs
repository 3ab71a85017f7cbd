//! Property-based tests for the evaluator over the arithmetic language
//!
//! Generated expressions must parse into well-formed streams that reproduce their input,
//! and arbitrary input must never panic the evaluator.

use proptest::prelude::*;
use tagvm::vm::grammars::arithmetic;
use tagvm::vm::testing::check_well_formed;
use tagvm::vm::tree;
use tagvm::vm::{parse, Input, Parse, VmError};

fn parse_arithmetic(text: &str) -> Result<Parse, VmError> {
    parse(
        arithmetic::language(),
        arithmetic::document(),
        Input::from_template(text),
    )
}

fn expression() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        4 => "[0-9]{1,3}",
        1 => Just("${}".to_string()),
    ];
    leaf.prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            (inner.clone(), "[-+*/]", inner.clone())
                .prop_map(|(left, op, right)| format!("{} {} {}", left, op, right)),
            inner.clone().prop_map(|e| format!("({})", e)),
            prop::collection::vec(inner, 0..4).prop_map(|items| format!("[{}]", items.join(", "))),
        ]
    })
}

proptest! {
    #[test]
    fn generated_expressions_round_trip(text in expression()) {
        let parse = parse_arithmetic(&text).unwrap();
        prop_assert!(check_well_formed(&parse.tags).is_ok());

        let fragment = tree::build(&parse.tags).unwrap();
        prop_assert_eq!(fragment.source_text(), text);
    }

    #[test]
    fn surrounding_whitespace_is_kept(
        text in expression(),
        before in "[ \n]{0,3}",
        after in "[ \t]{0,3}",
    ) {
        let document = format!("{}{}{}", before, text, after);
        let parse = parse_arithmetic(&document).unwrap();
        let fragment = tree::build(&parse.tags).unwrap();
        prop_assert_eq!(fragment.source_text(), document);
    }

    #[test]
    fn arbitrary_input_never_panics(text in "[0-9+*/() ,\\[\\]-]{0,24}") {
        match parse_arithmetic(&text) {
            Ok(parse) => {
                prop_assert!(check_well_formed(&parse.tags).is_ok());
                prop_assert_eq!(tree::build(&parse.tags).unwrap().source_text(), text);
            }
            Err(err) => {
                let expected = matches!(
                    err,
                    VmError::ParseFailed { .. } | VmError::IncompleteConsumption { .. }
                );
                prop_assert!(expected, "unexpected error {:?}", err);
            }
        }
    }
}
