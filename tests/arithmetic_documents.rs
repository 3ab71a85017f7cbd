//! Whole documents in the built-in languages
//!
//! Each case parses a document end to end and checks the shape of the rebuilt tree. The
//! tag stream must always be well formed and must reproduce the input exactly.

use rstest::rstest;
use tagvm::vm::formats::to_tags_str;
use tagvm::vm::grammars::{arithmetic, digits};
use tagvm::vm::testing::assert_tags;
use tagvm::vm::tree;
use tagvm::vm::{parse, Input, VmError};

fn parse_arithmetic(text: &str) -> Result<tagvm::vm::Parse, VmError> {
    parse(
        arithmetic::language(),
        arithmetic::document(),
        Input::from_template(text),
    )
}

#[rstest]
#[case("42", "Number")]
#[case(" 7 ", "Number")]
#[case("1 + 2", "Binary")]
#[case("1 - 2 * 3", "Binary")]
#[case("(1)", "Group")]
#[case("( 1 + 2 )", "Group")]
#[case("[1, 2]", "List")]
#[case("[ ]", "List")]
#[case("[1, [2, 3], (4)]", "List")]
#[case("${}", "Gap")]
#[case("(${}) - ${}", "Binary")]
#[case("(${} / 0)", "Group")]
#[case("[0, ${} + 1]", "List")]
fn parses_expressions(#[case] text: &str, #[case] expected: &str) {
    let parse = parse_arithmetic(text).unwrap();
    assert_tags(&parse.tags).well_formed().source_text(text);

    let fragment = tree::build(&parse.tags).unwrap();
    let program = fragment.node(".").unwrap();
    assert_eq!(program.node_type, "Program");
    let found = match program.get("expression").unwrap() {
        tree::Value::Node(node) => node.node_type.as_str(),
        tree::Value::Gap => "Gap",
        other => panic!("unexpected expression value {:?}", other),
    };
    assert_eq!(found, expected);
    assert_eq!(parse.range.text, text.replace("${}", ""));
}

#[rstest]
#[case("", VmError::ParseFailed { consumed: 0 })]
#[case(")", VmError::ParseFailed { consumed: 0 })]
#[case("1 +", VmError::ParseFailed { consumed: 3 })]
#[case("1 2", VmError::IncompleteConsumption { consumed: 2, total: 3 })]
#[case("(1", VmError::ParseFailed { consumed: 2 })]
fn rejects_malformed_expressions(#[case] text: &str, #[case] expected: VmError) {
    assert_eq!(parse_arithmetic(text).unwrap_err(), expected);
}

#[rstest]
#[case("42", Ok(()))]
#[case("4a", Err(VmError::IncompleteConsumption { consumed: 1, total: 2 }))]
#[case("a", Err(VmError::ParseFailed { consumed: 0 }))]
fn digits_documents(#[case] text: &str, #[case] expected: Result<(), VmError>) {
    let result = parse(digits::language(), digits::document(), Input::new(text));
    assert_eq!(result.map(|_| ()), expected);
}

#[test]
fn tags_for_a_binary_expression() {
    let parse = parse_arithmetic("1 + 2").unwrap();
    insta::assert_snapshot!(to_tags_str(&parse.tags), @r###"
    <!doctype urn:tagvm:arithmetic>
    <$>
      .:
      <Program>
        expression:
        <*Number>
          "1"
        </>
        ^^^ left
        <Binary>
          " "
          operator:
          <*Operator>
            "+"
          </>
          " "
          right:
          <*Number>
            "2"
          </>
        </>
      </>
    </>
    "###);
}

#[test]
fn numbers_keep_their_own_language() {
    let parse = parse_arithmetic("[1]").unwrap();
    let languages: Vec<&str> = parse
        .tags
        .iter()
        .filter_map(|tag| match tag {
            tagvm::vm::Tag::OpenNode { language, .. } => Some(language.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(languages, vec![arithmetic::URL, arithmetic::URL, digits::URL]);
}
