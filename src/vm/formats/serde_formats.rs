//! Tag sequences through serde_json and serde_yaml.

use super::registry::{FormatError, Formatter};
use crate::vm::tag::Tag;

pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn name(&self) -> &str {
        "json"
    }

    fn serialize(&self, tags: &[Tag]) -> Result<String, FormatError> {
        serde_json::to_string_pretty(tags)
            .map_err(|err| FormatError::SerializationError(err.to_string()))
    }

    fn description(&self) -> &str {
        "Tag sequence as JSON"
    }
}

pub struct YamlFormatter;

impl Formatter for YamlFormatter {
    fn name(&self) -> &str {
        "yaml"
    }

    fn serialize(&self, tags: &[Tag]) -> Result<String, FormatError> {
        serde_yaml::to_string(tags).map_err(|err| FormatError::SerializationError(err.to_string()))
    }

    fn description(&self) -> &str {
        "Tag sequence as YAML"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trips() {
        let tags = vec![Tag::reference("left", false), Tag::Null];
        let json = JsonFormatter.serialize(&tags).unwrap();
        let back: Vec<Tag> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tags);
    }

    #[test]
    fn yaml_uses_type_field() {
        let yaml = YamlFormatter.serialize(&[Tag::Gap]).unwrap();
        assert!(yaml.contains("type: gap"));
    }
}
