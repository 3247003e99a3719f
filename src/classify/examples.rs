//! Labelled examples sent along with every classify request.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The API rejects labels with fewer examples than this.
pub const MIN_EXAMPLES_PER_LABEL: usize = 2;

/// One training example: a text and the folder it belongs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyExample {
    pub text: String,
    pub label: String,
}

/// Read and validate a JSON array of examples.
pub fn load_examples(path: &Path) -> Result<Vec<ClassifyExample>, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let examples: Vec<ClassifyExample> = serde_json::from_str(&raw).map_err(|e| {
        ConfigError::ParseError(format!("{}: {e}", path.display()))
    })?;
    validate_examples(&examples)?;
    Ok(examples)
}

/// Check the examples satisfy the API's constraints.
pub fn validate_examples(examples: &[ClassifyExample]) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: "CLASSIFY_EXAMPLES_PATH".to_string(),
        message,
    };

    if examples.is_empty() {
        return Err(invalid("no classification examples".to_string()));
    }

    let mut per_label: BTreeMap<&str, usize> = BTreeMap::new();
    for example in examples {
        if example.label.trim().is_empty() {
            return Err(invalid(format!("example with empty label: {:?}", example.text)));
        }
        *per_label.entry(example.label.as_str()).or_default() += 1;
    }

    let short: Vec<&str> = per_label
        .iter()
        .filter(|(_, count)| **count < MIN_EXAMPLES_PER_LABEL)
        .map(|(label, _)| *label)
        .collect();
    if !short.is_empty() {
        return Err(invalid(format!(
            "labels need at least {MIN_EXAMPLES_PER_LABEL} examples each: {}",
            short.join(", ")
        )));
    }

    Ok(())
}

/// Distinct labels, sorted. These are the folders messages can land in.
pub fn labels(examples: &[ClassifyExample]) -> Vec<&str> {
    let mut labels: Vec<&str> = examples.iter().map(|e| e.label.as_str()).collect();
    labels.sort_unstable();
    labels.dedup();
    labels
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn example(text: &str, label: &str) -> ClassifyExample {
        ClassifyExample {
            text: text.into(),
            label: label.into(),
        }
    }

    #[test]
    fn valid_set_accepted() {
        let examples = vec![
            example("Your statement is ready", "Banking"),
            example("Transfer received", "Banking"),
            example("50% off everything", "Promotions"),
            example("Flash sale ends tonight", "Promotions"),
        ];
        assert!(validate_examples(&examples).is_ok());
        assert_eq!(labels(&examples), vec!["Banking", "Promotions"]);
    }

    #[test]
    fn empty_set_rejected() {
        assert!(matches!(
            validate_examples(&[]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn single_example_label_rejected() {
        let examples = vec![
            example("Your statement is ready", "Banking"),
            example("Transfer received", "Banking"),
            example("Team offsite agenda", "Work"),
        ];
        let err = validate_examples(&examples).unwrap_err();
        assert!(err.to_string().contains("Work"));
    }

    #[test]
    fn blank_label_rejected() {
        let examples = vec![example("a", " "), example("b", " ")];
        assert!(validate_examples(&examples).is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"text": "Your statement is ready", "label": "Banking"}},
                {{"text": "Transfer received", "label": "Banking"}}
            ]"#
        )
        .unwrap();
        let examples = load_examples(file.path()).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].label, "Banking");
    }

    #[test]
    fn load_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            load_examples(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = load_examples(Path::new("/nonexistent/examples.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
