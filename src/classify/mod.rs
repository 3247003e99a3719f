//! Text classification through a hosted API that picks a folder per message.

pub mod cohere;
pub mod examples;

pub use cohere::CohereClassifier;
pub use examples::{ClassifyExample, load_examples, validate_examples};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::CLASSIFY_MAX_INPUTS;
use crate::error::ClassifyError;

/// Predicted label for one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// The input as echoed back by the API, if it echoes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Predicted label; used verbatim as the destination folder.
    pub prediction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// A text classifier reachable over the network.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Provider name for logs and errors.
    fn name(&self) -> &str;

    /// Largest batch a single `classify` call accepts.
    fn max_inputs(&self) -> usize {
        CLASSIFY_MAX_INPUTS
    }

    /// Classify a batch. Returns exactly one result per input, in order.
    async fn classify(&self, inputs: &[String]) -> Result<Vec<Classification>, ClassifyError>;
}

/// Split items into consecutive batches of at most `max` (a zero limit is
/// treated as one).
pub fn batch_inputs<T>(max: usize, items: &[T]) -> Vec<&[T]> {
    items.chunks(max.max(1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_respect_limit() {
        let items: Vec<u32> = (0..200).collect();
        let batches = batch_inputs(96, &items);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 96);
        assert_eq!(batches[1].len(), 96);
        assert_eq!(batches[2].len(), 8);
        assert_eq!(batches[1][0], 96);
        assert_eq!(batches[2][7], 199);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let items: Vec<u32> = (0..192).collect();
        let batches = batch_inputs(96, &items);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 96));
    }

    #[test]
    fn empty_input_gives_no_batches() {
        let items: Vec<String> = Vec::new();
        assert!(batch_inputs(96, &items).is_empty());
    }

    #[test]
    fn zero_limit_treated_as_one() {
        let items = ["a", "b", "c"];
        assert_eq!(batch_inputs(0, &items).len(), 3);
    }

    #[test]
    fn classification_deserializes_without_optional_fields() {
        let c: Classification = serde_json::from_str(r#"{"prediction":"Banking"}"#).unwrap();
        assert_eq!(c.prediction, "Banking");
        assert!(c.input.is_none());
        assert!(c.confidence.is_none());
    }
}
