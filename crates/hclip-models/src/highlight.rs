//! Highlight models shared with the generative model.
//!
//! `HighlightSelectionResult` is the response contract for highlight
//! selection: its JSON schema is sent with every inference request, and the
//! model's answer is parsed back into it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// A single candidate highlight window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HighlightCandidate {
    /// Start time of the highlight in seconds
    pub start_time: f64,

    /// End time of the highlight in seconds
    pub end_time: f64,

    /// Brief summary of why this segment was selected
    pub summary: String,

    /// Detailed reasoning for the selection
    pub reason: String,
}

impl HighlightCandidate {
    pub fn new(
        start_time: f64,
        end_time: f64,
        summary: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            start_time,
            end_time,
            summary: summary.into(),
            reason: reason.into(),
        }
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Check the window is finite and ends after it starts.
    pub fn validate(&self) -> ModelResult<()> {
        if !self.start_time.is_finite()
            || !self.end_time.is_finite()
            || self.end_time <= self.start_time
        {
            return Err(ModelError::InvalidRange {
                start: self.start_time,
                end: self.end_time,
            });
        }
        Ok(())
    }
}

/// Response model for highlight analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HighlightSelectionResult {
    /// List of identified highlights options
    pub highlights: Vec<HighlightCandidate>,
}

impl HighlightSelectionResult {
    pub fn new(highlights: Vec<HighlightCandidate>) -> Self {
        Self { highlights }
    }

    /// JSON schema of this type, as sent in the inference request.
    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(HighlightSelectionResult);
        serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
    }

    /// First candidate, if any.
    pub fn first(&self) -> Option<&HighlightCandidate> {
        self.highlights.first()
    }

    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty()
    }
}
