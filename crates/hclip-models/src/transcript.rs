//! Transcript models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A timestamped unit of recognized speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Recognized text
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Render as a `[start-end] text` line.
    pub fn to_line(&self) -> String {
        format!("[{:.2}-{:.2}] {}", self.start, self.end, self.text.trim())
    }
}
