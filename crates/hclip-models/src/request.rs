//! Highlight request parameters.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Clip length used when the caller does not provide one.
pub const DEFAULT_TARGET_DURATION: f64 = 30.0;

/// Caller parameters for one highlight run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HighlightRequest {
    /// Requested clip length in seconds
    #[serde(default = "default_target_duration")]
    pub target_duration: f64,

    /// Free-text description of the desired content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

fn default_target_duration() -> f64 {
    DEFAULT_TARGET_DURATION
}

impl Default for HighlightRequest {
    fn default() -> Self {
        Self {
            target_duration: DEFAULT_TARGET_DURATION,
            prompt: None,
        }
    }
}

impl HighlightRequest {
    pub fn new(target_duration: f64, prompt: Option<String>) -> Self {
        Self {
            target_duration,
            prompt,
        }
        .normalized_prompt()
    }

    /// Blank prompts carry no intent.
    fn normalized_prompt(mut self) -> Self {
        self.prompt = self
            .prompt
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        self
    }

    /// The user intent, if one was given.
    pub fn intent(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn validate(&self) -> ModelResult<()> {
        if !self.target_duration.is_finite() || self.target_duration <= 0.0 {
            return Err(ModelError::InvalidDuration(self.target_duration));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_prompt_is_none() {
        let req = HighlightRequest::new(30.0, Some("   ".to_string()));
        assert_eq!(req.intent(), None);

        let req = HighlightRequest::new(30.0, Some(" goals ".to_string()));
        assert_eq!(req.intent(), Some("goals"));
    }

    #[test]
    fn test_duration_validation() {
        assert!(HighlightRequest::default().validate().is_ok());
        assert!(HighlightRequest::new(0.0, None).validate().is_err());
        assert!(HighlightRequest::new(-5.0, None).validate().is_err());
        assert!(HighlightRequest::new(f64::NAN, None).validate().is_err());
    }
}
