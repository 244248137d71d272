//! Scene boundary model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// A detected visual scene, in seconds from the start of the video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneBoundary {
    pub start: f64,
    pub end: f64,
}

impl SceneBoundary {
    /// Create a boundary; `start` must be strictly before `end`.
    pub fn new(start: f64, end: f64) -> ModelResult<Self> {
        if !start.is_finite() || !end.is_finite() || start < 0.0 || start >= end {
            return Err(ModelError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_boundary_validation() {
        assert!(SceneBoundary::new(0.0, 1.5).is_ok());
        assert!(SceneBoundary::new(2.0, 2.0).is_err());
        assert!(SceneBoundary::new(3.0, 1.0).is_err());
        assert!(SceneBoundary::new(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_scene_duration() {
        let scene = SceneBoundary::new(10.0, 12.5).unwrap();
        assert!((scene.duration() - 2.5).abs() < f64::EPSILON);
    }
}
