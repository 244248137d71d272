//! Structured run logging.

use tracing::{error, info, warn, Span};

/// Logger carrying a run's ID and operation on every event.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    operation: String,
}

impl RunLogger {
    pub fn new(run_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            operation: operation.into(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run warning: {}", message
        );
    }

    /// Log a failed run with its stage and error code.
    pub fn log_failure(&self, stage: &str, code: &str, detail: &str) {
        error!(
            run_id = %self.run_id,
            operation = %self.operation,
            stage = stage,
            code = code,
            "Run failed: {}", detail
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span grouping every event of the run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            run_id = %self.run_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_fields() {
        let logger = RunLogger::new("3f2a", "highlight");
        assert_eq!(logger.run_id(), "3f2a");
        assert_eq!(logger.operation(), "highlight");
    }
}
