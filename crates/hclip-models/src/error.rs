//! Model validation errors.

use thiserror::Error;

use crate::asset::AssetState;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid time range: start={start}, end={end}")]
    InvalidRange { start: f64, end: f64 },

    #[error("Invalid target duration: {0}")]
    InvalidDuration(f64),

    #[error("Invalid asset transition: {from} -> {to}")]
    InvalidTransition { from: AssetState, to: AssetState },
}
