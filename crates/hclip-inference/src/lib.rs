//! Generative model access for highlight selection.
//!
//! The model is a GGUF artifact served by a `llama-server` child process.
//! [`SharedModel`] loads it once per process on first use and hands out a
//! shared [`ModelHandle`] whose `complete` calls are serialized.

pub mod config;
pub mod engine;
pub mod error;
pub mod handle;
pub mod llama_server;
pub mod types;

pub use config::ModelConfig;
pub use engine::InferenceEngine;
pub use error::{InferenceError, InferenceResult};
pub use handle::{ModelHandle, ModelLoader, SharedModel};
pub use llama_server::{LlamaServerEngine, LlamaServerLoader};
pub use types::{ChatMessage, CompletionRequest};
