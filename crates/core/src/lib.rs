//! pdfchat Core Library
//!
//! This crate provides the foundational utilities shared by every pdfchat crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, CliOverrides, EmbeddingSettings, LlmSettings, LogFormat};
pub use error::{AppError, AppResult};
