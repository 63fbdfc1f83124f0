//! Grounded answering over retrieved passages.
//!
//! Turns a retrieval result into a streamed, citation-consistent answer.

pub mod citations;
pub mod generator;
pub mod types;

pub use citations::CitationReconciler;
pub use generator::{GenerationStream, GroundedGenerator};
pub use types::{Citation, GenerationEvent, DONE_SENTINEL};
