//! Document chunking.
//!
//! Documents are split into overlapping, size-bounded chunks that keep track
//! of the file and page they came from. Splits prefer paragraph breaks, then
//! sentence ends, then word gaps, and only cut inside a word as a last resort.

mod metadata;
mod pages;
mod splitter;

pub use metadata::calculate_hash;
pub use pages::PageBoundaries;
pub use splitter::{ChunkConfig, Chunker};

use serde::{Deserialize, Serialize};

/// A contiguous slice of a document's concatenated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text content
    pub text: String,

    /// Source document file name
    pub source_filename: String,

    /// Page containing the first character of the chunk
    pub source_page: u32,

    /// Chunk position in document (0-indexed)
    pub position: u32,

    /// Character range in the concatenated document
    pub char_range: (usize, usize),

    /// Characters shared with the previous chunk
    pub overlap_with_predecessor: usize,

    /// SHA-256 hash of chunk text
    pub hash: String,
}

impl Chunk {
    /// Character count of the chunk text.
    pub fn char_count(&self) -> usize {
        self.char_range.1 - self.char_range.0
    }
}
