//! Overlapping, boundary-aware text splitter.

use super::{calculate_hash, Chunk, PageBoundaries};
use pdfchat_core::{AppError, AppResult};
use unicode_segmentation::UnicodeSegmentation;

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Chunk sizing, both measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> AppResult<Self> {
        if chunk_size == 0 {
            return Err(AppError::Validation(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::Validation(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Splits concatenated document text into chunks.
///
/// Each chunk holds at most `chunk_size` characters and, apart from the
/// first, begins with exactly the last `chunk_overlap` characters of its
/// predecessor. Dropping that prefix from every chunk but the first and
/// joining the rest reproduces the input.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkConfig,
}

/// Break preference, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakKind {
    Paragraph,
    Sentence,
    Word,
    Hard,
}

impl Chunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ChunkConfig {
        self.config
    }

    /// Split `text` into chunks attributed to `source_filename`.
    ///
    /// Blank input yields no chunks.
    pub fn split(&self, text: &str, source_filename: &str, pages: &PageBoundaries) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let total = chars.len();
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut predecessor_end: Option<usize> = None;

        loop {
            let end = if total - start <= size {
                total
            } else {
                let (end, kind) = self.find_break(text, &chars, start);
                tracing::trace!(start, end, ?kind, "Chunk break");
                end
            };

            let slice = &text[byte_at(&chars, text, start)..byte_at(&chars, text, end)];
            chunks.push(Chunk {
                text: slice.to_string(),
                source_filename: source_filename.to_string(),
                source_page: pages.page_at(start),
                position: chunks.len() as u32,
                char_range: (start, end),
                overlap_with_predecessor: predecessor_end.map(|p| p - start).unwrap_or(0),
                hash: calculate_hash(slice),
            });

            if end == total {
                break;
            }
            predecessor_end = Some(end);
            start = end - overlap;
        }

        tracing::debug!(
            source = source_filename,
            chunks = chunks.len(),
            "Split document"
        );

        chunks
    }

    /// Pick the end of the chunk starting at `start`.
    ///
    /// The end always lies in `(start + overlap, start + size]`, so every
    /// chunk contributes new text and the walk terminates.
    fn find_break(&self, text: &str, chars: &[(usize, char)], start: usize) -> (usize, BreakKind) {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let hard_end = start + size;
        let min_end = (start + overlap + 1).max(start + size / 2).min(hard_end);

        let window_start = byte_at(chars, text, start);
        let window = &text[window_start..byte_at(chars, text, hard_end)];
        let to_char = |rel: usize| char_index(chars, text, window_start + rel);

        // Paragraph: just after a blank line
        if let Some(end) = window
            .rmatch_indices("\n\n")
            .next()
            .and_then(|(idx, sep)| to_char(idx + sep.len()))
            .filter(|end| *end >= min_end)
        {
            return (end, BreakKind::Paragraph);
        }

        // Sentence: start of the last sentence inside the window
        if let Some(end) = window
            .split_sentence_bound_indices()
            .map(|(idx, _)| idx)
            .filter(|idx| *idx > 0)
            .last()
            .and_then(to_char)
            .filter(|end| *end >= min_end)
        {
            return (end, BreakKind::Sentence);
        }

        // Word: just after whitespace
        if let Some(end) = (min_end..=hard_end)
            .rev()
            .find(|p| chars[p - 1].1.is_whitespace())
        {
            return (end, BreakKind::Word);
        }

        (hard_end, BreakKind::Hard)
    }
}

/// Byte offset of the character at `idx`, or the text length past the end.
fn byte_at(chars: &[(usize, char)], text: &str, idx: usize) -> usize {
    chars.get(idx).map(|(b, _)| *b).unwrap_or(text.len())
}

/// Character index of a byte offset that falls on a character boundary.
fn char_index(chars: &[(usize, char)], text: &str, byte: usize) -> Option<usize> {
    if byte == text.len() {
        return Some(chars.len());
    }
    chars.binary_search_by_key(&byte, |(b, _)| *b).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkConfig::new(size, overlap).unwrap())
    }

    fn sample_text() -> String {
        let mut text = String::new();
        for paragraph in 0..12 {
            for sentence in 0..(3 + paragraph % 4) {
                text.push_str(&format!(
                    "Paragraph {} sentence {} talks about the roof, the gutters and the attic insulation. ",
                    paragraph, sentence
                ));
            }
            text.push_str("\n\n");
        }
        text
    }

    fn reconstruct(chunks: &[Chunk]) -> String {
        let mut out = String::new();
        for chunk in chunks {
            out.extend(chunk.text.chars().skip(chunk.overlap_with_predecessor));
        }
        out
    }

    fn assert_chunk_properties(text: &str, chunks: &[Chunk], size: usize, overlap: usize) {
        assert!(!chunks.is_empty());
        for chunk in chunks {
            assert!(chunk.text.chars().count() <= size);
            assert_eq!(chunk.char_count(), chunk.text.chars().count());
        }
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let next: Vec<char> = pair[1].text.chars().collect();
            assert_eq!(pair[1].overlap_with_predecessor, overlap);
            assert_eq!(&prev[prev.len() - overlap..], &next[..overlap]);
        }
        assert_eq!(chunks[0].overlap_with_predecessor, 0);
        assert_eq!(reconstruct(chunks), text);
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let chunks = Chunker::default().split("", "a.pdf", &PageBoundaries::single_page());
        assert!(chunks.is_empty());
        let chunks = Chunker::default().split(" \n\n ", "a.pdf", &PageBoundaries::single_page());
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let text = "The roof was replaced in 2020.";
        let chunks = Chunker::default().split(text, "roof.pdf", &PageBoundaries::single_page());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].source_filename, "roof.pdf");
        assert_eq!(chunks[0].source_page, 1);
        assert_eq!(chunks[0].position, 0);
        assert_eq!(chunks[0].hash, calculate_hash(text));
    }

    #[test]
    fn test_default_sizes_hold_for_structured_text() {
        let text = sample_text();
        let chunks = Chunker::default().split(&text, "a.pdf", &PageBoundaries::single_page());

        assert!(chunks.len() > 3);
        assert_chunk_properties(&text, &chunks, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.position, i as u32);
        }
    }

    #[test]
    fn test_text_without_whitespace_is_hard_split() {
        let text = "x".repeat(2500);
        let chunks = chunker(1000, 200).split(&text, "a.pdf", &PageBoundaries::single_page());

        assert_chunk_properties(&text, &chunks, 1000, 200);
        assert_eq!(chunks[0].text.len(), 1000);
        assert_eq!(chunks[1].char_range, (800, 1800));
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let text = "Dachsanierung für Häuser überprüft. ".repeat(60);
        let chunks = chunker(120, 30).split(&text, "de.pdf", &PageBoundaries::single_page());
        assert_chunk_properties(&text, &chunks, 120, 30);
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let text = format!("{}\n\n{}", "word ".repeat(140), "next ".repeat(120));
        let chunks = chunker(1000, 200).split(&text, "a.pdf", &PageBoundaries::single_page());

        assert!(chunks[0].text.ends_with("\n\n"));
        assert_eq!(chunks[0].char_range.1, 702);
        assert_chunk_properties(&text, &chunks, 1000, 200);
    }

    #[test]
    fn test_prefers_sentence_over_word() {
        let sentence = "The inspector noted that the chimney flashing needs repair soon. ";
        let text = sentence.repeat(30);
        let chunks = chunker(300, 50).split(&text, "a.pdf", &PageBoundaries::single_page());

        assert!(chunks[0].text.ends_with(". "));
        assert_chunk_properties(&text, &chunks, 300, 50);
    }

    #[test]
    fn test_small_overlap_relative_to_size() {
        let text = sample_text();
        let chunks = chunker(64, 8).split(&text, "a.pdf", &PageBoundaries::single_page());
        assert_chunk_properties(&text, &chunks, 64, 8);
    }

    #[test]
    fn test_large_overlap_relative_to_size() {
        let text = sample_text();
        let chunks = chunker(100, 90).split(&text, "a.pdf", &PageBoundaries::single_page());
        assert_chunk_properties(&text, &chunks, 100, 90);
    }

    #[test]
    fn test_chunk_page_is_page_of_first_char() {
        let page_one = "alpha ".repeat(100);
        let page_two = "omega ".repeat(100);
        let text = format!("{}\n\n{}", page_one, page_two);
        let pages = PageBoundaries::new(vec![(0, 1), (page_one.chars().count() + 2, 2)]);

        let chunks = chunker(300, 50).split(&text, "a.pdf", &pages);

        assert_eq!(chunks[0].source_page, 1);
        assert_eq!(chunks.last().unwrap().source_page, 2);
        for chunk in &chunks {
            assert_eq!(chunk.source_page, pages.page_at(chunk.char_range.0));
        }
    }

    #[test]
    fn test_config_rejects_overlap_not_smaller_than_size() {
        assert!(matches!(
            ChunkConfig::new(100, 100),
            Err(AppError::Validation(_))
        ));
        assert!(ChunkConfig::new(0, 0).is_err());
        assert!(ChunkConfig::new(100, 0).is_ok());
    }
}
