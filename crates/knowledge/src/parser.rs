//! Source document discovery and text extraction.

use crate::types::ExtractedDocument;
use async_trait::async_trait;
use pdfchat_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Page separator emitted by `pdf-extract`.
const FORM_FEED: char = '\x0c';

/// Upper bound for extracting a single PDF.
const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Turns a source file into per-page text.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Whether this extractor handles the given path.
    fn supports(&self, path: &Path) -> bool;

    /// Extract the pages of one document.
    async fn extract(&self, path: &Path) -> AppResult<ExtractedDocument>;
}

/// PDF extraction backed by `pdf-extract`.
#[derive(Debug, Clone, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    fn supports(&self, path: &Path) -> bool {
        has_pdf_extension(path)
    }

    async fn extract(&self, path: &Path) -> AppResult<ExtractedDocument> {
        let filename = file_name(path)?;
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::Extraction(format!("Failed to read {}: {}", filename, e)))?;

        // pdf-extract is synchronous and may panic on malformed fonts
        let task = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data));

        let text = match tokio::time::timeout(EXTRACTION_TIMEOUT, task).await {
            Ok(Ok(Ok(text))) => text,
            Ok(Ok(Err(e))) => {
                return Err(AppError::Extraction(format!(
                    "Failed to parse {}: {}",
                    filename, e
                )))
            }
            Ok(Err(join_err)) => {
                return Err(AppError::Extraction(format!(
                    "PDF parser crashed on {}: {}",
                    filename, join_err
                )))
            }
            Err(_) => {
                return Err(AppError::Extraction(format!(
                    "Timed out after {}s extracting {}",
                    EXTRACTION_TIMEOUT.as_secs(),
                    filename
                )))
            }
        };

        let document = split_pages(&filename, &text);
        tracing::debug!(
            file = %filename,
            pages = document.pages.len(),
            chars = text.len(),
            "Extracted PDF"
        );

        Ok(document)
    }
}

/// Split extracted text into pages on form feeds.
pub fn split_pages(filename: &str, text: &str) -> ExtractedDocument {
    let mut pages: Vec<&str> = text.split(FORM_FEED).collect();

    // A trailing form feed closes the last page rather than opening a new one
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }

    ExtractedDocument::from_pages(filename, pages)
}

/// Find the documents in `source_dir` that `extractor` can read.
///
/// The scan is not recursive. Results are sorted by path so builds see
/// documents in a stable order. A missing directory yields no documents.
pub fn discover_documents(
    source_dir: &Path,
    extractor: &dyn DocumentExtractor,
) -> AppResult<Vec<PathBuf>> {
    if !source_dir.exists() {
        tracing::warn!("Source directory does not exist: {:?}", source_dir);
        return Ok(Vec::new());
    }

    let mut documents = Vec::new();
    for entry in walkdir::WalkDir::new(source_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            AppError::Extraction(format!("Failed to scan {:?}: {}", source_dir, e))
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && extractor.supports(path) {
            documents.push(path.to_path_buf());
        }
    }

    documents.sort();
    Ok(documents)
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// File name used as the document identity.
pub(crate) fn file_name(path: &Path) -> AppResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::Extraction(format!("Invalid file name: {:?}", path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_split_pages_on_form_feed() {
        let doc = split_pages("a.pdf", "first page\x0csecond page\x0c");
        assert_eq!(doc.filename, "a.pdf");
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[0].page_number, 1);
        assert_eq!(doc.pages[1].raw_text, "second page");
    }

    #[test]
    fn test_split_pages_keeps_blank_interior_pages() {
        let doc = split_pages("a.pdf", "one\x0c\x0cthree");
        assert_eq!(doc.pages.len(), 3);
        assert_eq!(doc.pages[2].page_number, 3);
    }

    #[test]
    fn test_supports_pdf_case_insensitive() {
        let extractor = PdfExtractor::new();
        assert!(extractor.supports(Path::new("a.pdf")));
        assert!(extractor.supports(Path::new("B.PDF")));
        assert!(!extractor.supports(Path::new("notes.txt")));
        assert!(!extractor.supports(Path::new("pdf")));
    }

    #[test]
    fn test_discover_documents_sorted_and_flat() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.pdf"), b"x").unwrap();
        fs::write(temp.path().join("A.PDF"), b"x").unwrap();
        fs::write(temp.path().join("readme.txt"), b"x").unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("nested").join("c.pdf"), b"x").unwrap();

        let docs = discover_documents(temp.path(), &PdfExtractor::new()).unwrap();
        let names: Vec<_> = docs
            .iter()
            .map(|p| file_name(p).unwrap())
            .collect();

        assert_eq!(names, vec!["A.PDF".to_string(), "b.pdf".to_string()]);
    }

    #[test]
    fn test_discover_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let docs = discover_documents(&temp.path().join("missing"), &PdfExtractor::new()).unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_extract_invalid_pdf_is_extraction_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.pdf");
        fs::write(&path, b"this is not a pdf").unwrap();

        let result = PdfExtractor::new().extract(&path).await;
        assert!(matches!(result, Err(AppError::Extraction(_))));
    }
}
