//! Shared fixtures for unit tests.

use crate::parser::{file_name, split_pages, DocumentExtractor};
use crate::types::ExtractedDocument;
use async_trait::async_trait;
use pdfchat_core::{AppError, AppResult};
use std::path::Path;

/// Reads `.pdf` fixtures that are really UTF-8 text with form-feed page breaks.
#[derive(Debug, Default)]
pub(crate) struct TextPdfExtractor;

#[async_trait]
impl DocumentExtractor for TextPdfExtractor {
    fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
    }

    async fn extract(&self, path: &Path) -> AppResult<ExtractedDocument> {
        let filename = file_name(path)?;
        let bytes = tokio::fs::read(path).await?;
        let text = String::from_utf8(bytes)
            .map_err(|e| AppError::Extraction(format!("{}: {}", filename, e)))?;
        Ok(split_pages(&filename, &text))
    }
}

/// Write a fixture document whose pages are separated by form feeds.
pub(crate) fn write_doc(dir: &Path, name: &str, pages: &[&str]) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), pages.join("\x0c")).unwrap();
}
