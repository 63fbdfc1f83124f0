//! Index command handler.
//!
//! Builds the vector index from the source directory.

use clap::Args;
use pdfchat_core::{config::AppConfig, AppResult};
use pdfchat_knowledge::{BuildReport, KnowledgeBase, ProgressReporter, RetrievalResult};
use std::sync::Arc;

/// Characters of each chunk shown for `--test-query`.
const PREVIEW_CHARS: usize = 200;

/// Build or extend the vector index
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// Clear the index before indexing
    #[arg(long)]
    pub overwrite: bool,

    /// Run a retrieval against the fresh index and show the top chunks
    #[arg(long)]
    pub test_query: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!(
            "Executing index command for {:?} (overwrite: {})",
            config.source_path(),
            self.overwrite
        );

        let mut kb = KnowledgeBase::open(config).await?;
        if !self.json {
            kb = kb.with_progress(ProgressReporter::new(Arc::new(|event| {
                eprintln!("{}", event.format_simple());
            })));
        }

        let report = kb.build(self.overwrite).await?;

        let preview = match &self.test_query {
            Some(query) => Some(kb.retrieve(query, None).await?),
            None => None,
        };

        if self.json {
            let output = serde_json::json!({
                "report": report,
                "testQuery": preview,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_report(&report);
            if let Some(result) = &preview {
                print_preview(result);
            }
        }

        Ok(())
    }
}

fn print_report(report: &BuildReport) {
    println!(
        "Indexed {} documents ({} chunks) in {:.2}s{}",
        report.documents_processed,
        report.chunks_created,
        report.duration_secs,
        if report.overwrite { ", index replaced" } else { "" }
    );

    if !report.failures.is_empty() {
        println!("Skipped {} documents:", report.failures.len());
        for failure in &report.failures {
            println!(
                "  - {} ({:?}): {}",
                failure.filename, failure.stage, failure.message
            );
        }
    }
}

fn print_preview(result: &RetrievalResult) {
    println!();
    println!("Top chunks for \"{}\":", result.query);
    if result.is_empty() {
        println!("  (none)");
    }
    for passage in &result.passages {
        println!(
            "[{}] {}, Page {} (score {:.3})",
            passage.citation_id, passage.source_filename, passage.source_page, passage.score
        );
        println!("    {}", preview(&passage.text));
    }
}

/// First characters of a chunk on one line.
fn preview(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out: String = flat.chars().take(PREVIEW_CHARS).collect();
    if flat.chars().count() > PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_and_flattens() {
        assert_eq!(preview("The roof\nwas  replaced."), "The roof was replaced.");

        let long = "x".repeat(250);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 3);
        assert!(shown.ends_with("..."));
    }
}
