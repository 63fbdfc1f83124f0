//! Stats command handler.
//!
//! Shows what the vector index currently holds.

use clap::Args;
use pdfchat_core::{config::AppConfig, AppResult};
use pdfchat_knowledge::KnowledgeBase;

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let kb = KnowledgeBase::open(config).await?;
        let stats = kb.stats().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("Index: {}", config.index_path().display());
        println!("  Records: {}", stats.records);
        match &stats.manifest {
            Some(manifest) => {
                println!("  Embedding: {}", manifest.embedding);
                println!("  Documents: {}", manifest.documents);
                println!("  Chunks: {}", manifest.chunks);
                println!("  Created: {}", manifest.created_at);
                println!("  Updated: {}", manifest.updated_at);
            }
            None => println!("  (never built; run `pdfchat index`)"),
        }

        Ok(())
    }
}
