//! Ask command handler.
//!
//! Retrieves passages for a question and streams a grounded answer.

use clap::Args;
use futures::StreamExt;
use pdfchat_core::{config::AppConfig, AppError, AppResult};
use pdfchat_knowledge::{Citation, GenerationEvent, KnowledgeBase};
use std::io::Write;

/// Ask a question about the indexed documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Number of passages to retrieve
    #[arg(short = 'k', long)]
    pub k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let kb = KnowledgeBase::open(config).await?;
        let mut stream = kb.ask(&self.question, self.k).await?;

        let mut citations: Vec<Citation> = Vec::new();
        let mut answer = String::new();
        let mut done = false;

        while let Some(event) = stream.next().await {
            match event? {
                GenerationEvent::Citations(manifest) => {
                    tracing::debug!("Answering from {} passages", manifest.len());
                    citations = manifest;
                }
                GenerationEvent::Text(text) => {
                    if !self.json {
                        print!("{}", text);
                        std::io::stdout().flush().ok();
                    }
                    answer.push_str(&text);
                }
                GenerationEvent::Done => {
                    done = true;
                    break;
                }
            }
        }

        if !done {
            return Err(AppError::Generation(
                "Answer stream ended before completion".to_string(),
            ));
        }

        if self.json {
            let output = serde_json::json!({
                "question": self.question,
                "answer": answer,
                "citations": citations,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else if !answer.ends_with('\n') {
            println!();
        }

        Ok(())
    }
}
