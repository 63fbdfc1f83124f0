//! Serve command handler.

use crate::server;
use clap::Args;
use pdfchat_core::{config::AppConfig, AppResult};
use pdfchat_knowledge::KnowledgeBase;

/// Serve the HTTP API
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let host = self.host.as_deref().unwrap_or(&config.host);
        let port = self.port.unwrap_or(config.port);

        let kb = KnowledgeBase::open(config).await?;
        server::serve(kb, host, port).await
    }
}
