//! Configuration management for pdfchat.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.pdfchat/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! Later sources override earlier ones. The API credential is only ever read
//! from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers understood by both the generation and the embedding factories.
pub const KNOWN_PROVIDERS: [&str; 3] = ["gemini", "ollama", "mock"];

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse a log format name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Generative model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Provider name ("gemini", "ollama", "mock")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Custom endpoint URL
    pub endpoint: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Maximum tokens to generate per answer
    pub max_tokens: Option<u32>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-1.5-flash".to_string(),
            endpoint: None,
            temperature: Some(0.2),
            max_tokens: None,
        }
    }
}

/// Embedding model settings.
///
/// Provider, model and dimensions together identify the embedding space
/// of an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Provider name ("gemini", "ollama", "mock")
    pub provider: String,

    /// Embedding model identifier
    pub model: String,

    /// Vector dimensionality
    pub dimensions: usize,

    /// Custom endpoint URL
    pub endpoint: Option<String>,

    /// Texts per embedding request
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "text-embedding-004".to_string(),
            dimensions: 768,
            endpoint: None,
            batch_size: 32,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .pdfchat/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Directory scanned for PDF documents
    pub source_dir: PathBuf,

    /// Directory holding the vector index
    pub index_dir: PathBuf,

    /// Generative model settings
    pub llm: LlmSettings,

    /// Embedding model settings
    pub embedding: EmbeddingSettings,

    /// Maximum chunk length in characters
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,

    /// Passages retrieved per question
    pub top_k: usize,

    /// HTTP bind host
    pub host: String,

    /// HTTP bind port
    pub port: u16,

    /// API key for Google services. Never written back to disk.
    #[serde(skip)]
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Log line format
    pub log_format: LogFormat,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    source_dir: Option<String>,
    index_dir: Option<String>,
    llm: Option<LlmSection>,
    embedding: Option<EmbeddingSection>,
    chunking: Option<ChunkingSection>,
    retrieval: Option<RetrievalSection>,
    server: Option<ServerSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmSection {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbeddingSection {
    provider: Option<String>,
    model: Option<String>,
    dimensions: Option<usize>,
    endpoint: Option<String>,
    batch_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkingSection {
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalSection {
    top_k: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    format: Option<LogFormat>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            source_dir: PathBuf::from("data/source_files"),
            index_dir: PathBuf::from("data/vector_db"),
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 3,
            host: "127.0.0.1".to_string(),
            port: 5000,
            api_key: None,
            log_level: None,
            log_format: LogFormat::Text,
            verbose: false,
            no_color: false,
        }
    }
}

/// Command-line overrides, applied last.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub workspace: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub source_dir: Option<PathBuf>,
    pub index_dir: Option<PathBuf>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub embedding_provider: Option<String>,
    pub embedding_model: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub verbose: bool,
    pub no_color: bool,
}

impl AppConfig {
    /// Load configuration from the YAML file, environment variables and defaults.
    ///
    /// Environment variables:
    /// - `PDFCHAT_WORKSPACE`: Override workspace path
    /// - `PDFCHAT_CONFIG`: Path to config file
    /// - `PDFCHAT_SOURCE_DIR`, `PDFCHAT_INDEX_DIR`: Document and index locations
    /// - `PDFCHAT_PROVIDER`, `PDFCHAT_MODEL`: Generative model
    /// - `PDFCHAT_EMBEDDING_PROVIDER`, `PDFCHAT_EMBEDDING_MODEL`: Embedding model
    /// - `PDFCHAT_API_KEY` or `GOOGLE_API_KEY`: API credential
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use pdfchat_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Index: {:?}", config.index_path());
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Load configuration, letting the CLI pick the workspace and config file
    /// before the YAML file is located.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("PDFCHAT_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        if let Ok(config_file) = std::env::var("PDFCHAT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }
        if let Some(config_file) = config_file {
            config.config_file = Some(config_file);
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.pdfchat_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        config.apply_env();
        Ok(config)
    }

    /// Environment variables override YAML config.
    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("PDFCHAT_SOURCE_DIR") {
            self.source_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("PDFCHAT_INDEX_DIR") {
            self.index_dir = PathBuf::from(dir);
        }
        if let Ok(provider) = std::env::var("PDFCHAT_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Ok(model) = std::env::var("PDFCHAT_MODEL") {
            self.llm.model = model;
        }
        if let Ok(provider) = std::env::var("PDFCHAT_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }
        if let Ok(model) = std::env::var("PDFCHAT_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }

        self.api_key = std::env::var("PDFCHAT_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }
        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        Ok(self.merge_file(file))
    }

    fn merge_file(&self, file: ConfigFile) -> Self {
        let mut result = self.clone();

        if let Some(dir) = file.source_dir {
            result.source_dir = PathBuf::from(dir);
        }
        if let Some(dir) = file.index_dir {
            result.index_dir = PathBuf::from(dir);
        }

        if let Some(llm) = file.llm {
            if let Some(provider) = llm.provider {
                result.llm.provider = provider;
            }
            if let Some(model) = llm.model {
                result.llm.model = model;
            }
            if llm.endpoint.is_some() {
                result.llm.endpoint = llm.endpoint;
            }
            if llm.temperature.is_some() {
                result.llm.temperature = llm.temperature;
            }
            if llm.max_tokens.is_some() {
                result.llm.max_tokens = llm.max_tokens;
            }
        }

        if let Some(embedding) = file.embedding {
            if let Some(provider) = embedding.provider {
                result.embedding.provider = provider;
            }
            if let Some(model) = embedding.model {
                result.embedding.model = model;
            }
            if let Some(dimensions) = embedding.dimensions {
                result.embedding.dimensions = dimensions;
            }
            if embedding.endpoint.is_some() {
                result.embedding.endpoint = embedding.endpoint;
            }
            if let Some(batch_size) = embedding.batch_size {
                result.embedding.batch_size = batch_size;
            }
        }

        if let Some(chunking) = file.chunking {
            if let Some(size) = chunking.chunk_size {
                result.chunk_size = size;
            }
            if let Some(overlap) = chunking.chunk_overlap {
                result.chunk_overlap = overlap;
            }
        }

        if let Some(top_k) = file.retrieval.and_then(|r| r.top_k) {
            result.top_k = top_k;
        }

        if let Some(server) = file.server {
            if let Some(host) = server.host {
                result.host = host;
            }
            if let Some(port) = server.port {
                result.port = port;
            }
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        result
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and the
    /// config file.
    pub fn with_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(workspace) = overrides.workspace {
            self.workspace = workspace;
        }
        if let Some(config_file) = overrides.config_file {
            self.config_file = Some(config_file);
        }
        if let Some(dir) = overrides.source_dir {
            self.source_dir = dir;
        }
        if let Some(dir) = overrides.index_dir {
            self.index_dir = dir;
        }
        if let Some(provider) = overrides.provider {
            self.llm.provider = provider;
        }
        if let Some(model) = overrides.model {
            self.llm.model = model;
        }
        if let Some(provider) = overrides.embedding_provider {
            self.embedding.provider = provider;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(log_level) = overrides.log_level {
            self.log_level = Some(log_level);
        }
        if let Some(format) = overrides.log_format {
            self.log_format = format;
        }

        if overrides.verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if overrides.no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .pdfchat directory.
    pub fn pdfchat_dir(&self) -> PathBuf {
        self.workspace.join(".pdfchat")
    }

    /// Directory scanned for documents, resolved against the workspace.
    pub fn source_path(&self) -> PathBuf {
        self.resolve(&self.source_dir)
    }

    /// Vector index directory, resolved against the workspace.
    pub fn index_path(&self) -> PathBuf {
        self.resolve(&self.index_dir)
    }

    /// Directory holding prompt overrides.
    pub fn prompts_dir(&self) -> PathBuf {
        self.pdfchat_dir().join("prompts")
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Validate the configuration before any component is built.
    pub fn validate(&self) -> AppResult<()> {
        for (role, provider) in [
            ("LLM", &self.llm.provider),
            ("embedding", &self.embedding.provider),
        ] {
            if !KNOWN_PROVIDERS.contains(&provider.to_lowercase().as_str()) {
                return Err(AppError::Config(format!(
                    "Unknown {} provider: {}. Supported: {}",
                    role,
                    provider,
                    KNOWN_PROVIDERS.join(", ")
                )));
            }

            if provider.eq_ignore_ascii_case("gemini") && self.api_key.is_none() {
                return Err(AppError::Config(format!(
                    "The {} provider 'gemini' requires PDFCHAT_API_KEY or GOOGLE_API_KEY",
                    role
                )));
            }
        }

        if self.chunk_size == 0 {
            return Err(AppError::Config("chunkSize must be positive".to_string()));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if self.top_k == 0 {
            return Err(AppError::Config("topK must be at least 1".to_string()));
        }

        if self.embedding.dimensions == 0 || self.embedding.batch_size == 0 {
            return Err(AppError::Config(
                "embedding dimensions and batchSize must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn offline_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.llm.provider = "mock".to_string();
        config.embedding.provider = "mock".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.embedding.model, "text-embedding-004");
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.top_k, 3);
        assert!(!config.verbose);
    }

    #[test]
    fn test_relative_paths_resolve_against_workspace() {
        let mut config = AppConfig::default();
        config.workspace = PathBuf::from("/srv/docs");
        assert_eq!(
            config.source_path(),
            PathBuf::from("/srv/docs/data/source_files")
        );

        config.index_dir = PathBuf::from("/var/lib/pdfchat");
        assert_eq!(config.index_path(), PathBuf::from("/var/lib/pdfchat"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default().with_overrides(CliOverrides {
            provider: Some("ollama".to_string()),
            model: Some("llama3.2".to_string()),
            embedding_model: Some("nomic-embed-text".to_string()),
            verbose: true,
            ..Default::default()
        });

        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.model, "llama3.2");
        assert_eq!(config.embedding.model, "nomic-embed-text");
        assert!(config.verbose);
        assert_eq!(config.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
sourceDir: pdfs
llm:
  provider: ollama
  model: llama3.2
embedding:
  provider: ollama
  model: nomic-embed-text
  dimensions: 768
chunking:
  chunkSize: 500
  chunkOverlap: 50
retrieval:
  topK: 5
server:
  port: 8080
logging:
  format: json
  color: false
"#,
        )
        .unwrap();

        let config = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(config.source_dir, PathBuf::from("pdfs"));
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.embedding.model, "nomic-embed-text");
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.no_color);
        // Untouched sections keep defaults
        assert_eq!(config.index_dir, PathBuf::from("data/vector_db"));
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "llm: [not, a, map").unwrap();

        let err = AppConfig::default().merge_yaml(&path).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_api_key_is_never_serialized() {
        let mut config = offline_config();
        config.api_key = Some("secret".to_string());
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("secret"));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = offline_config();
        config.llm.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_gemini_requires_key() {
        let mut config = offline_config();
        config.embedding.provider = "gemini".to_string();
        assert!(config.validate().is_err());

        config.api_key = Some("key".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_overlap_smaller_than_size() {
        let mut config = offline_config();
        config.chunk_overlap = config.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_mock() {
        assert!(offline_config().validate().is_ok());
    }
}
