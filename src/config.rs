use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub dir: PathBuf,
}

impl IndexConfig {
    /// Path of the SQLite file holding the persisted vectors.
    pub fn db_path(&self) -> PathBuf {
        self.dir.join("vectors.sqlite")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_writer_model")]
    pub writer_model: String,
    #[serde(default = "default_code_model")]
    pub code_model: String,
    #[serde(default = "default_writer_model")]
    pub reviewer_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embed_model: default_embed_model(),
            writer_model: default_writer_model(),
            code_model: default_code_model(),
            reviewer_model: default_writer_model(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}
fn default_embed_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_writer_model() -> String {
    "typewriter-thesis".to_string()
}
fn default_code_model() -> String {
    "typewriter-python".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1200
}
fn default_overlap_chars() -> usize {
    150
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Result count for direct (one-shot) queries.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Result count for the interactive chat path.
    #[serde(default = "default_chat_k")]
    pub chat_k: usize,
    /// Relevance/diversity trade-off for MMR selection.
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f32,
}

impl RetrievalConfig {
    /// Oversampled candidate-set size for a given k.
    pub fn fetch_k(&self, k: usize) -> usize {
        (3 * k).max(24)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            chat_k: default_chat_k(),
            mmr_lambda: default_mmr_lambda(),
        }
    }
}

fn default_k() -> usize {
    8
}
fn default_chat_k() -> usize {
    4
}
fn default_mmr_lambda() -> f32 {
    0.6
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    /// Default number of past turns folded into the conversational context.
    #[serde(default = "default_context_turns")]
    pub context_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            context_turns: default_context_turns(),
        }
    }
}

fn default_context_turns() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Character stride of each `delta` event on the streaming endpoint.
    #[serde(default = "default_stream_stride")]
    pub stream_stride: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            stream_stride: default_stream_stride(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8420".to_string()
}
fn default_stream_stride() -> usize {
    140
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.max_chars");
    }

    if config.retrieval.k < 1 || config.retrieval.chat_k < 1 {
        anyhow::bail!("retrieval.k and retrieval.chat_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.mmr_lambda) {
        anyhow::bail!("retrieval.mmr_lambda must be in [0.0, 1.0]");
    }

    if config.server.stream_stride < 1 {
        anyhow::bail!("server.stream_stride must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let file = write_config(
            r#"
[corpus]
root = "./kb"

[index]
dir = "./index"
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.chunking.max_chars, 1200);
        assert_eq!(config.chunking.overlap_chars, 150);
        assert_eq!(config.retrieval.k, 8);
        assert_eq!(config.retrieval.chat_k, 4);
        assert_eq!(config.server.stream_stride, 140);
        assert_eq!(config.memory.context_turns, 10);
    }

    #[test]
    fn test_fetch_k_floor() {
        let retrieval = RetrievalConfig::default();
        assert_eq!(retrieval.fetch_k(4), 24);
        assert_eq!(retrieval.fetch_k(8), 24);
        assert_eq!(retrieval.fetch_k(10), 30);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_max() {
        let file = write_config(
            r#"
[corpus]
root = "./kb"

[index]
dir = "./index"

[chunking]
max_chars = 100
overlap_chars = 100
"#,
        );
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_lambda_out_of_range_rejected() {
        let file = write_config(
            r#"
[corpus]
root = "./kb"

[index]
dir = "./index"

[retrieval]
mmr_lambda = 1.5
"#,
        );
        assert!(load_config(file.path()).is_err());
    }
}
