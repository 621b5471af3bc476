use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:1234/v1/chat/completions";
pub const DEFAULT_WORKERS: usize = 5;

pub const SCORE_PROMPT: &str = "Act as a photo assistant and classify this image on a scale from 0 to 100, \
where 0 means a totally bad image (out of focus, badly composed) and 100 means a perfect, sharp, \
well designed professional photo. Valuable family photos should get a larger score. \
Respond with only the number.";

pub const TAG_PROMPT: &str = "Act as a photo assistant. Analyze this image and generate metadata. \
Provide a concise title, a one-sentence description, and a list of relevant keywords. \
Respond ONLY in the following format:\n\
{\"title\": \"...\", \"description\": \"...\", \"keywords\": [\"tag1\", \"tag2\", \"tag3\"]}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub batch: BatchConfig,
    pub scoring: ScoringConfig,
    pub tagging: TaggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: "local-model".to_string(),
            api_key: None,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub workers: usize,
    /// Glob patterns never descended into or returned by discovery.
    pub exclude: Vec<String>,
    pub skip_hidden: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            exclude: Vec::new(),
            skip_hidden: false,
        }
    }
}

impl BatchConfig {
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub extensions: Vec<String>,
    pub max_tokens: u32,
    pub prompt: String,
    pub output: Option<PathBuf>,
    pub copy_then_delete: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            extensions: ["jpg", "jpeg", "png", "gif", "bmp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_tokens: 10,
            prompt: SCORE_PROMPT.to_string(),
            output: None,
            copy_then_delete: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggingConfig {
    pub extensions: Vec<String>,
    pub max_tokens: u32,
    pub prompt: String,
    pub dry_run: bool,
    pub preserve_timestamps: bool,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            extensions: ["jpg", "jpeg"].iter().map(|s| s.to_string()).collect(),
            max_tokens: 4096,
            prompt: TAG_PROMPT.to_string(),
            dry_run: false,
            preserve_timestamps: true,
        }
    }
}

/// Layers an optional TOML file and `PHOTO_SORTER_*` environment variables over the defaults.
pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("PHOTO_SORTER")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
