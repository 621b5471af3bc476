use crate::config::{ScoringConfig, TaggingConfig};
use crate::models::{ClassificationFailure, ClassificationResult, Score, TagSet};
use base64::{engine::general_purpose, Engine as _};
use providers::{VisionProvider, VisionRequest};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Score,
    Tag,
}

/// One remote call per file: read, encode, request, parse.
#[derive(Clone)]
pub struct ItemClassifier {
    provider: Arc<dyn VisionProvider>,
    task: Task,
    prompt: String,
    max_tokens: u32,
}

impl ItemClassifier {
    pub fn scoring(provider: Arc<dyn VisionProvider>, cfg: &ScoringConfig) -> Self {
        Self {
            provider,
            task: Task::Score,
            prompt: cfg.prompt.clone(),
            max_tokens: cfg.max_tokens,
        }
    }

    pub fn tagging(provider: Arc<dyn VisionProvider>, cfg: &TaggingConfig) -> Self {
        Self {
            provider,
            task: Task::Tag,
            prompt: cfg.prompt.clone(),
            max_tokens: cfg.max_tokens,
        }
    }

    /// Never fails past this boundary; every error becomes `ClassificationResult::Failure`.
    pub async fn classify(&self, path: &Path) -> ClassificationResult {
        let name = display_name(path);
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read image");
                return ClassificationResult::Failure(ClassificationFailure::Transport(format!(
                    "read {}: {}",
                    name, e
                )));
            }
        };

        let request = VisionRequest {
            prompt: self.prompt.clone(),
            image_url: data_url(path, &bytes),
            max_tokens: self.max_tokens,
        };
        drop(bytes);

        let content = match self.provider.complete(&request).await {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "API request failed");
                return ClassificationResult::Failure(ClassificationFailure::Transport(
                    e.to_string(),
                ));
            }
        };

        let parsed = match self.task {
            Task::Score => parse_score(&content).map(ClassificationResult::Score),
            Task::Tag => parse_tags(&content).map(ClassificationResult::Tags),
        };
        match parsed {
            Ok(result) => result,
            Err(failure) => {
                match &failure {
                    ClassificationFailure::OutOfRange(value) => warn!(
                        path = %path.display(),
                        score = %value,
                        "score is out of 0-100 range"
                    ),
                    _ => warn!(
                        path = %path.display(),
                        response = %content,
                        "could not parse response"
                    ),
                }
                ClassificationResult::Failure(failure)
            }
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => "image/jpeg",
    }
}

pub fn data_url(path: &Path, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_for(path),
        general_purpose::STANDARD.encode(bytes)
    )
}

/// First maximal run of ASCII digits in `text`.
pub fn first_digit_run(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let len = text[start..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len() - start);
    Some(&text[start..start + len])
}

pub fn parse_score(content: &str) -> Result<Score, ClassificationFailure> {
    let digits = first_digit_run(content).ok_or_else(|| {
        ClassificationFailure::Parse(format!("no number in response: {:?}", content))
    })?;
    // A run too long for u64 is still a number, just far out of range.
    digits
        .parse::<u64>()
        .ok()
        .and_then(Score::new)
        .ok_or_else(|| ClassificationFailure::OutOfRange(digits.to_string()))
}

pub fn parse_tags(content: &str) -> Result<TagSet, ClassificationFailure> {
    serde_json::from_str::<TagSet>(strip_code_fence(content))
        .map_err(|e| ClassificationFailure::Parse(e.to_string()))
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
        if let Some(inner) = rest.trim_end().strip_suffix("```") {
            return inner.trim();
        }
    }
    trimmed
}
