//! Provider abstractions for vision-capable chat models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod openai;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// One user turn: a fixed instruction plus a single inline image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionRequest {
    pub prompt: String,
    /// `data:<mime>;base64,<payload>`
    pub image_url: String,
    pub max_tokens: u32,
}

#[async_trait::async_trait]
pub trait VisionProvider: Send + Sync {
    /// Returns the text content of the first choice.
    async fn complete(&self, request: &VisionRequest) -> Result<String, ProviderError>;
}
