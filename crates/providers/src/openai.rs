use crate::{ProviderError, VisionProvider, VisionRequest};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Full chat-completions URL, e.g. `http://localhost:1234/v1/chat/completions`.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
}

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    cfg: Arc<OpenAiConfig>,
}

impl OpenAiProvider {
    pub fn new(cfg: OpenAiConfig) -> Result<Self, ProviderError> {
        let mut builder = Client::builder();
        if let Some(timeout) = cfg.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Ok(Self {
            client,
            cfg: Arc::new(cfg),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessageResp,
}

#[derive(Deserialize)]
struct ChatMessageResp {
    content: Option<String>,
}

fn build_body<'a>(model: &'a str, request: &'a VisionRequest) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: vec![
                ContentPart::Text {
                    text: &request.prompt,
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: &request.image_url,
                    },
                },
            ],
        }],
        max_tokens: request.max_tokens,
    }
}

fn first_content(body: &[u8]) -> Result<String, ProviderError> {
    let parsed: ChatApiResponse = serde_json::from_slice(body)
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse("no choices".into()))?
        .message
        .content
        .ok_or_else(|| ProviderError::MalformedResponse("choice has no content".into()))
}

#[async_trait::async_trait]
impl VisionProvider for OpenAiProvider {
    async fn complete(&self, request: &VisionRequest) -> Result<String, ProviderError> {
        let body = build_body(&self.cfg.model, request);

        let mut req = self.client.post(&self.cfg.endpoint).json(&body);
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        debug!(bytes = bytes.len(), "chat completion received");
        first_content(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_prompt_image_and_cap() {
        let request = VisionRequest {
            prompt: "rate it".into(),
            image_url: "data:image/jpeg;base64,AAAA".into(),
            max_tokens: 10,
        };
        let value = serde_json::to_value(build_body("local-model", &request)).unwrap();
        assert_eq!(value["model"], "local-model");
        assert_eq!(value["max_tokens"], 10);
        let content = &value["messages"][0]["content"];
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "rate it");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(
            content[1]["image_url"]["url"],
            "data:image/jpeg;base64,AAAA"
        );
    }

    #[test]
    fn extracts_first_choice_content() {
        let body = br#"{"choices":[{"message":{"role":"assistant","content":"Score: 73"}}]}"#;
        assert_eq!(first_content(body).unwrap(), "Score: 73");
    }

    #[test]
    fn missing_choices_is_malformed() {
        assert!(matches!(
            first_content(br#"{"choices":[]}"#),
            Err(ProviderError::MalformedResponse(_))
        ));
        assert!(matches!(
            first_content(br#"{"error":"boom"}"#),
            Err(ProviderError::MalformedResponse(_))
        ));
        assert!(matches!(
            first_content(br#"{"choices":[{"message":{"content":null}}]}"#),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_request_failure() {
        let provider = OpenAiProvider::new(OpenAiConfig {
            endpoint: "http://127.0.0.1:1/v1/chat/completions".into(),
            model: "local-model".into(),
            api_key: None,
            timeout: Some(Duration::from_secs(2)),
        })
        .unwrap();
        let request = VisionRequest {
            prompt: "rate it".into(),
            image_url: "data:image/jpeg;base64,AAAA".into(),
            max_tokens: 10,
        };
        assert!(matches!(
            provider.complete(&request).await,
            Err(ProviderError::RequestFailed(_))
        ));
    }

    /// Accepts one connection, drains the request and answers with `status_line`.
    async fn one_shot_server(status_line: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let body_len = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + body_len {
                        break;
                    }
                }
            }
            let body = "model crashed";
            let response = format!(
                "{}\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}/v1/chat/completions", addr)
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_body() {
        let endpoint = one_shot_server("HTTP/1.1 500 Internal Server Error").await;
        let provider = OpenAiProvider::new(OpenAiConfig {
            endpoint,
            model: "local-model".into(),
            api_key: Some("secret".into()),
            timeout: Some(Duration::from_secs(5)),
        })
        .unwrap();
        let request = VisionRequest {
            prompt: "rate it".into(),
            image_url: "data:image/jpeg;base64,AAAA".into(),
            max_tokens: 10,
        };
        match provider.complete(&request).await {
            Err(ProviderError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "model crashed");
            }
            other => panic!("expected a status error, got {:?}", other),
        }
    }
}
