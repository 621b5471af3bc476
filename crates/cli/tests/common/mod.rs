#![allow(dead_code)]

use base64::{engine::general_purpose, Engine as _};
use providers::{ProviderError, VisionProvider, VisionRequest};
use sorter_core::models::BatchSummary;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Replies with the file's own contents, so each fixture file scripts its model answer.
#[derive(Default)]
pub struct EchoProvider {
    pub seen: Mutex<Vec<String>>,
    pub delay: Option<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl EchoProvider {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl VisionProvider for EchoProvider {
    async fn complete(&self, request: &VisionRequest) -> Result<String, ProviderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let payload = request
            .image_url
            .split_once(";base64,")
            .map(|(_, b64)| b64)
            .unwrap_or_default();
        let bytes = general_purpose::STANDARD.decode(payload).unwrap();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        self.seen.lock().unwrap().push(text.clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if text == "unreachable" {
            return Err(ProviderError::RequestFailed("connection refused".into()));
        }
        Ok(text)
    }
}

/// Always gives the same reply and counts calls.
pub struct FixedProvider {
    pub reply: String,
    pub calls: AtomicUsize,
}

impl FixedProvider {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl VisionProvider for FixedProvider {
    async fn complete(&self, _request: &VisionRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// SOI, JFIF APP0, a DQT-shaped segment, SOS with two bytes of scan data, EOI.
pub fn tiny_jpeg() -> Vec<u8> {
    let mut j = vec![0xFF, 0xD8];
    j.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x07, b'J', b'F', b'I', b'F', 0x00]);
    j.extend_from_slice(&[0xFF, 0xDB, 0x00, 0x04, 0x00, 0x01]);
    j.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x12, 0x34]);
    j.extend_from_slice(&[0xFF, 0xD9]);
    j
}

pub fn assert_balanced(summary: &BatchSummary) {
    assert_eq!(
        summary.succeeded + summary.skipped + summary.failed,
        summary.discovered,
        "every discovered file has exactly one outcome: {:?}",
        summary
    );
}
