//! The two concrete pipelines: score-and-sort and tag-and-annotate.

use crate::apply::{self, TagWriteOptions};
use crate::classifier::ItemClassifier;
use crate::config::{AppConfig, BatchConfig, ServiceConfig};
use crate::error::BatchError;
use crate::filter;
use crate::metadata::{JpegExifCodec, MetadataCodec};
use crate::models::{Candidate, ClassificationFailure, ClassificationResult, ItemOutcome};
use crate::scanner::ScanOptions;
use anyhow::Context;
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::VisionProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One filter / classify / apply triple driven by the batch scheduler.
#[async_trait::async_trait]
pub trait Pipeline: Send + Sync {
    fn name(&self) -> &'static str;

    /// Batch-level preconditions beyond the scan root itself.
    fn validate(&self) -> Result<(), BatchError> {
        Ok(())
    }

    fn scan_options(&self, scan_root: &Path, batch: &BatchConfig) -> ScanOptions;

    /// Pure predicate, evaluated once per discovered file before dispatch.
    fn should_skip(&self, candidate: &Candidate) -> bool;

    async fn classify(&self, candidate: &Candidate) -> ClassificationResult;

    /// Blocking; the scheduler runs it off the async workers.
    fn apply(&self, candidate: &Candidate, result: ClassificationResult) -> ItemOutcome;
}

pub fn build_provider(service: &ServiceConfig) -> anyhow::Result<Arc<dyn VisionProvider>> {
    let provider = OpenAiProvider::new(OpenAiConfig {
        endpoint: service.endpoint.clone(),
        model: service.model.clone(),
        api_key: service.api_key.clone(),
        timeout: service.timeout_secs.map(Duration::from_secs),
    })
    .context("build http client")?;
    Ok(Arc::new(provider))
}

fn unexpected(result: ClassificationResult) -> ItemOutcome {
    let failure = match result {
        ClassificationResult::Failure(f) => f,
        other => ClassificationFailure::Parse(format!("unexpected result {:?}", other)),
    };
    ItemOutcome::Failed(failure.into())
}

pub struct ScorePipeline {
    classifier: ItemClassifier,
    output: Option<PathBuf>,
    extensions: Vec<String>,
    copy_then_delete: bool,
}

impl ScorePipeline {
    pub fn new(classifier: ItemClassifier, output: Option<PathBuf>, cfg: &AppConfig) -> Self {
        Self {
            classifier,
            output,
            extensions: cfg.scoring.extensions.clone(),
            copy_then_delete: cfg.scoring.copy_then_delete,
        }
    }

    pub fn from_config(provider: Arc<dyn VisionProvider>, cfg: &AppConfig) -> Self {
        let classifier = ItemClassifier::scoring(provider, &cfg.scoring);
        Self::new(classifier, cfg.scoring.output.clone(), cfg)
    }
}

#[async_trait::async_trait]
impl Pipeline for ScorePipeline {
    fn name(&self) -> &'static str {
        "score"
    }

    fn validate(&self) -> Result<(), BatchError> {
        match &self.output {
            Some(p) if !p.as_os_str().is_empty() => Ok(()),
            _ => Err(BatchError::MissingOutput),
        }
    }

    fn scan_options(&self, scan_root: &Path, batch: &BatchConfig) -> ScanOptions {
        ScanOptions {
            extensions: self.extensions.clone(),
            excludes: batch.exclude.clone(),
            skip_hidden: batch.skip_hidden,
            prune: self
                .output
                .as_deref()
                .and_then(|out| nested_dir(scan_root, out))
                .into_iter()
                .collect(),
        }
    }

    fn should_skip(&self, candidate: &Candidate) -> bool {
        filter::has_score_prefix(&candidate.path)
    }

    async fn classify(&self, candidate: &Candidate) -> ClassificationResult {
        self.classifier.classify(&candidate.path).await
    }

    fn apply(&self, candidate: &Candidate, result: ClassificationResult) -> ItemOutcome {
        match (result, self.output.as_deref()) {
            (ClassificationResult::Score(score), Some(output)) => {
                apply::move_to_bucket(candidate, score, output, self.copy_then_delete)
            }
            (ClassificationResult::Score(_), None) => ItemOutcome::Failed(
                crate::models::ItemError::Io("no output directory".to_string()),
            ),
            (other, _) => unexpected(other),
        }
    }
}

/// `output` expressed under `scan_root` when it lies inside it.
fn nested_dir(scan_root: &Path, output: &Path) -> Option<PathBuf> {
    let root = scan_root.canonicalize().ok()?;
    let out = output.canonicalize().ok()?;
    let rel = out.strip_prefix(&root).ok()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    Some(scan_root.join(rel))
}

pub struct TagPipeline {
    classifier: ItemClassifier,
    codec: Arc<dyn MetadataCodec>,
    extensions: Vec<String>,
    opts: TagWriteOptions,
}

impl TagPipeline {
    pub fn new(classifier: ItemClassifier, codec: Arc<dyn MetadataCodec>, cfg: &AppConfig) -> Self {
        Self {
            classifier,
            codec,
            extensions: cfg.tagging.extensions.clone(),
            opts: TagWriteOptions {
                dry_run: cfg.tagging.dry_run,
                preserve_timestamps: cfg.tagging.preserve_timestamps,
            },
        }
    }

    pub fn from_config(provider: Arc<dyn VisionProvider>, cfg: &AppConfig) -> Self {
        let classifier = ItemClassifier::tagging(provider, &cfg.tagging);
        Self::new(classifier, Arc::new(JpegExifCodec), cfg)
    }

    pub fn is_dry_run(&self) -> bool {
        self.opts.dry_run
    }
}

#[async_trait::async_trait]
impl Pipeline for TagPipeline {
    fn name(&self) -> &'static str {
        "tag"
    }

    fn scan_options(&self, _scan_root: &Path, batch: &BatchConfig) -> ScanOptions {
        ScanOptions {
            extensions: self.extensions.clone(),
            excludes: batch.exclude.clone(),
            skip_hidden: batch.skip_hidden,
            prune: Vec::new(),
        }
    }

    fn should_skip(&self, candidate: &Candidate) -> bool {
        filter::is_already_tagged(self.codec.as_ref(), &candidate.path)
    }

    async fn classify(&self, candidate: &Candidate) -> ClassificationResult {
        self.classifier.classify(&candidate.path).await
    }

    fn apply(&self, candidate: &Candidate, result: ClassificationResult) -> ItemOutcome {
        match result {
            ClassificationResult::Tags(tags) => {
                apply::write_tags(self.codec.as_ref(), &candidate.path, &tags, self.opts)
            }
            other => unexpected(other),
        }
    }
}
