mod common;

use common::{assert_balanced, tiny_jpeg, FixedProvider};
use filetime::FileTime;
use sorter_core::config::AppConfig;
use sorter_core::metadata::{JpegExifCodec, MetadataCodec};
use sorter_core::pipeline::TagPipeline;
use sorter_core::BatchScheduler;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const REPLY: &str = r#"{"title": "Lighthouse", "description": "A lighthouse on a rocky coast.", "keywords": ["lighthouse", "coast", "rocks"]}"#;

fn scheduler(provider: Arc<FixedProvider>, dry_run: bool) -> BatchScheduler {
    let mut cfg = AppConfig::default();
    cfg.tagging.dry_run = dry_run;
    let pipeline = TagPipeline::from_config(provider, &cfg);
    BatchScheduler::new(Arc::new(pipeline), cfg.batch)
}

fn seed(root: &Path) {
    fs::create_dir_all(root.join("album")).unwrap();
    fs::write(root.join("one.jpg"), tiny_jpeg()).unwrap();
    fs::write(root.join("album/two.JPEG"), tiny_jpeg()).unwrap();
    fs::write(root.join("album/three.png"), b"png").unwrap();
}

#[tokio::test]
async fn tags_are_written_once_and_then_skipped() {
    let temp = tempfile::tempdir().unwrap();
    seed(temp.path());
    let old = FileTime::from_unix_time(1_400_000_000, 0);
    filetime::set_file_times(temp.path().join("one.jpg"), old, old).unwrap();

    let provider = Arc::new(FixedProvider::new(REPLY));
    let first = scheduler(provider.clone(), false)
        .run(temp.path())
        .await
        .unwrap();
    assert_eq!(first.discovered, 2);
    assert_eq!(first.succeeded, 2);
    assert_balanced(&first);
    assert_eq!(provider.calls(), 2);

    let existing = JpegExifCodec
        .read(&temp.path().join("album/two.JPEG"))
        .unwrap()
        .unwrap();
    assert_eq!(existing.title.as_deref(), Some("Lighthouse"));
    assert_eq!(existing.keywords.as_deref(), Some("lighthouse;coast;rocks"));
    let meta = fs::metadata(temp.path().join("one.jpg")).unwrap();
    assert_eq!(FileTime::from_last_modification_time(&meta), old);

    let after_first = fs::read(temp.path().join("one.jpg")).unwrap();
    let second = scheduler(provider.clone(), false)
        .run(temp.path())
        .await
        .unwrap();
    assert_eq!(second.skipped, 2);
    assert_eq!(second.dispatched, 0);
    assert_balanced(&second);
    assert_eq!(provider.calls(), 2);
    assert_eq!(fs::read(temp.path().join("one.jpg")).unwrap(), after_first);
}

#[tokio::test]
async fn dry_run_reports_success_without_touching_files() {
    let temp = tempfile::tempdir().unwrap();
    seed(temp.path());

    let provider = Arc::new(FixedProvider::new(REPLY));
    let summary = scheduler(provider.clone(), true)
        .run(temp.path())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(provider.calls(), 2);
    assert_eq!(fs::read(temp.path().join("one.jpg")).unwrap(), tiny_jpeg());
    assert_eq!(
        fs::read(temp.path().join("album/two.JPEG")).unwrap(),
        tiny_jpeg()
    );
}

#[tokio::test]
async fn malformed_tag_reply_fails_the_item_only() {
    let temp = tempfile::tempdir().unwrap();
    seed(temp.path());

    let provider = Arc::new(FixedProvider::new(r#"{"title": "No keywords here"}"#));
    let summary = scheduler(provider, false).run(temp.path()).await.unwrap();

    assert_eq!(summary.failed, 2);
    assert_balanced(&summary);
    assert_eq!(fs::read(temp.path().join("one.jpg")).unwrap(), tiny_jpeg());
}

#[tokio::test]
async fn empty_keyword_list_is_still_written() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("one.jpg"), tiny_jpeg()).unwrap();

    let provider = Arc::new(FixedProvider::new(
        r#"{"title": "Fog", "description": "Nothing but fog.", "keywords": []}"#,
    ));
    let summary = scheduler(provider.clone(), false)
        .run(temp.path())
        .await
        .unwrap();
    assert_eq!(summary.succeeded, 1);

    let existing = JpegExifCodec
        .read(&temp.path().join("one.jpg"))
        .unwrap()
        .unwrap();
    assert_eq!(existing.title.as_deref(), Some("Fog"));
    assert_eq!(existing.keywords, None);

    // No keywords means the file does not count as tagged yet.
    let again = scheduler(provider.clone(), false)
        .run(temp.path())
        .await
        .unwrap();
    assert_eq!(again.dispatched, 1);
    assert_eq!(provider.calls(), 2);
}
