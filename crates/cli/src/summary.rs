use sorter_core::BatchSummary;

pub fn format_summary(summary: &BatchSummary) -> String {
    format!(
        "--- Processing Summary ---\n\
         Total images discovered: {}\n\
         Total images processed: {}\n\
         Succeeded: {}, skipped: {}, failed: {}\n\
         Total time taken: {:.2} seconds\n\
         Average processing rate: {:.2} images/sec",
        summary.discovered,
        summary.dispatched,
        summary.succeeded,
        summary.skipped,
        summary.failed,
        summary.duration.as_secs_f64(),
        summary.throughput(),
    )
}

/// Short message for runs that dispatched nothing, in place of the full summary.
pub fn nothing_to_do(mode: &str, summary: &BatchSummary) -> Option<&'static str> {
    if summary.dispatched > 0 {
        return None;
    }
    Some(match (summary.discovered, mode) {
        (0, _) => "No images found to process.",
        (_, "tag") => "No images need tagging.",
        _ => "No images need scoring.",
    })
}

pub fn summary_json(mode: &str, summary: &BatchSummary) -> serde_json::Value {
    serde_json::json!({
        "status": "ok",
        "mode": mode,
        "discovered": summary.discovered,
        "dispatched": summary.dispatched,
        "succeeded": summary.succeeded,
        "skipped": summary.skipped,
        "failed": summary.failed,
        "duration_secs": summary.duration.as_secs_f64(),
        "throughput": summary.throughput(),
    })
}
