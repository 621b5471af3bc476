//! The local side effect applied after a successful classification.

use crate::metadata::{MetadataCodec, MetadataRecord};
use crate::models::{Candidate, ItemError, ItemOutcome, Score, TagSet};
use anyhow::{Context, Result};
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// `<output>/<score:03>/<relative dir>/<file name>`
pub fn bucket_destination(output_root: &Path, score: Score, candidate: &Candidate) -> PathBuf {
    let mut dest = output_root.join(score.bucket()).join(&candidate.relative_dir);
    if let Some(name) = candidate.path.file_name() {
        dest.push(name);
    }
    dest
}

/// Moves the file into its score bucket. An existing destination is left untouched
/// and the item reported as skipped.
pub fn move_to_bucket(
    candidate: &Candidate,
    score: Score,
    output_root: &Path,
    copy_then_delete: bool,
) -> ItemOutcome {
    let dest = bucket_destination(output_root, score, candidate);
    if dest.exists() {
        info!(path = %candidate.path.display(), dest = %dest.display(), "destination exists, skipping move");
        return ItemOutcome::Skipped;
    }
    match relocate(&candidate.path, &dest, copy_then_delete) {
        Ok(()) => {
            info!(path = %candidate.path.display(), dest = %dest.display(), score = %score, "moved");
            ItemOutcome::Succeeded
        }
        Err(e) => ItemOutcome::Failed(ItemError::Io(format!("{:#}", e))),
    }
}

fn relocate(from: &Path, to: &Path, copy_then_delete: bool) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    if !copy_then_delete {
        match fs::rename(from, to) {
            Ok(()) => return Ok(()),
            Err(e) => debug!(error = %e, "rename failed, falling back to copy"),
        }
    }
    fs::copy(from, to).with_context(|| format!("copy {} to {}", from.display(), to.display()))?;
    fs::remove_file(from).with_context(|| format!("remove {}", from.display()))?;
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TagWriteOptions {
    pub dry_run: bool,
    pub preserve_timestamps: bool,
}

/// Writes the tags into the file in place. Dry runs only report what would be written.
pub fn write_tags(
    codec: &dyn MetadataCodec,
    path: &Path,
    tags: &TagSet,
    opts: TagWriteOptions,
) -> ItemOutcome {
    let record = MetadataRecord::from_tags(tags);
    if opts.dry_run {
        info!(
            path = %path.display(),
            title = %record.title,
            keywords = %record.keywords,
            "[dry run] would write tags"
        );
        return ItemOutcome::Succeeded;
    }
    match write_preserving_times(codec, path, &record, opts.preserve_timestamps) {
        Ok(()) => {
            info!(path = %path.display(), "wrote tags");
            ItemOutcome::Succeeded
        }
        Err(e) => ItemOutcome::Failed(ItemError::Io(format!("{:#}", e))),
    }
}

fn write_preserving_times(
    codec: &dyn MetadataCodec,
    path: &Path,
    record: &MetadataRecord,
    preserve: bool,
) -> Result<()> {
    let times = if preserve {
        let meta = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
        Some((
            FileTime::from_last_access_time(&meta),
            FileTime::from_last_modification_time(&meta),
        ))
    } else {
        None
    };
    codec
        .write(path, record)
        .with_context(|| format!("write metadata to {}", path.display()))?;
    if let Some((atime, mtime)) = times {
        filetime::set_file_times(path, atime, mtime)
            .with_context(|| format!("restore timestamps on {}", path.display()))?;
    }
    Ok(())
}
