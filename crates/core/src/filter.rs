//! Pre-dispatch checks that keep already-handled files away from the service.

use crate::metadata::MetadataCodec;
use std::path::Path;
use tracing::debug;

/// True when the file name starts with a legacy score prefix such as `085__`.
pub fn has_score_prefix(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let bytes = name.as_bytes();
    bytes.len() >= 5 && bytes[..3].iter().all(u8::is_ascii_digit) && &bytes[3..5] == b"__"
}

/// True when the file already carries a non-empty title and keyword list.
/// Unreadable or absent metadata counts as untagged.
pub fn is_already_tagged(codec: &dyn MetadataCodec, path: &Path) -> bool {
    match codec.read(path) {
        Ok(Some(existing)) => existing.is_tagged(),
        Ok(None) => false,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "metadata unreadable, treating as untagged");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ExistingMetadata, MetadataRecord};
    use std::path::PathBuf;

    #[test]
    fn score_prefix_requires_three_digits_and_separator() {
        assert!(has_score_prefix(Path::new("/photos/085__beach.jpg")));
        assert!(has_score_prefix(Path::new("100__x.png")));
        assert!(!has_score_prefix(Path::new("85__beach.jpg")));
        assert!(!has_score_prefix(Path::new("0850beach.jpg")));
        assert!(!has_score_prefix(Path::new("085_beach.jpg")));
        assert!(!has_score_prefix(Path::new("/085__/beach.jpg")));
        assert!(!has_score_prefix(Path::new("beach.jpg")));
    }

    struct Canned(Option<ExistingMetadata>, bool);

    impl MetadataCodec for Canned {
        fn read(&self, _path: &Path) -> anyhow::Result<Option<ExistingMetadata>> {
            if self.1 {
                anyhow::bail!("corrupt");
            }
            Ok(self.0.clone())
        }
        fn write(&self, _path: &Path, _record: &MetadataRecord) -> anyhow::Result<()> {
            unreachable!("filters never write")
        }
    }

    #[test]
    fn tagged_only_when_title_and_keywords_present() {
        let path = PathBuf::from("a.jpg");
        let full = ExistingMetadata {
            title: Some("t".into()),
            keywords: Some("k".into()),
        };
        assert!(is_already_tagged(&Canned(Some(full.clone()), false), &path));
        assert!(!is_already_tagged(&Canned(None, false), &path));
        assert!(!is_already_tagged(&Canned(Some(full), true), &path));
        let empty_keywords = ExistingMetadata {
            title: Some("t".into()),
            keywords: Some(String::new()),
        };
        assert!(!is_already_tagged(&Canned(Some(empty_keywords), false), &path));
    }
}
