//! Metadata codec: reads and writes title/description/keywords in a file.
//!
//! The JPEG implementation stores the description in `ImageDescription` and the
//! title and `;`-joined keywords in the Windows `XPTitle`/`XPKeywords` tags
//! (UTF-16LE, NUL-terminated) of the primary IFD.

use crate::models::TagSet;
use anyhow::{anyhow, bail, Context as _};
use exif::experimental::Writer;
use exif::{Context, Field, In, Tag, Value};
use std::fs;
use std::io::{BufReader, Cursor, Write};
use std::path::Path;
use tracing::debug;

pub const XP_TITLE: u16 = 0x9c9b;
pub const XP_KEYWORDS: u16 = 0x9c9e;

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const SOI: [u8; 2] = [0xFF, 0xD8];
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub title: String,
    pub description: String,
    pub keywords: String,
}

impl MetadataRecord {
    pub fn from_tags(tags: &TagSet) -> Self {
        Self {
            title: tags.title.clone(),
            description: tags.description.clone(),
            keywords: tags.joined_keywords(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingMetadata {
    pub title: Option<String>,
    pub keywords: Option<String>,
}

impl ExistingMetadata {
    pub fn is_tagged(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().map(|s| !s.is_empty()).unwrap_or(false);
        present(&self.title) && present(&self.keywords)
    }
}

pub trait MetadataCodec: Send + Sync {
    /// `Ok(None)` when the file carries no metadata block at all.
    fn read(&self, path: &Path) -> anyhow::Result<Option<ExistingMetadata>>;
    fn write(&self, path: &Path, record: &MetadataRecord) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JpegExifCodec;

impl MetadataCodec for JpegExifCodec {
    fn read(&self, path: &Path) -> anyhow::Result<Option<ExistingMetadata>> {
        let file = fs::File::open(path)?;
        let mut reader = BufReader::new(file);
        let exif = match exif::Reader::new().read_from_container(&mut reader) {
            Ok(e) => e,
            Err(exif::Error::NotFound(_)) => return Ok(None),
            Err(e) => return Err(anyhow!("read exif from {}: {}", path.display(), e)),
        };
        let text = |number: u16| {
            exif.get_field(xp_tag(number), In::PRIMARY)
                .and_then(|f| decode_xp(&f.value))
        };
        Ok(Some(ExistingMetadata {
            title: text(XP_TITLE),
            keywords: text(XP_KEYWORDS),
        }))
    }

    fn write(&self, path: &Path, record: &MetadataRecord) -> anyhow::Result<()> {
        let original =
            fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let carried = exif::Reader::new()
            .read_from_container(&mut Cursor::new(&original))
            .map(|existing| carry_fields(existing.fields()))
            .unwrap_or_default();

        let tiff = match build_tiff(record, &carried) {
            Ok(t) => t,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "dropping existing exif fields");
                build_tiff(record, &[])?
            }
        };
        let spliced = splice_exif(&original, &tiff)?;
        replace_file(path, &spliced)
    }
}

fn xp_tag(number: u16) -> Tag {
    Tag(Context::Tiff, number)
}

fn decode_xp(value: &Value) -> Option<String> {
    let bytes = match value {
        Value::Byte(b) => b,
        Value::Undefined(b, _) => b,
        _ => return None,
    };
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|u| *u != 0)
        .collect();
    let text = String::from_utf16_lossy(&units);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn encode_xp(text: &str) -> Vec<u8> {
    text.encode_utf16()
        .flat_map(u16::to_le_bytes)
        .chain([0, 0])
        .collect()
}

/// Primary-IFD fields that can be re-encoded next to the new tags.
fn carry_fields<'a>(fields: impl Iterator<Item = &'a Field>) -> Vec<Field> {
    const DROPPED: [Tag; 9] = [
        Tag::ExifIFDPointer,
        Tag::GPSInfoIFDPointer,
        Tag::InteropIFDPointer,
        Tag::StripOffsets,
        Tag::StripByteCounts,
        Tag::JPEGInterchangeFormat,
        Tag::JPEGInterchangeFormatLength,
        Tag::MakerNote,
        Tag::ImageDescription,
    ];
    fields
        .filter(|f| f.ifd_num == In::PRIMARY)
        .filter(|f| matches!(f.tag.context(), Context::Tiff | Context::Exif | Context::Gps))
        .filter(|f| !DROPPED.contains(&f.tag))
        .filter(|f| f.tag != xp_tag(XP_TITLE) && f.tag != xp_tag(XP_KEYWORDS))
        .filter(|f| !matches!(f.value, Value::Unknown(..)))
        .map(|f| Field {
            tag: f.tag,
            ifd_num: f.ifd_num,
            value: f.value.clone(),
        })
        .collect()
}

fn build_tiff(record: &MetadataRecord, carried: &[Field]) -> anyhow::Result<Vec<u8>> {
    let ours = [
        Field {
            tag: Tag::ImageDescription,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![record.description.as_bytes().to_vec()]),
        },
        Field {
            tag: xp_tag(XP_TITLE),
            ifd_num: In::PRIMARY,
            value: Value::Byte(encode_xp(&record.title)),
        },
        Field {
            tag: xp_tag(XP_KEYWORDS),
            ifd_num: In::PRIMARY,
            value: Value::Byte(encode_xp(&record.keywords)),
        },
    ];
    let mut writer = Writer::new();
    for field in carried.iter().chain(ours.iter()) {
        writer.push_field(field);
    }
    let mut buf = Cursor::new(Vec::new());
    writer
        .write(&mut buf, false)
        .map_err(|e| anyhow!("encode exif: {}", e))?;
    Ok(buf.into_inner())
}

/// Replaces any `Exif` APP1 segment of `jpeg` with one carrying `tiff`.
/// The new segment goes after leading APP0 (JFIF) segments.
pub fn splice_exif(jpeg: &[u8], tiff: &[u8]) -> anyhow::Result<Vec<u8>> {
    if jpeg.len() < 4 || jpeg[..2] != SOI {
        bail!("not a JPEG file");
    }
    let segment_len = 2 + EXIF_HEADER.len() + tiff.len();
    let segment_len = u16::try_from(segment_len).map_err(|_| anyhow!("exif block too large"))?;

    let mut app1 = Vec::with_capacity(segment_len as usize + 2);
    app1.extend_from_slice(&[0xFF, APP1]);
    app1.extend_from_slice(&segment_len.to_be_bytes());
    app1.extend_from_slice(EXIF_HEADER);
    app1.extend_from_slice(tiff);

    let mut out = Vec::with_capacity(jpeg.len() + app1.len());
    out.extend_from_slice(&SOI);
    let mut inserted = false;
    let mut pos = 2;
    while pos < jpeg.len() {
        if jpeg[pos] != 0xFF || pos + 1 >= jpeg.len() {
            bail!("corrupt JPEG marker at offset {}", pos);
        }
        let marker = jpeg[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == SOS || marker == EOI {
            if !inserted {
                out.extend_from_slice(&app1);
            }
            out.extend_from_slice(&jpeg[pos..]);
            return Ok(out);
        }
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            out.extend_from_slice(&jpeg[pos..pos + 2]);
            pos += 2;
            continue;
        }
        if pos + 4 > jpeg.len() {
            bail!("truncated JPEG segment at offset {}", pos);
        }
        let len = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        if len < 2 || pos + 2 + len > jpeg.len() {
            bail!("truncated JPEG segment at offset {}", pos);
        }
        let segment = &jpeg[pos..pos + 2 + len];
        if !inserted && marker != APP0 {
            out.extend_from_slice(&app1);
            inserted = true;
        }
        let is_exif = marker == APP1 && segment[4..].starts_with(EXIF_HEADER);
        if !is_exif {
            out.extend_from_slice(segment);
        }
        pos += 2 + len;
    }
    if !inserted {
        out.extend_from_slice(&app1);
    }
    Ok(out)
}

/// Swaps the file contents atomically, keeping its permissions. Symlinks are
/// resolved first so the link stays in place and its target gets the new bytes.
fn replace_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let resolved = fs::canonicalize(path).with_context(|| format!("resolve {}", path.display()))?;
    let path = resolved.as_path();
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let permissions = fs::metadata(path)?.permissions();
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    fs::set_permissions(tmp.path(), permissions)?;
    tmp.persist(path)?;
    Ok(())
}
