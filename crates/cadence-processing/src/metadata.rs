//! Container detection and tag extraction
//!
//! The mimetype comes from the file's leading bytes only; a file without a
//! recognised audio signature is rejected before any tag parsing. Tags are read
//! through lofty and mapped onto catalog field ids via the static
//! [`TAG_FIELDS`] table, filtered by the catalog's whitelist.

use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::Tag;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

/// Bytes of the file header inspected for a container signature.
pub const HEADER_LEN: usize = 8192;

/// Metadata extraction errors
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read file: {0}")]
    ReadError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Tags and audio properties extracted from one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTags {
    /// Whitelisted field id -> value
    pub metadata: BTreeMap<i32, String>,
    /// kbps
    pub bitrate: i32,
    /// Hz
    pub sample_rate: i32,
}

/// A tag field the catalog may store, and how to read it.
pub struct TagField {
    pub name: &'static str,
    read: fn(&Tag) -> Option<String>,
}

impl TagField {
    pub fn read(&self, tag: &Tag) -> Option<String> {
        (self.read)(tag)
    }
}

fn text(value: Option<Cow<'_, str>>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn item(tag: &Tag, key: ItemKey) -> Option<String> {
    text(tag.get_string(&key).map(Cow::Borrowed))
}

// Zero means "not set" for numeric tags.
fn number(value: Option<u32>) -> Option<String> {
    value.filter(|n| *n > 0).map(|n| n.to_string())
}

fn bpm(tag: &Tag) -> Option<String> {
    let raw = tag.get_string(&ItemKey::Bpm)?;
    let value = raw.trim().parse::<f64>().ok()?.round();
    if value >= 1.0 && value <= u32::MAX as f64 {
        number(Some(value as u32))
    } else {
        None
    }
}

/// Every tag field the extractor knows how to read. Only those whose name is
/// in the catalog whitelist are kept.
pub static TAG_FIELDS: &[TagField] = &[
    TagField { name: "Title", read: |t| text(t.title()) },
    TagField { name: "Album", read: |t| text(t.album()) },
    TagField { name: "Performer", read: |t| text(t.artist()) },
    TagField { name: "AlbumArtist", read: |t| item(t, ItemKey::AlbumArtist) },
    TagField { name: "Composer", read: |t| item(t, ItemKey::Composer) },
    TagField { name: "Genre", read: |t| text(t.genre()) },
    TagField { name: "Year", read: |t| number(t.year()) },
    TagField { name: "Track", read: |t| number(t.track()) },
    TagField { name: "TrackCount", read: |t| number(t.track_total()) },
    TagField { name: "Disc", read: |t| number(t.disk()) },
    TagField { name: "DiscCount", read: |t| number(t.disk_total()) },
    TagField { name: "Comment", read: |t| text(t.comment()) },
    TagField { name: "Lyrics", read: |t| item(t, ItemKey::Lyrics) },
    TagField { name: "BeatsPerMinute", read: bpm },
    TagField { name: "Conductor", read: |t| item(t, ItemKey::Conductor) },
    TagField { name: "Copyright", read: |t| item(t, ItemKey::CopyrightMessage) },
    TagField { name: "Grouping", read: |t| item(t, ItemKey::ContentGroup) },
];

/// Detect an audio container from the leading bytes of a file.
///
/// Returns `None` when no audio signature matches; video and image containers
/// are rejected as well.
pub fn detect_mimetype(header: &[u8]) -> Option<&'static str> {
    infer::get(header)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Audio)
        .map(|kind| kind.mime_type())
}

/// Map a tag onto whitelisted field ids, dropping empty and zero values.
pub fn collect_fields(tag: &Tag, allowed: &HashMap<String, i32>) -> BTreeMap<i32, String> {
    TAG_FIELDS
        .iter()
        .filter_map(|field| {
            let id = *allowed.get(field.name)?;
            field.read(tag).map(|value| (id, value))
        })
        .collect()
}

/// Read tags and audio properties from `path`.
///
/// Blocking; async callers run it on the blocking pool.
pub fn extract_tags(
    path: &Path,
    mimetype: &str,
    allowed: &HashMap<String, i32>,
) -> Result<ExtractedTags, MetadataError> {
    let tagged_file = Probe::open(path)
        .map_err(|e| MetadataError::ReadError(e.to_string()))?
        .guess_file_type()?
        .read()
        .map_err(|e| MetadataError::UnsupportedFormat(format!("{}: {}", mimetype, e)))?;

    let properties = tagged_file.properties();
    let bitrate = properties
        .audio_bitrate()
        .or_else(|| properties.overall_bitrate())
        .filter(|kbps| *kbps > 0)
        .ok_or_else(|| {
            MetadataError::UnsupportedFormat(format!("{}: no audio bitrate", mimetype))
        })?;
    let sample_rate = properties.sample_rate().unwrap_or(0);

    let metadata = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
        .map(|tag| collect_fields(tag, allowed))
        .unwrap_or_default();

    tracing::debug!(
        file = %path.display(),
        mimetype = %mimetype,
        bitrate_kbps = bitrate,
        sample_rate = sample_rate,
        fields = metadata.len(),
        "Extracted metadata"
    );

    Ok(ExtractedTags {
        metadata,
        bitrate: i32::try_from(bitrate).unwrap_or(i32::MAX),
        sample_rate: i32::try_from(sample_rate).unwrap_or(i32::MAX),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lofty::tag::TagType;
    use std::collections::HashSet;
    use std::io::Write;

    fn whitelist(names: &[&str]) -> HashMap<String, i32> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.to_string(), i as i32 + 1))
            .collect()
    }

    /// 16-bit mono PCM WAV with one second of silence.
    fn wav_bytes(sample_rate: u32) -> Vec<u8> {
        let data_len = sample_rate * 2;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&1u16.to_le_bytes()); // mono
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.resize(out.len() + data_len as usize, 0);
        out
    }

    #[test]
    fn field_names_are_unique() {
        let names: HashSet<_> = TAG_FIELDS.iter().map(|f| f.name).collect();
        assert_eq!(names.len(), TAG_FIELDS.len());
    }

    #[test]
    fn detects_audio_signatures() {
        assert_eq!(detect_mimetype(b"fLaC\0\0\0\x22"), Some("audio/x-flac"));
        assert_eq!(detect_mimetype(b"ID3\x03\0\0\0\0\0\0"), Some("audio/mpeg"));
        assert_eq!(detect_mimetype(&wav_bytes(8000)[..64]), Some("audio/x-wav"));
    }

    #[test]
    fn rejects_unknown_and_non_audio_headers() {
        assert_eq!(detect_mimetype(b"just some text, not audio"), None);
        assert_eq!(detect_mimetype(&[]), None);
        // PNG
        assert_eq!(detect_mimetype(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), None);
    }

    #[test]
    fn collects_only_whitelisted_non_empty_fields() {
        let mut tag = Tag::new(TagType::Id3v2);
        tag.set_title("Blue in Green".to_string());
        tag.set_artist("Miles Davis".to_string());
        tag.set_genre("   ".to_string());
        tag.set_track(0);
        tag.insert_text(ItemKey::Composer, "Bill Evans".to_string());

        let allowed = whitelist(&["Title", "Genre", "Track", "Composer"]);
        let fields = collect_fields(&tag, &allowed);

        assert_eq!(fields.get(&allowed["Title"]).map(String::as_str), Some("Blue in Green"));
        assert_eq!(fields.get(&allowed["Composer"]).map(String::as_str), Some("Bill Evans"));
        assert!(!fields.contains_key(&allowed["Genre"]));
        assert!(!fields.contains_key(&allowed["Track"]));
        // Performer is set on the tag but not whitelisted.
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn extracts_properties_from_wav() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&wav_bytes(44_100)).unwrap();
        file.flush().unwrap();

        let tags = extract_tags(file.path(), "audio/x-wav", &whitelist(&["Title"])).unwrap();
        assert_eq!(tags.sample_rate, 44_100);
        assert!(tags.bitrate > 0);
        assert!(tags.metadata.is_empty());
    }

    #[test]
    fn garbage_file_fails_extraction() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not audio").unwrap();
        file.flush().unwrap();

        assert!(extract_tags(file.path(), "audio/mpeg", &HashMap::new()).is_err());
    }
}
