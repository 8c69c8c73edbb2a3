use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A transcoding target loaded from the catalog. Reference data: onboarding
/// only reads these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Quality {
    pub id: i32,
    /// Target bitrate in kbps
    pub bitrate: i32,
    /// Encoder codec identifier passed to the transcoder (e.g. `libmp3lame`)
    pub codec: String,
    /// File extension of the rendered artifact, without the dot
    pub extension: String,
    /// Remote directory the rendition is stored under
    pub directory: String,
}

/// A rendition a track has been stored at.
///
/// `Original` is the reserved pseudo-quality holding the untouched upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "quality_id")]
pub enum StoredQuality {
    Original,
    Variant(i32),
}

impl StoredQuality {
    pub fn quality_id(&self) -> Option<i32> {
        match self {
            StoredQuality::Original => None,
            StoredQuality::Variant(id) => Some(*id),
        }
    }
}

impl Display for StoredQuality {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StoredQuality::Original => write!(f, "original"),
            StoredQuality::Variant(id) => write!(f, "quality:{}", id),
        }
    }
}

impl From<&Quality> for StoredQuality {
    fn from(quality: &Quality) -> Self {
        StoredQuality::Variant(quality.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn original_sorts_before_variants() {
        let mut stored = vec![
            StoredQuality::Variant(3),
            StoredQuality::Original,
            StoredQuality::Variant(1),
        ];
        stored.sort();
        assert_eq!(
            stored,
            vec![StoredQuality::Original, StoredQuality::Variant(1), StoredQuality::Variant(3)]
        );
    }

    #[test]
    fn stored_quality_serializes_with_kind_tag() {
        assert_eq!(
            serde_json::to_value(StoredQuality::Variant(4)).unwrap(),
            serde_json::json!({ "kind": "variant", "quality_id": 4 })
        );
        assert_eq!(
            serde_json::to_value(StoredQuality::Original).unwrap(),
            serde_json::json!({ "kind": "original" })
        );
    }
}
