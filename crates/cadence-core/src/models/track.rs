use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::StoredQuality;

/// Onboarding state of a track as seen by the work queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStatus {
    /// Accepted and waiting for a worker
    Pending,
    /// Exclusively held by one worker
    Claimed,
    /// Released after successful onboarding
    Onboarded,
}

impl Display for OnboardingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            OnboardingStatus::Pending => write!(f, "pending"),
            OnboardingStatus::Claimed => write!(f, "claimed"),
            OnboardingStatus::Onboarded => write!(f, "onboarded"),
        }
    }
}

impl FromStr for OnboardingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OnboardingStatus::Pending),
            "claimed" => Ok(OnboardingStatus::Claimed),
            "onboarded" => Ok(OnboardingStatus::Onboarded),
            _ => Err(anyhow::anyhow!("Invalid onboarding status: {}", s)),
        }
    }
}

/// Audio properties read from the decoded stream headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioProperties {
    /// Average bitrate in kbps
    pub bitrate: i32,
    /// Sample rate in Hz
    pub sample_rate: i32,
    pub mimetype: String,
}

/// Durable catalog representation of a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: Uuid,
    pub hash: Option<String>,
    pub original_bitrate: Option<i32>,
    pub sample_rate: Option<i32>,
    pub mimetype: Option<String>,
    pub onboarding_status: OnboardingStatus,
    /// Whitelisted field id -> value
    pub metadata: BTreeMap<i32, String>,
    pub qualities: Vec<StoredQuality>,
    pub created_at: DateTime<Utc>,
}

impl Track {
    /// Initial record written when an upload is accepted.
    pub fn pending(id: Uuid) -> Self {
        Self {
            id,
            hash: None,
            original_bitrate: None,
            sample_rate: None,
            mimetype: None,
            onboarding_status: OnboardingStatus::Pending,
            metadata: BTreeMap::new(),
            qualities: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn audio_properties(&self) -> Option<AudioProperties> {
        Some(AudioProperties {
            bitrate: self.original_bitrate?,
            sample_rate: self.sample_rate?,
            mimetype: self.mimetype.clone()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            OnboardingStatus::Pending,
            OnboardingStatus::Claimed,
            OnboardingStatus::Onboarded,
        ] {
            assert_eq!(status.to_string().parse::<OnboardingStatus>().unwrap(), status);
        }
        assert!("running".parse::<OnboardingStatus>().is_err());
    }

    #[test]
    fn audio_properties_require_all_fields() {
        let mut track = Track::pending(Uuid::new_v4());
        assert!(track.audio_properties().is_none());

        track.original_bitrate = Some(256);
        track.sample_rate = Some(44_100);
        assert!(track.audio_properties().is_none());

        track.mimetype = Some("audio/mpeg".to_string());
        let props = track.audio_properties().unwrap();
        assert_eq!(props.bitrate, 256);
        assert_eq!(props.sample_rate, 44_100);
    }
}
