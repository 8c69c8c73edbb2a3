//! Quality ladder selection

use cadence_core::models::Quality;

/// How a selected quality gets produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenditionStrategy {
    /// Bitrate is within the tolerance band: the original is stored as-is.
    CopyOriginal,
    Transcode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderStep {
    pub quality: Quality,
    pub strategy: RenditionStrategy,
}

/// Qualities to produce for a source at `original_bitrate` kbps.
///
/// Every quality strictly below the source is selected, plus every quality
/// within `tolerance` kbps of it. Qualities inside the band are copied rather
/// than re-encoded. Nothing above the band is ever produced. Input order is
/// preserved.
pub fn select_ladder(qualities: &[Quality], original_bitrate: i32, tolerance: i32) -> Vec<LadderStep> {
    qualities
        .iter()
        .filter_map(|quality| {
            let equivalent = (quality.bitrate - original_bitrate).abs() <= tolerance;
            let strategy = if equivalent {
                RenditionStrategy::CopyOriginal
            } else if quality.bitrate < original_bitrate {
                RenditionStrategy::Transcode
            } else {
                return None;
            };
            Some(LadderStep {
                quality: quality.clone(),
                strategy,
            })
        })
        .collect()
}
