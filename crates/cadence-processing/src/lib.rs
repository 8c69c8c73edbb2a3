//! Cadence processing
//!
//! The per-track stages the onboarding worker runs in order: content hashing,
//! container detection and tag extraction, quality ladder selection, and the
//! external encoder driver.

pub mod hash;
pub mod ladder;
pub mod metadata;
pub mod transcode;

pub use hash::{content_hash, hash_reader};
pub use ladder::{select_ladder, LadderStep, RenditionStrategy};
pub use metadata::{
    detect_mimetype, extract_tags, ExtractedTags, MetadataError, HEADER_LEN, TAG_FIELDS,
};
pub use transcode::{Encoder, FfmpegTranscoder, TranscodeError, TranscodeJob};
