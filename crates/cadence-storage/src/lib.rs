//! Cadence Storage Library
//!
//! The two storage tiers used during onboarding:
//!
//! - **Local tier** ([`LocalStorage`]): a directory on the worker host holding
//!   freshly uploaded originals and transcoded renditions. Deletes fail with
//!   [`StorageError::FileBusy`] while a handle obtained from
//!   [`LocalStorage::open`] is still alive.
//! - **Remote tier** ([`RemoteStorage`]): the durable object store, one
//!   container holding every track object.
//!
//! # Storage key format
//!
//! - local original: `{track_id}`
//! - local rendition: `{track_id}.{bitrate}.{extension}`
//! - remote object: `{directory}/{track_id}` inside the container, where the
//!   untouched upload uses the `original` directory
//!
//! Keys must not contain `..` or a leading `/`. Key generation lives in
//! [`keys`] so the worker and compensation agree on every path.

pub mod factory;
pub mod keys;
pub mod local;
pub mod remote;
pub mod traits;

// Re-export commonly used types
pub use cadence_core::RemoteBackend;
pub use factory::create_remote_storage;
pub use local::{LocalFileHandle, LocalStorage};
pub use remote::ObjectRemoteStorage;
pub use traits::{RemoteStorage, StorageError, StorageResult};
