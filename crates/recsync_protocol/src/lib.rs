//! # recsync Protocol
//!
//! Record, revision and wire types shared by the recsync engine and its
//! adapters.
//!
//! This crate provides:
//! - `Record`, `RecordId` and `Revision` for synchronized entities
//! - `Media` references attached to records
//! - `IdRevisionMap` and the id/revision diff used to pick downloads
//! - JSON documents exchanged with the remote (index, blacklist status, forms)
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod diff;
mod error;
mod messages;
mod record;
mod user;

pub use diff::{ids_to_download, IdRevisionMap};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{BlacklistStatus, FormField, FormSection, RemoteIndex, RemoteIndexEntry};
pub use record::{Media, MediaId, MediaKind, MediaRef, Record, RecordId, Revision};
pub use user::SyncUser;
