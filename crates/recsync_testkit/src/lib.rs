//! # Recsync Testkit
//!
//! Test utilities for recsync.
//!
//! This crate provides:
//! - Fixtures wiring in-memory collaborators into an orchestrator
//! - Property-based test generators using proptest
//! - An in-memory HTTP server for loopback end-to-end tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recsync_testkit::prelude::*;
//!
//! #[test]
//! fn uploads_pending() {
//!     let world = SyncWorld::new();
//!     world.store.save_local(child_record("a", "Ana"));
//!     let outcome = world.orchestrator().run(&worker()).unwrap();
//!     assert_eq!(outcome.summary().uploaded, 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod server;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::server::*;
}

pub use fixtures::*;
pub use generators::*;
pub use server::*;
