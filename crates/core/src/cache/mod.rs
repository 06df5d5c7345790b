//! SQLite-backed cache generations for the offline controller.
//!
//! This module provides named, versioned cache buckets ("generations") that
//! map request URLs to response snapshots. It supports:
//!
//! - Atomic batch seeding of the app shell
//! - Last-write-wins upserts keyed by URL
//! - Whole-generation deletion (entries cascade)
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{ResponseKind, ResponseSnapshot};
pub use generations::GenerationNames;
pub use storage::CacheStorage;
