//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Cache generation storage with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheStorage, GenerationNames, ResponseKind, ResponseSnapshot};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
