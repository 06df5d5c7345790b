//! Offline cache controller for shellcache.
//!
//! This crate provides the request router, the network adapter, the routing
//! strategies, and the controller lifecycle built on the storage in
//! `shellcache-core`.

pub mod controller;
pub mod message;
pub mod network;
pub mod registration;
pub mod request;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{ControllerState, FetchOutcome, OfflineController, ResponseSource};
pub use message::ControlMessage;
pub use network::{HttpNetwork, Network, NetworkConfig};
pub use registration::Registration;
pub use request::{Destination, InterceptedRequest, RequestMode, UrlError, resolve};
pub use router::{APP_SHELL_MANIFEST, BypassReason, Route, Scope, route};
