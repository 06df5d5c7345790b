//! Offline cache controller: lifecycle state and fetch interception.
//!
//! One [`OfflineController`] is one deployed version. It moves through
//! `Parsed → Installing → Installed → Activating → Activated`, or ends up
//! `Redundant` when installation fails or a newer version takes over.
//! Only an activated controller answers requests.

mod strategy;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use shellcache_core::{CacheStorage, Error, GenerationNames, ResponseSnapshot};
use url::Url;

use crate::message::ControlMessage;
use crate::network::Network;
use crate::request::InterceptedRequest;
use crate::router::{APP_SHELL_MANIFEST, Route, Scope, route};

use strategy::WriteBehind;

/// Lifecycle of one controller version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControllerState::Parsed => "parsed",
            ControllerState::Installing => "installing",
            ControllerState::Installed => "installed",
            ControllerState::Activating => "activating",
            ControllerState::Activated => "activated",
            ControllerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Where a response handed back to the application came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// The cached root document, served in place of an uncached page.
    AppShell,
    /// Built locally because neither network nor cache could answer.
    Synthesized,
}

/// Result of intercepting one request.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Left to the platform's default network handling.
    Unhandled,
    Responded { route: Route, source: ResponseSource, response: ResponseSnapshot },
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&ResponseSnapshot> {
        match self {
            FetchOutcome::Unhandled => None,
            FetchOutcome::Responded { response, .. } => Some(response),
        }
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            FetchOutcome::Unhandled => None,
            FetchOutcome::Responded { source, .. } => Some(*source),
        }
    }
}

/// State holder for one controller version.
pub struct OfflineController<N, S> {
    names: GenerationNames,
    scope: Scope,
    network: Arc<N>,
    storage: Arc<S>,
    state: Mutex<ControllerState>,
    skip_waiting: AtomicBool,
    clients_claimed: AtomicBool,
    writes: WriteBehind<S>,
}

impl<N, S> OfflineController<N, S>
where
    N: Network + 'static,
    S: CacheStorage + 'static,
{
    pub fn new(version: &str, origin: Url, network: Arc<N>, storage: Arc<S>) -> Self {
        let names = GenerationNames::for_version(version);
        let writes = WriteBehind::new(storage.clone(), names.runtime_name.clone());
        Self {
            names,
            scope: Scope::for_origin(origin),
            network,
            storage,
            state: Mutex::new(ControllerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            clients_claimed: AtomicBool::new(false),
            writes,
        }
    }

    pub fn version(&self) -> &str {
        &self.names.version
    }

    pub fn generations(&self) -> &GenerationNames {
        &self.names
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether this version asked to replace the running one immediately.
    pub fn wants_skip_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Whether this version has taken control of open clients.
    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: ControllerState) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let from = *state;
        tracing::debug!(version = %self.names.version, %from, to = %next, "controller state");
        *state = next;
    }

    fn advance(&self, expected: ControllerState, next: ControllerState) -> Result<(), Error> {
        let current = self.state();
        if current != expected {
            return Err(Error::NotActive(format!(
                "controller {} is {current}, expected {expected}",
                self.names.version
            )));
        }
        self.set_state(next);
        Ok(())
    }

    pub(crate) fn mark_redundant(&self) {
        self.set_state(ControllerState::Redundant);
    }

    /// Apply a control message from the application.
    pub fn handle_message(&self, message: ControlMessage) {
        match message {
            ControlMessage::SkipWaiting => {
                tracing::info!(version = %self.names.version, "skip waiting requested");
                self.skip_waiting.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Install this version.
    ///
    /// On a development origin nothing is cached. Otherwise the app shell is
    /// fetched in full and written as one batch; any failed or non-ok entry
    /// fails the install and leaves the static generation untouched.
    pub async fn install(&self) -> Result<(), Error> {
        self.advance(ControllerState::Parsed, ControllerState::Installing)?;

        if self.scope.is_development() {
            tracing::info!(origin = %self.scope.origin(), "development origin, skipping app shell");
            self.set_state(ControllerState::Installed);
            self.handle_message(ControlMessage::SkipWaiting);
            return Ok(());
        }

        match self.seed_app_shell().await {
            Ok(count) => {
                tracing::info!(
                    version = %self.names.version,
                    generation = %self.names.static_name,
                    entries = count,
                    "app shell cached"
                );
                self.set_state(ControllerState::Installed);
                self.handle_message(ControlMessage::SkipWaiting);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(version = %self.names.version, error = %err, "install failed");
                self.set_state(ControllerState::Redundant);
                Err(err)
            }
        }
    }

    async fn seed_app_shell(&self) -> Result<usize, Error> {
        let generation = &self.names.static_name;
        let mut batch = Vec::with_capacity(APP_SHELL_MANIFEST.len());
        for path in APP_SHELL_MANIFEST {
            let request = InterceptedRequest::get(self.scope.url_for(path));
            let response = self
                .network
                .fetch(&request)
                .await
                .map_err(|e| Error::InstallFailed { path: path.to_string(), reason: e.to_string() })?;
            if !response.is_ok() {
                return Err(Error::InstallFailed { path: path.to_string(), reason: format!("status {}", response.status) });
            }
            batch.push((request.cache_key(), response));
        }

        // put_all creates the generation inside its transaction
        let count = batch.len();
        self.storage
            .put_all(generation, batch)
            .await
            .map_err(|e| Error::InstallFailed { path: generation.clone(), reason: e.to_string() })?;
        Ok(count)
    }

    /// Activate this version.
    ///
    /// Deletes every generation that is not this version's static or runtime
    /// generation, then claims open clients. Storage failures here are logged
    /// and left for the next activation; they do not block taking control.
    /// Returns the deleted generation names.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.advance(ControllerState::Installed, ControllerState::Activating)?;

        let mut deleted = Vec::new();
        match self.storage.names().await {
            Ok(names) => {
                for name in names.into_iter().filter(|n| !self.names.is_current(n)) {
                    match self.storage.delete(&name).await {
                        Ok(_) => deleted.push(name),
                        Err(err) => tracing::warn!(generation = %name, error = %err, "failed to delete stale generation"),
                    }
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to list generations"),
        }

        self.clients_claimed.store(true, Ordering::SeqCst);
        self.set_state(ControllerState::Activated);
        tracing::info!(version = %self.names.version, deleted = ?deleted, "controller activated");
        Ok(deleted)
    }

    /// Resume a version that was installed and activated by an earlier process.
    ///
    /// Succeeds when this version's static generation holds the whole app
    /// shell (or the origin is a development origin, which never caches).
    pub async fn restore(&self) -> Result<(), Error> {
        let current = self.state();
        if current != ControllerState::Parsed {
            return Err(Error::NotActive(format!("controller {} is {current}, expected parsed", self.names.version)));
        }

        if !self.scope.is_development() {
            let stored = self.storage.keys(&self.names.static_name).await?;
            let missing = APP_SHELL_MANIFEST
                .iter()
                .find(|path| !stored.contains(&InterceptedRequest::get(self.scope.url_for(path)).cache_key()));
            if let Some(path) = missing {
                return Err(Error::NotActive(format!(
                    "version {} is not installed ({path} missing from {})",
                    self.names.version, self.names.static_name
                )));
            }
        }

        self.clients_claimed.store(true, Ordering::SeqCst);
        self.set_state(ControllerState::Activated);
        tracing::info!(version = %self.names.version, "controller restored");
        Ok(())
    }

    /// Intercept one request.
    ///
    /// Only cache-first total misses and failed range passthroughs return
    /// `Err`; every other failure becomes a cached, app shell or synthesized
    /// response.
    pub async fn handle_fetch(&self, request: &InterceptedRequest) -> Result<FetchOutcome, Error> {
        if self.state() != ControllerState::Activated {
            return Ok(FetchOutcome::Unhandled);
        }

        let route = route(request, &self.scope);
        tracing::debug!(method = %request.method, url = %request.url, route = route.name(), "intercept");

        let (source, response) = match route {
            Route::Bypass(reason) => {
                tracing::trace!(url = %request.url, ?reason, "bypass");
                return Ok(FetchOutcome::Unhandled);
            }
            Route::RangePassthrough => (ResponseSource::Network, self.network.fetch(request).await?),
            Route::CacheFirst => self.cache_first(request).await?,
            Route::NetworkFirst | Route::Navigation => self.network_first(request).await,
        };

        Ok(FetchOutcome::Responded { route, source, response })
    }

    /// Wait for background cache writes started so far.
    pub async fn settle(&self) {
        self.writes.settle().await;
    }
}
