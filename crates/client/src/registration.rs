//! Registration: which controller version is live.
//!
//! A new version is installed beside the running one. If installation fails
//! the running version keeps serving; if it succeeds the new version is
//! activated and takes over, and the old one becomes redundant.

use std::sync::Arc;

use shellcache_core::{CacheStorage, Error};
use tokio::sync::RwLock;

use crate::controller::{FetchOutcome, OfflineController};
use crate::message;
use crate::network::Network;
use crate::request::InterceptedRequest;

pub struct Registration<N, S> {
    active: RwLock<Option<Arc<OfflineController<N, S>>>>,
    installing: RwLock<Option<Arc<OfflineController<N, S>>>>,
}

impl<N, S> Default for Registration<N, S> {
    fn default() -> Self {
        Self { active: RwLock::new(None), installing: RwLock::new(None) }
    }
}

impl<N, S> Registration<N, S>
where
    N: Network + 'static,
    S: CacheStorage + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// The controller currently answering requests.
    pub async fn active(&self) -> Option<Arc<OfflineController<N, S>>> {
        self.active.read().await.clone()
    }

    /// Install and activate a new version.
    ///
    /// # Errors
    ///
    /// Returns the install error; the previously active version, if any,
    /// stays in place.
    pub async fn register(&self, controller: OfflineController<N, S>) -> Result<Arc<OfflineController<N, S>>, Error> {
        let controller = Arc::new(controller);
        *self.installing.write().await = Some(controller.clone());

        let installed = controller.install().await;
        *self.installing.write().await = None;

        if let Err(err) = installed {
            let kept = self.active().await.map(|c| c.version().to_string());
            tracing::warn!(version = %controller.version(), kept = ?kept, error = %err, "new version discarded");
            return Err(err);
        }

        controller.activate().await?;

        let previous = self.active.write().await.replace(controller.clone());
        if let Some(previous) = previous {
            tracing::info!(from = %previous.version(), to = %controller.version(), "controller superseded");
            previous.mark_redundant();
        }

        Ok(controller)
    }

    /// Make an already installed version active again after a restart.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotActive` if the version was never installed.
    pub async fn restore(&self, controller: OfflineController<N, S>) -> Result<Arc<OfflineController<N, S>>, Error> {
        let controller = Arc::new(controller);
        controller.restore().await?;
        if let Some(previous) = self.active.write().await.replace(controller.clone()) {
            previous.mark_redundant();
        }
        Ok(controller)
    }

    /// Deliver a JSON control message posted by the application.
    ///
    /// Goes to the installing version if there is one, else the active one.
    pub async fn post_message(&self, json: &str) -> Result<(), Error> {
        let Some(msg) = message::parse(json)? else {
            return Ok(());
        };

        let target = match self.installing.read().await.clone() {
            Some(installing) => Some(installing),
            None => self.active().await,
        };

        match target {
            Some(controller) => controller.handle_message(msg),
            None => tracing::debug!(?msg, "no controller to receive message"),
        }
        Ok(())
    }

    /// Route a request to the active controller.
    pub async fn handle_fetch(&self, request: &InterceptedRequest) -> Result<FetchOutcome, Error> {
        match self.active().await {
            Some(controller) => controller.handle_fetch(request).await,
            None => Ok(FetchOutcome::Unhandled),
        }
    }
}
