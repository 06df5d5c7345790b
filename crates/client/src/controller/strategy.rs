//! Routing strategies and write-behind caching.

use std::sync::{Arc, Mutex};

use shellcache_core::{CacheStorage, Error, ResponseSnapshot};
use tokio::task::JoinHandle;

use super::{OfflineController, ResponseSource};
use crate::network::Network;
use crate::request::InterceptedRequest;
use crate::router::SHELL_PATH;

/// Opportunistic writes into the runtime generation.
///
/// Each write runs on its own task so the response is never held up by
/// storage; failures are logged and dropped.
pub(super) struct WriteBehind<S> {
    storage: Arc<S>,
    generation: String,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: CacheStorage + 'static> WriteBehind<S> {
    pub(super) fn new(storage: Arc<S>, generation: String) -> Self {
        Self { storage, generation, pending: Mutex::new(Vec::new()) }
    }

    /// Queue a store of `response` under `key` if it passes the cacheability gate.
    pub(super) fn store(&self, key: String, response: &ResponseSnapshot) {
        if !response.is_cacheable() {
            tracing::trace!(url = %key, status = response.status, kind = %response.kind, "not cacheable");
            return;
        }

        let storage = self.storage.clone();
        let generation = self.generation.clone();
        let response = response.clone();
        let handle = tokio::spawn(async move {
            if let Err(err) = storage.put(&generation, &key, &response).await {
                tracing::warn!(url = %key, generation = %generation, error = %err, "cache write failed");
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    pub(super) async fn settle(&self) {
        let handles: Vec<_> = {
            let mut pending = self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            pending.drain(..).collect()
        };
        for handle in handles {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "cache write task aborted");
            }
        }
    }
}

impl<N, S> OfflineController<N, S>
where
    N: Network + 'static,
    S: CacheStorage + 'static,
{
    /// Cached copy, preferring this version's runtime then static generation
    /// over anything an earlier version left behind. Read failures count as a miss.
    async fn cached(&self, key: &str) -> Option<ResponseSnapshot> {
        let names = &self.names;
        for generation in [&names.runtime_name, &names.static_name] {
            match self.storage.lookup(generation, key).await {
                Ok(Some(hit)) => return Some(hit),
                Ok(None) => {}
                Err(err) => tracing::warn!(url = %key, generation = %generation, error = %err, "cache read failed"),
            }
        }

        match self.storage.lookup_any(key).await {
            Ok(hit) => hit,
            Err(err) => {
                tracing::warn!(url = %key, error = %err, "cache read failed");
                None
            }
        }
    }

    /// Best answer available without the network.
    ///
    /// Exact cached copy, then (navigations only) the cached root document,
    /// then a synthesized 503.
    async fn offline_fallback(&self, request: &InterceptedRequest, key: &str) -> (ResponseSource, ResponseSnapshot) {
        if let Some(hit) = self.cached(key).await {
            return (ResponseSource::Cache, hit);
        }

        if request.is_navigation() {
            let shell_key = shellcache_core::cache::entries::cache_key(&self.scope.url_for(SHELL_PATH));
            if let Some(shell) = self.cached(&shell_key).await {
                tracing::debug!(url = %request.url, "serving app shell");
                return (ResponseSource::AppShell, shell);
            }
        }

        tracing::debug!(url = %request.url, "no cached copy, synthesizing offline response");
        (ResponseSource::Synthesized, ResponseSnapshot::service_unavailable())
    }

    pub(super) async fn cache_first(
        &self, request: &InterceptedRequest,
    ) -> Result<(ResponseSource, ResponseSnapshot), Error> {
        let key = request.cache_key();
        if let Some(hit) = self.cached(&key).await {
            return Ok((ResponseSource::Cache, hit));
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                self.writes.store(key, &response);
                Ok((ResponseSource::Network, response))
            }
            Err(err) => {
                tracing::warn!(url = %request.url, error = %err, "cache-first miss with network down");
                Err(err)
            }
        }
    }

    /// Network-first; also used for navigations, whose fallback adds the app shell.
    pub(super) async fn network_first(&self, request: &InterceptedRequest) -> (ResponseSource, ResponseSnapshot) {
        let key = request.cache_key();
        match self.network.fetch(request).await {
            Ok(response) => {
                self.writes.store(key, &response);
                (ResponseSource::Network, response)
            }
            Err(err) => {
                tracing::debug!(url = %request.url, error = %err, "network failed, trying cache");
                self.offline_fallback(request, &key).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingStorage;
    use shellcache_core::ResponseKind;

    #[tokio::test]
    async fn test_write_behind_skips_uncacheable() {
        let storage = Arc::new(RecordingStorage::new().await);
        let writes = WriteBehind::new(storage.clone(), "runtime-v1".to_string());

        writes.store("https://clinic.example/a".into(), &ResponseSnapshot::basic(500, "boom"));
        writes.store("https://clinic.example/b".into(), &ResponseSnapshot::basic(200, "").with_kind(ResponseKind::Cors));
        writes.settle().await;

        assert!(storage.ops().is_empty());
    }

    #[tokio::test]
    async fn test_write_behind_stores_and_settles() {
        let storage = Arc::new(RecordingStorage::new().await);
        let writes = WriteBehind::new(storage.clone(), "runtime-v1".to_string());

        for i in 0..5 {
            writes.store(format!("https://clinic.example/{i}"), &ResponseSnapshot::basic(200, "ok"));
        }
        writes.settle().await;

        assert_eq!(storage.keys("runtime-v1").await.unwrap().len(), 5);
    }
}
