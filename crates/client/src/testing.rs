//! Test doubles for the network and storage seams.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use shellcache_core::{CacheDb, CacheStorage, Error, ResponseSnapshot};

use crate::network::Network;
use crate::request::InterceptedRequest;
use crate::router::APP_SHELL_MANIFEST;

/// Scripted network keyed by absolute URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct StubNetwork {
    responses: Mutex<HashMap<String, ResponseSnapshot>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl StubNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// A network that serves the whole app shell for `origin`.
    pub fn with_app_shell(origin: &str) -> Self {
        let network = Self::new();
        for path in APP_SHELL_MANIFEST {
            network.respond(&format!("{origin}{path}"), ResponseSnapshot::basic(200, format!("shell {path}")));
        }
        network
    }

    pub fn respond(&self, url: &str, response: ResponseSnapshot) {
        self.responses.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, Error> {
        let key = request.cache_key();
        self.calls.lock().unwrap().push(key.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{key}: offline")));
        }

        let known = self.responses.lock().unwrap().get(&key).cloned();
        Ok(known.unwrap_or_else(|| ResponseSnapshot::basic(404, "not found")))
    }
}

/// SQLite storage that records every operation and can be told to fail writes.
pub struct RecordingStorage {
    inner: CacheDb,
    ops: Mutex<Vec<String>>,
    fail_writes: AtomicBool,
}

impl RecordingStorage {
    pub async fn new() -> Self {
        Self { inner: CacheDb::open_in_memory().await.unwrap(), ops: Mutex::new(Vec::new()), fail_writes: AtomicBool::new(false) }
    }

    pub fn db(&self) -> &CacheDb {
        &self.inner
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn record(&self, op: &str, arg: &str) {
        self.ops.lock().unwrap().push(format!("{op} {arg}"));
    }

    fn check_write(&self) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Serialization("storage quota exceeded".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for RecordingStorage {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        self.record("open", generation);
        self.inner.open(generation).await
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        self.record("names", "");
        self.inner.names().await
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        self.record("delete", generation);
        self.inner.delete(generation).await
    }

    async fn lookup(&self, generation: &str, url: &str) -> Result<Option<ResponseSnapshot>, Error> {
        self.record("lookup", url);
        self.inner.lookup(generation, url).await
    }

    async fn lookup_any(&self, url: &str) -> Result<Option<ResponseSnapshot>, Error> {
        self.record("lookup_any", url);
        self.inner.lookup_any(url).await
    }

    async fn put(&self, generation: &str, url: &str, response: &ResponseSnapshot) -> Result<(), Error> {
        self.record("put", url);
        self.check_write()?;
        self.inner.put(generation, url, response).await
    }

    async fn put_all(&self, generation: &str, batch: Vec<(String, ResponseSnapshot)>) -> Result<(), Error> {
        self.record("put_all", generation);
        self.check_write()?;
        self.inner.put_all(generation, batch).await
    }

    async fn keys(&self, generation: &str) -> Result<Vec<String>, Error> {
        self.inner.keys(generation).await
    }
}
