//! Storage seam used by the controller.
//!
//! The controller only talks to this trait, so tests can wrap the SQLite
//! backend and observe (or fail) individual cache operations.

use async_trait::async_trait;

use super::connection::CacheDb;
use super::entries::ResponseSnapshot;
use crate::Error;

/// Named cache generations holding URL-keyed response snapshots.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the generation if missing.
    async fn open(&self, generation: &str) -> Result<(), Error>;

    /// All generation names, oldest first.
    async fn names(&self) -> Result<Vec<String>, Error>;

    /// Delete a generation with all its entries. Returns whether it existed.
    async fn delete(&self, generation: &str) -> Result<bool, Error>;

    /// Look up a key in one generation.
    async fn lookup(&self, generation: &str, url: &str) -> Result<Option<ResponseSnapshot>, Error>;

    /// Look up a key in every generation, oldest generation first.
    async fn lookup_any(&self, url: &str) -> Result<Option<ResponseSnapshot>, Error>;

    /// Store one entry, overwriting any previous entry for the key.
    async fn put(&self, generation: &str, url: &str, response: &ResponseSnapshot) -> Result<(), Error>;

    /// Store a batch atomically.
    async fn put_all(&self, generation: &str, batch: Vec<(String, ResponseSnapshot)>) -> Result<(), Error>;

    /// Keys stored in a generation.
    async fn keys(&self, generation: &str) -> Result<Vec<String>, Error>;
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        self.open_generation(generation).await
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        self.generation_names().await
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        self.delete_generation(generation).await
    }

    async fn lookup(&self, generation: &str, url: &str) -> Result<Option<ResponseSnapshot>, Error> {
        self.get_entry(generation, url).await
    }

    async fn lookup_any(&self, url: &str) -> Result<Option<ResponseSnapshot>, Error> {
        self.find_entry(url).await
    }

    async fn put(&self, generation: &str, url: &str, response: &ResponseSnapshot) -> Result<(), Error> {
        self.put_entry(generation, url, response).await
    }

    async fn put_all(&self, generation: &str, batch: Vec<(String, ResponseSnapshot)>) -> Result<(), Error> {
        self.put_entries(generation, batch).await
    }

    async fn keys(&self, generation: &str) -> Result<Vec<String>, Error> {
        self.entry_urls(generation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_trait_object_roundtrip() {
        let storage: Arc<dyn CacheStorage> = Arc::new(CacheDb::open_in_memory().await.unwrap());
        storage.open("static-v2").await.unwrap();
        storage
            .put("runtime-v2", "https://clinic.example/x", &ResponseSnapshot::basic(200, "x"))
            .await
            .unwrap();

        assert_eq!(storage.names().await.unwrap(), vec!["static-v2".to_string(), "runtime-v2".to_string()]);
        assert!(storage.lookup_any("https://clinic.example/x").await.unwrap().is_some());
        assert!(storage.lookup("static-v2", "https://clinic.example/x").await.unwrap().is_none());
    }
}
