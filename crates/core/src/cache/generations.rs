//! Generation naming and lifecycle operations.
//!
//! A release owns exactly two generations, `static-<version>` for the app
//! shell and `runtime-<version>` for everything cached while running. Older
//! generations are deleted wholesale on activation, never patched.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

pub const STATIC_PREFIX: &str = "static-";
pub const RUNTIME_PREFIX: &str = "runtime-";

/// The pair of generation names that belong to one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationNames {
    pub version: String,
    pub static_name: String,
    pub runtime_name: String,
}

impl GenerationNames {
    pub fn for_version(version: &str) -> Self {
        Self {
            version: version.to_string(),
            static_name: format!("{STATIC_PREFIX}{version}"),
            runtime_name: format!("{RUNTIME_PREFIX}{version}"),
        }
    }

    /// Whether `name` is one of the two generations of this release.
    pub fn is_current(&self, name: &str) -> bool {
        name == self.static_name || name == self.runtime_name
    }
}

impl CacheDb {
    /// Create a generation if it does not exist yet.
    pub async fn open_generation(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![name, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// List generation names in creation order.
    pub async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at ASC, rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and, by cascade, all of its entries.
    ///
    /// Returns whether the generation existed.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
