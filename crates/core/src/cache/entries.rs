//! Cached entry operations.
//!
//! An entry maps a request URL within one generation to a stored response
//! snapshot. Writes are upserts: the last write for a key wins and there is
//! never more than one entry per (generation, url).

use super::connection::CacheDb;
use crate::Error;
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;
use tokio_rusqlite::rusqlite;
use tokio_rusqlite::{Connection, params};
use url::Url;

/// Visibility class of a response, mirroring the fetch response `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Same-origin response with readable body and headers.
    Basic,
    /// Cross-origin response shared via CORS.
    Cors,
    /// Cross-origin response whose body cannot be read, including cross-origin redirects.
    Opaque,
    /// Network error placeholder.
    Error,
    /// Constructed locally rather than received from the network.
    Default,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Cors => "cors",
            ResponseKind::Opaque => "opaque",
            ResponseKind::Error => "error",
            ResponseKind::Default => "default",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ResponseKind::Basic),
            "cors" => Ok(ResponseKind::Cors),
            "opaque" => Ok(ResponseKind::Opaque),
            "error" => Ok(ResponseKind::Error),
            "default" => Ok(ResponseKind::Default),
            other => Err(Error::Serialization(format!("unknown response kind: {other}"))),
        }
    }
}

/// A response as received from the network or read back from a generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub status_text: String,
    pub kind: ResponseKind,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ResponseSnapshot {
    /// Build a same-origin response with no headers.
    pub fn basic(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, status_text: String::new(), kind: ResponseKind::Basic, headers: Vec::new(), body: body.into() }
    }

    /// Synthesized reply for a request that has neither network nor a cached copy.
    pub fn service_unavailable() -> Self {
        Self {
            status: 503,
            status_text: "Service Unavailable".into(),
            kind: ResponseKind::Default,
            headers: vec![("content-type".into(), "text/plain; charset=utf-8".into())],
            body: Bytes::from_static(b"Offline: this resource is not available without a network connection."),
        }
    }

    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Status in the 200..=299 range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only exact 200 responses of basic kind may be persisted.
    ///
    /// Keeps error pages, partial content, redirects and opaque bodies out of
    /// every generation.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind == ResponseKind::Basic
    }
}

/// Normalize a request URL into its cache key.
///
/// Fragments never reach the network, so they are not part of the key.
pub fn cache_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_fragment(None);
    key.into()
}

const SELECT_ENTRY: &str = "SELECT e.status, e.status_text, e.response_kind, e.headers_json, e.body FROM entries e";

fn read_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<(u16, String, String, String, Vec<u8>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_snapshot(raw: (u16, String, String, String, Vec<u8>)) -> Result<ResponseSnapshot, Error> {
    let (status, status_text, kind, headers_json, body) = raw;
    Ok(ResponseSnapshot {
        status,
        status_text,
        kind: kind.parse()?,
        headers: serde_json::from_str(&headers_json)?,
        body: Bytes::from(body),
    })
}

fn upsert(conn: &rusqlite::Connection, generation: &str, url: &str, snapshot: &ResponseSnapshot) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&snapshot.headers)?;
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
        params![generation, &now],
    )?;
    conn.execute(
        "INSERT INTO entries (generation, url, status, status_text, response_kind, headers_json, body, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(generation, url) DO UPDATE SET
            status = excluded.status,
            status_text = excluded.status_text,
            response_kind = excluded.response_kind,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            generation,
            url,
            snapshot.status,
            &snapshot.status_text,
            snapshot.kind.as_str(),
            headers_json,
            snapshot.body.as_ref(),
            now,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Insert or overwrite one entry, creating the generation if needed.
    pub async fn put_entry(&self, generation: &str, url: &str, snapshot: &ResponseSnapshot) -> Result<(), Error> {
        let (generation, url, snapshot) = (generation.to_string(), url.to_string(), snapshot.clone());
        self.conn
            .call(move |conn| -> Result<(), Error> { upsert(conn, &generation, &url, &snapshot) })
            .await
            .map_err(Error::from)
    }

    /// Write a batch of entries in a single transaction.
    ///
    /// Either every entry is stored or none is.
    pub async fn put_entries(&self, generation: &str, batch: Vec<(String, ResponseSnapshot)>) -> Result<(), Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for (url, snapshot) in &batch {
                    upsert(&tx, &generation, url, snapshot)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry from one generation.
    pub async fn get_entry(&self, generation: &str, url: &str) -> Result<Option<ResponseSnapshot>, Error> {
        let (generation, url) = (generation.to_string(), url.to_string());
        query_one(
            &self.conn,
            format!("{SELECT_ENTRY} WHERE e.generation = ?1 AND e.url = ?2"),
            vec![generation, url],
        )
        .await
    }

    /// Get an entry from any generation, oldest generation first.
    pub async fn find_entry(&self, url: &str) -> Result<Option<ResponseSnapshot>, Error> {
        query_one(
            &self.conn,
            format!(
                "{SELECT_ENTRY} JOIN generations g ON g.name = e.generation
                 WHERE e.url = ?1 ORDER BY g.created_at ASC, g.rowid ASC LIMIT 1"
            ),
            vec![url.to_string()],
        )
        .await
    }

    /// List the keys stored in a generation.
    pub async fn entry_urls(&self, generation: &str) -> Result<Vec<String>, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE generation = ?1 ORDER BY url")?;
                let urls = stmt
                    .query_map(params![generation], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

async fn query_one(conn: &Connection, sql: String, args: Vec<String>) -> Result<Option<ResponseSnapshot>, Error> {
    conn.call(move |conn| -> Result<Option<ResponseSnapshot>, Error> {
        let mut stmt = conn.prepare(&sql)?;
        let result = stmt.query_row(rusqlite::params_from_iter(args.iter()), read_entry);

        match result {
            Ok(raw) => into_snapshot(raw).map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> ResponseSnapshot {
        ResponseSnapshot::basic(200, "<html>shell</html>").with_header("Content-Type", "text/html")
    }

    #[test]
    fn test_cacheability_predicate() {
        assert!(ResponseSnapshot::basic(200, "").is_cacheable());
        assert!(!ResponseSnapshot::basic(404, "").is_cacheable());
        assert!(!ResponseSnapshot::basic(206, "").is_cacheable());
        assert!(!ResponseSnapshot::basic(200, "").with_kind(ResponseKind::Opaque).is_cacheable());
        assert!(!ResponseSnapshot::basic(200, "").with_kind(ResponseKind::Cors).is_cacheable());
        assert!(!ResponseSnapshot::service_unavailable().is_cacheable());
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let snap = shell();
        assert_eq!(snap.header("content-type"), Some("text/html"));
        assert_eq!(snap.header("etag"), None);
    }

    #[test]
    fn test_cache_key_strips_fragment() {
        let url = Url::parse("https://clinic.example/gallery?id=7#top").unwrap();
        assert_eq!(cache_key(&url), "https://clinic.example/gallery?id=7");
    }

    #[test]
    fn test_response_kind_parse() {
        for kind in [ResponseKind::Basic, ResponseKind::Cors, ResponseKind::Opaque, ResponseKind::Error, ResponseKind::Default] {
            assert_eq!(kind.as_str().parse::<ResponseKind>().unwrap(), kind);
        }
        assert!("weird".parse::<ResponseKind>().is_err());
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("static-v1", "https://clinic.example/", &shell()).await.unwrap();

        let got = db.get_entry("static-v1", "https://clinic.example/").await.unwrap().unwrap();
        assert_eq!(got, shell());
        assert!(db.get_entry("runtime-v1", "https://clinic.example/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let url = "https://clinic.example/api/patients";
        db.put_entry("runtime-v1", url, &ResponseSnapshot::basic(200, "first")).await.unwrap();
        db.put_entry("runtime-v1", url, &ResponseSnapshot::basic(200, "second")).await.unwrap();

        assert_eq!(db.entry_urls("runtime-v1").await.unwrap(), vec![url.to_string()]);
        let got = db.get_entry("runtime-v1", url).await.unwrap().unwrap();
        assert_eq!(got.body, Bytes::from_static(b"second"));
    }

    #[tokio::test]
    async fn test_find_entry_across_generations() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("runtime-v1", "https://clinic.example/a", &ResponseSnapshot::basic(200, "a"))
            .await
            .unwrap();

        let found = db.find_entry("https://clinic.example/a").await.unwrap().unwrap();
        assert_eq!(found.body, Bytes::from_static(b"a"));
        assert!(db.find_entry("https://clinic.example/b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_entries_batch() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let batch = vec![
            ("https://clinic.example/".to_string(), shell()),
            ("https://clinic.example/favicon.ico".to_string(), ResponseSnapshot::basic(200, vec![0u8, 1, 2])),
        ];
        db.put_entries("static-v1", batch).await.unwrap();

        let urls = db.entry_urls("static-v1").await.unwrap();
        assert_eq!(urls.len(), 2);
    }
}
