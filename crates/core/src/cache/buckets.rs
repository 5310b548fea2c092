//! Bucket and entry operations on the SQLite store.

use async_trait::async_trait;
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::{CacheStorage, EntryMeta, RequestKey};
use crate::{Error, StoredResponse};

/// Owned column values for one `entries` row.
struct EntryRow {
    key: RequestKey,
    response_url: String,
    status: u16,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn new(key: &RequestKey, response: &StoredResponse) -> Result<Self, Error> {
        Ok(Self {
            key: key.clone(),
            response_url: response.url.clone(),
            status: response.status,
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.to_vec(),
        })
    }
}

impl CacheDb {
    /// Upsert rows in a single transaction, creating the bucket if needed.
    async fn write_rows(&self, bucket: &str, rows: Vec<EntryRow>) -> Result<(), Error> {
        let bucket = bucket.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
                    params![bucket, now],
                )?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO entries (bucket, key_hash, method, url, response_url, status, headers_json, body, stored_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                         ON CONFLICT(bucket, key_hash) DO UPDATE SET
                            method = excluded.method,
                            url = excluded.url,
                            response_url = excluded.response_url,
                            status = excluded.status,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            stored_at = excluded.stored_at",
                    )?;
                    for row in &rows {
                        stmt.execute(params![
                            bucket,
                            row.key.hash,
                            row.key.method,
                            row.key.url,
                            row.response_url,
                            row.status,
                            row.headers_json,
                            row.body,
                            now
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM buckets WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM buckets ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM buckets WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, bucket: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        let bucket = bucket.to_string();
        let hash = key.hash.clone();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT response_url, status, headers_json, body FROM entries
                     WHERE bucket = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![bucket, hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                });

                match result {
                    Ok((url, status, headers_json, body)) => {
                        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                        Ok(Some(StoredResponse { url, status, headers, body: Bytes::from(body) }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, bucket: &str, key: &RequestKey, response: &StoredResponse) -> Result<(), Error> {
        let row = EntryRow::new(key, response)?;
        self.write_rows(bucket, vec![row]).await
    }

    async fn put_all(&self, bucket: &str, entries: &[(RequestKey, StoredResponse)]) -> Result<(), Error> {
        let rows = entries
            .iter()
            .map(|(key, response)| EntryRow::new(key, response))
            .collect::<Result<Vec<_>, _>>()?;
        self.write_rows(bucket, rows).await
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<EntryMeta>, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<EntryMeta>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, stored_at FROM entries
                     WHERE bucket = ?1 ORDER BY stored_at ASC, url ASC",
                )?;
                let metas = stmt
                    .query_map(params![bucket], |row| {
                        Ok(EntryMeta { method: row.get(0)?, url: row.get(1)?, status: row.get(2)?, stored_at: row.get(3)? })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(metas)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SiteRequest;
    use url::Url;

    fn key(path: &str) -> RequestKey {
        let url = Url::parse("https://example.com/").unwrap().join(path).unwrap();
        RequestKey::for_request(&SiteRequest::get(url))
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let response = StoredResponse::new("https://example.com/noticias.json", 200, r#"{"a":1}"#)
            .with_header("content-type", "application/json");

        db.put("shell-v2", &key("/noticias.json"), &response).await.unwrap();

        let retrieved = db.get("shell-v2", &key("/noticias.json")).await.unwrap();
        assert_eq!(retrieved, Some(response));
        assert!(db.has("shell-v2").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open("shell-v2").await.unwrap();
        assert!(db.get("shell-v2", &key("/nope")).await.unwrap().is_none());
        assert!(db.get("other", &key("/nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_and_delete_cascade() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open("shell-v1").await.unwrap();
        db.put("shell-v1", &key("/index.html"), &StoredResponse::new("u", 200, "old"))
            .await
            .unwrap();
        db.open("shell-v2").await.unwrap();

        assert_eq!(db.keys().await.unwrap(), vec!["shell-v1".to_string(), "shell-v2".to_string()]);

        assert!(db.delete("shell-v1").await.unwrap());
        assert!(!db.delete("shell-v1").await.unwrap());
        assert_eq!(db.keys().await.unwrap(), vec!["shell-v2".to_string()]);

        let orphans: i64 = db
            .conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_upsert_replaces_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("v", &key("/noticias.json"), &StoredResponse::new("u", 200, r#"{"a":0}"#))
            .await
            .unwrap();
        db.put("v", &key("/noticias.json"), &StoredResponse::new("u", 200, r#"{"a":1}"#))
            .await
            .unwrap();

        let entries = db.entries("v").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].method, "GET");
        let got = db.get("v", &key("/noticias.json")).await.unwrap().unwrap();
        assert_eq!(got.text(), r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("shellcache-test-{}.sqlite", std::process::id()));
        let _ = std::fs::remove_file(&dir);
        {
            let db = CacheDb::open(&dir).await.unwrap();
            db.put("v", &key("/"), &StoredResponse::new("u", 200, "shell")).await.unwrap();
        }
        let db = CacheDb::open(&dir).await.unwrap();
        assert_eq!(db.get("v", &key("/")).await.unwrap().unwrap().text(), "shell");
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", dir.display()));
        }
    }

    #[tokio::test]
    async fn test_put_all_rolls_back_on_failure() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.conn
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER reject_broken BEFORE INSERT ON entries
                     WHEN NEW.url LIKE '%broken%'
                     BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
                )
            })
            .await
            .unwrap();

        let batch = vec![
            (key("/index.html"), StoredResponse::new("u", 200, "shell")),
            (key("/broken.html"), StoredResponse::new("u", 200, "x")),
        ];
        assert!(db.put_all("v", &batch).await.is_err());
        assert!(db.entries("v").await.unwrap().is_empty());

        db.put_all("v", &batch[..1]).await.unwrap();
        assert_eq!(db.entries("v").await.unwrap().len(), 1);
    }
}
