//! Generic document storage for Crosscast
//!
//! One storage primitive backs posts, uploaded-file metadata and OAuth
//! credentials: a uniquely-keyed document with a replaceable tag set.
//! Domain layers (the feed target, the credential vault) are thin façades
//! over this module.

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::{Result, StoreError};
use crate::types::{default_search_key, new_uuid, now_timestamp, Document, DocumentOrder, Tag};

#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    /// Open (or create) the store at the given path and run migrations.
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::IoError)?;
        }

        // Forward slashes keep the SQLite URL valid on Windows as well.
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(StoreError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Open an in-memory store. Used by tests and anything else that wants
    /// a throwaway database.
    pub async fn in_memory() -> Result<Self> {
        // A pooled :memory: database is per-connection; keep a single
        // connection so every caller sees the migrated schema.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(StoreError::SqlxError)?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;
        Ok(Self { pool })
    }

    /// Insert a new document or update the one holding `search_key`.
    ///
    /// On update the uuid and created_at stay fixed while payload and the
    /// entire tag set are replaced. The lookup and the write happen inside
    /// one transaction; a racing insert for the same key trips the UNIQUE
    /// index on `search_key` and surfaces as a storage error rather than a
    /// silent duplicate.
    pub async fn create_or_update(
        &self,
        kind: &str,
        payload: &str,
        search_key: Option<&str>,
        tags: &[Tag],
    ) -> Result<Document> {
        let mut tx = self.pool.begin().await.map_err(StoreError::SqlxError)?;

        let existing = match search_key {
            Some(key) => {
                sqlx::query("SELECT uuid, created_at FROM documents WHERE search_key = ?")
                    .bind(key)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(StoreError::SqlxError)?
                    .map(|row| (key, row))
            }
            None => None,
        };

        let (uuid, resolved_key, created_at) = match existing {
            Some((key, row)) => {
                let uuid: String = row.get("uuid");
                let created_at: i64 = row.get("created_at");

                sqlx::query("UPDATE documents SET payload = ? WHERE uuid = ?")
                    .bind(payload)
                    .bind(&uuid)
                    .execute(&mut *tx)
                    .await
                    .map_err(StoreError::SqlxError)?;

                (uuid, key.to_string(), created_at)
            }
            None => {
                let uuid = new_uuid();
                let resolved_key = match search_key {
                    Some(key) => key.to_string(),
                    None => default_search_key(kind, &uuid),
                };
                let created_at = now_timestamp();

                sqlx::query(
                    r#"
                    INSERT INTO documents (uuid, search_key, kind, payload, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&uuid)
                .bind(&resolved_key)
                .bind(kind)
                .bind(payload)
                .bind(created_at)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::SqlxError)?;

                (uuid, resolved_key, created_at)
            }
        };

        // Replace the whole tag set, never merge.
        sqlx::query("DELETE FROM document_tags WHERE document_uuid = ?")
            .bind(&uuid)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::SqlxError)?;

        for tag in tags {
            sqlx::query("INSERT INTO document_tags (document_uuid, name, kind) VALUES (?, ?, ?)")
                .bind(&uuid)
                .bind(&tag.name)
                .bind(&tag.kind)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::SqlxError)?;
        }

        tx.commit().await.map_err(StoreError::SqlxError)?;

        Ok(Document {
            uuid,
            search_key: resolved_key,
            kind: kind.to_string(),
            payload: payload.to_string(),
            tags: tags.to_vec(),
            created_at,
        })
    }

    /// Exact lookup by search key, tags joined in.
    pub async fn search_by_key(&self, search_key: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT uuid, search_key, kind, payload, created_at
            FROM documents WHERE search_key = ?
            "#,
        )
        .bind(search_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Exact lookup by uuid, tags joined in.
    pub async fn search_by_uuid(&self, uuid: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT uuid, search_key, kind, payload, created_at
            FROM documents WHERE uuid = ?
            "#,
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// All documents of a kind, ordered by creation time.
    pub async fn get_all(&self, kind: &str, order: DocumentOrder) -> Result<Vec<Document>> {
        let query = match order {
            DocumentOrder::CreatedAtDesc => {
                r#"
                SELECT uuid, search_key, kind, payload, created_at
                FROM documents WHERE kind = ?
                ORDER BY created_at DESC
                "#
            }
            DocumentOrder::CreatedAtAsc => {
                r#"
                SELECT uuid, search_key, kind, payload, created_at
                FROM documents WHERE kind = ?
                ORDER BY created_at ASC
                "#
            }
        };

        let rows = sqlx::query(query)
            .bind(kind)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            documents.push(self.hydrate(row).await?);
        }
        Ok(documents)
    }

    /// All documents carrying a given `(name, kind)` tag, newest first.
    pub async fn find_by_tag(&self, name: &str, tag_kind: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT d.uuid, d.search_key, d.kind, d.payload, d.created_at
            FROM documents d
            JOIN document_tags t ON t.document_uuid = d.uuid
            WHERE t.name = ? AND t.kind = ?
            ORDER BY d.created_at DESC
            "#,
        )
        .bind(name)
        .bind(tag_kind)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            documents.push(self.hydrate(row).await?);
        }
        Ok(documents)
    }

    async fn hydrate(&self, row: sqlx::sqlite::SqliteRow) -> Result<Document> {
        let uuid: String = row.get("uuid");

        let tag_rows = sqlx::query(
            "SELECT name, kind FROM document_tags WHERE document_uuid = ? ORDER BY name, kind",
        )
        .bind(&uuid)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(Document {
            uuid,
            search_key: row.get("search_key"),
            kind: row.get("kind"),
            payload: row.get("payload"),
            created_at: row.get("created_at"),
            tags: tag_rows
                .iter()
                .map(|r| Tag {
                    name: r.get("name"),
                    kind: r.get("kind"),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_assigns_uuid_and_default_key() {
        let store = DocumentStore::in_memory().await.unwrap();

        let doc = store
            .create_or_update("post", "{\"content\":\"hi\"}", None, &[])
            .await
            .unwrap();

        assert!(uuid::Uuid::parse_str(&doc.uuid).is_ok());
        assert_eq!(doc.search_key, format!("post:{}", doc.uuid));
        assert_eq!(doc.kind, "post");
    }

    #[tokio::test]
    async fn test_update_preserves_uuid_and_replaces_tags() {
        let store = DocumentStore::in_memory().await.unwrap();

        let first = store
            .create_or_update(
                "twitter-oauth-token",
                "old-secret",
                Some("twitter-oauth-token"),
                &[Tag::new("twitter-oauth-token", "key")],
            )
            .await
            .unwrap();

        let second = store
            .create_or_update(
                "twitter-oauth-token",
                "new-secret",
                Some("twitter-oauth-token"),
                &[Tag::new("rotated", "key")],
            )
            .await
            .unwrap();

        assert_eq!(first.uuid, second.uuid);
        assert_eq!(first.created_at, second.created_at);

        let stored = store
            .search_by_key("twitter-oauth-token")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.payload, "new-secret");
        assert_eq!(stored.tags, vec![Tag::new("rotated", "key")]);
    }

    #[tokio::test]
    async fn test_distinct_keys_yield_distinct_uuids() {
        let store = DocumentStore::in_memory().await.unwrap();

        let a = store
            .create_or_update("post", "a", Some("post:a"), &[])
            .await
            .unwrap();
        let b = store
            .create_or_update("post", "b", Some("post:b"), &[])
            .await
            .unwrap();

        assert_ne!(a.uuid, b.uuid);
    }

    #[tokio::test]
    async fn test_search_by_uuid_joins_tags() {
        let store = DocumentStore::in_memory().await.unwrap();

        let tags = vec![Tag::new("rust", "hashtag"), Tag::new("news", "hashtag")];
        let doc = store
            .create_or_update("post", "tagged", None, &tags)
            .await
            .unwrap();

        let found = store.search_by_uuid(&doc.uuid).await.unwrap().unwrap();
        assert_eq!(found.payload, "tagged");
        assert_eq!(found.tags.len(), 2);
        assert!(found.tags.contains(&Tag::new("rust", "hashtag")));
    }

    #[tokio::test]
    async fn test_search_missing_returns_none() {
        let store = DocumentStore::in_memory().await.unwrap();

        assert!(store.search_by_key("nope").await.unwrap().is_none());
        assert!(store.search_by_uuid("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_all_orders_by_created_at() {
        let store = DocumentStore::in_memory().await.unwrap();

        // created_at has second resolution, so force distinct timestamps
        // through direct inserts.
        for (uuid, ts) in [("u1", 100i64), ("u2", 200), ("u3", 150)] {
            sqlx::query(
                "INSERT INTO documents (uuid, search_key, kind, payload, created_at) VALUES (?, ?, 'post', 'x', ?)",
            )
            .bind(uuid)
            .bind(format!("post:{}", uuid))
            .bind(ts)
            .execute(&store.pool)
            .await
            .unwrap();
        }

        let desc = store.get_all("post", DocumentOrder::CreatedAtDesc).await.unwrap();
        let uuids: Vec<&str> = desc.iter().map(|d| d.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["u2", "u3", "u1"]);

        let asc = store.get_all("post", DocumentOrder::CreatedAtAsc).await.unwrap();
        let uuids: Vec<&str> = asc.iter().map(|d| d.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["u1", "u3", "u2"]);
    }

    #[tokio::test]
    async fn test_get_all_filters_by_kind() {
        let store = DocumentStore::in_memory().await.unwrap();

        store.create_or_update("post", "p", None, &[]).await.unwrap();
        store.create_or_update("upload", "u", None, &[]).await.unwrap();

        let posts = store.get_all("post", DocumentOrder::CreatedAtDesc).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].payload, "p");
    }

    #[tokio::test]
    async fn test_find_by_tag() {
        let store = DocumentStore::in_memory().await.unwrap();

        store
            .create_or_update(
                "twitter-oauth-token",
                "secret",
                Some("twitter-oauth-token"),
                &[Tag::new("twitter-oauth-token", "key")],
            )
            .await
            .unwrap();
        store
            .create_or_update("post", "unrelated", None, &[Tag::new("rust", "hashtag")])
            .await
            .unwrap();

        let found = store.find_by_tag("twitter-oauth-token", "key").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].payload, "secret");

        let missing = store.find_by_tag("twitter-oauth-token", "hashtag").await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_insert_surfaces_unique_violation() {
        let store = DocumentStore::in_memory().await.unwrap();

        store
            .create_or_update("post", "first", Some("post:same"), &[])
            .await
            .unwrap();

        // Simulate the losing side of a racing insert: same key, fresh row.
        let result = sqlx::query(
            "INSERT INTO documents (uuid, search_key, kind, payload, created_at) VALUES (?, 'post:same', 'post', 'second', 0)",
        )
        .bind(new_uuid())
        .execute(&store.pool)
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_file_backed_store_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("documents.db");
        let store = DocumentStore::new(db_path.to_str().unwrap()).await.unwrap();

        let doc = store
            .create_or_update("upload", "{\"name\":\"photo.jpg\"}", None, &[])
            .await
            .unwrap();
        let found = store.search_by_key(&doc.search_key).await.unwrap().unwrap();
        assert_eq!(found.uuid, doc.uuid);
    }

    #[tokio::test]
    async fn test_invalid_path_is_storage_error() {
        let result = DocumentStore::new("/tmp/test\0invalid.db").await;
        assert!(matches!(
            result,
            Err(crate::error::CrosscastError::Storage(_))
        ));
    }
}
