//! facegate-store — SQLite gallery of enrolled identities.
//!
//! One row per identity: name, reference-image locator and the raw
//! embedding captured at enrollment. The recognition pipeline reads it
//! through [`GallerySource`].

pub mod codec;

use async_trait::async_trait;
use facegate_core::{Embedding, EnrolledIdentity, GalleryError, GallerySource};
use std::path::Path;
use thiserror::Error;
use tokio_rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS identities (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    image_ref  TEXT NOT NULL,
    embedding  BLOB NOT NULL,
    created_at TEXT NOT NULL
);
";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] tokio_rusqlite::Error),
    #[error("cannot create database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("refusing to enroll an empty embedding")]
    EmptyEmbedding,
    #[error("invalid embedding text: {0}")]
    InvalidEmbedding(String),
}

/// Row as read from SQLite, before the blob is decoded.
struct StoredRow {
    id: String,
    name: String,
    image_ref: String,
    blob: Vec<u8>,
    created_at: String,
}

/// Async handle to the identity database.
#[derive(Clone)]
pub struct GalleryStore {
    conn: Connection,
}

impl GalleryStore {
    /// Open (creating if needed) the database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let conn = Connection::open(path).await?;
        tracing::info!(path = %path.display(), "opened gallery database");
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().await?).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|c| {
            c.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    /// Store a new identity and return it.
    pub async fn enroll(
        &self,
        name: &str,
        image_ref: &str,
        embedding: Embedding,
    ) -> Result<EnrolledIdentity, StoreError> {
        if embedding.is_empty() {
            return Err(StoreError::EmptyEmbedding);
        }

        let identity = EnrolledIdentity {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            image_ref: image_ref.to_string(),
            embedding,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let row = identity.clone();
        self.conn
            .call(move |c| {
                c.execute(
                    "INSERT INTO identities (id, name, image_ref, embedding, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        row.id,
                        row.name,
                        row.image_ref,
                        codec::encode_embedding(&row.embedding),
                        row.created_at,
                    ],
                )?;
                Ok(())
            })
            .await?;

        tracing::info!(
            id = %identity.id,
            name = %identity.name,
            dim = identity.embedding.len(),
            "identity enrolled"
        );
        Ok(identity)
    }

    /// All enrolled identities, oldest first. Rows whose embedding blob
    /// cannot be decoded are skipped.
    pub async fn list(&self) -> Result<Vec<EnrolledIdentity>, StoreError> {
        let rows = self
            .conn
            .call(|c| {
                let mut stmt = c.prepare(
                    "SELECT id, name, image_ref, embedding, created_at
                     FROM identities ORDER BY created_at, rowid",
                )?;
                let rows = stmt
                    .query_map([], |r| {
                        Ok(StoredRow {
                            id: r.get(0)?,
                            name: r.get(1)?,
                            image_ref: r.get(2)?,
                            blob: r.get(3)?,
                            created_at: r.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match codec::decode_embedding(&row.blob) {
                Some(embedding) => Some(EnrolledIdentity {
                    id: row.id,
                    name: row.name,
                    image_ref: row.image_ref,
                    embedding,
                    created_at: row.created_at,
                }),
                None => {
                    tracing::warn!(id = %row.id, bytes = row.blob.len(), "skipping identity with corrupt embedding");
                    None
                }
            })
            .collect())
    }

    /// Delete an identity. Returns whether a row was removed.
    pub async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        let removed = self
            .conn
            .call(move |c| Ok(c.execute("DELETE FROM identities WHERE id = ?1", [&id])?))
            .await?;
        Ok(removed > 0)
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        let n = self
            .conn
            .call(|c| Ok(c.query_row("SELECT COUNT(*) FROM identities", [], |r| r.get::<_, i64>(0))?))
            .await?;
        Ok(n as usize)
    }
}

#[async_trait]
impl GallerySource for GalleryStore {
    async fn list_enrolled(&self) -> Result<Vec<EnrolledIdentity>, GalleryError> {
        self.list()
            .await
            .map_err(|e| GalleryError::ReadFailed(e.to_string()))
    }
}
