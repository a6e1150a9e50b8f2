use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowport_types::{ImageBlob, ImageReference, StoredWorkflow, WorkflowId};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::storage::{ImageStore, WorkflowStore};
use crate::{Result, StoreError};

/// Current schema version, tracked in `PRAGMA user_version`.
const SCHEMA_VERSION: i32 = 1;

/// Workflow and image store backed by a single SQLite database.
///
/// Image blobs are stored once per content hash; `workflow_images` maps
/// `(workflow_id, name)` to a hash. Image references carry no foreign key to
/// `workflows`; callers remove the two halves separately.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        let current_version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if current_version >= SCHEMA_VERSION {
            debug!("Schema up to date (version {})", current_version);
            return Ok(());
        }

        info!(
            "Migrating schema from version {} to {}",
            current_version, SCHEMA_VERSION
        );

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS workflows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                workspace_xml TEXT NOT NULL,
                uuid TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS image_blobs (
                hash TEXT PRIMARY KEY,
                media_type TEXT NOT NULL,
                data BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS workflow_images (
                workflow_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                hash TEXT NOT NULL,
                PRIMARY KEY (workflow_id, name)
            );

            CREATE INDEX IF NOT EXISTS idx_workflow_images_hash
                ON workflow_images(hash);
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for SqliteStore {
    async fn create(
        &self,
        name: &str,
        workspace_xml: &str,
        uuid: Option<&str>,
    ) -> Result<WorkflowId> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO workflows (name, workspace_xml, uuid, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![name, workspace_xml, uuid, Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn delete_by_id(&self, id: WorkflowId) -> Result<()> {
        let deleted = self
            .conn
            .lock()
            .execute("DELETE FROM workflows WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StoreError::WorkflowNotFound(id));
        }
        Ok(())
    }

    async fn get(&self, id: WorkflowId) -> Result<StoredWorkflow> {
        self.conn
            .lock()
            .query_row(
                "SELECT id, name, workspace_xml, uuid, created_at FROM workflows WHERE id = ?1",
                params![id],
                row_to_workflow,
            )
            .optional()?
            .ok_or(StoreError::WorkflowNotFound(id))
    }

    async fn list(&self) -> Result<Vec<StoredWorkflow>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, name, workspace_xml, uuid, created_at FROM workflows ORDER BY id")?;
        let rows = stmt
            .query_map([], row_to_workflow)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[async_trait]
impl ImageStore for SqliteStore {
    async fn store(
        &self,
        workflow_id: WorkflowId,
        name: &str,
        blob: &ImageBlob,
        overwrite: bool,
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT hash FROM workflow_images WHERE workflow_id = ?1 AND name = ?2",
                params![workflow_id, name],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() && !overwrite {
            return Err(StoreError::ImageExists {
                workflow_id,
                name: name.to_string(),
            });
        }

        tx.execute(
            "INSERT OR IGNORE INTO image_blobs (hash, media_type, data) VALUES (?1, ?2, ?3)",
            params![blob.hash(), blob.media_type(), blob.data()],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO workflow_images (workflow_id, name, hash) VALUES (?1, ?2, ?3)",
            params![workflow_id, name, blob.hash()],
        )?;
        if let Some(old_hash) = existing
            && old_hash != blob.hash()
        {
            collect_unreferenced(&tx)?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn remove_workflow_images(&self, workflow_id: WorkflowId) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM workflow_images WHERE workflow_id = ?1",
            params![workflow_id],
        )?;
        let collected = collect_unreferenced(&tx)?;
        tx.commit()?;
        debug!(
            workflow_id,
            removed, collected, "Removed workflow image references"
        );
        Ok(())
    }

    async fn workflow_images(&self, workflow_id: WorkflowId) -> Result<Vec<ImageReference>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT workflow_id, name, hash FROM workflow_images WHERE workflow_id = ?1 ORDER BY name",
        )?;
        let rows = stmt
            .query_map(params![workflow_id], |row| {
                Ok(ImageReference {
                    workflow_id: row.get(0)?,
                    name: row.get(1)?,
                    hash: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn load(&self, hash: &str) -> Result<ImageBlob> {
        self.conn
            .lock()
            .query_row(
                "SELECT media_type, data FROM image_blobs WHERE hash = ?1",
                params![hash],
                |row| {
                    let media_type: String = row.get(0)?;
                    let data: Vec<u8> = row.get(1)?;
                    Ok(ImageBlob::new(media_type, data))
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::ImageNotFound(hash.to_string()))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn collect_unreferenced(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM image_blobs WHERE hash NOT IN (SELECT DISTINCT hash FROM workflow_images)",
        [],
    )?)
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_workflow(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredWorkflow> {
    Ok(StoredWorkflow {
        id: row.get(0)?,
        name: row.get(1)?,
        workspace_xml: row.get(2)?,
        uuid: row.get(3)?,
        created_at: parse_dt(&row.get::<_, String>(4)?),
    })
}
