//! # Boundary Store
//!
//! Source of the active boundaries of a tenant. The engine only needs
//! `list_active`; the reference stores add authoring operations.
//!
//! `SqliteBoundaryStore` keeps the authoring JSON in SQLite and converts rows
//! into typed boundaries on the way out. Boundaries are validated on `upsert`,
//! so an invalid boundary can only come back from a row written by someone
//! else; that surfaces as `InvalidBoundary`. Boundary ids are unique per
//! tenant, never across tenants.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection};

use crate::boundary::{Boundary, BoundaryDocument};
use crate::error::{EnforcementError, Result, Upstream};
use crate::types::now_ms;

#[async_trait]
pub trait BoundaryStore: Send + Sync {
    /// Active boundaries of a tenant, in authoring order.
    async fn list_active(&self, tenant_id: &str) -> Result<Vec<Boundary>>;
}

// ================================================================================================
// IN-MEMORY STORE
// ================================================================================================

#[derive(Debug, Default)]
pub struct InMemoryBoundaryStore {
    tenants: RwLock<HashMap<String, Vec<Boundary>>>,
}

impl InMemoryBoundaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace (by id) a boundary for a tenant.
    pub fn upsert(&self, tenant_id: &str, boundary: Boundary) -> Result<()> {
        boundary.validate()?;
        let boundary = boundary.for_tenant(tenant_id);

        let mut tenants = self.tenants.write();
        let boundaries = tenants.entry(tenant_id.to_string()).or_default();
        match boundaries.iter_mut().find(|b| b.id == boundary.id) {
            Some(existing) => *existing = boundary,
            None => boundaries.push(boundary),
        }
        Ok(())
    }

    pub fn remove(&self, tenant_id: &str, boundary_id: &str) -> bool {
        let mut tenants = self.tenants.write();
        match tenants.get_mut(tenant_id) {
            Some(boundaries) => {
                let before = boundaries.len();
                boundaries.retain(|b| b.id != boundary_id);
                boundaries.len() != before
            }
            None => false,
        }
    }
}

#[async_trait]
impl BoundaryStore for InMemoryBoundaryStore {
    async fn list_active(&self, tenant_id: &str) -> Result<Vec<Boundary>> {
        Ok(self
            .tenants
            .read()
            .get(tenant_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ================================================================================================
// SQLITE STORE
// ================================================================================================

#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./var/data/boundaries.db"),
        }
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS boundaries (
    id            TEXT NOT NULL,
    tenant_id     TEXT NOT NULL,
    name          TEXT NOT NULL,
    document_json TEXT NOT NULL,
    content_hash  TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'active',
    updated_at    REAL NOT NULL,
    PRIMARY KEY (tenant_id, id)
);
CREATE INDEX IF NOT EXISTS idx_boundaries_tenant ON boundaries (tenant_id, status);
";

pub struct SqliteBoundaryStore {
    db: Arc<Mutex<Connection>>,
    version: RwLock<u64>,
}

impl SqliteBoundaryStore {
    pub fn new(config: StorageConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    EnforcementError::Storage(format!("failed to create storage directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(&config.db_path)?;
        info!("Opened boundary store at {}", config.db_path.display());
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            version: RwLock::new(0),
        })
    }

    /// Bumped on every successful write.
    pub fn version(&self) -> u64 {
        *self.version.read()
    }

    /// Validate and store (or replace) a boundary for a tenant. Re-upserting
    /// an inactive boundary reactivates it; authoring order is preserved.
    pub fn upsert(&self, tenant_id: &str, boundary: &Boundary) -> Result<()> {
        boundary.validate()?;
        let boundary = boundary.clone().for_tenant(tenant_id);

        let document_json = serde_json::to_string(&boundary.to_document())
            .map_err(|e| EnforcementError::Storage(format!("failed to serialize boundary: {}", e)))?;
        let updated_at = (now_ms() as f64) / 1000.0;

        {
            let conn = self.db.lock();
            conn.execute(
                "INSERT INTO boundaries (id, tenant_id, name, document_json, content_hash, status, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6)
                 ON CONFLICT(tenant_id, id) DO UPDATE SET
                    name = excluded.name,
                    document_json = excluded.document_json,
                    content_hash = excluded.content_hash,
                    status = 'active',
                    updated_at = excluded.updated_at",
                params![
                    boundary.id,
                    tenant_id,
                    boundary.name,
                    document_json,
                    boundary.content_hash(),
                    updated_at,
                ],
            )?;
        }

        debug!("Stored boundary '{}' for tenant '{}'", boundary.id, tenant_id);
        self.increment_version();
        Ok(())
    }

    /// Parse, validate and store an authoring JSON document.
    pub fn upsert_json(&self, tenant_id: &str, json: &str) -> Result<Boundary> {
        let boundary = Boundary::from_json(json)?;
        self.upsert(tenant_id, &boundary)?;
        Ok(boundary.for_tenant(tenant_id))
    }

    /// Mark a tenant's boundary inactive. Returns true if an active row changed.
    pub fn deactivate(&self, tenant_id: &str, boundary_id: &str) -> Result<bool> {
        let changed = {
            let conn = self.db.lock();
            conn.execute(
                "UPDATE boundaries SET status = 'inactive', updated_at = ?3
                 WHERE tenant_id = ?1 AND id = ?2 AND status = 'active'",
                params![tenant_id, boundary_id, (now_ms() as f64) / 1000.0],
            )?
        };
        if changed > 0 {
            self.increment_version();
        }
        Ok(changed > 0)
    }

    /// Delete a tenant's boundary. Returns true if a row was removed.
    pub fn remove(&self, tenant_id: &str, boundary_id: &str) -> Result<bool> {
        let changed = {
            let conn = self.db.lock();
            conn.execute(
                "DELETE FROM boundaries WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id, boundary_id],
            )?
        };
        if changed > 0 {
            self.increment_version();
        }
        Ok(changed > 0)
    }

    /// Number of stored boundaries, active or not.
    pub fn count(&self) -> Result<usize> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM boundaries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn increment_version(&self) {
        *self.version.write() += 1;
    }

    fn load_active(conn: &Connection, tenant_id: &str) -> Result<Vec<Boundary>> {
        let mut stmt = conn.prepare(
            "SELECT document_json FROM boundaries
             WHERE tenant_id = ?1 AND status = 'active'
             ORDER BY rowid",
        )?;
        let documents: Vec<String> = stmt
            .query_map(params![tenant_id], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;

        documents
            .iter()
            .map(|json| {
                let document: BoundaryDocument = serde_json::from_str(json).map_err(|e| {
                    EnforcementError::invalid_boundary("<stored>", format!("corrupt row: {}", e))
                })?;
                Boundary::from_document(document)
            })
            .collect()
    }
}

#[async_trait]
impl BoundaryStore for SqliteBoundaryStore {
    async fn list_active(&self, tenant_id: &str) -> Result<Vec<Boundary>> {
        let db = Arc::clone(&self.db);
        let tenant_id = tenant_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = db.lock();
            Self::load_active(&conn, &tenant_id)
        })
        .await
        .map_err(|e| EnforcementError::UpstreamUnavailable {
            service: Upstream::BoundaryStore,
            reason: format!("store task failed: {}", e),
        })?
    }
}
