//! SQLite graph store.
//!
//! `Database` opens a fresh connection per call. Writes go through
//! [`GraphSession`]s obtained from [`GraphStore::begin`]; each session owns
//! its connection and one `BEGIN IMMEDIATE` transaction.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::errors::{GraphError, GraphResult};
use crate::models::{
    AttributeChange, AuditRecord, DependencyEdge, EdgeKey, EdgeMetadata, EdgeType, Entity,
    EntityKind, OutcomeKind, Properties, UsageKind,
};
use crate::store::schema;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if path.len() > 2 {
                expanded.push(&path[2..]);
            }
            return expanded;
        }
    }
    PathBuf::from(path)
}

fn resolve_path(path: &Path) -> GraphResult<PathBuf> {
    let expanded = expand_tilde(&path.to_string_lossy());
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(std::env::current_dir()?.join(expanded))
    }
}

// ---------------------------------------------------------------------------
// Store contract
// ---------------------------------------------------------------------------

/// Source of transaction-scoped sessions.
pub trait GraphStore: Send + Sync {
    fn begin(&self) -> GraphResult<Box<dyn GraphSession + '_>>;
}

/// One write transaction. Dropping a session without `commit` rolls it back.
pub trait GraphSession {
    fn find_entity(&mut self, kind: EntityKind, id: &str) -> GraphResult<Option<Entity>>;

    fn create_entity(&mut self, entity: &Entity) -> GraphResult<()>;

    fn update_entity(&mut self, entity: &Entity) -> GraphResult<()>;

    /// Insert the edge, or refresh the metadata of the stored edge with the
    /// same identity.
    fn merge_edge(&mut self, edge: &DependencyEdge) -> GraphResult<EdgeWrite>;

    fn edges_for_source(&mut self, source_path: &str) -> GraphResult<Vec<EdgeKey>>;

    fn delete_edge(&mut self, key: &EdgeKey) -> GraphResult<bool>;

    fn record_audit(&mut self, record: &AuditRecord) -> GraphResult<()>;

    fn commit(self: Box<Self>) -> GraphResult<()>;

    fn rollback(self: Box<Self>) -> GraphResult<()>;
}

/// What [`GraphSession::merge_edge`] did with one edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeWrite {
    Inserted,
    /// Same identity, different qualified name, externality, attributes or
    /// source path.
    Updated,
    Unchanged,
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn entity_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, i64, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_entity(raw: (String, String, i64, String)) -> GraphResult<Entity> {
    let (id, kind, provisional, properties_json) = raw;
    let kind = EntityKind::parse(&kind)
        .ok_or_else(|| GraphError::Database(format!("unknown entity kind {kind:?} for {id}")))?;
    let properties: Properties = serde_json::from_str(&properties_json)?;
    Ok(Entity {
        id,
        kind,
        provisional: provisional != 0,
        properties,
    })
}

fn decode_edge(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEdge> {
    Ok(RawEdge {
        from_id: row.get(0)?,
        to_id: row.get(1)?,
        edge_type: row.get(2)?,
        usage_kind: row.get(3)?,
        context: row.get(4)?,
        qualified_name: row.get(5)?,
        is_external: row.get(6)?,
        attributes_json: row.get(7)?,
        source_path: row.get(8)?,
    })
}

struct RawEdge {
    from_id: String,
    to_id: String,
    edge_type: String,
    usage_kind: String,
    context: String,
    qualified_name: Option<String>,
    is_external: i64,
    attributes_json: Option<String>,
    source_path: Option<String>,
}

fn parse_usage_kind(value: &str) -> Option<UsageKind> {
    if value.is_empty() {
        return None;
    }
    serde_json::from_value(serde_json::Value::String(value.to_string())).ok()
}

impl RawEdge {
    fn into_edge(self) -> GraphResult<DependencyEdge> {
        let edge_type = EdgeType::parse(&self.edge_type).ok_or_else(|| {
            GraphError::Database(format!("unknown edge type {:?}", self.edge_type))
        })?;
        let attributes: BTreeMap<String, String> = match self.attributes_json {
            Some(json) if !json.is_empty() => serde_json::from_str(&json)?,
            _ => BTreeMap::new(),
        };
        Ok(DependencyEdge {
            from_id: self.from_id,
            to_id: self.to_id,
            edge_type,
            metadata: EdgeMetadata {
                usage_kind: parse_usage_kind(&self.usage_kind),
                context: self.context,
                qualified_name: self.qualified_name,
                is_external: self.is_external != 0,
                attributes,
            },
            source_path: self.source_path,
        })
    }
}

const EDGE_COLUMNS: &str = "from_id, to_id, edge_type, usage_kind, context, qualified_name, \
                            is_external, attributes_json, source_path";

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// SQLite graph store.
#[derive(Clone, Debug)]
pub struct Database {
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    /// Resolve `db_path`, create its parent directories and initialise the
    /// schema.
    pub fn open(db_path: impl AsRef<Path>) -> GraphResult<Self> {
        let resolved = resolve_path(db_path.as_ref())?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Self {
            db_path: resolved,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        };
        db.init_schema()?;
        Ok(db)
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> GraphResult<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// WAL mode, all tables and indexes, then pending migrations.
    pub fn init_schema(&self) -> GraphResult<()> {
        let conn = self.connect()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        for stmt in schema::SCHEMA_STATEMENTS {
            conn.execute_batch(stmt)?;
        }
        schema::migrate_schema(&conn)?;
        Ok(())
    }

    pub fn schema_version(&self) -> GraphResult<i32> {
        Ok(schema::get_schema_version(&self.connect()?))
    }

    pub fn get_meta(&self, key: &str) -> GraphResult<Option<String>> {
        let conn = self.connect()?;
        let value = conn
            .query_row(
                "SELECT value FROM graph_meta WHERE key = ?1 LIMIT 1;",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> GraphResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO graph_meta(key, value) VALUES(?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_entity(&self, id: &str) -> GraphResult<Option<Entity>> {
        let conn = self.connect()?;
        let raw = conn
            .query_row(
                "SELECT id, kind, provisional, properties_json FROM entities WHERE id = ?1;",
                params![id],
                entity_from_row,
            )
            .optional()?;
        raw.map(decode_entity).transpose()
    }

    pub fn count_entities(&self, kind: Option<EntityKind>) -> GraphResult<i64> {
        let conn = self.connect()?;
        let count = match kind {
            Some(kind) => conn.query_row(
                "SELECT COUNT(*) FROM entities WHERE kind = ?1;",
                params![kind.as_str()],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM entities;", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    pub fn count_edges(&self) -> GraphResult<i64> {
        let conn = self.connect()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM dependency_edges;", [], |row| row.get(0))?)
    }

    /// Outgoing edges of `from_id`, in insertion order.
    pub fn edges_from(&self, from_id: &str) -> GraphResult<Vec<DependencyEdge>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EDGE_COLUMNS} FROM dependency_edges WHERE from_id = ?1 ORDER BY id;"
        ))?;
        let rows = stmt.query_map(params![from_id], decode_edge)?;
        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?.into_edge()?);
        }
        Ok(edges)
    }

    pub fn audit_records(&self, operation_id: &str) -> GraphResult<Vec<AuditRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT operation_id, kind, entity_id, recorded_at, outcome, changes_json, \
                    reason, elapsed_us \
             FROM upsert_audit WHERE operation_id = ?1 ORDER BY id;",
        )?;
        let rows = stmt.query_map(params![operation_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (operation_id, kind, entity_id, recorded_at, outcome, changes, reason, elapsed_us) =
                row?;
            let kind = EntityKind::parse(&kind)
                .ok_or_else(|| GraphError::Database(format!("unknown entity kind {kind:?}")))?;
            let outcome: OutcomeKind =
                serde_json::from_value(serde_json::Value::String(outcome))?;
            let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
                .map_err(|e| GraphError::Database(format!("bad audit timestamp: {e}")))?
                .with_timezone(&Utc);
            let changes: Vec<AttributeChange> = match changes {
                Some(json) => serde_json::from_str(&json)?,
                None => Vec::new(),
            };
            records.push(AuditRecord {
                operation_id,
                kind,
                entity_id,
                recorded_at,
                outcome,
                changes,
                reason,
                elapsed_us,
            });
        }
        Ok(records)
    }

    /// Copy the database to `destination` using the SQLite backup API.
    pub fn backup_to(&self, destination: impl AsRef<Path>) -> GraphResult<PathBuf> {
        let resolved = resolve_path(destination.as_ref())?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let src_conn = self.connect()?;
        let mut dst_conn = Connection::open(&resolved)?;
        let backup = rusqlite::backup::Backup::new(&src_conn, &mut dst_conn)?;
        backup.run_to_completion(100, Duration::from_millis(10), None)?;
        Ok(resolved)
    }
}

impl GraphStore for Database {
    fn begin(&self) -> GraphResult<Box<dyn GraphSession + '_>> {
        let conn = self.connect()?;
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| GraphError::Transaction(format!("failed to begin transaction: {e}")))?;
        Ok(Box::new(SqliteSession { conn, open: true }))
    }
}

// ---------------------------------------------------------------------------
// SqliteSession
// ---------------------------------------------------------------------------

pub struct SqliteSession {
    conn: Connection,
    open: bool,
}

impl GraphSession for SqliteSession {
    fn find_entity(&mut self, kind: EntityKind, id: &str) -> GraphResult<Option<Entity>> {
        let raw = self
            .conn
            .prepare_cached(
                "SELECT id, kind, provisional, properties_json \
                 FROM entities WHERE kind = ?1 AND id = ?2;",
            )?
            .query_row(params![kind.as_str(), id], entity_from_row)
            .optional()?;
        raw.map(decode_entity).transpose()
    }

    fn create_entity(&mut self, entity: &Entity) -> GraphResult<()> {
        let properties_json = serde_json::to_string(&entity.properties)?;
        self.conn
            .prepare_cached(
                "INSERT INTO entities (id, kind, provisional, properties_json) \
                 VALUES (?1, ?2, ?3, ?4);",
            )?
            .execute(params![
                entity.id,
                entity.kind.as_str(),
                entity.provisional as i64,
                properties_json
            ])?;
        Ok(())
    }

    fn update_entity(&mut self, entity: &Entity) -> GraphResult<()> {
        let properties_json = serde_json::to_string(&entity.properties)?;
        let changed = self
            .conn
            .prepare_cached(
                "UPDATE entities SET provisional = ?3, properties_json = ?4, \
                        updated_at = CURRENT_TIMESTAMP \
                 WHERE kind = ?1 AND id = ?2;",
            )?
            .execute(params![
                entity.kind.as_str(),
                entity.id,
                entity.provisional as i64,
                properties_json
            ])?;
        if changed == 0 {
            return Err(GraphError::Database(format!(
                "update of missing entity {}",
                entity.id
            )));
        }
        Ok(())
    }

    fn merge_edge(&mut self, edge: &DependencyEdge) -> GraphResult<EdgeWrite> {
        let key = edge.key();
        let attributes_json = if edge.metadata.attributes.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&edge.metadata.attributes)?)
        };
        let existed = self
            .conn
            .prepare_cached(
                "SELECT 1 FROM dependency_edges \
                 WHERE from_id = ?1 AND to_id = ?2 AND edge_type = ?3 \
                   AND usage_kind = ?4 AND context = ?5;",
            )?
            .exists(params![
                key.from_id,
                key.to_id,
                key.edge_type.as_str(),
                key.usage_kind,
                key.context
            ])?;
        let written = self
            .conn
            .prepare_cached(
                "INSERT INTO dependency_edges ( \
                     from_id, to_id, edge_type, usage_kind, context, qualified_name, \
                     is_external, attributes_json, source_path \
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
                 ON CONFLICT(from_id, to_id, edge_type, usage_kind, context) DO UPDATE SET \
                     qualified_name = excluded.qualified_name, \
                     is_external = excluded.is_external, \
                     attributes_json = excluded.attributes_json, \
                     source_path = excluded.source_path \
                 WHERE dependency_edges.qualified_name IS NOT excluded.qualified_name \
                    OR dependency_edges.is_external IS NOT excluded.is_external \
                    OR dependency_edges.attributes_json IS NOT excluded.attributes_json \
                    OR dependency_edges.source_path IS NOT excluded.source_path;",
            )?
            .execute(params![
                key.from_id,
                key.to_id,
                key.edge_type.as_str(),
                key.usage_kind,
                key.context,
                edge.metadata.qualified_name,
                edge.metadata.is_external as i64,
                attributes_json,
                edge.source_path,
            ])?;
        Ok(match (existed, written > 0) {
            (false, _) => EdgeWrite::Inserted,
            (true, true) => EdgeWrite::Updated,
            (true, false) => EdgeWrite::Unchanged,
        })
    }

    fn edges_for_source(&mut self, source_path: &str) -> GraphResult<Vec<EdgeKey>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT from_id, to_id, edge_type, usage_kind, context \
             FROM dependency_edges WHERE source_path = ?1 ORDER BY id;",
        )?;
        let rows = stmt.query_map(params![source_path], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let mut keys = Vec::new();
        for row in rows {
            let (from_id, to_id, edge_type, usage_kind, context) = row?;
            let Some(edge_type) = EdgeType::parse(&edge_type) else {
                warn!(edge_type = %edge_type, "skipping stored edge with unknown type");
                continue;
            };
            keys.push(EdgeKey {
                from_id,
                to_id,
                edge_type,
                usage_kind,
                context,
            });
        }
        Ok(keys)
    }

    fn delete_edge(&mut self, key: &EdgeKey) -> GraphResult<bool> {
        let deleted = self
            .conn
            .prepare_cached(
                "DELETE FROM dependency_edges \
                 WHERE from_id = ?1 AND to_id = ?2 AND edge_type = ?3 \
                   AND usage_kind = ?4 AND context = ?5;",
            )?
            .execute(params![
                key.from_id,
                key.to_id,
                key.edge_type.as_str(),
                key.usage_kind,
                key.context
            ])?;
        Ok(deleted > 0)
    }

    fn record_audit(&mut self, record: &AuditRecord) -> GraphResult<()> {
        let changes_json = if record.changes.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&record.changes)?)
        };
        self.conn
            .prepare_cached(
                "INSERT INTO upsert_audit ( \
                     operation_id, kind, entity_id, recorded_at, outcome, \
                     changes_json, reason, elapsed_us \
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            )?
            .execute(params![
                record.operation_id,
                record.kind.as_str(),
                record.entity_id,
                record.recorded_at.to_rfc3339(),
                record.outcome.as_str(),
                changes_json,
                record.reason,
                record.elapsed_us,
            ])?;
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> GraphResult<()> {
        self.open = false;
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| GraphError::Transaction(format!("failed to commit: {e}")))?;
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> GraphResult<()> {
        self.open = false;
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| GraphError::Transaction(format!("failed to roll back: {e}")))?;
        Ok(())
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        if self.open {
            debug!("rolling back abandoned session");
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}
