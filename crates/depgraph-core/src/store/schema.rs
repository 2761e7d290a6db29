//! SQLite schema DDL and migration framework.
//!
//! `SCHEMA_STATEMENTS` always describes the latest layout and is safe to
//! replay. Version 1 is the baseline; later layout changes add a step to
//! [`migrate_schema`] and bump [`SCHEMA_VERSION`].

use rusqlite::Connection;

use crate::errors::GraphResult;

/// Current schema version. Migrations run from whatever the DB currently
/// reports up to this value.
pub const SCHEMA_VERSION: i32 = 1;

/// Core DDL statements: 5 CREATE TABLE + 6 CREATE INDEX.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // ── tables (5) ──────────────────────────────────────────────────────
    "CREATE TABLE IF NOT EXISTS graph_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS entities (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        provisional INTEGER NOT NULL DEFAULT 0,
        properties_json TEXT NOT NULL,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
        UNIQUE(kind, id)
    );",
    "CREATE TABLE IF NOT EXISTS dependency_edges (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_id TEXT NOT NULL,
        to_id TEXT NOT NULL,
        edge_type TEXT NOT NULL,
        usage_kind TEXT NOT NULL DEFAULT '',
        context TEXT NOT NULL DEFAULT '',
        qualified_name TEXT,
        is_external INTEGER NOT NULL DEFAULT 0,
        attributes_json TEXT,
        source_path TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP,
        UNIQUE(from_id, to_id, edge_type, usage_kind, context)
    );",
    "CREATE TABLE IF NOT EXISTS upsert_audit (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        operation_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        recorded_at TEXT NOT NULL,
        outcome TEXT NOT NULL,
        changes_json TEXT,
        reason TEXT,
        elapsed_us INTEGER NOT NULL DEFAULT 0
    );",
    "CREATE TABLE IF NOT EXISTS migration_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_version INTEGER NOT NULL,
        to_version INTEGER NOT NULL,
        status TEXT NOT NULL,
        error_message TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
    // ── indexes (6) ─────────────────────────────────────────────────────
    "CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities(kind);",
    "CREATE INDEX IF NOT EXISTS idx_edges_from ON dependency_edges(from_id, edge_type);",
    "CREATE INDEX IF NOT EXISTS idx_edges_to ON dependency_edges(to_id, edge_type);",
    "CREATE INDEX IF NOT EXISTS idx_edges_source_path ON dependency_edges(source_path);",
    "CREATE INDEX IF NOT EXISTS idx_audit_operation ON upsert_audit(operation_id, kind, entity_id, recorded_at);",
    "CREATE INDEX IF NOT EXISTS idx_audit_entity ON upsert_audit(entity_id, recorded_at);",
];

// ─── Migration framework ────────────────────────────────────────────────────

/// Run all pending migrations from the current stored version up to
/// [`SCHEMA_VERSION`]. Each step is wrapped in a SAVEPOINT so a failure
/// rolls back only that single step.
pub fn migrate_schema(conn: &Connection) -> GraphResult<()> {
    let mut current_version = get_schema_version(conn);

    while current_version < SCHEMA_VERSION {
        let next_version = current_version + 1;
        conn.execute_batch("SAVEPOINT depgraph_migrate_step;")?;

        let step_result = (|| -> GraphResult<()> {
            match next_version {
                1 => migrate_to_v1(conn)?,
                _ => {}
            }
            set_schema_version(conn, next_version)?;
            record_migration_step(conn, current_version, next_version, "success", None)?;
            conn.execute_batch("RELEASE SAVEPOINT depgraph_migrate_step;")?;
            Ok(())
        })();

        match step_result {
            Ok(()) => {
                current_version = next_version;
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK TO SAVEPOINT depgraph_migrate_step;");
                let _ = conn.execute_batch("RELEASE SAVEPOINT depgraph_migrate_step;");
                let _ = record_migration_step(
                    conn,
                    current_version,
                    next_version,
                    "failed",
                    Some(&e.to_string()),
                );
                return Err(e);
            }
        }
    }

    Ok(())
}

/// Read the current schema version from `graph_meta`.
/// Returns 0 when the key is absent or unparseable.
pub fn get_schema_version(conn: &Connection) -> i32 {
    let result: Result<String, _> = conn.query_row(
        "SELECT value FROM graph_meta WHERE key = 'schema_version';",
        [],
        |row| row.get(0),
    );
    match result {
        Ok(v) => v.parse::<i32>().unwrap_or(0),
        Err(_) => 0,
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> GraphResult<()> {
    conn.execute(
        "INSERT INTO graph_meta(key, value) \
         VALUES('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        rusqlite::params![version.to_string()],
    )?;
    Ok(())
}

fn record_migration_step(
    conn: &Connection,
    from_v: i32,
    to_v: i32,
    status: &str,
    error_msg: Option<&str>,
) -> GraphResult<()> {
    conn.execute(
        "INSERT INTO migration_history(from_version, to_version, status, error_message) \
         VALUES (?1, ?2, ?3, ?4);",
        rusqlite::params![from_v, to_v, status, error_msg],
    )?;
    Ok(())
}

// ─── Individual migration steps ─────────────────────────────────────────────

/// v0 -> v1: baseline, no-op.
fn migrate_to_v1(_conn: &Connection) -> GraphResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        for stmt in SCHEMA_STATEMENTS {
            conn.execute_batch(stmt).unwrap();
        }
        conn
    }

    #[test]
    fn schema_statement_counts() {
        assert_eq!(SCHEMA_STATEMENTS.len(), 11);
    }

    #[test]
    fn migrate_fresh_database() {
        let conn = fresh();
        migrate_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);

        let steps: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM migration_history WHERE status = 'success';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(steps, SCHEMA_VERSION as i64);
    }

    #[test]
    fn migrate_idempotent() {
        let conn = fresh();
        migrate_schema(&conn).unwrap();
        migrate_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn each_index_is_declared_once() {
        let conn = fresh();
        migrate_schema(&conn).unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'index' AND name LIKE 'idx_%' ORDER BY name;",
            )
            .unwrap();
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            names,
            [
                "idx_audit_entity",
                "idx_audit_operation",
                "idx_edges_from",
                "idx_edges_source_path",
                "idx_edges_to",
                "idx_entities_kind",
            ]
        );

        let declared = SCHEMA_STATEMENTS
            .iter()
            .filter(|stmt| stmt.contains("idx_audit_entity"))
            .count();
        assert_eq!(declared, 1);
    }
}
