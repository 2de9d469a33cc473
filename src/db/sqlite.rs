use std::path::Path;

use rusqlite::Connection;

use super::DatabaseError;
use crate::models::{FlattenedRecord, KEY_COLUMN};

/// Table holding one row per trial.
pub const TRIALS_TABLE: &str = "clinical_trials";

/// FTS5 index over the weighted search tiers of each trial row.
pub const SEARCH_TABLE: &str = "clinical_trials_search";

/// Open a SQLite connection to the given path and run migrations.
/// Missing parent directories are created.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    prepare(Connection::open(path)?)
}

fn prepare(conn: Connection) -> Result<Connection, DatabaseError> {
    conn.execute_batch("PRAGMA journal_mode=DELETE;")?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Migrated in-memory database; used by tests and throwaway runs.
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    prepare(conn)
}

/// Apply every migration newer than the recorded schema version.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    apply_migrations(conn, &[(1, initial_schema())])
}

/// Each pending migration runs in its own transaction; a failing one is
/// rolled back and stops the run.
fn apply_migrations(conn: &Connection, migrations: &[(i64, String)]) -> Result<(), DatabaseError> {
    let applied = schema_version(conn);

    for (version, sql) in migrations.iter().filter(|(version, _)| *version > applied) {
        let version = *version;
        tracing::info!(version, "Applying schema migration");
        let failed = |e: rusqlite::Error| DatabaseError::MigrationFailed { version, reason: e.to_string() };

        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(sql).map_err(failed)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
            .map_err(failed)?;
        tx.commit().map_err(failed)?;
    }
    Ok(())
}

/// Recorded schema version; 0 before the first migration.
fn schema_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .unwrap_or(0)
}

/// v1: trial table generated from [`FlattenedRecord::columns`], its lookup
/// indexes and the FTS5 search table.
fn initial_schema() -> String {
    let columns: Vec<String> = FlattenedRecord::default()
        .columns()
        .into_iter()
        .map(|c| {
            if c.name == KEY_COLUMN {
                format!("    {} TEXT NOT NULL UNIQUE", c.name)
            } else {
                format!("    {} {}", c.name, c.value.sql_type())
            }
        })
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE TABLE {TRIALS_TABLE} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
{columns},
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX idx_{TRIALS_TABLE}_status ON {TRIALS_TABLE}(status);
CREATE INDEX idx_{TRIALS_TABLE}_phase ON {TRIALS_TABLE}(phase);
CREATE INDEX idx_{TRIALS_TABLE}_start_date ON {TRIALS_TABLE}(start_date);
CREATE INDEX idx_{TRIALS_TABLE}_primary_sponsor ON {TRIALS_TABLE}(primary_sponsor);
CREATE VIRTUAL TABLE {SEARCH_TABLE} USING fts5(tier_a, tier_b, tier_c, tier_d);",
        columns = columns.join(",\n"),
    )
}

/// Names of the columns of a table, in declaration order.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_is_at_version_one() {
        let conn = open_memory_database().unwrap();
        assert_eq!(schema_version(&conn), 1);
    }

    #[test]
    fn rerunning_migrations_is_a_no_op() {
        let conn = open_memory_database().unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(schema_version(&conn), 1);
    }

    #[test]
    fn failed_migration_rolls_back_and_leaves_no_open_transaction() {
        let conn = open_memory_database().unwrap();
        let broken = [(2, "CREATE TABLE extra (x INTEGER); NOT VALID SQL;".to_string())];

        let err = apply_migrations(&conn, &broken).unwrap_err();
        assert!(matches!(err, DatabaseError::MigrationFailed { version: 2, .. }));
        assert!(conn.is_autocommit());
        assert_eq!(schema_version(&conn), 1);
        assert!(table_columns(&conn, "extra").unwrap().is_empty());
    }

    #[test]
    fn trial_table_has_every_record_column() {
        let conn = open_memory_database().unwrap();
        let columns = table_columns(&conn, TRIALS_TABLE).unwrap();
        for name in FlattenedRecord::column_names() {
            assert!(columns.iter().any(|c| c == name), "missing column {name}");
        }
        assert_eq!(columns.len(), FlattenedRecord::column_names().len() + 3);
    }

    #[test]
    fn integer_columns_have_integer_affinity() {
        let conn = open_memory_database().unwrap();
        let declared: String = conn
            .query_row(
                "SELECT type FROM pragma_table_info(?1) WHERE name = 'min_age'",
                [TRIALS_TABLE],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(declared, "INTEGER");
    }

    #[test]
    fn search_table_exists() {
        let conn = open_memory_database().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = ?1",
                [SEARCH_TABLE],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn on_disk_database_creates_parent_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("trials.db");
        open_database(&path).unwrap();
        assert!(path.exists());
    }
}
