//! Trial persistence: keyed upsert, lookup and weighted full-text search.

use std::path::Path;

use chrono::NaiveDateTime;
use rusqlite::types::{ToSqlOutput, Value as SqlValue};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};
use serde::Serialize;
use serde_json::{Map, Value};

use super::sqlite::{open_database, open_memory_database, SEARCH_TABLE, TRIALS_TABLE};
use super::DatabaseError;
use crate::models::{ColumnValue, FlattenedRecord, KEY_COLUMN};

/// bm25 weights for search tiers A (identifier, titles), B (sponsor, phase,
/// status, study type), C (design) and D (severity, sex, volunteers).
const TIER_WEIGHTS: [f64; 4] = [8.0, 4.0, 2.0, 1.0];

impl ToSql for ColumnValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            ColumnValue::Text(v) => v.to_sql(),
            ColumnValue::Integer(v) => v.to_sql(),
            ColumnValue::Json(Value::Null) => Ok(ToSqlOutput::Owned(SqlValue::Null)),
            ColumnValue::Json(v) => Ok(ToSqlOutput::Owned(SqlValue::Text(v.to_string()))),
        }
    }
}

/// Keyed persistence of flattened trials.
pub trait PersistenceGateway {
    /// Insert the record, or replace every column of the row with the same
    /// identifier. All-or-nothing.
    fn upsert(&self, record: &FlattenedRecord) -> Result<(), DatabaseError>;
}

/// A stored trial row. JSON columns are decoded back into values.
#[derive(Debug, Clone, Serialize)]
pub struct StoredTrial {
    pub id: i64,
    pub nct_id: String,
    pub fields: Map<String, Value>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl StoredTrial {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub nct_id: String,
    pub brief_title: Option<String>,
    pub score: f64,
}

pub struct SqliteTrialStore {
    conn: Connection,
}

impl SqliteTrialStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self { conn: open_database(path)? })
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self { conn: open_memory_database()? })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn count(&self) -> Result<i64, DatabaseError> {
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {TRIALS_TABLE}"), [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn get(&self, nct_id: &str) -> Result<StoredTrial, DatabaseError> {
        let columns = FlattenedRecord::default().columns();
        let names: Vec<&str> = columns.iter().map(|c| c.name).collect();
        let sql = format!(
            "SELECT id, created_at, updated_at, {} FROM {TRIALS_TABLE} WHERE {KEY_COLUMN} = ?1",
            names.join(", ")
        );

        let trial = self
            .conn
            .query_row(&sql, params![nct_id], |row| {
                let mut fields = Map::new();
                for (i, column) in columns.iter().enumerate() {
                    let idx = i + 3;
                    let value = match column.value {
                        ColumnValue::Integer(_) => {
                            row.get::<_, Option<i64>>(idx)?.map(Value::from).unwrap_or(Value::Null)
                        }
                        ColumnValue::Text(_) => {
                            row.get::<_, Option<String>>(idx)?.map(Value::String).unwrap_or(Value::Null)
                        }
                        ColumnValue::Json(_) => row
                            .get::<_, Option<String>>(idx)?
                            .map(|text| serde_json::from_str(&text).unwrap_or(Value::String(text)))
                            .unwrap_or(Value::Null),
                    };
                    fields.insert(column.name.to_string(), value);
                }
                Ok(StoredTrial {
                    id: row.get(0)?,
                    nct_id: nct_id.to_string(),
                    fields,
                    created_at: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            })
            .optional()?;

        trial.ok_or_else(|| DatabaseError::NotFound {
            entity_type: "clinical_trial".into(),
            id: nct_id.to_string(),
        })
    }

    /// Full-text search ranked by weighted bm25 (best first).
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, DatabaseError> {
        let sanitized = sanitize_fts_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }

        let [a, b, c, d] = TIER_WEIGHTS;
        let sql = format!(
            "SELECT t.{KEY_COLUMN}, t.brief_title, bm25({SEARCH_TABLE}, {a}, {b}, {c}, {d}) AS score
             FROM {SEARCH_TABLE}
             JOIN {TRIALS_TABLE} t ON t.id = {SEARCH_TABLE}.rowid
             WHERE {SEARCH_TABLE} MATCH ?1
             ORDER BY score
             LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let hits = stmt
            .query_map(params![sanitized, limit as i64], |row| {
                Ok(SearchHit {
                    nct_id: row.get(0)?,
                    brief_title: row.get(1)?,
                    score: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(hits)
    }
}

impl PersistenceGateway for SqliteTrialStore {
    fn upsert(&self, record: &FlattenedRecord) -> Result<(), DatabaseError> {
        let columns = record.columns();
        let sql = upsert_sql(&columns.iter().map(|c| c.name).collect::<Vec<_>>());

        // Dropped without commit on any error, which rolls everything back.
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(&sql, params_from_iter(columns.iter().map(|c| &c.value)))?;

        let rowid: i64 = tx.query_row(
            &format!("SELECT id FROM {TRIALS_TABLE} WHERE {KEY_COLUMN} = ?1"),
            params![record.nct_id],
            |row| row.get(0),
        )?;
        let tiers = search_tiers(record);
        tx.execute(&format!("DELETE FROM {SEARCH_TABLE} WHERE rowid = ?1"), params![rowid])?;
        tx.execute(
            &format!(
                "INSERT INTO {SEARCH_TABLE} (rowid, tier_a, tier_b, tier_c, tier_d)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ),
            params![rowid, tiers[0], tiers[1], tiers[2], tiers[3]],
        )?;
        tx.commit()?;

        tracing::info!(nct_id = %record.nct_id, rowid, "Trial persisted");
        Ok(())
    }
}

/// `INSERT … ON CONFLICT(nct_id) DO UPDATE` over exactly `names`.
fn upsert_sql(names: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
    let updates: Vec<String> = names
        .iter()
        .filter(|n| **n != KEY_COLUMN)
        .map(|n| format!("{n} = excluded.{n}"))
        .collect();
    format!(
        "INSERT INTO {TRIALS_TABLE} ({}) VALUES ({})
         ON CONFLICT({KEY_COLUMN}) DO UPDATE SET {}, updated_at = datetime('now')",
        names.join(", "),
        placeholders.join(", "),
        updates.join(", "),
    )
}

fn search_tiers(record: &FlattenedRecord) -> [String; 4] {
    let join = |parts: &[Option<&str>]| parts.iter().flatten().copied().collect::<Vec<_>>().join(" ");
    [
        join(&[
            Some(record.nct_id.as_str()),
            record.brief_title.as_deref(),
            record.official_title.as_deref(),
        ]),
        join(&[
            record.primary_sponsor.as_deref(),
            record.phase.as_deref(),
            record.status.as_deref(),
            record.study_type.as_deref(),
        ]),
        join(&[
            record.primary_purpose.as_deref(),
            record.intervention_model.as_deref(),
            record.allocation.as_deref(),
            record.masking.as_deref(),
        ]),
        join(&[
            record.disease_severity.as_deref(),
            record.eligible_sex.as_deref(),
            record.healthy_volunteers.as_deref(),
        ]),
    ]
}

/// Keep word characters only and prefix-match every term.
fn sanitize_fts_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() || c == '-' { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .map(|w| format!("\"{w}\"*"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(nct_id: &str, title: &str) -> FlattenedRecord {
        FlattenedRecord {
            nct_id: nct_id.into(),
            brief_title: Some(title.into()),
            status: Some("Recruiting".into()),
            phase: Some("Phase 2".into()),
            target_enrollment: Some(120),
            drug_names: vec!["Drug X".into()],
            analyzed_data: json!({"core_trial_metadata": {"nct_id": nct_id}}),
            ..Default::default()
        }
    }

    #[test]
    fn upsert_inserts_then_reads_back() {
        let store = SqliteTrialStore::in_memory().unwrap();
        store.upsert(&record("NCT00000001", "Drug X in lung cancer")).unwrap();

        let trial = store.get("NCT00000001").unwrap();
        assert_eq!(trial.field("status"), Some(&json!("Recruiting")));
        assert_eq!(trial.field("target_enrollment"), Some(&json!(120)));
        assert_eq!(trial.field("drug_names"), Some(&json!(["Drug X"])));
        assert_eq!(trial.field("analyzed_data").unwrap()["core_trial_metadata"]["nct_id"], "NCT00000001");
        assert_eq!(trial.field("actual_enrollment"), None);
    }

    #[test]
    fn upsert_is_idempotent_and_last_write_wins() {
        let store = SqliteTrialStore::in_memory().unwrap();
        let mut first = record("NCT00000001", "Original title");
        store.upsert(&first).unwrap();
        first.status = Some("Completed".into());
        first.brief_title = Some("Revised title".into());
        store.upsert(&first).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let trial = store.get("NCT00000001").unwrap();
        assert_eq!(trial.field("status"), Some(&json!("Completed")));
        assert_eq!(trial.field("brief_title"), Some(&json!("Revised title")));
    }

    #[test]
    fn update_clears_removed_values() {
        let store = SqliteTrialStore::in_memory().unwrap();
        let mut r = record("NCT00000001", "Title");
        store.upsert(&r).unwrap();
        r.target_enrollment = None;
        store.upsert(&r).unwrap();
        assert_eq!(store.get("NCT00000001").unwrap().field("target_enrollment"), None);
    }

    #[test]
    fn missing_trial_is_not_found() {
        let store = SqliteTrialStore::in_memory().unwrap();
        assert!(matches!(store.get("NCT404"), Err(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn search_ranks_title_match_first() {
        let store = SqliteTrialStore::in_memory().unwrap();
        store.upsert(&record("NCT00000001", "Osimertinib in NSCLC")).unwrap();
        let mut other = record("NCT00000002", "Chemotherapy regimen");
        other.disease_severity = Some("Osimertinib resistant".into());
        store.upsert(&other).unwrap();

        let hits = store.search("osimertinib", 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].nct_id, "NCT00000001");
    }

    #[test]
    fn search_index_follows_updates() {
        let store = SqliteTrialStore::in_memory().unwrap();
        let mut r = record("NCT00000001", "Alpha study");
        store.upsert(&r).unwrap();
        r.brief_title = Some("Beta study".into());
        store.upsert(&r).unwrap();

        assert!(store.search("alpha", 10).unwrap().is_empty());
        assert_eq!(store.search("beta", 10).unwrap().len(), 1);
    }

    #[test]
    fn blank_or_symbolic_query_returns_nothing() {
        let store = SqliteTrialStore::in_memory().unwrap();
        store.upsert(&record("NCT00000001", "Title")).unwrap();
        assert!(store.search("   ", 10).unwrap().is_empty());
        assert!(store.search("\"*()", 10).unwrap().is_empty());
    }

    #[test]
    fn upsert_statement_covers_every_column_once() {
        let names = FlattenedRecord::column_names();
        let sql = upsert_sql(&names);
        assert!(sql.contains(&format!("?{}", names.len())));
        assert!(!sql.contains(&format!("?{}", names.len() + 1)));
        assert!(!sql.contains("nct_id = excluded.nct_id"));
    }

    #[test]
    fn json_null_is_stored_as_sql_null() {
        let store = SqliteTrialStore::in_memory().unwrap();
        store.upsert(&record("NCT00000001", "Title")).unwrap();
        let raw: Option<String> = store
            .connection()
            .query_row(
                "SELECT responsible_party FROM clinical_trials WHERE nct_id = 'NCT00000001'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(raw, None);
    }
}
