use crate::errors::StoreError;
use crate::model::{BatchSummary, Page, ProfileRecord, ProfileUpsert, StoreStats, UpsertResult};
use crate::storage::schema::{self, SCHEMA_VERSION};
use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long a writer waits on a locked database file before failing with SQLITE_BUSY.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

/// Handle to the profile table. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with(path, &StoreOptions::default())
    }

    pub fn open_with(path: &Path, opts: &StoreOptions) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(opts.busy_timeout)?;
        // WAL lets readers in other processes proceed during a write.
        match conn.pragma_update_and_check(None, "journal_mode", "WAL", |r| r.get::<_, String>(0)) {
            Ok(mode) if mode.eq_ignore_ascii_case("wal") => {}
            Ok(mode) => {
                tracing::warn!(event = "wal_unavailable", path = %path.display(), journal_mode = %mode)
            }
            Err(e) => {
                tracing::warn!(event = "wal_unavailable", path = %path.display(), error = %e)
            }
        }
        Self::init_connection(&conn)?;
        tracing::debug!(event = "store_open", path = %path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> Result<(), StoreError> {
        // The updated_at trigger issues an UPDATE on its own table.
        conn.pragma_update(None, "recursive_triggers", "OFF")?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let found: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        if found > SCHEMA_VERSION {
            return Err(StoreError::SchemaTooNew {
                found,
                supported: SCHEMA_VERSION,
            });
        }

        conn.execute_batch(schema::DDL)?;
        if found < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }

        tracing::debug!(event = "schema_ready", version = SCHEMA_VERSION, previous = found);
        Ok(())
    }

    /// Insert the profile, or update only the supplied columns if the id exists.
    ///
    /// Either way the engine stamps `updated_at`; on update it does so even when
    /// nothing but the id was supplied.
    pub fn upsert(&self, profile: &ProfileUpsert) -> Result<UpsertResult, StoreError> {
        let mut conn = self.lock()?;
        let tx = begin_write(&mut conn)?;
        let result = upsert_in(&tx, profile)?;
        tx.commit()?;

        tracing::debug!(
            event = "profile_upsert",
            id = %profile.id,
            created = result.created
        );
        Ok(result)
    }

    /// Upsert many profiles in one transaction. Any failure rolls back the batch.
    pub fn upsert_batch(&self, profiles: &[ProfileUpsert]) -> Result<BatchSummary, StoreError> {
        let mut conn = self.lock()?;
        let tx = begin_write(&mut conn)?;
        let mut summary = BatchSummary::default();
        for profile in profiles {
            if upsert_in(&tx, profile)?.created {
                summary.inserted += 1;
            } else {
                summary.updated += 1;
            }
        }
        tx.commit()?;

        tracing::info!(
            event = "profile_batch_upsert",
            inserted = summary.inserted,
            updated = summary.updated
        );
        Ok(summary)
    }

    /// Plain insert. Fails with `UniqueConstraintViolation` if the id exists.
    pub fn insert(&self, profile: &ProfileUpsert) -> Result<ProfileRecord, StoreError> {
        let mut conn = self.lock()?;
        let tx = begin_write(&mut conn)?;

        let assignments = supplied_columns(profile)?;
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            schema::TABLE,
            column_list(&assignments),
            placeholders(assignments.len() + 1)
        );
        tx.execute(&sql, params_from_iter(bind_values(profile, assignments)))
            .map_err(|e| StoreError::for_id(e, &profile.id))?;
        let record = read_back(&tx, &profile.id)?;
        tx.commit()?;

        tracing::debug!(event = "profile_insert", id = %profile.id);
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Result<Option<ProfileRecord>, StoreError> {
        let conn = self.lock()?;
        fetch_by_id(&conn, id)
    }

    /// Most recently fetched profile whose source page is `url`.
    pub fn find_by_profile_url(&self, url: &str) -> Result<Option<ProfileRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = select_sql("WHERE profile_url = ?1 ORDER BY last_fetched DESC LIMIT 1");
        Ok(conn
            .query_row(&sql, params![url], row_to_record)
            .optional()?)
    }

    pub fn list_by_points_desc(&self, page: Page) -> Result<Vec<ProfileRecord>, StoreError> {
        self.list_ordered(POINTS_DESC, page)
    }

    pub fn list_by_last_fetched_desc(&self, page: Page) -> Result<Vec<ProfileRecord>, StoreError> {
        self.list_ordered(LAST_FETCHED_DESC, page)
    }

    fn list_ordered(&self, order_by: &str, page: Page) -> Result<Vec<ProfileRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&ordered_sql(order_by))?;
        let rows = stmt.query_map(params![page.limit, page.offset], row_to_record)?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Returns whether a row was removed.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let n = conn.execute(
            "DELETE FROM skillrack_profiles WHERE id = ?1",
            params![id],
        )?;
        tracing::debug!(event = "profile_delete", id = %id, removed = n > 0);
        Ok(n > 0)
    }

    pub fn stats_best_effort(&self) -> Result<StoreStats, StoreError> {
        let conn = self.lock()?;

        let profiles: Option<u64> = conn
            .query_row("SELECT COUNT(*) FROM skillrack_profiles", [], |r| {
                r.get::<_, i64>(0).map(|x| x as u64)
            })
            .ok();

        let range: Option<(Option<String>, Option<String>)> = conn
            .query_row(
                "SELECT MAX(last_fetched), MIN(last_fetched) FROM skillrack_profiles",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .ok();
        let (newest_fetch, oldest_fetch) = range.unwrap_or((None, None));

        let schema_version: Option<i64> = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .ok();

        Ok(StoreStats {
            profiles,
            newest_fetch,
            oldest_fetch,
            schema_version,
        })
    }
}

// Take the write lock up front: a deferred read-then-write transaction can fail with
// SQLITE_BUSY_SNAPSHOT under WAL without waiting on the busy timeout.
fn begin_write(conn: &mut Connection) -> Result<Transaction<'_>, StoreError> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

const POINTS_DESC: &str = "points DESC";
const LAST_FETCHED_DESC: &str = "last_fetched DESC";

fn upsert_in(conn: &Connection, profile: &ProfileUpsert) -> Result<UpsertResult, StoreError> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM skillrack_profiles WHERE id = ?1",
            params![profile.id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    let assignments = supplied_columns(profile)?;
    // An update with no business columns must still reach the trigger.
    let set_clause = if assignments.is_empty() {
        "id = excluded.id".to_string()
    } else {
        assignments
            .iter()
            .map(|(col, _)| format!("{col} = excluded.{col}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
        schema::TABLE,
        column_list(&assignments),
        placeholders(assignments.len() + 1),
        set_clause
    );

    conn.execute(&sql, params_from_iter(bind_values(profile, assignments)))
        .map_err(|e| StoreError::for_id(e, &profile.id))?;

    Ok(UpsertResult {
        created: !exists,
        record: read_back(conn, &profile.id)?,
    })
}

fn supplied_columns(profile: &ProfileUpsert) -> Result<Vec<(&'static str, Value)>, StoreError> {
    let text = |v: &Option<String>| v.clone().map(Value::Text).unwrap_or(Value::Null);

    let mut out = Vec::new();
    if let Some(v) = &profile.name {
        out.push(("name", text(v)));
    }
    if let Some(v) = &profile.college {
        out.push(("college", text(v)));
    }
    if let Some(v) = profile.points {
        out.push(("points", Value::Integer(i64::from(v))));
    }
    if let Some(at) = &profile.last_fetched {
        check_storable_year(at)?;
        out.push(("last_fetched", Value::Text(format_timestamp(at))));
    }
    if let Some(v) = profile.dc {
        out.push(("dc", Value::Integer(i64::from(v))));
    }
    if let Some(v) = profile.dt {
        out.push(("dt", Value::Integer(i64::from(v))));
    }
    if let Some(v) = &profile.profile_url {
        out.push(("profile_url", text(v)));
    }
    Ok(out)
}

/// The fixed-width text encoding only holds four-digit years.
fn check_storable_year(at: &DateTime<Utc>) -> Result<(), StoreError> {
    let year = at.year();
    if (0..=9999).contains(&year) {
        return Ok(());
    }
    Err(StoreError::TypeMismatch {
        column: "last_fetched".to_string(),
        detail: format!("year {year} is outside 0000-9999"),
    })
}

fn column_list(assignments: &[(&'static str, Value)]) -> String {
    std::iter::once("id")
        .chain(assignments.iter().map(|(col, _)| *col))
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn bind_values(profile: &ProfileUpsert, assignments: Vec<(&'static str, Value)>) -> Vec<Value> {
    std::iter::once(Value::Text(profile.id.clone()))
        .chain(assignments.into_iter().map(|(_, v)| v))
        .collect()
}

fn read_back(conn: &Connection, id: &str) -> Result<ProfileRecord, StoreError> {
    fetch_by_id(conn, id)?.ok_or_else(|| StoreError::NotFound { id: id.to_string() })
}

fn fetch_by_id(conn: &Connection, id: &str) -> Result<Option<ProfileRecord>, StoreError> {
    let sql = select_sql("WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], row_to_record).optional()?)
}

fn select_sql(tail: &str) -> String {
    format!(
        "SELECT {} FROM {} {}",
        schema::COLUMNS.join(", "),
        schema::TABLE,
        tail
    )
}

pub(crate) fn ordered_sql(order_by: &str) -> String {
    select_sql(&format!("ORDER BY {order_by} LIMIT ?1 OFFSET ?2"))
}

// Column indices follow schema::COLUMNS.
fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ProfileRecord> {
    Ok(ProfileRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        college: row.get(2)?,
        points: row.get(3)?,
        last_fetched: timestamp_at(row, 4)?,
        dc: row.get(5)?,
        dt: row.get(6)?,
        profile_url: row.get(7)?,
        created_at: timestamp_at(row, 8)?,
        updated_at: timestamp_at(row, 9)?,
    })
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|d| d.with_timezone(&Utc))
}
