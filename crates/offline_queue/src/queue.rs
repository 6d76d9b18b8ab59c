//! SQLite-backed durable queue implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, instrument, warn};

use contracts::{Destination, QueuedRecord, RecordId, RecordPayload, RelayError, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS offline_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    destination TEXT NOT NULL CHECK(destination IN ('storage', 'remote_api')),
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    last_attempt TEXT
);
CREATE INDEX IF NOT EXISTS idx_offline_queue_created_at
    ON offline_queue(created_at);
CREATE INDEX IF NOT EXISTS idx_offline_queue_destination
    ON offline_queue(destination, attempts);
";

/// Result of an append, including any capacity eviction it triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendReceipt {
    /// Id assigned to the appended record
    pub record_id: RecordId,

    /// Id of the globally oldest record removed to stay within capacity
    pub evicted: Option<RecordId>,
}

/// Size accounting for the health/stats surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// All retained records, exhausted ones included
    pub total: u64,

    /// Records at the attempts cap, excluded from redelivery
    pub exhausted: u64,
}

/// Persisted, capacity-bounded queue of pending records
///
/// The capacity bound evicts the single oldest record by `created_at`
/// across all destinations, regardless of its attempts count.
pub struct OfflineQueue {
    conn: Mutex<Connection>,
    max_records: usize,
    max_retries: u32,
}

impl OfflineQueue {
    /// Open or create the queue database at the given path
    #[instrument(name = "offline_queue_open", skip(path), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, max_records: usize, max_retries: u32) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(queue_err)?;
        Self::with_connection(conn, max_records, max_retries)
    }

    /// In-memory queue, for tests
    pub fn open_in_memory(max_records: usize, max_retries: u32) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(queue_err)?;
        Self::with_connection(conn, max_records, max_retries)
    }

    fn with_connection(conn: Connection, max_records: usize, max_retries: u32) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(queue_err)?;
        debug!(max_records, max_retries, "offline queue ready");
        Ok(Self {
            conn: Mutex::new(conn),
            max_records,
            max_retries,
        })
    }

    /// Append a payload for later redelivery
    ///
    /// If the post-append total exceeds the capacity bound, the globally
    /// oldest record is evicted inside the same transaction; the append
    /// itself always succeeds.
    #[instrument(name = "offline_queue_append", skip(self, payload), fields(destination = %destination))]
    pub fn append(
        &self,
        destination: Destination,
        payload: &RecordPayload,
    ) -> Result<AppendReceipt> {
        let body = serde_json::to_string(payload)
            .map_err(|e| RelayError::queue(format!("payload serialization failed: {e}")))?;
        let created_at = format_timestamp(Utc::now());

        let mut conn = self.lock();
        let tx = conn.transaction().map_err(queue_err)?;

        tx.execute(
            "INSERT INTO offline_queue (destination, payload, created_at)
             VALUES (?1, ?2, ?3)",
            params![destination.as_str(), body, created_at],
        )
        .map_err(queue_err)?;
        let record_id = tx.last_insert_rowid();

        let total: i64 = tx
            .query_row("SELECT COUNT(*) FROM offline_queue", [], |row| row.get(0))
            .map_err(queue_err)?;

        let mut evicted = None;
        if total as usize > self.max_records {
            let oldest: RecordId = tx
                .query_row(
                    "SELECT id FROM offline_queue ORDER BY created_at ASC, id ASC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .map_err(queue_err)?;
            tx.execute("DELETE FROM offline_queue WHERE id = ?1", params![oldest])
                .map_err(queue_err)?;
            evicted = Some(oldest);
        }

        tx.commit().map_err(queue_err)?;
        drop(conn);

        if let Some(evicted_id) = evicted {
            warn!(
                evicted_id,
                max_records = self.max_records,
                "queue capacity exceeded, oldest record evicted"
            );
            metrics::counter!("relay_queue_evictions_total").increment(1);
        }
        metrics::gauge!("relay_queue_depth").set(total.min(self.max_records as i64) as f64);

        Ok(AppendReceipt { record_id, evicted })
    }

    /// Oldest-first records for one destination with retry budget left
    #[instrument(name = "offline_queue_pending", skip(self), fields(destination = %destination, limit))]
    pub fn pending(&self, destination: Destination, limit: usize) -> Result<Vec<QueuedRecord>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, destination, payload, created_at, attempts, last_attempt
                 FROM offline_queue
                 WHERE destination = ?1 AND attempts < ?2
                 ORDER BY created_at ASC, id ASC
                 LIMIT ?3",
            )
            .map_err(queue_err)?;

        let rows = stmt
            .query_map(
                params![destination.as_str(), self.max_retries, limit as i64],
                |row| {
                    Ok(RawRow {
                        id: row.get(0)?,
                        destination: row.get(1)?,
                        payload: row.get(2)?,
                        created_at: row.get(3)?,
                        attempts: row.get(4)?,
                        last_attempt: row.get(5)?,
                    })
                },
            )
            .map_err(queue_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(queue_err)?;

        rows.into_iter().map(RawRow::into_record).collect()
    }

    /// Delete a record after successful delivery
    pub fn complete(&self, record_id: RecordId) -> Result<()> {
        let conn = self.lock();
        let changed = conn
            .execute("DELETE FROM offline_queue WHERE id = ?1", params![record_id])
            .map_err(queue_err)?;
        if changed == 0 {
            return Err(RelayError::RecordNotFound { record_id });
        }
        debug!(record_id, "queued record completed");
        Ok(())
    }

    /// Account a failed delivery attempt; returns the new attempts count
    ///
    /// The record is retained even at the cap, but stops appearing in
    /// [`Self::pending`].
    pub fn fail(&self, record_id: RecordId) -> Result<u32> {
        let conn = self.lock();
        let changed = conn
            .execute(
                "UPDATE offline_queue
                 SET attempts = attempts + 1, last_attempt = ?2
                 WHERE id = ?1",
                params![record_id, format_timestamp(Utc::now())],
            )
            .map_err(queue_err)?;
        if changed == 0 {
            return Err(RelayError::RecordNotFound { record_id });
        }

        let attempts: u32 = conn
            .query_row(
                "SELECT attempts FROM offline_queue WHERE id = ?1",
                params![record_id],
                |row| row.get(0),
            )
            .map_err(queue_err)?;

        if attempts >= self.max_retries {
            warn!(
                record_id,
                attempts, "record exhausted its retry budget, retained for manual review"
            );
        }
        Ok(attempts)
    }

    /// Total retained records, exhausted ones included
    pub fn len(&self) -> Result<u64> {
        let conn = self.lock();
        conn.query_row("SELECT COUNT(*) FROM offline_queue", [], |row| row.get(0))
            .map_err(queue_err)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Records for a destination still eligible for redelivery
    pub fn pending_count(&self, destination: Destination) -> Result<u64> {
        let conn = self.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM offline_queue WHERE destination = ?1 AND attempts < ?2",
            params![destination.as_str(), self.max_retries],
            |row| row.get(0),
        )
        .map_err(queue_err)
    }

    /// Size accounting for the health/stats surface
    pub fn stats(&self) -> Result<QueueStats> {
        let conn = self.lock();
        conn.query_row(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE attempts >= ?1)
             FROM offline_queue",
            params![self.max_retries],
            |row| {
                Ok(QueueStats {
                    total: row.get(0)?,
                    exhausted: row.get(1)?,
                })
            },
        )
        .map_err(queue_err)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct RawRow {
    id: RecordId,
    destination: String,
    payload: String,
    created_at: String,
    attempts: u32,
    last_attempt: Option<String>,
}

impl RawRow {
    fn into_record(self) -> Result<QueuedRecord> {
        let destination = Destination::parse(&self.destination)
            .ok_or_else(|| RelayError::queue(format!("unknown destination '{}'", self.destination)))?;
        let payload: RecordPayload = serde_json::from_str(&self.payload)
            .map_err(|e| RelayError::queue(format!("payload deserialization failed: {e}")))?;
        Ok(QueuedRecord {
            id: self.id,
            destination,
            payload,
            created_at: parse_timestamp(&self.created_at)?,
            attempts: self.attempts,
            last_attempt: self
                .last_attempt
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
        })
    }
}

// RFC 3339 with fixed precision so lexicographic order matches time order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RelayError::queue(format!("bad timestamp '{s}': {e}")))
}

fn queue_err(e: rusqlite::Error) -> RelayError {
    RelayError::Queue {
        message: e.to_string(),
        source: Some(Box::new(e)),
    }
}
