use std::path::Path;

use chrono::{DateTime, Local};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::app_dirs::AppDirs;
use crate::error::{ResultsError, ResultsResult};
use crate::session::SessionSnapshot;
use crate::span::{Mode, TrialRecord};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS span_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    mode TEXT NOT NULL,
    max_success_length INTEGER NOT NULL,
    max_success_time REAL NOT NULL,
    accuracy REAL NOT NULL,
    history TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS span_attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES span_sessions(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    length INTEGER NOT NULL,
    sequence TEXT NOT NULL,
    input_sequence TEXT NOT NULL,
    time_taken REAL NOT NULL,
    is_correct BOOLEAN NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_span_sessions_email ON span_sessions(email);
CREATE INDEX IF NOT EXISTS idx_span_sessions_date ON span_sessions(date);
CREATE INDEX IF NOT EXISTS idx_span_attempts_session ON span_attempts(session_id);
"#;

/// A snapshot as read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedSession {
    pub id: i64,
    pub snapshot: SessionSnapshot,
}

/// Accepts terminal session snapshots and reads them back.
pub trait ResultStore {
    /// Writes the whole snapshot or nothing; returns the new session id.
    fn save(&mut self, snapshot: &SessionSnapshot) -> ResultsResult<i64>;
    /// Most recent sessions first.
    fn recent(&self, limit: usize) -> ResultsResult<Vec<SavedSession>>;
    fn get(&self, id: i64) -> ResultsResult<SavedSession>;
    /// Highest span ever saved for this email in the given mode.
    fn best_for_email(&self, email: &str, mode: Mode) -> ResultsResult<Option<usize>>;
}

#[derive(Debug)]
pub struct ResultsDb {
    conn: Connection,
}

struct SessionRow {
    id: i64,
    date: String,
    name: String,
    email: String,
    mode: String,
    max_success_length: i64,
    max_success_time: f64,
    accuracy: f64,
    history: String,
}

impl SessionRow {
    const COLUMNS: &'static str =
        "id, date, name, email, mode, max_success_length, max_success_time, accuracy, history";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            date: row.get(1)?,
            name: row.get(2)?,
            email: row.get(3)?,
            mode: row.get(4)?,
            max_success_length: row.get(5)?,
            max_success_time: row.get(6)?,
            accuracy: row.get(7)?,
            history: row.get(8)?,
        })
    }

    fn into_saved(self) -> ResultsResult<SavedSession> {
        let id = self.id;
        let malformed = move |reason: String| ResultsError::Malformed { id, reason };

        let recorded_at = DateTime::parse_from_rfc3339(&self.date)
            .map_err(|e| malformed(format!("bad date '{}': {e}", self.date)))?
            .with_timezone(&Local);
        let mode: Mode = self
            .mode
            .parse()
            .map_err(|e| malformed(format!("{e}")))?;
        let history: Vec<TrialRecord> = serde_json::from_str(&self.history)
            .map_err(|e| malformed(format!("bad history: {e}")))?;

        Ok(SavedSession {
            id,
            snapshot: SessionSnapshot {
                name: self.name,
                email: self.email,
                mode,
                max_success_length: self.max_success_length.max(0) as usize,
                max_success_time: self.max_success_time,
                accuracy: self.accuracy,
                history,
                recorded_at,
            },
        })
    }
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    id: i64,
    date: String,
    name: &'a str,
    email: &'a str,
    mode: String,
    max_success_length: usize,
    max_success_time: f64,
    accuracy: f64,
    attempts: usize,
    correct_attempts: usize,
}

impl ResultsDb {
    /// Opens the database at the default state location.
    pub fn open_default() -> ResultsResult<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| "memspan_stats.db".into());
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> ResultsResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        debug!("opening results database at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> ResultsResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> ResultsResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn count(&self) -> ResultsResult<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM span_sessions", [], |row| row.get(0))?;
        Ok(n.max(0) as usize)
    }

    pub fn attempt_count(&self, session_id: i64) -> ResultsResult<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM span_attempts WHERE session_id = ?1",
            [session_id],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as usize)
    }

    /// Writes every saved session as a CSV row; returns the number of rows.
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> ResultsResult<usize> {
        let sessions = self.recent(usize::MAX)?;
        let mut writer = csv::Writer::from_path(path.as_ref())?;

        for saved in sessions.iter().rev() {
            let s = &saved.snapshot;
            writer.serialize(CsvRow {
                id: saved.id,
                date: s.recorded_at.to_rfc3339(),
                name: &s.name,
                email: &s.email,
                mode: s.mode.to_string(),
                max_success_length: s.max_success_length,
                max_success_time: s.max_success_time,
                accuracy: s.accuracy,
                attempts: s.history.len(),
                correct_attempts: s.history.iter().filter(|r| r.is_correct).count(),
            })?;
        }
        writer.flush()?;

        info!(
            "exported {} sessions to {}",
            sessions.len(),
            path.as_ref().display()
        );
        Ok(sessions.len())
    }
}

impl ResultStore for ResultsDb {
    fn save(&mut self, snapshot: &SessionSnapshot) -> ResultsResult<i64> {
        let history = serde_json::to_string(&snapshot.history)?;
        let tx = self.conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO span_sessions
            (date, name, email, mode, max_success_length, max_success_time, accuracy, history)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                snapshot.recorded_at.to_rfc3339(),
                snapshot.name,
                snapshot.email,
                snapshot.mode.to_string(),
                snapshot.max_success_length as i64,
                snapshot.max_success_time,
                snapshot.accuracy,
                history,
            ],
        )?;
        let session_id = tx.last_insert_rowid();

        for (position, record) in snapshot.history.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO span_attempts
                (session_id, position, length, sequence, input_sequence, time_taken, is_correct)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    session_id,
                    position as i64,
                    record.length as i64,
                    record.sequence,
                    record.input_sequence,
                    record.time_taken,
                    record.is_correct,
                ],
            )?;
        }

        tx.commit()?;
        info!(
            "saved session {} for {} ({} attempts, max length {})",
            session_id,
            snapshot.email,
            snapshot.history.len(),
            snapshot.max_success_length
        );
        Ok(session_id)
    }

    fn recent(&self, limit: usize) -> ResultsResult<Vec<SavedSession>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM span_sessions ORDER BY date DESC, id DESC LIMIT ?1",
            SessionRow::COLUMNS
        ))?;

        let rows = stmt
            .query_map([limit], SessionRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(SessionRow::into_saved).collect()
    }

    fn get(&self, id: i64) -> ResultsResult<SavedSession> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM span_sessions WHERE id = ?1",
                    SessionRow::COLUMNS
                ),
                [id],
                SessionRow::from_row,
            )
            .optional()?;

        row.ok_or(ResultsError::NotFound(id))?.into_saved()
    }

    fn best_for_email(&self, email: &str, mode: Mode) -> ResultsResult<Option<usize>> {
        let best: Option<i64> = self.conn.query_row(
            "SELECT MAX(max_success_length) FROM span_sessions WHERE email = ?1 AND mode = ?2",
            params![email, mode.to_string()],
            |row| row.get(0),
        )?;
        Ok(best.map(|b| b.max(0) as usize))
    }
}
