//! Structured event log.
//!
//! Maintenance operations report what they did (song removed, artwork
//! removed, run summary) as structured events: a stable dotted key, a human
//! readable message and positional arguments. Events feed audit/history
//! views and never drive control flow, so recording one cannot fail outward.

use crate::db::Database;
use chrono::{DateTime, Utc};
use rusqlite::params;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEvent {
    pub level: LogLevel,
    pub key: String,
    pub message: String,
    pub args: Vec<String>,
}

impl LogEvent {
    pub fn new(
        level: LogLevel,
        key: &str,
        message: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            level,
            key: key.to_string(),
            message: message.into(),
            args,
        }
    }
}

/// A persisted event row.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub id: i64,
    pub level: LogLevel,
    pub key: String,
    pub message: String,
    pub args: Vec<String>,
    pub created_at: DateTime<Utc>,
}

pub trait EventSink: Send + Sync {
    fn record(&self, event: LogEvent);
}

/// Sink for callers that do not keep history.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn record(&self, _event: LogEvent) {}
}

/// Event sink persisted in the library database.
pub struct SqliteEventLog {
    db: Database,
}

impl SqliteEventLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Most recent events at `level`, newest first.
    pub fn recent(&self, level: LogLevel, limit: usize) -> anyhow::Result<Vec<LogEntry>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, level, key, message, args, created_at FROM log_entries \
             WHERE level = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let entries = stmt
            .query_map(params![level.as_str(), limit], |row| {
                let level_str: String = row.get("level")?;
                let args_json: String = row.get("args")?;
                let created_at_str: String = row.get("created_at")?;
                Ok(LogEntry {
                    id: row.get("id")?,
                    level: LogLevel::parse(&level_str).unwrap_or(LogLevel::Info),
                    key: row.get("key")?,
                    message: row.get("message")?,
                    args: serde_json::from_str(&args_json).unwrap_or_default(),
                    created_at: DateTime::parse_from_rfc3339(&created_at_str)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

impl EventSink for SqliteEventLog {
    fn record(&self, event: LogEvent) {
        let args_json =
            serde_json::to_string(&event.args).unwrap_or_else(|_| "[]".to_string());
        let conn = self.db.lock();
        let result = conn.execute(
            "INSERT INTO log_entries (level, key, message, args, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.level.as_str(),
                event.key,
                event.message,
                args_json,
                Utc::now().to_rfc3339(),
            ],
        );
        if let Err(e) = result {
            warn!("Could not record event {}: {}", event.key, e);
        }
    }
}
