//! Structured audit event sink
//!
//! Sessions and the ban tracker report everything through an [`AuditSink`]
//! handle. Emitting never blocks the caller: records go over a bounded
//! channel and a background writer task persists them. If the channel is
//! full or the writer is gone, the record is dropped and logged locally -
//! audit failures must never take a session down with them.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::net::IpAddr;
use tokio::sync::mpsc;

/// Default capacity of the audit channel.
const AUDIT_QUEUE_DEPTH: usize = 1024;

/// What happened, as recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    ConnectionOpened,
    LoginSuccess,
    LoginFailed,
    CommandExecuted,
    SuspiciousCommand,
    IpBanned,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::ConnectionOpened => "connection-opened",
            AuditEvent::LoginSuccess => "login-success",
            AuditEvent::LoginFailed => "login-failed",
            AuditEvent::CommandExecuted => "command-executed",
            AuditEvent::SuspiciousCommand => "suspicious-command",
            AuditEvent::IpBanned => "ip-banned",
        }
    }
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit trail entry.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub identity: IpAddr,
    pub event: AuditEvent,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

/// Cheap clonable handle for emitting audit records.
#[derive(Debug, Clone)]
pub struct AuditSink {
    tx: mpsc::Sender<AuditRecord>,
}

impl AuditSink {
    /// Create a sink plus the receiving end of its channel.
    ///
    /// Used by tests and by callers that want to drain records themselves.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AuditRecord>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Create a sink backed by a background writer task.
    ///
    /// Every record is logged via `tracing`; when a database pool is given,
    /// it is also inserted into the `logs` table. Insert errors are logged
    /// and otherwise ignored.
    pub fn spawn_writer(pool: Option<SqlitePool>) -> Self {
        let (sink, mut rx) = Self::channel(AUDIT_QUEUE_DEPTH);

        tokio::spawn(async move {
            while let Some(rec) = rx.recv().await {
                tracing::info!(
                    "[audit] [{}] ip={} detail={:?}",
                    rec.event,
                    rec.identity,
                    rec.detail
                );
                if let Some(pool) = &pool {
                    let result = sqlx::query(
                        "INSERT INTO logs (timestamp, ip, event, detail) VALUES (?, ?, ?, ?)",
                    )
                    .bind(rec.timestamp.to_rfc3339())
                    .bind(rec.identity.to_string())
                    .bind(rec.event.as_str())
                    .bind(&rec.detail)
                    .execute(pool)
                    .await;

                    if let Err(e) = result {
                        tracing::warn!("[audit] [db_insert_failed] err={}", e);
                    }
                }
            }
        });

        sink
    }

    /// Emit one audit record. Never blocks; a full queue drops the record.
    pub fn emit(&self, identity: IpAddr, event: AuditEvent, detail: impl Into<String>) {
        let rec = AuditRecord {
            identity,
            event,
            detail: detail.into(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.tx.try_send(rec) {
            tracing::debug!("[audit] [dropped] event={} err={}", event, e);
        }
    }
}

/// Create the audit table if it does not exist yet.
pub async fn init_database(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            ip TEXT NOT NULL,
            event TEXT NOT NULL,
            detail TEXT
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}
