//! FIFO audit sink
//!
//! Lifecycle operations append structured events fire-and-forget; nothing in
//! the core consumes a response from the sink. An explicit flush drains the
//! queue to an append-only file as one JSON object per line through the
//! [`crate::wal::WalWriter`].

use std::collections::VecDeque;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, UserId};
use crate::wal::WalWriter;
use crate::Result;

/// One audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event was recorded (Unix seconds)
    pub at: Timestamp,

    /// Acting user, if a session existed
    pub actor: Option<UserId>,

    /// Short machine-readable action name, e.g. `cast_vote`
    pub action: String,

    /// Free-form detail
    pub detail: String,
}

/// In-memory FIFO of pending audit events
#[derive(Debug, Default)]
pub struct AuditLog {
    pending: VecDeque<AuditEvent>,
}

impl AuditLog {
    /// Create an empty audit log
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    /// Queue an event; never fails and returns nothing to the caller
    pub fn record(&mut self, actor: Option<UserId>, action: &str, detail: impl Into<String>) {
        self.pending.push_back(AuditEvent {
            at: Utc::now().timestamp(),
            actor,
            action: action.to_string(),
            detail: detail.into(),
        });
    }

    /// Number of events waiting to be flushed
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drain all pending events to an append-only file, oldest first
    ///
    /// Events that fail to serialize are dropped with a warning; an I/O
    /// error stops the flush with the remaining events still queued.
    pub fn flush(&mut self, path: impl AsRef<Path>) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut wal = WalWriter::open(path)?;
        while let Some(event) = self.pending.pop_front() {
            match serde_json::to_string(&event) {
                Ok(line) => {
                    if let Err(err) = wal.append_line(&line) {
                        self.pending.push_front(event);
                        return Err(err);
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, action = %event.action, "dropping unserializable audit event");
                }
            }
        }
        Ok(())
    }
}
