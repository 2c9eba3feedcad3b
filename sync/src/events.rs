//! User-facing log events and the queue that carries them from the worker to the caller

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::mirror::SyncOutcome;

/// Severity of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// One timestamped line describing a sync outcome or failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    /// Describe the result of one tick.
    pub fn from_outcome(outcome: &Result<SyncOutcome, SyncError>) -> Self {
        match outcome {
            Ok(SyncOutcome::NoChange { files }) => {
                Self::info(format!("Sync check complete, {} files already match", files))
            }
            Ok(SyncOutcome::Mirrored { files_copied, missing, extra }) => Self::info(format!(
                "Differences detected ({} missing, {} extra), destination replaced with {} files",
                missing, extra, files_copied
            )),
            Err(e) => Self::error(format!("Sync failed: {}", e)),
        }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<5} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// FIFO shared between the worker (producer) and the caller (consumer).
/// Cloning yields another handle to the same queue.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    inner: Arc<Mutex<VecDeque<LogEvent>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: LogEvent) {
        self.inner.lock().push_back(event);
    }

    /// Remove and return everything queued, oldest first.
    pub fn drain(&self) -> Vec<LogEvent> {
        self.inner.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
