//! Session log
//!
//! Appends one record per ingested line:
//!
//! ```text
//! J0CF00400FFFF7D403800FFFF
//!   parsed: J1939 pgn=61444 (0x0F004) prio=3 sa=0x00 data=[FFFF7D403800FFFF]
//!   513 torque_percent = 0 / 0
//!   190 engine_speed = 1800 / 1800
//!
//! End of Message
//!
//! ```
//!
//! Continuation lines are indented, so a session log can be fed back through
//! the log replay source.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use vms_core::Message;

use crate::decode::ParameterUpdate;
use crate::error::{CommError, CommResult};

/// Record terminator
pub const END_OF_MESSAGE: &str = "End of Message";

/// How much of each message goes into the log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogDetail {
    /// Raw line only
    RawOnly,
    /// Raw line and the classified message
    #[default]
    Summary,
    /// Summary plus every decoded parameter
    Full,
}

/// Format one log record
pub fn format_record(message: &Message, updates: &[ParameterUpdate], detail: LogDetail) -> String {
    let mut record = String::with_capacity(message.raw.len() + 64);
    record.push_str(&message.raw);
    record.push('\n');

    if detail >= LogDetail::Summary {
        record.push_str("  parsed: ");
        record.push_str(&message.to_string());
        record.push('\n');
    }
    if detail == LogDetail::Full {
        for update in updates {
            record.push_str("  ");
            record.push_str(&update.to_string());
            record.push('\n');
        }
    }

    record.push('\n');
    record.push_str(END_OF_MESSAGE);
    record.push_str("\n\n");
    record
}

/// Append-only writer for the session log file
#[derive(Debug)]
pub struct SessionLogger {
    path: PathBuf,
    file: File,
    detail: LogDetail,
    records: u64,
    write_errors: u64,
}

impl SessionLogger {
    /// Open (or create) the log file in append mode
    pub async fn open(path: impl AsRef<Path>, detail: LogDetail) -> CommResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| CommError::SessionLog(format!("{}: {}", path.display(), e)))?;

        tracing::info!(path = %path.display(), detail = ?detail, "Session log opened");
        Ok(Self {
            path,
            file,
            detail,
            records: 0,
            write_errors: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn detail(&self) -> LogDetail {
        self.detail
    }

    pub fn set_detail(&mut self, detail: LogDetail) {
        self.detail = detail;
    }

    /// Records written since open
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Append a record and flush it
    ///
    /// Write failures are logged and counted; ingestion carries on.
    pub async fn record(&mut self, message: &Message, updates: &[ParameterUpdate]) {
        let record = format_record(message, updates, self.detail);
        let result = async {
            self.file.write_all(record.as_bytes()).await?;
            self.file.flush().await
        }
        .await;

        match result {
            Ok(()) => self.records += 1,
            Err(e) => {
                self.write_errors += 1;
                if self.write_errors == 1 || self.write_errors % 100 == 0 {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        failures = self.write_errors,
                        "Failed to write session log"
                    );
                }
            }
        }
    }

    /// Flush and release the file
    pub async fn close(mut self) {
        if let Err(e) = self.file.sync_all().await {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to sync session log");
        }
        tracing::info!(path = %self.path.display(), records = self.records, "Session log closed");
    }
}
