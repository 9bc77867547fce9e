//! Log replay source
//!
//! Re-feeds a recorded session file as if it were live traffic: one message
//! line per tick, rewinding to the first record at end of file, forever.
//! Only lines that start with a protocol marker are replayed, so the
//! continuation lines and `End of Message` trailers of a session log are
//! skipped.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Interval, MissedTickBehavior};

use super::{TransportError, TransportKind, TransportSource};
use crate::config::ReplayConfig;
use crate::extract::is_message_line;

pub struct LogReplaySource {
    path: PathBuf,
    period: Duration,
    records: Vec<String>,
    cursor: usize,
    ticker: Option<Interval>,
}

impl LogReplaySource {
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            path: config.path.clone(),
            period: config.interval(),
            records: Vec::new(),
            cursor: 0,
            ticker: None,
        }
    }

    /// Number of replayable records in the opened file
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    fn advance(&mut self) -> Option<String> {
        if self.records.is_empty() {
            return None;
        }
        if self.cursor >= self.records.len() {
            tracing::debug!(path = %self.path.display(), "Replay reached end of file, rewinding");
            self.cursor = 0;
        }
        let line = self.records[self.cursor].clone();
        self.cursor += 1;
        Some(line)
    }
}

#[async_trait]
impl TransportSource for LogReplaySource {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.ticker.is_some() {
            return Ok(());
        }

        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to open replay file");
            TransportError::OpenFailed(format!("{}: {}", self.path.display(), e))
        })?;

        self.records = String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::trim_end)
            .filter(|line| is_message_line(line))
            .map(str::to_string)
            .collect();
        self.cursor = 0;

        if self.records.is_empty() {
            tracing::warn!(path = %self.path.display(), "Replay file contains no message lines");
        }

        let mut ticker = tokio::time::interval(self.period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);

        tracing::info!(
            path = %self.path.display(),
            records = self.records.len(),
            interval_ms = self.period.as_millis() as u64,
            "Log replay opened"
        );
        Ok(())
    }

    async fn next_line(&mut self) -> Result<Option<String>, TransportError> {
        let ticker = self.ticker.as_mut().ok_or(TransportError::NotOpen)?;
        ticker.tick().await;
        Ok(self.advance())
    }

    async fn send(&mut self, _data: &[u8]) -> Result<(), TransportError> {
        if self.ticker.is_none() {
            return Err(TransportError::NotOpen);
        }
        // nothing listens on the other end of a recording
        Ok(())
    }

    async fn close(&mut self) {
        if self.ticker.take().is_some() {
            tracing::info!(path = %self.path.display(), "Log replay closed");
        }
        self.records.clear();
        self.cursor = 0;
    }

    fn kind(&self) -> TransportKind {
        TransportKind::LogReplay
    }

    fn is_open(&self) -> bool {
        self.ticker.is_some()
    }

    fn describe(&self) -> String {
        format!("replay {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn replay_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn source_for(file: &tempfile::NamedTempFile) -> LogReplaySource {
        LogReplaySource::new(ReplayConfig {
            path: file.path().to_path_buf(),
            interval_ms: 1,
        })
    }

    #[tokio::test]
    async fn test_replay_is_cyclic() {
        let file = replay_file("R80BE01\nR80BE02\nR80BE03\n");
        let mut source = source_for(&file);
        source.open().await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..10 {
            seen.push(source.next_line().await.unwrap().unwrap());
        }
        let suffixes: Vec<_> = seen.iter().map(|l| &l[6..]).collect();
        assert_eq!(
            suffixes,
            vec!["1", "2", "3", "1", "2", "3", "1", "2", "3", "1"]
        );
    }

    #[tokio::test]
    async fn test_skips_noise_and_log_trailers() {
        let file = replay_file(
            "R80BE01\r\n  parsed: J1708 mid=128 pid=190 data=[01]\n\nEnd of Message\n\nX\nJ18FEF100FFFF\n",
        );
        let mut source = source_for(&file);
        source.open().await.unwrap();
        assert_eq!(source.record_count(), 2);

        assert_eq!(source.next_line().await.unwrap().as_deref(), Some("R80BE01"));
        assert_eq!(
            source.next_line().await.unwrap().as_deref(),
            Some("J18FEF100FFFF")
        );
        assert_eq!(source.next_line().await.unwrap().as_deref(), Some("R80BE01"));
    }

    #[tokio::test]
    async fn test_empty_file_yields_nothing() {
        let file = replay_file("\n\nEnd of Message\n");
        let mut source = source_for(&file);
        source.open().await.unwrap();
        assert_eq!(source.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_file_fails_open() {
        let mut source = LogReplaySource::new(ReplayConfig {
            path: PathBuf::from("/nonexistent/vms/replay.vms"),
            interval_ms: 1,
        });
        assert!(matches!(
            source.open().await,
            Err(TransportError::OpenFailed(_))
        ));
        assert_eq!(source.next_line().await, Err(TransportError::NotOpen));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let file = replay_file("R80BE01\n");
        let mut source = source_for(&file);
        source.open().await.unwrap();
        source.close().await;
        source.close().await;
        assert!(!source.is_open());
    }
}
