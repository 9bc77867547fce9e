//! Ingest path: extract → decode → log → store → count

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};
use vms_core::ParameterStore;

use super::counters::Counters;
use crate::decode::{Decoders, ParseMode};
use crate::error::CommResult;
use crate::extract::MessageExtractor;
use crate::session_log::{LogDetail, SessionLogger};

/// What happened to one raw line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Classified and routed; `updates` parameters were written
    Valid { updates: usize },
    /// Counted as a bad message
    Invalid,
    /// Too short to be a message; not counted
    Noise,
}

/// Everything a line touches after it leaves the transport
pub struct Pipeline {
    extractor: MessageExtractor,
    decoders: Decoders,
    store: Arc<dyn ParameterStore>,
    counters: Arc<Counters>,
    parse_mode: ParseMode,
    log_detail: LogDetail,
    logger: Option<SessionLogger>,
}

impl Pipeline {
    pub fn new(decoders: Decoders, store: Arc<dyn ParameterStore>, counters: Arc<Counters>) -> Self {
        Self {
            extractor: MessageExtractor::new(),
            decoders,
            store,
            counters,
            parse_mode: ParseMode::default(),
            log_detail: LogDetail::default(),
            logger: None,
        }
    }

    /// Process one raw line
    ///
    /// Exactly one of the total and bad counters is incremented for every
    /// line that is not noise.
    pub async fn ingest(&mut self, raw: &str) -> IngestOutcome {
        if raw.trim().len() < 2 {
            return IngestOutcome::Noise;
        }

        let message = self.extractor.extract(raw);
        let updates = self.decoders.decode(&message, self.parse_mode);

        if let Some(logger) = self.logger.as_mut() {
            logger.record(&message, &updates).await;
        }

        if !message.is_valid() {
            self.counters.record_bad();
            return IngestOutcome::Invalid;
        }

        for update in &updates {
            update.apply(self.store.as_ref());
        }
        self.counters.record_valid();
        IngestOutcome::Valid {
            updates: updates.len(),
        }
    }

    pub fn parse_mode(&self) -> ParseMode {
        self.parse_mode
    }

    pub fn set_parse_mode(&mut self, mode: ParseMode) {
        if mode != self.parse_mode {
            info!(from = %self.parse_mode, to = %mode, "Parse mode changed");
            self.parse_mode = mode;
        }
    }

    pub fn log_detail(&self) -> LogDetail {
        self.log_detail
    }

    pub fn set_log_detail(&mut self, detail: LogDetail) {
        self.log_detail = detail;
        if let Some(logger) = self.logger.as_mut() {
            logger.set_detail(detail);
        }
    }

    pub fn is_logging(&self) -> bool {
        self.logger.is_some()
    }

    /// Start logging to `path`, replacing any open log
    pub async fn enable_log(&mut self, path: &Path) -> CommResult<()> {
        if let Some(logger) = self.logger.as_ref() {
            if logger.path() == path {
                return Ok(());
            }
        }
        let logger = SessionLogger::open(path, self.log_detail).await?;
        self.disable_log().await;
        self.logger = Some(logger);
        Ok(())
    }

    pub async fn disable_log(&mut self) {
        if let Some(logger) = self.logger.take() {
            debug!(path = %logger.path().display(), "Disabling session log");
            logger.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vms_conv::SpnTable;
    use vms_core::InMemoryParameterStore;

    fn pipeline() -> (Pipeline, Arc<InMemoryParameterStore>, Arc<Counters>) {
        let store = Arc::new(InMemoryParameterStore::new());
        let counters = Arc::new(Counters::new());
        let pipeline = Pipeline::new(
            Decoders::new(Arc::new(SpnTable::standard())),
            store.clone(),
            counters.clone(),
        );
        (pipeline, store, counters)
    }

    #[tokio::test]
    async fn test_valid_line_updates_store() {
        let (mut pipeline, store, counters) = pipeline();
        let outcome = pipeline.ingest("J0CF00400FFFF7D403800FFFF\r").await;

        assert_eq!(outcome, IngestOutcome::Valid { updates: 2 });
        assert_eq!(store.read(190).unwrap().metric, 1800.0);
        assert_eq!(counters.total(), 1);
        assert_eq!(counters.bad(), 0);
    }

    #[tokio::test]
    async fn test_invalid_line_counts_bad() {
        let (mut pipeline, store, counters) = pipeline();
        assert_eq!(pipeline.ingest("J18FEZZ").await, IngestOutcome::Invalid);
        assert_eq!(pipeline.ingest("hello").await, IngestOutcome::Invalid);
        assert_eq!(pipeline.ingest(" ").await, IngestOutcome::Noise);
        assert_eq!(pipeline.ingest("V").await, IngestOutcome::Noise);

        assert!(store.is_empty());
        assert_eq!(counters.total(), 0);
        assert_eq!(counters.bad(), 2);
    }

    #[tokio::test]
    async fn test_ignored_protocol_still_counts_total() {
        let (mut pipeline, store, counters) = pipeline();
        pipeline.set_parse_mode(ParseMode::Ignore1708);

        assert_eq!(
            pipeline.ingest("R80BE201C").await,
            IngestOutcome::Valid { updates: 0 }
        );
        assert!(store.read(190).is_none());
        assert_eq!(counters.total(), 1);

        pipeline.set_parse_mode(ParseMode::ParseAll);
        pipeline.ingest("R80BE201C").await;
        assert_eq!(store.read(190).unwrap().imperial, 1800.0);
    }

    #[tokio::test]
    async fn test_logs_every_line_including_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.vms");
        let (mut pipeline, _store, _counters) = pipeline();

        pipeline.set_log_detail(LogDetail::Full);
        pipeline.enable_log(&path).await.unwrap();
        assert!(pipeline.is_logging());

        pipeline.ingest("R80BE201C").await;
        pipeline.ingest("nonsense").await;
        pipeline.disable_log().await;
        pipeline.ingest("R80BE201C").await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches("End of Message").count(), 2);
        assert!(contents.contains("  190 engine_speed = 1800 / 1800\n"));
        assert!(contents.contains("nonsense\n  parsed: invalid"));
    }

    #[tokio::test]
    async fn test_raw_line_logged_as_received() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.vms");
        let (mut pipeline, store, _counters) = pipeline();

        pipeline.set_log_detail(LogDetail::RawOnly);
        pipeline.enable_log(&path).await.unwrap();
        let outcome = pipeline.ingest(" R80BE201C \r").await;
        pipeline.disable_log().await;

        assert_eq!(outcome, IngestOutcome::Valid { updates: 1 });
        assert_eq!(store.read(190).unwrap().imperial, 1800.0);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(" R80BE201C \r\n\nEnd of Message\n"));
    }
}
