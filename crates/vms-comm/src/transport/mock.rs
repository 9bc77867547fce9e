//! Mock line source for testing
//!
//! A [`MockHandle`] scripts the source from the test side: inject lines,
//! force open failures, and inspect what the controller sent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{SourceFactory, TransportError, TransportKind, TransportSource};
use crate::config::CommConfig;

struct MockShared {
    kind: TransportKind,
    lines_tx: mpsc::UnboundedSender<String>,
    lines_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    sent: Mutex<Vec<Vec<u8>>>,
    on_close: Mutex<Vec<String>>,
    fail_open: AtomicBool,
    open: AtomicBool,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

/// Test-side control of a mock source
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<MockShared>,
}

impl MockHandle {
    /// Handle for a source reporting [`TransportKind::Mock`]
    pub fn new() -> Self {
        Self::with_kind(TransportKind::Mock)
    }

    /// Handle for a source that reports `kind`, so a test can stand in for a
    /// live serial or network link
    pub fn with_kind(kind: TransportKind) -> Self {
        let (lines_tx, lines_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(MockShared {
                kind,
                lines_tx,
                lines_rx: tokio::sync::Mutex::new(lines_rx),
                sent: Mutex::new(Vec::new()),
                on_close: Mutex::new(Vec::new()),
                fail_open: AtomicBool::new(false),
                open: AtomicBool::new(false),
                opens: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
            }),
        }
    }

    /// A source backed by this handle
    pub fn source(&self) -> MockSource {
        MockSource {
            shared: Arc::clone(&self.shared),
            open: false,
        }
    }

    /// Queue a line for the source to produce
    pub fn push_line(&self, line: impl Into<String>) {
        let _ = self.shared.lines_tx.send(line.into());
    }

    /// Queue a line at the moment the source is closed
    pub fn push_on_close(&self, line: impl Into<String>) {
        self.shared.on_close.lock().push(line.into());
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.shared.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Everything written through `send`
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.shared.sent.lock().clone()
    }

    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }
}

impl Default for MockHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Source driven by a [`MockHandle`]
pub struct MockSource {
    shared: Arc<MockShared>,
    open: bool,
}

#[async_trait]
impl TransportSource for MockSource {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.shared.fail_open.load(Ordering::SeqCst) {
            return Err(TransportError::OpenFailed("mock open failure".to_string()));
        }
        self.open = true;
        self.shared.open.store(true, Ordering::SeqCst);
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next_line(&mut self) -> Result<Option<String>, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        let mut rx = self.shared.lines_rx.lock().await;
        match rx.recv().await {
            Some(line) => Ok(Some(line)),
            None => Err(TransportError::ConnectionClosed),
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        self.shared.sent.lock().push(data.to_vec());
        Ok(())
    }

    async fn close(&mut self) {
        if !self.open {
            return;
        }
        for line in self.shared.on_close.lock().drain(..) {
            let _ = self.shared.lines_tx.send(line);
        }
        self.open = false;
        self.shared.open.store(false, Ordering::SeqCst);
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn kind(&self) -> TransportKind {
        self.shared.kind
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn describe(&self) -> String {
        format!("mock ({})", self.shared.kind)
    }
}

/// Factory handing out mock sources per transport kind
#[derive(Clone, Default)]
pub struct MockSourceFactory {
    handles: HashMap<TransportKind, MockHandle>,
}

impl MockSourceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live-looking mock for `kind` and return its handle
    pub fn handle(&mut self, kind: TransportKind) -> MockHandle {
        self.handles
            .entry(kind)
            .or_insert_with(|| MockHandle::with_kind(kind))
            .clone()
    }
}

impl SourceFactory for MockSourceFactory {
    fn create(
        &self,
        kind: TransportKind,
        _config: &CommConfig,
    ) -> Result<Box<dyn TransportSource>, TransportError> {
        self.handles
            .get(&kind)
            .map(|handle| Box::new(handle.source()) as Box<dyn TransportSource>)
            .ok_or_else(|| TransportError::Unsupported(format!("no mock registered for {}", kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_lines() {
        let handle = MockHandle::new();
        let mut source = handle.source();
        assert_eq!(source.next_line().await, Err(TransportError::NotOpen));

        source.open().await.unwrap();
        handle.push_line("R80BE00");
        assert_eq!(source.next_line().await.unwrap().as_deref(), Some("R80BE00"));

        source.send(b"V").await.unwrap();
        assert_eq!(handle.sent(), vec![b"V".to_vec()]);
    }

    #[tokio::test]
    async fn test_fail_open() {
        let handle = MockHandle::new();
        handle.set_fail_open(true);
        let mut source = handle.source();
        assert!(source.open().await.is_err());
        assert!(!handle.is_open());
        assert_eq!(handle.open_count(), 0);
    }

    #[tokio::test]
    async fn test_close_releases_queued_line() {
        let handle = MockHandle::with_kind(TransportKind::Serial);
        handle.push_on_close("J18FEF100FF");
        let mut source = handle.source();
        source.open().await.unwrap();
        source.close().await;
        source.close().await;

        assert_eq!(handle.close_count(), 1);
        assert!(source.is_live());
        assert_eq!(source.next_line().await, Err(TransportError::NotOpen));
    }
}
