//! Byte stream → line splitting shared by the serial and network sources

use std::collections::VecDeque;

use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};

/// What to do with bytes after the last line terminator of a read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialLinePolicy {
    /// Keep the fragment and prepend it to the next read
    #[default]
    Carry,
    /// Drop the fragment
    Discard,
}

/// Accumulates received bytes and yields complete lines in arrival order
#[derive(Debug)]
pub struct LineBuffer {
    pending: BytesMut,
    lines: VecDeque<String>,
    policy: PartialLinePolicy,
    /// Set after an oversized fragment is dropped; input is ignored up to
    /// the next terminator
    skipping: bool,
}

impl LineBuffer {
    /// Lines (and carried fragments) longer than this are dropped
    pub const MAX_LINE_LEN: usize = 512;

    /// Shorter lines are noise, not messages
    pub const MIN_LINE_LEN: usize = 2;

    pub fn new(policy: PartialLinePolicy) -> Self {
        Self {
            pending: BytesMut::with_capacity(Self::MAX_LINE_LEN),
            lines: VecDeque::new(),
            policy,
            skipping: false,
        }
    }

    /// Append the bytes of one read and split out every complete line
    pub fn push(&mut self, bytes: &[u8]) {
        let bytes = if self.skipping {
            match bytes.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.skipping = false;
                    &bytes[pos + 1..]
                }
                None => return,
            }
        } else {
            bytes
        };
        self.pending.extend_from_slice(bytes);

        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line = self.pending.split_to(pos);
            self.pending.advance(1);
            self.accept(&line);
        }

        if self.pending.is_empty() {
            return;
        }
        match self.policy {
            PartialLinePolicy::Discard => {
                tracing::debug!(bytes = self.pending.len(), "Discarding partial line");
                self.pending.clear();
            }
            PartialLinePolicy::Carry if self.pending.len() > Self::MAX_LINE_LEN => {
                tracing::warn!(
                    bytes = self.pending.len(),
                    "Partial line exceeds maximum length, dropping"
                );
                self.pending.clear();
                self.skipping = true;
            }
            PartialLinePolicy::Carry => {}
        }
    }

    /// Next complete line, oldest first
    pub fn pop_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }

    /// Bytes held back waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.lines.clear();
        self.skipping = false;
    }

    fn accept(&mut self, line: &[u8]) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.len() < Self::MIN_LINE_LEN {
            return;
        }
        if line.len() > Self::MAX_LINE_LEN {
            tracing::warn!(bytes = line.len(), "Line exceeds maximum length, dropping");
            return;
        }
        self.lines
            .push_back(String::from_utf8_lossy(line).into_owned());
    }
}
