//! Sentence extraction and telemetry snapshot aggregation.
//!
//! Raw bytes from the serial device are split into `\n` terminated lines
//! and classified by a substring tag. No NMEA grammar or checksum is
//! checked: a line is whatever the receiver sent, kept verbatim.
//!
//! A [`TelemetrySnapshot`] belongs to exactly one fired capture. It is
//! opened by the controller when a picture is taken, anchored by the first
//! primary sentence (the fix, `GGA` by default) and closed when every
//! required tag has been seen, when it times out, or when the next capture
//! flushes it.
//!
//! # Usage
//!
//! ```rust
//! use geosnap_core::sentence::{SentenceAggregator, SentenceTags};
//!
//! let tags = SentenceTags::new("GGA", ["GSA"]).unwrap();
//! let mut agg = SentenceAggregator::new(tags, 1500);
//!
//! let sentences = agg.feed(b"$GPGGA,1\n$GPGSA,2\n");
//! agg.open(1, 0);
//! let mut closed = None;
//! for s in sentences {
//!     closed = closed.or(agg.accept(s, 0));
//! }
//! assert_eq!(closed.unwrap().text(), "$GPGGA,1\n$GPGSA,2\n");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// =============================================================================
// Classification
// =============================================================================

/// The recognized tags: one primary and zero or more secondary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceTags {
    primary: String,
    secondary: Vec<String>,
}

impl SentenceTags {
    pub fn new<I, S>(primary: &str, secondary: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let secondary: Vec<String> = secondary.into_iter().map(Into::into).collect();
        if primary.is_empty() || secondary.iter().any(|t| t.is_empty()) {
            return Err(ConfigError::EmptyTag);
        }
        for (i, tag) in secondary.iter().enumerate() {
            if tag == primary || secondary[..i].contains(tag) {
                return Err(ConfigError::DuplicateTag(tag.clone()));
            }
        }
        Ok(SentenceTags {
            primary: primary.to_string(),
            secondary,
        })
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn secondary(&self) -> &[String] {
        &self.secondary
    }

    /// Classify a line by substring. The primary tag wins over secondaries.
    pub fn classify(&self, line: &str) -> SentenceKind {
        if line.contains(self.primary.as_str()) {
            return SentenceKind::Primary;
        }
        match self.secondary.iter().position(|t| line.contains(t.as_str())) {
            Some(slot) => SentenceKind::Secondary(slot),
            None => SentenceKind::Other,
        }
    }
}

impl Default for SentenceTags {
    fn default() -> Self {
        SentenceTags {
            primary: "GGA".to_string(),
            secondary: vec!["GSA".to_string(), "RMC".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentenceKind {
    /// The anchoring fix sentence
    Primary,
    /// Secondary tag, by position in [`SentenceTags::secondary`]
    Secondary(usize),
    /// Recognized by nothing, kept as plain telemetry text
    Other,
}

impl SentenceKind {
    pub fn is_primary(&self) -> bool {
        matches!(self, SentenceKind::Primary)
    }
}

/// One extracted line, including its original line ending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub text: String,
    pub kind: SentenceKind,
}

// =============================================================================
// Telemetry Snapshot
// =============================================================================

/// Why a snapshot was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// Primary and every secondary tag were seen
    Complete,
    /// A second primary sentence started a new fix epoch
    NextEpoch,
    /// Open for longer than the snapshot timeout
    Timeout,
    /// Flushed by the controller (next capture, shutdown)
    Flushed,
}

/// Raw telemetry text accumulated for one picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    picture_index: u32,
    opened_at_ms: u64,
    lines: Vec<String>,
    primary_seen: bool,
    secondary_seen: Vec<bool>,
    close_reason: Option<CloseReason>,
}

impl TelemetrySnapshot {
    fn new(picture_index: u32, secondary_count: usize, opened_at_ms: u64) -> Self {
        TelemetrySnapshot {
            picture_index,
            opened_at_ms,
            lines: Vec::new(),
            primary_seen: false,
            secondary_seen: vec![false; secondary_count],
            close_reason: None,
        }
    }

    pub fn picture_index(&self) -> u32 {
        self.picture_index
    }

    pub fn opened_at_ms(&self) -> u64 {
        self.opened_at_ms
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Check if a primary sentence anchors this snapshot.
    pub fn is_anchored(&self) -> bool {
        self.primary_seen
    }

    pub fn is_complete(&self) -> bool {
        self.primary_seen && self.secondary_seen.iter().all(|seen| *seen)
    }

    /// `None` while the snapshot is still open.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    /// The telemetry file contents: every line verbatim, in arrival order.
    pub fn text(&self) -> String {
        self.lines.concat()
    }

    fn close(mut self, reason: CloseReason) -> Self {
        self.close_reason = Some(reason);
        self
    }
}

// =============================================================================
// Aggregator
// =============================================================================

/// Turns the serial byte stream into sentences and snapshots.
#[derive(Debug)]
pub struct SentenceAggregator {
    tags: SentenceTags,
    /// Bytes after the last newline seen so far
    buffer: Vec<u8>,
    snapshot: Option<TelemetrySnapshot>,
    timeout_ms: u64,
}

impl SentenceAggregator {
    pub fn new(tags: SentenceTags, timeout_ms: u64) -> Self {
        SentenceAggregator {
            tags,
            buffer: Vec::new(),
            snapshot: None,
            timeout_ms,
        }
    }

    pub fn tags(&self) -> &SentenceTags {
        &self.tags
    }

    /// Number of buffered bytes without a terminating newline yet.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// The snapshot in progress, if any.
    pub fn current(&self) -> Option<&TelemetrySnapshot> {
        self.snapshot.as_ref()
    }

    /// Append a chunk and extract every complete line.
    ///
    /// Splitting happens on bytes, so a chunk boundary anywhere (even in
    /// the middle of a multi-byte character) yields the same sentences.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Sentence> {
        self.buffer.extend_from_slice(bytes);

        let mut sentences = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + pos + 1;
            let text = String::from_utf8_lossy(&self.buffer[start..end]).into_owned();
            let kind = self.tags.classify(&text);
            sentences.push(Sentence { text, kind });
            start = end;
        }
        self.buffer.drain(..start);
        sentences
    }

    /// Start the snapshot for a freshly fired capture.
    ///
    /// Returns the previous snapshot if one was still open.
    pub fn open(&mut self, picture_index: u32, current_time_ms: u64) -> Option<TelemetrySnapshot> {
        let previous = self.flush();
        self.snapshot = Some(TelemetrySnapshot::new(
            picture_index,
            self.tags.secondary.len(),
            current_time_ms,
        ));
        previous
    }

    /// Offer one sentence to the snapshot in progress.
    ///
    /// Returns the snapshot when this sentence closed it.
    pub fn accept(&mut self, sentence: Sentence, current_time_ms: u64) -> Option<TelemetrySnapshot> {
        let snapshot = self.snapshot.as_mut()?;

        match sentence.kind {
            SentenceKind::Primary if snapshot.primary_seen => {
                return self.close(CloseReason::NextEpoch);
            }
            SentenceKind::Primary => {
                snapshot.primary_seen = true;
                snapshot.lines.push(sentence.text);
            }
            // Cannot be tied to a fix yet
            SentenceKind::Secondary(_) if !snapshot.primary_seen => {}
            SentenceKind::Secondary(slot) => {
                if let Some(seen) = snapshot.secondary_seen.get_mut(slot) {
                    *seen = true;
                }
                snapshot.lines.push(sentence.text);
            }
            SentenceKind::Other => snapshot.lines.push(sentence.text),
        }

        if snapshot.is_complete() {
            return self.close(CloseReason::Complete);
        }
        self.poll_timeout(current_time_ms)
    }

    /// Close the snapshot if it has been open for too long.
    pub fn poll_timeout(&mut self, current_time_ms: u64) -> Option<TelemetrySnapshot> {
        let expired = self.snapshot.as_ref().is_some_and(|s| {
            current_time_ms.saturating_sub(s.opened_at_ms) >= self.timeout_ms
        });
        if expired {
            self.close(CloseReason::Timeout)
        } else {
            None
        }
    }

    /// Close whatever is open, regardless of completeness.
    pub fn flush(&mut self) -> Option<TelemetrySnapshot> {
        self.close(CloseReason::Flushed)
    }

    /// Drop buffered bytes and any open snapshot.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.snapshot = None;
    }

    fn close(&mut self, reason: CloseReason) -> Option<TelemetrySnapshot> {
        self.snapshot.take().map(|s| s.close(reason))
    }
}

// =============================================================================
// Tests
// =============================================================================
