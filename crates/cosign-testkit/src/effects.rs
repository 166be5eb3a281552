//! In-memory feed and presentation fakes

use async_trait::async_trait;
use cosign_core::effects::{FeedEffects, PresentationEffects};
use cosign_core::{CosignError, FeedQuery, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Feed serving a replaceable list of entries
#[derive(Debug, Clone, Default)]
pub struct MemoryFeed {
    entries: Arc<Mutex<Vec<FeedQuery>>>,
    fetches: Arc<AtomicUsize>,
    failing: Arc<Mutex<Option<String>>>,
}

impl MemoryFeed {
    /// Feed serving `entries`
    pub fn new(entries: Vec<FeedQuery>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries)),
            ..Self::default()
        }
    }

    /// Replace the served entries
    pub fn set(&self, entries: Vec<FeedQuery>) {
        *self.entries.lock() = entries;
    }

    /// Append one entry
    pub fn push(&self, entry: FeedQuery) {
        self.entries.lock().push(entry);
    }

    /// Make every following fetch fail with `message`
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failing.lock() = Some(message.into());
    }

    /// Number of fetches served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedEffects for MemoryFeed {
    async fn fetch_queries(&self) -> Result<Vec<FeedQuery>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failing.lock().clone() {
            return Err(CosignError::feed(message));
        }
        Ok(self.entries.lock().clone())
    }
}

/// Presentation sink that records every frame
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    frames: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames delivered so far
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    /// Whether nothing was delivered
    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }
}

#[async_trait]
impl PresentationEffects for MemorySink {
    async fn deliver(&self, frame: String) -> Result<()> {
        self.frames.lock().push(frame);
        Ok(())
    }
}
