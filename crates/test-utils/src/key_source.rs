//! In-memory [`KeySource`] that counts fetches.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use storekit_jws::{Jwks, KeySource};

/// Serves a fixed key set, or fails when none is published. Clones share
/// state, so a test can keep a handle after moving one into a directory.
#[derive(Clone, Debug, Default)]
pub struct StaticKeySource {
    inner: Arc<Inner>,
    delay: Duration,
}

#[derive(Debug, Default)]
struct Inner {
    keys: Mutex<Option<Jwks>>,
    calls: AtomicUsize,
}

impl StaticKeySource {
    /// Serve `keys`.
    #[must_use]
    pub fn new(keys: Jwks) -> Self {
        let source = Self::default();
        source.publish(Some(keys));
        source
    }

    /// Fail every fetch.
    #[must_use]
    pub fn failing() -> Self {
        Self::default()
    }

    /// Wait `delay` before answering each fetch.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Replace the published key set. `None` makes fetches fail.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    pub fn publish(&self, keys: Option<Jwks>) {
        *self.inner.keys.lock().expect("should lock") = keys;
    }

    /// Number of fetches so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

impl KeySource for StaticKeySource {
    async fn fetch(&self) -> anyhow::Result<Jwks> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let keys = self.inner.keys.lock().map_err(|_| anyhow!("poisoned"))?.clone();
        keys.ok_or_else(|| anyhow!("key set unavailable"))
    }
}
