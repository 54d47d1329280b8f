//! # Key Directory
//!
//! Cache of the counterparty's published signing keys, indexed by `kid`.
//!
//! The directory is an ordinary value: create one at start-up, share it
//! (typically in an `Arc`) with everything that verifies envelopes, and drop it
//! at shutdown. A lookup that misses the cache fetches the whole published key
//! set and retries once. At most one fetch is in flight at any time; callers
//! that miss while a fetch is running wait for it and reuse its result.
//!
//! Keys rotate. New keys are picked up automatically on the first miss.
//! Retired keys stay cached until [`KeyDirectory::invalidate`] or
//! [`KeyDirectory::refresh_all`] is called, or until the cache is older than
//! the age set with [`KeyDirectory::with_max_age`]. A lookup against an aged
//! cache refetches and replaces it, so keys no longer published are dropped.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::jose::jwk::{self, Jwks, KeyMaterial};

/// Well-known location of the App Store's published key set.
pub const APPLE_JWKS_URL: &str = "https://appleid.apple.com/auth/keys";

/// `KeySource` retrieves the complete published key set.
pub trait KeySource: Send + Sync {
    /// Fetch every currently published key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key set cannot be retrieved or parsed.
    fn fetch(&self) -> impl Future<Output = anyhow::Result<Jwks>> + Send;
}

/// `KeyResolver` maps a key identifier to verification key material.
pub trait KeyResolver: Send + Sync {
    /// Resolve `kid` to a public key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyFetchFailed`], [`Error::KeyNotFound`] or
    /// [`Error::InvalidKeyEncoding`].
    fn resolve(&self, kid: &str) -> impl Future<Output = Result<Arc<KeyMaterial>>> + Send;
}

impl<T: KeyResolver> KeyResolver for Arc<T> {
    fn resolve(&self, kid: &str) -> impl Future<Output = Result<Arc<KeyMaterial>>> + Send {
        (**self).resolve(kid)
    }
}

/// Fetches the key set over HTTPS.
#[derive(Clone, Debug)]
pub struct HttpKeySource {
    client: reqwest::Client,
    url: String,
}

impl Default for HttpKeySource {
    fn default() -> Self {
        Self::new(APPLE_JWKS_URL)
    }
}

impl HttpKeySource {
    /// Fetch from `url` with a default HTTP client.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    /// Fetch from `url` with a caller-configured HTTP client (timeouts,
    /// proxies, etc.).
    #[must_use]
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

impl KeySource for HttpKeySource {
    async fn fetch(&self) -> anyhow::Result<Jwks> {
        tracing::debug!("key_directory::fetch {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| anyhow!("issue requesting {}: {e}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{} returned {status}", self.url);
        }

        response.json::<Jwks>().await.map_err(|e| anyhow!("issue deserializing key set: {e}"))
    }
}

#[derive(Clone, Debug)]
enum Entry {
    Ready(Arc<KeyMaterial>),
    Rejected(String),
}

#[derive(Debug, Default)]
struct Cache {
    entries: HashMap<String, Entry>,
    fetched_at: Option<Instant>,
}

/// Process-lifetime cache of published verification keys.
#[derive(Debug)]
pub struct KeyDirectory<S = HttpKeySource> {
    source: S,
    max_age: Option<Duration>,
    cache: RwLock<Cache>,

    // serialises fetches; never held while reading `cache`
    fetch_lock: Mutex<()>,

    // incremented after every successful fetch
    generation: AtomicU64,
}

impl Default for KeyDirectory<HttpKeySource> {
    fn default() -> Self {
        Self::new(HttpKeySource::default())
    }
}

impl<S: KeySource> KeyDirectory<S> {
    /// Create an empty directory backed by `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            max_age: None,
            cache: RwLock::new(Cache::default()),
            fetch_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Treat the whole cache as stale once the last fetch is older than
    /// `max_age`. A lookup against a stale cache fetches before answering.
    #[must_use]
    pub const fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Return the key for `kid`, fetching the published key set on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyFetchFailed`] if the fetch fails,
    /// [`Error::KeyNotFound`] if `kid` is not published, or
    /// [`Error::InvalidKeyEncoding`] if its published material is unusable.
    #[instrument(level = "debug", skip(self))]
    pub async fn get(&self, kid: &str) -> Result<Arc<KeyMaterial>> {
        tracing::debug!("key_directory::get");

        // a fetch completing after this point satisfies the miss
        let seen = self.generation.load(Ordering::Acquire);
        if let Some(found) = self.lookup(kid, true) {
            return found;
        }

        let _guard = self.fetch_lock.lock().await;
        if self.generation.load(Ordering::Acquire) == seen {
            // an aged cache is replaced wholesale, a plain miss is merged
            let stale = self.is_stale(&self.read());
            self.fetch(stale).await?;
        }

        self.lookup(kid, false).unwrap_or_else(|| Err(Error::KeyNotFound { kid: kid.to_string() }))
    }

    /// Fetch the full key set now and replace the cache with it. Keys no
    /// longer published are dropped. On failure the cache is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyFetchFailed`] if the fetch fails.
    #[instrument(level = "debug", skip(self))]
    pub async fn refresh_all(&self) -> Result<()> {
        tracing::debug!("key_directory::refresh_all");

        let _guard = self.fetch_lock.lock().await;
        self.fetch(true).await
    }

    /// Drop the cached entry for `kid`. The next lookup for it fetches.
    /// Returns `true` if an entry was removed.
    pub fn invalidate(&self, kid: &str) -> bool {
        tracing::debug!(kid, "key_directory::invalidate");
        self.write().entries.remove(kid).is_some()
    }

    /// Seed the cache with a key, e.g. a pinned key or one obtained out of
    /// band. A later fetch replaces it if the same `kid` is published.
    pub fn insert(&self, kid: impl Into<String>, key: KeyMaterial) {
        self.write().entries.insert(kid.into(), Entry::Ready(Arc::new(key)));
    }

    /// Returns `true` if a usable key for `kid` is cached.
    pub fn contains(&self, kid: &str) -> bool {
        matches!(self.read().entries.get(kid), Some(Entry::Ready(_)))
    }

    // Cache lookup. Returns `None` on a miss, or when `fresh_only` is set and
    // the cache has aged out.
    fn lookup(&self, kid: &str, fresh_only: bool) -> Option<Result<Arc<KeyMaterial>>> {
        let cache = self.read();
        if fresh_only && self.is_stale(&cache) {
            return None;
        }

        match cache.entries.get(kid)? {
            Entry::Ready(key) => Some(Ok(Arc::clone(key))),
            Entry::Rejected(reason) => Some(Err(Error::InvalidKeyEncoding {
                kid: kid.to_string(),
                reason: reason.clone(),
            })),
        }
    }

    fn is_stale(&self, cache: &Cache) -> bool {
        match (self.max_age, cache.fetched_at) {
            (Some(max_age), Some(fetched_at)) => fetched_at.elapsed() >= max_age,
            _ => false,
        }
    }

    // Fetch the key set and merge it into (or, when `replace` is set,
    // substitute it for) the cache. Callers must hold `fetch_lock`.
    async fn fetch(&self, replace: bool) -> Result<()> {
        let jwks = self.source.fetch().await.map_err(|source| Error::KeyFetchFailed { source })?;

        let mut fetched = HashMap::with_capacity(jwks.keys.len());
        for published in &jwks.keys {
            if published.kid.is_empty() {
                tracing::warn!("skipping published key without 'kid'");
                continue;
            }
            let entry = match jwk::reconstruct(published) {
                Ok(key) => Entry::Ready(Arc::new(key)),
                Err(e) => {
                    tracing::warn!(kid = %published.kid, "rejecting published key: {e}");
                    let reason = match e {
                        Error::InvalidKeyEncoding { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    Entry::Rejected(reason)
                }
            };
            fetched.insert(published.kid.clone(), entry);
        }

        let count = fetched.len();
        {
            let mut cache = self.write();
            if replace {
                cache.entries = fetched;
            } else {
                cache.entries.extend(fetched);
            }
            cache.fetched_at = Some(Instant::now());
        }
        self.generation.fetch_add(1, Ordering::AcqRel);

        tracing::info!(keys = count, "fetched published key set");
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, Cache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Cache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: KeySource> KeyResolver for KeyDirectory<S> {
    fn resolve(&self, kid: &str) -> impl Future<Output = Result<Arc<KeyMaterial>>> + Send {
        self.get(kid)
    }
}
