//! Refreshing cache of verification keys.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use jsonwebtoken::DecodingKey;
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{JsonWebKey, KeySetDocument, KeySource};
use crate::encoding::decode_lenient;
use crate::error::AuthError;

/// Minimum delay between background refreshes after a failed one.
pub const FAILED_REFRESH_BACKOFF: Duration = Duration::from_secs(30);

/// An immutable generation of keys.
#[derive(Default)]
struct KeySnapshot {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

impl KeySnapshot {
    fn needs_refresh(&self, max_age: Duration) -> bool {
        match self.fetched_at {
            None => true,
            Some(at) => self.keys.is_empty() || at.elapsed() >= max_age,
        }
    }
}

/// State shared with background refresh tasks.
struct KeyStore {
    source: Arc<dyn KeySource>,
    current: RwLock<Arc<KeySnapshot>>,
    failures: AtomicU64,
    last_failure: Mutex<Option<Instant>>,
}

impl KeyStore {
    fn snapshot(&self) -> Arc<KeySnapshot> {
        Arc::clone(&self.current.read())
    }

    fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    fn in_backoff(&self) -> bool {
        self.last_failure
            .lock()
            .is_some_and(|at| at.elapsed() < FAILED_REFRESH_BACKOFF)
    }

    /// Must be called with the refresh lock held.
    async fn fetch_and_install(&self) -> Result<Arc<KeySnapshot>, AuthError> {
        match self.fetch().await {
            Ok(snapshot) => {
                *self.last_failure.lock() = None;
                Ok(snapshot)
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                *self.last_failure.lock() = Some(Instant::now());
                Err(err)
            }
        }
    }

    async fn fetch(&self) -> Result<Arc<KeySnapshot>, AuthError> {
        let document = self.source.fetch().await?;
        let keys = build_keys(&document);

        if keys.is_empty() {
            return Err(AuthError::KeyFetch(
                "key set contained no usable RSA keys".to_string(),
            ));
        }

        let snapshot = Arc::new(KeySnapshot {
            keys,
            fetched_at: Some(Instant::now()),
        });
        *self.current.write() = Arc::clone(&snapshot);

        info!(keys = snapshot.keys.len(), "Signing key set refreshed");
        Ok(snapshot)
    }
}

/// Verification keys indexed by key id.
///
/// Lookups clone an `Arc` of the current generation under a short read lock.
/// A lookup that finds its key never waits on the key source: an aged key set
/// is refreshed by a background task while cached keys keep being served.
/// Blocking refreshes (cold cache, unknown kid) are serialized, and callers
/// that queued behind one reuse its result, including its failure.
pub struct KeyCache {
    store: Arc<KeyStore>,
    refresh_lock: Arc<tokio::sync::Mutex<()>>,
    max_age: Duration,
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("keys", &self.len())
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl KeyCache {
    /// Creates an empty cache; keys are fetched on first use.
    pub fn new(source: Arc<dyn KeySource>, max_age: Duration) -> Self {
        Self {
            store: Arc::new(KeyStore {
                source,
                current: RwLock::new(Arc::new(KeySnapshot::default())),
                failures: AtomicU64::new(0),
                last_failure: Mutex::new(None),
            }),
            refresh_lock: Arc::new(tokio::sync::Mutex::new(())),
            max_age,
        }
    }

    /// Returns the verification key for `kid`.
    ///
    /// A cached key is returned at once; if the key set is aged a background
    /// refresh is started. An empty cache is filled first. A miss on a warm
    /// cache forces one refresh.
    pub async fn resolve(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        let snapshot = self.store.snapshot();

        if let Some(key) = snapshot.keys.get(kid) {
            if snapshot.needs_refresh(self.max_age) {
                self.spawn_refresh();
            }
            return Ok(key.clone());
        }

        if !snapshot.keys.is_empty() {
            debug!(kid = %kid, "Key id not cached, refreshing key set");
        }

        let fresh = self.refresh_after(&snapshot).await?;
        fresh
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }

    /// Fetches the key set and replaces the cached keys.
    ///
    /// Returns the number of usable keys. On failure the previous keys stay
    /// in place.
    pub async fn refresh(&self) -> Result<usize, AuthError> {
        let _guard = self.refresh_lock.lock().await;
        let snapshot = self.store.fetch_and_install().await?;
        Ok(snapshot.keys.len())
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.store.current.read().keys.len()
    }

    /// Whether no key is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time since the last successful refresh.
    pub fn age(&self) -> Option<Duration> {
        self.store.current.read().fetched_at.map(|at| at.elapsed())
    }

    /// Configured maximum key-set age.
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Starts a background refresh unless one is running or the last one
    /// failed within [`FAILED_REFRESH_BACKOFF`].
    fn spawn_refresh(&self) {
        if self.store.in_backoff() {
            return;
        }
        let Ok(guard) = Arc::clone(&self.refresh_lock).try_lock_owned() else {
            return;
        };

        let store = Arc::clone(&self.store);
        let max_age = self.max_age;
        tokio::spawn(async move {
            let _guard = guard;
            if !store.snapshot().needs_refresh(max_age) {
                return;
            }
            if let Err(err) = store.fetch_and_install().await {
                warn!(error = %err, "Key set refresh failed, serving cached keys");
            }
        });
    }

    /// Refreshes unless another caller replaced `seen`, or failed to, while
    /// we waited.
    async fn refresh_after(&self, seen: &Arc<KeySnapshot>) -> Result<Arc<KeySnapshot>, AuthError> {
        let failures_before = self.store.failure_count();
        let _guard = self.refresh_lock.lock().await;

        let current = self.store.snapshot();
        if !Arc::ptr_eq(&current, seen) {
            return Ok(current);
        }
        if self.store.failure_count() != failures_before {
            return Err(AuthError::KeyFetch(
                "key set refresh failed while waiting".to_string(),
            ));
        }

        self.store.fetch_and_install().await
    }
}

/// Converts the usable entries of `document` into verification keys.
fn build_keys(document: &KeySetDocument) -> HashMap<String, DecodingKey> {
    document
        .keys
        .iter()
        .filter_map(|jwk| match decode_rsa_key(jwk) {
            Some(entry) => Some(entry),
            None => {
                debug!(kid = ?jwk.kid, kty = %jwk.kty, "Skipping unusable key set entry");
                None
            }
        })
        .collect()
}

fn decode_rsa_key(jwk: &JsonWebKey) -> Option<(String, DecodingKey)> {
    if jwk.kty != "RSA" {
        return None;
    }

    let kid = jwk.kid.as_deref().filter(|k| !k.is_empty())?;
    let modulus = decode_lenient(jwk.n.as_deref()?)?;
    let exponent = decode_lenient(jwk.e.as_deref()?)?;

    if modulus.is_empty() || exponent.is_empty() {
        return None;
    }

    Some((
        kid.to_string(),
        DecodingKey::from_rsa_raw_components(&modulus, &exponent),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwks::InMemoryKeySource;

    const JWKS: &str = include_str!("../../tests/fixtures/jwks.json");

    fn cache_with(source: &Arc<InMemoryKeySource>, max_age: Duration) -> KeyCache {
        KeyCache::new(Arc::clone(source) as Arc<dyn KeySource>, max_age)
    }

    fn source() -> Arc<InMemoryKeySource> {
        Arc::new(InMemoryKeySource::from_json(JWKS).unwrap())
    }

    /// Lets spawned refresh tasks run.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    /// Serves the fixture key set until stalled; then hangs for 10s and fails.
    struct StallingSource {
        document: KeySetDocument,
        stalled: std::sync::atomic::AtomicBool,
        fetches: std::sync::atomic::AtomicUsize,
    }

    impl StallingSource {
        fn new() -> Self {
            Self {
                document: serde_json::from_str(JWKS).unwrap(),
                stalled: Default::default(),
                fetches: Default::default(),
            }
        }

        fn stall(&self) {
            self.stalled.store(true, Ordering::SeqCst);
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl KeySource for StallingSource {
        async fn fetch(&self) -> Result<KeySetDocument, AuthError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.stalled.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(10)).await;
                return Err(AuthError::KeyFetch("identity provider timed out".to_string()));
            }
            Ok(self.document.clone())
        }
    }

    #[tokio::test]
    async fn test_empty_cache_refreshes_once() {
        // GIVEN: an empty cache
        let source = source();
        let cache = cache_with(&source, Duration::from_secs(3600));
        assert!(cache.is_empty());

        // WHEN: resolving a published key
        let key = cache.resolve("primary-key").await;

        // THEN: exactly one fetch happened
        assert!(key.is_ok());
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_unusable_entries_are_dropped() {
        let source = source();
        let cache = cache_with(&source, Duration::from_secs(3600));

        let count = cache.refresh().await.unwrap();

        // EC entry and undecodable RSA entry are skipped
        assert_eq!(count, 2);
        assert!(cache.resolve("secondary-key").await.is_ok());
        assert!(matches!(
            cache.resolve("ec-key").await,
            Err(AuthError::KeyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_kid_after_initial_refresh_does_not_refetch() {
        // GIVEN: an empty cache
        let source = source();
        let cache = cache_with(&source, Duration::from_secs(3600));

        // WHEN: the first lookup is for an unknown kid
        let result = cache.resolve("nope").await;

        // THEN: NotFound after the single initial refresh
        assert!(matches!(result, Err(AuthError::KeyNotFound(kid)) if kid == "nope"));
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_miss_on_warm_cache_refreshes_once() {
        let source = source();
        let cache = cache_with(&source, Duration::from_secs(3600));
        cache.refresh().await.unwrap();
        assert_eq!(source.fetch_count(), 1);

        let result = cache.resolve("rotated-key").await;

        assert!(matches!(result, Err(AuthError::KeyNotFound(_))));
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_rotated_key_is_found_after_refresh_on_miss() {
        let source = source();
        let cache = cache_with(&source, Duration::from_secs(3600));
        cache.refresh().await.unwrap();

        let mut document: KeySetDocument = serde_json::from_str(JWKS).unwrap();
        document.keys[0].kid = Some("rotated-key".to_string());
        source.replace(document);

        assert!(cache.resolve("rotated-key").await.is_ok());
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_keys() {
        let source = source();
        let cache = cache_with(&source, Duration::from_secs(3600));
        cache.refresh().await.unwrap();

        source.fail();
        assert!(matches!(cache.refresh().await, Err(AuthError::KeyFetch(_))));

        source.replace(KeySetDocument::default());
        assert!(matches!(cache.refresh().await, Err(AuthError::KeyFetch(_))));

        assert_eq!(cache.len(), 2);
        assert!(cache.resolve("primary-key").await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_cache_with_failing_source_reports_fetch_error() {
        let source = source();
        source.fail();
        let cache = cache_with(&source, Duration::from_secs(3600));

        let result = cache.resolve("primary-key").await;

        assert!(matches!(result, Err(AuthError::KeyFetch(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_aged_keys_are_refreshed_in_background() {
        // GIVEN: a warm cache with a 60s maximum age
        let source = source();
        let cache = cache_with(&source, Duration::from_secs(60));
        cache.refresh().await.unwrap();

        // WHEN: a lookup happens before the key set ages
        tokio::time::advance(Duration::from_secs(30)).await;
        cache.resolve("primary-key").await.unwrap();
        settle().await;

        // THEN: no refresh
        assert_eq!(source.fetch_count(), 1);

        // WHEN: a lookup happens after the key set aged
        tokio::time::advance(Duration::from_secs(31)).await;
        cache.resolve("primary-key").await.unwrap();
        settle().await;

        // THEN: one background refresh renewed the key set
        assert_eq!(source.fetch_count(), 2);
        assert_eq!(cache.age(), Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_aged_keys_keep_serving_when_refresh_fails() {
        let source = source();
        let cache = cache_with(&source, Duration::from_secs(60));
        cache.refresh().await.unwrap();

        source.fail();
        tokio::time::advance(Duration::from_secs(120)).await;

        assert!(cache.resolve("primary-key").await.is_ok());
        settle().await;
        assert_eq!(source.fetch_count(), 2);
        assert!(cache.resolve("primary-key").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_refresh_does_not_delay_cached_lookups() {
        // GIVEN: an aged cache whose provider hangs for 10s and then fails
        let source = Arc::new(StallingSource::new());
        let cache = Arc::new(KeyCache::new(
            Arc::clone(&source) as Arc<dyn KeySource>,
            Duration::from_secs(60),
        ));
        cache.refresh().await.unwrap();
        source.stall();
        tokio::time::advance(Duration::from_secs(61)).await;

        // WHEN: four lookups for a cached key run concurrently
        let started = Instant::now();
        let lookups: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    let ok = cache.resolve("primary-key").await.is_ok();
                    (ok, started.elapsed())
                })
            })
            .collect();

        // THEN: every lookup is served at once from the cached keys
        for lookup in lookups {
            let (ok, waited) = lookup.await.unwrap();
            assert!(ok);
            assert!(waited < Duration::from_secs(1), "lookup waited {waited:?}");
        }

        // AND: a single refresh is in flight
        settle().await;
        assert_eq!(source.fetch_count(), 2);

        // WHEN: the refresh fails, later lookups inside the backoff window
        // do not retry
        tokio::time::advance(Duration::from_secs(11)).await;
        settle().await;
        assert!(cache.resolve("primary-key").await.is_ok());
        settle().await;
        assert_eq!(source.fetch_count(), 2);

        // THEN: after the backoff one more refresh is attempted
        tokio::time::advance(FAILED_REFRESH_BACKOFF).await;
        assert!(cache.resolve("primary-key").await.is_ok());
        settle().await;
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_misses_share_a_failed_refresh() {
        // GIVEN: a warm cache whose provider hangs for 10s and then fails
        let source = Arc::new(StallingSource::new());
        let cache = Arc::new(KeyCache::new(
            Arc::clone(&source) as Arc<dyn KeySource>,
            Duration::from_secs(3600),
        ));
        cache.refresh().await.unwrap();
        source.stall();

        // WHEN: three lookups for an unknown kid queue behind each other
        let started = Instant::now();
        let lookups: Vec<_> = (0..3)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.resolve("rotated-key").await })
            })
            .collect();

        // THEN: one fetch is made and every caller sees its failure
        for lookup in lookups {
            assert!(matches!(lookup.await.unwrap(), Err(AuthError::KeyFetch(_))));
        }
        assert_eq!(source.fetch_count(), 2);
        assert!(started.elapsed() < Duration::from_secs(20));

        // AND: cached keys are still served
        assert!(cache.resolve("primary-key").await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_cold_lookups_share_one_fetch() {
        let source = source();
        let cache = Arc::new(cache_with(&source, Duration::from_secs(3600)));

        let lookups: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.resolve("primary-key").await.is_ok() })
            })
            .collect();

        for lookup in lookups {
            assert!(lookup.await.unwrap());
        }
        assert_eq!(source.fetch_count(), 1);
    }
}
