//! Async image loading orchestrator.
//!
//! Checks the cache, coalesces concurrent requests for the same key into a
//! single fetch, decodes off the async runtime, and delivers every result
//! through the designated delivery context.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, trace, warn};

use crate::domain::entities::{ImagePayload, ResourceKey};
use crate::domain::errors::{DecodeError, LoadError, LoadResult};
use crate::domain::ports::{DecodePort, DeliveryPort, FetchPort, ResourceCachePort};

use super::decoder::ImageDecoder;
use crate::infrastructure::cache::MemoryResourceCache;
use crate::infrastructure::http::HttpFetcher;

/// Callback invoked on the delivery context with the load outcome.
pub type LoadCallback = Box<dyn FnOnce(Result<ImagePayload, LoadError>) + Send + 'static>;

/// Configuration for the image loader.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Maximum concurrent network fetches.
    pub max_concurrent_fetches: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 4,
        }
    }
}

/// One outstanding fetch and the callbacks awaiting it, in registration
/// order.
struct InFlight {
    waiters: Vec<(u64, LoadCallback)>,
}

type Registry = Mutex<HashMap<ResourceKey, InFlight>>;

/// Orchestrates image loading from cache and network.
///
/// Concurrent requests for the same key share one fetch, and at most one
/// fetch per key is outstanding at any time. Results always arrive through
/// the [`DeliveryPort`], never on the worker that fetched or decoded.
pub struct ImageLoader {
    cache: Arc<dyn ResourceCachePort>,
    fetcher: Arc<dyn FetchPort>,
    decoder: Arc<dyn DecodePort>,
    delivery: Arc<dyn DeliveryPort>,
    in_flight: Arc<Registry>,
    semaphore: Arc<Semaphore>,
    next_token: AtomicU64,
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl ImageLoader {
    /// Creates a loader over the given port implementations.
    ///
    /// Must be called within a tokio runtime; fetches run on spawned tasks.
    #[must_use]
    pub fn new(
        config: &LoaderConfig,
        cache: Arc<dyn ResourceCachePort>,
        fetcher: Arc<dyn FetchPort>,
        decoder: Arc<dyn DecodePort>,
        delivery: Arc<dyn DeliveryPort>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            decoder,
            delivery,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1))),
            next_token: AtomicU64::new(0),
        }
    }

    /// Creates a loader with the default HTTP fetcher, decoder, and an
    /// empty in-memory cache.
    ///
    /// # Errors
    /// Returns [`LoadError::Fetch`] if the HTTP client cannot be built.
    pub fn with_defaults(delivery: Arc<dyn DeliveryPort>) -> LoadResult<Self> {
        let fetcher = HttpFetcher::with_defaults().map_err(LoadError::Fetch)?;
        Ok(Self::new(
            &LoaderConfig::default(),
            Arc::new(MemoryResourceCache::new()),
            Arc::new(fetcher),
            Arc::new(ImageDecoder::new()),
            delivery,
        ))
    }

    /// Requests the image behind `locator`.
    ///
    /// On a cache hit the callback is scheduled immediately with the cached
    /// payload. On a miss the callback joins the in-flight fetch for the
    /// key, starting one if none exists. The returned handle cancels only
    /// this caller's callback; the shared fetch keeps running for everyone
    /// else and still populates the cache if every caller cancels.
    ///
    /// # Errors
    /// Returns [`LoadError::InvalidLocator`] without creating any in-flight
    /// state if the locator is empty or contains whitespace.
    pub fn request<F>(&self, locator: &str, callback: F) -> LoadResult<RequestHandle>
    where
        F: FnOnce(Result<ImagePayload, LoadError>) + Send + 'static,
    {
        validate_locator(locator)?;
        let key = ResourceKey::from_locator(locator);

        if let Some(payload) = self.cache.get(&key) {
            self.schedule(Box::new(callback), Ok(payload));
            return Ok(RequestHandle::noop());
        }

        Ok(self.join_or_spawn(key, locator, Some(Box::new(callback))))
    }

    /// Warms the cache for `locator` without registering a callback.
    ///
    /// # Errors
    /// Returns [`LoadError::InvalidLocator`] for an unusable locator.
    pub fn prefetch(&self, locator: &str) -> LoadResult<()> {
        validate_locator(locator)?;
        let key = ResourceKey::from_locator(locator);

        if self.cache.get(&key).is_none() {
            self.join_or_spawn(key, locator, None);
        }
        Ok(())
    }

    /// Returns true if a fetch for `key` is outstanding.
    #[must_use]
    pub fn is_in_flight(&self, key: &ResourceKey) -> bool {
        self.in_flight.lock().contains_key(key)
    }

    /// Returns the number of outstanding fetches.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Returns the shared cache.
    #[must_use]
    pub fn cache(&self) -> Arc<dyn ResourceCachePort> {
        self.cache.clone()
    }

    /// Removes every cached payload.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn schedule(&self, callback: LoadCallback, result: Result<ImagePayload, LoadError>) {
        self.delivery.deliver(Box::new(move || callback(result)));
    }

    /// Registers onto an existing in-flight fetch or starts a new one.
    ///
    /// The cache re-check and the join-or-create decision both happen under
    /// the registry lock, so a completion racing this call can neither be
    /// missed nor duplicated.
    fn join_or_spawn(
        &self,
        key: ResourceKey,
        locator: &str,
        callback: Option<LoadCallback>,
    ) -> RequestHandle {
        let mut registry = self.in_flight.lock();

        if let Some(payload) = self.cache.get(&key) {
            drop(registry);
            if let Some(callback) = callback {
                self.schedule(callback, Ok(payload));
            }
            return RequestHandle::noop();
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let handle = RequestHandle::pending(key.clone(), token, Arc::downgrade(&self.in_flight));

        if let Some(in_flight) = registry.get_mut(&key) {
            trace!(key = %key, "Joining in-flight fetch");
            if let Some(callback) = callback {
                in_flight.waiters.push((token, callback));
            }
            return handle;
        }

        let mut waiters = Vec::new();
        if let Some(callback) = callback {
            waiters.push((token, callback));
        }
        registry.insert(key.clone(), InFlight { waiters });
        drop(registry);

        debug!(key = %key, locator = %locator, "Starting image fetch");
        self.spawn_fetch(key, locator.to_string());
        handle
    }

    fn spawn_fetch(&self, key: ResourceKey, locator: String) {
        let cache = self.cache.clone();
        let fetcher = self.fetcher.clone();
        let decoder = self.decoder.clone();
        let delivery = self.delivery.clone();
        let in_flight = self.in_flight.clone();
        let semaphore = self.semaphore.clone();

        tokio::spawn(async move {
            // The semaphore is never closed.
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };

            // Runs to completion even if every waiter has cancelled; a
            // successful load must still land in the cache.
            let result = fetch_and_decode(&fetcher, &decoder, &locator).await;

            let waiters = {
                let mut registry = in_flight.lock();
                match &result {
                    Ok(payload) => cache.put(key.clone(), payload.clone()),
                    Err(error) => warn!(key = %key, error = %error, "Image load failed"),
                }
                registry
                    .remove(&key)
                    .map_or_else(Vec::new, |entry| entry.waiters)
            };

            trace!(key = %key, waiters = waiters.len(), "Delivering load result");
            for (_token, callback) in waiters {
                let outcome = result.clone();
                delivery.deliver(Box::new(move || callback(outcome)));
            }
        });
    }
}

async fn fetch_and_decode(
    fetcher: &Arc<dyn FetchPort>,
    decoder: &Arc<dyn DecodePort>,
    locator: &str,
) -> Result<ImagePayload, LoadError> {
    let bytes = fetcher.fetch(locator).await.map_err(LoadError::Fetch)?;

    let decoder = decoder.clone();
    let payload = tokio::task::spawn_blocking(move || decoder.decode(&bytes))
        .await
        .map_err(|e| DecodeError::TaskFailed(format!("Decode task panicked: {e}")))??;

    Ok(payload)
}

fn validate_locator(locator: &str) -> LoadResult<()> {
    if locator.trim().is_empty() {
        return Err(LoadError::invalid_locator("locator is empty"));
    }
    if locator.chars().any(char::is_whitespace) {
        return Err(LoadError::invalid_locator("locator contains whitespace"));
    }
    Ok(())
}

/// Handle to one caller's pending callback.
///
/// Cancelling removes only this caller's callback; the underlying fetch is
/// shared and keeps running for other callers. Dropping the handle does
/// nothing.
#[derive(Debug)]
pub struct RequestHandle {
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    key: ResourceKey,
    token: u64,
    registry: Weak<Registry>,
}

impl RequestHandle {
    const fn noop() -> Self {
        Self { pending: None }
    }

    fn pending(key: ResourceKey, token: u64, registry: Weak<Registry>) -> Self {
        Self {
            pending: Some(Pending {
                key,
                token,
                registry,
            }),
        }
    }

    /// Removes this caller's callback from the in-flight fetch.
    ///
    /// Returns true if the callback was still pending. Safe to call more
    /// than once and after the fetch has completed.
    pub fn cancel(&self) -> bool {
        let Some(pending) = &self.pending else {
            return false;
        };
        let Some(registry) = pending.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.lock();
        let Some(in_flight) = registry.get_mut(&pending.key) else {
            return false;
        };

        let before = in_flight.waiters.len();
        in_flight.waiters.retain(|(token, _)| *token != pending.token);
        let removed = in_flight.waiters.len() < before;
        if removed {
            trace!(key = %pending.key, "Cancelled pending callback");
        }
        removed
    }

    /// Returns true if the request was already satisfied from cache when it
    /// was issued, leaving nothing to cancel.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.pending.is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    use bytes::Bytes;
    use test_case::test_case;
    use tokio::sync::mpsc;
    use tokio_test::assert_ok;

    use super::*;
    use crate::domain::errors::FetchError;
    use crate::domain::ports::mocks::{FailingDecoder, InlineDelivery, MockDecoder, MockFetcher};
    use crate::infrastructure::delivery::ChannelDelivery;

    const LOCATOR_A: &str = "https://images.example/a.png";
    const LOCATOR_B: &str = "https://images.example/b.png";

    fn loader_with(
        fetcher: Arc<MockFetcher>,
        decoder: Arc<dyn DecodePort>,
        delivery: Arc<dyn DeliveryPort>,
    ) -> (ImageLoader, Arc<MemoryResourceCache>) {
        let cache = Arc::new(MemoryResourceCache::new());
        let loader = ImageLoader::new(
            &LoaderConfig::default(),
            cache.clone(),
            fetcher,
            decoder,
            delivery,
        );
        (loader, cache)
    }

    fn sender_callback(
        tx: &mpsc::UnboundedSender<Result<ImagePayload, LoadError>>,
    ) -> impl FnOnce(Result<ImagePayload, LoadError>) + Send + 'static {
        let tx = tx.clone();
        move |result| {
            let _ = tx.send(result);
        }
    }

    async fn wait_for_cache_entry(cache: &MemoryResourceCache) {
        for _ in 0..100 {
            if !cache.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("cache was never populated");
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let fetcher = Arc::new(MockFetcher::ok(Bytes::from_static(b"bytes")).gated());
        let (delivery, pump) = ChannelDelivery::channel();
        let (loader, _cache) = loader_with(
            fetcher.clone(),
            Arc::new(MockDecoder::new(4, 4)),
            Arc::new(delivery),
        );
        tokio::spawn(pump.run());

        let (tx, mut rx) = mpsc::unbounded_channel();
        for _ in 0..3 {
            tokio_test::assert_ok!(loader.request(LOCATOR_A, sender_callback(&tx)));
        }
        assert_eq!(loader.pending_count(), 1);

        fetcher.release(1);

        let mut payloads = Vec::new();
        for _ in 0..3 {
            let result = rx.recv().await.expect("callback dropped");
            payloads.push(result.expect("load failed"));
        }

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(loader.pending_count(), 0);
        assert!(payloads.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_the_fetcher() {
        let fetcher = Arc::new(MockFetcher::ok(Bytes::from_static(b"bytes")));
        let (loader, _cache) = loader_with(
            fetcher.clone(),
            Arc::new(MockDecoder::new(4, 4)),
            Arc::new(InlineDelivery),
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio_test::assert_ok!(loader.request(LOCATOR_A, sender_callback(&tx)));
        let first = rx.recv().await.unwrap().unwrap();

        let handle = tokio_test::assert_ok!(loader.request(LOCATOR_A, sender_callback(&tx)));
        let second = rx.recv().await.unwrap().unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(handle.is_noop());
        assert!(!handle.cancel());
    }

    #[tokio::test]
    async fn test_distinct_locators_fetch_independently() {
        let fetcher = Arc::new(MockFetcher::ok(Bytes::from_static(b"bytes")));
        let (loader, _cache) = loader_with(
            fetcher.clone(),
            Arc::new(MockDecoder::new(4, 4)),
            Arc::new(InlineDelivery),
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio_test::assert_ok!(loader.request(LOCATOR_A, sender_callback(&tx)));
        tokio_test::assert_ok!(loader.request(LOCATOR_B, sender_callback(&tx)));

        assert!(rx.recv().await.unwrap().is_ok());
        assert!(rx.recv().await.unwrap().is_ok());
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_cached() {
        let fetcher = Arc::new(
            MockFetcher::ok(Bytes::from_static(b"bytes")).with_script(vec![Err(
                FetchError::Transport("connection reset".to_string()),
            )]),
        );
        let (loader, cache) = loader_with(
            fetcher.clone(),
            Arc::new(MockDecoder::new(4, 4)),
            Arc::new(InlineDelivery),
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio_test::assert_ok!(loader.request(LOCATOR_B, sender_callback(&tx)));
        let result = rx.recv().await.unwrap();

        assert!(matches!(result, Err(LoadError::Fetch(_))));
        assert!(cache.is_empty());

        // The failure was not cached; a second request retries the network.
        tokio_test::assert_ok!(loader.request(LOCATOR_B, sender_callback(&tx)));
        let retried = rx.recv().await.unwrap();

        assert!(retried.is_ok());
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_decode_failure_is_reported_distinctly() {
        let fetcher = Arc::new(MockFetcher::ok(Bytes::from_static(b"bad bytes")));
        let (loader, cache) = loader_with(
            fetcher.clone(),
            Arc::new(FailingDecoder),
            Arc::new(InlineDelivery),
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio_test::assert_ok!(loader.request(LOCATOR_A, sender_callback(&tx)));
        let result = rx.recv().await.unwrap();

        let error = result.unwrap_err();
        assert!(error.is_decode());
        assert!(!error.is_fetch());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_only_removes_the_cancelling_caller() {
        let fetcher = Arc::new(MockFetcher::ok(Bytes::from_static(b"bytes")).gated());
        let (delivery, pump) = ChannelDelivery::channel();
        let (loader, _cache) = loader_with(
            fetcher.clone(),
            Arc::new(MockDecoder::new(4, 4)),
            Arc::new(delivery),
        );
        tokio::spawn(pump.run());

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let handle_a = tokio_test::assert_ok!(loader.request(LOCATOR_A, sender_callback(&tx_a)));
        let _handle_b = tokio_test::assert_ok!(loader.request(LOCATOR_A, sender_callback(&tx_b)));

        assert!(handle_a.cancel());
        assert!(!handle_a.cancel());

        fetcher.release(1);

        let result_b = rx_b.recv().await.expect("caller B was dropped");
        assert!(result_b.is_ok());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_all_cancelled_fetch_still_populates_cache() {
        let fetcher = Arc::new(MockFetcher::ok(Bytes::from_static(b"bytes")).gated());
        let (loader, cache) = loader_with(
            fetcher.clone(),
            Arc::new(MockDecoder::new(4, 4)),
            Arc::new(InlineDelivery),
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle_a = tokio_test::assert_ok!(loader.request(LOCATOR_A, sender_callback(&tx)));
        let handle_b = tokio_test::assert_ok!(loader.request(LOCATOR_A, sender_callback(&tx)));

        assert!(handle_a.cancel());
        assert!(handle_b.cancel());

        fetcher.release(1);
        wait_for_cache_entry(&cache).await;

        assert_eq!(fetcher.calls(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "blank")]
    #[test_case("https://images.example/a b.png" ; "embedded_whitespace")]
    #[tokio::test]
    async fn test_invalid_locator_is_rejected_synchronously(locator: &str) {
        let fetcher = Arc::new(MockFetcher::ok(Bytes::from_static(b"bytes")));
        let (loader, _cache) = loader_with(
            fetcher.clone(),
            Arc::new(MockDecoder::new(4, 4)),
            Arc::new(InlineDelivery),
        );

        let result = loader.request(locator, |_| {});

        assert!(matches!(
            result,
            Err(LoadError::InvalidLocator { .. })
        ));
        assert_eq!(fetcher.calls(), 0);
        assert_eq!(loader.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_callbacks_fire_in_registration_order() {
        let fetcher = Arc::new(MockFetcher::ok(Bytes::from_static(b"bytes")).gated());
        let (delivery, pump) = ChannelDelivery::channel();
        let (loader, _cache) = loader_with(
            fetcher.clone(),
            Arc::new(MockDecoder::new(4, 4)),
            Arc::new(delivery),
        );
        tokio::spawn(pump.run());

        let order = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        for i in 0..3 {
            let order = order.clone();
            let tx = tx.clone();
            tokio_test::assert_ok!(loader.request(LOCATOR_A, move |_| {
                order.lock().push(i);
                let _ = tx.send(());
            }));
        }

        fetcher.release(1);
        for _ in 0..3 {
            rx.recv().await.unwrap();
        }

        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_callbacks_fire_on_the_delivery_thread() {
        let fetcher = Arc::new(MockFetcher::ok(Bytes::from_static(b"bytes")));
        let (delivery, pump) = ChannelDelivery::channel();
        let (loader, _cache) = loader_with(
            fetcher,
            Arc::new(MockDecoder::new(4, 4)),
            Arc::new(delivery),
        );

        let pump_thread = std::thread::spawn(move || pump.run_blocking());
        let pump_thread_id = pump_thread.thread().id();

        let (tx, rx) = std_mpsc::channel();
        tokio_test::assert_ok!(loader.request(LOCATOR_A, move |result| {
            assert!(result.is_ok());
            let _ = tx.send(std::thread::current().id());
        }));

        let seen = tokio::task::spawn_blocking(move || rx.recv().unwrap())
            .await
            .unwrap();
        assert_eq!(seen, pump_thread_id);

        drop(loader);
        pump_thread.join().unwrap();
    }

    #[tokio::test]
    async fn test_prefetch_populates_the_cache_without_callbacks() {
        let fetcher = Arc::new(MockFetcher::ok(Bytes::from_static(b"bytes")));
        let (loader, cache) = loader_with(
            fetcher.clone(),
            Arc::new(MockDecoder::new(4, 4)),
            Arc::new(InlineDelivery),
        );

        tokio_test::assert_ok!(loader.prefetch(LOCATOR_A));
        wait_for_cache_entry(&cache).await;

        // A later request is served from cache without another fetch.
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio_test::assert_ok!(loader.request(LOCATOR_A, sender_callback(&tx)));
        assert!(rx.recv().await.unwrap().is_ok());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_tracking() {
        let fetcher = Arc::new(MockFetcher::ok(Bytes::from_static(b"bytes")).gated());
        let (loader, cache) = loader_with(
            fetcher.clone(),
            Arc::new(MockDecoder::new(4, 4)),
            Arc::new(InlineDelivery),
        );

        let key = ResourceKey::from_locator(LOCATOR_A);
        assert!(!loader.is_in_flight(&key));

        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio_test::assert_ok!(loader.request(LOCATOR_A, sender_callback(&tx)));
        assert!(loader.is_in_flight(&key));

        fetcher.release(1);
        assert!(rx.recv().await.unwrap().is_ok());
        assert!(!loader.is_in_flight(&key));

        loader.clear_cache();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_with_defaults_builds() {
        let (delivery, _pump) = ChannelDelivery::channel();
        let loader = ImageLoader::with_defaults(Arc::new(delivery));
        assert!(loader.is_ok());
    }
}
