// Per-request invocation cache
//
// Memoizes read calls made more than once with identical arguments while one inbound
// request is being processed. The cache lives exactly as long as the request scope.

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::api::middleware::AppError;

/// Identity of one call: target type, method name and argument values.
///
/// Arguments are captured as JSON values, so two keys are equal when every argument is
/// structurally equal (sequences element by element, maps key by key), regardless of
/// where the argument values live in memory.
#[derive(Debug, Clone)]
pub struct InvocationKey {
    target: TypeId,
    target_name: &'static str,
    method: &'static str,
    arguments: Vec<Value>,
}

impl InvocationKey {
    /// Key for `method` on type `T`, with no arguments yet
    pub fn new<T: ?Sized + 'static>(method: &'static str) -> Self {
        Self {
            target: TypeId::of::<T>(),
            target_name: std::any::type_name::<T>(),
            method,
            arguments: Vec::new(),
        }
    }

    /// Append the next positional argument.
    ///
    /// JSON has no NaN or infinity: non-finite floats are captured as `null` and share a
    /// key with `None`. Callers memoizing over such values should pass `f64::to_bits`.
    pub fn arg<A: Serialize + ?Sized>(mut self, argument: &A) -> Result<Self, AppError> {
        let value = serde_json::to_value(argument).map_err(|e| {
            AppError::Internal(format!(
                "Cannot build cache key for {}::{}: {}",
                self.target_name, self.method, e
            ))
        })?;
        self.arguments.push(value);
        Ok(self)
    }

    pub fn target_name(&self) -> &'static str {
        self.target_name
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }
}

impl PartialEq for InvocationKey {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
            && self.method == other.method
            && self.arguments == other.arguments
    }
}

impl Eq for InvocationKey {}

impl Hash for InvocationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target.hash(state);
        self.method.hash(state);
        self.arguments.len().hash(state);
        // Object keys serialize in sorted order, so equal values render identically
        for argument in &self.arguments {
            argument.to_string().hash(state);
        }
    }
}

/// Build an [`InvocationKey`] from a target type, method name and arguments.
///
/// Evaluates to `Result<InvocationKey, AppError>`.
///
/// ```
/// use clinical_persistence::invocation_key;
///
/// struct PatientDirectory;
/// let key = invocation_key!(PatientDirectory, "find_by_site", 42, "OPEN").unwrap();
/// assert_eq!(key.method(), "find_by_site");
/// assert_eq!(key.arguments().len(), 2);
/// ```
#[macro_export]
macro_rules! invocation_key {
    ($target:ty, $method:expr $(, $arg:expr)* $(,)?) => {
        (|| -> ::std::result::Result<_, $crate::api::middleware::AppError> {
            ::std::result::Result::Ok(
                $crate::services::invocation_cache::InvocationKey::new::<$target>($method)
                    $(.arg(&$arg)?)*
            )
        })()
    };
}

/// Cache statistics for one request scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

tokio::task_local! {
    static CURRENT: Arc<RequestCache>;
}

/// Results of memoized calls for a single request.
///
/// Safe for concurrent use by the request's own tasks. Identical calls racing on an empty
/// entry may both run the underlying operation and both store; the cache only spares
/// calls that arrive after a result has been stored, it does not guarantee at-most-once
/// execution.
#[derive(Default)]
pub struct RequestCache {
    entries: DashMap<InvocationKey, Arc<dyn Any + Send + Sync>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored result for `key`, or `None` when nothing is stored.
    ///
    /// A stored `None`/empty result is returned as `Some`, so absence is never confused
    /// with a null value.
    pub fn lookup<T: Send + Sync + 'static>(&self, key: &InvocationKey) -> Option<Arc<T>> {
        let stored = self.entries.get(key).map(|entry| Arc::clone(entry.value()));
        match stored.map(|value| value.downcast::<T>()) {
            Some(Ok(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Invocation cache hit for {}::{}", key.target_name, key.method);
                Some(value)
            }
            Some(Err(_)) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "Invocation cache entry for {}::{} holds a different result type",
                    key.target_name,
                    key.method
                );
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Invocation cache miss for {}::{}", key.target_name, key.method);
                None
            }
        }
    }

    /// Record `value` for `key`; replaces any earlier entry
    pub fn store<T: Send + Sync + 'static>(&self, key: InvocationKey, value: Arc<T>) {
        self.entries.insert(key, value);
    }

    /// Run `operation` unless a result for `key` is already stored.
    ///
    /// Only `Ok` results are stored; an error propagates and leaves the entry empty.
    pub async fn memoize<T, E, F, Fut>(&self, key: InvocationKey, operation: F) -> Result<Arc<T>, E>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.lookup::<T>(&key) {
            return Ok(cached);
        }

        let value = Arc::new(operation().await?);
        self.store(key, Arc::clone(&value));
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    /// Run `future` inside a fresh, empty request scope.
    ///
    /// The scope's cache is dropped when `future` finishes, whether it succeeds, returns an
    /// error, or panics.
    pub async fn scope<F: Future>(future: F) -> F::Output {
        CURRENT.scope(Arc::new(RequestCache::new()), future).await
    }

    /// Run `future` inside this cache's scope, e.g. for a task spawned by the request
    pub async fn enter<F: Future>(self: &Arc<Self>, future: F) -> F::Output {
        CURRENT.scope(Arc::clone(self), future).await
    }

    /// Cache of the request scope the current task runs in
    pub fn current() -> Option<Arc<RequestCache>> {
        CURRENT.try_with(Arc::clone).ok()
    }
}

/// Memoize `operation` in the current request scope.
///
/// Outside a request scope the operation simply runs.
pub async fn memoized<T, E, F, Fut>(key: InvocationKey, operation: F) -> Result<Arc<T>, E>
where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match RequestCache::current() {
        Some(cache) => cache.memoize(key, operation).await,
        None => {
            tracing::debug!(
                "No request scope for {}::{}, invoking directly",
                key.target_name,
                key.method
            );
            Ok(Arc::new(operation().await?))
        }
    }
}
