//! Response cache
//!
//! Keeps the [`ResponseHandle`] of cacheable requests keyed by method and
//! canonical URL. Each entry is evicted by a Tokio timer once its lifetime
//! runs out; clearing the cache first turns that timer into a no-op.

use crate::matcher::{Matcher, equals_or_matches};
use crate::request::ApiRequest;
use crate::service::ResponseHandle;
use reqwest::Method;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct CacheEntry {
    id: u64,
    method: Method,
    url: String,
    endpoint: String,
    handle: ResponseHandle,
    created_at: Instant,
    expires_after: Duration,
}

/// Time-bounded cache of response handles.
#[derive(Debug, Clone, Default)]
pub struct ApiCache {
    entries: Arc<Mutex<Vec<CacheEntry>>>,
    next_id: Arc<AtomicU64>,
}

impl ApiCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle cached for exactly this method and URL.
    pub fn find(&self, method: &Method, url: &str) -> Option<ResponseHandle> {
        self.lock()
            .iter()
            .find(|entry| entry.method == *method && entry.url == url)
            .filter(|entry| entry.created_at.elapsed() < entry.expires_after)
            .map(|entry| entry.handle.clone())
    }

    /// Cache `handle` under `request`'s method and `url` for `ttl`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn add(&self, request: &ApiRequest, url: String, handle: ResponseHandle, ttl: Duration) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut entries = self.lock();
            entries.retain(|entry| !(entry.method == request.method && entry.url == url));
            entries.push(CacheEntry {
                id,
                method: request.method.clone(),
                url,
                endpoint: request.endpoint.clone(),
                handle,
                created_at: Instant::now(),
                expires_after: ttl,
            });
        }

        let entries = Arc::downgrade(&self.entries);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(entries) = entries.upgrade() {
                let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
                entries.retain(|entry| entry.id != id);
            }
        });
    }

    /// Remove entries. With no filters everything goes; otherwise entries
    /// matching both filters are removed. The endpoint filter is tested
    /// against the endpoint and the canonical URL. Returns how many were
    /// removed.
    pub fn clear(&self, method: Option<Matcher>, endpoint: Option<Matcher>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        if method.is_none() && endpoint.is_none() {
            entries.clear();
        } else {
            let method = method.map(Matcher::upper_cased);
            entries.retain(|entry| {
                let method_matches = equals_or_matches(entry.method.as_str(), method.as_ref());
                let endpoint_matches = equals_or_matches(&entry.endpoint, endpoint.as_ref())
                    || equals_or_matches(&entry.url, endpoint.as_ref());
                !(method_matches && endpoint_matches)
            });
        }
        let removed = before - entries.len();
        tracing::trace!(target: "api_service::http", removed, "cache cleared");
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ApiResponse;
    use crate::params::Params;
    use crate::request::RequestOptions;
    use regex::Regex;

    fn cached(cache: &ApiCache, method: Method, endpoint: &str, ttl: Duration) -> ResponseHandle {
        let request = ApiRequest::new(method, endpoint, Params::new(), None, RequestOptions::new());
        let response = ApiResponse::without_response(Arc::new(request.clone()));
        let handle = ResponseHandle::ready(&request, Ok(response));
        cache.add(&request, request.url(), handle.clone(), ttl);
        handle
    }

    #[tokio::test]
    async fn finds_exact_matches_only() {
        let cache = ApiCache::new();
        let handle = cached(&cache, Method::GET, "/posts", Duration::from_secs(60));
        let found = cache.find(&Method::GET, "/api/v2/posts").unwrap();
        assert!(found.is_same(&handle));
        assert!(cache.find(&Method::POST, "/api/v2/posts").is_none());
        assert!(cache.find(&Method::GET, "/api/v2/posts?a=1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire() {
        let cache = ApiCache::new();
        cached(&cache, Method::GET, "/posts", Duration::from_secs(2));
        assert_eq!(cache.len(), 1);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_after_clear_is_harmless() {
        let cache = ApiCache::new();
        cached(&cache, Method::GET, "/a", Duration::from_secs(1));
        cache.clear(None, None);
        cached(&cache, Method::GET, "/b", Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cache.len(), 1);
        assert!(cache.find(&Method::GET, "/api/v2/b").is_some());
    }

    #[tokio::test]
    async fn clear_by_method_and_endpoint() {
        let cache = ApiCache::new();
        let ttl = Duration::from_secs(60);
        cached(&cache, Method::GET, "/posts", ttl);
        cached(&cache, Method::GET, "/users", ttl);
        cached(&cache, Method::HEAD, "/posts", ttl);

        assert_eq!(cache.clear(Some("get".into()), Some("/posts".into())), 1);
        assert_eq!(cache.len(), 2);

        let pattern = Regex::new("^/(posts|users)$").unwrap();
        assert_eq!(cache.clear(None, Some(pattern.into())), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn one_entry_per_key() {
        let cache = ApiCache::new();
        let ttl = Duration::from_secs(60);
        cached(&cache, Method::GET, "/posts", ttl);
        let second = cached(&cache, Method::GET, "/posts", ttl);
        assert_eq!(cache.len(), 1);
        assert!(cache.find(&Method::GET, "/api/v2/posts").unwrap().is_same(&second));
    }
}
