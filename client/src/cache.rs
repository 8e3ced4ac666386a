use crate::{clock::DynClock, record::CallHandle, result::Result};
use batchwire_core::{time::duration_millis, trace};
use parking_lot::Mutex;
use std::{collections::HashMap, time::Duration};

/// How long the outcome of a call may be reused by identical calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CachePolicy {
    For(Duration),
    Forever,
}

impl CachePolicy {
    pub fn seconds(seconds: u64) -> Self {
        CachePolicy::For(Duration::from_secs(seconds))
    }

    /// Expiry instant (unix ms) of an entry created at `now`, `None` meaning never.
    fn expires_at(&self, now: u64) -> Option<u64> {
        match self {
            CachePolicy::For(ttl) => Some(now.saturating_add(duration_millis(*ttl))),
            CachePolicy::Forever => None,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    expires_at: Option<u64>,
    outcome: CallHandle,
}

impl CacheEntry {
    /// An entry expiring exactly now is already stale.
    fn is_live(&self, now: u64) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// Shared outcomes of recent calls, keyed by call signature.
///
/// Expired entries are never served. They are only dropped when replaced or when
/// [`ResponseCache::purge_expired`] runs.
#[derive(Debug)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: DynClock,
}

impl ResponseCache {
    pub fn new(clock: DynClock) -> Self {
        Self { entries: Mutex::new(HashMap::new()), clock }
    }

    /// Signature of a call: its method and encoded parameters.
    pub fn signature(method: &str, encoded_params: &str) -> String {
        format!("{method}\n{encoded_params}")
    }

    /// Returns the live outcome stored for `signature`, or the handle built by `create`
    /// after storing it under `policy`. A failing `create` leaves the cache untouched.
    pub fn lookup_or_create<F>(&self, signature: String, policy: CachePolicy, create: F) -> Result<CallHandle>
    where
        F: FnOnce() -> Result<CallHandle>,
    {
        let mut entries = self.entries.lock();
        let now = self.clock.now();
        if let Some(entry) = entries.get(&signature).filter(|entry| entry.is_live(now)) {
            trace!("[ResponseCache] hit {:?}", signature);
            return Ok(entry.outcome.clone());
        }
        let outcome = create()?;
        entries.insert(signature, CacheEntry { expires_at: policy.expires_at(now), outcome: outcome.clone() });
        Ok(outcome)
    }

    /// The live outcome stored for `signature`, if any.
    pub fn get(&self, signature: &str) -> Option<CallHandle> {
        let now = self.clock.now();
        self.entries.lock().get(signature).filter(|entry| entry.is_live(now)).map(|entry| entry.outcome.clone())
    }

    pub fn invalidate(&self, signature: &str) -> bool {
        self.entries.lock().remove(signature).is_some()
    }

    /// Drops every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, error::Error, params, record::CallRecord};
    use std::sync::Arc;

    fn handle() -> CallHandle {
        CallRecord::new("m".to_string(), params! {}, "method=m".to_string(), 0).1
    }

    fn cache() -> (Arc<ManualClock>, ResponseCache) {
        let clock = Arc::new(ManualClock::new(10_000));
        (clock.clone(), ResponseCache::new(clock))
    }

    #[test]
    fn test_hit_within_ttl_and_miss_after() {
        let (clock, cache) = cache();
        let first = cache.lookup_or_create("sig".to_string(), CachePolicy::seconds(5), || Ok(handle())).unwrap();
        clock.advance(Duration::from_millis(4_999));
        let second = cache.lookup_or_create("sig".to_string(), CachePolicy::seconds(5), || panic!("must hit")).unwrap();
        assert!(first.ptr_eq(&second));

        // expiry equal to now counts as expired
        clock.advance(Duration::from_millis(1));
        assert!(cache.get("sig").is_none());
        let third = cache.lookup_or_create("sig".to_string(), CachePolicy::seconds(5), || Ok(handle())).unwrap();
        assert!(!first.ptr_eq(&third));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_forever_and_zero_ttl() {
        let (clock, cache) = cache();
        let forever = cache.lookup_or_create("a".to_string(), CachePolicy::Forever, || Ok(handle())).unwrap();
        cache.lookup_or_create("b".to_string(), CachePolicy::For(Duration::ZERO), || Ok(handle())).unwrap();
        assert!(cache.get("b").is_none());

        clock.advance(Duration::from_secs(365 * 24 * 3600));
        assert!(cache.get("a").unwrap().ptr_eq(&forever));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let (clock, cache) = cache();
        let policy = CachePolicy::seconds(18_446_744_073_709_552);
        let first = cache.lookup_or_create("sig".to_string(), policy, || Ok(handle())).unwrap();
        clock.advance(Duration::from_secs(1));
        assert!(cache.get("sig").unwrap().ptr_eq(&first));
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_purge_expired() {
        let (clock, cache) = cache();
        cache.lookup_or_create("short".to_string(), CachePolicy::seconds(1), || Ok(handle())).unwrap();
        cache.lookup_or_create("long".to_string(), CachePolicy::seconds(60), || Ok(handle())).unwrap();
        cache.lookup_or_create("forever".to_string(), CachePolicy::Forever, || Ok(handle())).unwrap();
        assert_eq!(cache.purge_expired(), 0);

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 2);
        assert!(cache.invalidate("long"));
        assert!(!cache.invalidate("long"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failed_create_is_not_stored() {
        let (_, cache) = cache();
        let err = cache.lookup_or_create("x".to_string(), CachePolicy::Forever, || Err(Error::InvalidMethod(String::new())));
        assert!(err.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_signature_is_deterministic() {
        assert_eq!(ResponseCache::signature("m", "method=m&a=1"), ResponseCache::signature("m", "method=m&a=1"));
        assert_ne!(ResponseCache::signature("m", "method=m&a=1"), ResponseCache::signature("m", "method=m&a=2"));
    }
}
