use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long a memoised lookup stays valid.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Per-request memo for lookups a handler may repeat (tenant resolution, mostly).
/// One instance is created per authenticated request and dropped with it.
#[derive(Debug)]
pub struct RequestCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, String)>>,
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }
}

impl RequestCache {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some((stored_at, value)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.into(), (Instant::now(), value.into()));
        }
    }

    pub fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_stored_values() {
        let cache = RequestCache::default();
        assert_eq!(cache.get("tenant:OWNER:u1"), None);
        cache.put("tenant:OWNER:u1", "b1");
        assert_eq!(cache.get("tenant:OWNER:u1").as_deref(), Some("b1"));
        cache.invalidate("tenant:OWNER:u1");
        assert_eq!(cache.get("tenant:OWNER:u1"), None);
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = RequestCache::with_ttl(Duration::ZERO);
        cache.put("k", "v");
        assert_eq!(cache.get("k"), None);
    }
}
