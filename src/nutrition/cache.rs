//! In-memory TTL cache for nutrition lookups, so repeated resolutions of the
//! same label within a session don't re-hit the external API.

use std::collections::HashMap;

use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

struct Entry<V> {
    value: V,
    expires_at: OffsetDateTime,
}

pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > OffsetDateTime::now_utc() => {
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn insert(&self, key: String, value: V, ttl_seconds: i64) {
        let entry = Entry {
            value,
            expires_at: OffsetDateTime::now_utc() + Duration::seconds(ttl_seconds),
        };
        self.entries.lock().await.insert(key, entry);
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
