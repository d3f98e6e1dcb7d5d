use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Single namespaced key holding the JSON array of records
pub const STORAGE_KEY: &str = "sorosub_subscriptions";

/// Synchronous string key-value storage
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

// ============================================
// STORES
// ============================================

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

/// JSON object file mapping keys to string values
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Atomic replace
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

// ============================================
// SUBSCRIPTION CACHE
// ============================================

/// Locally remembered subscription; a hint, not ledger truth
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSubscription {
    pub id: String,
    pub name: String,
    pub provider_address: String,
    /// Display units
    pub amount: f64,
    pub interval_seconds: u64,
    /// Unix milliseconds
    pub created_at: i64,
    pub token_address: String,
}

impl StoredSubscription {
    pub fn new(
        name: impl Into<String>,
        provider_address: impl Into<String>,
        amount: f64,
        interval_seconds: u64,
        token_address: impl Into<String>,
    ) -> Self {
        let created_at = Utc::now().timestamp_millis();
        Self {
            id: format!("sub_{created_at}_{:08x}", rand::random::<u32>()),
            name: name.into(),
            provider_address: provider_address.into(),
            amount,
            interval_seconds,
            created_at,
            token_address: token_address.into(),
        }
    }

    pub fn next_renewal(&self, now_ms: i64) -> Option<i64> {
        next_renewal(self.created_at, self.interval_seconds, now_ms)
    }
}

/// Best-effort cache over a [`KeyValueStore`]
///
/// Reads fall back to an empty list and writes log on failure; nothing here
/// returns an error.
pub struct SubscriptionCache<S> {
    store: S,
}

impl<S: KeyValueStore> SubscriptionCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn list(&self) -> Vec<StoredSubscription> {
        let raw = match self.store.get(STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "subscription cache unreadable");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "subscription cache corrupt, ignoring");
            Vec::new()
        })
    }

    fn write(&self, subscriptions: &[StoredSubscription]) {
        let result = serde_json::to_string(subscriptions)
            .map_err(Into::into)
            .and_then(|json| self.store.set(STORAGE_KEY, &json));
        if let Err(e) = result {
            warn!(error = %e, "subscription cache write failed");
        }
    }

    /// Insert unless a record with the same provider and name exists
    ///
    /// # Returns
    /// `true` when the record was added
    pub fn add(&self, subscription: StoredSubscription) -> bool {
        let mut subscriptions = self.list();
        let duplicate = subscriptions.iter().any(|s| {
            s.provider_address == subscription.provider_address && s.name == subscription.name
        });
        if duplicate {
            debug!(name = %subscription.name, "already cached");
            return false;
        }
        subscriptions.push(subscription);
        self.write(&subscriptions);
        true
    }

    /// # Returns
    /// `true` when a record with `id` was removed
    pub fn remove(&self, id: &str) -> bool {
        let mut subscriptions = self.list();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        self.write(&subscriptions);
        subscriptions.len() != before
    }

    /// Drop every record for `provider`
    ///
    /// # Returns
    /// Number of records removed
    pub fn remove_provider(&self, provider: &str) -> usize {
        let mut subscriptions = self.list();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.provider_address != provider);
        if subscriptions.len() != before {
            self.write(&subscriptions);
        }
        before - subscriptions.len()
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(STORAGE_KEY) {
            warn!(error = %e, "subscription cache clear failed");
        }
    }
}

/// First renewal strictly after `now_ms`, on the grid
/// `created_at + k * interval`
///
/// Example:
/// - created at 0, weekly, now = 10 days -> 14 days
pub fn next_renewal(created_at_ms: i64, interval_seconds: u64, now_ms: i64) -> Option<i64> {
    let interval_ms = i64::try_from(interval_seconds).ok()?.checked_mul(1000)?;
    if interval_ms == 0 {
        return None;
    }
    let elapsed = now_ms.checked_sub(created_at_ms)?;
    let periods = elapsed.div_euclid(interval_ms);
    periods
        .checked_add(1)?
        .checked_mul(interval_ms)?
        .checked_add(created_at_ms)
}

/// `Mar 4, 2025`
pub fn format_renewal_date(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|d| d.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WEEKLY;

    const DAY_MS: i64 = 86_400_000;

    fn record(id: &str, name: &str, provider: &str) -> StoredSubscription {
        StoredSubscription {
            id: id.into(),
            name: name.into(),
            provider_address: provider.into(),
            amount: 9.99,
            interval_seconds: WEEKLY,
            created_at: 1_700_000_000_000,
            token_address: "CTOKEN".into(),
        }
    }

    #[test]
    fn test_add_dedupes_by_provider_and_name() {
        let cache = SubscriptionCache::new(MemoryStore::new());
        assert!(cache.add(record("1", "Netflix", "GPROV")));
        assert!(!cache.add(record("2", "Netflix", "GPROV")));
        assert!(cache.add(record("3", "Netflix", "GOTHER")));

        let list = cache.list();
        assert_eq!(list.len(), 2);
        let matching = list
            .iter()
            .filter(|s| s.name == "Netflix" && s.provider_address == "GPROV")
            .count();
        assert_eq!(matching, 1);
    }

    #[test]
    fn test_remove_by_id_and_provider() {
        let cache = SubscriptionCache::new(MemoryStore::new());
        cache.add(record("1", "A", "GP1"));
        cache.add(record("2", "B", "GP1"));
        cache.add(record("3", "C", "GP2"));

        assert!(cache.remove("3"));
        assert!(!cache.remove("3"));
        assert!(cache.list().iter().all(|s| s.id != "3"));

        assert_eq!(cache.remove_provider("GP1"), 2);
        assert!(cache.list().is_empty());
    }

    #[test]
    fn test_clear_and_corrupt_payload() {
        let store = MemoryStore::new();
        store.set(STORAGE_KEY, "{not json").unwrap();
        let cache = SubscriptionCache::new(store);
        assert!(cache.list().is_empty());

        cache.add(record("1", "A", "GP1"));
        cache.clear();
        assert!(cache.list().is_empty());
    }

    #[test]
    fn test_camel_case_wire_format() {
        let json = serde_json::to_value(record("1", "A", "GP1")).unwrap();
        assert_eq!(json["providerAddress"], "GP1");
        assert_eq!(json["intervalSeconds"], WEEKLY);
        assert_eq!(json["createdAt"], 1_700_000_000_000i64);
        assert_eq!(json["tokenAddress"], "CTOKEN");
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let cache = SubscriptionCache::new(FileStore::new(&path));
        cache.add(record("1", "A", "GP1"));

        let reopened = SubscriptionCache::new(FileStore::new(&path));
        assert_eq!(reopened.list(), vec![record("1", "A", "GP1")]);

        reopened.clear();
        assert!(SubscriptionCache::new(FileStore::new(&path)).list().is_empty());
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = StoredSubscription::new("A", "GP", 1.0, WEEKLY, "CT");
        let b = StoredSubscription::new("A", "GP", 1.0, WEEKLY, "CT");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_next_renewal_is_after_now_and_aligned() {
        let created = 1_000;
        let interval = WEEKLY;
        for now in [created, created + 1, created + 10 * DAY_MS, created + 14 * DAY_MS] {
            let next = next_renewal(created, interval, now).unwrap();
            assert!(next > now);
            assert_eq!((next - created) % (interval as i64 * 1000), 0);
        }
        assert_eq!(
            next_renewal(created, interval, created + 10 * DAY_MS),
            Some(created + 14 * DAY_MS)
        );
        assert_eq!(next_renewal(created, 0, created), None);
    }

    #[test]
    fn test_format_renewal_date() {
        // 2023-11-14T22:13:20Z
        assert_eq!(format_renewal_date(1_700_000_000_000), "Nov 14, 2023");
    }
}
