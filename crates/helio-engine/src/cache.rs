//! Geocode Cache: content-addressed store of resolved textual locations.
//!
//! Entries are keyed by `query_hash` (SHA-256 of the normalized query) and
//! carry an absolute `expires_at`. Expiry is enforced at read time, so an
//! expired entry is never returned even if the store has not purged it yet.
//! Entries are never updated in place; a later `put` for the same hash
//! replaces the earlier one (last write wins).
//!
//! Store failures never fail a request: a failed read is a miss and a failed
//! write is logged and dropped.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::location::{GeoLocation, LocationType};

/// One cached geocoding result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeCacheEntry {
    pub query_hash: String,
    pub location_type: LocationType,
    pub location_key: String,
    pub location: GeoLocation,
    pub expires_at: DateTime<Utc>,
}

impl GeocodeCacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Persistence backend for cache entries.
pub trait CacheStore: Send + Sync {
    fn load(&self, query_hash: &str) -> Result<Option<GeocodeCacheEntry>, StoreError>;
    fn save(&self, entry: GeocodeCacheEntry) -> Result<(), StoreError>;
    fn scan(&self, location_type: LocationType) -> Result<Vec<GeocodeCacheEntry>, StoreError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, GeocodeCacheEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("cache lock poisoned".to_string())
}

impl CacheStore for InMemoryStore {
    fn load(&self, query_hash: &str) -> Result<Option<GeocodeCacheEntry>, StoreError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(query_hash).cloned())
    }

    fn save(&self, entry: GeocodeCacheEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(entry.query_hash.clone(), entry);
        Ok(())
    }

    fn scan(&self, location_type: LocationType) -> Result<Vec<GeocodeCacheEntry>, StoreError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries
            .values()
            .filter(|e| e.location_type == location_type)
            .cloned()
            .collect())
    }
}

/// Store backed by a single JSON document on disk.
///
/// The whole file is read on every call and rewritten on every save, which
/// is fine for the few thousand entries a deployment accumulates.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, GeocodeCacheEntry>, StoreError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let text = fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl CacheStore for JsonFileStore {
    fn load(&self, query_hash: &str) -> Result<Option<GeocodeCacheEntry>, StoreError> {
        Ok(self.read_all()?.remove(query_hash))
    }

    fn save(&self, entry: GeocodeCacheEntry) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| poisoned())?;
        let mut all = self.read_all()?;
        all.insert(entry.query_hash.clone(), entry);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&all)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn scan(&self, location_type: LocationType) -> Result<Vec<GeocodeCacheEntry>, StoreError> {
        Ok(self
            .read_all()?
            .into_values()
            .filter(|e| e.location_type == location_type)
            .collect())
    }
}

/// Expiry-aware front for a [`CacheStore`].
#[derive(Clone)]
pub struct GeocodeCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
}

impl GeocodeCache {
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// In-memory cache on the system clock.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()), Arc::new(SystemClock))
    }

    /// The location for `query_hash`, unless absent or expired.
    pub fn get(&self, query_hash: &str) -> Option<GeoLocation> {
        match self.store.load(query_hash) {
            Ok(Some(entry)) if !entry.is_expired(self.clock.now()) => Some(entry.location),
            Ok(Some(entry)) => {
                debug!(query_hash, expires_at = %entry.expires_at, "geocode cache entry expired");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(query_hash, error = %e, "geocode cache read failed; treating as miss");
                None
            }
        }
    }

    /// Insert a new entry expiring `ttl_seconds` from now.
    pub fn put(
        &self,
        query_hash: &str,
        location_type: LocationType,
        location_key: &str,
        location: &GeoLocation,
        ttl_seconds: u64,
    ) {
        let now = self.clock.now();
        let expires_at = i64::try_from(ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let entry = GeocodeCacheEntry {
            query_hash: query_hash.to_string(),
            location_type,
            location_key: location_key.to_string(),
            location: location.clone(),
            expires_at,
        };
        if let Err(e) = self.store.save(entry) {
            warn!(query_hash, error = %e, "geocode cache write failed; entry dropped");
        }
    }

    /// Unexpired entries of one type, optionally restricted to one key.
    pub fn entries_by_type(
        &self,
        location_type: LocationType,
        location_key: Option<&str>,
    ) -> Vec<GeocodeCacheEntry> {
        let now = self.clock.now();
        match self.store.scan(location_type) {
            Ok(entries) => {
                let mut found: Vec<_> = entries
                    .into_iter()
                    .filter(|e| !e.is_expired(now))
                    .filter(|e| location_key.is_none_or(|k| e.location_key == k))
                    .collect();
                found.sort_by(|a, b| a.location_key.cmp(&b.location_key));
                found
            }
            Err(e) => {
                warn!(
                    location_type = location_type.as_str(),
                    error = %e,
                    "geocode cache scan failed"
                );
                Vec::new()
            }
        }
    }
}
