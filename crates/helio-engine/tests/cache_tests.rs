//! Geocode cache: expiry at read time, last write wins, secondary lookup, store failures.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use helio_engine::cache::{
    CacheStore, Clock, GeocodeCache, GeocodeCacheEntry, InMemoryStore, JsonFileStore,
};
use helio_engine::error::StoreError;
use helio_engine::location::LocationType;
use helio_engine::GeoLocation;

/// Clock that only moves when told to.
struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())))
    }

    fn advance(&self, seconds: i64) {
        let mut now = self.0.lock().unwrap();
        *now += Duration::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Store whose every operation fails.
struct BrokenStore;

impl CacheStore for BrokenStore {
    fn load(&self, _query_hash: &str) -> Result<Option<GeocodeCacheEntry>, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
    fn save(&self, _entry: GeocodeCacheEntry) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
    fn scan(&self, _location_type: LocationType) -> Result<Vec<GeocodeCacheEntry>, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
}

fn paris() -> GeoLocation {
    GeoLocation::new(48.8566, 2.3522, 35.0, "Europe/Paris")
}

fn lyon() -> GeoLocation {
    GeoLocation::new(45.764, 4.8357, 0.0, "Europe/Paris")
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("helio-cache-{}-{}.json", name, std::process::id()))
}

// ── Test 1: hit before expiry ───────────────────────────────────────────

#[test]
fn entry_is_served_until_it_expires() {
    let clock = ManualClock::new();
    let cache = GeocodeCache::new(Arc::new(InMemoryStore::new()), clock.clone());
    cache.put("h1", LocationType::City, "paris|france", &paris(), 60);

    assert_eq!(cache.get("h1"), Some(paris()));
    clock.advance(59);
    assert_eq!(cache.get("h1"), Some(paris()));
    clock.advance(1);
    assert_eq!(cache.get("h1"), None, "expired entries are absent even if still stored");
}

// ── Test 2: overwrite ───────────────────────────────────────────────────

#[test]
fn later_write_wins() {
    let clock = ManualClock::new();
    let cache = GeocodeCache::new(Arc::new(InMemoryStore::new()), clock);
    cache.put("h1", LocationType::City, "paris|france", &paris(), 3600);
    cache.put("h1", LocationType::City, "paris|france", &lyon(), 3600);
    assert_eq!(cache.get("h1"), Some(lyon()));
}

#[test]
fn refresh_extends_expiry() {
    let clock = ManualClock::new();
    let cache = GeocodeCache::new(Arc::new(InMemoryStore::new()), clock.clone());
    cache.put("h1", LocationType::City, "paris|france", &paris(), 60);
    clock.advance(50);
    cache.put("h1", LocationType::City, "paris|france", &paris(), 60);
    clock.advance(50);
    assert_eq!(cache.get("h1"), Some(paris()));
}

// ── Test 3: secondary lookup ────────────────────────────────────────────

#[test]
fn entries_by_type_filters_type_key_and_expiry() {
    let clock = ManualClock::new();
    let cache = GeocodeCache::new(Arc::new(InMemoryStore::new()), clock.clone());
    cache.put("a", LocationType::City, "paris|france", &paris(), 100);
    cache.put("b", LocationType::City, "lyon|france", &lyon(), 10);
    cache.put("c", LocationType::Postal, "75001|fr", &paris(), 100);

    let cities = cache.entries_by_type(LocationType::City, None);
    assert_eq!(cities.len(), 2);
    assert_eq!(cities[0].location_key, "lyon|france");

    let paris_only = cache.entries_by_type(LocationType::City, Some("paris|france"));
    assert_eq!(paris_only.len(), 1);
    assert_eq!(paris_only[0].query_hash, "a");

    clock.advance(10);
    let cities = cache.entries_by_type(LocationType::City, None);
    assert_eq!(cities.len(), 1);

    assert_eq!(cache.entries_by_type(LocationType::Postal, None).len(), 1);
}

// ── Test 4: store failures are not fatal ────────────────────────────────

#[test]
fn broken_store_behaves_like_an_empty_cache() {
    let cache = GeocodeCache::new(Arc::new(BrokenStore), ManualClock::new());
    cache.put("h1", LocationType::City, "paris|france", &paris(), 60);
    assert_eq!(cache.get("h1"), None);
    assert!(cache.entries_by_type(LocationType::City, None).is_empty());
}

// ── Test 5: JSON file store ─────────────────────────────────────────────

#[test]
fn json_file_store_persists_across_instances() {
    let path = temp_path("persist");
    let _ = std::fs::remove_file(&path);
    let clock = ManualClock::new();

    let cache = GeocodeCache::new(Arc::new(JsonFileStore::new(&path)), clock.clone());
    cache.put("h1", LocationType::City, "paris|france", &paris(), 3600);
    cache.put("h2", LocationType::Postal, "69001|fr", &lyon(), 3600);

    let reopened = GeocodeCache::new(Arc::new(JsonFileStore::new(&path)), clock);
    assert_eq!(reopened.get("h1"), Some(paris()));
    assert_eq!(reopened.entries_by_type(LocationType::Postal, None).len(), 1);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn json_file_store_missing_file_is_empty() {
    let store = JsonFileStore::new(temp_path("missing-never-written"));
    assert!(store.load("anything").unwrap().is_none());
    assert!(store.scan(LocationType::City).unwrap().is_empty());
}

#[test]
fn corrupt_json_file_reads_as_miss() {
    let path = temp_path("corrupt");
    std::fs::write(&path, "{ not json").unwrap();
    let cache = GeocodeCache::new(Arc::new(JsonFileStore::new(&path)), ManualClock::new());
    assert_eq!(cache.get("h1"), None);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn entry_serializes_location_type_lowercase() {
    let entry = GeocodeCacheEntry {
        query_hash: "h".into(),
        location_type: LocationType::Postal,
        location_key: "10115|de".into(),
        location: paris(),
        expires_at: Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
    };
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["location_type"], "postal");
    assert_eq!(json["location"]["timezone_id"], "Europe/Paris");
}
