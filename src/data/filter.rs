use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use serde_json::Value as JsonValue;

use super::model::{CanonicalTable, Month, Record, TableId};
use crate::error::{MelbvizError, Result};

// ---------------------------------------------------------------------------
// Selection – what the caller picked for one field
// ---------------------------------------------------------------------------

/// The values selected for one filter field.
///
/// `Empty` and an empty `Many` both mean "no constraint", so a selector with
/// nothing picked yet shows everything rather than nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<T: Ord> {
    Empty,
    Single(T),
    Many(BTreeSet<T>),
}

impl<T: Ord> Default for Selection<T> {
    fn default() -> Self {
        Selection::Empty
    }
}

impl<T: Ord> Selection<T> {
    /// Collapse to the order-independent set of selected values.
    pub fn into_set(self) -> BTreeSet<T> {
        match self {
            Selection::Empty => BTreeSet::new(),
            Selection::Single(v) => BTreeSet::from([v]),
            Selection::Many(set) => set,
        }
    }
}

impl<T: FilterScalar> Selection<T> {
    /// Normalize a loosely typed UI value: `null`, a scalar, or an array of
    /// scalars. Anything else is an [`MelbvizError::InvalidFilterValue`].
    pub fn from_json(field: &str, value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::Null => Ok(Selection::Empty),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| T::from_json(field, item))
                .collect::<Result<BTreeSet<T>>>()
                .map(Selection::Many),
            scalar => T::from_json(field, scalar).map(Selection::Single),
        }
    }
}

impl<T: Ord> From<Option<T>> for Selection<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Selection::Empty, Selection::Single)
    }
}

impl<T: Ord> From<Vec<T>> for Selection<T> {
    fn from(values: Vec<T>) -> Self {
        Selection::Many(values.into_iter().collect())
    }
}

impl<T: Ord, const N: usize> From<[T; N]> for Selection<T> {
    fn from(values: [T; N]) -> Self {
        Selection::Many(values.into_iter().collect())
    }
}

impl<T: Ord> From<BTreeSet<T>> for Selection<T> {
    fn from(values: BTreeSet<T>) -> Self {
        Selection::Many(values)
    }
}

impl From<i32> for Selection<i32> {
    fn from(value: i32) -> Self {
        Selection::Single(value)
    }
}

impl From<Month> for Selection<Month> {
    fn from(value: Month) -> Self {
        Selection::Single(value)
    }
}

impl From<&str> for Selection<String> {
    fn from(value: &str) -> Self {
        Selection::Single(value.to_string())
    }
}

impl From<String> for Selection<String> {
    fn from(value: String) -> Self {
        Selection::Single(value)
    }
}

impl From<Vec<&str>> for Selection<String> {
    fn from(values: Vec<&str>) -> Self {
        Selection::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Selection<String> {
    fn from(values: [&str; N]) -> Self {
        Selection::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// A value type one filter field is compared against.
pub trait FilterScalar: Ord + Clone + fmt::Display + Sized {
    /// Convert one JSON scalar; arrays, objects and booleans are rejected.
    fn from_json(field: &str, value: &JsonValue) -> Result<Self>;
}

impl FilterScalar for i32 {
    fn from_json(field: &str, value: &JsonValue) -> Result<Self> {
        let parsed = match value {
            JsonValue::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| MelbvizError::invalid_filter(field, value))
    }
}

impl FilterScalar for Month {
    fn from_json(field: &str, value: &JsonValue) -> Result<Self> {
        value
            .as_str()
            .and_then(Month::from_name)
            .ok_or_else(|| MelbvizError::invalid_filter(field, value))
    }
}

impl FilterScalar for String {
    fn from_json(field: &str, value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::String(s) => Ok(s.clone()),
            JsonValue::Number(n) => Ok(n.to_string()),
            other => Err(MelbvizError::invalid_filter(field, other)),
        }
    }
}

// ---------------------------------------------------------------------------
// FilterKey – canonical, hashable form of a filter request
// ---------------------------------------------------------------------------

/// A filter request with every field reduced to a set. An empty set leaves
/// that field unconstrained. Two requests naming the same values in a
/// different order produce equal keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterKey {
    pub years: BTreeSet<i32>,
    pub months: BTreeSet<Month>,
    pub sensors: BTreeSet<String>,
}

impl FilterKey {
    pub fn new(
        year: impl Into<Selection<i32>>,
        month: impl Into<Selection<Month>>,
        sensor: impl Into<Selection<String>>,
    ) -> Self {
        FilterKey {
            years: year.into().into_set(),
            months: month.into().into_set(),
            sensors: sensor.into().into_set(),
        }
    }

    /// Build a key from loosely typed UI values (see [`Selection::from_json`]).
    pub fn from_json(year: &JsonValue, month: &JsonValue, sensor: &JsonValue) -> Result<Self> {
        Ok(FilterKey {
            years: Selection::<i32>::from_json("year", year)?.into_set(),
            months: Selection::<Month>::from_json("month", month)?.into_set(),
            sensors: Selection::<String>::from_json("sensor", sensor)?.into_set(),
        })
    }

    /// True when no field constrains anything.
    pub fn is_unconstrained(&self) -> bool {
        self.years.is_empty() && self.months.is_empty() && self.sensors.is_empty()
    }

    /// Set-membership test on every constrained field.
    pub fn matches(&self, record: &Record) -> bool {
        (self.years.is_empty() || self.years.contains(&record.year))
            && (self.months.is_empty() || self.months.contains(&record.month))
            && (self.sensors.is_empty() || self.sensors.contains(&record.sensor_name))
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "year={:?} month={:?} sensor={:?}",
            self.years, self.months, self.sensors
        )
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Rows of `table` matching `key`, in their original order.
pub fn filter_table(table: &CanonicalTable, key: &FilterKey) -> CanonicalTable {
    let rows: Vec<Record> = table.iter().filter(|r| key.matches(r)).cloned().collect();
    CanonicalTable::from_sorted(rows)
}

/// Filter through `cache` when one is given. An unconstrained key returns
/// the base table itself.
pub fn filter_cached(
    cache: Option<&FilterCache>,
    table: &Arc<CanonicalTable>,
    key: &FilterKey,
) -> Arc<CanonicalTable> {
    log::debug!("Filter params: {key}");
    if key.is_unconstrained() {
        return Arc::clone(table);
    }
    match cache {
        Some(cache) => cache.get_or_compute(table, key),
        None => Arc::new(filter_table(table, key)),
    }
}

// ---------------------------------------------------------------------------
// FilterCache – memoized filter results
// ---------------------------------------------------------------------------

/// Default number of memoized results kept per cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Memoized filter results keyed by base table identity and [`FilterKey`].
///
/// Safe to share between threads: inserts and lookups go through one mutex,
/// and the filtering itself runs outside the lock.
pub struct FilterCache {
    entries: Mutex<LruCache<(TableId, FilterKey), Arc<CanonicalTable>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for FilterCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl fmt::Debug for FilterCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterCache").field("stats", &self.stats()).finish()
    }
}

impl FilterCache {
    /// A cache holding at most `capacity` results; `0` means unbounded.
    pub fn new(capacity: usize) -> Self {
        let lru = match NonZeroUsize::new(capacity) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            entries: Mutex::new(lru),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the memoized result for `(table, key)`, filtering on a miss.
    pub fn get_or_compute(&self, table: &Arc<CanonicalTable>, key: &FilterKey) -> Arc<CanonicalTable> {
        let cache_key = (table.id(), key.clone());

        if let Some(hit) = self.lock().get(&cache_key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("Filter cache hit for table {:?}", table.id());
            return Arc::clone(hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let computed = Arc::new(filter_table(table, key));

        let mut entries = self.lock();
        // Another caller may have filled the slot while we were filtering.
        if let Some(existing) = entries.get(&cache_key) {
            return Arc::clone(existing);
        }
        entries.put(cache_key, Arc::clone(&computed));
        computed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.lock().len(),
        }
    }

    /// Drop every memoized result. Counters are kept.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<(TableId, FilterKey), Arc<CanonicalTable>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
