use std::io::Write;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use parquet::file::reader::ChunkReader;
use serde_json::Value as JsonValue;

use super::facets::Facets;
use super::filter::{filter_cached, CacheStats, FilterCache, FilterKey, Selection};
use super::model::{CanonicalTable, Month};
use super::{loader, snapshot};
use crate::config::DatasetOptions;
use crate::error::Result;

// ---------------------------------------------------------------------------
// PedestrianDataset – immutable handle over a canonical table
// ---------------------------------------------------------------------------

/// An immutable view of the pedestrian data: a table, the filter that
/// produced it, and its facets (computed on first access).
///
/// Filtering returns a new handle and leaves `self` untouched. Handles
/// derived from one root share its filter cache.
#[derive(Debug, Clone)]
pub struct PedestrianDataset {
    table: Arc<CanonicalTable>,
    active_filters: FilterKey,
    facets: OnceLock<Facets>,
    cache: Option<Arc<FilterCache>>,
}

impl PedestrianDataset {
    /// Wrap a table with a default-sized filter cache.
    pub fn new(table: CanonicalTable) -> Self {
        Self::with_options(table, &DatasetOptions::default())
    }

    /// Wrap a table, caching filters as `options` says.
    pub fn with_options(table: CanonicalTable, options: &DatasetOptions) -> Self {
        let cache = options
            .cache
            .then(|| Arc::new(FilterCache::new(options.cache_capacity)));
        Self::from_parts(Arc::new(table), FilterKey::default(), cache)
    }

    fn from_parts(
        table: Arc<CanonicalTable>,
        active_filters: FilterKey,
        cache: Option<Arc<FilterCache>>,
    ) -> Self {
        PedestrianDataset {
            table,
            active_filters,
            facets: OnceLock::new(),
            cache,
        }
    }

    /// Load and join the raw CSVs (see [`loader::load`]).
    pub fn load(
        counts_path: &Path,
        sensor_locations_path: Option<&Path>,
        options: &DatasetOptions,
    ) -> Result<Self> {
        let table = loader::load(counts_path, sensor_locations_path)?;
        Ok(Self::with_options(table, options))
    }

    /// Load a cleaned CSV written by [`PedestrianDataset::to_csv`].
    pub fn from_csv(path: &Path, options: &DatasetOptions) -> Result<Self> {
        Ok(Self::with_options(loader::load_clean_csv(path)?, options))
    }

    /// Load a Parquet snapshot written by [`PedestrianDataset::write_snapshot`].
    pub fn from_snapshot(path: &Path, options: &DatasetOptions) -> Result<Self> {
        Ok(Self::with_options(snapshot::read_snapshot_file(path)?, options))
    }

    /// Restore a handle from snapshot bytes produced by [`PedestrianDataset::snapshot`].
    pub fn restore<R: ChunkReader + 'static>(reader: R, options: &DatasetOptions) -> Result<Self> {
        Ok(Self::with_options(snapshot::read_snapshot(reader)?, options))
    }

    // -- Accessors --

    pub fn table(&self) -> &CanonicalTable {
        &self.table
    }

    /// The filter that produced this handle; empty for a root dataset.
    pub fn active_filters(&self) -> &FilterKey {
        &self.active_filters
    }

    pub fn facets(&self) -> &Facets {
        self.facets.get_or_init(|| Facets::compute(&self.table))
    }

    /// Sorted list of years present in this dataset.
    pub fn years(&self) -> &[i32] {
        &self.facets().years
    }

    /// Months present in this dataset, in calendar order.
    pub fn months(&self) -> &[Month] {
        &self.facets().months
    }

    /// Alphabetically sorted sensor names present in this dataset.
    pub fn sensors(&self) -> &[String] {
        &self.facets().sensors
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Hit/miss counters of the shared filter cache, if caching is on.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_deref().map(FilterCache::stats)
    }

    // -- Filtering --

    /// Keep rows matching every given field. `None` or an empty collection
    /// leaves a field unconstrained.
    pub fn filter(
        &self,
        year: impl Into<Selection<i32>>,
        month: impl Into<Selection<Month>>,
        sensor: impl Into<Selection<String>>,
    ) -> Self {
        self.filter_key(FilterKey::new(year, month, sensor))
    }

    /// Filter with values straight from a UI layer (JSON scalars or arrays).
    pub fn filter_json(&self, year: &JsonValue, month: &JsonValue, sensor: &JsonValue) -> Result<Self> {
        Ok(self.filter_key(FilterKey::from_json(year, month, sensor)?))
    }

    /// Filter with an already canonical key.
    pub fn filter_key(&self, key: FilterKey) -> Self {
        let table = filter_cached(self.cache.as_deref(), &self.table, &key);
        Self::from_parts(table, key, self.cache.clone())
    }

    // -- Persistence --

    /// Write the table as a Parquet snapshot to `writer`.
    pub fn snapshot<W: Write + Send>(&self, writer: W) -> Result<()> {
        snapshot::write_snapshot(&self.table, writer)
    }

    pub fn write_snapshot(&self, path: &Path) -> Result<()> {
        snapshot::write_snapshot_file(&self.table, path)
    }

    /// Write the table as CSV, derived timestamps included.
    pub fn to_csv(&self, path: &Path) -> Result<()> {
        loader::write_clean_csv(&self.table, path)
    }
}
