/// Data layer: core types, loading, filtering and snapshots.
///
/// Architecture:
/// ```text
///  counts .csv  +  sensor locations .csv        melbviz.parquet
///        │                                             │
///        ▼                                             ▼
///   ┌──────────┐                                ┌──────────┐
///   │  loader   │  parse, derive timestamps,    │ snapshot  │  columnar round-trip
///   └──────────┘  join, sort                    └──────────┘
///        │                                             │
///        └───────────────────┬─────────────────────────┘
///                            ▼
///                  ┌────────────────────┐
///                  │ PedestrianDataset  │  table + facets + active filters
///                  └────────────────────┘
///                            │ filter(year, month, sensor)
///                            ▼
///                  ┌──────────┐
///                  │  filter   │  canonical key → memoized subset
///                  └──────────┘
/// ```

pub mod dataset;
pub mod facets;
pub mod filter;
pub mod loader;
pub mod model;
pub mod snapshot;
