//! Filterable view over the City of Melbourne pedestrian counting data.
//!
//! Load the hourly counts (optionally joined with sensor locations) once,
//! then derive immutable, cheaply filtered [`PedestrianDataset`] handles
//! whose facets feed selection controls and whose tables feed charts.

pub mod chart;
pub mod config;
pub mod data;
pub mod error;

pub use chart::{Chart, ChartData, ChartOptions, PlotKind};
pub use config::{DatasetOptions, Settings};
pub use data::dataset::PedestrianDataset;
pub use data::facets::{sort_months, Facets};
pub use data::filter::{FilterCache, FilterKey, Selection};
pub use data::model::{CanonicalTable, Month, Record, SENTINEL_YEAR};
pub use error::{MelbvizError, Result};
