use std::collections::BTreeSet;
use std::path::Path;

use melbviz::chart::{Chart, ChartOptions, PlotKind};
use melbviz::data::model::Month;
use melbviz::{DatasetOptions, PedestrianDataset};

use crate::color::ColorMap;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Which selector a bulk action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Year,
    Month,
    Sensor,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Loaded dataset (None until a file is loaded).
    pub dataset: Option<PedestrianDataset>,

    /// Root filtered by the year selection only; offers the month and
    /// sensor choices that exist in those years.
    pub by_year: Option<PedestrianDataset>,

    /// Root filtered by every selection; what the chart shows.
    pub view: Option<PedestrianDataset>,

    pub selected_years: BTreeSet<i32>,
    pub selected_months: BTreeSet<Month>,
    pub selected_sensors: BTreeSet<String>,

    pub plot_kind: PlotKind,
    pub chart_options: ChartOptions,

    /// Aggregated chart for the current view (cached until something changes).
    pub chart: Option<Chart>,

    /// Sensor colours, stable across filter changes.
    pub color_map: Option<ColorMap>,

    /// How new datasets cache filters.
    pub dataset_options: DatasetOptions,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Whether a file loading operation is in progress.
    pub loading: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            dataset: None,
            by_year: None,
            view: None,
            selected_years: BTreeSet::new(),
            selected_months: BTreeSet::new(),
            selected_sensors: BTreeSet::new(),
            plot_kind: PlotKind::SensorCounts,
            chart_options: ChartOptions::default(),
            chart: None,
            color_map: None,
            dataset_options: DatasetOptions::default(),
            status_message: None,
            loading: false,
        }
    }
}

impl AppState {
    pub fn with_options(dataset_options: DatasetOptions) -> Self {
        Self {
            dataset_options,
            ..Self::default()
        }
    }

    /// Ingest a newly loaded dataset. Starts on the most recent year, with
    /// every month and sensor of that year shown.
    pub fn set_dataset(&mut self, dataset: PedestrianDataset) {
        self.selected_years = dataset.years().last().copied().into_iter().collect();
        self.selected_months.clear();
        self.selected_sensors.clear();
        self.color_map = Some(ColorMap::new(dataset.sensors()));

        self.dataset = Some(dataset);
        self.status_message = None;
        self.loading = false;
        self.refilter();
    }

    /// Load a counts CSV or a Parquet snapshot, chosen by extension.
    pub fn load_path(&mut self, path: &Path) -> anyhow::Result<()> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        self.loading = true;
        let dataset = match ext.as_str() {
            "parquet" | "pq" => PedestrianDataset::from_snapshot(path, &self.dataset_options)?,
            "csv" => PedestrianDataset::load(path, None, &self.dataset_options)?,
            other => {
                self.loading = false;
                anyhow::bail!("Unsupported file extension: .{other}");
            }
        };
        log::info!(
            "Loaded {} hourly counts from {} sensors",
            dataset.len(),
            dataset.sensors().len()
        );
        self.set_dataset(dataset);
        Ok(())
    }

    /// Recompute the filtered handles and the chart after a selection change.
    ///
    /// Month and sensor selections that no longer exist in the chosen years
    /// are dropped, so a stale choice never empties the view.
    pub fn refilter(&mut self) {
        let Some(root) = &self.dataset else {
            return;
        };

        let by_year = root.filter(self.selected_years.clone(), None, None);
        self.selected_months
            .retain(|m| by_year.months().contains(m));
        self.selected_sensors
            .retain(|s| by_year.sensors().contains(s));

        let view = root.filter(
            self.selected_years.clone(),
            self.selected_months.clone(),
            self.selected_sensors.clone(),
        );

        self.by_year = Some(by_year);
        self.view = Some(view);
        self.rebuild_chart();
    }

    /// Re-aggregate the chart for the current view.
    pub fn rebuild_chart(&mut self) {
        self.chart = self
            .view
            .as_ref()
            .and_then(|v| Chart::for_dataset(v, self.plot_kind, &self.chart_options));
    }

    pub fn set_plot_kind(&mut self, kind: PlotKind) {
        if self.plot_kind != kind {
            self.plot_kind = kind;
            self.rebuild_chart();
        }
    }

    pub fn toggle_year(&mut self, year: i32) {
        toggle(&mut self.selected_years, year);
        self.refilter();
    }

    pub fn toggle_month(&mut self, month: Month) {
        toggle(&mut self.selected_months, month);
        self.refilter();
    }

    pub fn toggle_sensor(&mut self, sensor: &str) {
        toggle(&mut self.selected_sensors, sensor.to_string());
        self.refilter();
    }

    /// Select every value currently offered for a facet.
    pub fn select_all(&mut self, facet: Facet) {
        match facet {
            Facet::Year => {
                if let Some(ds) = &self.dataset {
                    self.selected_years = ds.years().iter().copied().collect();
                }
            }
            Facet::Month => {
                if let Some(ds) = &self.by_year {
                    self.selected_months = ds.months().iter().copied().collect();
                }
            }
            Facet::Sensor => {
                if let Some(ds) = &self.by_year {
                    self.selected_sensors = ds.sensors().iter().cloned().collect();
                }
            }
        }
        self.refilter();
    }

    /// Clear a facet's selection, which leaves it unconstrained.
    pub fn select_none(&mut self, facet: Facet) {
        match facet {
            Facet::Year => self.selected_years.clear(),
            Facet::Month => self.selected_months.clear(),
            Facet::Sensor => self.selected_sensors.clear(),
        }
        self.refilter();
    }
}

fn toggle<T: Ord>(set: &mut BTreeSet<T>, value: T) {
    if !set.remove(&value) {
        set.insert(value);
    }
}
