use std::path::Path;

use eframe::egui;
use melbviz::{PedestrianDataset, Settings};

use crate::state::AppState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct MelbvizApp {
    pub state: AppState,
}

impl MelbvizApp {
    /// Start with `file` if given, otherwise the configured snapshot, falling
    /// back to the raw CSVs when no snapshot has been built yet.
    pub fn new(settings: &Settings, file: Option<&Path>) -> Self {
        let mut state = AppState::with_options(settings.dataset);

        if let Some(path) = file {
            panels::open_path(&mut state, path);
            return Self { state };
        }

        let snapshot = settings.snapshot_path();
        let counts = settings.counts_csv_path();
        if snapshot.exists() {
            panels::open_path(&mut state, &snapshot);
        } else if counts.exists() {
            let sensors = settings.sensor_csv_path();
            let sensors = sensors.exists().then_some(sensors.as_path());
            match PedestrianDataset::load(&counts, sensors, &settings.dataset) {
                Ok(dataset) => state.set_dataset(dataset),
                Err(e) => {
                    log::error!("Failed to load {}: {e}", counts.display());
                    state.status_message = Some(format!("Error: {e}"));
                }
            }
        } else {
            log::info!(
                "No data found in {}; use File → Open…",
                settings.data_dir.display()
            );
        }
        Self { state }
    }
}

impl eframe::App for MelbvizApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: selectors ----
        egui::SidePanel::left("filter_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: chart ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::chart_view(ui, &self.state);
        });
    }
}
