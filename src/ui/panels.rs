use std::path::Path;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use melbviz::chart::PlotKind;

use crate::state::{AppState, Facet};

// ---------------------------------------------------------------------------
// Left side panel – selectors
// ---------------------------------------------------------------------------

/// Render the left selector panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Melbourne CBD Pedestrian Traffic");
    ui.separator();

    let (Some(root), Some(by_year)) = (&state.dataset, &state.by_year) else {
        ui.label("No dataset loaded.");
        return;
    };

    // Clone what we need so we can mutate state inside the closures.
    let years = root.years().to_vec();
    let months = by_year.months().to_vec();
    let sensors = by_year.sensors().to_vec();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Chart selector ----
            ui.strong("Chart");
            let current = state.plot_kind;
            egui::ComboBox::from_id_salt("plot_kind")
                .selected_text(current.label())
                .show_ui(ui, |ui: &mut Ui| {
                    for kind in PlotKind::ALL {
                        if ui.selectable_label(current == kind, kind.label()).clicked() {
                            state.set_plot_kind(kind);
                        }
                    }
                });
            chart_options(ui, state);
            ui.separator();

            // ---- Per-facet selectors (collapsible) ----
            facet_section(ui, state, Facet::Year, "Year", &years, |state, year| {
                (state.selected_years.contains(year), *year)
            });
            facet_section(ui, state, Facet::Month, "Month", &months, |state, month| {
                (state.selected_months.contains(month), *month)
            });
            facet_section(ui, state, Facet::Sensor, "Sensor", &sensors, |state, sensor| {
                (state.selected_sensors.contains(sensor), sensor.clone())
            });
        });
}

/// Toggles for the options the current chart kind reads.
fn chart_options(ui: &mut Ui, state: &mut AppState) {
    let mut changed = false;
    match state.plot_kind {
        PlotKind::MonthCounts => {
            changed |= ui
                .checkbox(&mut state.chart_options.split_sensors, "Split by sensor")
                .changed();
        }
        PlotKind::SensorTraffic => {
            changed |= ui
                .add(egui::Slider::new(&mut state.chart_options.limit, 1..=20).text("Sensors"))
                .changed();
        }
        PlotKind::StackedSensors => {
            changed |= ui
                .checkbox(&mut state.chart_options.normalised, "Percentage of year")
                .changed();
        }
        _ => {}
    }
    changed |= ui
        .checkbox(&mut state.chart_options.title_filters, "Filters in title")
        .changed();
    if changed {
        state.rebuild_chart();
    }
}

/// One collapsible multi-select. `lookup` reports whether a value is
/// selected and turns it into the toggle argument.
fn facet_section<T: ToString, K>(
    ui: &mut Ui,
    state: &mut AppState,
    facet: Facet,
    title: &str,
    values: &[T],
    lookup: impl Fn(&AppState, &T) -> (bool, K),
) where
    K: FacetToggle,
{
    let n_selected = values.iter().filter(|v| lookup(state, v).0).count();
    let header_text = if n_selected == 0 {
        format!("{title}  (all {})", values.len())
    } else {
        format!("{title}  ({n_selected}/{})", values.len())
    };

    egui::CollapsingHeader::new(RichText::new(header_text).strong())
        .id_salt(title)
        .default_open(facet == Facet::Year)
        .show(ui, |ui: &mut Ui| {
            ui.horizontal(|ui: &mut Ui| {
                if ui.small_button("All").clicked() {
                    state.select_all(facet);
                }
                if ui.small_button("None").clicked() {
                    state.select_none(facet);
                }
            });

            for value in values {
                let (is_selected, key) = lookup(state, value);
                let mut text = RichText::new(value.to_string());
                if facet == Facet::Sensor {
                    if let Some(cm) = &state.color_map {
                        text = text.color(cm.color_for(&value.to_string()));
                    }
                }
                let mut checked = is_selected;
                if ui.checkbox(&mut checked, text).changed() {
                    key.toggle(state);
                }
            }
        });
}

/// A facet value that knows how to toggle itself in the state.
trait FacetToggle {
    fn toggle(self, state: &mut AppState);
}

impl FacetToggle for i32 {
    fn toggle(self, state: &mut AppState) {
        state.toggle_year(self);
    }
}

impl FacetToggle for melbviz::Month {
    fn toggle(self, state: &mut AppState) {
        state.toggle_month(self);
    }
}

impl FacetToggle for String {
    fn toggle(self, state: &mut AppState) {
        state.toggle_sensor(&self);
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            let has_data = state.dataset.is_some();
            if ui
                .add_enabled(has_data, egui::Button::new("Save snapshot…"))
                .clicked()
            {
                save_snapshot_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let (Some(root), Some(view)) = (&state.dataset, &state.view) {
            ui.label(format!(
                "{} hourly counts loaded, {} selected",
                root.len(),
                view.len()
            ));
        }

        if state.loading {
            ui.separator();
            ui.spinner();
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open pedestrian counts")
        .add_filter("Supported files", &["parquet", "pq", "csv"])
        .add_filter("Parquet snapshot", &["parquet", "pq"])
        .add_filter("Hourly counts CSV", &["csv"])
        .pick_file();

    if let Some(path) = file {
        open_path(state, &path);
    }
}

/// Load `path` into the state, reporting failures in the status bar.
pub fn open_path(state: &mut AppState, path: &Path) {
    if let Err(e) = state.load_path(path) {
        log::error!("Failed to load {}: {e:#}", path.display());
        state.status_message = Some(format!("Error: {e:#}"));
        state.loading = false;
    }
}

fn save_snapshot_dialog(state: &mut AppState) {
    let Some(dataset) = &state.dataset else {
        return;
    };
    let file = rfd::FileDialog::new()
        .set_title("Save snapshot")
        .add_filter("Parquet snapshot", &["parquet"])
        .set_file_name("melbviz.parquet")
        .save_file();

    if let Some(path) = file {
        if let Err(e) = dataset.write_snapshot(&path) {
            log::error!("Failed to write snapshot: {e}");
            state.status_message = Some(format!("Error: {e}"));
        }
    }
}
