use chrono::{Datelike, NaiveDateTime, Timelike};
use eframe::egui::{Color32, ScrollArea, Ui};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints, Points};
use melbviz::chart::{Chart, ChartData, MonthSeries, Panel, SensorLocation, SensorTotal, StackedSeries};

use crate::color::ColorMap;
use crate::state::AppState;

/// Height of one small-multiples panel.
const PANEL_HEIGHT: f32 = 150.0;

// ---------------------------------------------------------------------------
// Chart view (central panel)
// ---------------------------------------------------------------------------

/// Render the current chart in the central panel.
pub fn chart_view(ui: &mut Ui, state: &AppState) {
    if state.dataset.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a counts CSV or snapshot to begin  (File → Open…)");
        });
        return;
    }

    let Some(chart) = &state.chart else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Nothing to show for the current selection");
        });
        return;
    };

    let fallback = ColorMap::new::<&str>(&[]);
    let colors = state.color_map.as_ref().unwrap_or(&fallback);

    ui.vertical_centered(|ui: &mut Ui| {
        ui.heading(&chart.title);
    });
    ui.separator();
    draw_chart(ui, chart, colors);
}

fn draw_chart(ui: &mut Ui, chart: &Chart, colors: &ColorMap) {
    match &chart.data {
        ChartData::RankedBars(totals) => ranked_bars(ui, totals, colors),
        ChartData::MonthBars(series) => month_bars(ui, series, colors),
        ChartData::SensorPanels(panels) => {
            let origin = panels
                .iter()
                .filter_map(|p| p.points.first().map(|(ts, _)| *ts))
                .min()
                .unwrap_or_default();
            small_multiples(
                ui,
                panels,
                "Days since first count",
                |p| colors.color_for(&p.label),
                |ts| (ts - origin).num_minutes() as f64 / (24.0 * 60.0),
            );
        }
        ChartData::YearPanels { sensor, panels } => {
            let color = colors.color_for(sensor);
            small_multiples(ui, panels, "Day of year", |_| color, day_of_year);
        }
        ChartData::SensorMap(located) => sensor_map(ui, located, colors),
        ChartData::StackedShares(series) => stacked_area(ui, series, colors),
    }
}

fn ranked_bars(ui: &mut Ui, totals: &[SensorTotal], colors: &ColorMap) {
    let bars: Vec<Bar> = totals
        .iter()
        .enumerate()
        .map(|(i, t)| {
            Bar::new(i as f64, t.total as f64)
                .name(&t.sensor)
                .fill(colors.color_for(&t.sensor))
        })
        .collect();

    Plot::new("sensor_counts")
        .x_axis_label("Total Counts")
        .allow_drag(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).horizontal().name("Total Counts"));
        });
}

fn month_bars(ui: &mut Ui, series: &[MonthSeries], colors: &ColorMap) {
    let n = series.len().max(1) as f64;
    let width = 0.8 / n;

    Plot::new("month_counts")
        .legend(Legend::default())
        .y_axis_label("Total Counts")
        .x_axis_label("Month (1 = January)")
        .show(ui, |plot_ui| {
            for (i, s) in series.iter().enumerate() {
                let offset = (i as f64 - (n - 1.0) / 2.0) * width;
                let bars: Vec<Bar> = s
                    .totals
                    .iter()
                    .map(|(month, total)| {
                        Bar::new(month.number() as f64 + offset, *total as f64)
                            .width(width)
                            .name(month.name())
                    })
                    .collect();
                let label = s.label.clone().unwrap_or_else(|| "All sensors".to_string());
                let color = s
                    .label
                    .as_deref()
                    .map(|l| colors.color_for(l))
                    .unwrap_or(Color32::LIGHT_BLUE);
                plot_ui.bar_chart(BarChart::new(bars).name(label).color(color));
            }
        });
}

/// One stacked line plot per panel, sharing the x transform.
fn small_multiples(
    ui: &mut Ui,
    panels: &[Panel],
    x_label: &str,
    color_of: impl Fn(&Panel) -> Color32,
    x_of: impl Fn(NaiveDateTime) -> f64,
) {
    ScrollArea::vertical().show(ui, |ui: &mut Ui| {
        for panel in panels {
            ui.strong(&panel.label);
            let points: PlotPoints = panel
                .points
                .iter()
                .map(|(ts, count)| [x_of(*ts), *count as f64])
                .collect();

            Plot::new(("panel", panel.label.as_str()))
                .height(PANEL_HEIGHT)
                .x_axis_label(x_label)
                .allow_scroll(false)
                .show(ui, |plot_ui| {
                    plot_ui.line(
                        Line::new(points)
                            .name(&panel.label)
                            .color(color_of(panel))
                            .width(1.5),
                    );
                });
        }
    });
}

/// Fractional day of year on the flattened axis: 1.0 is midnight, 1 January.
fn day_of_year(ts: NaiveDateTime) -> f64 {
    ts.ordinal() as f64 + ts.hour() as f64 / 24.0
}

fn sensor_map(ui: &mut Ui, located: &[SensorLocation], colors: &ColorMap) {
    let max_total = located.iter().map(|l| l.total).max().unwrap_or(1).max(1) as f64;

    Plot::new("sensor_map")
        .legend(Legend::default())
        .data_aspect(1.0)
        .x_axis_label("Longitude")
        .y_axis_label("Latitude")
        .show(ui, |plot_ui| {
            for l in located {
                let radius = 3.0 + 22.0 * (l.total as f64 / max_total).sqrt() as f32;
                plot_ui.points(
                    Points::new(vec![[l.longitude, l.latitude]])
                        .radius(radius)
                        .name(format!("{} ({})", l.sensor, l.total))
                        .color(colors.color_for(&l.sensor)),
                );
            }
        });
}

fn stacked_area(ui: &mut Ui, series: &[StackedSeries], colors: &ColorMap) {
    // Running totals per year; each series is drawn at the top of its band.
    let mut stacked: Vec<(String, Vec<[f64; 2]>)> = Vec::with_capacity(series.len());
    let mut base: std::collections::BTreeMap<i32, f64> = std::collections::BTreeMap::new();
    for s in series {
        let tops = s
            .values
            .iter()
            .map(|(year, v)| {
                let top = base.entry(*year).or_default();
                *top += v;
                [*year as f64, *top]
            })
            .collect();
        stacked.push((s.sensor.clone(), tops));
    }

    Plot::new("stacked_sensors")
        .legend(Legend::default())
        .x_axis_label("Year")
        .show(ui, |plot_ui| {
            // Highest band first so lower fills paint over it.
            for (sensor, tops) in stacked.into_iter().rev() {
                plot_ui.line(
                    Line::new(PlotPoints::from(tops))
                        .name(&sensor)
                        .color(colors.color_for(&sensor))
                        .fill(0.0),
                );
            }
        });
}
