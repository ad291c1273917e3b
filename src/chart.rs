//! Chart-ready aggregations of a pedestrian table.
//!
//! Each [`PlotKind`] reduces a table to a [`ChartData`] value that a renderer
//! draws however it likes. Nothing here knows about pixels or widgets.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;

use crate::data::dataset::PedestrianDataset;
use crate::data::filter::FilterKey;
use crate::data::model::{CanonicalTable, Month};
use crate::error::{MelbvizError, Result};

// ---------------------------------------------------------------------------
// PlotKind – the registry of chart kinds
// ---------------------------------------------------------------------------

/// The chart kinds the dashboard can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlotKind {
    /// Horizontal bars of total count per sensor, smallest first.
    SensorCounts,
    /// Total count per calendar month, optionally one bar group per sensor.
    MonthCounts,
    /// Hourly series of the busiest sensors, one panel each.
    SensorTraffic,
    /// Hourly series of one sensor, one panel per year on a shared axis.
    YearTraffic,
    /// Sensor totals placed at their coordinates.
    SensorMap,
    /// Each sensor's share of the yearly total, stacked.
    StackedSensors,
}

impl PlotKind {
    pub const ALL: [PlotKind; 6] = [
        PlotKind::SensorCounts,
        PlotKind::MonthCounts,
        PlotKind::SensorTraffic,
        PlotKind::YearTraffic,
        PlotKind::SensorMap,
        PlotKind::StackedSensors,
    ];

    /// Registry name, e.g. `"sensor_counts"`.
    pub fn name(self) -> &'static str {
        match self {
            PlotKind::SensorCounts => "sensor_counts",
            PlotKind::MonthCounts => "month_counts",
            PlotKind::SensorTraffic => "sensor_traffic",
            PlotKind::YearTraffic => "year_traffic",
            PlotKind::SensorMap => "sensor_map",
            PlotKind::StackedSensors => "stacked_sensors",
        }
    }

    /// Human-readable label for selectors.
    pub fn label(self) -> &'static str {
        match self {
            PlotKind::SensorCounts => "Ranked sensors",
            PlotKind::MonthCounts => "Monthly totals",
            PlotKind::SensorTraffic => "Traffic by sensor",
            PlotKind::YearTraffic => "Traffic by year",
            PlotKind::SensorMap => "Sensor map",
            PlotKind::StackedSensors => "Sensor share by year",
        }
    }
}

impl fmt::Display for PlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PlotKind {
    type Err = MelbvizError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PlotKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| MelbvizError::UnknownPlotKind {
                kind: s.to_string(),
                available: PlotKind::ALL
                    .iter()
                    .map(|k| format!("'{k}'"))
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

// ---------------------------------------------------------------------------
// Options and output
// ---------------------------------------------------------------------------

/// Style knobs shared by all chart kinds; each kind reads the ones it uses.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    /// Append the active month/year filters to the title.
    pub title_filters: bool,
    /// `month_counts`: one series per sensor instead of a single total.
    pub split_sensors: bool,
    /// `sensor_traffic`: how many of the busiest sensors to show.
    pub limit: usize,
    /// `stacked_sensors`: percentages of the yearly total instead of raw sums.
    pub normalised: bool,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title_filters: true,
            split_sensors: false,
            limit: 5,
            normalised: true,
        }
    }
}

/// A titled chart ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub kind: PlotKind,
    pub title: String,
    pub data: ChartData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorTotal {
    pub sensor: String,
    pub total: u64,
}

/// Monthly totals; `label` is the sensor when split, otherwise `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthSeries {
    pub label: Option<String>,
    pub totals: Vec<(Month, u64)>,
}

/// One small-multiples panel of an hourly series.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub label: String,
    pub points: Vec<(NaiveDateTime, u64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorLocation {
    pub sensor: String,
    pub total: u64,
    pub latitude: f64,
    pub longitude: f64,
}

/// One sensor's per-year values in a stacked area chart.
#[derive(Debug, Clone, PartialEq)]
pub struct StackedSeries {
    pub sensor: String,
    pub values: Vec<(i32, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    RankedBars(Vec<SensorTotal>),
    MonthBars(Vec<MonthSeries>),
    SensorPanels(Vec<Panel>),
    /// Panels are years, newest first, plotted on the flattened-year axis.
    YearPanels { sensor: String, panels: Vec<Panel> },
    SensorMap(Vec<SensorLocation>),
    StackedShares(Vec<StackedSeries>),
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

impl Chart {
    /// Chart `dataset` as `kind`, titled with the filters that produced it.
    pub fn for_dataset(
        dataset: &PedestrianDataset,
        kind: PlotKind,
        options: &ChartOptions,
    ) -> Option<Chart> {
        build_chart(dataset.table(), kind, options, dataset.active_filters())
    }

    /// Like [`Chart::for_dataset`], looking the kind up by its registry name.
    pub fn for_dataset_named(
        dataset: &PedestrianDataset,
        kind: &str,
        options: &ChartOptions,
    ) -> Result<Option<Chart>> {
        let kind: PlotKind = kind.parse()?;
        Ok(Chart::for_dataset(dataset, kind, options))
    }
}

/// Build a chart of `kind` from `table`.
///
/// Returns `None` when there is nothing to draw: an empty table, a
/// `sensor_traffic` limit of zero, or for `sensor_map` a table without any
/// located sensor.
pub fn build_chart(
    table: &CanonicalTable,
    kind: PlotKind,
    options: &ChartOptions,
    filters: &FilterKey,
) -> Option<Chart> {
    if table.is_empty() {
        return None;
    }

    let (title, data) = match kind {
        PlotKind::SensorCounts => (
            "Ranked Sensor Traffic".to_string(),
            ChartData::RankedBars(sensor_counts(table)),
        ),
        PlotKind::MonthCounts => (
            "Monthly Sensor Traffic".to_string(),
            ChartData::MonthBars(month_counts(table, options.split_sensors)),
        ),
        PlotKind::SensorTraffic => {
            let panels = sensor_traffic(table, options.limit);
            if panels.is_empty() {
                return None;
            }
            (
                "Hourly Pedestrian Traffic by Sensor".to_string(),
                ChartData::SensorPanels(panels),
            )
        }
        PlotKind::YearTraffic => {
            let (sensor, panels) = year_traffic(table)?;
            (
                format!("{sensor} Hourly Footfall Counts by year"),
                ChartData::YearPanels { sensor, panels },
            )
        }
        PlotKind::SensorMap => {
            let located = sensor_map(table);
            if located.is_empty() {
                return None;
            }
            ("Sensor Traffic".to_string(), ChartData::SensorMap(located))
        }
        PlotKind::StackedSensors => (
            "Proportion of footfalls for each sensor by year".to_string(),
            ChartData::StackedShares(stacked_sensors(table, options.normalised)),
        ),
    };

    let title = if options.title_filters {
        title_with_filters(&title, filters)
    } else {
        title
    };
    Some(Chart { kind, title, data })
}

/// Append the active month and year selections to `title`:
/// `"Ranked Sensor Traffic for March, 2019"`. Sensor selections are not
/// part of the label.
pub fn title_with_filters(title: &str, filters: &FilterKey) -> String {
    fn join<T: fmt::Display>(values: &BTreeSet<T>) -> Option<String> {
        (!values.is_empty()).then(|| {
            values
                .iter()
                .map(T::to_string)
                .collect::<Vec<_>>()
                .join("/")
        })
    }

    let parts: Vec<String> = [join(&filters.months), join(&filters.years)]
        .into_iter()
        .flatten()
        .collect();
    if parts.is_empty() {
        title.to_string()
    } else {
        format!("{title} for {}", parts.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Aggregations
// ---------------------------------------------------------------------------

fn totals_by_sensor(table: &CanonicalTable) -> BTreeMap<&str, u64> {
    let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
    for r in table {
        *totals.entry(r.sensor_name.as_str()).or_default() += r.hourly_counts;
    }
    totals
}

fn sensor_counts(table: &CanonicalTable) -> Vec<SensorTotal> {
    let mut ranked: Vec<SensorTotal> = totals_by_sensor(table)
        .into_iter()
        .map(|(sensor, total)| SensorTotal {
            sensor: sensor.to_string(),
            total,
        })
        .collect();
    ranked.sort_by_key(|s| s.total);
    ranked
}

fn month_counts(table: &CanonicalTable, split_sensors: bool) -> Vec<MonthSeries> {
    let mut grouped: BTreeMap<Option<&str>, BTreeMap<Month, u64>> = BTreeMap::new();
    for r in table {
        let label = split_sensors.then_some(r.sensor_name.as_str());
        *grouped.entry(label).or_default().entry(r.month).or_default() += r.hourly_counts;
    }
    grouped
        .into_iter()
        .map(|(label, totals)| MonthSeries {
            label: label.map(str::to_string),
            totals: totals.into_iter().collect(),
        })
        .collect()
}

fn sensor_traffic(table: &CanonicalTable, limit: usize) -> Vec<Panel> {
    let mut busiest: Vec<(&str, u64)> = totals_by_sensor(table).into_iter().collect();
    busiest.sort_by(|a, b| b.1.cmp(&a.1));
    busiest.truncate(limit);

    busiest
        .into_iter()
        .map(|(sensor, _)| Panel {
            label: sensor.to_string(),
            points: table
                .iter()
                .filter(|r| r.sensor_name == sensor)
                .map(|r| (r.datetime, r.hourly_counts))
                .collect(),
        })
        .collect()
}

/// The first sensor in the table, split into one panel per year.
fn year_traffic(table: &CanonicalTable) -> Option<(String, Vec<Panel>)> {
    let sensor = table.rows().first()?.sensor_name.clone();

    let mut by_year: BTreeMap<i32, Vec<(NaiveDateTime, u64)>> = BTreeMap::new();
    for r in table.iter().filter(|r| r.sensor_name == sensor) {
        by_year
            .entry(r.year)
            .or_default()
            .push((r.datetime_flat_year, r.hourly_counts));
    }

    let panels = by_year
        .into_iter()
        .rev()
        .map(|(year, points)| Panel {
            label: year.to_string(),
            points,
        })
        .collect();
    Some((sensor, panels))
}

fn sensor_map(table: &CanonicalTable) -> Vec<SensorLocation> {
    let mut first_seen: BTreeMap<&str, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for r in table {
        first_seen
            .entry(r.sensor_name.as_str())
            .or_insert((r.latitude, r.longitude));
    }

    totals_by_sensor(table)
        .into_iter()
        .filter_map(|(sensor, total)| match first_seen.get(sensor) {
            Some(&(Some(latitude), Some(longitude))) => Some(SensorLocation {
                sensor: sensor.to_string(),
                total,
                latitude,
                longitude,
            }),
            _ => None,
        })
        .collect()
}

fn stacked_sensors(table: &CanonicalTable, normalised: bool) -> Vec<StackedSeries> {
    let mut sums: BTreeMap<&str, BTreeMap<i32, u64>> = BTreeMap::new();
    let mut year_totals: BTreeMap<i32, u64> = BTreeMap::new();
    for r in table {
        *sums
            .entry(r.sensor_name.as_str())
            .or_default()
            .entry(r.year)
            .or_default() += r.hourly_counts;
        *year_totals.entry(r.year).or_default() += r.hourly_counts;
    }

    sums.into_iter()
        .map(|(sensor, years)| StackedSeries {
            sensor: sensor.to_string(),
            values: years
                .into_iter()
                .map(|(year, sum)| {
                    let value = match year_totals.get(&year) {
                        Some(&total) if normalised && total > 0 => {
                            100.0 * sum as f64 / total as f64
                        }
                        Some(_) if normalised => 0.0,
                        _ => sum as f64,
                    };
                    (year, value)
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::record;

    fn sample() -> CanonicalTable {
        let mut rows = vec![
            record("A", 2018, Month::March, 1, 9, 10),
            record("B", 2018, Month::March, 1, 9, 30),
            record("A", 2019, Month::January, 2, 9, 5),
            record("C", 2019, Month::January, 2, 10, 100),
            record("A", 2019, Month::March, 3, 9, 15),
        ];
        rows[0].latitude = Some(-37.81);
        rows[0].longitude = Some(144.96);
        CanonicalTable::new(rows)
    }

    #[test]
    fn test_plot_kind_lookup() {
        assert_eq!("year_traffic".parse::<PlotKind>().unwrap(), PlotKind::YearTraffic);

        let err = "pie".parse::<PlotKind>().unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, MelbvizError::UnknownPlotKind { .. }));
        for kind in PlotKind::ALL {
            assert!(msg.contains(kind.name()), "{msg} should list {kind}");
        }
    }

    #[test]
    fn test_empty_table_gives_no_chart() {
        let empty = CanonicalTable::new(Vec::new());
        for kind in PlotKind::ALL {
            assert!(build_chart(&empty, kind, &ChartOptions::default(), &FilterKey::default()).is_none());
        }
    }

    #[test]
    fn test_sensor_counts_ranked_ascending() {
        let chart = build_chart(&sample(), PlotKind::SensorCounts, &ChartOptions::default(), &FilterKey::default())
            .unwrap();
        let ChartData::RankedBars(bars) = chart.data else {
            panic!("expected ranked bars");
        };
        let order: Vec<(&str, u64)> = bars.iter().map(|b| (b.sensor.as_str(), b.total)).collect();
        assert_eq!(order, vec![("A", 30), ("B", 30), ("C", 100)]);
        assert_eq!(chart.title, "Ranked Sensor Traffic");
    }

    #[test]
    fn test_month_counts_calendar_order() {
        let series = month_counts(&sample(), false);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].totals, vec![(Month::January, 105), (Month::March, 55)]);

        let split = month_counts(&sample(), true);
        let labels: Vec<_> = split.iter().map(|s| s.label.as_deref()).collect();
        assert_eq!(labels, vec![Some("A"), Some("B"), Some("C")]);
    }

    #[test]
    fn test_sensor_traffic_limits_to_busiest() {
        let panels = sensor_traffic(&sample(), 2);
        let labels: Vec<_> = panels.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels[0], "C");
        assert_eq!(panels.len(), 2);
        assert!(panels.iter().all(|p| !p.points.is_empty()));
    }

    #[test]
    fn test_year_traffic_uses_flat_axis() {
        let (sensor, panels) = year_traffic(&sample()).unwrap();
        assert_eq!(sensor, "A");
        assert_eq!(panels[0].label, "2019");
        assert_eq!(panels[1].label, "2018");
        assert!(panels
            .iter()
            .flat_map(|p| &p.points)
            .all(|(ts, _)| ts.format("%Y").to_string() == "2000"));
    }

    #[test]
    fn test_sensor_map_skips_unlocated() {
        let located = sensor_map(&sample());
        assert_eq!(located.len(), 1);
        assert_eq!(located[0].sensor, "A");
        assert_eq!(located[0].total, 30);
    }

    #[test]
    fn test_stacked_shares_sum_to_hundred() {
        let series = stacked_sensors(&sample(), true);
        let share_2019: f64 = series
            .iter()
            .flat_map(|s| &s.values)
            .filter(|(year, _)| *year == 2019)
            .map(|(_, v)| v)
            .sum();
        assert!((share_2019 - 100.0).abs() < 1e-9);

        let raw = stacked_sensors(&sample(), false);
        assert_eq!(raw[0].values, vec![(2018, 10.0), (2019, 20.0)]);
    }

    #[test]
    fn test_zero_limit_gives_no_chart() {
        let options = ChartOptions {
            limit: 0,
            ..ChartOptions::default()
        };
        assert!(build_chart(&sample(), PlotKind::SensorTraffic, &options, &FilterKey::default()).is_none());
    }

    #[test]
    fn test_dataset_chart_uses_provenance() {
        let ds = PedestrianDataset::new(sample()).filter(2019, Month::March, None);
        let chart = Chart::for_dataset(&ds, PlotKind::SensorCounts, &ChartOptions::default()).unwrap();
        assert_eq!(chart.title, "Ranked Sensor Traffic for March, 2019");

        let err = Chart::for_dataset_named(&ds, "violin", &ChartOptions::default()).unwrap_err();
        assert!(matches!(err, MelbvizError::UnknownPlotKind { .. }));

        let empty = ds.filter(1999, None, None);
        assert!(Chart::for_dataset_named(&empty, "sensor_counts", &ChartOptions::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_title_with_filters() {
        let none = FilterKey::default();
        assert_eq!(title_with_filters("Sensor Traffic", &none), "Sensor Traffic");

        let key = FilterKey::new(2019, Month::March, "A");
        assert_eq!(
            title_with_filters("Sensor Traffic", &key),
            "Sensor Traffic for March, 2019"
        );

        let key = FilterKey::new(vec![2018, 2019], None, None);
        assert_eq!(title_with_filters("T", &key), "T for 2018/2019");
    }
}
