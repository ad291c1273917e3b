use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use super::model::{derive_timestamps, CanonicalTable, Month, Record};
use crate::error::{MelbvizError, Result};

/// Columns the counts CSV must carry.
pub const REQUIRED_COUNT_COLUMNS: [&str; 6] =
    ["Sensor_Name", "Year", "Month", "Mdate", "Time", "Hourly_Counts"];

/// Columns a cleaned CSV written by [`write_clean_csv`] must carry.
pub const REQUIRED_CLEAN_COLUMNS: [&str; 8] = [
    "Sensor_Name",
    "Year",
    "Month",
    "Mdate",
    "Time",
    "Hourly_Counts",
    "datetime",
    "datetime_flat_year",
];

/// Columns the sensor-locations CSV must carry.
pub const REQUIRED_LOCATION_COLUMNS: [&str; 3] = ["sensor_description", "latitude", "longitude"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load the hourly counts, optionally join sensor locations, and return the
/// canonical table sorted by timestamp.
///
/// The join is an inner join of `Sensor_Name` against
/// `sensor_description`: counts from sensors missing from the locations
/// file are dropped.
pub fn load(counts_path: &Path, sensor_locations_path: Option<&Path>) -> Result<CanonicalTable> {
    let mut rows = load_counts(counts_path)?;
    log::info!("Read {} hourly counts from {}", rows.len(), counts_path.display());

    if let Some(locations_path) = sensor_locations_path {
        let locations = load_locations(locations_path)?;
        rows = join_locations(rows, &locations);
    }

    Ok(CanonicalTable::new(rows))
}

/// Read a cleaned table previously written with [`write_clean_csv`].
///
/// Derived timestamps are taken from the file as-is.
pub fn load_clean_csv(path: &Path) -> Result<CanonicalTable> {
    let mut reader = open_csv(path)?;
    let headers = reader
        .headers()
        .map_err(|e| MelbvizError::data_source(path, e))?
        .clone();
    require_columns(&headers, &REQUIRED_CLEAN_COLUMNS, path)?;

    let mut rows = Vec::new();
    for (row_no, result) in reader.deserialize::<Record>().enumerate() {
        let record = result.map_err(|e| MelbvizError::malformed(row_no + 1, "<record>", e))?;
        rows.push(record);
    }
    log::info!("Read {} cleaned rows from {}", rows.len(), path.display());
    Ok(CanonicalTable::new(rows))
}

/// Write the table as CSV, including both derived timestamp columns.
pub fn write_clean_csv(table: &CanonicalTable, path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).map_err(|e| MelbvizError::data_source(path, e))?;
    for record in table {
        writer
            .serialize(record)
            .map_err(|e| MelbvizError::data_source(path, e))?;
    }
    writer.flush().map_err(|e| MelbvizError::data_source(path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Counts CSV
// ---------------------------------------------------------------------------

/// Positions of the counts columns within the header row.
struct CountColumns {
    sensor_name: usize,
    year: usize,
    month: usize,
    mdate: usize,
    time: usize,
    hourly_counts: usize,
    id: Option<usize>,
    sensor_id: Option<usize>,
}

impl CountColumns {
    fn locate(headers: &StringRecord, path: &Path) -> Result<Self> {
        require_columns(headers, &REQUIRED_COUNT_COLUMNS, path)?;
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let required = |name: &str| find(name).unwrap_or_default();
        Ok(CountColumns {
            sensor_name: required("Sensor_Name"),
            year: required("Year"),
            month: required("Month"),
            mdate: required("Mdate"),
            time: required("Time"),
            hourly_counts: required("Hourly_Counts"),
            id: find("ID"),
            sensor_id: find("Sensor_ID"),
        })
    }
}

/// Fail with every column of `required` that `headers` lacks.
fn require_columns(headers: &StringRecord, required: &[&str], path: &Path) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| !headers.iter().any(|h| h.trim() == *name))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MelbvizError::data_source(
            path,
            format!("missing required column(s): {}", missing.join(", ")),
        ))
    }
}

fn load_counts(path: &Path) -> Result<Vec<Record>> {
    let mut reader = open_csv(path)?;
    let headers = reader
        .headers()
        .map_err(|e| MelbvizError::data_source(path, e))?
        .clone();
    let cols = CountColumns::locate(&headers, path)?;

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let row = row_no + 1;
        let record = result.map_err(|e| MelbvizError::data_source(path, format!("row {row}: {e}")))?;
        rows.push(parse_count_row(&record, &cols, row)?);
    }
    Ok(rows)
}

fn parse_count_row(record: &StringRecord, cols: &CountColumns, row: usize) -> Result<Record> {
    let field = |idx: usize| record.get(idx).unwrap_or("").trim();

    let month_text = field(cols.month);
    let month = Month::from_name(month_text).ok_or_else(|| {
        MelbvizError::malformed(row, "Month", format!("'{month_text}' is not a calendar month name"))
    })?;
    let year: i32 = parse_number(field(cols.year), row, "Year")?;
    let mdate: u32 = parse_number(field(cols.mdate), row, "Mdate")?;
    let time: u32 = parse_number(field(cols.time), row, "Time")?;
    let hourly_counts: u64 = parse_number(field(cols.hourly_counts), row, "Hourly_Counts")?;

    if NaiveDate::from_ymd_opt(year, month.number(), mdate).is_none() {
        return Err(MelbvizError::malformed(
            row,
            "Mdate",
            format!("{month} {mdate}, {year} is not a calendar date"),
        ));
    }
    let (datetime, datetime_flat_year) = derive_timestamps(year, month, mdate, time)
        .ok_or_else(|| MelbvizError::malformed(row, "Time", format!("{time} is not an hour of the day")))?;

    let id = match cols.id.map(field).filter(|s| !s.is_empty()) {
        Some(text) => Some(parse_number(text, row, "ID")?),
        None => None,
    };
    let sensor_id = cols
        .sensor_id
        .map(field)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(Record {
        id,
        sensor_id,
        sensor_name: field(cols.sensor_name).to_string(),
        year,
        month,
        mdate,
        time,
        hourly_counts,
        datetime,
        datetime_flat_year,
        latitude: None,
        longitude: None,
    })
}

fn parse_number<T>(text: &str, row: usize, field: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    text.parse::<T>()
        .map_err(|e| MelbvizError::malformed(row, field, format!("'{text}': {e}")))
}

// ---------------------------------------------------------------------------
// Sensor locations CSV
// ---------------------------------------------------------------------------

/// Coordinates for one entry of the locations file.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Location {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// `sensor_description` → every location row carrying that description.
type LocationIndex = HashMap<String, Vec<Location>>;

fn load_locations(path: &Path) -> Result<LocationIndex> {
    let mut reader = open_csv(path)?;
    let headers = reader
        .headers()
        .map_err(|e| MelbvizError::data_source(path, e))?
        .clone();

    let mut idx = [0usize; 3];
    for (slot, name) in idx.iter_mut().zip(REQUIRED_LOCATION_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| MelbvizError::data_source(path, format!("missing required column: {name}")))?;
    }
    let [desc_idx, lat_idx, lon_idx] = idx;

    let mut index = LocationIndex::new();
    for (row_no, result) in reader.records().enumerate() {
        let row = row_no + 1;
        let record = result.map_err(|e| MelbvizError::data_source(path, format!("row {row}: {e}")))?;
        let coord = |i: usize, name: &str| -> Result<Option<f64>> {
            match record.get(i).map(str::trim).filter(|s| !s.is_empty()) {
                Some(text) => parse_number(text, row, name).map(Some),
                None => Ok(None),
            }
        };
        let location = Location {
            latitude: coord(lat_idx, "latitude")?,
            longitude: coord(lon_idx, "longitude")?,
        };
        let description = record.get(desc_idx).unwrap_or("").trim().to_string();
        index.entry(description).or_default().push(location);
    }
    Ok(index)
}

/// Inner join on sensor name. A sensor listed more than once in the
/// locations file yields one output row per listing.
fn join_locations(rows: Vec<Record>, locations: &LocationIndex) -> Vec<Record> {
    let mut dropped: BTreeSet<String> = BTreeSet::new();
    let mut joined = Vec::with_capacity(rows.len());

    for record in rows {
        match locations.get(&record.sensor_name) {
            Some(matches) => {
                for loc in matches {
                    joined.push(Record {
                        latitude: loc.latitude,
                        longitude: loc.longitude,
                        ..record.clone()
                    });
                }
            }
            None => {
                dropped.insert(record.sensor_name);
            }
        }
    }

    if !dropped.is_empty() {
        log::warn!(
            "Dropped counts for {} sensor(s) with no location entry: {:?}",
            dropped.len(),
            dropped
        );
    }
    joined
}

fn open_csv(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::Reader::from_path(path).map_err(|e| MelbvizError::data_source(path, e))
}
