use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Month – calendar month as it appears in the `Month` column
// ---------------------------------------------------------------------------

/// A calendar month. Variants are declared in calendar order so the derived
/// `Ord` sorts January…December rather than alphabetically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Month {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::January,
        Month::February,
        Month::March,
        Month::April,
        Month::May,
        Month::June,
        Month::July,
        Month::August,
        Month::September,
        Month::October,
        Month::November,
        Month::December,
    ];

    /// Full English month name, e.g. `"March"`.
    pub fn name(self) -> &'static str {
        match self {
            Month::January => "January",
            Month::February => "February",
            Month::March => "March",
            Month::April => "April",
            Month::May => "May",
            Month::June => "June",
            Month::July => "July",
            Month::August => "August",
            Month::September => "September",
            Month::October => "October",
            Month::November => "November",
            Month::December => "December",
        }
    }

    /// Month number, 1–12.
    pub fn number(self) -> u32 {
        self as u32 + 1
    }

    /// Parse a full month name. Case-insensitive, surrounding whitespace ignored.
    pub fn from_name(name: &str) -> Option<Month> {
        let name = name.trim();
        Month::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Month {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Month::from_name(s).ok_or_else(|| format!("'{s}' is not a calendar month name"))
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Record – one row of the canonical table
// ---------------------------------------------------------------------------

/// Year used for the flattened-year timestamp. A leap year, so 29 February
/// from any year still has a place on the shared axis.
pub const SENTINEL_YEAR: i32 = 2000;

/// One hourly count from one sensor.
///
/// Field names on disk follow the City of Melbourne export
/// (`Sensor_Name`, `Mdate`, `Hourly_Counts`, …).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "ID")]
    pub id: Option<i64>,
    #[serde(rename = "Sensor_ID")]
    pub sensor_id: Option<String>,
    #[serde(rename = "Sensor_Name")]
    pub sensor_name: String,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: Month,
    /// Day of month.
    #[serde(rename = "Mdate")]
    pub mdate: u32,
    /// Hour of day, 0–23.
    #[serde(rename = "Time")]
    pub time: u32,
    #[serde(rename = "Hourly_Counts")]
    pub hourly_counts: u64,
    pub datetime: NaiveDateTime,
    /// Same month/day/hour as `datetime`, but in [`SENTINEL_YEAR`].
    pub datetime_flat_year: NaiveDateTime,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Build the absolute and flattened-year timestamps for a count.
///
/// Returns `None` when the day or hour does not exist for that month/year.
pub fn derive_timestamps(
    year: i32,
    month: Month,
    mdate: u32,
    time: u32,
) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let absolute = NaiveDate::from_ymd_opt(year, month.number(), mdate)?.and_hms_opt(time, 0, 0)?;
    let flat = NaiveDate::from_ymd_opt(SENTINEL_YEAR, month.number(), mdate)?
        .and_hms_opt(time, 0, 0)?;
    Some((absolute, flat))
}

// ---------------------------------------------------------------------------
// CanonicalTable – rows sorted by absolute timestamp
// ---------------------------------------------------------------------------

/// Identity of a table instance, used to key the filter cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u64);

impl TableId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TableId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The joined pedestrian dataset, or a filtered subset of it.
///
/// Immutable once built. Equality compares rows only, never identity.
#[derive(Debug)]
pub struct CanonicalTable {
    id: TableId,
    rows: Vec<Record>,
}

impl CanonicalTable {
    /// Build a table, sorting rows by absolute timestamp. The sort is stable,
    /// so rows sharing a timestamp keep their input order.
    pub fn new(mut rows: Vec<Record>) -> Self {
        rows.sort_by_key(|r| r.datetime);
        Self::from_sorted(rows)
    }

    /// Build a table from rows already in timestamp order.
    pub(crate) fn from_sorted(rows: Vec<Record>) -> Self {
        debug_assert!(rows.windows(2).all(|w| w[0].datetime <= w[1].datetime));
        CanonicalTable {
            id: TableId::next(),
            rows,
        }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.rows.iter()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl PartialEq for CanonicalTable {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
    }
}

impl<'a> IntoIterator for &'a CanonicalTable {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Compact row constructor for tests across the crate.
    pub(crate) fn record(sensor: &str, year: i32, month: Month, mdate: u32, time: u32, count: u64) -> Record {
        let (datetime, datetime_flat_year) =
            derive_timestamps(year, month, mdate, time).expect("valid test date");
        Record {
            id: None,
            sensor_id: None,
            sensor_name: sensor.to_string(),
            year,
            month,
            mdate,
            time,
            hourly_counts: count,
            datetime,
            datetime_flat_year,
            latitude: None,
            longitude: None,
        }
    }

    #[test]
    fn test_month_parse_and_order() {
        assert_eq!(Month::from_name("march"), Some(Month::March));
        assert_eq!(Month::from_name(" December "), Some(Month::December));
        assert_eq!(Month::from_name("Mar"), None);
        assert_eq!(Month::March.number(), 3);
        assert!(Month::April > Month::February);
        assert!("Smarch".parse::<Month>().is_err());
    }

    #[test]
    fn test_derive_timestamps() {
        let (abs, flat) = derive_timestamps(2019, Month::March, 5, 14).unwrap();
        assert_eq!(abs.to_string(), "2019-03-05 14:00:00");
        assert_eq!(flat.to_string(), "2000-03-05 14:00:00");

        // 29 February only exists in leap years, but always on the flat axis.
        assert!(derive_timestamps(2019, Month::February, 29, 0).is_none());
        let (_, flat) = derive_timestamps(2020, Month::February, 29, 23).unwrap();
        assert_eq!(flat.to_string(), "2000-02-29 23:00:00");

        assert!(derive_timestamps(2019, Month::April, 31, 0).is_none());
        assert!(derive_timestamps(2019, Month::April, 1, 24).is_none());
    }

    #[test]
    fn test_table_sorts_and_compares_by_rows() {
        let late = record("A", 2019, Month::May, 1, 0, 1);
        let early = record("B", 2018, Month::May, 1, 0, 2);
        let t1 = CanonicalTable::new(vec![late.clone(), early.clone()]);
        let t2 = CanonicalTable::new(vec![early.clone(), late.clone()]);

        assert_eq!(t1.rows()[0].sensor_name, "B");
        assert_ne!(t1.id(), t2.id());
        assert_eq!(t1, t2);
    }
}
