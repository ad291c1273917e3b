use std::collections::BTreeSet;

use super::model::{CanonicalTable, Month};
use crate::error::{MelbvizError, Result};

/// Distinct values present in a table, in the order selection controls
/// should list them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facets {
    /// Ascending.
    pub years: Vec<i32>,
    /// Calendar order, January first.
    pub months: Vec<Month>,
    /// Alphabetical.
    pub sensors: Vec<String>,
}

impl Facets {
    /// Scan the table once and collect all three facets.
    pub fn compute(table: &CanonicalTable) -> Self {
        let mut years = BTreeSet::new();
        let mut months = BTreeSet::new();
        let mut sensors: BTreeSet<&str> = BTreeSet::new();

        for r in table {
            years.insert(r.year);
            months.insert(r.month);
            sensors.insert(r.sensor_name.as_str());
        }

        Facets {
            years: years.into_iter().collect(),
            months: months.into_iter().collect(),
            sensors: sensors.into_iter().map(str::to_string).collect(),
        }
    }
}

/// Sort month names by calendar position, dropping duplicates.
///
/// `["March", "January", "December"]` becomes `[January, March, December]`.
pub fn sort_months<S: AsRef<str>>(names: &[S]) -> Result<Vec<Month>> {
    let mut months = names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            Month::from_name(name).ok_or_else(|| MelbvizError::invalid_filter("month", name))
        })
        .collect::<Result<Vec<Month>>>()?;
    months.sort();
    months.dedup();
    Ok(months)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::record;

    #[test]
    fn test_sort_months_is_calendar_order() {
        let sorted = sort_months(&["March", "January", "December"]).unwrap();
        assert_eq!(sorted, vec![Month::January, Month::March, Month::December]);

        let names: Vec<&str> = sort_months(&["December", "April", "August", "February"])
            .unwrap()
            .into_iter()
            .map(Month::name)
            .collect();
        assert_eq!(names, vec!["February", "April", "August", "December"]);
    }

    #[test]
    fn test_sort_months_rejects_unknown() {
        assert!(sort_months(&["March", "Brumaire"]).is_err());
    }

    #[test]
    fn test_compute_facets() {
        let table = CanonicalTable::new(vec![
            record("Town Hall (West)", 2019, Month::December, 1, 0, 1),
            record("Bourke St", 2017, Month::April, 1, 0, 1),
            record("Bourke St", 2019, Month::August, 1, 0, 1),
            record("Alfred Place", 2018, Month::April, 1, 0, 1),
        ]);
        let facets = Facets::compute(&table);
        assert_eq!(facets.years, vec![2017, 2018, 2019]);
        assert_eq!(facets.months, vec![Month::April, Month::August, Month::December]);
        assert_eq!(facets.sensors, vec!["Alfred Place", "Bourke St", "Town Hall (West)"]);
    }

    #[test]
    fn test_empty_table_has_empty_facets() {
        let facets = Facets::compute(&CanonicalTable::new(Vec::new()));
        assert_eq!(facets, Facets::default());
    }
}
