use std::io::Write;
use std::sync::Arc;

use melbviz::chart::{Chart, ChartData, ChartOptions, PlotKind};
use melbviz::{DatasetOptions, MelbvizError, Month, PedestrianDataset, SENTINEL_YEAR};
use tempfile::{NamedTempFile, TempDir};

const COUNTS: &str = "\
ID,Date_Time,Year,Month,Mdate,Day,Time,Sensor_ID,Sensor_Name,Hourly_Counts
1,\"November 01, 2019 05:00:00 PM\",2019,November,1,Friday,17,4,Town Hall (West),2231
2,\"March 05, 2019 02:00:00 PM\",2019,March,5,Tuesday,14,3,Bourke St,120
3,\"March 05, 2018 02:00:00 PM\",2018,March,5,Monday,14,3,Bourke St,95
4,\"March 05, 2018 02:00:00 PM\",2018,March,5,Monday,14,4,Town Hall (West),1804
5,\"January 10, 2019 08:00:00 AM\",2019,January,10,Thursday,8,9,Southern Cross Station,641
6,\"December 24, 2018 11:00:00 PM\",2018,December,24,Monday,23,4,Town Hall (West),412
7,\"March 06, 2019 09:00:00 AM\",2019,March,6,Wednesday,9,99,Unlisted Sensor,12
";

const LOCATIONS: &str = "\
sensor_id,sensor_description,sensor_name,installation_date,status,latitude,longitude,location
3,Bourke St,Bou292_T,2009/03/24,A,-37.81380668,144.96516718,\"(-37.81380668, 144.96516718)\"
4,Town Hall (West),Swa123_T,2009/03/23,A,-37.81487988,144.9660878,\"(-37.81487988, 144.9660878)\"
9,Southern Cross Station,Col700_T,2009/03/23,A,-37.81798049,144.95189256,\"(-37.81798049, 144.95189256)\"
";

fn csv_file(contents: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    write!(tmp, "{contents}").unwrap();
    tmp
}

fn load_joined() -> PedestrianDataset {
    let counts = csv_file(COUNTS);
    let locations = csv_file(LOCATIONS);
    PedestrianDataset::load(counts.path(), Some(locations.path()), &DatasetOptions::default())
        .unwrap()
}

#[test]
fn test_load_join_and_sort() {
    let ds = load_joined();

    // The unlisted sensor is dropped by the location join.
    assert_eq!(ds.len(), 6);
    assert!(!ds.sensors().iter().any(|s| s == "Unlisted Sensor"));
    assert!(ds.table().iter().all(|r| r.latitude.is_some() && r.longitude.is_some()));

    let stamps: Vec<_> = ds.table().iter().map(|r| r.datetime).collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    assert!(ds
        .table()
        .iter()
        .all(|r| r.datetime_flat_year.format("%Y").to_string() == SENTINEL_YEAR.to_string()));

    assert_eq!(ds.years(), &[2018, 2019]);
    assert_eq!(
        ds.months(),
        &[Month::January, Month::March, Month::November, Month::December]
    );
    assert_eq!(
        ds.sensors(),
        &["Bourke St", "Southern Cross Station", "Town Hall (West)"]
    );
}

#[test]
fn test_load_without_locations_keeps_everything() {
    let counts = csv_file(COUNTS);
    let ds = PedestrianDataset::load(counts.path(), None, &DatasetOptions::default()).unwrap();
    assert_eq!(ds.len(), 7);
    assert!(ds.table().iter().all(|r| r.latitude.is_none()));
}

#[test]
fn test_filter_properties() {
    let ds = load_joined();

    let year = ds.filter(2019, None, None);
    assert_eq!(year.filter(2019, None, None).table(), year.table());

    let both = ds.filter(2018, None, "Town Hall (West)");
    assert_eq!(both.len(), 2);
    assert_eq!(
        both.table(),
        ds.filter(2018, None, None).filter(None, None, "Town Hall (West)").table()
    );
    assert_eq!(
        both.table(),
        ds.filter(None, None, "Town Hall (West)").filter(2018, None, None).table()
    );

    assert_eq!(ds.filter(None, None, Vec::<String>::new()).table(), ds.table());
}

#[test]
fn test_filter_preserves_order() {
    let ds = load_joined();
    let town_hall = ds.filter(None, None, ["Town Hall (West)"]);
    let ids: Vec<_> = town_hall.table().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![Some(4), Some(6), Some(1)]);
}

#[test]
fn test_memoized_multi_select() {
    let ds = load_joined();
    let a = ds.filter(2019, None, ["Bourke St", "Town Hall (West)"]);
    let b = ds.filter(2019, None, ["Town Hall (West)", "Bourke St"]);
    assert_eq!(a.table(), b.table());

    let stats = ds.cache_stats().unwrap();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
}

#[test]
fn test_snapshot_file_round_trip() {
    let ds = load_joined();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("melbviz.parquet");

    ds.write_snapshot(&path).unwrap();
    let restored = PedestrianDataset::from_snapshot(&path, &DatasetOptions::default()).unwrap();

    assert_eq!(restored.len(), ds.len());
    assert_eq!(restored.table(), ds.table());
    for (a, b) in restored.table().iter().zip(ds.table().iter()) {
        assert_eq!(a.datetime, b.datetime);
        assert_eq!(a.datetime_flat_year, b.datetime_flat_year);
        assert_eq!(a.latitude, b.latitude);
    }
}

#[test]
fn test_clean_csv_round_trip() {
    let ds = load_joined();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("melbviz.csv");

    ds.to_csv(&path).unwrap();
    let restored = PedestrianDataset::from_csv(&path, &DatasetOptions::default()).unwrap();
    assert_eq!(restored.table(), ds.table());
}

#[test]
fn test_from_csv_rejects_non_clean_files() {
    let header_only = csv_file("foo,bar\n");
    let err = PedestrianDataset::from_csv(header_only.path(), &DatasetOptions::default()).unwrap_err();
    assert!(matches!(err, MelbvizError::DataSource { .. }));

    let raw_counts = csv_file(COUNTS);
    let err = PedestrianDataset::from_csv(raw_counts.path(), &DatasetOptions::default()).unwrap_err();
    assert!(matches!(err, MelbvizError::DataSource { ref reason, .. } if reason.contains("datetime")));
}

#[test]
fn test_missing_snapshot_is_data_source_error() {
    let dir = TempDir::new().unwrap();
    let err = PedestrianDataset::from_snapshot(&dir.path().join("none.parquet"), &DatasetOptions::default())
        .unwrap_err();
    assert!(matches!(err, MelbvizError::DataSource { .. }));
}

#[test]
fn test_charts_over_filtered_view() {
    let ds = load_joined().filter(2018, Month::March, None);
    let options = ChartOptions::default();

    let chart = Chart::for_dataset_named(&ds, "sensor_map", &options).unwrap().unwrap();
    assert_eq!(chart.title, "Sensor Traffic for March, 2018");
    let ChartData::SensorMap(located) = chart.data else {
        panic!("expected sensor map");
    };
    assert_eq!(located.len(), 2);

    let err = Chart::for_dataset_named(&ds, "heatmap", &options).unwrap_err();
    assert!(err.to_string().contains("'stacked_sensors'"));

    let empty = ds.filter(None, Month::July, None);
    for kind in PlotKind::ALL {
        assert!(Chart::for_dataset(&empty, kind, &options).is_none());
    }
}

#[test]
fn test_shared_root_across_threads() {
    let ds = Arc::new(load_joined());

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let ds = Arc::clone(&ds);
            scope.spawn(move || {
                for year in [2018, 2019] {
                    let filtered = ds.filter(year, None, None);
                    assert!(filtered.table().iter().all(|r| r.year == year));
                }
            });
        }
    });

    let stats = ds.cache_stats().unwrap();
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.hits + stats.misses, 8);
}
