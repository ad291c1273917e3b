use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Float64Array, Int32Array, Int64Array, StringArray,
    TimestampMillisecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use chrono::{DateTime, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::ChunkReader;

use super::model::{CanonicalTable, Month, Record};
use crate::error::{MelbvizError, Result};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Arrow schema of the snapshot file.
///
/// Both derived timestamps are stored, so restoring never re-derives them.
pub fn snapshot_schema() -> SchemaRef {
    let ts = || DataType::Timestamp(TimeUnit::Millisecond, None);
    Arc::new(Schema::new(vec![
        Field::new("ID", DataType::Int64, true),
        Field::new("Sensor_ID", DataType::Utf8, true),
        Field::new("Sensor_Name", DataType::Utf8, false),
        Field::new("Year", DataType::Int32, false),
        Field::new("Month", DataType::Utf8, false),
        Field::new("Mdate", DataType::Int32, false),
        Field::new("Time", DataType::Int32, false),
        Field::new("Hourly_Counts", DataType::Int64, false),
        Field::new("datetime", ts(), false),
        Field::new("datetime_flat_year", ts(), false),
        Field::new("latitude", DataType::Float64, true),
        Field::new("longitude", DataType::Float64, true),
    ]))
}

/// Writer settings are fixed so equal tables give byte-identical files.
fn writer_properties() -> Result<WriterProperties> {
    let level = GzipLevel::try_new(6)?;
    Ok(WriterProperties::builder()
        .set_compression(Compression::GZIP(level))
        .build())
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// Write the table as a single-batch Parquet file to `writer`.
pub fn write_snapshot<W: Write + Send>(table: &CanonicalTable, writer: W) -> Result<()> {
    let schema = snapshot_schema();
    let batch = to_record_batch(table, schema.clone())?;
    let mut writer = ArrowWriter::try_new(writer, schema, Some(writer_properties()?))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Write the snapshot to a file at `path`.
pub fn write_snapshot_file(table: &CanonicalTable, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|e| MelbvizError::data_source(path, e))?;
    write_snapshot(table, file)?;
    log::info!("Wrote {} rows to snapshot {}", table.len(), path.display());
    Ok(())
}

/// Render the first `rows` rows in snapshot layout as a text table.
pub fn preview(table: &CanonicalTable, rows: usize) -> Result<String> {
    let batch = to_record_batch(table, snapshot_schema())?;
    let head = batch.slice(0, rows.min(batch.num_rows()));
    Ok(pretty_format_batches(&[head])?.to_string())
}

fn to_record_batch(table: &CanonicalTable, schema: SchemaRef) -> Result<RecordBatch> {
    let rows = table.rows();
    let counts = rows
        .iter()
        .map(|r| i64::try_from(r.hourly_counts).map_err(|e| MelbvizError::Snapshot(e.to_string())))
        .collect::<Result<Vec<i64>>>()?;

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.id))),
        Arc::new(StringArray::from_iter(rows.iter().map(|r| r.sensor_id.as_deref()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.sensor_name.as_str()))),
        Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.year))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.month.name()))),
        Arc::new(small_int_column(rows, |r| r.mdate)?),
        Arc::new(small_int_column(rows, |r| r.time)?),
        Arc::new(Int64Array::from(counts)),
        Arc::new(timestamp_column(rows, |r| r.datetime)),
        Arc::new(timestamp_column(rows, |r| r.datetime_flat_year)),
        Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.latitude))),
        Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.longitude))),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

fn small_int_column(rows: &[Record], f: impl Fn(&Record) -> u32) -> Result<Int32Array> {
    rows.iter()
        .map(|r| i32::try_from(f(r)).map_err(|e| MelbvizError::Snapshot(e.to_string())))
        .collect::<Result<Vec<i32>>>()
        .map(Int32Array::from)
}

fn timestamp_column(
    rows: &[Record],
    f: impl Fn(&Record) -> NaiveDateTime,
) -> TimestampMillisecondArray {
    rows.iter()
        .map(|r| f(r).and_utc().timestamp_millis())
        .collect::<Vec<i64>>()
        .into()
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// Read a snapshot written by [`write_snapshot`].
pub fn read_snapshot<R: ChunkReader + 'static>(reader: R) -> Result<CanonicalTable> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(reader)?.build()?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        append_rows(&batch, &mut rows)?;
    }
    Ok(CanonicalTable::new(rows))
}

/// Read the snapshot file at `path`.
pub fn read_snapshot_file(path: &Path) -> Result<CanonicalTable> {
    let file = std::fs::File::open(path).map_err(|e| MelbvizError::data_source(path, e))?;
    let table = read_snapshot(file)?;
    log::info!("Restored {} rows from snapshot {}", table.len(), path.display());
    Ok(table)
}

/// Typed view of one column of a snapshot batch.
fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| MelbvizError::Snapshot(format!("snapshot missing '{name}' column")))?;
    col.as_any().downcast_ref::<T>().ok_or_else(|| {
        MelbvizError::Snapshot(format!(
            "snapshot column '{name}' has unexpected type {:?}",
            col.data_type()
        ))
    })
}

fn append_rows(batch: &RecordBatch, rows: &mut Vec<Record>) -> Result<()> {
    let id = column::<Int64Array>(batch, "ID")?;
    let sensor_id = column::<StringArray>(batch, "Sensor_ID")?;
    let sensor_name = column::<StringArray>(batch, "Sensor_Name")?;
    let year = column::<Int32Array>(batch, "Year")?;
    let month = column::<StringArray>(batch, "Month")?;
    let mdate = column::<Int32Array>(batch, "Mdate")?;
    let time = column::<Int32Array>(batch, "Time")?;
    let counts = column::<Int64Array>(batch, "Hourly_Counts")?;
    let datetime = column::<TimestampMillisecondArray>(batch, "datetime")?;
    let flat = column::<TimestampMillisecondArray>(batch, "datetime_flat_year")?;
    let latitude = column::<Float64Array>(batch, "latitude")?;
    let longitude = column::<Float64Array>(batch, "longitude")?;

    for row in 0..batch.num_rows() {
        let bad = |what: &str| MelbvizError::Snapshot(format!("row {row}: invalid {what}"));
        rows.push(Record {
            id: id.is_valid(row).then(|| id.value(row)),
            sensor_id: sensor_id.is_valid(row).then(|| sensor_id.value(row).to_string()),
            sensor_name: sensor_name.value(row).to_string(),
            year: year.value(row),
            month: Month::from_name(month.value(row)).ok_or_else(|| bad("Month"))?,
            mdate: u32::try_from(mdate.value(row)).map_err(|_| bad("Mdate"))?,
            time: u32::try_from(time.value(row)).map_err(|_| bad("Time"))?,
            hourly_counts: u64::try_from(counts.value(row)).map_err(|_| bad("Hourly_Counts"))?,
            datetime: from_millis(datetime.value(row)).ok_or_else(|| bad("datetime"))?,
            datetime_flat_year: from_millis(flat.value(row))
                .ok_or_else(|| bad("datetime_flat_year"))?,
            latitude: latitude.is_valid(row).then(|| latitude.value(row)),
            longitude: longitude.is_valid(row).then(|| longitude.value(row)),
        });
    }
    Ok(())
}

fn from_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::record;

    fn sample() -> CanonicalTable {
        let mut located = record("Bourke St", 2019, Month::March, 5, 14, 120);
        located.id = Some(11);
        located.sensor_id = Some("3".into());
        located.latitude = Some(-37.8136);
        located.longitude = Some(144.9631);
        CanonicalTable::new(vec![
            located,
            record("Town Hall (West)", 2018, Month::February, 28, 23, 0),
        ])
    }

    #[test]
    fn test_snapshot_round_trip_preserves_timestamps() {
        let table = sample();
        let mut buf = Vec::new();
        write_snapshot(&table, &mut buf).unwrap();

        let restored = read_snapshot(bytes::Bytes::from(buf)).unwrap();
        assert_eq!(restored.len(), table.len());
        assert_eq!(restored, table);
        for (a, b) in restored.iter().zip(table.iter()) {
            assert_eq!(a.datetime, b.datetime);
            assert_eq!(a.datetime_flat_year, b.datetime_flat_year);
        }
    }

    #[test]
    fn test_snapshot_is_reproducible() {
        let table = sample();
        let mut first = Vec::new();
        let mut second = Vec::new();
        write_snapshot(&table, &mut first).unwrap();
        write_snapshot(&table, &mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_preview_shows_head() {
        let text = preview(&sample(), 1).unwrap();
        assert!(text.contains("Sensor_Name"));
        assert!(text.contains("Town Hall (West)"));
        assert!(!text.contains("Bourke St"));
    }

    #[test]
    fn test_restore_rejects_foreign_parquet() {
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, false)]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef],
        )
        .unwrap();
        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let err = read_snapshot(bytes::Bytes::from(buf)).unwrap_err();
        assert!(matches!(err, MelbvizError::Snapshot(msg) if msg.contains("missing")));
    }
}
