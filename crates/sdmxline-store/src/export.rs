//! Flattened observation export to Parquet

use std::fs::File;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use arrow::array::{ArrayRef, Int64Array, RecordBatch, StringArray, TimestampSecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::error::ArrowError;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use sdmxline_core::SeriesRecord;

pub const OBSERVATIONS_FILE: &str = "observations.parquet";

/// Rows buffered before a batch is written
const BATCH_SIZE: usize = 8192;
const ZSTD_LEVEL: i32 = 3;

/// One row per observation
pub static OBSERVATIONS: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("key", DataType::Utf8, false),
        Field::new("frequency", DataType::Utf8, false),
        Field::new("period", DataType::Utf8, false),
        Field::new("ordinal", DataType::Int64, false),
        Field::new("value", DataType::Utf8, false),
        Field::new(
            "release_date",
            DataType::Timestamp(TimeUnit::Second, Some("UTC".into())),
            false,
        ),
    ]))
});

/// Column buffers for [`OBSERVATIONS`]
#[derive(Debug, Default)]
pub struct ObservationAccumulator {
    key: Vec<String>,
    frequency: Vec<String>,
    period: Vec<String>,
    ordinal: Vec<i64>,
    value: Vec<String>,
    release_date: Vec<i64>,
}

impl ObservationAccumulator {
    pub fn push_series(&mut self, series: &SeriesRecord) {
        for obs in &series.values {
            self.key.push(series.key.clone());
            self.frequency.push(series.frequency.clone());
            self.period.push(obs.period.clone());
            self.ordinal.push(obs.ordinal);
            self.value.push(obs.value.clone());
            self.release_date.push(obs.release_date.timestamp());
        }
    }

    pub fn len(&self) -> usize {
        self.key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    /// Take buffered rows as a RecordBatch, resetting internal state
    pub fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(std::mem::take(&mut self.key))),
            Arc::new(StringArray::from(std::mem::take(&mut self.frequency))),
            Arc::new(StringArray::from(std::mem::take(&mut self.period))),
            Arc::new(Int64Array::from(std::mem::take(&mut self.ordinal))),
            Arc::new(StringArray::from(std::mem::take(&mut self.value))),
            Arc::new(
                TimestampSecondArray::from(std::mem::take(&mut self.release_date))
                    .with_timezone("UTC"),
            ),
        ];
        RecordBatch::try_new(OBSERVATIONS.clone(), arrays)
    }
}

/// Write every observation of `series` to `path`; returns the row count
pub fn write_observations<'a>(
    path: &Path,
    series: impl IntoIterator<Item = &'a SeriesRecord>,
) -> std::io::Result<usize> {
    let file = File::create(path)?;
    let level = ZstdLevel::try_new(ZSTD_LEVEL)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(level))
        .build();
    let mut writer = ArrowWriter::try_new(file, OBSERVATIONS.clone(), Some(props))
        .map_err(std::io::Error::other)?;

    let mut acc = ObservationAccumulator::default();
    let mut rows = 0;
    for record in series {
        acc.push_series(record);
        if acc.len() >= BATCH_SIZE {
            rows += acc.len();
            let batch = acc.take_batch().map_err(std::io::Error::other)?;
            writer.write(&batch).map_err(std::io::Error::other)?;
        }
    }
    if !acc.is_empty() {
        rows += acc.len();
        let batch = acc.take_batch().map_err(std::io::Error::other)?;
        writer.write(&batch).map_err(std::io::Error::other)?;
    }
    writer.close().map_err(std::io::Error::other)?;
    Ok(rows)
}
