//! Parquet cache for the wide aggregated trade table.
//!
//! Check-then-write with no locking: one writer per cache path. The file is
//! written to a sibling temp path and renamed into place, so a failed write
//! never leaves a partial cache behind.

use crate::aggregator::{PairKey, WideTrade};
use arrow::array::{Array, ArrayRef, Float64Array, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tradeflow_core::{Error, Result};

const KEY_COLUMNS: [&str; 3] = ["year", "exporter_iso3", "importer_iso3"];

fn storage_err(e: impl std::fmt::Display) -> Error {
    Error::storage(e.to_string())
}

fn write_batch(path: &Path, schema: Arc<Schema>, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props)).map_err(storage_err)?;
    writer.write(batch).map_err(storage_err)?;
    writer.close().map_err(storage_err)?;
    Ok(())
}

/// On-disk memo of the aggregated trade table.
pub struct TradeCache {
    path: PathBuf,
}

impl TradeCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write the table as snappy-compressed parquet.
    pub fn write(&self, wide: &WideTrade) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut fields = vec![
            Field::new(KEY_COLUMNS[0], DataType::Int32, false),
            Field::new(KEY_COLUMNS[1], DataType::Utf8, false),
            Field::new(KEY_COLUMNS[2], DataType::Utf8, false),
        ];
        fields.extend(
            wide.categories
                .iter()
                .map(|c| Field::new(c.as_str(), DataType::Float64, true)),
        );
        let schema = Arc::new(Schema::new(fields));

        let years: Int32Array = wide.rows.iter().map(|(k, _)| Some(k.year)).collect();
        let exporters: StringArray = wide.rows.iter().map(|(k, _)| Some(k.exporter_iso3.as_str())).collect();
        let importers: StringArray = wide.rows.iter().map(|(k, _)| Some(k.importer_iso3.as_str())).collect();

        let mut columns: Vec<ArrayRef> = vec![Arc::new(years), Arc::new(exporters), Arc::new(importers)];
        for i in 0..wide.categories.len() {
            let cells: Float64Array = wide.rows.iter().map(|(_, cells)| cells[i]).collect();
            columns.push(Arc::new(cells));
        }

        let batch = RecordBatch::try_new(schema.clone(), columns).map_err(storage_err)?;

        let temp = self.temp_path();
        if let Err(e) = write_batch(&temp, schema, &batch) {
            let _ = std::fs::remove_file(&temp);
            return Err(e);
        }
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }

    /// Read the table back.
    pub fn read(&self) -> Result<WideTrade> {
        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(storage_err)?
            .build()
            .map_err(storage_err)?;

        let mut categories: Option<Vec<String>> = None;
        let mut rows = Vec::new();
        for batch in reader {
            let batch = batch.map_err(storage_err)?;
            let names: Vec<String> = batch
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().clone())
                .filter(|n| !KEY_COLUMNS.contains(&n.as_str()))
                .collect();
            if categories.is_none() {
                categories = Some(names.clone());
            }

            let years = typed_column::<Int32Array>(&batch, KEY_COLUMNS[0])?;
            let exporters = typed_column::<StringArray>(&batch, KEY_COLUMNS[1])?;
            let importers = typed_column::<StringArray>(&batch, KEY_COLUMNS[2])?;
            let cells: Vec<&Float64Array> = names
                .iter()
                .map(|n| typed_column::<Float64Array>(&batch, n))
                .collect::<Result<_>>()?;

            for row in 0..batch.num_rows() {
                let key = PairKey {
                    year: years.value(row),
                    exporter_iso3: exporters.value(row).to_string(),
                    importer_iso3: importers.value(row).to_string(),
                };
                let values = cells
                    .iter()
                    .map(|c| (!c.is_null(row)).then(|| c.value(row)))
                    .collect();
                rows.push((key, values));
            }
        }

        Ok(WideTrade {
            categories: categories.unwrap_or_default(),
            rows,
        })
    }
}

fn typed_column<'b, T: 'static>(batch: &'b RecordBatch, name: &str) -> Result<&'b T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::missing_column(name))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::storage(format!("column '{name}' has unexpected type")))
}
