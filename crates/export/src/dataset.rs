//! Country-partitioned parquet dataset.
//!
//! Layout: `<dir>/country=<percent-encoded name>/part-{i}.parquet`. Each file
//! holds `year, partner, flow, category, value_*..., pct_of_gdp`.

use crate::units::{IntWidth, OptimizedTable};
use arrow::array::{ArrayRef, Float32Array, Int16Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, Encoding, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::schema::types::ColumnPath;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tradeflow_core::{Error, ExportConfig, Result, PCT_PREFIX, VALUE_PREFIX};

/// Partition column name.
pub const PARTITION_COLUMN: &str = "country";

fn storage_err(e: impl std::fmt::Display) -> Error {
    Error::storage(e.to_string())
}

/// Summary of a dataset write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub partitions: usize,
    pub files: usize,
    pub rows: usize,
}

/// Writes an optimized table as a hive-style dataset partitioned by country.
pub struct PartitionedWriter {
    dir: PathBuf,
    config: ExportConfig,
}

impl PartitionedWriter {
    pub fn new(dir: impl Into<PathBuf>, config: &ExportConfig) -> Self {
        Self {
            dir: dir.into(),
            config: config.clone(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory holding one country's files.
    pub fn partition_dir(&self, country: &str) -> PathBuf {
        self.dir
            .join(format!("{}={}", PARTITION_COLUMN, urlencoding::encode(country)))
    }

    /// Parquet properties: zstd, dictionaries, statistics, and
    /// byte-stream-split on the numeric measure columns.
    pub fn writer_properties(&self, schema: &Schema) -> Result<WriterProperties> {
        let level = ZstdLevel::try_new(self.config.zstd_level).map_err(storage_err)?;
        let mut builder = WriterProperties::builder()
            .set_compression(Compression::ZSTD(level))
            .set_dictionary_enabled(true)
            .set_statistics_enabled(EnabledStatistics::Page)
            .set_data_page_size_limit(self.config.data_page_size)
            .set_max_row_group_size(self.config.row_group_size);
        for field in schema.fields() {
            let name = field.name();
            if name.starts_with(VALUE_PREFIX) || name.starts_with(PCT_PREFIX) {
                let path = ColumnPath::from(name.as_str());
                builder = builder.set_column_encoding(path, Encoding::BYTE_STREAM_SPLIT);
            }
        }
        Ok(builder.build())
    }

    /// File schema (the partition column lives in the directory name).
    pub fn schema(table: &OptimizedTable) -> SchemaRef {
        let mut fields = vec![
            Field::new("year", DataType::Int16, false),
            Field::new("partner", DataType::Utf8, false),
            Field::new("flow", DataType::Utf8, false),
            Field::new("category", DataType::Utf8, false),
        ];
        for column in &table.value_columns {
            let data_type = match column.width {
                IntWidth::Int32 => DataType::Int32,
                IntWidth::Int64 => DataType::Int64,
            };
            fields.push(Field::new(column.name.as_str(), data_type, true));
        }
        fields.push(Field::new("pct_of_gdp", DataType::Float32, true));
        Arc::new(Schema::new(fields))
    }

    /// Replace the dataset directory with `table`.
    ///
    /// Rows are stably ordered by `(category, year)` within each partition and
    /// split into files of at most `max_rows_per_file` rows.
    pub fn write(&self, table: &OptimizedTable) -> Result<WriteSummary> {
        if self.dir.exists() {
            info!("Clearing existing partitioned dataset at {}", self.dir.display());
            fs::remove_dir_all(&self.dir)?;
        }
        fs::create_dir_all(&self.dir)?;

        let mut order: Vec<usize> = (0..table.len()).collect();
        order.sort_by(|&a, &b| (&table.category[a], table.year[a]).cmp(&(&table.category[b], table.year[b])));

        let mut partitions: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for i in order {
            partitions.entry(table.country[i].as_str()).or_default().push(i);
        }

        let schema = Self::schema(table);
        let props = self.writer_properties(&schema)?;
        let chunk = self.config.max_rows_per_file.max(1);
        let mut summary = WriteSummary {
            partitions: partitions.len(),
            ..WriteSummary::default()
        };

        for (country, indices) in &partitions {
            let dir = self.partition_dir(country);
            fs::create_dir_all(&dir)?;
            for (i, rows) in indices.chunks(chunk).enumerate() {
                let part = table.take(rows);
                let path = dir.join(format!("part-{i}.parquet"));
                write_file(&path, &schema, props.clone(), &part)?;
                summary.files += 1;
                summary.rows += part.len();
            }
            debug!("Wrote {} rows for {}", indices.len(), country);
        }

        info!(
            "Wrote {} rows in {} files across {} partitions to {}",
            summary.rows,
            summary.files,
            summary.partitions,
            self.dir.display()
        );
        Ok(summary)
    }
}

fn to_batch(schema: &SchemaRef, table: &OptimizedTable) -> Result<RecordBatch> {
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(Int16Array::from(table.year.clone())),
        Arc::new(table.partner.iter().map(|s| Some(s.as_str())).collect::<StringArray>()),
        Arc::new(table.flow.iter().map(|f| Some(f.as_str())).collect::<StringArray>()),
        Arc::new(table.category.iter().map(|s| Some(s.as_str())).collect::<StringArray>()),
    ];
    for column in &table.value_columns {
        let array: ArrayRef = match column.width {
            IntWidth::Int32 => Arc::new(
                column
                    .values
                    .iter()
                    .map(|v| v.map(|v| v as i32))
                    .collect::<Int32Array>(),
            ),
            IntWidth::Int64 => Arc::new(column.values.iter().copied().collect::<Int64Array>()),
        };
        columns.push(array);
    }
    columns.push(Arc::new(table.pct_of_gdp.iter().copied().collect::<Float32Array>()));
    RecordBatch::try_new(schema.clone(), columns).map_err(storage_err)
}

fn write_file(path: &Path, schema: &SchemaRef, props: WriterProperties, table: &OptimizedTable) -> Result<()> {
    let batch = to_batch(schema, table)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props)).map_err(storage_err)?;
    writer.write(&batch).map_err(storage_err)?;
    writer.close().map_err(storage_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::UnitColumn;
    use arrow::array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tradeflow_core::Flow;

    fn sample() -> OptimizedTable {
        OptimizedTable {
            year: vec![2021, 2020, 2020, 2020],
            country: vec![
                "France".to_string(),
                "France".to_string(),
                "Côte d'Ivoire".to_string(),
                "France".to_string(),
            ],
            partner: vec!["USA".to_string(), "USA".to_string(), "France".to_string(), "EU".to_string()],
            flow: vec![Flow::Exports, Flow::Exports, Flow::Imports, Flow::Imports],
            category: vec![
                "Agriculture".to_string(),
                "Minerals".to_string(),
                "Agriculture".to_string(),
                "Agriculture".to_string(),
            ],
            value_columns: vec![
                UnitColumn {
                    name: "value_usd_current".to_string(),
                    width: IntWidth::Int32,
                    values: vec![Some(1), Some(2), None, Some(4)],
                },
                UnitColumn {
                    name: "value_eur_constant".to_string(),
                    width: IntWidth::Int64,
                    values: vec![Some(5_000_000_000), None, Some(7), Some(8)],
                },
            ],
            pct_of_gdp: vec![Some(0.5), None, Some(1.5), Some(2.5)],
        }
    }

    fn read(path: &Path) -> RecordBatch {
        let file = File::open(path).unwrap();
        let mut reader = ParquetRecordBatchReaderBuilder::try_new(file).unwrap().build().unwrap();
        reader.next().unwrap().unwrap()
    }

    fn config() -> ExportConfig {
        ExportConfig {
            zstd_level: 3,
            ..ExportConfig::default()
        }
    }

    #[test]
    fn test_partitions_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let writer = PartitionedWriter::new(dir.path().join("trade"), &config());
        let summary = writer.write(&sample()).unwrap();
        assert_eq!(summary, WriteSummary { partitions: 2, files: 2, rows: 4 });

        let civ = writer.partition_dir("Côte d'Ivoire");
        assert_eq!(civ.file_name().unwrap(), "country=C%C3%B4te%20d%27Ivoire");
        assert!(civ.join("part-0.parquet").exists());

        let batch = read(&writer.partition_dir("France").join("part-0.parquet"));
        assert_eq!(batch.num_rows(), 3);
        let years = batch.column_by_name("year").unwrap().as_any().downcast_ref::<Int16Array>().unwrap();
        let categories = batch
            .column_by_name("category")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let order: Vec<(&str, i16)> = (0..3).map(|i| (categories.value(i), years.value(i))).collect();
        assert_eq!(order, vec![("Agriculture", 2020), ("Agriculture", 2021), ("Minerals", 2020)]);
        assert!(batch.column_by_name(PARTITION_COLUMN).is_none());
    }

    #[test]
    fn test_column_types() {
        let dir = tempfile::tempdir().unwrap();
        let writer = PartitionedWriter::new(dir.path(), &config());
        writer.write(&sample()).unwrap();

        let batch = read(&writer.partition_dir("France").join("part-0.parquet"));
        let schema = batch.schema();
        assert_eq!(schema.field_with_name("year").unwrap().data_type(), &DataType::Int16);
        assert_eq!(schema.field_with_name("value_usd_current").unwrap().data_type(), &DataType::Int32);
        assert_eq!(schema.field_with_name("value_eur_constant").unwrap().data_type(), &DataType::Int64);
        assert_eq!(schema.field_with_name("pct_of_gdp").unwrap().data_type(), &DataType::Float32);

        let big = batch
            .column_by_name("value_eur_constant")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        // Row order is Agriculture 2020 (EU), Agriculture 2021 (USA), Minerals 2020.
        assert_eq!(big.value(1), 5_000_000_000);
        assert!(big.is_null(2));
    }

    #[test]
    fn test_files_split_and_dir_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("trade");
        fs::create_dir_all(out.join("country=Stale")).unwrap();

        let writer = PartitionedWriter::new(
            &out,
            &ExportConfig {
                max_rows_per_file: 2,
                ..config()
            },
        );
        let summary = writer.write(&sample()).unwrap();
        assert_eq!(summary.files, 3);
        assert!(!out.join("country=Stale").exists());
        assert_eq!(read(&writer.partition_dir("France").join("part-0.parquet")).num_rows(), 2);
        assert_eq!(read(&writer.partition_dir("France").join("part-1.parquet")).num_rows(), 1);
    }

    #[test]
    fn test_value_columns_keep_dictionary_with_split_fallback() {
        let writer = PartitionedWriter::new("unused", &config());
        let props = writer.writer_properties(&PartitionedWriter::schema(&sample())).unwrap();
        for name in ["value_usd_current", "value_eur_constant", "pct_of_gdp"] {
            let path = ColumnPath::from(name);
            assert!(props.dictionary_enabled(&path), "{name}");
            assert_eq!(props.encoding(&path), Some(Encoding::BYTE_STREAM_SPLIT), "{name}");
        }
        let partner = ColumnPath::from("partner");
        assert!(props.dictionary_enabled(&partner));
        assert_eq!(props.encoding(&partner), None);
    }

    #[test]
    fn test_invalid_zstd_level() {
        let table = sample();
        let writer = PartitionedWriter::new(
            "unused",
            &ExportConfig {
                zstd_level: 99,
                ..config()
            },
        );
        let schema = PartitionedWriter::schema(&table);
        assert!(matches!(writer.writer_properties(&schema), Err(Error::Storage(_))));
    }
}
