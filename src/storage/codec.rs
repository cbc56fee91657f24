//! Dataset <-> Parquet 编解码
//!
//! 所有列均为可空 UTF-8, 列名即 `Column::name()`。

use crate::models::{Column, Dataset};
use arrow::array::{Array, ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("arrow: {0}")]
    Arrow(#[from] ArrowError),

    #[error("parquet: {0}")]
    Parquet(#[from] ParquetError),

    #[error("{0}")]
    Schema(String),
}

fn schema_for(columns: &[Column]) -> Arc<Schema> {
    Arc::new(Schema::new(
        columns
            .iter()
            .map(|c| Field::new(c.name(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ))
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some("chat-fiscal".to_string()),
    };
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

pub fn encode(table: &Dataset) -> Result<Bytes, CodecError> {
    let schema = schema_for(table.columns());
    let arrays: Vec<ArrayRef> = table
        .columns()
        .iter()
        .map(|&column| {
            let values = table.column_values(column).unwrap_or(&[]);
            let array = StringArray::from(values.iter().map(|v| v.as_deref()).collect::<Vec<_>>());
            Arc::new(array) as ArrayRef
        })
        .collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;

    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, schema, Some(writer_properties()))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(Bytes::from(cursor.into_inner()))
}

pub fn decode(bytes: Bytes) -> Result<Dataset, CodecError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)?;
    let schema = builder.schema().clone();

    let mut data: Vec<(Column, Vec<Option<String>>)> = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let column = Column::from_name(field.name())
            .ok_or_else(|| CodecError::Schema(format!("coluna desconhecida '{}'", field.name())))?;
        data.push((column, Vec::new()));
    }

    for batch in builder.build()? {
        let batch = batch?;
        for (idx, (column, values)) in data.iter_mut().enumerate() {
            let array = batch
                .column(idx)
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| {
                    CodecError::Schema(format!("coluna '{}' não é texto", column.name()))
                })?;
            values.extend((0..array.len()).map(|row| {
                (!array.is_null(row)).then(|| array.value(row).to_string())
            }));
        }
    }

    Dataset::from_columns(data).map_err(CodecError::Schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode(Bytes::from_static(b"not a parquet file")).is_err());
    }

    #[test]
    fn empty_table_keeps_columns() {
        let table = Dataset::from_columns(vec![
            (Column::AccessKey, Vec::new()),
            (Column::Quantity, Vec::new()),
        ])
        .unwrap();
        let decoded = decode(encode(&table).unwrap()).unwrap();
        assert_eq!(decoded.row_count(), 0);
        assert_eq!(decoded.column_names(), vec!["access_key", "quantity"]);
    }
}
