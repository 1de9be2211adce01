//! Format readers: delimited text, spreadsheets, Parquet and JSON.
//!
//! Every reader produces header names plus raw string cells; type inference
//! happens once in [`build_table`].

use super::table::{Column, Table, DEFAULT_NA_VALUES};
use crate::cancel::CancelToken;
use crate::error::LoadError;
use crate::recipe::LoadOptions;
use arrow::array::Array;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use calamine::{open_workbook_auto, Data, Reader};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::Path;

/// Rows read between cancellation checks.
const CANCEL_CHECK_ROWS: usize = 4096;

/// Supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Delimited text with the given separator.
    Delimited(u8),
    /// Excel or OpenDocument workbook.
    Spreadsheet,
    /// Apache Parquet columnar file.
    Parquet,
    /// JSON records.
    Json,
}

impl SourceFormat {
    /// Pick a format from the explicit option or the file extension.
    pub fn detect(path: &Path, options: &LoadOptions) -> Result<Self, LoadError> {
        let name = options
            .format
            .as_deref()
            .or_else(|| path.extension().and_then(|e| e.to_str()))
            .unwrap_or_default()
            .to_ascii_lowercase();

        let format = match name.as_str() {
            "csv" => Self::Delimited(b','),
            "tsv" | "tab" | "txt" => Self::Delimited(b'\t'),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Self::Spreadsheet,
            "parquet" | "pq" => Self::Parquet,
            "json" => Self::Json,
            _ => {
                return Err(LoadError::UnsupportedFormat {
                    path: path.to_path_buf(),
                    format: if name.is_empty() { "<none>".to_string() } else { name },
                })
            }
        };

        match (format, options.delimiter) {
            (Self::Delimited(_), Some(d)) if d.is_ascii() => Ok(Self::Delimited(d as u8)),
            (Self::Delimited(_), Some(d)) => Err(LoadError::Parse {
                path: path.to_path_buf(),
                message: format!("delimiter '{d}' is not a single-byte character"),
            }),
            (f, _) => Ok(f),
        }
    }
}

/// Read `path` into a typed table.
pub fn read_table(
    path: &Path,
    options: &LoadOptions,
    cancel: &CancelToken,
) -> Result<Table, LoadError> {
    let format = SourceFormat::detect(path, options)?;
    let (headers, rows) = match format {
        SourceFormat::Delimited(delimiter) => read_delimited(path, delimiter, cancel)?,
        SourceFormat::Spreadsheet => read_spreadsheet(path, options.sheet.as_deref(), cancel)?,
        SourceFormat::Parquet => read_parquet(path, cancel)?,
        SourceFormat::Json => read_json(path)?,
    };
    cancel.check()?;
    build_table(path, headers, rows, &options.na_values)
}

type RawRows = (Vec<String>, Vec<Vec<Option<String>>>);

fn read_delimited(path: &Path, delimiter: u8, cancel: &CancelToken) -> Result<RawRows, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(|e| csv_error(path, &e))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(path, &e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(LoadError::Parse {
            path: path.to_path_buf(),
            message: "file is empty".to_string(),
        });
    }

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        if i % CANCEL_CHECK_ROWS == 0 {
            cancel.check()?;
        }
        let record = record.map_err(|e| csv_error(path, &e))?;
        check_row_width(path, i + 2, record.len(), headers.len())?;
        rows.push(record.iter().map(|c| Some(c.to_string())).collect());
    }
    Ok((headers, rows))
}

fn csv_error(path: &Path, err: &csv::Error) -> LoadError {
    match err.kind() {
        csv::ErrorKind::Io(io) => super::fingerprint::io_error(path, io),
        _ => LoadError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        },
    }
}

fn read_spreadsheet(
    path: &Path,
    sheet: Option<&str>,
    cancel: &CancelToken,
) -> Result<RawRows, LoadError> {
    let parse_err = |message: String| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| parse_err(e.to_string()))?;
    let name = match sheet {
        Some(s) => s.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| parse_err("workbook has no sheets".to_string()))?,
    };
    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| parse_err(format!("sheet '{name}': {e}")))?;

    sheet_rows(path, &name, range.rows(), cancel)
}

/// Split worksheet rows into headers and cells.
///
/// A used range is rectangular, so trailing blank header cells are dropped
/// and a row only counts as too long when it has a value past the header.
fn sheet_rows<'a>(
    path: &Path,
    name: &str,
    mut iter: impl Iterator<Item = &'a [Data]>,
    cancel: &CancelToken,
) -> Result<RawRows, LoadError> {
    let mut headers: Vec<String> = iter
        .next()
        .ok_or_else(|| LoadError::Parse {
            path: path.to_path_buf(),
            message: format!("sheet '{name}' is empty"),
        })?
        .iter()
        .map(|c| cell_text(c).unwrap_or_default())
        .collect();
    while headers.last().is_some_and(String::is_empty) {
        headers.pop();
    }

    let mut rows = Vec::new();
    for (i, row) in iter.enumerate() {
        if i % CANCEL_CHECK_ROWS == 0 {
            cancel.check()?;
        }
        let cells: Vec<Option<String>> = row.iter().map(cell_text).collect();
        let used = cells.iter().rposition(Option::is_some).map_or(0, |last| last + 1);
        check_row_width(path, i + 2, used, headers.len())?;
        rows.push(cells);
    }
    Ok((headers, rows))
}

fn check_row_width(path: &Path, line: usize, fields: usize, header: usize) -> Result<(), LoadError> {
    if fields > header {
        return Err(LoadError::Parse {
            path: path.to_path_buf(),
            message: format!("row {line} has {fields} fields, header has {header}"),
        });
    }
    Ok(())
}

fn read_parquet(path: &Path, cancel: &CancelToken) -> Result<RawRows, LoadError> {
    let parse_err = |message: String| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path).map_err(|e| super::fingerprint::io_error(path, &e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| parse_err(e.to_string()))?;
    let headers: Vec<String> = builder.schema().fields().iter().map(|f| f.name().clone()).collect();
    let reader = builder.build().map_err(|e| parse_err(e.to_string()))?;

    let options = FormatOptions::default();
    let mut rows = Vec::new();
    for batch in reader {
        cancel.check()?;
        let batch = batch.map_err(|e| parse_err(e.to_string()))?;
        let formatters = batch
            .columns()
            .iter()
            .map(|column| ArrayFormatter::try_new(column.as_ref(), &options))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| parse_err(e.to_string()))?;
        for i in 0..batch.num_rows() {
            rows.push(
                batch
                    .columns()
                    .iter()
                    .zip(&formatters)
                    .map(|(column, fmt)| (!column.is_null(i)).then(|| fmt.value(i).to_string()))
                    .collect(),
            );
        }
    }
    Ok((headers, rows))
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::Error(_) => None,
        other => Some(other.to_string()),
    }
}

fn read_json(path: &Path) -> Result<RawRows, LoadError> {
    let parse_err = |message: String| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let text = std::fs::read_to_string(path).map_err(|e| super::fingerprint::io_error(path, &e))?;
    if text.trim().is_empty() {
        return Err(parse_err("file is empty".to_string()));
    }
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| parse_err(e.to_string()))?;

    match value {
        // [{"a": 1, "b": "x"}, ...]
        serde_json::Value::Array(records) => {
            let mut headers: Vec<String> = Vec::new();
            for record in &records {
                let obj = record
                    .as_object()
                    .ok_or_else(|| parse_err("array elements must be objects".to_string()))?;
                for key in obj.keys() {
                    if !headers.contains(key) {
                        headers.push(key.clone());
                    }
                }
            }
            let rows = records
                .iter()
                .map(|r| headers.iter().map(|h| json_text(r.get(h))).collect())
                .collect();
            Ok((headers, rows))
        }
        // {"a": [1, 2], "b": ["x", "y"]}
        serde_json::Value::Object(columns) => {
            let headers: Vec<String> = columns.keys().cloned().collect();
            let n = columns
                .values()
                .map(|v| v.as_array().map_or(0, Vec::len))
                .max()
                .unwrap_or(0);
            let mut rows = vec![Vec::with_capacity(headers.len()); n];
            for values in columns.values() {
                let values = values
                    .as_array()
                    .ok_or_else(|| parse_err("object values must be arrays".to_string()))?;
                if values.len() != n {
                    return Err(parse_err("column arrays differ in length".to_string()));
                }
                for (row, v) in rows.iter_mut().zip(values) {
                    row.push(json_text(Some(v)));
                }
            }
            Ok((headers, rows))
        }
        _ => Err(parse_err(
            "expected an array of records or an object of columns".to_string(),
        )),
    }
}

fn json_text(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Turn raw cells into typed columns, mapping missing tokens to NA.
pub(crate) fn build_table(
    path: &Path,
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    extra_na: &[String],
) -> Result<Table, LoadError> {
    if headers.is_empty() {
        return Err(LoadError::Parse {
            path: path.to_path_buf(),
            message: "no columns".to_string(),
        });
    }

    let is_na = |s: &str| {
        let t = s.trim();
        DEFAULT_NA_VALUES.contains(&t) || extra_na.iter().any(|n| n == t)
    };

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(rows.len()); headers.len()];
    for row in rows {
        // Short rows are padded with missing values.
        let mut row = row.into_iter();
        for column in &mut cells {
            let cell = row.next().flatten().filter(|s| !is_na(s));
            column.push(cell);
        }
    }

    let columns = headers
        .into_iter()
        .enumerate()
        .map(|(i, h)| if h.is_empty() { format!("column_{}", i + 1) } else { h })
        .zip(cells.into_iter().map(Column::infer))
        .collect();

    Table::from_columns(columns).ok_or_else(|| LoadError::Parse {
        path: path.to_path_buf(),
        message: "ragged columns".to_string(),
    })
}
