//! In-memory column store.
//!
//! Columns are addressed by name; order is kept only for display and
//! serialization. Missing numeric values are `NaN`, missing text is `None`.

use std::collections::HashSet;

/// Tokens treated as missing in every source.
pub const DEFAULT_NA_VALUES: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "-"];

/// One typed column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Floating-point values, `NaN` for missing.
    Numeric(Vec<f64>),
    /// Text values, `None` for missing.
    Text(Vec<Option<String>>),
}

impl Column {
    /// Infer a column type from raw cells.
    ///
    /// The column is numeric when every present cell parses as `f64`;
    /// an all-missing column is numeric (all `NaN`).
    #[must_use]
    pub fn infer(cells: Vec<Option<String>>) -> Self {
        let parsed: Option<Vec<f64>> = cells
            .iter()
            .map(|c| match c {
                None => Some(f64::NAN),
                Some(s) => s.trim().parse::<f64>().ok(),
            })
            .collect();

        match parsed {
            Some(values) => Self::Numeric(values),
            None => Self::Text(cells),
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    /// Whether the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric values, if this is a numeric column.
    #[must_use]
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Self::Numeric(v) => Some(v),
            Self::Text(_) => None,
        }
    }

    /// Cell rendered as a category key; missing cells become `"NA"`.
    #[must_use]
    pub fn key(&self, row: usize) -> String {
        match self {
            Self::Numeric(v) => v.get(row).map_or_else(String::new, |x| {
                if x.is_nan() {
                    "NA".to_string()
                } else {
                    format_number(*x)
                }
            }),
            Self::Text(v) => v
                .get(row)
                .and_then(Clone::clone)
                .unwrap_or_else(|| "NA".to_string()),
        }
    }

    /// Rows at the given indices, in that order.
    #[must_use]
    pub fn take(&self, rows: &[usize]) -> Self {
        match self {
            Self::Numeric(v) => Self::Numeric(rows.iter().map(|&i| v[i]).collect()),
            Self::Text(v) => Self::Text(rows.iter().map(|&i| v[i].clone()).collect()),
        }
    }
}

/// Format a number without a trailing `.0` for integral values.
#[must_use]
pub fn format_number(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{x}")
    }
}

/// A table of equally long, uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from named columns.
    ///
    /// Returns `None` when column lengths differ. Duplicate names are made
    /// unique with a `.1`, `.2` suffix.
    #[must_use]
    pub fn from_columns(columns: Vec<(String, Column)>) -> Option<Self> {
        let rows = columns.first().map_or(0, |(_, c)| c.len());
        if columns.iter().any(|(_, c)| c.len() != rows) {
            return None;
        }

        let mut seen = HashSet::new();
        let mut table = Self::new();
        for (name, column) in columns {
            let mut unique = name.clone();
            let mut n = 1;
            while !seen.insert(unique.clone()) {
                unique = format!("{name}.{n}");
                n += 1;
            }
            table.names.push(unique);
            table.columns.push(column);
        }
        Some(table)
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    /// Number of columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Column names in storage order.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Look up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }

    /// Look up a numeric column by name.
    #[must_use]
    pub fn numeric(&self, name: &str) -> Option<&[f64]> {
        self.column(name).and_then(Column::as_numeric)
    }

    /// Whether a column exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Return a copy with `column` stored under `name`, replacing any
    /// existing column of that name in place.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the column length differs from the table's.
    #[must_use]
    pub fn with_column(&self, name: &str, column: Column) -> Self {
        debug_assert!(self.n_cols() == 0 || column.len() == self.n_rows());
        let mut out = self.clone();
        match out.names.iter().position(|n| n == name) {
            Some(i) => out.columns[i] = column,
            None => {
                out.names.push(name.to_string());
                out.columns.push(column);
            }
        }
        out
    }

    /// Keep only the rows at `rows`, in that order.
    #[must_use]
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
        }
    }

    /// Keep only the named columns, in the given order.
    ///
    /// Returns the first missing name on failure.
    pub fn select(&self, names: &[String]) -> Result<Self, String> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let column = self.column(name).ok_or_else(|| name.clone())?;
            columns.push((name.clone(), column.clone()));
        }
        Ok(Self::from_columns(columns).unwrap_or_default())
    }
}
