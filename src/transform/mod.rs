//! Table transforms.
//!
//! A transform chain is an ordered list of [`TransformSpec`]s. Each spec is
//! parsed into a typed [`Transform`] (validation uses the same parser) and
//! applied to a copy of the table, so inputs shared through the cache are
//! never mutated.
//!
//! # Built-in operations
//!
//! | op | arguments |
//! |----|-----------|
//! | `p_adjust` | `column`, `method` (`bh`, `bonferroni`), `out` |
//! | `filter` | `expr` |
//! | `derive` | `column`, `fn`, `out` |
//! | `log2fc` | `num`, `den`, `out`, `eps` |
//! | `sort` | `by`, `descending` |
//! | `select` | `columns` |
//! | `significance` | `column`, `out` |

mod filter;
mod padjust;

pub use filter::{CmpOp, Comparison, FilterError, FilterExpr, Operand};
pub use padjust::{benjamini_hochberg, bonferroni};

use crate::data::{Column, Table};
use crate::error::TransformError;
use crate::recipe::{ArgBag, TransformSpec};
use serde_yaml_ng::Value;

/// Names of every built-in operation, aliases included.
pub const OPERATIONS: &[&str] = &[
    "p_adjust",
    "p_adjust_bh",
    "filter",
    "derive",
    "mutate",
    "log2fc",
    "sort",
    "select",
    "significance",
    "add_significance",
];

/// Multiple-testing correction method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustMethod {
    /// Benjamini-Hochberg FDR.
    BenjaminiHochberg,
    /// Bonferroni FWER.
    Bonferroni,
}

/// Element-wise function for `derive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeriveFn {
    /// `-log10(x)`
    NegLog10,
    /// `log10(x)`
    Log10,
    /// `log2(x)`
    Log2,
    /// `ln(x)`
    Ln,
    /// `|x|`
    Abs,
    /// `-x`
    Neg,
}

impl DeriveFn {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "neg_log10" | "-log10" => Self::NegLog10,
            "log10" => Self::Log10,
            "log2" => Self::Log2,
            "ln" | "log" => Self::Ln,
            "abs" => Self::Abs,
            "neg" => Self::Neg,
            _ => return None,
        })
    }

    const fn name(self) -> &'static str {
        match self {
            Self::NegLog10 => "neg_log10",
            Self::Log10 => "log10",
            Self::Log2 => "log2",
            Self::Ln => "ln",
            Self::Abs => "abs",
            Self::Neg => "neg",
        }
    }

    /// Apply to one value. Logs of non-positive values are `NaN`.
    #[must_use]
    pub fn eval(self, x: f64) -> f64 {
        let log_domain = |v: f64, f: fn(f64) -> f64| if v > 0.0 { f(v) } else { f64::NAN };
        match self {
            Self::NegLog10 => -log_domain(x, f64::log10),
            Self::Log10 => log_domain(x, f64::log10),
            Self::Log2 => log_domain(x, f64::log2),
            Self::Ln => log_domain(x, f64::ln),
            Self::Abs => x.abs(),
            Self::Neg => -x,
        }
    }
}

/// A parsed, typed transform.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Adjust a p-value column into `out`.
    PAdjust {
        /// Input p-values.
        column: String,
        /// Correction method.
        method: AdjustMethod,
        /// Output column.
        out: String,
    },
    /// Keep rows matching an expression.
    Filter(FilterExpr),
    /// Element-wise function of one column.
    Derive {
        /// Input column.
        column: String,
        /// Function.
        func: DeriveFn,
        /// Output column.
        out: String,
    },
    /// `log2((num + eps) / (den + eps))`.
    Log2Fc {
        /// Numerator column.
        num: String,
        /// Denominator column.
        den: String,
        /// Output column.
        out: String,
        /// Pseudo-count.
        eps: f64,
    },
    /// Stable sort with missing values last.
    Sort {
        /// Sort key column.
        by: String,
        /// Largest first.
        descending: bool,
    },
    /// Keep only the listed columns.
    Select(Vec<String>),
    /// Star annotation from p-values.
    Significance {
        /// Input p-values.
        column: String,
        /// Output text column.
        out: String,
    },
}

/// Star label for a p-value: `***` < 0.001, `**` < 0.01, `*` < 0.05, else `ns`.
#[must_use]
pub fn significance_label(p: f64) -> &'static str {
    if p < 0.001 {
        "***"
    } else if p < 0.01 {
        "**"
    } else if p < 0.05 {
        "*"
    } else {
        "ns"
    }
}

// ============================================================================
// Argument access
// ============================================================================

struct Args<'a> {
    op: &'a str,
    bag: &'a ArgBag,
}

impl<'a> Args<'a> {
    fn invalid(&self, arg: &str, reason: impl Into<String>) -> TransformError {
        TransformError::InvalidArgument {
            op: self.op.to_string(),
            arg: arg.to_string(),
            reason: reason.into(),
        }
    }

    fn allow_only(&self, keys: &[&str]) -> Result<(), TransformError> {
        match self.bag.keys().find(|k| !keys.contains(&k.as_str())) {
            Some(k) => Err(self.invalid(k, format!("unknown argument; expected one of {keys:?}"))),
            None => Ok(()),
        }
    }

    fn string(&self, key: &str) -> Result<Option<String>, TransformError> {
        match self.bag.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s.clone())),
            Some(Value::String(_)) => Err(self.invalid(key, "must not be empty")),
            Some(_) => Err(self.invalid(key, "must be a string")),
        }
    }

    fn string_any(&self, keys: &[&str]) -> Result<Option<String>, TransformError> {
        for key in keys {
            if let Some(s) = self.string(key)? {
                return Ok(Some(s));
            }
        }
        Ok(None)
    }

    fn required(&self, keys: &[&str]) -> Result<String, TransformError> {
        self.string_any(keys)?
            .ok_or_else(|| self.invalid(keys[0], "required"))
    }

    fn number(&self, key: &str) -> Result<Option<f64>, TransformError> {
        match self.bag.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| self.invalid(key, "must be a finite number")),
            Some(_) => Err(self.invalid(key, "must be a number")),
        }
    }

    fn boolean(&self, key: &str) -> Result<Option<bool>, TransformError> {
        match self.bag.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(self.invalid(key, "must be true or false")),
        }
    }

    fn string_list(&self, key: &str) -> Result<Vec<String>, TransformError> {
        match self.bag.get(key) {
            Some(Value::Sequence(items)) if !items.is_empty() => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(self.invalid(key, "must be a list of column names")),
                })
                .collect(),
            Some(Value::String(s)) => Ok(s.split(',').map(|c| c.trim().to_string()).collect()),
            Some(_) => Err(self.invalid(key, "must be a non-empty list of column names")),
            None => Err(self.invalid(key, "required")),
        }
    }
}

impl Transform {
    /// Parse and check one transform declaration without touching data.
    pub fn from_spec(spec: &TransformSpec) -> Result<Self, TransformError> {
        let args = Args {
            op: &spec.op,
            bag: &spec.args,
        };

        match spec.op.as_str() {
            "p_adjust" | "p_adjust_bh" => {
                args.allow_only(&["column", "pcol", "method", "out"])?;
                let method = match args.string("method")?.as_deref() {
                    None | Some("bh" | "BH" | "fdr" | "benjamini_hochberg") => {
                        AdjustMethod::BenjaminiHochberg
                    }
                    Some("bonferroni") => AdjustMethod::Bonferroni,
                    Some(other) => {
                        return Err(args.invalid("method", format!("unknown method '{other}'")))
                    }
                };
                Ok(Self::PAdjust {
                    column: args.required(&["column", "pcol"])?,
                    method,
                    out: args.string("out")?.unwrap_or_else(|| "p_adj".to_string()),
                })
            }
            "filter" => {
                args.allow_only(&["expr"])?;
                let expr = args.required(&["expr"])?;
                FilterExpr::parse(&expr)
                    .map(Self::Filter)
                    .map_err(|e| args.invalid("expr", e.to_string()))
            }
            "derive" | "mutate" => {
                args.allow_only(&["column", "fn", "out"])?;
                let column = args.required(&["column"])?;
                let fn_name = args.required(&["fn"])?;
                let func = DeriveFn::parse(&fn_name)
                    .ok_or_else(|| args.invalid("fn", format!("unknown function '{fn_name}'")))?;
                let out = args
                    .string("out")?
                    .unwrap_or_else(|| format!("{}_{column}", func.name()));
                Ok(Self::Derive { column, func, out })
            }
            "log2fc" => {
                args.allow_only(&["num", "den", "out", "eps"])?;
                let eps = args.number("eps")?.unwrap_or(1e-9);
                if eps < 0.0 {
                    return Err(args.invalid("eps", "must be non-negative"));
                }
                Ok(Self::Log2Fc {
                    num: args.required(&["num"])?,
                    den: args.required(&["den"])?,
                    out: args.string("out")?.unwrap_or_else(|| "log2fc".to_string()),
                    eps,
                })
            }
            "sort" => {
                args.allow_only(&["by", "descending"])?;
                Ok(Self::Sort {
                    by: args.required(&["by"])?,
                    descending: args.boolean("descending")?.unwrap_or(false),
                })
            }
            "select" => {
                args.allow_only(&["columns"])?;
                Ok(Self::Select(args.string_list("columns")?))
            }
            "significance" | "add_significance" => {
                args.allow_only(&["column", "pcol", "out"])?;
                Ok(Self::Significance {
                    column: args.required(&["column", "pcol"])?,
                    out: args.string("out")?.unwrap_or_else(|| "significance".to_string()),
                })
            }
            other => Err(TransformError::UnknownOp {
                op: other.to_string(),
            }),
        }
    }

    /// Canonical operation name.
    #[must_use]
    pub const fn op(&self) -> &'static str {
        match self {
            Self::PAdjust { .. } => "p_adjust",
            Self::Filter(_) => "filter",
            Self::Derive { .. } => "derive",
            Self::Log2Fc { .. } => "log2fc",
            Self::Sort { .. } => "sort",
            Self::Select(_) => "select",
            Self::Significance { .. } => "significance",
        }
    }

    fn numeric<'t>(&self, table: &'t Table, column: &str) -> Result<&'t [f64], TransformError> {
        match table.column(column) {
            Some(Column::Numeric(v)) => Ok(v),
            Some(Column::Text(_)) => Err(TransformError::TypeMismatch {
                op: self.op().to_string(),
                column: column.to_string(),
                expected: "numeric".to_string(),
            }),
            None => Err(self.missing(column)),
        }
    }

    fn missing(&self, column: &str) -> TransformError {
        TransformError::MissingColumn {
            op: self.op().to_string(),
            column: column.to_string(),
        }
    }

    /// Apply to `table`, returning a new table.
    pub fn apply(&self, table: &Table) -> Result<Table, TransformError> {
        match self {
            Self::PAdjust { column, method, out } => {
                let p = self.numeric(table, column)?;
                if p.iter().any(|v| v.is_finite() && !(0.0..=1.0).contains(v)) {
                    return Err(TransformError::InvalidArgument {
                        op: self.op().to_string(),
                        arg: "column".to_string(),
                        reason: format!("'{column}' holds values outside [0, 1]"),
                    });
                }
                let adjusted = match method {
                    AdjustMethod::BenjaminiHochberg => benjamini_hochberg(p),
                    AdjustMethod::Bonferroni => bonferroni(p),
                };
                Ok(table.with_column(out, Column::Numeric(adjusted)))
            }
            Self::Filter(expr) => {
                let rows = expr.matching_rows(table).map_err(|e| match e {
                    FilterError::MissingColumn(c) => self.missing(&c),
                    FilterError::NotNumeric(c) => TransformError::TypeMismatch {
                        op: self.op().to_string(),
                        column: c,
                        expected: "numeric".to_string(),
                    },
                    FilterError::Syntax(reason) => TransformError::InvalidArgument {
                        op: self.op().to_string(),
                        arg: "expr".to_string(),
                        reason,
                    },
                })?;
                Ok(table.take_rows(&rows))
            }
            Self::Derive { column, func, out } => {
                let values = self.numeric(table, column)?;
                let derived = values.iter().map(|&x| func.eval(x)).collect();
                Ok(table.with_column(out, Column::Numeric(derived)))
            }
            Self::Log2Fc { num, den, out, eps } => {
                let n = self.numeric(table, num)?;
                let d = self.numeric(table, den)?;
                let fc = n
                    .iter()
                    .zip(d)
                    .map(|(&a, &b)| {
                        let ratio = (a + eps) / (b + eps);
                        if ratio > 0.0 { ratio.log2() } else { f64::NAN }
                    })
                    .collect();
                Ok(table.with_column(out, Column::Numeric(fc)))
            }
            Self::Sort { by, descending } => {
                let column = table.column(by).ok_or_else(|| self.missing(by))?;
                let mut rows: Vec<usize> = (0..table.n_rows()).collect();
                match column {
                    Column::Numeric(v) => rows.sort_by(|&a, &b| {
                        match (v[a].is_nan(), v[b].is_nan()) {
                            (true, true) => std::cmp::Ordering::Equal,
                            (true, false) => std::cmp::Ordering::Greater,
                            (false, true) => std::cmp::Ordering::Less,
                            (false, false) if *descending => v[b].total_cmp(&v[a]),
                            (false, false) => v[a].total_cmp(&v[b]),
                        }
                    }),
                    Column::Text(v) => rows.sort_by(|&a, &b| match (&v[a], &v[b]) {
                        (None, None) => std::cmp::Ordering::Equal,
                        (None, Some(_)) => std::cmp::Ordering::Greater,
                        (Some(_), None) => std::cmp::Ordering::Less,
                        (Some(x), Some(y)) if *descending => y.cmp(x),
                        (Some(x), Some(y)) => x.cmp(y),
                    }),
                }
                Ok(table.take_rows(&rows))
            }
            Self::Select(columns) => table.select(columns).map_err(|c| self.missing(&c)),
            Self::Significance { column, out } => {
                let p = self.numeric(table, column)?;
                let labels = p
                    .iter()
                    .map(|&v| (!v.is_nan()).then(|| significance_label(v).to_string()))
                    .collect();
                Ok(table.with_column(out, Column::Text(labels)))
            }
        }
    }
}

/// Apply a transform chain in order. The input table is left untouched.
pub fn apply(table: &Table, specs: &[TransformSpec]) -> Result<Table, TransformError> {
    let mut current = table.clone();
    for spec in specs {
        let transform = Transform::from_spec(spec)?;
        current = transform.apply(&current)?;
        tracing::debug!(
            op = transform.op(),
            rows = current.n_rows(),
            cols = current.n_cols(),
            "transform applied"
        );
    }
    Ok(current)
}
