//! Row filter expressions.
//!
//! Grammar (whitespace-insensitive):
//!
//! ```text
//! expr       := comparison (("and" | "&&") comparison)*
//! comparison := operand ("<" | "<=" | ">" | ">=" | "==" | "!=") operand
//! operand    := column | "abs(" column ")" | number | 'text' | "text"
//! ```
//!
//! Comparisons against a missing value are false, so rows with `NaN` in a
//! referenced numeric column never pass.

use crate::data::{Column, Table};
use std::fmt;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl CmpOp {
    fn holds(self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            Self::Lt => ord == Less,
            Self::Le => ord != Greater,
            Self::Gt => ord == Greater,
            Self::Ge => ord != Less,
            Self::Eq => ord == Equal,
            Self::Ne => ord != Equal,
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Column value.
    Column(String),
    /// Absolute value of a numeric column.
    Abs(String),
    /// Numeric literal.
    Number(f64),
    /// Text literal.
    Text(String),
}

impl Operand {
    fn column(&self) -> Option<&str> {
        match self {
            Self::Column(c) | Self::Abs(c) => Some(c),
            Self::Number(_) | Self::Text(_) => None,
        }
    }
}

/// `lhs op rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Left operand.
    pub lhs: Operand,
    /// Operator.
    pub op: CmpOp,
    /// Right operand.
    pub rhs: Operand,
}

/// A conjunction of comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    /// All must hold for a row to be kept.
    pub terms: Vec<Comparison>,
}

/// Why an expression failed to parse or evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Malformed expression text.
    Syntax(String),
    /// Referenced column is absent.
    MissingColumn(String),
    /// `abs()` or a numeric literal applied to a text column.
    NotNumeric(String),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax(m) => write!(f, "{m}"),
            Self::MissingColumn(c) => write!(f, "missing column '{c}'"),
            Self::NotNumeric(c) => write!(f, "column '{c}' is not numeric"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Text(String),
    Op(CmpOp),
    And,
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<Token>, FilterError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '<' | '>' | '=' | '!' => {
                let two = chars.get(i + 1) == Some(&'=');
                let op = match (c, two) {
                    ('<', true) => CmpOp::Le,
                    ('<', false) => CmpOp::Lt,
                    ('>', true) => CmpOp::Ge,
                    ('>', false) => CmpOp::Gt,
                    ('=', true) => CmpOp::Eq,
                    ('!', true) => CmpOp::Ne,
                    _ => return Err(FilterError::Syntax(format!("unexpected '{c}' at {i}"))),
                };
                tokens.push(Token::Op(op));
                i += if two { 2 } else { 1 };
            }
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&x| x == c)
                    .ok_or_else(|| FilterError::Syntax("unterminated string".to_string()))?;
                tokens.push(Token::Text(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            c if c.is_ascii_digit() || c == '.' || c == '-' || c == '+' => {
                let start = i;
                i += 1;
                while i < chars.len() {
                    let d = chars[i];
                    let exp_sign = (d == '-' || d == '+') && matches!(chars[i - 1], 'e' | 'E');
                    if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exp_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| FilterError::Syntax(format!("bad number '{text}'")))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '.')) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if word.eq_ignore_ascii_case("and") {
                    tokens.push(Token::And);
                } else {
                    tokens.push(Token::Ident(word));
                }
            }
            other => return Err(FilterError::Syntax(format!("unexpected '{other}' at {i}"))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn operand(&mut self) -> Result<Operand, FilterError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Operand::Number(n)),
            Some(Token::Text(s)) => Ok(Operand::Text(s)),
            Some(Token::Ident(name)) if name == "abs" && self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                let inner = match self.next() {
                    Some(Token::Ident(col)) => col,
                    _ => return Err(FilterError::Syntax("abs() takes a column".to_string())),
                };
                match self.next() {
                    Some(Token::RParen) => Ok(Operand::Abs(inner)),
                    _ => Err(FilterError::Syntax("missing ')' after abs(".to_string())),
                }
            }
            Some(Token::Ident(name)) => Ok(Operand::Column(name)),
            Some(t) => Err(FilterError::Syntax(format!("expected operand, got {t:?}"))),
            None => Err(FilterError::Syntax("unexpected end of expression".to_string())),
        }
    }

    fn comparison(&mut self) -> Result<Comparison, FilterError> {
        let lhs = self.operand()?;
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            _ => return Err(FilterError::Syntax("expected comparison operator".to_string())),
        };
        let rhs = self.operand()?;
        Ok(Comparison { lhs, op, rhs })
    }
}

impl FilterExpr {
    /// Parse expression text.
    pub fn parse(src: &str) -> Result<Self, FilterError> {
        let tokens = tokenize(src)?;
        if tokens.is_empty() {
            return Err(FilterError::Syntax("empty expression".to_string()));
        }
        let mut parser = Parser { tokens, pos: 0 };
        let mut terms = vec![parser.comparison()?];
        while let Some(t) = parser.next() {
            if t != Token::And {
                return Err(FilterError::Syntax(format!("expected 'and', got {t:?}")));
            }
            terms.push(parser.comparison()?);
        }
        Ok(Self { terms })
    }

    /// Columns the expression reads.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        self.terms
            .iter()
            .flat_map(|t| [t.lhs.column(), t.rhs.column()])
            .flatten()
            .collect()
    }

    /// Indices of rows satisfying every term, in table order.
    pub fn matching_rows(&self, table: &Table) -> Result<Vec<usize>, FilterError> {
        for name in self.columns() {
            if !table.has_column(name) {
                return Err(FilterError::MissingColumn(name.to_string()));
            }
        }
        let mut rows = Vec::new();
        for row in 0..table.n_rows() {
            let mut keep = true;
            for term in &self.terms {
                if !eval(term, table, row)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

enum Value {
    Num(f64),
    Str(String),
    Missing,
}

fn value(operand: &Operand, table: &Table, row: usize) -> Result<Value, FilterError> {
    match operand {
        Operand::Number(n) => Ok(Value::Num(*n)),
        Operand::Text(s) => Ok(Value::Str(s.clone())),
        Operand::Column(name) => Ok(match table.column(name) {
            Some(Column::Numeric(v)) if v[row].is_nan() => Value::Missing,
            Some(Column::Numeric(v)) => Value::Num(v[row]),
            Some(Column::Text(v)) => v[row].clone().map_or(Value::Missing, Value::Str),
            None => return Err(FilterError::MissingColumn(name.clone())),
        }),
        Operand::Abs(name) => match table.column(name) {
            Some(Column::Numeric(v)) if v[row].is_nan() => Ok(Value::Missing),
            Some(Column::Numeric(v)) => Ok(Value::Num(v[row].abs())),
            Some(Column::Text(_)) => Err(FilterError::NotNumeric(name.clone())),
            None => Err(FilterError::MissingColumn(name.clone())),
        },
    }
}

fn eval(term: &Comparison, table: &Table, row: usize) -> Result<bool, FilterError> {
    let lhs = value(&term.lhs, table, row)?;
    let rhs = value(&term.rhs, table, row)?;
    Ok(match (lhs, rhs) {
        (Value::Num(a), Value::Num(b)) => a.partial_cmp(&b).is_some_and(|o| term.op.holds(o)),
        (Value::Str(a), Value::Str(b)) => term.op.holds(a.cmp(&b)),
        (Value::Str(a), Value::Num(b)) | (Value::Num(b), Value::Str(a)) => {
            // Text cell compared with a number: only (in)equality on the rendering.
            let equal = a.trim().parse::<f64>().is_ok_and(|x| x == b);
            match term.op {
                CmpOp::Eq => equal,
                CmpOp::Ne => !equal,
                _ => false,
            }
        }
        _ => false,
    })
}
