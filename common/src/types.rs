//! The cross-engine data model: column types, table paths, schemas, and
//! the runtime value/row representation diff records are built from.

use std::fmt;

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;

use crate::err::{CResult, ReError};

/// A tagged column type. Closed by design: every normalization and
/// checksum rule dispatches on this tag rather than on an open class
/// hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    Integer,
    /// `scale` fractional digits.
    Decimal { scale: u32 },
    /// `digits` decimal digits of precision, derived from the native
    /// binary float precision as `floor(log10(2^p))`.
    Float { digits: u32 },
    /// `precision` fractional-second digits as stored; `rounds_on_precision_loss`
    /// selects rounding vs. truncation when reducing to 6 digits.
    Temporal {
        precision: u32,
        rounds_on_precision_loss: bool,
    },
    Text,
    Uuid,
    /// The adapter could not map this to a known type; the raw
    /// engine-reported type name is kept for diagnostics.
    Unknown(String),
}

impl ColumnType {
    /// `floor(log10(2^binary_precision))`, used to build `Float { digits }`
    /// from a native binary float precision (e.g. 53 for IEEE double).
    pub fn float_digits_from_binary_precision(binary_precision: u32) -> u32 {
        ((binary_precision as f64) * std::f64::consts::LOG10_2).floor() as u32
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ColumnType::Unknown(_))
    }
}

/// An ordered sequence of 1 or 2 identifiers: `[table]` or `[schema, table]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePath(Vec<String>);

impl TablePath {
    pub fn new(parts: Vec<String>) -> CResult<Self> {
        if parts.is_empty() || parts.len() > 2 {
            return Err(ReError::ValueError(format!(
                "table path must have 1 or 2 components, got {}",
                parts.len()
            )));
        }
        Ok(TablePath(parts))
    }

    /// Splits a dotted string into a path, e.g. `"public.users"` or `"users"`.
    pub fn parse(s: &str) -> CResult<Self> {
        let parts: Vec<String> = s.split('.').map(|p| p.to_string()).collect();
        Self::new(parts)
    }

    /// Resolves against a default schema, producing `(schema, table)`.
    /// A length-1 path is resolved against `default_schema`; length-2 is
    /// used as-is; anything else was already rejected at construction.
    pub fn normalize<'a>(&'a self, default_schema: &'a str) -> (&'a str, &'a str) {
        match self.0.len() {
            1 => (default_schema, self.0[0].as_str()),
            2 => (self.0[0].as_str(), self.0[1].as_str()),
            _ => unreachable!("TablePath invariant: 1 or 2 components"),
        }
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for TablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// An ordered mapping from column name to column type, as returned by
/// `query_table_schema`.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns: Vec<(String, ColumnType)>,
}

impl Schema {
    pub fn new(columns: Vec<(String, ColumnType)>) -> Self {
        Schema { columns }
    }

    pub fn get(&self, name: &str) -> Option<&ColumnType> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, ColumnType)> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Reclassifies a `Text` column as `Uuid` if every sampled value is a
    /// well-formed UUID string. Called by adapters after sampling
    /// `UUID_SAMPLE_SIZE` values; a mixed sample is left as `Text` by the
    /// caller, which logs a warning.
    pub fn reclassify(&mut self, name: &str, ty: ColumnType) {
        if let Some(entry) = self.columns.iter_mut().find(|(n, _)| n == name) {
            entry.1 = ty;
        }
    }
}

/// A runtime column value, typed loosely enough to flow from any adapter's
/// row decoding into normalization and checksum computation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Decimal(BigDecimal),
    Float(f64),
    /// The timestamp plus its native fractional-second precision, needed
    /// to decide padding vs. rounding during normalization.
    Temporal(NaiveDateTime, u32),
    Text(String),
    Uuid(String),
    Unknown(String),
}

/// `"+"` or `"-"`, as in spec: `"-"` means present in source but not
/// target, `"+"` the converse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Minus,
    Plus,
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sign::Minus => "-",
            Sign::Plus => "+",
        })
    }
}

/// `(sign, row)` as emitted by the bisection engine. `row` holds each
/// column already normalized to text (spec: "the ordered tuple of
/// normalized column values"), not the adapter's typed `Value`s — that's
/// what lets a source-engine row and a target-engine row compare equal
/// byte-for-byte when they represent the same logical value.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffRecord {
    pub sign: Sign,
    pub row: Vec<String>,
}

impl DiffRecord {
    pub fn new(sign: Sign, row: Vec<String>) -> Self {
        DiffRecord { sign, row }
    }
}
