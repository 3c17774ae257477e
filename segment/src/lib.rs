//! Table Segment (spec §4.2/§3): an immutable, key-bounded view of a
//! table, with the `count`/`checksum`/`count_and_checksum` primitives
//! the bisection engine drives.

pub mod key;

use std::sync::{Arc, OnceLock};

use chrono::NaiveDateTime;

use rdiff_adapter::contract::{DatabaseAdapter, QueryResult, ResultShape};
use rdiff_common::err::{CResult, ReError};
use rdiff_common::types::{Schema, TablePath, Value};
use rdiff_normalize::normalize_value;
use rdiff_partition::split_space;

pub use key::{format_key_literal, parse_key, KeyKind};

/// A key-bounded, optionally update-time-bounded, column-projected view
/// of a table on one side of a diff. Cheap to clone: the schema cache and
/// adapter handle are both shared.
#[derive(Clone)]
pub struct TableSegment {
    adapter: Arc<dyn DatabaseAdapter>,
    table_path: TablePath,
    key_column: String,
    key_kind: KeyKind,
    update_column: Option<String>,
    extra_columns: Vec<String>,
    min_key: Option<i128>,
    max_key: Option<i128>,
    min_update: Option<NaiveDateTime>,
    max_update: Option<NaiveDateTime>,
    case_sensitive: bool,
    schema: Arc<OnceLock<Schema>>,
}

impl TableSegment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        adapter: Arc<dyn DatabaseAdapter>,
        table_path: TablePath,
        key_column: String,
        key_kind: KeyKind,
        update_column: Option<String>,
        extra_columns: Vec<String>,
        case_sensitive: bool,
    ) -> Self {
        TableSegment {
            adapter,
            table_path,
            key_column,
            key_kind,
            update_column,
            extra_columns,
            min_key: None,
            max_key: None,
            min_update: None,
            max_update: None,
            case_sensitive,
            schema: Arc::new(OnceLock::new()),
        }
    }

    pub fn min_key(&self) -> Option<i128> {
        self.min_key
    }

    pub fn max_key(&self) -> Option<i128> {
        self.max_key
    }

    /// Returns a copy with key bounds replaced. Validates `lo <= hi`.
    pub fn new_key_bounds(&self, lo: i128, hi: i128) -> CResult<Self> {
        validate_bounds(
            Some(lo),
            Some(hi),
            self.min_update,
            self.max_update,
            self.update_column.is_some(),
        )?;
        Ok(TableSegment {
            min_key: Some(lo),
            max_key: Some(hi),
            ..self.clone()
        })
    }

    /// Returns a copy with update-time bounds replaced. Validates
    /// `lo <= hi`; fails if no update column was configured.
    pub fn new_update_bounds(&self, lo: NaiveDateTime, hi: NaiveDateTime) -> CResult<Self> {
        validate_bounds(
            self.min_key,
            self.max_key,
            Some(lo),
            Some(hi),
            self.update_column.is_some(),
        )?;
        Ok(TableSegment {
            min_update: Some(lo),
            max_update: Some(hi),
            ..self.clone()
        })
    }

    /// Forces schema resolution if absent; idempotent. Only the key,
    /// update, and extra columns are requested.
    pub async fn with_schema(&self) -> CResult<Self> {
        if self.schema.get().is_none() {
            let filter_cols = self.projection_columns();
            let schema = self
                .adapter
                .query_table_schema(&self.table_path, Some(&filter_cols))
                .await?;
            // Another clone may have raced us; either outcome is fine,
            // both came from the same query shape.
            let _ = self.schema.set(schema);
        }
        Ok(self.clone())
    }

    /// `n-1` interior integer keys partitioning `[min_key, max_key)` into
    /// `n` sub-ranges of near-equal key-space width.
    pub fn choose_checkpoints(&self, n: usize) -> CResult<Vec<i128>> {
        if n == 0 {
            return Err(ReError::ValueError("choose_checkpoints requires n >= 1".into()));
        }
        let lo = self
            .min_key
            .ok_or_else(|| ReError::ValueError("segment has no min_key bound".into()))?;
        let hi = self
            .max_key
            .ok_or_else(|| ReError::ValueError("segment has no max_key bound".into()))?;
        if n == 1 {
            return Ok(Vec::new());
        }
        split_space(lo, hi, n - 1)
    }

    /// `SELECT MIN(k), MAX(k)` over whatever bounds are already set (only
    /// the update bounds matter in practice, since this exists to fill in
    /// *absent* key bounds). `None` for an empty table.
    pub async fn discover_key_bounds(&self) -> CResult<Option<(i128, i128)>> {
        let key_col = self.adapter.quote(&self.key_column, self.case_sensitive);
        let sql = format!(
            "SELECT MIN({key_col}), MAX({key_col}) FROM {} WHERE {}",
            self.table_ref()?,
            self.bounds_sql()?
        );
        match self.adapter.query(&sql, ResultShape::Row).await? {
            QueryResult::Row(row) if row.len() == 2 => {
                if matches!(row[0], Value::Null) || matches!(row[1], Value::Null) {
                    return Ok(None);
                }
                let lo = key_value_to_i128(self.key_kind, &row[0])?;
                let hi = key_value_to_i128(self.key_kind, &row[1])?;
                Ok(Some((lo, hi)))
            }
            other => Err(ReError::QueryError(format!(
                "expected a 2-column min/max row, got {other:?}"
            ))),
        }
    }

    pub async fn count(&self) -> CResult<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            self.table_ref()?,
            self.bounds_sql()?
        );
        match self.adapter.query(&sql, ResultShape::Scalar).await? {
            QueryResult::Scalar(Some(Value::Integer(n))) if n >= 0 => Ok(n as u64),
            other => Err(ReError::QueryError(format!(
                "expected a non-negative scalar count, got {other:?}"
            ))),
        }
    }

    /// Returns `null` for empty segments (SQL `SUM(...)` of zero rows).
    pub async fn checksum(&self) -> CResult<Option<i128>> {
        let schema = self.require_schema()?;
        let term = self.checksum_term(schema)?;
        let sql = format!(
            "SELECT SUM({term}) FROM {} WHERE {}",
            self.table_ref()?,
            self.bounds_sql()?
        );
        match self.adapter.query(&sql, ResultShape::Scalar).await? {
            QueryResult::Scalar(None) | QueryResult::Scalar(Some(Value::Null)) => Ok(None),
            QueryResult::Scalar(Some(v)) => Ok(Some(value_to_checksum(&v)?)),
            other => Err(ReError::QueryError(format!("expected a scalar checksum, got {other:?}"))),
        }
    }

    /// Single round trip; both values are derived from the same scan.
    pub async fn count_and_checksum(&self) -> CResult<(u64, Option<i128>)> {
        let schema = self.require_schema()?;
        let term = self.checksum_term(schema)?;
        let sql = format!(
            "SELECT COUNT(*), SUM({term}) FROM {} WHERE {}",
            self.table_ref()?,
            self.bounds_sql()?
        );
        match self.adapter.query(&sql, ResultShape::Row).await? {
            QueryResult::Row(row) if row.len() == 2 => {
                let count = match &row[0] {
                    Value::Integer(n) if *n >= 0 => *n as u64,
                    other => {
                        return Err(ReError::QueryError(format!(
                            "expected a non-negative integer count, got {other:?}"
                        )))
                    }
                };
                let checksum = match &row[1] {
                    Value::Null => None,
                    v => Some(value_to_checksum(v)?),
                };
                Ok((count, checksum))
            }
            other => Err(ReError::QueryError(format!("expected a 2-column row, got {other:?}"))),
        }
    }

    /// Fetches every row in the segment ordered by key ascending, as
    /// `(key, normalized_columns)` pairs — the key column plus the
    /// configured extra columns, in that order, each normalized to its
    /// canonical text form (spec §3/§4.1) so the merge in `download_and_emit`
    /// compares like values cross-engine rather than raw adapter bytes.
    /// Used once a sub-range is small or narrow enough to stop bisecting.
    pub async fn download_rows(&self) -> CResult<Vec<(i128, Vec<String>)>> {
        let key_col = self.adapter.quote(&self.key_column, self.case_sensitive);
        let mut select_cols = vec![key_col.clone()];
        select_cols.extend(self.extra_columns.iter().map(|c| self.adapter.quote(c, self.case_sensitive)));
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {key_col} ASC",
            select_cols.join(", "),
            self.table_ref()?,
            self.bounds_sql()?
        );
        let schema = self.require_schema()?;
        let mut proj_cols: Vec<&str> = vec![self.key_column.as_str()];
        proj_cols.extend(self.extra_columns.iter().map(|s| s.as_str()));

        match self.adapter.query(&sql, ResultShape::Rows).await? {
            QueryResult::Rows(rows) => rows
                .into_iter()
                .map(|row| {
                    let key = row
                        .first()
                        .ok_or_else(|| ReError::QueryError("downloaded row has no key column".into()))
                        .and_then(|v| key_value_to_i128(self.key_kind, v))?;
                    let normalized = proj_cols
                        .iter()
                        .zip(row)
                        .map(|(col, value)| {
                            let ty = schema.get(col).ok_or_else(|| {
                                ReError::TypeError(format!("column {col:?} missing from resolved schema"))
                            })?;
                            normalize_value(&value, ty)
                        })
                        .collect::<CResult<Vec<String>>>()?;
                    Ok((key, normalized))
                })
                .collect(),
            other => Err(ReError::QueryError(format!("expected a row set, got {other:?}"))),
        }
    }

    fn require_schema(&self) -> CResult<&Schema> {
        self.schema
            .get()
            .ok_or_else(|| ReError::ValueError("segment has no resolved schema; call with_schema() first".into()))
    }

    fn projection_columns(&self) -> Vec<String> {
        let mut cols = vec![self.key_column.clone()];
        if let Some(update_col) = &self.update_column {
            cols.push(update_col.clone());
        }
        cols.extend(self.extra_columns.iter().cloned());
        cols
    }

    fn table_ref(&self) -> CResult<String> {
        let (schema, table) = self.adapter.normalize_table_path(&self.table_path)?;
        Ok(format!(
            "{}.{}",
            self.adapter.quote(&schema, self.case_sensitive),
            self.adapter.quote(&table, self.case_sensitive)
        ))
    }

    fn bounds_sql(&self) -> CResult<String> {
        let mut clauses = Vec::new();
        let key_col = self.adapter.quote(&self.key_column, self.case_sensitive);
        if let Some(lo) = self.min_key {
            clauses.push(format!("{key_col} >= {}", format_key_literal(self.key_kind, lo)?));
        }
        if let Some(hi) = self.max_key {
            clauses.push(format!("{key_col} < {}", format_key_literal(self.key_kind, hi)?));
        }
        if let Some(update_col) = &self.update_column {
            let update_col = self.adapter.quote(update_col, self.case_sensitive);
            if let Some(lo) = self.min_update {
                clauses.push(format!("{update_col} >= '{}'", lo.format("%Y-%m-%d %H:%M:%S%.f")));
            }
            if let Some(hi) = self.max_update {
                clauses.push(format!("{update_col} < '{}'", hi.format("%Y-%m-%d %H:%M:%S%.f")));
            }
        }
        if clauses.is_empty() {
            Ok("1=1".to_string())
        } else {
            Ok(clauses.join(" AND "))
        }
    }

    /// The key column plus every extra (projection) column participates
    /// in the checksum, not the projection alone: dropping the key would
    /// let two segments whose rows were shuffled across the same key
    /// range checksum equal despite differing row-to-key assignment.
    fn checksum_term(&self, schema: &Schema) -> CResult<String> {
        let mut cols: Vec<&str> = vec![self.key_column.as_str()];
        cols.extend(self.extra_columns.iter().map(|s| s.as_str()));

        let mut exprs = Vec::with_capacity(cols.len());
        for col in cols {
            let ty = schema
                .get(col)
                .ok_or_else(|| ReError::TypeError(format!("column {col:?} missing from resolved schema")))?;
            let quoted = self.adapter.quote(col, self.case_sensitive);
            exprs.push(self.adapter.normalize_value_sql(&quoted, ty)?);
        }
        let concat_expr = exprs.join(" || ");
        Ok(self.adapter.md5_to_int_sql(&concat_expr))
    }
}

fn key_value_to_i128(kind: KeyKind, v: &Value) -> CResult<i128> {
    match (kind, v) {
        (KeyKind::Integer, Value::Integer(i)) => Ok(*i as i128),
        (KeyKind::Integer, Value::Text(s)) => s
            .trim()
            .parse::<i128>()
            .map_err(|_| ReError::TypeError(format!("key value {s:?} is not a valid integer"))),
        (KeyKind::Uuid, Value::Uuid(s)) | (KeyKind::Uuid, Value::Text(s)) => parse_key(KeyKind::Uuid, s),
        (k, other) => Err(ReError::TypeError(format!(
            "key value {other:?} does not match key kind {k:?}"
        ))),
    }
}

fn validate_bounds(
    min_key: Option<i128>,
    max_key: Option<i128>,
    min_update: Option<NaiveDateTime>,
    max_update: Option<NaiveDateTime>,
    has_update_column: bool,
) -> CResult<()> {
    if let (Some(lo), Some(hi)) = (min_key, max_key) {
        if lo > hi {
            return Err(ReError::ValueError(format!("min_key {lo} must be <= max_key {hi}")));
        }
    }
    if let (Some(lo), Some(hi)) = (min_update, max_update) {
        if lo > hi {
            return Err(ReError::ValueError(format!("min_update {lo} must be <= max_update {hi}")));
        }
    }
    if (min_update.is_some() || max_update.is_some()) && !has_update_column {
        return Err(ReError::ValueError(
            "update-time bounds require an update_column".into(),
        ));
    }
    Ok(())
}

/// Parses the SQL `SUM(...)` result of a checksum query back into the
/// accumulator space `rdiff_common::checksum::sum_reduce` works in.
fn value_to_checksum(v: &Value) -> CResult<i128> {
    match v {
        Value::Integer(i) => Ok(*i as i128),
        Value::Decimal(d) => d
            .to_string()
            .parse::<i128>()
            .map_err(|e| ReError::ValueError(format!("checksum sum {d} does not fit in i128: {e}"))),
        Value::Text(s) => s
            .parse::<i128>()
            .map_err(|e| ReError::ValueError(format!("checksum sum {s:?} is not an integer: {e}"))),
        other => Err(ReError::TypeError(format!(
            "checksum sum has unexpected value type {other:?}"
        ))),
    }
}
