use async_trait::async_trait;

use rdiff_common::err::CResult;
use rdiff_common::types::{ColumnType, Schema, TablePath, Value};

/// The shape a caller expects `query` to parse its result set into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// A single scalar, e.g. `SELECT COUNT(*)`.
    Scalar,
    /// A single row of mixed-type columns.
    Row,
    /// A projection: many rows, each a tuple of columns.
    Rows,
    /// Raw rows with no shape assumption, for download queries.
    Raw,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Scalar(Option<Value>),
    Row(Vec<Value>),
    Rows(Vec<Vec<Value>>),
    /// Non-SELECT statements return nothing.
    None,
}

/// The minimal interface the bisection engine requires of each backend.
/// Concrete per-dialect SQL generation beyond these methods (and
/// information_schema type parsing beyond the `Schema` it produces) is
/// explicitly out of scope — callers only rely on this contract.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Establishes whatever connection or pool this adapter needs.
    /// Idempotent: calling it again on an already-connected adapter is a
    /// no-op.
    async fn connect(&self) -> CResult<()>;

    async fn close(&self) -> CResult<()>;

    /// Executes `sql`, parsing the result per `shape`.
    async fn query(&self, sql: &str, shape: ResultShape) -> CResult<QueryResult>;

    /// Engine-specific identifier delimiting, honoring `case_sensitive`.
    fn quote(&self, identifier: &str, case_sensitive: bool) -> String;

    /// Splits a dotted table reference into a path.
    fn parse_table_name(&self, s: &str) -> CResult<TablePath> {
        TablePath::parse(s)
    }

    /// Resolves a path against this adapter's default schema, rejecting
    /// paths with more than two components (already enforced by
    /// `TablePath`, but kept here so adapters can apply engine-specific
    /// defaulting, e.g. Snowflake's database.schema.table).
    fn normalize_table_path(&self, path: &TablePath) -> CResult<(String, String)>;

    /// Reads `information_schema.columns` (or the engine's equivalent),
    /// optionally restricted to `filter_cols`, and refines `Text` columns
    /// to `Uuid` by sampling `UUID_SAMPLE_SIZE` values.
    async fn query_table_schema(
        &self,
        path: &TablePath,
        filter_cols: Option<&[String]>,
    ) -> CResult<Schema>;

    /// Emits the SQL expression normalizing `col_ref` per `col_type`, per
    /// the Value Normalizer contract (§4.1). Returns `Err(TypeError)` for
    /// `Unknown` columns.
    fn normalize_value_sql(&self, col_ref: &str, col_type: &ColumnType) -> CResult<String>;

    /// Engine-specific pagination clause. Engines without `OFFSET` must
    /// reject `offset > 0` with `NotImplementedError` rather than silently
    /// ignoring it.
    fn offset_limit(&self, offset: Option<u64>, limit: Option<u64>) -> CResult<String>;

    /// SQL producing a 60-bit integer from an MD5 hex digest expression.
    fn md5_to_int_sql(&self, expr: &str) -> String;
}
