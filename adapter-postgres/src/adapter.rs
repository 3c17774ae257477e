//! Concrete `DatabaseAdapter` for PostgreSQL (spec §4.6). Every query the
//! engine issues is plain SQL with inline literal bounds — no prepared
//! statements are required — so this adapter runs everything through
//! `simple_query`, the text (simple-query) protocol, rather than the
//! binary extended protocol. That sidesteps needing a `FromSql` codec
//! for every column type the engine might encounter: counts and
//! checksums come back as decimal text parsed directly; downloaded rows
//! come back as raw column text, which is exactly what the download
//! fallback needs since it only compares rows for byte equality.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::warn;

use rdiff_adapter::contract::{DatabaseAdapter, QueryResult, ResultShape};
use rdiff_common::constants::UUID_SAMPLE_SIZE;
use rdiff_common::err::{CResult, ReError};
use rdiff_common::types::{ColumnType, Schema, TablePath, Value};
use rdiff_normalize::normalize_expr;

pub struct PostgresAdapter {
    conninfo: String,
    default_schema: String,
    client: Mutex<Option<Client>>,
    /// `--interactive` CLI mode (spec "interactive-EXPLAIN flag"): before
    /// running a `SELECT`, print its plan and ask for confirmation.
    interactive: bool,
}

impl PostgresAdapter {
    pub fn new(conninfo: impl Into<String>, default_schema: impl Into<String>) -> Self {
        PostgresAdapter {
            conninfo: conninfo.into(),
            default_schema: default_schema.into(),
            client: Mutex::new(None),
            interactive: false,
        }
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    async fn run_simple(&self, sql: &str) -> CResult<Vec<SimpleQueryMessage>> {
        if self.interactive && sql.trim_start().to_uppercase().starts_with("SELECT") {
            self.explain_and_confirm(sql).await?;
        }
        let guard = self.client.lock().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| ReError::ConnectError("postgres adapter is not connected".into()))?;
        client
            .simple_query(sql)
            .await
            .map_err(|e| ReError::QueryError(format!("postgres query failed: {e}")))
    }

    /// Logs `EXPLAIN`'s plan and blocks on a `y/n` confirmation, per the
    /// original's `_interactive` query path. Declining aborts the whole
    /// diff with a `ValueError`, which the CLI surfaces as exit code 2.
    async fn explain_and_confirm(&self, sql: &str) -> CResult<()> {
        let plan = {
            let guard = self.client.lock().await;
            let client = guard
                .as_ref()
                .ok_or_else(|| ReError::ConnectError("postgres adapter is not connected".into()))?;
            client
                .simple_query(&format!("EXPLAIN {sql}"))
                .await
                .map_err(|e| ReError::QueryError(format!("postgres explain failed: {e}")))?
        };
        for message in plan {
            if let SimpleQueryMessage::Row(row) = message {
                if let Some(line) = row.get(0) {
                    warn!("EXPLAIN: {line}");
                }
            }
        }
        let confirmed = tokio::task::spawn_blocking(|| {
            use std::io::Write;
            print!("Continue? [y/n] ");
            let _ = std::io::stdout().flush();
            let mut answer = String::new();
            std::io::stdin().read_line(&mut answer).is_ok() && matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
        })
        .await
        .map_err(|e| ReError::IoError(std::io::Error::other(e)))?;
        if confirmed {
            Ok(())
        } else {
            Err(ReError::ValueError("diff aborted interactively".into()))
        }
    }

    async fn column_looks_like_uuid(&self, schema: &str, table: &str, column: &str) -> CResult<bool> {
        let quoted_col = self.quote(column, true);
        let sql = format!(
            "SELECT {quoted_col} FROM {}.{} WHERE {quoted_col} IS NOT NULL LIMIT {UUID_SAMPLE_SIZE}",
            self.quote(schema, true),
            self.quote(table, true),
        );
        let mut sampled = 0usize;
        for message in self.run_simple(&sql).await? {
            if let SimpleQueryMessage::Row(row) = message {
                match row.get(0) {
                    Some(text) if looks_like_uuid(text) => sampled += 1,
                    _ => return Ok(false),
                }
            }
        }
        Ok(sampled > 0)
    }
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
    async fn connect(&self) -> CResult<()> {
        let mut guard = self.client.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let (client, connection) = tokio_postgres::connect(&self.conninfo, NoTls)
            .await
            .map_err(|e| ReError::ConnectError(format!("postgres connect failed: {e}")))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("postgres connection task ended: {e}");
            }
        });
        *guard = Some(client);
        Ok(())
    }

    async fn close(&self) -> CResult<()> {
        let mut guard = self.client.lock().await;
        *guard = None;
        Ok(())
    }

    async fn query(&self, sql: &str, shape: ResultShape) -> CResult<QueryResult> {
        let rows: Vec<_> = self
            .run_simple(sql)
            .await?
            .into_iter()
            .filter_map(|m| match m {
                SimpleQueryMessage::Row(row) => Some(row),
                _ => None,
            })
            .collect();

        match shape {
            ResultShape::Scalar => {
                let value = rows.first().map(|r| cell_as_loose_numeric_or_text(r.get(0)));
                Ok(QueryResult::Scalar(value))
            }
            ResultShape::Row => {
                let row = rows
                    .first()
                    .ok_or_else(|| ReError::QueryError("expected one row, got none".into()))?;
                let ncols = row.columns().len();
                let values = (0..ncols).map(|i| cell_as_loose_numeric_or_text(row.get(i))).collect();
                Ok(QueryResult::Row(values))
            }
            ResultShape::Rows | ResultShape::Raw => {
                let values = rows
                    .iter()
                    .map(|row| {
                        let ncols = row.columns().len();
                        (0..ncols)
                            .map(|i| match row.get(i) {
                                None => Value::Null,
                                Some(text) => Value::Text(text.to_string()),
                            })
                            .collect()
                    })
                    .collect();
                Ok(QueryResult::Rows(values))
            }
        }
    }

    fn quote(&self, identifier: &str, case_sensitive: bool) -> String {
        if case_sensitive {
            format!("\"{}\"", identifier.replace('"', "\"\""))
        } else {
            identifier.to_lowercase()
        }
    }

    fn normalize_table_path(&self, path: &TablePath) -> CResult<(String, String)> {
        let (schema, table) = path.normalize(&self.default_schema);
        Ok((schema.to_string(), table.to_string()))
    }

    async fn query_table_schema(&self, path: &TablePath, filter_cols: Option<&[String]>) -> CResult<Schema> {
        let (schema_name, table_name) = self.normalize_table_path(path)?;
        let mut sql = format!(
            "SELECT column_name, data_type, numeric_scale, datetime_precision \
             FROM information_schema.columns \
             WHERE table_schema = '{}' AND table_name = '{}'",
            escape_literal(&schema_name),
            escape_literal(&table_name),
        );
        if let Some(cols) = filter_cols {
            if !cols.is_empty() {
                let list = cols
                    .iter()
                    .map(|c| format!("'{}'", escape_literal(c)))
                    .collect::<Vec<_>>()
                    .join(", ");
                sql.push_str(&format!(" AND column_name IN ({list})"));
            }
        }
        sql.push_str(" ORDER BY ordinal_position");

        let mut columns = Vec::new();
        for message in self.run_simple(&sql).await? {
            if let SimpleQueryMessage::Row(row) = message {
                let name = row.get(0).unwrap_or_default().to_string();
                let data_type = row.get(1).unwrap_or_default();
                let numeric_scale: Option<u32> = row.get(2).and_then(|s| s.parse().ok());
                let datetime_precision: Option<u32> = row.get(3).and_then(|s| s.parse().ok());
                columns.push((name, classify(data_type, numeric_scale, datetime_precision)));
            }
        }
        let mut schema = Schema::new(columns);

        let text_cols: Vec<String> = schema
            .iter()
            .filter(|(_, t)| matches!(t, ColumnType::Text))
            .map(|(n, _)| n.clone())
            .collect();
        for col in text_cols {
            if self.column_looks_like_uuid(&schema_name, &table_name, &col).await? {
                schema.reclassify(&col, ColumnType::Uuid);
            } else {
                warn!("column {col:?} sampled as mixed/non-UUID text; keeping Text");
            }
        }
        Ok(schema)
    }

    fn normalize_value_sql(&self, col_ref: &str, col_type: &ColumnType) -> CResult<String> {
        normalize_expr(col_ref, col_type)
    }

    fn offset_limit(&self, offset: Option<u64>, limit: Option<u64>) -> CResult<String> {
        let mut clause = String::new();
        if let Some(limit) = limit {
            clause.push_str(&format!("LIMIT {limit}"));
        }
        if let Some(offset) = offset {
            if !clause.is_empty() {
                clause.push(' ');
            }
            clause.push_str(&format!("OFFSET {offset}"));
        }
        Ok(clause)
    }

    /// `'x' || substring(md5(expr), 1, 15)` read as a bit(60) and cast to
    /// bigint. Postgres's bit-to-integer cast sign-extends from the
    /// leftmost bit, so this is where the checksum's signed-60-bit
    /// convention actually comes from (see `rdiff_common::checksum`).
    fn md5_to_int_sql(&self, expr: &str) -> String {
        format!("(('x' || substring(md5({expr}), 1, 15))::bit(60)::bigint)")
    }
}

fn classify(data_type: &str, numeric_scale: Option<u32>, datetime_precision: Option<u32>) -> ColumnType {
    match data_type {
        "smallint" | "integer" | "bigint" => ColumnType::Integer,
        "numeric" | "decimal" => ColumnType::Decimal {
            scale: numeric_scale.unwrap_or(0),
        },
        "real" => ColumnType::Float {
            digits: ColumnType::float_digits_from_binary_precision(24),
        },
        "double precision" => ColumnType::Float {
            digits: ColumnType::float_digits_from_binary_precision(53),
        },
        "timestamp without time zone" | "timestamp with time zone" | "date" => ColumnType::Temporal {
            precision: datetime_precision.unwrap_or(6),
            rounds_on_precision_loss: true,
        },
        "uuid" => ColumnType::Uuid,
        "text" | "character varying" | "character" => ColumnType::Text,
        other => ColumnType::Unknown(other.to_string()),
    }
}

fn looks_like_uuid(text: &str) -> bool {
    let hex: String = text.chars().filter(|c| *c != '-').collect();
    hex.len() == 32 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

fn escape_literal(s: &str) -> String {
    s.replace('\'', "''")
}

/// `COUNT`/`SUM` results: integer text parses as `Value::Integer`; a sum
/// that overflows `i64` (Postgres widens `SUM(bigint)` to `numeric`) is
/// kept as `Value::Text` so callers can still parse it into `i128`. Any
/// non-numeric text (including SQL NULL) degrades to `Text`/`Null`.
fn cell_as_loose_numeric_or_text(cell: Option<&str>) -> Value {
    match cell {
        None => Value::Null,
        Some(text) => match text.parse::<i64>() {
            Ok(n) => Value::Integer(n),
            Err(_) => Value::Text(text.to_string()),
        },
    }
}
