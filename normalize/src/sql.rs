//! Builds the SQL expression side of the normalizer contract (spec §4.1):
//! "the normalizer emits a SQL expression... for a given column reference
//! and its type". The forms here target ANSI-flavored SQL (`CAST`,
//! `TRIM`, `TO_CHAR`) that Postgres accepts directly; other engines are
//! expected to override per type in their own `DatabaseAdapter` impl
//! where their dialect diverges (e.g. Oracle's `TO_CHAR` date masks).

use rdiff_common::err::{CResult, ReError};
use rdiff_common::types::ColumnType;

/// Emits the normalization SQL expression for `col_ref` given its type.
/// Returns `Err(TypeError)` for `Unknown` — the caller must fall back to
/// download-and-compare rather than include this column in a checksum.
pub fn normalize_expr(col_ref: &str, ty: &ColumnType) -> CResult<String> {
    Ok(match ty {
        ColumnType::Integer => format!("CAST({col_ref} AS VARCHAR)"),
        ColumnType::Decimal { scale } => {
            format!("CAST(CAST({col_ref} AS DECIMAL(38,{scale})) AS VARCHAR)")
        }
        ColumnType::Float { digits } => {
            format!("CAST(CAST({col_ref} AS DECIMAL(38,{digits})) AS VARCHAR)")
        }
        ColumnType::Temporal { .. } => {
            format!("TO_CHAR({col_ref}, 'YYYY-MM-DD HH24:MI:SS.US')")
        }
        ColumnType::Text => col_ref.to_string(),
        ColumnType::Uuid => format!("TRIM({col_ref})"),
        ColumnType::Unknown(raw) => {
            return Err(ReError::TypeError(format!(
                "column type {raw:?} has no normalization SQL; fall back to download-and-compare"
            )))
        }
    })
}
