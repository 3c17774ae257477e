//! Pure-Rust equivalent of the normalization rules in `sql.rs`, applied to
//! already-fetched [`Value`]s. Used by the download-and-compare path (rows
//! are normalized once fetched, not re-queried) and by adapters that
//! cannot express a rule in SQL at all.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDateTime};

use rdiff_common::err::{CResult, ReError};
use rdiff_common::types::{ColumnType, Value};

/// Sentinel for SQL NULL: distinguishable from any normalized non-null
/// text (none of the per-type rules can produce a leading NUL byte).
pub const NULL_SENTINEL: &str = "\0NULL";

/// Normalizes one downloaded cell to its canonical text form. Adapters
/// that decode rows through a typed driver hand this a typed `Value`
/// (`Integer`, `Decimal`, ...); adapters that go through a text-only
/// wire protocol (simple query protocol, CSV export) hand this
/// `Value::Text` for every column regardless of declared type, so each
/// non-text arm also accepts `Text` and parses it first.
pub fn normalize_value(value: &Value, ty: &ColumnType) -> CResult<String> {
    if matches!(value, Value::Null) {
        return Ok(NULL_SENTINEL.to_string());
    }
    match (ty, value) {
        (ColumnType::Integer, Value::Integer(i)) => Ok(normalize_integer(*i)),
        (ColumnType::Integer, Value::Text(s)) => parse_integer(s).map(normalize_integer),
        (ColumnType::Decimal { scale }, Value::Decimal(d)) => Ok(normalize_decimal(d, *scale)),
        (ColumnType::Decimal { scale }, Value::Text(s)) => {
            parse_decimal(s).map(|d| normalize_decimal(&d, *scale))
        }
        (ColumnType::Float { digits }, Value::Float(f)) => Ok(normalize_float(*f, *digits)),
        (ColumnType::Float { digits }, Value::Text(s)) => parse_float(s).map(|f| normalize_float(f, *digits)),
        (ColumnType::Temporal { precision, rounds_on_precision_loss }, Value::Temporal(dt, native_precision)) => {
            Ok(normalize_temporal(dt, (*native_precision).max(*precision), *rounds_on_precision_loss))
        }
        (ColumnType::Temporal { precision, rounds_on_precision_loss }, Value::Text(s)) => {
            let (dt, native_precision) = parse_temporal(s)?;
            Ok(normalize_temporal(&dt, native_precision.max(*precision), *rounds_on_precision_loss))
        }
        (ColumnType::Text, Value::Text(s)) => Ok(s.clone()),
        (ColumnType::Uuid, Value::Uuid(s)) => Ok(normalize_uuid(s)),
        (ColumnType::Uuid, Value::Text(s)) => Ok(normalize_uuid(s)),
        (ColumnType::Unknown(raw), _) => Err(ReError::TypeError(format!(
            "column type {raw:?} cannot participate in a checksum; fall back to download-and-compare"
        ))),
        (expected, actual) => Err(ReError::TypeError(format!(
            "value {actual:?} does not match declared column type {expected:?}"
        ))),
    }
}

fn parse_integer(s: &str) -> CResult<i64> {
    s.trim()
        .parse::<i64>()
        .map_err(|_| ReError::TypeError(format!("{s:?} is not a valid integer")))
}

fn parse_decimal(s: &str) -> CResult<BigDecimal> {
    BigDecimal::from_str(s.trim()).map_err(|_| ReError::TypeError(format!("{s:?} is not a valid decimal")))
}

fn parse_float(s: &str) -> CResult<f64> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| ReError::TypeError(format!("{s:?} is not a valid float")))
}

/// Parses a wire-format timestamp back into `(datetime, native_precision)`,
/// the same shape `Value::Temporal` carries, so a text-protocol cell
/// normalizes through the exact rounding/truncation rules a typed one does.
fn parse_temporal(s: &str) -> CResult<(NaiveDateTime, u32)> {
    let s = s.trim();
    let dt = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|_| ReError::TypeError(format!("{s:?} is not a valid timestamp")))?;
    let native_precision = s.split_once('.').map(|(_, frac)| frac.len() as u32).unwrap_or(0);
    Ok((dt, native_precision))
}

pub fn normalize_integer(i: i64) -> String {
    i.to_string()
}

/// Fixed-point text with exactly `scale` fractional digits, round-half-to-even
/// when the source has more scale than requested.
pub fn normalize_decimal(value: &BigDecimal, scale: u32) -> String {
    let (sign, digits, frac_len) = decompose(value);
    let (int_digits, frac_digits) = round_half_even(&digits, frac_len, scale);
    assemble(sign, &int_digits, &frac_digits)
}

/// Same fixed-point shape as `normalize_decimal`, but floats use Rust's
/// native round-to-nearest formatting rather than exact decimal
/// round-half-to-even, since the source value is already a lossy binary
/// float — "engine-default where unavoidable" per spec.
pub fn normalize_float(value: f64, digits: u32) -> String {
    format!("{:.*}", digits as usize, value)
}

pub fn normalize_uuid(value: &str) -> String {
    value.trim().to_string()
}

/// `YYYY-MM-DD HH:MM:SS.ffffff`, always exactly 26 characters.
pub fn normalize_temporal(
    dt: &NaiveDateTime,
    native_precision: u32,
    rounds_on_precision_loss: bool,
) -> String {
    let nanos = dt.and_utc().timestamp_subsec_nanos();
    let (dt, micros) = if native_precision > 6 {
        if rounds_on_precision_loss {
            round_nanos_to_micros(*dt, nanos)
        } else {
            (*dt, nanos / 1_000)
        }
    } else {
        (*dt, nanos / 1_000)
    };
    format!("{}.{micros:06}", dt.format("%Y-%m-%d %H:%M:%S"))
}

fn round_nanos_to_micros(dt: NaiveDateTime, nanos: u32) -> (NaiveDateTime, u32) {
    let rounded = (nanos as u64 + 500) / 1_000 * 1_000;
    if rounded >= 1_000_000_000 {
        let carried = dt + Duration::nanoseconds(1_000_000_000 - nanos as i64);
        (carried, 0)
    } else {
        (dt, (rounded / 1_000) as u32)
    }
}

/// Splits a `BigDecimal` into `(is_negative, digit_string, fractional_digit_count)`
/// with no sign, decimal point, or leading/trailing formatting noise.
fn decompose(value: &BigDecimal) -> (bool, String, u32) {
    let text = value.to_string();
    let negative = text.starts_with('-');
    let text = text.trim_start_matches('-');
    match text.split_once('.') {
        Some((int_part, frac_part)) => (
            negative,
            format!("{int_part}{frac_part}"),
            frac_part.len() as u32,
        ),
        None => (negative, text.to_string(), 0),
    }
}

/// Rounds a combined digit string (integer digits followed by `frac_len`
/// fractional digits) to exactly `scale` fractional digits, round-half-to-even.
/// Returns `(integer_digits, fractional_digits)`.
fn round_half_even(digits: &str, frac_len: u32, scale: u32) -> (String, String) {
    let digits = if digits.is_empty() { "0" } else { digits };
    if frac_len <= scale {
        let pad = (scale - frac_len) as usize;
        let int_len = digits.len() - frac_len as usize;
        return (digits[..int_len].to_string(), format!("{}{}", &digits[int_len..], "0".repeat(pad)));
    }

    let drop = (frac_len - scale) as usize;
    let keep_len = digits.len() - drop;
    let keep = &digits[..keep_len];
    let dropped = &digits[keep_len..];

    let half = format!("5{}", "0".repeat(drop - 1));
    let round_up = match dropped.cmp(&half.as_str()) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => {
            let last = keep.chars().last().unwrap_or('0');
            (last as u8 - b'0') % 2 == 1
        }
    };

    let mut keep = keep.to_string();
    if round_up {
        keep = increment_digit_string(&keep);
    }
    let scale = scale as usize;
    if keep.len() <= scale {
        let pad = scale - keep.len();
        ("0".to_string(), format!("{}{}", "0".repeat(pad), keep))
    } else {
        let split = keep.len() - scale;
        (keep[..split].to_string(), keep[split..].to_string())
    }
}

fn increment_digit_string(s: &str) -> String {
    let mut digits: Vec<u8> = s.bytes().map(|b| b - b'0').collect();
    let mut carry = 1u8;
    for d in digits.iter_mut().rev() {
        let sum = *d + carry;
        *d = sum % 10;
        carry = sum / 10;
        if carry == 0 {
            break;
        }
    }
    let mut out = String::new();
    if carry > 0 {
        out.push((b'0' + carry) as char);
    }
    out.extend(digits.iter().map(|d| (b'0' + d) as char));
    out
}

fn assemble(negative: bool, int_digits: &str, frac_digits: &str) -> String {
    let int_digits = int_digits.trim_start_matches('0');
    let int_digits = if int_digits.is_empty() { "0" } else { int_digits };
    let is_zero = int_digits == "0" && frac_digits.chars().all(|c| c == '0');
    let sign = if negative && !is_zero { "-" } else { "" };
    if frac_digits.is_empty() {
        format!("{sign}{int_digits}")
    } else {
        format!("{sign}{int_digits}.{frac_digits}")
    }
}
