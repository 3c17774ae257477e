//! The checksum data model (spec §3 "Checksum", §4.2 "Checksum SQL
//! shape"): MD5 over the concatenation of normalized column values,
//! truncated to the low 60 bits (15 hex digits), summed across rows.
//!
//! Two things are worth spelling out because they are easy to get wrong
//! by guessing rather than grounding:
//!
//! - The low-15-hex-digit value is **sign-extended from bit 59**, not
//!   read as a plain unsigned integer. This mirrors what
//!   `('x' || substring(md5(expr), 1, 15))::bit(60)::bigint` actually
//!   produces on the Postgres side — Postgres's bit-string-to-integer
//!   cast sign-extends from the leftmost bit — so every adapter's
//!   `md5_to_int_sql` is expected to produce the same signed value, and
//!   this function matches that rather than inventing an unsigned
//!   convention that real engines wouldn't agree with.
//! - Rows combine by **summation**, not a bitwise reduction: that is
//!   what the worked `SUM(CAST(CONV(SUBSTRING(MD5(...)...` SQL shape
//!   computes, and every engine has a `SUM` aggregate while few have a
//!   portable bitwise one. `i128` gives the accumulator enough headroom
//!   that no realistic segment (bounded by `bisection_threshold` rows
//!   before it stops bisecting) can overflow it.

/// MD5-hashes `concatenated` (the already-normalized, concatenated
/// column text for one row) and returns the low 60 bits of the digest,
/// sign-extended from bit 59 into a signed `i64`.
pub fn row_checksum(concatenated: &str) -> i64 {
    let digest = md5::compute(concatenated.as_bytes());
    let hex = format!("{digest:x}");
    let low15 = &hex[..15];
    let raw = i64::from_str_radix(low15, 16).expect("15 hex digits fit in i64");
    sign_extend_60(raw)
}

/// Reinterprets the low 60 bits of `raw` as a signed 60-bit integer.
pub fn sign_extend_60(raw: i64) -> i64 {
    let mask = (1i64 << 60) - 1;
    let low = raw & mask;
    if low & (1i64 << 59) != 0 {
        low - (1i64 << 60)
    } else {
        low
    }
}

/// Sums per-row checksums, mirroring `SUM(...)` over the segment's rows.
/// `None` for an empty segment, matching SQL `SUM()` of zero rows.
pub fn sum_reduce<I: IntoIterator<Item = i64>>(values: I) -> Option<i128> {
    values.into_iter().fold(None, |acc, v| match acc {
        None => Some(v as i128),
        Some(a) => Some(a + v as i128),
    })
}
