//! Key Space Partitioner (spec §4.3): splits an integer interval into `n`
//! roughly equal sub-intervals, deterministically.
//!
//! `i128` is used for the key space rather than `i64` so UUID-derived
//! 128-bit integer keys (spec §9 "String keys") partition the same way
//! integer primary keys do.

use rdiff_common::err::{CResult, ReError};

/// Returns `n` strictly increasing interior integers in `(lo, hi)`,
/// approximating `points[i] = lo + round((i+1) * (hi - lo) / (n + 1))`.
/// When `hi - lo < n + 1` there isn't room for the ideal spacing; points
/// are compressed into the available range rather than failing, as long
/// as the length and strict-monotonicity contract still holds.
pub fn split_space(lo: i128, hi: i128, n: usize) -> CResult<Vec<i128>> {
    if lo >= hi {
        return Err(ReError::ValueError(format!(
            "split_space requires lo < hi, got lo={lo}, hi={hi}"
        )));
    }
    if n == 0 {
        return Err(ReError::ValueError("split_space requires n >= 1".into()));
    }

    let width = hi - lo;
    let n_i = n as i128;
    let mut points: Vec<i128> = (1..=n_i).map(|i| lo + round_div(i * width, n_i + 1)).collect();

    // Left-to-right pass: every point is at least one past its predecessor.
    for idx in 0..points.len() {
        let min_allowed = if idx == 0 { lo + 1 } else { points[idx - 1] + 1 };
        if points[idx] < min_allowed {
            points[idx] = min_allowed;
        }
    }
    // Right-to-left pass: every point stays below `hi` and below its
    // successor, compressing the tail back down if the forward pass
    // pushed points past the available range.
    for idx in (0..points.len()).rev() {
        let max_allowed = if idx == points.len() - 1 {
            hi - 1
        } else {
            points[idx + 1] - 1
        };
        if points[idx] > max_allowed {
            points[idx] = max_allowed;
        }
    }

    Ok(points)
}

/// Rounds `a / b` to the nearest integer (round-half-up), for positive
/// `a` and `b`.
fn round_div(a: i128, b: i128) -> i128 {
    (2 * a + b) / (2 * b)
}
