/// Position at which the fractional-second part of a normalized temporal
/// string begins: `YYYY-MM-DD HH:MM:SS` is 19 characters, plus the `.`.
pub const TIMESTAMP_PRECISION_POS: usize = 20;

/// Fractional-second digits a normalized temporal value is always padded
/// or rounded to, regardless of the column's native precision.
pub const TIMESTAMP_NORMALIZED_FRACTION_DIGITS: usize = 6;

/// Total length of a normalized temporal string:
/// `TIMESTAMP_PRECISION_POS + TIMESTAMP_NORMALIZED_FRACTION_DIGITS`.
pub const TIMESTAMP_NORMALIZED_LEN: usize =
    TIMESTAMP_PRECISION_POS + TIMESTAMP_NORMALIZED_FRACTION_DIGITS;

/// Checksums are reduced into `[0, 2^60)`, i.e. the low 15 hex digits of
/// an MD5 digest.
pub const CHECKSUM_BITS: u32 = 60;
pub const CHECKSUM_HEX_DIGITS: usize = 15;

pub const DEFAULT_BISECTION_FACTOR: usize = 32;
pub const DEFAULT_BISECTION_THRESHOLD: u64 = 16_384;
pub const DEFAULT_MAX_THREADPOOL_SIZE: usize = 1;

/// Number of sampled values used to decide whether a `Text` column is
/// really a `UUID` column in disguise.
pub const UUID_SAMPLE_SIZE: usize = 16;
