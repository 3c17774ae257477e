//! Key-column domain handling (spec §9 "String keys"): bisection needs a
//! key space with `MIN`, `MAX`, and ordered partition. Integer keys are
//! their own key space; UUID-text keys are parsed into the top half of
//! `i128` (the sign bit of the 128-bit UUID value stays clear). A UUID
//! whose top bit is set falls outside that domain and fails fast, the
//! same way a non-UUID string key would.

use rdiff_common::err::{CResult, ReError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Integer,
    Uuid,
}

pub fn parse_key(kind: KeyKind, text: &str) -> CResult<i128> {
    match kind {
        KeyKind::Integer => text
            .parse::<i128>()
            .map_err(|e| ReError::ValueError(format!("key {text:?} is not an integer: {e}"))),
        KeyKind::Uuid => uuid_to_i128(text),
    }
}

pub fn format_key_literal(kind: KeyKind, value: i128) -> CResult<String> {
    match kind {
        KeyKind::Integer => Ok(value.to_string()),
        KeyKind::Uuid => Ok(format!("'{}'", i128_to_uuid(value)?)),
    }
}

fn uuid_to_i128(text: &str) -> CResult<i128> {
    let hex: String = text.chars().filter(|c| *c != '-').collect();
    if hex.len() != 32 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ReError::ValueError(format!("{text:?} is not a well-formed UUID")));
    }
    let value = u128::from_str_radix(&hex, 16)
        .map_err(|e| ReError::ValueError(format!("{text:?} is not a well-formed UUID: {e}")))?;
    i128::try_from(value)
        .map_err(|_| ReError::ValueError(format!("UUID {text:?} is outside the supported key domain")))
}

fn i128_to_uuid(value: i128) -> CResult<String> {
    if value < 0 {
        return Err(ReError::ValueError(format!(
            "{value} is outside the UUID key domain"
        )));
    }
    let hex = format!("{value:032x}");
    Ok(format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    ))
}
