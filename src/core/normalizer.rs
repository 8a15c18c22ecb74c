//! Feature normalization for snapshot rows.
//!
//! Turns loosely typed snapshot rows into [`FeatureRecord`]s. Every row
//! yields exactly one record: unknown protocols map to `0` and values that
//! do not parse as numbers coerce to zero.

use crate::models::FeatureRecord;

/// One line of the snapshot table, as text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTrafficRow {
    pub time: String,
    pub protocol: String,
    pub length: String,
}

impl RawTrafficRow {
    pub fn new(time: impl Into<String>, protocol: impl Into<String>, length: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            protocol: protocol.into(),
            length: length.into(),
        }
    }
}

/// Code of a protocol name in the closed vocabulary, `0` for anything else
pub fn protocol_code(name: &str) -> i64 {
    match name {
        "ICMP" => 1,
        "TCP" => 6,
        "UDP" => 17,
        "LLDP" => 2,
        "ARP" => 3,
        "ICMPv6" => 4,
        "MDNS" => 5,
        "Unknown" => 0,
        _ => 0,
    }
}

/// Parse a length-like value; fractions truncate toward zero, anything else is `0`
pub fn coerce_length(value: &str) -> i64 {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        return n;
    }
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() => n.trunc() as i64,
        _ => 0,
    }
}

/// Parse a time-like value; non-numeric and non-finite input is `0.0`
pub fn coerce_time(value: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

pub fn normalize(row: &RawTrafficRow) -> FeatureRecord {
    FeatureRecord {
        time: coerce_time(&row.time),
        protocol: protocol_code(&row.protocol),
        length: coerce_length(&row.length),
    }
}

/// Normalize rows, preserving their order
pub fn normalize_all<'a, I>(rows: I) -> Vec<FeatureRecord>
where
    I: IntoIterator<Item = &'a RawTrafficRow>,
{
    rows.into_iter().map(normalize).collect()
}
