// src/config/duration.rs

use std::time::Duration;

/// Unit suffixes accepted in `[config]`, with their length in milliseconds.
const UNITS: [(&str, u64); 4] = [("ms", 1), ("s", 1_000), ("m", 60_000), ("h", 3_600_000)];

/// Parse a `[config]` duration such as `"500ms"`, `"20s"`, `"5m"` or `"1h"`.
///
/// The error string is meant to be wrapped with the offending key by the
/// caller (see `ConfigSection::timings`).
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;
    let (amount, unit) = s.split_at(split);

    let amount: u64 = amount
        .parse()
        .map_err(|e| format!("invalid duration number '{amount}': {e}"))?;
    let unit = unit.trim().to_ascii_lowercase();

    let (_, millis_per_unit) = UNITS
        .iter()
        .find(|(suffix, _)| *suffix == unit)
        .ok_or_else(|| format!("unsupported duration unit '{unit}'; expected ms, s, m, or h"))?;

    amount
        .checked_mul(*millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
