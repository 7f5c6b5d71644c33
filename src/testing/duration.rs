//! Duration strings used by scenario files (`timeout`, `maxDuration`)

use serde::Deserialize;

use crate::common::{Error, Result};

/// Parse a duration into whole seconds
///
/// Accepts a bare integer (seconds) or an integer suffixed with `ms`, `s`,
/// `m` or `h`. Milliseconds round up and never yield less than one second.
pub fn parse_duration_secs(input: &str) -> Result<u64> {
    let text = input.trim().to_ascii_lowercase();
    let invalid = || Error::DurationFormat(input.to_string());

    let (body, multiplier, millis) = if let Some(body) = text.strip_suffix("ms") {
        (body, 1, true)
    } else if let Some(body) = text.strip_suffix('s') {
        (body, 1, false)
    } else if let Some(body) = text.strip_suffix('m') {
        (body, 60, false)
    } else if let Some(body) = text.strip_suffix('h') {
        (body, 3600, false)
    } else {
        (text.as_str(), 1, false)
    };

    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let value: u64 = body.parse().map_err(|_| invalid())?;

    if millis {
        return Ok(value.div_ceil(1000).max(1));
    }
    value.checked_mul(multiplier).ok_or_else(invalid)
}

/// A duration as written in YAML: either a number of seconds or a string
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub fn to_secs(&self) -> Result<u64> {
        match self {
            DurationValue::Seconds(secs) => Ok(*secs),
            DurationValue::Text(text) => parse_duration_secs(text),
        }
    }
}
