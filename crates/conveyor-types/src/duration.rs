//! Duration strings as they appear in step configs (`timeout: 1h`).
//!
//! Timeouts travel through the compiled plan as strings; enforcement belongs
//! to the execution engine. These helpers exist so lint and tooling can
//! reject strings the engine would choke on.

use std::time::Duration;

use crate::ConveyorError;

/// Parse a duration string with a `ms`, `s`, `m`, `h`, or `d` suffix.
pub fn parse_duration(input: &str) -> crate::Result<Duration> {
    let err = |reason: &str| ConveyorError::InvalidDuration {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    if let Some(val) = input.strip_suffix("ms") {
        let n: u64 = val.parse().map_err(|_| err("expected a number before 'ms'"))?;
        Ok(Duration::from_millis(n))
    } else if let Some(val) = input.strip_suffix('s') {
        let n: u64 = val.parse().map_err(|_| err("expected a number before 's'"))?;
        Ok(Duration::from_secs(n))
    } else if let Some(val) = input.strip_suffix('m') {
        let n: u64 = val.parse().map_err(|_| err("expected a number before 'm'"))?;
        Ok(Duration::from_secs(n * 60))
    } else if let Some(val) = input.strip_suffix('h') {
        let n: u64 = val.parse().map_err(|_| err("expected a number before 'h'"))?;
        Ok(Duration::from_secs(n * 3600))
    } else if let Some(val) = input.strip_suffix('d') {
        let n: u64 = val.parse().map_err(|_| err("expected a number before 'd'"))?;
        Ok(Duration::from_secs(n * 86400))
    } else {
        Err(err("unknown duration suffix (expected ms, s, m, h, or d)"))
    }
}

/// Render a duration in the largest suffix that divides it evenly.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 || d.subsec_millis() != 0 {
        return format!("{}ms", d.as_millis());
    }
    if secs % 86400 == 0 {
        format!("{}d", secs / 86400)
    } else if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
