//! Small utility helpers used across modules.

use chrono::NaiveDate;

use crate::error::CoreError;

/// Whole minutes credited for `secs` seconds of effort, rounded up.
/// Zero seconds is zero minutes.
pub fn minutes_from_seconds(secs: u64) -> u32 {
  let minutes = secs.div_ceil(60);
  u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Countdown display, "MM:SS". Minutes are not capped at 59.
pub fn format_mmss(secs: u32) -> String {
  format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Parse a `YYYY-MM-DD` query parameter.
pub fn parse_day(field: &str, raw: &str) -> Result<NaiveDate, CoreError> {
  NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
    .map_err(|_| CoreError::InvalidInput(format!("{field} must be a date like 2025-01-31")))
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge client payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}
