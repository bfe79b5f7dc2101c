//! Cron expression handling.
//!
//! Accepts the classic 5-field form (`min hour dom month dow`) as well as the
//! 6/7-field form with seconds that the `cron` crate parses natively.

use std::str::FromStr;

use cron::Schedule;

/// Prefix a 5-field expression with a zero seconds field.
pub fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Parse an expression in either form.
pub fn parse_cron(expr: &str) -> Result<Schedule, cron::error::Error> {
    Schedule::from_str(&normalize_cron(expr))
}
