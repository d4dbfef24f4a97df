//! GitLab time-tracking durations (`1h30m`, `2d 4h`, `1mo`).
//!
//! Unit sizes follow GitLab's time tracking conventions: 1mo = 4w, 1w = 5d,
//! 1d = 8h. A bare integer is a number of seconds.

use crate::error::{GitlabMcpError, Result};

pub const MINUTE: i64 = 60;
pub const HOUR: i64 = 60 * MINUTE;
pub const DAY: i64 = 8 * HOUR;
pub const WEEK: i64 = 5 * DAY;
pub const MONTH: i64 = 4 * WEEK;

const FORMAT_UNITS: &[(i64, &str)] = &[(WEEK, "w"), (DAY, "d"), (HOUR, "h"), (MINUTE, "m"), (1, "s")];

fn unit_seconds(unit: &str) -> Option<i64> {
    match unit {
        "mo" => Some(MONTH),
        "w" => Some(WEEK),
        "d" => Some(DAY),
        "h" => Some(HOUR),
        "m" => Some(MINUTE),
        "s" => Some(1),
        _ => None,
    }
}

/// Parses a human duration into seconds. A leading `-` negates the total.
pub fn parse_duration(input: &str) -> Result<i64> {
    let trimmed = input.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };
    if body.is_empty() {
        return Err(GitlabMcpError::Duration(format!("'{}' is empty", input)));
    }

    let total = if body.chars().all(|c| c.is_ascii_digit()) {
        body.parse::<i64>()
            .map_err(|_| GitlabMcpError::Duration(format!("'{}' is out of range", input)))?
    } else {
        parse_tokens(input, body)?
    };

    Ok(if negative { -total } else { total })
}

fn parse_tokens(input: &str, body: &str) -> Result<i64> {
    let invalid = |reason: &str| GitlabMcpError::Duration(format!("'{}': {}", input, reason));
    let chars: Vec<char> = body.chars().collect();
    let mut total: i64 = 0;
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if start == i {
            return Err(invalid("expected a number before each unit"));
        }
        let amount: i64 = chars[start..i]
            .iter()
            .collect::<String>()
            .parse()
            .map_err(|_| invalid("number out of range"))?;

        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let unit_start = i;
        while i < chars.len() && chars[i].is_ascii_alphabetic() {
            i += 1;
        }
        let unit: String = chars[unit_start..i].iter().collect::<String>().to_lowercase();
        if unit.is_empty() {
            return Err(invalid("missing unit (use mo, w, d, h, m or s)"));
        }
        let size = unit_seconds(&unit)
            .ok_or_else(|| invalid(&format!("unknown unit '{}'", unit)))?;

        total = amount
            .checked_mul(size)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| invalid("duration out of range"))?;
    }

    Ok(total)
}

/// Formats seconds as compact tokens, largest unit first (`5400` -> `1h30m`).
pub fn format_duration(seconds: i64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }
    let sign = if seconds < 0 { "-" } else { "" };
    let mut remaining = seconds.unsigned_abs();
    let mut out = String::from(sign);
    for (size, unit) in FORMAT_UNITS {
        let size = *size as u64;
        let count = remaining / size;
        if count > 0 {
            out.push_str(&format!("{}{}", count, unit));
            remaining %= size;
        }
    }
    out
}
