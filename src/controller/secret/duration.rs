//! # Duration Text
//!
//! Parses and formats durations in the compact unit-suffixed text form used by
//! the validity annotation and the operator configuration ("12h0m0s", "45m0s",
//! "1.5s", "500ms"). Formatting always emits the canonical form so that the
//! same lifetime produces the same annotation bytes, which the content
//! identity depends on.

use chrono::Duration;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const NANOS_PER_MICROSECOND: i128 = 1_000;
const NANOS_PER_MILLISECOND: i128 = 1_000_000;
const NANOS_PER_SECOND: i128 = 1_000_000_000;
const NANOS_PER_MINUTE: i128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: i128 = 60 * NANOS_PER_MINUTE;

/// One `<number><unit>` component, anchored at the start of the remaining input
static COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]*)(?:\.([0-9]*))?([^0-9.]+)")
        .expect("Failed to compile duration component regex - this should never happen")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("invalid duration '{0}'")]
    Invalid(String),
    #[error("unknown unit '{unit}' in duration '{input}'")]
    UnknownUnit { unit: String, input: String },
    #[error("duration '{0}' is out of range")]
    OutOfRange(String),
}

fn unit_nanos(unit: &str) -> Option<i128> {
    match unit {
        "ns" => Some(1),
        "us" | "\u{b5}s" | "\u{3bc}s" => Some(NANOS_PER_MICROSECOND),
        "ms" => Some(NANOS_PER_MILLISECOND),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(NANOS_PER_MINUTE),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}

/// ASCII decimal digits to an integer, `None` on overflow or any other byte
fn digits_value(digits: &str) -> Option<i128> {
    digits.bytes().try_fold(0i128, |acc, b| {
        if !b.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add(i128::from(b - b'0'))
    })
}

/// Parse a duration such as "12h", "1h30m", "1.5s", "-45m0s" or "0"
///
/// Accepts an optional sign followed by one or more decimal numbers, each
/// with an optional fraction and a mandatory unit (`ns`, `us`, `µs`, `ms`,
/// `s`, `m`, `h`). The bare string "0" is also accepted.
///
/// # Errors
///
/// Returns an error if the text is empty, a component is missing its number
/// or unit, a unit is unknown, or the value does not fit in a signed 64-bit
/// nanosecond count.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let invalid = || DurationParseError::Invalid(input.to_string());

    let (negative, mut rest) = if let Some(stripped) = input.strip_prefix('-') {
        (true, stripped)
    } else if let Some(stripped) = input.strip_prefix('+') {
        (false, stripped)
    } else {
        (false, input)
    };

    if rest == "0" {
        return Ok(Duration::zero());
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: i128 = 0;
    while !rest.is_empty() {
        let caps = COMPONENT.captures(rest).ok_or_else(invalid)?;
        let whole = caps.get(1).map_or("", |m| m.as_str());
        let fraction = caps.get(2).map_or("", |m| m.as_str());
        let unit = caps.get(3).map_or("", |m| m.as_str());
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        let scale = unit_nanos(unit).ok_or_else(|| DurationParseError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let out_of_range = || DurationParseError::OutOfRange(input.to_string());
        let mut component = digits_value(whole)
            .and_then(|v| v.checked_mul(scale))
            .ok_or_else(out_of_range)?;

        if !fraction.is_empty() {
            // Digits beyond nanosecond resolution of the largest unit carry no weight
            let significant = &fraction[..fraction.len().min(18)];
            let numerator = digits_value(significant).ok_or_else(out_of_range)?;
            let denominator = 10i128.pow(u32::try_from(significant.len()).unwrap_or(18));
            component += numerator * scale / denominator;
        }

        total = total.checked_add(component).ok_or_else(out_of_range)?;
        rest = &rest[caps.get(0).map_or(rest.len(), |m| m.end())..];
    }

    if negative {
        total = -total;
    }
    let nanos = i64::try_from(total).map_err(|e| {
        tracing::debug!(error = %e, "Duration exceeds nanosecond range");
        DurationParseError::OutOfRange(input.to_string())
    })?;
    Ok(Duration::nanoseconds(nanos))
}

fn total_nanos(duration: Duration) -> i128 {
    i128::from(duration.num_seconds()) * NANOS_PER_SECOND + i128::from(duration.subsec_nanos())
}

/// Split `value` into its integer part and the trimmed decimal fraction of
/// `precision` digits (".5", ".25", or empty when the fraction is zero)
fn split_fraction(value: u128, precision: u32) -> (u128, String) {
    let scale = 10u128.pow(precision);
    let fraction = value % scale;
    if fraction == 0 {
        return (value / scale, String::new());
    }
    let digits = format!("{fraction:0width$}", width = precision as usize);
    (value / scale, format!(".{}", digits.trim_end_matches('0')))
}

/// Format a duration in canonical form
///
/// Durations of one second or more are written as hours, minutes and
/// seconds with leading zero units omitted ("12h0m0s", "45m0s", "1.5s").
/// Shorter durations use the largest fitting sub-second unit ("500ms",
/// "1.5µs", "7ns"). Zero is "0s".
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let nanos = total_nanos(duration);
    let sign = if nanos < 0 { "-" } else { "" };
    let magnitude = nanos.unsigned_abs();

    if magnitude == 0 {
        return "0s".to_string();
    }

    let body = if magnitude < NANOS_PER_SECOND.unsigned_abs() {
        if magnitude < NANOS_PER_MICROSECOND.unsigned_abs() {
            format!("{magnitude}ns")
        } else if magnitude < NANOS_PER_MILLISECOND.unsigned_abs() {
            let (whole, fraction) = split_fraction(magnitude, 3);
            format!("{whole}{fraction}\u{b5}s")
        } else {
            let (whole, fraction) = split_fraction(magnitude, 6);
            format!("{whole}{fraction}ms")
        }
    } else {
        let (seconds, fraction) = split_fraction(magnitude, 9);
        let mut text = format!("{}{fraction}s", seconds % 60);
        let minutes = seconds / 60;
        if minutes > 0 {
            text = format!("{}m{text}", minutes % 60);
            let hours = minutes / 60;
            if hours > 0 {
                text = format!("{hours}h{text}");
            }
        }
        text
    };

    format!("{sign}{body}")
}

/// Round `duration` to the nearest multiple of `multiple`, halves away from zero
///
/// A non-positive multiple, or a duration too large for nanosecond
/// arithmetic, is returned unchanged.
#[must_use]
pub fn round_duration(duration: Duration, multiple: Duration) -> Duration {
    let (Some(d), Some(m)) = (duration.num_nanoseconds(), multiple.num_nanoseconds()) else {
        return duration;
    };
    if m <= 0 {
        return duration;
    }

    let (d, m) = (i128::from(d), i128::from(m));
    let remainder = (d % m).abs();
    let rounded = if d < 0 {
        if remainder + remainder < m {
            d + remainder
        } else {
            d - m + remainder
        }
    } else if remainder + remainder < m {
        d - remainder
    } else {
        d + m - remainder
    };

    i64::try_from(rounded).map_or(duration, Duration::nanoseconds)
}

/// Round to whole minutes, the resolution of the validity annotation
#[must_use]
pub fn round_to_minute(duration: Duration) -> Duration {
    round_duration(duration, Duration::minutes(1))
}
