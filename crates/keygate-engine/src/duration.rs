//! Human duration strings to millisecond grants.
//!
//! Exactly one count and one unit are accepted ("30m", "1d"); combined
//! forms like "1d2h" are rejected to keep billing units unambiguous.

pub const MS_PER_SECOND: i64 = 1_000;
pub const MS_PER_MINUTE: i64 = 60_000;
pub const MS_PER_HOUR: i64 = 3_600_000;
pub const MS_PER_DAY: i64 = 86_400_000;
pub const MS_PER_WEEK: i64 = 604_800_000;

/// Parse a duration string of the form `<count><unit>` with unit one of
/// `s`, `m`, `h`, `d`, `w` (case-insensitive, surrounding and inner
/// whitespace tolerated). Returns `None` for anything else, including a
/// zero count.
pub fn parse_duration_ms(input: &str) -> Option<i64> {
    let raw = input.trim().to_ascii_lowercase();
    let unit = raw.chars().last()?;
    let mult = match unit {
        's' => MS_PER_SECOND,
        'm' => MS_PER_MINUTE,
        'h' => MS_PER_HOUR,
        'd' => MS_PER_DAY,
        'w' => MS_PER_WEEK,
        _ => return None,
    };
    let digits = raw[..raw.len() - 1].trim_end();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let count: i64 = digits.parse().ok()?;
    if count <= 0 {
        return None;
    }
    count.checked_mul(mult)
}
