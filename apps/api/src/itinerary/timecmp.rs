//! Free-text time comparison.
//!
//! Activity times arrive as whatever the sheet holds: `"9:30am"`, `"14:00"`,
//! `"9am"`. Ordering works on minute-of-day, same-day only. Unparseable
//! input degrades silently to midnight, a known weak point of the data,
//! kept as-is rather than guessed at.

use std::cmp::Ordering;

/// Parses a free-text time into a minute-of-day value.
///
/// 12-hour forms take a case-insensitive am/pm suffix (`12am` is 0, `12pm`
/// is 720); anything without a suffix is read as 24-hour `H[:MM]`.
pub fn parse_minutes(raw: &str) -> u32 {
    let lowered = raw.trim().to_ascii_lowercase();
    let (body, meridiem) = if let Some(stripped) = lowered.strip_suffix("am") {
        (stripped.trim_end(), Some(Meridiem::Am))
    } else if let Some(stripped) = lowered.strip_suffix("pm") {
        (stripped.trim_end(), Some(Meridiem::Pm))
    } else {
        (lowered.as_str(), None)
    };

    let mut parts = body.splitn(2, ':');
    let hours: u32 = parts
        .next()
        .and_then(|h| h.trim().parse().ok())
        .unwrap_or(0);
    let minutes: u32 = parts
        .next()
        .and_then(|m| m.trim().parse().ok())
        .unwrap_or(0);

    let hours = match meridiem {
        Some(Meridiem::Am) => {
            if hours == 12 {
                0
            } else {
                hours
            }
        }
        Some(Meridiem::Pm) => {
            if hours == 12 {
                12
            } else {
                hours % 12 + 12
            }
        }
        None => hours,
    };

    hours * 60 + minutes
}

enum Meridiem {
    Am,
    Pm,
}

/// Compares two free-text times in minute-of-day space.
pub fn compare(a: &str, b: &str) -> Ordering {
    parse_minutes(a).cmp(&parse_minutes(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twelve_hour_parsing() {
        assert_eq!(parse_minutes("9:30am"), 570);
        assert_eq!(parse_minutes("9am"), 540);
        assert_eq!(parse_minutes("2:00pm"), 840);
        assert_eq!(parse_minutes("9 PM"), 1260);
    }

    #[test]
    fn test_noon_and_midnight() {
        assert_eq!(parse_minutes("12am"), 0);
        assert_eq!(parse_minutes("12:15am"), 15);
        assert_eq!(parse_minutes("12pm"), 720);
        assert_eq!(parse_minutes("12:30pm"), 750);
    }

    #[test]
    fn test_twenty_four_hour_parsing() {
        assert_eq!(parse_minutes("14:00"), 840);
        assert_eq!(parse_minutes("9"), 540);
        assert_eq!(parse_minutes("0:05"), 5);
    }

    #[test]
    fn test_unparseable_degrades_to_midnight() {
        assert_eq!(parse_minutes("noon"), 0);
        assert_eq!(parse_minutes(""), 0);
        assert_eq!(parse_minutes("??"), 0);
    }

    #[test]
    fn test_compare_chronological() {
        assert_eq!(compare("9:00am", "10:30am"), Ordering::Less);
        assert_eq!(compare("10:30am", "9:00am"), Ordering::Greater);
        assert_eq!(compare("14:00", "2:00pm"), Ordering::Equal);
    }

    #[test]
    fn test_compare_is_same_day_only() {
        // No cross-midnight wrap: 11:45pm sorts after 12:15am.
        assert_eq!(compare("11:45pm", "12:15am"), Ordering::Greater);
    }
}
