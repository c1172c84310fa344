//! Free-text date parsing into validity intervals

use crate::graph::ValidTime;
use regex_lite::Regex;
use std::sync::LazyLock;

static RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{4})\s*[-–]\s*(\d{4})").expect("valid range pattern"));

static SINGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{4})").expect("valid year pattern"));

/// Parse a date string.
///
/// - `YYYY-YYYY` gives the range as written
/// - `YYYY` (optionally followed by more text) gives a single year
/// - anything else gives `None`
pub fn parse_interval(text: &str) -> Option<ValidTime> {
    if let Some(caps) = RANGE.captures(text) {
        let start = caps[1].parse().ok()?;
        let end = caps[2].parse().ok()?;
        return Some(ValidTime::new(start, end));
    }
    let caps = SINGLE.captures(text)?;
    let year = caps[1].parse().ok()?;
    Some(ValidTime::year(year))
}

/// Parse a date string, falling back to the default interval
pub fn interval_or_default(text: Option<&str>) -> ValidTime {
    text.and_then(parse_interval).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range() {
        assert_eq!(parse_interval("1888-1903"), Some(ValidTime::new(1888, 1903)));
        assert_eq!(parse_interval(" 1888 - 1903 "), Some(ValidTime::new(1888, 1903)));
        assert_eq!(parse_interval("1888–1903"), Some(ValidTime::new(1888, 1903)));
    }

    #[test]
    fn single_year_with_trailing_text() {
        assert_eq!(parse_interval("1875"), Some(ValidTime::year(1875)));
        assert_eq!(parse_interval("1875 (New York)"), Some(ValidTime::year(1875)));
    }

    #[test]
    fn range_kept_as_given_even_if_inverted() {
        assert_eq!(parse_interval("1920-1910"), Some(ValidTime::new(1920, 1910)));
    }

    #[test]
    fn unparseable_falls_back() {
        assert_eq!(parse_interval("circa 1900"), None);
        assert_eq!(parse_interval("unknown"), None);
        assert_eq!(interval_or_default(Some("c. 1900")), ValidTime::new(1890, 1940));
        assert_eq!(interval_or_default(None), ValidTime::new(1890, 1940));
    }
}
