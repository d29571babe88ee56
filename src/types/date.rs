//! Date encoding, parsing, and validation.
//!
//! Dates are stored as a single `i32` of the form `yyyy*10000 + mm*100 + dd`
//! and formatted as zero-padded `YYYY-MM-DD`. The parser accepts one- or
//! two-digit month and day components and rejects anything that is not a
//! valid Gregorian calendar date (including February 29 outside leap years).

/// Returns true for Gregorian leap years.
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in the given month, accounting for leap years.
pub fn days_in_month(year: i32, month: i32) -> i32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

/// Validates a (year, month, day) triple as a calendar date.
pub fn is_valid_date(year: i32, month: i32, day: i32) -> bool {
    year >= 1 && (1..=12).contains(&month) && day >= 1 && day <= days_in_month(year, month)
}

/// Returns true if the string has the shape of a date literal
/// (`digits-digits-digits` with a 4-digit year and 1-2 digit month/day).
///
/// Shape is checked separately from validity so the parser can distinguish
/// "this is not a date at all" (plain string) from "this looks like a date
/// but is impossible" (a date syntax error).
pub fn has_date_shape(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != 3 {
        return false;
    }
    parts[0].len() == 4
        && (1..=2).contains(&parts[1].len())
        && (1..=2).contains(&parts[2].len())
        && parts.iter().all(|p| p.bytes().all(|b| b.is_ascii_digit()))
}

/// Parses a `YYYY-M-D` string into the packed integer encoding.
///
/// Returns `None` if the string does not have date shape or encodes an
/// impossible calendar date.
pub fn parse_date(s: &str) -> Option<i32> {
    if !has_date_shape(s) {
        return None;
    }
    let mut parts = s.split('-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: i32 = parts.next()?.parse().ok()?;
    let day: i32 = parts.next()?.parse().ok()?;
    if !is_valid_date(year, month, day) {
        return None;
    }
    Some(year * 10000 + month * 100 + day)
}

/// Formats a packed date as zero-padded `YYYY-MM-DD`.
pub fn format_date(packed: i32) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        packed / 10000,
        (packed % 10000) / 100,
        packed % 100
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leap_years() {
        assert!(is_leap_year(2024));
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2023));
    }

    #[test]
    fn test_parse_valid() {
        assert_eq!(parse_date("2024-02-29"), Some(20240229));
        assert_eq!(parse_date("2024-2-9"), Some(20240209));
        assert_eq!(parse_date("0001-01-01"), Some(10101));
        assert_eq!(parse_date("9999-12-31"), Some(99991231));
    }

    #[test]
    fn test_parse_invalid_calendar() {
        assert_eq!(parse_date("2023-02-29"), None);
        assert_eq!(parse_date("2024-13-01"), None);
        assert_eq!(parse_date("2024-00-10"), None);
        assert_eq!(parse_date("2024-04-31"), None);
        assert_eq!(parse_date("2024-01-00"), None);
    }

    #[test]
    fn test_parse_wrong_shape() {
        assert_eq!(parse_date("hello"), None);
        assert_eq!(parse_date("2024-1"), None);
        assert_eq!(parse_date("24-01-01"), None);
        assert_eq!(parse_date("2024-001-01"), None);
        assert_eq!(parse_date("2024/01/01"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_shape_vs_validity() {
        // Shape matches but the calendar rejects it: this is the case
        // that must surface as a date-specific syntax error.
        assert!(has_date_shape("2023-02-29"));
        assert_eq!(parse_date("2023-02-29"), None);
        assert!(!has_date_shape("not-a-date"));
    }

    #[test]
    fn test_format() {
        assert_eq!(format_date(20240229), "2024-02-29");
        assert_eq!(format_date(10101), "0001-01-01");
        assert_eq!(format_date(20241231), "2024-12-31");
    }

    #[test]
    fn test_roundtrip() {
        for s in ["2024-02-29", "1999-01-09", "0001-12-31"] {
            let packed = parse_date(s).unwrap();
            assert_eq!(parse_date(&format_date(packed)), Some(packed));
        }
    }
}
