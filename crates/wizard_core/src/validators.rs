//! Field format validators.
//!
//! Every validator treats an empty value as valid: an optional field that was
//! left blank is never an error, only a malformed non-empty value is.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

pub const INVALID_EMAIL: &str = "Invalid email address";
pub const INVALID_PHONE: &str = "Invalid phone number (10-15 digits)";
pub const INVALID_URL: &str = "Invalid URL";
pub const INVALID_DATE_RANGE: &str = "Expiry date must be after issue date";

const PHONE_MIN_DIGITS: usize = 10;
const PHONE_MAX_DIGITS: usize = 15;
const DATE_FORMAT: &str = "%Y-%m-%d";

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
    })
}

pub fn validate_email(value: &str) -> Option<&'static str> {
    if value.is_empty() || email_pattern().is_match(value) {
        None
    } else {
        Some(INVALID_EMAIL)
    }
}

/// Spaces, dashes, plus signs and parentheses are stripped before counting digits.
pub fn validate_phone(value: &str) -> Option<&'static str> {
    if value.is_empty() {
        return None;
    }
    let digits: String = value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '+' | '(' | ')'))
        .collect();
    let well_formed = digits.chars().all(|c| c.is_ascii_digit())
        && (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits.len());
    if well_formed {
        None
    } else {
        Some(INVALID_PHONE)
    }
}

pub fn validate_url(value: &str) -> Option<&'static str> {
    if value.is_empty() || url::Url::parse(value).is_ok() {
        None
    } else {
        Some(INVALID_URL)
    }
}

/// Expiry must fall strictly after issue. A missing or unparseable date on
/// either side is not an error here; the pair is only judged once both exist.
pub fn validate_date_range(issue: &str, expiry: &str) -> Option<&'static str> {
    let (Some(issue), Some(expiry)) = (parse_date(issue), parse_date(expiry)) else {
        return None;
    };
    if expiry > issue {
        None
    } else {
        Some(INVALID_DATE_RANGE)
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values_are_always_valid() {
        assert_eq!(validate_email(""), None);
        assert_eq!(validate_phone(""), None);
        assert_eq!(validate_url(""), None);
        assert_eq!(validate_date_range("", ""), None);
    }

    #[test]
    fn email_requires_user_domain_and_tld() {
        assert_eq!(validate_email("owner@acme.com"), None);
        assert_eq!(validate_email("owner@acme"), Some(INVALID_EMAIL));
        assert_eq!(validate_email("owner acme@x.com"), Some(INVALID_EMAIL));
        assert_eq!(validate_email("@acme.com"), Some(INVALID_EMAIL));
    }

    #[test]
    fn phone_strips_punctuation_before_counting() {
        assert_eq!(validate_phone("01712345678"), None);
        assert_eq!(validate_phone("+880 (171) 234-5678"), None);
        assert_eq!(validate_phone("123"), Some(INVALID_PHONE));
        assert_eq!(validate_phone("0171234567a"), Some(INVALID_PHONE));
        assert_eq!(validate_phone("1234567890123456"), Some(INVALID_PHONE));
    }

    #[test]
    fn url_needs_a_scheme() {
        assert_eq!(validate_url("https://acme.example"), None);
        assert_eq!(validate_url("acme.example"), Some(INVALID_URL));
    }

    #[test]
    fn date_range_requires_strictly_later_expiry() {
        assert_eq!(validate_date_range("2024-01-01", "2025-01-01"), None);
        assert_eq!(
            validate_date_range("2024-01-01", "2023-01-01"),
            Some(INVALID_DATE_RANGE)
        );
        assert_eq!(
            validate_date_range("2024-01-01", "2024-01-01"),
            Some(INVALID_DATE_RANGE)
        );
        assert_eq!(validate_date_range("2024-01-01", ""), None);
        assert_eq!(validate_date_range("not-a-date", "2023-01-01"), None);
    }
}
