//! Indonesian phone number normalization

use crate::payments::types::PhoneFormat;
use regex::Regex;
use std::sync::OnceLock;

const COUNTRY_CODE: &str = "62";

fn non_digits() -> &'static Regex {
    static NON_DIGITS: OnceLock<Regex> = OnceLock::new();
    NON_DIGITS.get_or_init(|| Regex::new(r"\D+").expect("static regex is valid"))
}

/// Normalize a free-form phone number to the format a provider expects.
///
/// Accepts `+62 812-3456-7890`, `0812 3456 7890`, `8123456789` and the like.
/// Returns `None` when nothing usable is left.
pub fn normalize_phone(raw: &str, format: PhoneFormat) -> Option<String> {
    let digits = non_digits().replace_all(raw, "");

    let subscriber = if let Some(rest) = digits.strip_prefix(COUNTRY_CODE) {
        rest.trim_start_matches('0')
    } else {
        digits.trim_start_matches('0')
    };

    if subscriber.is_empty() {
        return None;
    }

    Some(match format {
        PhoneFormat::National => format!("0{}", subscriber),
        PhoneFormat::International => format!("{}{}", COUNTRY_CODE, subscriber),
    })
}
