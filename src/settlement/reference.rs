//! Order reference ids
//!
//! A reference id is minted once per checkout attempt and is the only key a
//! provider notification carries back to us.

use crate::error::{AppError, AppResult};
use chrono::Utc;
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

const MAX_LEN: usize = 64;
const SUFFIX_LEN: usize = 6;

fn allowed() -> &'static Regex {
    static ALLOWED: OnceLock<Regex> = OnceLock::new();
    ALLOWED.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"))
}

/// `PREFIX-YYYYMMDDHHMMSS-XXXXXX`, e.g. `TB-20240601093000-4F2A9C`
pub fn generate(prefix: &str) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        prefix,
        Utc::now().format("%Y%m%d%H%M%S"),
        random[..SUFFIX_LEN].to_ascii_uppercase()
    )
}

/// Check a caller-supplied reference id. Providers echo it verbatim, so only
/// characters every gateway accepts in an order id are allowed.
pub fn validate(reference_id: &str) -> AppResult<()> {
    if reference_id.is_empty() {
        return Err(AppError::missing_field("reference_id"));
    }
    if reference_id.len() > MAX_LEN {
        return Err(AppError::validation(
            "reference_id",
            format!("must be at most {} characters", MAX_LEN),
        ));
    }
    if !allowed().is_match(reference_id) {
        return Err(AppError::validation(
            "reference_id",
            "only letters, digits, '-' and '_' are allowed",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_shape() {
        let reference = generate("TB");
        let parts: Vec<&str> = reference.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TB");
        assert_eq!(parts[1].len(), 14);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(validate(&reference).is_ok());
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(generate("TB"), generate("TB"));
    }

    #[test]
    fn test_validate_rejects_bad_ids() {
        assert!(validate("TB-TEST-1").is_ok());
        assert!(validate("").is_err());
        assert!(validate("has space").is_err());
        assert!(validate(&"A".repeat(65)).is_err());
    }
}
