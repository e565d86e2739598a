use crate::error::{Error, Result};

/// Validates a key selector (search term, recipient or export ID) before
/// passing it to gpg.
///
/// Selectors may be fingerprints, key IDs, e-mail addresses or names, so
/// the content is not restricted further than:
/// - Must not be empty
/// - Must not start with `-` (it would be parsed as an option)
/// - Must not contain control characters
///
/// Returns the selector on success.
pub fn validate_selector(selector: &str) -> Result<&str> {
    if selector.trim().is_empty() {
        return Err(Error::InvalidSelector {
            selector: selector.to_string(),
            reason: "selector cannot be empty".to_string(),
        });
    }

    if selector.starts_with('-') {
        return Err(Error::InvalidSelector {
            selector: selector.to_string(),
            reason: "selector must not start with '-'".to_string(),
        });
    }

    if selector.chars().any(char::is_control) {
        return Err(Error::InvalidSelector {
            selector: selector.to_string(),
            reason: "selector must not contain control characters".to_string(),
        });
    }

    Ok(selector)
}

/// Normalizes a key ID or fingerprint for comparison: strips a `0x`
/// prefix and surrounding whitespace, and upper-cases the rest.
pub fn normalize_keyid(keyid: &str) -> String {
    let trimmed = keyid.trim();
    trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_selectors() {
        assert_eq!(validate_selector("DEADBEEF").unwrap(), "DEADBEEF");
        assert_eq!(
            validate_selector("jane@example.com").unwrap(),
            "jane@example.com"
        );
        assert_eq!(validate_selector("Jane Doe").unwrap(), "Jane Doe");
        assert_eq!(
            validate_selector("0x786C63F330D7CB92").unwrap(),
            "0x786C63F330D7CB92"
        );
    }

    #[test]
    fn test_invalid_selector_empty() {
        let err = validate_selector("").unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));

        let err = validate_selector("   ").unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));
    }

    #[test]
    fn test_invalid_selector_option_injection() {
        let err = validate_selector("--delete-secret-keys").unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));

        let err = validate_selector("-r").unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));
    }

    #[test]
    fn test_invalid_selector_control_chars() {
        let err = validate_selector("jane\nsmith").unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));

        let err = validate_selector("jane\0").unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));
    }

    #[test]
    fn test_normalize_keyid() {
        assert_eq!(normalize_keyid("deadbeef"), "DEADBEEF");
        assert_eq!(normalize_keyid("0xDEADBEEF"), "DEADBEEF");
        assert_eq!(normalize_keyid("0Xdeadbeef"), "DEADBEEF");
        assert_eq!(normalize_keyid(" 786c63f330d7cb92 "), "786C63F330D7CB92");
    }
}
