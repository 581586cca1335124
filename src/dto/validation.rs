//! Validation helpers for DTOs.

use validator::ValidationError;

/// Maximum length of a single status tag.
const MAX_TAG_LENGTH: usize = 40;

/// Rejects names made only of whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("value must contain at least one non-whitespace character".into());
        return Err(err);
    }
    Ok(())
}

/// Validates a room's custom status tags: non-blank, short, and not the reserved `open`.
pub fn validate_status_tags(tags: &[String]) -> Result<(), ValidationError> {
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_TAG_LENGTH {
            let mut err = ValidationError::new("status_tag_length");
            err.message = Some(
                format!("status tags must be 1 to {MAX_TAG_LENGTH} characters (got `{tag}`)")
                    .into(),
            );
            return Err(err);
        }
        if trimmed.eq_ignore_ascii_case(crate::dao::models::STATUS_OPEN) {
            let mut err = ValidationError::new("status_tag_reserved");
            err.message = Some("`open` is reserved and cannot be configured as a tag".into());
            return Err(err);
        }
    }
    Ok(())
}

/// Parse a script line reference made only of ASCII digits.
///
/// Signs, whitespace, decimals and empty strings are rejected.
pub fn parse_line_ref(value: &str) -> Option<u32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
