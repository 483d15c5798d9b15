//! Common validation utilities.

use validator::ValidationError;

/// Maximum length of a PostgreSQL identifier.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

lazy_static::lazy_static! {
    /// Lowercase SQL identifier usable unquoted as a table name.
    pub static ref MODEL_NAME_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").unwrap();
}

/// Validates that a model name can be used as a table name.
pub fn validate_model_name(name: &str) -> Result<(), ValidationError> {
    if MODEL_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        let mut err = ValidationError::new("model_name_format");
        err.message = Some(
            "Model name must start with a lowercase letter or underscore and contain only lowercase letters, digits and underscores (max 63 chars)"
                .into(),
        );
        Err(err)
    }
}

/// Validates that an id is a non-empty decimal snowflake.
pub fn validate_snowflake(id: &str) -> Result<(), ValidationError> {
    if !id.is_empty() && id.len() <= 20 && id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("snowflake_format");
        err.message = Some("Id must be a decimal snowflake".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_model_names() {
        assert!(validate_model_name("invite_joins").is_ok());
        assert!(validate_model_name("_private").is_ok());
        assert!(validate_model_name("joins2").is_ok());
        assert!(validate_model_name(&"a".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
    }

    #[test]
    fn test_invalid_model_names() {
        assert!(validate_model_name("").is_err());
        assert!(validate_model_name("InviteSchema").is_err());
        assert!(validate_model_name("2joins").is_err());
        assert!(validate_model_name("joins; DROP TABLE x").is_err());
        assert!(validate_model_name(&"a".repeat(MAX_IDENTIFIER_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_snowflake_validation() {
        assert!(validate_snowflake("175928847299117063").is_ok());
        assert!(validate_snowflake("").is_err());
        assert!(validate_snowflake("12a").is_err());
        assert!(validate_snowflake("123456789012345678901").is_err());
    }
}
