use crate::api::middleware::AppError;

/// Longest identifier accepted by every supported engine (Oracle 12.2+ allows 128 bytes)
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validation for names that are interpolated into SQL text instead of bound.
///
/// DDL cannot take bind parameters, so sequence names are spliced into the statement and
/// must be restricted to plain unquoted identifiers.
pub struct IdentifierValidator;

impl IdentifierValidator {
    /// Accepts `[A-Za-z_][A-Za-z0-9_]*`, optionally schema-qualified with a single dot
    pub fn validate(name: &str) -> Result<&str, AppError> {
        if name.is_empty() {
            return Err(AppError::Validation("Identifier cannot be empty".to_string()));
        }
        if name.len() > MAX_IDENTIFIER_LENGTH {
            return Err(AppError::Validation(format!(
                "Identifier '{}' exceeds {} characters",
                name, MAX_IDENTIFIER_LENGTH
            )));
        }

        let mut parts = name.split('.');
        let valid = match (parts.next(), parts.next(), parts.next()) {
            (Some(object), None, _) => Self::is_plain(object),
            (Some(schema), Some(object), None) => Self::is_plain(schema) && Self::is_plain(object),
            _ => false,
        };

        if valid {
            Ok(name)
        } else {
            Err(AppError::Validation(format!(
                "'{}' is not a valid SQL identifier",
                name
            )))
        }
    }

    fn is_plain(part: &str) -> bool {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
}
