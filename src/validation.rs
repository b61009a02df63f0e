//! Field checks shared by every save path.

use crate::error::{MapError, MapResult};
use once_cell::sync::Lazy;
use regex::Regex;

static CODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("code pattern is a valid regex")
});

/// Rejects blank required fields.
pub fn require(field: &str, value: &str) -> MapResult<()> {
    if value.trim().is_empty() {
        return Err(MapError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Codes are identifiers so they can be referenced from mapping trees.
pub fn validate_code(kind: &str, code: &str) -> MapResult<()> {
    require(&format!("{} code", kind), code)?;
    if !CODE_PATTERN.is_match(code) {
        return Err(MapError::Validation(format!(
            "{} code '{}' must start with a letter or '_' and contain only letters, digits and '_'",
            kind, code
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_identifiers() {
        assert!(validate_code("function", "ROUND2").is_ok());
        assert!(validate_code("function", "_x1").is_ok());
        assert!(validate_code("function", "2X").is_err());
        assert!(validate_code("function", "a-b").is_err());
        assert!(validate_code("function", " ").is_err());
    }

    #[test]
    fn require_rejects_whitespace() {
        assert!(require("name", "  ").is_err());
        assert!(require("name", "x").is_ok());
    }
}
