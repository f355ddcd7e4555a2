//! Identifier validation and quoting.
//!
//! Table and column names discovered in the legacy store (or configured by the
//! user) are interpolated into SQL, because identifiers cannot be bound as
//! parameters. Every such name goes through this module first.

use crate::error::{MigrateError, Result};

/// Maximum identifier length (PostgreSQL truncates at 63 bytes, be conservative).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes and
/// identifiers longer than [`MAX_IDENTIFIER_LENGTH`].
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Identifier(
            "identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Identifier(format!(
            "identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Identifier(format!(
            "identifier exceeds {} bytes (got {}): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// ```ignore
/// assert_eq!(quote_pg("users")?, "\"users\"");
/// assert_eq!(quote_pg("table\"name")?, "\"table\"\"name\"");
/// ```
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a SQLite identifier. SQLite accepts the same double-quote form.
pub fn quote_sqlite(name: &str) -> Result<String> {
    quote_pg(name)
}

/// Qualify a PostgreSQL table name with schema.
pub fn qualify_pg(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_pg(schema)?, quote_pg(table)?))
}

/// Quote a list of column names and join them with `", "`.
pub fn quote_list(names: &[&str], quote: fn(&str) -> Result<String>) -> Result<String> {
    let quoted = names
        .iter()
        .map(|n| quote(n))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_pg() {
        assert_eq!(quote_pg("myapp_client").unwrap(), "\"myapp_client\"");
        assert_eq!(quote_pg("a\"b").unwrap(), "\"a\"\"b\"");
    }

    #[test]
    fn test_quote_sqlite_keeps_dots_inside_quotes() {
        assert_eq!(quote_sqlite("ClientsData.St").unwrap(), "\"ClientsData.St\"");
    }

    #[test]
    fn test_rejects_empty_and_null_bytes() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("bad\0name").is_err());
        assert!(validate_identifier(&"x".repeat(MAX_IDENTIFIER_LENGTH + 1)).is_err());
        assert!(validate_identifier(&"x".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
    }

    #[test]
    fn test_qualify_pg() {
        assert_eq!(
            qualify_pg("public", "myapp_histdata").unwrap(),
            "\"public\".\"myapp_histdata\""
        );
    }

    #[test]
    fn test_quote_list() {
        let joined = quote_list(&["Year", "Month"], quote_sqlite).unwrap();
        assert_eq!(joined, "\"Year\", \"Month\"");
        assert!(quote_list(&["ok", ""], quote_sqlite).is_err());
    }
}
