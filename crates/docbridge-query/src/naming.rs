//! Routing parameter validation

use docbridge_common::{Error, Result};

const MAX_DATABASE_NAME_BYTES: usize = 63;
const MAX_COLLECTION_NAME_BYTES: usize = 255;
const DATABASE_NAME_FORBIDDEN: &[char] = &['/', '\\', '.', ' ', '"', '$', '\0'];

/// Take a required routing parameter, rejecting absent and blank values
pub fn require<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::Validation(format!("{} is required", name))),
    }
}

pub fn validate_database_name(name: &str) -> Result<()> {
    if name.len() > MAX_DATABASE_NAME_BYTES {
        return Err(Error::Validation(format!(
            "db_name must be at most {} bytes",
            MAX_DATABASE_NAME_BYTES
        )));
    }
    if let Some(c) = name.chars().find(|c| DATABASE_NAME_FORBIDDEN.contains(c)) {
        return Err(Error::Validation(format!("db_name must not contain {:?}", c)));
    }
    Ok(())
}

pub fn validate_collection_name(name: &str) -> Result<()> {
    if name.len() > MAX_COLLECTION_NAME_BYTES {
        return Err(Error::Validation(format!(
            "collection_name must be at most {} bytes",
            MAX_COLLECTION_NAME_BYTES
        )));
    }
    if name.contains('$') || name.contains('\0') {
        return Err(Error::Validation(
            "collection_name must not contain '$' or NUL".to_string(),
        ));
    }
    if name.starts_with("system.") {
        return Err(Error::Validation(
            "collection_name must not start with 'system.'".to_string(),
        ));
    }
    Ok(())
}

/// The key field becomes a filter key, so it must not look like an operator
pub fn validate_key_field(name: &str) -> Result<()> {
    if name.starts_with('$') || name.contains('\0') {
        return Err(Error::Validation(format!("uuid_name {:?} is not a valid field name", name)));
    }
    Ok(())
}
