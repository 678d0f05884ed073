//! Centralized validation and helper functions.

use crate::core::error::TaxonomyError;

/// Maximum length of a canonical name or synonym, in characters
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum number of synonyms attached to a single taxon
pub const MAX_SYNONYMS: usize = 1_000;

/// Maximum number of entries accepted in one batch insert (DOS protection)
pub const MAX_BATCH_SIZE: usize = 100_000;

/// Page size used when a request does not specify one
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Upper bound for requested page sizes
pub const MAX_PAGE_SIZE: usize = 1_000;

/// Collapse runs of whitespace and trim the ends, preserving case.
///
/// # Examples
///
/// ```
/// use taxon_db::utils::validation::canonicalize_name;
///
/// assert_eq!(canonicalize_name("  Canis   lupus "), "Canis lupus");
/// ```
#[must_use]
pub fn canonicalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lookup key for a name: canonical form, lowercased.
///
/// Two names collide exactly when their normalized forms are equal.
///
/// # Examples
///
/// ```
/// use taxon_db::utils::validation::normalize_name;
///
/// assert_eq!(normalize_name("Canis Lupus"), normalize_name("canis  lupus"));
/// ```
#[must_use]
pub fn normalize_name(name: &str) -> String {
    canonicalize_name(name).to_lowercase()
}

/// Validate a name and return its canonical form.
///
/// # Errors
///
/// Returns [`TaxonomyError::InvalidInput`] if the name is blank, longer than
/// [`MAX_NAME_LENGTH`], or contains control characters.
pub fn validate_name(name: &str) -> Result<String, TaxonomyError> {
    // Tabs and newlines are collapsed like any other whitespace
    if name.chars().any(|c| c.is_control() && !c.is_whitespace()) {
        return Err(TaxonomyError::InvalidInput(
            "names must not contain control characters".to_string(),
        ));
    }

    let canonical = canonicalize_name(name);
    if canonical.is_empty() {
        return Err(TaxonomyError::InvalidInput("names must not be blank".to_string()));
    }

    if canonical.chars().count() > MAX_NAME_LENGTH {
        return Err(TaxonomyError::InvalidInput(format!(
            "names must not exceed {MAX_NAME_LENGTH} characters"
        )));
    }

    Ok(canonical)
}

/// Resolve a requested page size, applying the default and the upper bound.
///
/// # Errors
///
/// Returns [`TaxonomyError::InvalidInput`] for a page size of zero.
pub fn effective_page_size(requested: Option<usize>) -> Result<usize, TaxonomyError> {
    match requested {
        None => Ok(DEFAULT_PAGE_SIZE),
        Some(0) => Err(TaxonomyError::InvalidInput(
            "page size must be at least 1".to_string(),
        )),
        Some(n) => Ok(n.min(MAX_PAGE_SIZE)),
    }
}

/// Check that a batch is within the accepted size.
///
/// # Errors
///
/// Returns [`TaxonomyError::InvalidInput`] if the batch exceeds [`MAX_BATCH_SIZE`].
pub fn check_batch_limit(count: usize) -> Result<(), TaxonomyError> {
    if count > MAX_BATCH_SIZE {
        Err(TaxonomyError::InvalidInput(format!(
            "batch of {count} entries exceeds maximum of {MAX_BATCH_SIZE}"
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_name() {
        assert_eq!(canonicalize_name("Homo sapiens"), "Homo sapiens");
        assert_eq!(canonicalize_name("\tHomo\n sapiens  "), "Homo sapiens");
        assert_eq!(canonicalize_name("   "), "");
    }

    #[test]
    fn test_normalize_name_is_case_insensitive() {
        assert_eq!(normalize_name("Canis Lupus"), "canis lupus");
        assert_eq!(normalize_name("ÆGYPTUS"), "ægyptus");
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name(" Felis  catus ").unwrap(), "Felis catus");
        assert!(matches!(validate_name(""), Err(TaxonomyError::InvalidInput(_))));
        assert!(matches!(validate_name(" \t "), Err(TaxonomyError::InvalidInput(_))));
        assert!(matches!(
            validate_name("Felis\0catus"),
            Err(TaxonomyError::InvalidInput(_))
        ));

        let long_name = "a".repeat(MAX_NAME_LENGTH + 1);
        assert!(matches!(
            validate_name(&long_name),
            Err(TaxonomyError::InvalidInput(_))
        ));
        assert!(validate_name(&"a".repeat(MAX_NAME_LENGTH)).is_ok());
    }

    #[test]
    fn test_effective_page_size() {
        assert_eq!(effective_page_size(None).unwrap(), DEFAULT_PAGE_SIZE);
        assert_eq!(effective_page_size(Some(5)).unwrap(), 5);
        assert_eq!(effective_page_size(Some(1_000_000)).unwrap(), MAX_PAGE_SIZE);
        assert!(effective_page_size(Some(0)).is_err());
    }

    #[test]
    fn test_check_batch_limit() {
        assert!(check_batch_limit(MAX_BATCH_SIZE).is_ok());
        assert!(check_batch_limit(MAX_BATCH_SIZE + 1).is_err());
    }
}
