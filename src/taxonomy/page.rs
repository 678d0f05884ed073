//! Cursor-based pagination.
//!
//! A continuation token is the hex encoding of the last sort key returned.
//! Resuming from a token needs no server-side cursor state, so no lock is
//! held between pages; a page simply starts after the key it was given.

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, TaxonomyError};
use crate::core::taxon::SortKey;
use crate::core::types::TaxonId;
use crate::utils::validation::effective_page_size;

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// Token for the following page, absent on the last page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

/// Paging parameters supplied by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl PageRequest {
    #[must_use]
    pub fn first(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            cursor: None,
        }
    }

    #[must_use]
    pub fn after(limit: usize, cursor: impl Into<String>) -> Self {
        Self {
            limit: Some(limit),
            cursor: Some(cursor.into()),
        }
    }

    pub(crate) fn page_size(&self) -> Result<usize> {
        effective_page_size(self.limit)
    }
}

/// Encode an arbitrary string as an opaque token
#[must_use]
pub fn encode_cursor(raw: &str) -> String {
    hex::encode(raw)
}

/// Decode a token produced by [`encode_cursor`]
///
/// # Errors
///
/// Returns [`TaxonomyError::InvalidInput`] if the token is not valid hex or
/// does not decode to UTF-8.
pub fn decode_cursor(token: &str) -> Result<String> {
    let invalid = || TaxonomyError::InvalidInput("malformed continuation token".to_string());
    let bytes = hex::decode(token).map_err(|_| invalid())?;
    String::from_utf8(bytes).map_err(|_| invalid())
}

pub(crate) fn encode_sort_key(key: &SortKey) -> String {
    encode_cursor(&format!("{}:{}", key.1, key.0))
}

pub(crate) fn decode_sort_key(token: &str) -> Result<SortKey> {
    let raw = decode_cursor(token)?;
    let (id, name) = raw
        .split_once(':')
        .ok_or_else(|| TaxonomyError::InvalidInput("malformed continuation token".to_string()))?;
    let id: TaxonId = id
        .parse()
        .map_err(|_| TaxonomyError::InvalidInput("malformed continuation token".to_string()))?;
    Ok((name.to_string(), id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_token() {
        let key = ("canis: lupus".to_string(), TaxonId(12));
        let token = encode_sort_key(&key);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(decode_sort_key(&token).unwrap(), key);
    }

    #[test]
    fn test_malformed_tokens() {
        for token in ["abc", "zz", "ff", "éé", &encode_cursor("no-separator")] {
            assert!(
                matches!(decode_sort_key(token), Err(TaxonomyError::InvalidInput(_))),
                "token {token:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_page_request_size() {
        assert_eq!(PageRequest::default().page_size().unwrap(), 100);
        assert!(PageRequest::first(0).page_size().is_err());
    }
}
