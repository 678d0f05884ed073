use thiserror::Error;

use crate::core::types::TaxonId;

/// Errors raised by taxonomy operations.
///
/// Each variant names the invariant that a request violated. A failed
/// operation never leaves the taxonomy partially modified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate name: '{name}' is already used by taxon {existing}")]
    DuplicateName { name: String, existing: TaxonId },

    #[error("Invalid rank: '{0}' is not part of the rank schema")]
    InvalidRank(String),

    #[error("Rank order violation: '{child_rank}' cannot be placed below '{parent_rank}'")]
    RankOrderViolation {
        parent_rank: String,
        child_rank: String,
    },

    #[error("Cycle detected: taxon {id} cannot be moved under {new_parent}")]
    CycleDetected { id: TaxonId, new_parent: TaxonId },

    #[error("Missing parent: {0}")]
    MissingParent(String),

    #[error("Taxon {id} has {count} children and cannot be deleted without a cascading policy")]
    HasChildren { id: TaxonId, count: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl TaxonomyError {
    pub(crate) fn taxon_not_found(id: TaxonId) -> Self {
        Self::NotFound(format!("taxon {id}"))
    }

    pub(crate) fn taxon_deleted(id: TaxonId) -> Self {
        Self::NotFound(format!("taxon {id} (deleted)"))
    }

    pub(crate) fn name_not_found(name: &str) -> Self {
        Self::NotFound(format!("name '{name}'"))
    }

    /// Stable machine-readable identifier for the error kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::DuplicateName { .. } => "duplicate_name",
            Self::InvalidRank(_) => "invalid_rank",
            Self::RankOrderViolation { .. } => "rank_order_violation",
            Self::CycleDetected { .. } => "cycle_detected",
            Self::MissingParent(_) => "missing_parent",
            Self::HasChildren { .. } => "has_children",
            Self::InvalidInput(_) => "invalid_input",
        }
    }
}

pub type Result<T> = std::result::Result<T, TaxonomyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_distinct() {
        let errors = [
            TaxonomyError::NotFound("x".into()),
            TaxonomyError::DuplicateName {
                name: "x".into(),
                existing: TaxonId(1),
            },
            TaxonomyError::InvalidRank("x".into()),
            TaxonomyError::RankOrderViolation {
                parent_rank: "genus".into(),
                child_rank: "family".into(),
            },
            TaxonomyError::CycleDetected {
                id: TaxonId(1),
                new_parent: TaxonId(2),
            },
            TaxonomyError::MissingParent("x".into()),
            TaxonomyError::HasChildren {
                id: TaxonId(1),
                count: 2,
            },
            TaxonomyError::InvalidInput("x".into()),
        ];

        let kinds: std::collections::HashSet<_> = errors.iter().map(TaxonomyError::kind).collect();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_error_messages() {
        let err = TaxonomyError::HasChildren {
            id: TaxonId(7),
            count: 3,
        };
        assert!(err.to_string().contains("taxon 7") || err.to_string().contains("Taxon 7"));
        assert_eq!(
            TaxonomyError::taxon_deleted(TaxonId(4)).to_string(),
            "Not found: taxon 4 (deleted)"
        );
    }
}
