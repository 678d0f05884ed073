//! Rank schema: the ordered set of ranks a taxonomy may use.
//!
//! The schema is loaded once when a store is built and never changes
//! afterwards. Ranks are listed from shallowest to deepest, so a rank's
//! position in the list is its depth.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::core::error::TaxonomyError;
use crate::core::types::{Rank, UNRANKED};

#[derive(Error, Debug)]
pub enum RankSchemaError {
    #[error("Failed to read rank schema: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse rank schema: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid rank schema: {0}")]
    Invalid(String),
}

/// Schema version for compatibility checking
pub const RANK_SCHEMA_VERSION: &str = "1.0.0";

/// Serializable schema format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankSchemaData {
    pub version: String,
    pub ranks: Vec<String>,
}

/// Ordered, immutable list of taxonomic ranks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankSchema {
    ranks: Vec<String>,

    /// Index: lowercase rank name -> depth
    levels: HashMap<String, usize>,
}

impl RankSchema {
    /// Build a schema from rank names ordered shallowest first
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, contains blank or duplicate
    /// names, or lists the reserved `unranked` label.
    pub fn new<I, S>(names: I) -> Result<Self, RankSchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ranks = Vec::new();
        let mut levels = HashMap::new();

        for name in names {
            let name = name.as_ref().trim().to_lowercase();
            if name.is_empty() {
                return Err(RankSchemaError::Invalid(format!(
                    "rank at position {} is blank",
                    ranks.len()
                )));
            }
            if name == UNRANKED {
                return Err(RankSchemaError::Invalid(format!(
                    "'{UNRANKED}' is reserved and cannot be listed"
                )));
            }
            if levels.insert(name.clone(), ranks.len()).is_some() {
                return Err(RankSchemaError::Invalid(format!("duplicate rank '{name}'")));
            }
            ranks.push(name);
        }

        if ranks.is_empty() {
            return Err(RankSchemaError::Invalid("no ranks defined".to_string()));
        }

        Ok(Self { ranks, levels })
    }

    /// Load the embedded default schema (domain through species)
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded JSON is malformed. The file is
    /// validated by the build script, so this only fails on a broken build.
    pub fn load_embedded() -> Result<Self, RankSchemaError> {
        // Embedded at compile time, validated by build.rs
        const EMBEDDED_SCHEMA: &str = include_str!("../../ranks/default_ranks.json");
        Self::from_json(EMBEDDED_SCHEMA)
    }

    /// Load a schema from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not hold a valid schema.
    pub fn load_from_file(path: &Path) -> Result<Self, RankSchemaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a schema from a JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the rank list is invalid.
    pub fn from_json(json: &str) -> Result<Self, RankSchemaError> {
        let data: RankSchemaData = serde_json::from_str(json)?;

        // Version check (warn but don't fail)
        if data.version != RANK_SCHEMA_VERSION {
            tracing::warn!(
                expected = RANK_SCHEMA_VERSION,
                found = %data.version,
                "Rank schema version mismatch"
            );
        }

        Self::new(data.ranks)
    }

    /// Export the schema in its serializable form
    #[must_use]
    pub fn to_data(&self) -> RankSchemaData {
        RankSchemaData {
            version: RANK_SCHEMA_VERSION.to_string(),
            ranks: self.ranks.clone(),
        }
    }

    /// Resolve a rank name (case-insensitive). `unranked` yields the sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`TaxonomyError::InvalidRank`] for names outside the schema.
    pub fn rank_of(&self, name: &str) -> Result<Rank, TaxonomyError> {
        let key = name.trim().to_lowercase();
        if key == UNRANKED {
            return Ok(Rank::Unranked);
        }
        self.levels
            .get(&key)
            .map(|&level| Rank::Ranked {
                level,
                name: self.ranks[level].clone(),
            })
            .ok_or_else(|| TaxonomyError::InvalidRank(name.to_string()))
    }

    /// Whether `child` may sit directly below `parent`.
    ///
    /// Unranked nodes on either side are always accepted; otherwise the child
    /// must be strictly deeper than the parent.
    #[must_use]
    pub fn is_valid_child_rank(parent: &Rank, child: &Rank) -> bool {
        match (parent.level(), child.level()) {
            (Some(parent_level), Some(child_level)) => child_level > parent_level,
            _ => true,
        }
    }

    /// Rank names, shallowest first
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.ranks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_embedded_schema() {
        let schema = RankSchema::load_embedded().unwrap();
        assert_eq!(schema.len(), 8);
        assert_eq!(schema.names()[0], "domain");
        assert_eq!(schema.names()[7], "species");
    }

    #[test]
    fn test_rank_of_is_case_insensitive() {
        let schema = RankSchema::load_embedded().unwrap();
        let rank = schema.rank_of("Kingdom").unwrap();
        assert_eq!(rank.level(), Some(1));
        assert_eq!(rank.name(), "kingdom");
        assert_eq!(schema.rank_of(" UNRANKED ").unwrap(), Rank::Unranked);
    }

    #[test]
    fn test_rank_of_unknown() {
        let schema = RankSchema::load_embedded().unwrap();
        assert_eq!(
            schema.rank_of("superkingdom"),
            Err(TaxonomyError::InvalidRank("superkingdom".to_string()))
        );
    }

    #[test]
    fn test_valid_child_rank() {
        let schema = RankSchema::load_embedded().unwrap();
        let kingdom = schema.rank_of("kingdom").unwrap();
        let phylum = schema.rank_of("phylum").unwrap();

        assert!(RankSchema::is_valid_child_rank(&kingdom, &phylum));
        assert!(!RankSchema::is_valid_child_rank(&phylum, &kingdom));
        assert!(!RankSchema::is_valid_child_rank(&kingdom, &kingdom));
        assert!(RankSchema::is_valid_child_rank(&Rank::Unranked, &kingdom));
        assert!(RankSchema::is_valid_child_rank(&phylum, &Rank::Unranked));
    }

    #[test]
    fn test_invalid_schemas() {
        assert!(matches!(
            RankSchema::new(Vec::<String>::new()),
            Err(RankSchemaError::Invalid(_))
        ));
        assert!(matches!(
            RankSchema::new(["genus", "Genus"]),
            Err(RankSchemaError::Invalid(_))
        ));
        assert!(matches!(
            RankSchema::new(["genus", " "]),
            Err(RankSchemaError::Invalid(_))
        ));
        assert!(matches!(
            RankSchema::new(["unranked"]),
            Err(RankSchemaError::Invalid(_))
        ));
    }

    #[test]
    fn test_schema_json_round_trip() {
        let schema = RankSchema::new(["order", "family", "genus"]).unwrap();
        let json = serde_json::to_string(&schema.to_data()).unwrap();
        assert_eq!(RankSchema::from_json(&json).unwrap(), schema);
    }
}
