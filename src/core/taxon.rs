use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

use crate::core::types::{Rank, TaxonId};
use crate::utils::validation::normalize_name;

/// A single node in the classification hierarchy.
///
/// Children are not stored on the node; the index derives them from parent
/// references so there is only one source of truth for the tree shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Taxon {
    /// Process-unique identifier, never reused
    pub id: TaxonId,

    /// Canonical scientific name (case preserved)
    pub name: String,

    /// Taxonomic rank
    pub rank: Rank,

    /// Parent taxon, or `None` for roots
    pub parent_id: Option<TaxonId>,

    /// Alternate names, unique across the whole namespace
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub synonyms: BTreeSet<String>,
}

impl Taxon {
    /// Lookup key for the canonical name
    #[must_use]
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Key used to order siblings: normalized name, ties broken by id
    #[must_use]
    pub fn sort_key(&self) -> SortKey {
        (self.normalized_name(), self.id)
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Sibling ordering key
pub type SortKey = (String, TaxonId);

/// Request to create a taxon. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTaxon {
    pub name: String,

    pub rank: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaxonId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
}

impl NewTaxon {
    pub fn new(name: impl Into<String>, rank: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rank: rank.into(),
            parent_id: None,
            synonyms: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: TaxonId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    #[must_use]
    pub fn with_synonym(mut self, synonym: impl Into<String>) -> Self {
        self.synonyms.push(synonym.into());
        self
    }
}

/// Partial update of a taxon; absent fields are left untouched.
///
/// `parent_id` distinguishes "not given" from an explicit `null`, which moves
/// the taxon to the root level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,

    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<Option<TaxonId>>,

    /// Replaces the full synonym set when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synonyms: Option<Vec<String>>,
}

impl TaxonUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.rank.is_none() && self.parent_id.is_none() && self.synonyms.is_none()
    }
}

// Any value that is present, including `null`, becomes `Some(..)`.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Parent reference inside a batch: another batch entry or an existing taxon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentRef {
    Key(String),
    Id(TaxonId),
}

/// One entry of a batch insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTaxon {
    /// Caller-chosen label, unique within the batch
    pub key: String,

    pub name: String,

    pub rank: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
}

/// Id assigned to a batch entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInserted {
    pub key: String,
    pub id: TaxonId,
}
