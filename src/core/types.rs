use serde::{Deserialize, Serialize, Serializer};

/// Unique identifier for a taxon in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxonId(pub u64);

impl TaxonId {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaxonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaxonId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Label used for taxa that sit outside the rank schema
pub const UNRANKED: &str = "unranked";

/// Taxonomic rank of a node.
///
/// Ranked values carry their depth in the schema (0 is the shallowest rank).
/// `Unranked` may appear anywhere in the tree and is exempt from ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rank {
    Ranked { level: usize, name: String },
    Unranked,
}

impl Rank {
    /// Depth within the schema, or `None` for unranked nodes
    #[must_use]
    pub fn level(&self) -> Option<usize> {
        match self {
            Self::Ranked { level, .. } => Some(*level),
            Self::Unranked => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Ranked { name, .. } => name,
            Self::Unranked => UNRANKED,
        }
    }

    #[must_use]
    pub fn is_ranked(&self) -> bool {
        matches!(self, Self::Ranked { .. })
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// Ranks are rendered by name; parsing a name back requires the rank schema.
impl Serialize for Rank {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// What happens to the children of a deleted taxon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Refuse to delete a taxon that still has children
    #[default]
    Restrict,
    /// Delete the taxon together with its whole subtree
    Cascade,
    /// Re-attach the children to the deleted taxon's parent
    Promote,
}

impl std::fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Restrict => write!(f, "restrict"),
            Self::Cascade => write!(f, "cascade"),
            Self::Promote => write!(f, "promote"),
        }
    }
}
