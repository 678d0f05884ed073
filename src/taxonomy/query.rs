//! Boolean set queries over the taxonomy.
//!
//! Queries are small syntax trees whose JSON form mirrors their structure:
//!
//! ```json
//! {"and": [{"rank": "species"}, {"under": 3}, {"not": {"prefix": "canis"}}]}
//! ```
//!
//! The `&`, `|` and `!` operators build the same trees from Rust, and
//! `Display` renders them as S-expressions, e.g.
//! `(and (rank species) (under 3) (not (prefix canis)))`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::error::Result;
use crate::core::rank::RankSchema;
use crate::core::types::TaxonId;
use crate::taxonomy::index::TaxonomyIndex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonQuery {
    /// Taxa of the given rank (or `unranked`)
    Rank(String),
    /// Strict descendants of a taxon
    Under(TaxonId),
    /// Taxa with a canonical name or synonym starting with the prefix
    Prefix(String),
    /// Taxa matched by every sub-query (all taxa when empty)
    And(Vec<TaxonQuery>),
    /// Taxa matched by any sub-query (none when empty)
    Or(Vec<TaxonQuery>),
    /// Taxa not matched by the sub-query
    Not(Box<TaxonQuery>),
}

impl TaxonQuery {
    pub fn rank(name: impl Into<String>) -> Self {
        Self::Rank(name.into())
    }

    #[must_use]
    pub fn under(id: TaxonId) -> Self {
        Self::Under(id)
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix(prefix.into())
    }

    /// Evaluate against an index, returning matching ids
    pub(crate) fn evaluate(
        &self,
        index: &TaxonomyIndex,
        schema: &RankSchema,
    ) -> Result<BTreeSet<TaxonId>> {
        match self {
            Self::Rank(name) => {
                let rank = schema.rank_of(name)?;
                Ok(index.iter().filter(|t| t.rank == rank).map(|t| t.id).collect())
            }
            Self::Under(id) => Ok(index.descendants(*id)?.iter().map(|t| t.id).collect()),
            Self::Prefix(prefix) => Ok(index.ids_with_name_prefix(prefix)),
            Self::And(queries) => {
                let mut result: Option<BTreeSet<TaxonId>> = None;
                for query in queries {
                    let matched = query.evaluate(index, schema)?;
                    result = Some(match result {
                        Some(acc) => acc.intersection(&matched).copied().collect(),
                        None => matched,
                    });
                }
                Ok(result.unwrap_or_else(|| index.all_ids()))
            }
            Self::Or(queries) => {
                let mut result = BTreeSet::new();
                for query in queries {
                    result.extend(query.evaluate(index, schema)?);
                }
                Ok(result)
            }
            Self::Not(query) => {
                let excluded = query.evaluate(index, schema)?;
                Ok(index
                    .all_ids()
                    .into_iter()
                    .filter(|id| !excluded.contains(id))
                    .collect())
            }
        }
    }
}

impl std::ops::BitAnd for TaxonQuery {
    type Output = TaxonQuery;

    fn bitand(self, rhs: Self) -> Self::Output {
        match self {
            Self::And(mut queries) => {
                queries.push(rhs);
                Self::And(queries)
            }
            other => Self::And(vec![other, rhs]),
        }
    }
}

impl std::ops::BitOr for TaxonQuery {
    type Output = TaxonQuery;

    fn bitor(self, rhs: Self) -> Self::Output {
        match self {
            Self::Or(mut queries) => {
                queries.push(rhs);
                Self::Or(queries)
            }
            other => Self::Or(vec![other, rhs]),
        }
    }
}

impl std::ops::Not for TaxonQuery {
    type Output = TaxonQuery;

    fn not(self) -> Self::Output {
        Self::Not(Box::new(self))
    }
}

impl std::fmt::Display for TaxonQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (op, children) = match self {
            Self::Rank(name) => return write!(f, "(rank {name})"),
            Self::Under(id) => return write!(f, "(under {id})"),
            Self::Prefix(prefix) => return write!(f, "(prefix {prefix})"),
            Self::Not(query) => return write!(f, "(not {query})"),
            Self::And(queries) => ("and", queries),
            Self::Or(queries) => ("or", queries),
        };
        write!(f, "({op}")?;
        for child in children {
            write!(f, " {child}")?;
        }
        write!(f, ")")
    }
}
