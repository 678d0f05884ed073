//! Core data types for taxonomic classification.
//!
//! This module provides the fundamental types used throughout the library:
//!
//! - [`Taxon`](taxon::Taxon): A single node of the classification tree
//! - [`RankSchema`](rank::RankSchema): The ordered list of ranks a taxonomy may use
//! - [`Rank`](types::Rank), [`TaxonId`](types::TaxonId), [`DeletePolicy`](types::DeletePolicy): Node metadata
//! - [`TaxonomyError`](error::TaxonomyError): The typed error returned by every operation
//!
//! ## Ranks
//!
//! The default schema orders ranks from shallowest to deepest:
//!
//! | Level | Rank    |
//! |-------|---------|
//! | 0     | domain  |
//! | 1     | kingdom |
//! | 2     | phylum  |
//! | 3     | class   |
//! | 4     | order   |
//! | 5     | family  |
//! | 6     | genus   |
//! | 7     | species |
//!
//! A child must be strictly deeper than its nearest ranked ancestor. Taxa may
//! also be `unranked` (clades such as "Eukaryota incertae sedis"), which are
//! exempt from the ordering.

pub mod error;
pub mod rank;
pub mod taxon;
pub mod types;
