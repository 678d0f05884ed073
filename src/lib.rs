//! # taxon-db
//!
//! An in-memory store for taxonomic classifications, with an HTTP API.
//!
//! Taxa form a forest: every taxon has a name, a rank from a configurable
//! schema (`domain` → `kingdom` → … → `species`, or `unranked`), an optional
//! parent and any number of synonyms. The store guarantees that:
//!
//! - names and synonyms are unique across the store, ignoring case and
//!   surrounding or repeated whitespace
//! - ranks only get narrower going down the tree
//! - the parent graph never contains a cycle
//!
//! A mutation that would break any of these is rejected with a typed
//! [`TaxonomyError`] and leaves the store exactly as it was.
//!
//! ## Example
//!
//! ```rust
//! use taxon_db::{NewTaxon, RankSchema, TaxonStore, TaxonomyError};
//!
//! let store = TaxonStore::new(RankSchema::load_embedded().unwrap());
//! let canis = store.insert(NewTaxon::new("Canis", "genus")).unwrap();
//! store
//!     .insert(NewTaxon::new("Canis lupus", "species").with_parent(canis.id))
//!     .unwrap();
//!
//! // Names are compared case-insensitively
//! let duplicate = store.insert(NewTaxon::new("canis LUPUS", "species"));
//! assert!(matches!(duplicate, Err(TaxonomyError::DuplicateName { .. })));
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Taxon, rank and error types
//! - [`taxonomy`]: Index, store, queries, pagination and snapshots
//! - [`web`]: HTTP server
//! - [`cli`]: Command-line interface implementation
//! - [`utils`]: Name normalization and input limits

pub mod cli;
pub mod core;
pub mod taxonomy;
pub mod utils;
pub mod web;

// Re-export commonly used types for convenience
pub use core::error::TaxonomyError;
pub use core::rank::RankSchema;
pub use core::taxon::{BatchTaxon, NewTaxon, ParentRef, Taxon, TaxonUpdate};
pub use core::types::*;
pub use taxonomy::page::{Page, PageRequest};
pub use taxonomy::query::TaxonQuery;
pub use taxonomy::snapshot::TaxonomySnapshot;
pub use taxonomy::store::TaxonStore;
