//! Taxonomy storage, indexing and querying.
//!
//! [`store::TaxonStore`] is the entry point: a thread-safe façade over the
//! [`index::TaxonomyIndex`], which keeps the taxa together with their name,
//! child and root indexes. Every mutation validates the full set of tree
//! invariants before anything is changed.
//!
//! ## Example
//!
//! ```rust
//! use taxon_db::core::rank::RankSchema;
//! use taxon_db::core::taxon::NewTaxon;
//! use taxon_db::taxonomy::store::TaxonStore;
//!
//! let store = TaxonStore::new(RankSchema::load_embedded().unwrap());
//! let animalia = store.insert(NewTaxon::new("Animalia", "kingdom")).unwrap();
//! let chordata = store
//!     .insert(NewTaxon::new("Chordata", "phylum").with_parent(animalia.id))
//!     .unwrap();
//!
//! // Moving a taxon below its own descendant is rejected
//! assert!(store.reparent(animalia.id, Some(chordata.id)).is_err());
//! ```
//!
//! ## Snapshots
//!
//! The whole store can be exported with [`store::TaxonStore::snapshot`] and
//! reloaded with [`store::TaxonStore::from_snapshot`]. Ids, tombstones and
//! the id counter survive the round trip.

pub mod index;
pub mod observer;
pub mod page;
pub mod query;
pub mod snapshot;
pub mod store;
