//! HTTP API over a [`TaxonStore`](crate::taxonomy::store::TaxonStore).
//!
//! ## Starting the Server
//!
//! ```text
//! # Start on default port 8980 with the built-in rank schema
//! taxon-db serve
//!
//! # Preload a snapshot
//! taxon-db serve --snapshot taxonomy.json
//!
//! # Bind to all interfaces
//! taxon-db serve --address 0.0.0.0 --port 9000
//! ```
//!
//! ## API Endpoints
//!
//! - `GET /api/health`, `GET /api/ranks`, `GET /api/stats`
//! - `GET /api/taxa` - Root taxa (paged with `limit` and `cursor`)
//! - `POST /api/taxa` - Insert a taxon
//! - `POST /api/taxa/batch` - Insert many taxa atomically
//! - `GET|PATCH|DELETE /api/taxa/{id}` - Read, update or delete (`?policy=cascade`)
//! - `GET /api/taxa/{id}/children|ancestors|descendants|siblings`
//! - `POST /api/taxa/{id}/synonyms`, `DELETE /api/taxa/{id}/synonyms/{name}`
//! - `GET /api/names/{name}` - Lookup by name or synonym
//! - `GET /api/search?prefix=` - Prefix search (paged)
//! - `POST /api/query` - Boolean query
//! - `GET /api/export` - Full snapshot
//!
//! Failures return `{"error": ..., "error_type": ...}` with a status derived
//! from the error kind.

pub mod error;
pub mod handlers;
pub mod server;
