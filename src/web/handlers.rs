//! One handler per endpoint. Handlers decode the request, call the store and
//! encode the result; all taxonomic validation happens in the store.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::rank::RankSchemaData;
use crate::core::taxon::{BatchInserted, BatchTaxon, NewTaxon, Taxon, TaxonUpdate};
use crate::core::types::{DeletePolicy, TaxonId};
use crate::taxonomy::page::{Page, PageRequest};
use crate::taxonomy::query::TaxonQuery;
use crate::taxonomy::snapshot::TaxonomySnapshot;
use crate::taxonomy::store::{QueryResult, SearchHit, StoreStats};
use crate::web::error::ApiError;
use crate::web::server::AppState;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub taxa: usize,
}

#[derive(Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub policy: DeletePolicy,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub deleted: Vec<TaxonId>,
}

#[derive(Serialize)]
pub struct BatchResponse {
    pub inserted: Vec<BatchInserted>,
}

#[derive(Deserialize)]
pub struct SynonymRequest {
    pub synonym: String,
}

/// Query string of `/api/search`
#[derive(Deserialize)]
pub struct SearchParams {
    pub prefix: String,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        taxa: state.store.len(),
    })
}

pub async fn ranks(State(state): State<Arc<AppState>>) -> Json<RankSchemaData> {
    Json(state.store.schema().to_data())
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StoreStats> {
    Json(state.store.stats())
}

pub async fn list_roots(
    State(state): State<Arc<AppState>>,
    page: Result<Query<PageRequest>, QueryRejection>,
) -> ApiResult<Json<Page<Taxon>>> {
    let Query(page) = page?;
    Ok(Json(state.store.roots(&page)?))
}

pub async fn create_taxon(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewTaxon>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(new) = body?;
    let taxon = state.store.insert(new)?;
    Ok((StatusCode::CREATED, Json(taxon)))
}

pub async fn create_batch(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Vec<BatchTaxon>>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(batch) = body?;
    let inserted = state.store.insert_batch(batch)?;
    Ok((StatusCode::CREATED, Json(BatchResponse { inserted })))
}

pub async fn get_taxon(
    State(state): State<Arc<AppState>>,
    id: Result<Path<TaxonId>, PathRejection>,
) -> ApiResult<Json<Taxon>> {
    let Path(id) = id?;
    Ok(Json(state.store.get(id)?))
}

pub async fn update_taxon(
    State(state): State<Arc<AppState>>,
    id: Result<Path<TaxonId>, PathRejection>,
    body: Result<Json<TaxonUpdate>, JsonRejection>,
) -> ApiResult<Json<Taxon>> {
    let Path(id) = id?;
    let Json(update) = body?;
    Ok(Json(state.store.update(id, update)?))
}

pub async fn delete_taxon(
    State(state): State<Arc<AppState>>,
    id: Result<Path<TaxonId>, PathRejection>,
    params: Result<Query<DeleteParams>, QueryRejection>,
) -> ApiResult<Json<DeleteResponse>> {
    let Path(id) = id?;
    let Query(params) = params?;
    let deleted = state.store.delete(id, params.policy)?;
    Ok(Json(DeleteResponse { deleted }))
}

pub async fn children(
    State(state): State<Arc<AppState>>,
    id: Result<Path<TaxonId>, PathRejection>,
    page: Result<Query<PageRequest>, QueryRejection>,
) -> ApiResult<Json<Page<Taxon>>> {
    let Path(id) = id?;
    let Query(page) = page?;
    Ok(Json(state.store.children(id, &page)?))
}

pub async fn ancestors(
    State(state): State<Arc<AppState>>,
    id: Result<Path<TaxonId>, PathRejection>,
) -> ApiResult<Json<Vec<Taxon>>> {
    let Path(id) = id?;
    Ok(Json(state.store.ancestors(id)?))
}

pub async fn descendants(
    State(state): State<Arc<AppState>>,
    id: Result<Path<TaxonId>, PathRejection>,
) -> ApiResult<Json<Vec<Taxon>>> {
    let Path(id) = id?;
    Ok(Json(state.store.descendants(id)?))
}

pub async fn siblings(
    State(state): State<Arc<AppState>>,
    id: Result<Path<TaxonId>, PathRejection>,
) -> ApiResult<Json<Vec<Taxon>>> {
    let Path(id) = id?;
    Ok(Json(state.store.siblings(id)?))
}

pub async fn add_synonym(
    State(state): State<Arc<AppState>>,
    id: Result<Path<TaxonId>, PathRejection>,
    body: Result<Json<SynonymRequest>, JsonRejection>,
) -> ApiResult<Json<Taxon>> {
    let Path(id) = id?;
    let Json(request) = body?;
    Ok(Json(state.store.add_synonym(id, &request.synonym)?))
}

pub async fn remove_synonym(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(TaxonId, String)>, PathRejection>,
) -> ApiResult<Json<Taxon>> {
    let Path((id, synonym)) = path?;
    Ok(Json(state.store.remove_synonym(id, &synonym)?))
}

pub async fn get_by_name(
    State(state): State<Arc<AppState>>,
    name: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Taxon>> {
    let Path(name) = name?;
    Ok(Json(state.store.get_by_name(&name)?))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<Json<Page<SearchHit>>> {
    let Query(params) = params?;
    let page = PageRequest {
        limit: params.limit,
        cursor: params.cursor,
    };
    Ok(Json(state.store.search(&params.prefix, &page)?))
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TaxonQuery>, JsonRejection>,
) -> ApiResult<Json<QueryResult>> {
    let Json(query) = body?;
    Ok(Json(state.store.query(&query)?))
}

pub async fn export(State(state): State<Arc<AppState>>) -> Json<TaxonomySnapshot> {
    Json(state.store.snapshot())
}

/// Fallback for unknown routes, in the same error shape as other failures
pub async fn not_found() -> ApiError {
    ApiError::Request {
        status: StatusCode::NOT_FOUND,
        message: "no such endpoint".to_string(),
    }
}
