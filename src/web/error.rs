use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::core::error::TaxonomyError;

/// Error body returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
}

/// Errors surfaced by the HTTP layer
#[derive(Debug)]
pub enum ApiError {
    /// A store operation failed
    Taxonomy(TaxonomyError),

    /// The request could not be decoded into the handler's arguments
    Request { status: StatusCode, message: String },
}

impl ApiError {
    /// HTTP status for the error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Taxonomy(error) => status_for(error),
            Self::Request { status, .. } => *status,
        }
    }
}

/// Map a store error onto an HTTP status
#[must_use]
pub fn status_for(error: &TaxonomyError) -> StatusCode {
    match error {
        TaxonomyError::NotFound(_) => StatusCode::NOT_FOUND,
        TaxonomyError::DuplicateName { .. }
        | TaxonomyError::CycleDetected { .. }
        | TaxonomyError::HasChildren { .. } => StatusCode::CONFLICT,
        TaxonomyError::InvalidRank(_)
        | TaxonomyError::RankOrderViolation { .. }
        | TaxonomyError::MissingParent(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TaxonomyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
    }
}

impl From<TaxonomyError> for ApiError {
    fn from(error: TaxonomyError) -> Self {
        Self::Taxonomy(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Request {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Request {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Request {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Taxonomy(error) => ErrorResponse {
                error_type: error.kind().to_string(),
                error: error.to_string(),
            },
            Self::Request { message, .. } => {
                tracing::debug!(%status, %message, "Rejected malformed request");
                ErrorResponse {
                    error: message,
                    error_type: "invalid_request".to_string(),
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TaxonId;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (TaxonomyError::NotFound("taxon 4".into()), StatusCode::NOT_FOUND),
            (
                TaxonomyError::DuplicateName {
                    name: "canis".into(),
                    existing: TaxonId(2),
                },
                StatusCode::CONFLICT,
            ),
            (
                TaxonomyError::CycleDetected {
                    id: TaxonId(1),
                    new_parent: TaxonId(2),
                },
                StatusCode::CONFLICT,
            ),
            (
                TaxonomyError::HasChildren {
                    id: TaxonId(1),
                    count: 3,
                },
                StatusCode::CONFLICT,
            ),
            (TaxonomyError::InvalidRank("tribe".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (
                TaxonomyError::RankOrderViolation {
                    parent_rank: "genus".into(),
                    child_rank: "family".into(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (TaxonomyError::MissingParent("taxon 9".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (TaxonomyError::InvalidInput("blank".into()), StatusCode::BAD_REQUEST),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::from(error.clone()).status(), status, "{error}");
        }
    }
}
