use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::orchestration::WorkflowError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<crate::domain::IdParseError> for AppError {
    fn from(err: crate::domain::IdParseError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        AppError::Validation(err.body_text())
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        use crate::engine::ScheduleError;
        use crate::orchestration::CatalogError;

        let msg = err.to_string();
        match err {
            WorkflowError::Validation(_) => AppError::Validation(msg),
            WorkflowError::NotFound(_) => AppError::NotFound(msg),
            WorkflowError::Conflict(_) | WorkflowError::Consent(_) => AppError::Conflict(msg),
            WorkflowError::Forbidden(_) => AppError::Forbidden(msg),
            WorkflowError::Catalog(CatalogError::NotFound { .. }) => AppError::NotFound(msg),
            WorkflowError::Catalog(CatalogError::OutOfBounds(_)) => AppError::Validation(msg),
            WorkflowError::Sponsor(e) => {
                if e.has_capacity_issue() {
                    AppError::Conflict(msg)
                } else if e.has_unknown_sponsor() {
                    AppError::NotFound(msg)
                } else {
                    AppError::Validation(msg)
                }
            }
            WorkflowError::Schedule(ScheduleError::InvalidLoanInput(_)) => AppError::Validation(msg),
            WorkflowError::Schedule(ScheduleError::Overflow)
            | WorkflowError::Storage(_)
            | WorkflowError::Db(_) => AppError::Internal(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConsentError, UserId};
    use crate::orchestration::{SponsorError, SponsorIssue};

    fn status_of(err: WorkflowError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_workflow_errors_map_to_status() {
        assert_eq!(status_of(WorkflowError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(WorkflowError::Consent(ConsentError::Settled)), StatusCode::CONFLICT);
        assert_eq!(status_of(WorkflowError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(WorkflowError::Catalog(crate::orchestration::CatalogError::NotFound {
                kind: "loan type",
                name: "x".into(),
            })),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_sponsor_errors_prefer_capacity_conflict() {
        let err = SponsorError::Ineligible {
            issues: vec![
                (UserId::new("a"), SponsorIssue::Unknown),
                (UserId::new("b"), SponsorIssue::AtCapacity { live: 2, limit: 2 }),
            ],
        };
        assert_eq!(status_of(err.into()), StatusCode::CONFLICT);

        let err = SponsorError::Ineligible {
            issues: vec![(UserId::new("a"), SponsorIssue::NotEligible)],
        };
        assert_eq!(status_of(err.into()), StatusCode::BAD_REQUEST);
    }
}
