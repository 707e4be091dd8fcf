use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::db::{DbError, Envelope};

/// SQLSTATE for a UNIQUE constraint violation
const UNIQUE_VIOLATION: &str = "23505";

/// Application-wide error type
#[derive(Debug)]
pub enum AppError {
    // Storage errors
    Database(DbError),

    // Authentication errors
    InvalidCredentials,
    InvalidToken,
    TokenExpired,
    Unauthorized,

    // Request errors
    ValidationError(String),
    NotFound(String),
    Conflict(String),

    // Internal errors
    InternalError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(err) => match err {
                DbError::NotFound(_) => StatusCode::NOT_FOUND,
                DbError::Validation(_) => StatusCode::BAD_REQUEST,
                DbError::Conflict(_) => StatusCode::CONFLICT,
                DbError::Query { code, .. } if code.as_deref() == Some(UNIQUE_VIOLATION) => {
                    StatusCode::CONFLICT
                }
                DbError::Query { .. } | DbError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::InvalidCredentials
            | AppError::InvalidToken
            | AppError::TokenExpired
            | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Database(err) => {
                if status.is_server_error() {
                    tracing::error!(code = ?err.code(), "Database error: {}", err);
                }
                Envelope::<()>::from_error(&err)
            }
            AppError::InvalidCredentials => Envelope::failure("Invalid email or password", None),
            AppError::InvalidToken => Envelope::failure("Invalid token", None),
            AppError::TokenExpired => Envelope::failure("Token expired", None),
            AppError::Unauthorized => Envelope::failure("Unauthorized", None),
            AppError::ValidationError(msg) | AppError::NotFound(msg) | AppError::Conflict(msg) => {
                Envelope::failure(msg, None)
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                Envelope::failure("Internal server error", None)
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        AppError::Database(e)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::ValidationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn storage_errors_map_to_http_statuses() {
        let cases = [
            (DbError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (DbError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (DbError::Conflict("x".into()), StatusCode::CONFLICT),
            (DbError::Decode("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                DbError::Query {
                    message: "x".into(),
                    code: None,
                    attempts: 3,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn query_failure_body_carries_the_code() {
        let (status, body) = body_json(AppError::Database(DbError::Query {
            message: "permission denied for table usuarios".into(),
            code: Some("42501".into()),
            attempts: 1,
        }))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "42501");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn unique_violation_is_a_conflict() {
        let (status, body) = body_json(AppError::Database(DbError::Query {
            message: "duplicate key value violates unique constraint \"usuarios_email_key\"".into(),
            code: Some("23505".into()),
            attempts: 1,
        }))
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "23505");
    }

    #[tokio::test]
    async fn internal_details_are_not_leaked() {
        let (status, body) = body_json(AppError::InternalError("argon2 exploded".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }
}
