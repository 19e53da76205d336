use axum::{
    http::StatusCode,
    response::{IntoResponse, Response, Json},
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    /// Surfaces the underlying cause to the client next to the summary.
    #[error("{error}: {details}")]
    Detailed {
        status: StatusCode,
        error: String,
        details: String,
    },
}

impl AppError {
    pub fn detailed(status: StatusCode, error: impl Into<String>, details: impl ToString) -> Self {
        AppError::Detailed {
            status,
            error: error.into(),
            details: details.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::DatabaseError(e) => {
                tracing::error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Detailed { status, error, details } => {
                if status.is_server_error() {
                    tracing::error!(%error, %details, "request failed");
                }
                (status, json!({ "error": error, "details": details }))
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn detailed_errors_carry_details() {
        let (status, body) = body_json(AppError::detailed(
            StatusCode::NOT_FOUND,
            "Image not found",
            "no record for cat.jpg",
        ))
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Image not found");
        assert_eq!(body["details"], "no record for cat.jpg");
    }

    #[tokio::test]
    async fn database_errors_are_masked() {
        let (status, body) =
            body_json(sea_orm::DbErr::Custom("relation images missing".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("details").is_none());
    }
}
