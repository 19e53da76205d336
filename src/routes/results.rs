use axum::{
    extract::{Query, State},
    response::Json,
};
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, QuerySelect, Set};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::entities::result::{self, Entity as ResultDocument};
use crate::error::AppError;
use crate::pagination::Pagination;
use crate::state::AppState;

#[derive(Serialize, utoipa::ToSchema)]
pub struct SaveResultResponse {
    status: String,
    #[schema(value_type = Object)]
    result: Value,
}

/// Stored document with its server-assigned `id` and `created_at` merged in.
fn with_identity(model: result::Model) -> Value {
    let mut document = model.document;
    if let Value::Object(map) = &mut document {
        map.insert("id".to_string(), Value::String(model.id.to_string()));
        map.insert(
            "created_at".to_string(),
            Value::String(model.created_at.and_utc().to_rfc3339()),
        );
    }
    document
}

#[utoipa::path(
    post,
    path = "/api/results",
    request_body(content = Object, description = "Any JSON object"),
    responses(
        (status = 200, description = "Document stored", body = SaveResultResponse),
        (status = 400, description = "Body is not a JSON object")
    ),
    tag = "Results"
)]
pub async fn save_result(
    State(state): State<AppState>,
    Json(document): Json<Value>,
) -> Result<Json<SaveResultResponse>, AppError> {
    if !document.is_object() {
        return Err(AppError::BadRequest("Result must be a JSON object".to_string()));
    }

    let stored = result::ActiveModel {
        id: Set(Uuid::new_v4()),
        document: Set(document),
        created_at: Set(chrono::Utc::now().naive_utc()),
    }
    .insert(&state.db)
    .await?;

    tracing::debug!(result_id = %stored.id, "result stored");
    Ok(Json(SaveResultResponse {
        status: "success".to_string(),
        result: with_identity(stored),
    }))
}

#[utoipa::path(
    get,
    path = "/api/results",
    params(Pagination),
    responses(
        (status = 200, description = "Stored documents, oldest first")
    ),
    tag = "Results"
)]
pub async fn list_results(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<Value>>, AppError> {
    let documents = ResultDocument::find()
        .order_by_asc(result::Column::CreatedAt)
        .limit(pagination.limit())
        .offset(pagination.offset())
        .all(&state.db)
        .await?;

    Ok(Json(documents.into_iter().map(with_identity).collect()))
}
