use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    http::StatusCode,
    response::Json,
};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::project::Entity as Project;
use crate::error::AppError;
use crate::models::{Annotation, Meta};
use crate::routes::parse_project_id;
use crate::services::uploads::{UploadBatchResponse, UploadedFile};
use crate::state::AppState;

/// Multipart layout accepted by `POST /images/upload` (documentation only).
#[allow(dead_code)]
#[derive(utoipa::ToSchema)]
pub struct UploadImagesForm {
    project_id: String,
    #[schema(format = Binary)]
    images: Vec<String>,
    /// JSON array of annotations applied to every uploaded file.
    annotations: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct SaveGroundTruthRequest {
    /// Must match the name the file was uploaded under.
    pub filename: String,
    pub project_id: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub meta: Meta,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SaveGroundTruthResponse {
    pub message: String,
    pub filename: String,
    pub path: String,
}

/// Raw fields collected from the multipart stream, before validation.
#[derive(Debug, Default)]
struct UploadForm {
    project_id: Option<String>,
    annotations: Option<String>,
    files: Vec<UploadedFile>,
}

/// A batch that passed validation and may fan out.
#[derive(Debug)]
struct UploadBatch {
    project_id: Uuid,
    files: Vec<UploadedFile>,
    annotations: Vec<Annotation>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let invalid_form = |_| AppError::BadRequest("Invalid form".to_string());
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("project_id") => form.project_id = Some(field.text().await.map_err(invalid_form)?),
            Some("annotations") => form.annotations = Some(field.text().await.map_err(invalid_form)?),
            Some("images") => {
                let file_name = field.file_name().unwrap_or("unknown").to_string();
                let data = field.bytes().await.map_err(invalid_form)?;
                form.files.push(UploadedFile { file_name, data });
            }
            _ => {}
        }
    }

    Ok(form)
}

fn validate_upload(form: UploadForm) -> Result<UploadBatch, AppError> {
    let raw_project_id = form
        .project_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing project_id".to_string()))?;
    let project_id = parse_project_id(&raw_project_id)?;

    if form.files.is_empty() {
        return Err(AppError::BadRequest("No files uploaded".to_string()));
    }

    let annotations = match form.annotations.as_deref().map(str::trim) {
        None | Some("") => Vec::new(),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|_| AppError::BadRequest("Invalid annotations JSON".to_string()))?,
    };

    Ok(UploadBatch {
        project_id,
        files: form.files,
        annotations,
    })
}

#[utoipa::path(
    post,
    path = "/images/upload",
    tag = "Images",
    request_body(content = UploadImagesForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Every file processed; failed files carry empty annotations", body = UploadBatchResponse),
        (status = 400, description = "Missing or invalid project_id, form, files or annotations"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn upload_images(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadBatchResponse>, AppError> {
    let multipart = multipart.map_err(|_| AppError::BadRequest("Invalid form".to_string()))?;
    let batch = validate_upload(read_upload_form(multipart).await?)?;

    Project::find_by_id(batch.project_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    tracing::info!(
        project_id = %batch.project_id,
        files = batch.files.len(),
        annotations = batch.annotations.len(),
        "upload batch received"
    );

    let response = state
        .upload_coordinator()
        .upload_batch(batch.project_id, batch.files, batch.annotations, state.response_meta())
        .await;

    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/images/save-groundtruth",
    tag = "Images",
    request_body = SaveGroundTruthRequest,
    responses(
        (status = 200, description = "Image finalized", body = SaveGroundTruthResponse),
        (status = 400, description = "Invalid request body or project_id"),
        (status = 404, description = "Image not found"),
        (status = 500, description = "Storage or persistence failure")
    )
)]
pub async fn save_groundtruth(
    State(state): State<AppState>,
    payload: Result<Json<SaveGroundTruthRequest>, JsonRejection>,
) -> Result<Json<SaveGroundTruthResponse>, AppError> {
    let Json(req) = payload
        .map_err(|e| AppError::detailed(StatusCode::BAD_REQUEST, "Invalid request", e.body_text()))?;

    let project_id = parse_project_id(&req.project_id)?;
    if req.filename.trim().is_empty() {
        return Err(AppError::BadRequest("Missing filename".to_string()));
    }

    let record = state
        .ground_truth()
        .finalize(project_id, &req.filename, req.annotations, req.meta)
        .await?;

    Ok(Json(SaveGroundTruthResponse {
        message: "Ground truth saved successfully".to_string(),
        filename: req.filename,
        path: record.path,
    }))
}
