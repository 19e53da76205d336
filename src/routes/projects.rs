use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, QueryOrder, QuerySelect, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::project::{self, Entity as Project};
use crate::error::AppError;
use crate::pagination::Pagination;
use crate::routes::{parse_project_id, MessageResponse};
use crate::services::images::ImageRecord;
use crate::state::AppState;

const PROJECT_STATUSES: [&str; 3] = ["active", "archived", "deleted"];

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateProjectRequest {
    name: String,
    description: Option<String>,
    lang: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateProjectRequest {
    name: Option<String>,
    description: Option<String>,
    /// One of `active`, `archived`, `deleted`.
    status: Option<String>,
    lang: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProjectResponse {
    #[schema(value_type = String)]
    id: Uuid,
    name: String,
    description: Option<String>,
    status: String,
    lang: String,
    ts: i64,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
}

impl From<project::Model> for ProjectResponse {
    fn from(project: project::Model) -> Self {
        ProjectResponse {
            id: project.id,
            name: project.name,
            description: project.description,
            status: project.status,
            lang: project.lang,
            ts: project.ts,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProjectEnvelope {
    project: ProjectResponse,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProjectList {
    projects: Vec<ProjectResponse>,
}

async fn find_project(state: &AppState, raw_id: &str) -> Result<project::Model, AppError> {
    let project_id = parse_project_id(raw_id)?;
    Project::find_by_id(project_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
}

#[utoipa::path(
    post,
    path = "/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created successfully", body = ProjectEnvelope),
        (status = 400, description = "Missing name"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Projects"
)]
pub async fn create_project(
    State(state): State<AppState>,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectEnvelope>), AppError> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Project name is required".to_string()));
    }

    let now = chrono::Utc::now();
    let project = project::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(payload.description),
        status: Set("active".to_string()),
        lang: Set(payload.lang.unwrap_or_default()),
        ts: Set(now.timestamp()),
        created_at: Set(now.naive_utc()),
        updated_at: Set(now.naive_utc()),
    };

    let created = project.insert(&state.db).await?;
    tracing::info!(project_id = %created.id, name = %created.name, "project created");

    Ok((
        StatusCode::CREATED,
        Json(ProjectEnvelope {
            project: created.into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/projects",
    params(Pagination),
    responses(
        (status = 200, description = "Projects, newest first", body = ProjectList),
        (status = 500, description = "Internal server error")
    ),
    tag = "Projects"
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ProjectList>, AppError> {
    let projects = Project::find()
        .order_by_desc(project::Column::CreatedAt)
        .limit(pagination.limit())
        .offset(pagination.offset())
        .all(&state.db)
        .await?;

    Ok(Json(ProjectList {
        projects: projects.into_iter().map(ProjectResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    params(("id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project details", body = ProjectEnvelope),
        (status = 400, description = "Invalid project_id"),
        (status = 404, description = "Project not found")
    ),
    tag = "Projects"
)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProjectEnvelope>, AppError> {
    let project = find_project(&state, &id).await?;
    Ok(Json(ProjectEnvelope {
        project: project.into(),
    }))
}

#[utoipa::path(
    put,
    path = "/projects/{id}",
    params(("id" = String, Path, description = "Project ID")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Project updated successfully", body = MessageResponse),
        (status = 400, description = "Invalid project_id or status"),
        (status = 404, description = "Project not found")
    ),
    tag = "Projects"
)]
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let project = find_project(&state, &id).await?;

    if let Some(status) = payload.status.as_deref() {
        if !PROJECT_STATUSES.contains(&status) {
            return Err(AppError::BadRequest(format!("Invalid status: {}", status)));
        }
    }

    let mut active_project = project.into_active_model();
    if let Some(name) = payload.name {
        active_project.name = Set(name);
    }
    if let Some(description) = payload.description {
        active_project.description = Set(Some(description));
    }
    if let Some(status) = payload.status {
        active_project.status = Set(status);
    }
    if let Some(lang) = payload.lang {
        active_project.lang = Set(lang);
    }
    active_project.updated_at = Set(chrono::Utc::now().naive_utc());
    active_project.update(&state.db).await?;

    Ok(Json(MessageResponse::new("Project updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}",
    params(("id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project and its image records deleted", body = MessageResponse),
        (status = 400, description = "Invalid project_id"),
        (status = 404, description = "Project not found")
    ),
    tag = "Projects"
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let project = find_project(&state, &id).await?;

    // Image rows go with the project via the foreign key; stored artifacts stay.
    Project::delete_by_id(project.id).exec(&state.db).await?;
    tracing::info!(project_id = %project.id, "project deleted");

    Ok(Json(MessageResponse::new("Project deleted successfully")))
}

#[utoipa::path(
    get,
    path = "/projects/{id}/images",
    params(("id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Image records of the project", body = [ImageRecord]),
        (status = 400, description = "Invalid project_id"),
        (status = 404, description = "Project not found")
    ),
    tag = "Projects"
)]
pub async fn get_project_images(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ImageRecord>>, AppError> {
    let project = find_project(&state, &id).await?;
    let project_id = project.id;

    // Opening a project counts as activity on it.
    let mut active_project = project.into_active_model();
    active_project.updated_at = Set(chrono::Utc::now().naive_utc());
    active_project.update(&state.db).await?;

    let images = state.images.list_by_project(project_id).await?;
    Ok(Json(images))
}
