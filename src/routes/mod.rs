mod home;
mod images;
mod projects;
mod results;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        home::root,
        images::upload_images,
        images::save_groundtruth,
        projects::create_project,
        projects::list_projects,
        projects::get_project,
        projects::update_project,
        projects::delete_project,
        projects::get_project_images,
        results::save_result,
        results::list_results,
    ),
    components(
        schemas(
            MessageResponse,
            images::UploadImagesForm,
            images::SaveGroundTruthRequest,
            images::SaveGroundTruthResponse,
            crate::services::uploads::UploadBatchResponse,
            crate::services::uploads::UploadedImage,
            crate::services::images::ImageRecord,
            crate::entities::image::Status,
            crate::models::Annotation,
            crate::models::Rect,
            crate::models::Point,
            crate::models::Meta,
            projects::CreateProjectRequest,
            projects::UpdateProjectRequest,
            projects::ProjectResponse,
            projects::ProjectEnvelope,
            projects::ProjectList,
            results::SaveResultResponse,
        )
    ),
    tags(
        (name = "General", description = "General API information"),
        (name = "Images", description = "Batch upload and ground truth finalization"),
        (name = "Projects", description = "Annotation project registry"),
        (name = "Results", description = "Free-form result documents")
    ),
    info(
        title = "Annotation Kit API",
        version = "0.1.0",
        description = "Image annotation backend: per-project batch uploads, annotation storage and ground truth finalization",
    )
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Project identifiers arrive as strings in forms, JSON bodies and paths.
pub(crate) fn parse_project_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::BadRequest("Invalid project_id".to_string()))
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origin = config
        .cors_origin
        .as_deref()
        .and_then(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unparsable CORS_ORIGIN");
                None
            }
        });

    match origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT])
            .allow_credentials(true)
            .max_age(Duration::from_secs(12 * 60 * 60)),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}

pub fn create_routes(state: AppState) -> Router {
    let swagger_router: Router = SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into();

    let mut app_routes = Router::new()
        .route("/", get(home::root))
        .route("/images/upload", post(images::upload_images))
        .route("/images/save-groundtruth", post(images::save_groundtruth))
        .route("/projects", get(projects::list_projects).post(projects::create_project))
        .route(
            "/projects/{id}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/projects/{id}/images", get(projects::get_project_images))
        .route("/api/results", get(results::list_results).post(results::save_result));

    if let Some(root) = state.config.local_upload_root() {
        app_routes = app_routes.nest_service("/uploads", ServeDir::new(root));
    }

    let body_limit = state.config.max_upload_bytes;
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(swagger_router)
        .merge(app_routes.with_state(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
