use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::image::{self, Status};
use crate::models::{Annotation, Meta};

/// Typed view of a row in `images`.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct ImageRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub path: String,
    #[serde(rename = "base64")]
    pub encoded_payload: String,
    pub width: u32,
    pub height: u32,
    pub status: Status,
    pub annotations: Vec<Annotation>,
    pub meta: Option<Meta>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<image::Model> for ImageRecord {
    type Error = DbErr;

    fn try_from(model: image::Model) -> Result<Self, Self::Error> {
        let annotations = serde_json::from_value(model.annotations)
            .map_err(|e| DbErr::Json(format!("image {} annotations: {}", model.id, e)))?;
        let meta = model
            .meta
            .filter(|m| !m.is_null())
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| DbErr::Json(format!("image {} meta: {}", model.id, e)))?;

        Ok(Self {
            id: model.id,
            project_id: model.project_id,
            name: model.name,
            path: model.path,
            encoded_payload: model.encoded_payload,
            width: u32::try_from(model.width).unwrap_or(0),
            height: u32::try_from(model.height).unwrap_or(0),
            status: model.status,
            annotations,
            meta,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Fields written by an upload for one file.
#[derive(Debug, Clone)]
pub struct PendingImage {
    pub project_id: Uuid,
    pub name: String,
    pub path: String,
    pub encoded_payload: String,
    pub width: u32,
    pub height: u32,
    pub annotations: Vec<Annotation>,
}

/// Fields written when an image becomes ground truth.
#[derive(Debug, Clone)]
pub struct FinalizedImage {
    pub path: String,
    pub encoded_payload: String,
    pub annotations: Vec<Annotation>,
    pub meta: Meta,
}

/// The narrow set of image collection operations the pipeline needs.
#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn find_by_key(&self, project_id: Uuid, name: &str) -> Result<Option<ImageRecord>, DbErr>;

    /// Insert `pending`, or overwrite the existing row for the same
    /// `(project_id, name)`. Atomic per key.
    async fn upsert_pending(&self, image: PendingImage) -> Result<(), DbErr>;

    async fn mark_final(&self, id: Uuid, image: FinalizedImage) -> Result<ImageRecord, DbErr>;

    async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<ImageRecord>, DbErr>;
}

#[derive(Clone)]
pub struct SeaOrmImageRepository {
    db: DatabaseConnection,
}

impl SeaOrmImageRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, DbErr> {
    serde_json::to_value(value).map_err(|e| DbErr::Json(e.to_string()))
}

fn to_column_int(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(0)
}

#[async_trait]
impl ImageRepository for SeaOrmImageRepository {
    async fn find_by_key(&self, project_id: Uuid, name: &str) -> Result<Option<ImageRecord>, DbErr> {
        image::Entity::find()
            .filter(image::Column::ProjectId.eq(project_id))
            .filter(image::Column::Name.eq(name))
            .one(&self.db)
            .await?
            .map(ImageRecord::try_from)
            .transpose()
    }

    async fn upsert_pending(&self, pending: PendingImage) -> Result<(), DbErr> {
        let now = chrono::Utc::now().naive_utc();
        let row = image::ActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(pending.project_id),
            name: Set(pending.name),
            path: Set(pending.path),
            encoded_payload: Set(pending.encoded_payload),
            width: Set(to_column_int(pending.width)),
            height: Set(to_column_int(pending.height)),
            status: Set(Status::Pending),
            annotations: Set(to_json(&pending.annotations)?),
            meta: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // id, created_at and meta survive a re-upload; everything the upload
        // computed is replaced and status drops back to pending.
        image::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([image::Column::ProjectId, image::Column::Name])
                    .update_columns([
                        image::Column::Path,
                        image::Column::EncodedPayload,
                        image::Column::Width,
                        image::Column::Height,
                        image::Column::Annotations,
                        image::Column::Status,
                        image::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }

    async fn mark_final(&self, id: Uuid, finalized: FinalizedImage) -> Result<ImageRecord, DbErr> {
        let update = image::ActiveModel {
            id: ActiveValue::Unchanged(id),
            path: Set(finalized.path),
            encoded_payload: Set(finalized.encoded_payload),
            status: Set(Status::Final),
            annotations: Set(to_json(&finalized.annotations)?),
            meta: Set(Some(to_json(&finalized.meta)?)),
            updated_at: Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        };

        ImageRecord::try_from(update.update(&self.db).await?)
    }

    async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<ImageRecord>, DbErr> {
        image::Entity::find()
            .filter(image::Column::ProjectId.eq(project_id))
            .order_by_asc(image::Column::CreatedAt)
            .order_by_asc(image::Column::Name)
            .all(&self.db)
            .await?
            .into_iter()
            .map(ImageRecord::try_from)
            .collect()
    }
}
