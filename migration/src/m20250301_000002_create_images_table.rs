use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Images::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Images::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Images::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(Images::Name).string().not_null())
                    .col(ColumnDef::new(Images::Path).string().not_null())
                    .col(ColumnDef::new(Images::EncodedPayload).text().not_null())
                    .col(ColumnDef::new(Images::Width).integer().not_null().default(0))
                    .col(ColumnDef::new(Images::Height).integer().not_null().default(0))
                    .col(ColumnDef::new(Images::Status).string().not_null())
                    .col(ColumnDef::new(Images::Annotations).json().not_null())
                    .col(ColumnDef::new(Images::Meta).json())
                    .col(ColumnDef::new(Images::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Images::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_images_project_id")
                            .from(Images::Table, Images::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The upload upsert targets this index with ON CONFLICT.
        manager
            .create_index(
                Index::create()
                    .name("idx_images_project_id_name")
                    .table(Images::Table)
                    .col(Images::ProjectId)
                    .col(Images::Name)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Images::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Images {
    Table,
    Id,
    ProjectId,
    Name,
    Path,
    EncodedPayload,
    Width,
    Height,
    Status,
    Annotations,
    Meta,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
}
