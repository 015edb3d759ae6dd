//! Create complaint, status log, attachment and sequence tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Complaint::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Complaint::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Complaint::ComplaintNumber)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Complaint::ComplaintType)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Complaint::Description).text().not_null())
                    .col(ColumnDef::new(Complaint::Priority).string_len(16).not_null())
                    .col(ColumnDef::new(Complaint::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Complaint::Ward).string_len(64).not_null())
                    .col(ColumnDef::new(Complaint::Area).string_len(256))
                    .col(ColumnDef::new(Complaint::Address).text())
                    .col(ColumnDef::new(Complaint::Latitude).double())
                    .col(ColumnDef::new(Complaint::Longitude).double())
                    .col(ColumnDef::new(Complaint::ContactName).string_len(256))
                    .col(
                        ColumnDef::new(Complaint::ContactEmail)
                            .string_len(320)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Complaint::ContactPhone).string_len(32))
                    .col(ColumnDef::new(Complaint::SubmittedById).string_len(32))
                    .col(ColumnDef::new(Complaint::AssignedToId).string_len(32))
                    .col(ColumnDef::new(Complaint::AssignedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Complaint::SlaDeadline)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Complaint::ResolvedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Complaint::ClosedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Complaint::FeedbackRating).integer())
                    .col(ColumnDef::new(Complaint::FeedbackComment).text())
                    .col(ColumnDef::new(Complaint::FeedbackAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Complaint::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Complaint::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Complaint::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_submitted_by")
                            .from(Complaint::Table, Complaint::SubmittedById)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_assigned_to")
                            .from(Complaint::Table, Complaint::AssignedToId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique: complaint_number
        manager
            .create_index(
                Index::create()
                    .name("idx_complaint_number")
                    .table(Complaint::Table)
                    .col(Complaint::ComplaintNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: (ward, status) for ward officer listings
        manager
            .create_index(
                Index::create()
                    .name("idx_complaint_ward_status")
                    .table(Complaint::Table)
                    .col(Complaint::Ward)
                    .col(Complaint::Status)
                    .to_owned(),
            )
            .await?;

        // Index: submitted_by_id
        manager
            .create_index(
                Index::create()
                    .name("idx_complaint_submitted_by_id")
                    .table(Complaint::Table)
                    .col(Complaint::SubmittedById)
                    .to_owned(),
            )
            .await?;

        // Index: assigned_to_id
        manager
            .create_index(
                Index::create()
                    .name("idx_complaint_assigned_to_id")
                    .table(Complaint::Table)
                    .col(Complaint::AssignedToId)
                    .to_owned(),
            )
            .await?;

        // Index: contact_email (guest promotion and tracking)
        manager
            .create_index(
                Index::create()
                    .name("idx_complaint_contact_email")
                    .table(Complaint::Table)
                    .col(Complaint::ContactEmail)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ComplaintStatusLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ComplaintStatusLog::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ComplaintStatusLog::ComplaintId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ComplaintStatusLog::Sequence)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ComplaintStatusLog::EntryType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ComplaintStatusLog::ActorId).string_len(32))
                    .col(ColumnDef::new(ComplaintStatusLog::FromStatus).string_len(16))
                    .col(
                        ColumnDef::new(ComplaintStatusLog::ToStatus)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ComplaintStatusLog::Comment).text())
                    .col(
                        ColumnDef::new(ComplaintStatusLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_status_log_complaint")
                            .from(ComplaintStatusLog::Table, ComplaintStatusLog::ComplaintId)
                            .to(Complaint::Table, Complaint::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_status_log_actor")
                            .from(ComplaintStatusLog::Table, ComplaintStatusLog::ActorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique: (complaint_id, sequence) keeps the log totally ordered
        manager
            .create_index(
                Index::create()
                    .name("idx_complaint_status_log_sequence")
                    .table(ComplaintStatusLog::Table)
                    .col(ComplaintStatusLog::ComplaintId)
                    .col(ComplaintStatusLog::Sequence)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ComplaintAttachment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ComplaintAttachment::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ComplaintAttachment::ComplaintId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ComplaintAttachment::FileName)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ComplaintAttachment::Url).text().not_null())
                    .col(ColumnDef::new(ComplaintAttachment::ContentType).string_len(128))
                    .col(
                        ColumnDef::new(ComplaintAttachment::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_attachment_complaint")
                            .from(ComplaintAttachment::Table, ComplaintAttachment::ComplaintId)
                            .to(Complaint::Table, Complaint::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_complaint_attachment_complaint_id")
                    .table(ComplaintAttachment::Table)
                    .col(ComplaintAttachment::ComplaintId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ComplaintSequence::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ComplaintSequence::Year)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ComplaintSequence::LastValue)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ComplaintSequence::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ComplaintAttachment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ComplaintStatusLog::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Complaint::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Complaint {
    Table,
    Id,
    ComplaintNumber,
    ComplaintType,
    Description,
    Priority,
    Status,
    Ward,
    Area,
    Address,
    Latitude,
    Longitude,
    ContactName,
    ContactEmail,
    ContactPhone,
    SubmittedById,
    AssignedToId,
    AssignedAt,
    SlaDeadline,
    ResolvedAt,
    ClosedAt,
    FeedbackRating,
    FeedbackComment,
    FeedbackAt,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ComplaintStatusLog {
    Table,
    Id,
    ComplaintId,
    Sequence,
    EntryType,
    ActorId,
    FromStatus,
    ToStatus,
    Comment,
    CreatedAt,
}

#[derive(Iden)]
enum ComplaintAttachment {
    Table,
    Id,
    ComplaintId,
    FileName,
    Url,
    ContentType,
    CreatedAt,
}

#[derive(Iden)]
enum ComplaintSequence {
    Table,
    Year,
    LastValue,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
