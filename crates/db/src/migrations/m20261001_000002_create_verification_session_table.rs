//! Create verification session table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VerificationSession::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VerificationSession::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VerificationSession::Email)
                            .string_len(320)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationSession::CodeHash)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationSession::Purpose)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationSession::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(VerificationSession::Verified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(VerificationSession::TokenHash).string_len(64))
                    .col(ColumnDef::new(VerificationSession::VerifiedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(VerificationSession::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(VerificationSession::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique: token_hash (redemption lookup; NULLs allowed)
        manager
            .create_index(
                Index::create()
                    .name("idx_verification_session_token_hash")
                    .table(VerificationSession::Table)
                    .col(VerificationSession::TokenHash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: expires_at (for sweeping)
        manager
            .create_index(
                Index::create()
                    .name("idx_verification_session_expires_at")
                    .table(VerificationSession::Table)
                    .col(VerificationSession::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VerificationSession::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum VerificationSession {
    Table,
    Id,
    Email,
    CodeHash,
    Purpose,
    AttemptCount,
    Verified,
    TokenHash,
    VerifiedAt,
    CreatedAt,
    ExpiresAt,
}
