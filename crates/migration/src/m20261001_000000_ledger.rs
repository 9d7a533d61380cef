//! Ledger schema.
//!
//! - `origins`: accounts owned by a user, with their running total in cents
//! - `transactions`: money movements, optionally attributed to an origin
//!
//! `transactions.origin_id` carries no foreign key: an origin can be deleted
//! while transactions still reference it.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Origins {
    Table,
    Id,
    UserId,
    Name,
    TotalMinor,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    UserId,
    OriginId,
    AmountMinor,
    Direction,
    Subject,
    Counterparty,
    Description,
    CreatedLabel,
    CreatedAt,
    UpdatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Origins::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Origins::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Origins::UserId).string().not_null())
                    .col(ColumnDef::new(Origins::Name).string().not_null())
                    .col(
                        ColumnDef::new(Origins::TotalMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Origins::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Origins::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-origins-user_id-name-unique")
                    .table(Origins::Table)
                    .col(Origins::UserId)
                    .col(Origins::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::UserId).string().not_null())
                    .col(ColumnDef::new(Transactions::OriginId).string())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Direction).string().not_null())
                    .col(ColumnDef::new(Transactions::Subject).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::Counterparty)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::Description)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreatedLabel)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-user_id-created_at")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-user_id-subject")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::Subject)
                    .col(Transactions::Counterparty)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-origin_id")
                    .table(Transactions::Table)
                    .col(Transactions::OriginId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Origins::Table).to_owned())
            .await?;
        Ok(())
    }
}
