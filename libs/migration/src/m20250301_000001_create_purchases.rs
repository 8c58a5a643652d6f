use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250301_000000_create_catalog::Products;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create purchases table
        manager
            .create_table(
                Table::create()
                    .table(Purchases::Table)
                    .if_not_exists()
                    .col(big_pk_auto(Purchases::Id))
                    .col(decimal_len(Purchases::TotalPrice, 12, 2).default("0.00"))
                    .col(
                        timestamp_with_time_zone(Purchases::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Purchases::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Create purchase_items table. Product rows must not disappear
        // under recorded purchases, hence Restrict.
        manager
            .create_table(
                Table::create()
                    .table(PurchaseItems::Table)
                    .if_not_exists()
                    .col(big_pk_auto(PurchaseItems::Id))
                    .col(big_integer(PurchaseItems::PurchaseId))
                    .col(big_integer(PurchaseItems::ProductId))
                    .col(integer(PurchaseItems::Quantity))
                    .col(decimal_len(PurchaseItems::UnitPrice, 10, 2))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchase_items_purchase_id")
                            .from(PurchaseItems::Table, PurchaseItems::PurchaseId)
                            .to(Purchases::Table, Purchases::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchase_items_product_id")
                            .from(PurchaseItems::Table, PurchaseItems::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Create indexes
        manager
            .create_index(
                Index::create()
                    .name("idx_purchases_created_at")
                    .table(Purchases::Table)
                    .col(Purchases::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_purchase_items_purchase_id")
                    .table(PurchaseItems::Table)
                    .col(PurchaseItems::PurchaseId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_purchase_items_product_id")
                    .table(PurchaseItems::Table)
                    .col(PurchaseItems::ProductId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PurchaseItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Purchases::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Purchases {
    Table,
    Id,
    TotalPrice,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PurchaseItems {
    Table,
    Id,
    PurchaseId,
    ProductId,
    Quantity,
    UnitPrice,
}
