use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240210_000001_create_stock_lots_table::Migration),
            Box::new(m20240210_000002_create_stock_levels_table::Migration),
            Box::new(m20240210_000003_create_stock_transfers_tables::Migration),
            Box::new(m20240210_000004_create_stock_reservations_table::Migration),
            Box::new(m20240210_000005_create_pending_stock_transfers_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240210_000001_create_stock_lots_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240210_000001_create_stock_lots_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockLots::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockLots::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(StockLots::VaccineId).big_integer().not_null())
                        .col(ColumnDef::new(StockLots::OwnerType).string().not_null())
                        .col(ColumnDef::new(StockLots::OwnerId).big_integer().null())
                        .col(ColumnDef::new(StockLots::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(StockLots::RemainingQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockLots::Expiration).date().not_null())
                        .col(ColumnDef::new(StockLots::Status).string().not_null())
                        .col(ColumnDef::new(StockLots::SourceLotId).big_integer().null())
                        .col(
                            ColumnDef::new(StockLots::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLots::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Allocation reads lots per owner/vaccine ordered by expiration
            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_lots_owner_vaccine_expiration")
                        .table(StockLots::Table)
                        .col(StockLots::VaccineId)
                        .col(StockLots::OwnerType)
                        .col(StockLots::OwnerId)
                        .col(StockLots::Expiration)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_lots_source_lot")
                        .table(StockLots::Table)
                        .col(StockLots::SourceLotId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockLots::Table).to_owned())
                .await
        }
    }

    /// Stock lot schema identifiers
    #[derive(Iden)]
    enum StockLots {
        Table,
        Id,
        VaccineId,
        OwnerType,
        OwnerId,
        Quantity,
        RemainingQuantity,
        Expiration,
        Status,
        SourceLotId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240210_000002_create_stock_levels_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240210_000002_create_stock_levels_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockLevels::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockLevels::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockLevels::VaccineId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockLevels::OwnerType).string().not_null())
                        .col(ColumnDef::new(StockLevels::OwnerId).big_integer().null())
                        .col(ColumnDef::new(StockLevels::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(StockLevels::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLevels::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_levels_owner_vaccine")
                        .table(StockLevels::Table)
                        .col(StockLevels::VaccineId)
                        .col(StockLevels::OwnerType)
                        .col(StockLevels::OwnerId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockLevels::Table).to_owned())
                .await
        }
    }

    /// Stock level schema identifiers
    #[derive(Iden)]
    enum StockLevels {
        Table,
        Id,
        VaccineId,
        OwnerType,
        OwnerId,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240210_000003_create_stock_transfers_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240210_000003_create_stock_transfers_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockTransfers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTransfers::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockTransfers::VaccineId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockTransfers::FromType).string().not_null())
                        .col(ColumnDef::new(StockTransfers::FromId).big_integer().null())
                        .col(ColumnDef::new(StockTransfers::ToType).string().not_null())
                        .col(ColumnDef::new(StockTransfers::ToId).big_integer().null())
                        .col(
                            ColumnDef::new(StockTransfers::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransfers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockTransferLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTransferLines::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockTransferLines::TransferId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransferLines::LotId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransferLines::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransferLines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_transfer_lines_transfer_id")
                                .from(StockTransferLines::Table, StockTransferLines::TransferId)
                                .to(StockTransfers::Table, StockTransfers::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_transfer_lines_lot")
                        .table(StockTransferLines::Table)
                        .col(StockTransferLines::LotId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockTransferLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockTransfers::Table).to_owned())
                .await
        }
    }

    /// Stock transfer schema identifiers
    #[derive(Iden)]
    enum StockTransfers {
        Table,
        Id,
        VaccineId,
        FromType,
        FromId,
        ToType,
        ToId,
        Quantity,
        CreatedAt,
    }

    /// Stock transfer line schema identifiers
    #[derive(Iden)]
    enum StockTransferLines {
        Table,
        Id,
        TransferId,
        LotId,
        Quantity,
        CreatedAt,
    }
}

mod m20240210_000004_create_stock_reservations_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240210_000004_create_stock_reservations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockReservations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockReservations::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockReservations::VaccineId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockReservations::HealthCenterId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockReservations::LotId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockReservations::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockReservations::ScheduleId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockReservations::AppointmentDate)
                                .date()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockReservations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockReservations::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_reservations_lot")
                        .table(StockReservations::Table)
                        .col(StockReservations::LotId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockReservations::Table).to_owned())
                .await
        }
    }

    /// Stock reservation schema identifiers
    #[derive(Iden)]
    enum StockReservations {
        Table,
        Id,
        VaccineId,
        HealthCenterId,
        LotId,
        Quantity,
        ScheduleId,
        AppointmentDate,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240210_000005_create_pending_stock_transfers_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240210_000005_create_pending_stock_transfers_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PendingStockTransfers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PendingStockTransfers::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PendingStockTransfers::VaccineId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PendingStockTransfers::FromType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PendingStockTransfers::FromId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PendingStockTransfers::ToType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PendingStockTransfers::ToId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PendingStockTransfers::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PendingStockTransfers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PendingStockTransferLots::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PendingStockTransferLots::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PendingStockTransferLots::PendingTransferId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PendingStockTransferLots::LotId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PendingStockTransferLots::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PendingStockTransferLots::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_pending_stock_transfer_lots_pending_transfer_id")
                                .from(
                                    PendingStockTransferLots::Table,
                                    PendingStockTransferLots::PendingTransferId,
                                )
                                .to(PendingStockTransfers::Table, PendingStockTransfers::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_pending_stock_transfer_lots_lot")
                        .table(PendingStockTransferLots::Table)
                        .col(PendingStockTransferLots::LotId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(PendingStockTransferLots::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_table(Table::drop().table(PendingStockTransfers::Table).to_owned())
                .await
        }
    }

    /// Pending stock transfer schema identifiers
    #[derive(Iden)]
    enum PendingStockTransfers {
        Table,
        Id,
        VaccineId,
        FromType,
        FromId,
        ToType,
        ToId,
        Quantity,
        CreatedAt,
    }

    /// Pending stock transfer lot schema identifiers
    #[derive(Iden)]
    enum PendingStockTransferLots {
        Table,
        Id,
        PendingTransferId,
        LotId,
        Quantity,
        CreatedAt,
    }
}
