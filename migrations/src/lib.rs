pub use sea_orm_migration::prelude::*;

mod m20260105_000001_create_master_data_tables;
mod m20260105_000002_create_stock_levels_table;
mod m20260105_000003_create_stock_movements_table;
mod m20260105_000004_create_stock_reservations_table;
mod m20260105_000005_create_inventory_tables;
mod m20260105_000006_create_stock_transfer_tables;
mod m20260105_000007_create_inventory_cycles_table;
mod m20260105_000008_create_reference_sequences_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260105_000001_create_master_data_tables::Migration),
            Box::new(m20260105_000002_create_stock_levels_table::Migration),
            Box::new(m20260105_000003_create_stock_movements_table::Migration),
            Box::new(m20260105_000004_create_stock_reservations_table::Migration),
            Box::new(m20260105_000005_create_inventory_tables::Migration),
            Box::new(m20260105_000006_create_stock_transfer_tables::Migration),
            Box::new(m20260105_000007_create_inventory_cycles_table::Migration),
            Box::new(m20260105_000008_create_reference_sequences_table::Migration),
        ]
    }
}
