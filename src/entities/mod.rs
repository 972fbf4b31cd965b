// Master data (read-mostly; cost/replenishment fields on product are owned
// by the valuation and replenishment services)
pub mod lot;
pub mod product;
pub mod product_category;
pub mod stock_location;
pub mod warehouse;

// Stock ledger
pub mod stock_level;
pub mod stock_movement;
pub mod stock_reservation;

// Workflows
pub mod inventory;
pub mod inventory_cycle;
pub mod inventory_line;
pub mod stock_transfer;
pub mod stock_transfer_line;

// Infrastructure
pub mod reference_sequence;
