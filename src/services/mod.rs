pub mod catalog;
pub mod cores;
pub mod inventory;
pub mod kits;
pub mod order_status;
pub mod orders;
pub mod replenishment;
pub mod totals;
