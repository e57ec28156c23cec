pub mod customer;
pub mod inventory;
pub mod line;
pub mod order;
pub mod part;
pub mod purchase_order;
pub mod settings;

pub use customer::Customer;
pub use inventory::{InventoryMovement, MovementType};
pub use line::{ChargeLine, CoreStatus, LaborLine, LineKind, OrderLine};
pub use order::{Order, OrderStatus, OrderType};
pub use part::{KitComponent, Part};
pub use purchase_order::{PurchaseOrder, PurchaseOrderLine, PurchaseOrderStatus};
pub use settings::{NegativeInventoryPolicy, ShopSettings};
