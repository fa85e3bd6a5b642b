//! Storage row shapes shared by every driver.

pub mod outbox;
pub mod product;

pub use outbox::OutboxRow;
pub use product::{DiscountColumns, ProductPatch, ProductRow, ProductView};
