//! Domain events and their durable outbox form.

pub mod event;
pub mod outbox;

pub use event::Event;
pub use outbox::{OutboxEvent, OutboxStatus, UnknownOutboxStatus};
