//! `catalog-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::AggregateRoot;
pub use clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use error::{DomainError, DomainResult, TransitionError, ValidationError};
pub use id::{AggregateId, ProductId};
pub use value_object::ValueObject;
