//! Value object trait: equality by value, not identity.
//!
//! Value objects are domain objects that have **no identity** - they are defined entirely
//! by their attribute values. Two value objects with the same values are considered equal.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one, build a
/// new one. `Money` and `Discount` in the products crate are the canonical examples:
/// `Money(10/1)` and `Money(1000/100)` are the same value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
