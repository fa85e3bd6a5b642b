//! Dirty-field bookkeeping for partial updates.

use std::collections::BTreeSet;

/// Persisted product fields that can change after creation.
///
/// Shared by the aggregate (which marks fields) and the repositories (which turn
/// marked fields into targeted updates).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Name,
    Description,
    Category,
    BasePrice,
    Discount,
    Status,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Name,
        Field::Description,
        Field::Category,
        Field::BasePrice,
        Field::Discount,
        Field::Status,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Description => "description",
            Field::Category => "category",
            Field::BasePrice => "base_price",
            Field::Discount => "discount",
            Field::Status => "status",
        }
    }
}

/// Fields modified since the aggregate was created or loaded.
///
/// Only ever grows; a fresh load produces a fresh tracker. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeTracker {
    dirty: BTreeSet<Field>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&mut self, field: Field) {
        self.dirty.insert(field);
    }

    pub fn is_dirty(&self, field: Field) -> bool {
        self.dirty.contains(&field)
    }

    pub fn has_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Dirty fields in declaration order.
    pub fn dirty_fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.dirty.iter().copied()
    }
}
