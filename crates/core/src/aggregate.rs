//! Aggregate root trait for state-stored domain models that record events.

/// Aggregate root marker + minimal interface.
///
/// Aggregates mutate their own state in memory and record the domain events those
/// mutations produced. They never perform IO: persisting the new state and the recorded
/// events is left to the caller, which drains the buffer exactly once per use case.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Domain event type recorded by this aggregate.
    type Event: Clone + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Events recorded since the aggregate was created or loaded, oldest first.
    fn pending_events(&self) -> &[Self::Event];

    /// Drain the recorded events, leaving the buffer empty.
    fn take_events(&mut self) -> Vec<Self::Event>;
}
