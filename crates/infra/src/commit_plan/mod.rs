//! Unit of work: opaque storage mutations applied as one atomic transaction.
//!
//! Repositories turn aggregates and outbox records into [`Mutation`]s. A use case
//! accumulates them in a [`CommitPlan`] and hands the plan to a [`Committer`], which
//! applies everything or nothing. The plan never looks inside a mutation; only the driver
//! that produced it knows how to interpret it.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;

/// A driver-specific write, type-erased at the plan boundary.
pub struct Mutation {
    type_name: &'static str,
    inner: Box<dyn Any + Send + Sync>,
}

impl Mutation {
    pub fn new<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Box::new(value),
        }
    }

    /// Name of the concrete type carried, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Recover the concrete value, or hand the mutation back untouched.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        match self.inner.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(inner) => Err(Self { type_name, inner }),
        }
    }

    /// Downcast on behalf of `driver`, turning a foreign type into `MutationTypeMismatch`.
    pub fn into_driver<T: Any>(self, driver: &'static str, index: usize) -> Result<T, StoreError> {
        self.downcast::<T>()
            .map_err(|foreign| StoreError::MutationTypeMismatch {
                driver,
                index,
                found: foreign.type_name,
            })
    }
}

impl core::fmt::Debug for Mutation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mutation")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of mutations owned by one use-case invocation.
#[derive(Debug, Default)]
pub struct CommitPlan {
    mutations: Vec<Mutation>,
}

impl CommitPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mutation. `None` is ignored so "nothing changed" needs no special case.
    pub fn add(&mut self, mutation: impl Into<Option<Mutation>>) -> &mut Self {
        if let Some(mutation) = mutation.into() {
            self.mutations.push(mutation);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Mutations in insertion order.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}

impl Extend<Mutation> for CommitPlan {
    fn extend<I: IntoIterator<Item = Mutation>>(&mut self, iter: I) {
        self.mutations.extend(iter);
    }
}

/// Applies a commit plan to a store atomically.
///
/// Implementations must:
/// - return `Ok(())` without touching the store when the plan is empty
/// - reject any mutation they cannot interpret with `StoreError::MutationTypeMismatch`
/// - make either every mutation durable or none of them
/// - leave no durable effect if the returned future is dropped before completion
#[async_trait]
pub trait Committer: Send + Sync {
    async fn apply(&self, plan: CommitPlan) -> Result<(), StoreError>;
}

#[async_trait]
impl<C> Committer for Arc<C>
where
    C: Committer + ?Sized,
{
    async fn apply(&self, plan: CommitPlan) -> Result<(), StoreError> {
        (**self).apply(plan).await
    }
}
