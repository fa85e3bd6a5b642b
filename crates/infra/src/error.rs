//! Infrastructure error model.

use std::time::Duration;

use thiserror::Error;

use catalog_core::DomainError;

/// Failure raised by a repository, read model or committer.
///
/// These are infrastructure errors, as opposed to the deterministic domain failures in
/// `DomainError`. None of them are retried here.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport or transaction failure reported by the driver.
    #[error("storage failure: {0}")]
    Storage(String),

    /// A commit plan carried a mutation the applying driver cannot interpret.
    #[error("{driver} driver cannot apply mutation #{index} of type `{found}`")]
    MutationTypeMismatch {
        driver: &'static str,
        index: usize,
        found: &'static str,
    },

    /// A stored row could not be turned back into domain values.
    #[error("failed to decode stored row: {0}")]
    Decode(String),

    #[error("commit did not finish within {0:?}")]
    Timeout(Duration),

    /// Constraint violation, e.g. a duplicate primary key or an update that matched no row.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Error returned by use cases and queries.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::Domain(DomainError::NotFound))
    }

    /// The domain error, if this is one.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            CatalogError::Domain(err) => Some(err),
            CatalogError::Store(_) => None,
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
