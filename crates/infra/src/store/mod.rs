//! Storage drivers.
//!
//! Each driver implements every capability (repositories, read model, committer) over one
//! backing store, and only accepts the mutation type it produces itself.

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryCatalogStore, MemoryMutation};
pub use postgres::{PgStatement, PgValue, PostgresCatalogStore};
