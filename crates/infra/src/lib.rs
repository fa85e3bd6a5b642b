//! Infrastructure layer: commit plans, storage drivers, use cases and queries.

pub mod commit_plan;
pub mod config;
pub mod error;
pub mod models;
pub mod outbox;
pub mod queries;
pub mod repository;
pub mod store;
pub mod usecases;


pub use commit_plan::{CommitPlan, Committer, Mutation};
pub use config::CatalogConfig;
pub use error::{CatalogError, CatalogResult, StoreError};
pub use queries::{ListProducts, ProductDetails, ProductPage, ProductQueries, ProductSummary};
pub use repository::{OutboxRepository, ProductReadModel, ProductRepository, ViewPage};
pub use store::{InMemoryCatalogStore, PostgresCatalogStore};
pub use usecases::{ApplyDiscount, CreateProduct, ProductCommands, UpdateProduct};
