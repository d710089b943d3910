//! Order persistence.
//!
//! The [`OrderRepository`] trait is the storage capability the use cases
//! consume. Two implementations are provided:
//! - [`InMemoryOrderRepository`] for tests and local runs
//! - [`PostgresOrderRepository`] backed by `sqlx`

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod repository;

pub use error::{RepositoryError, Result};
pub use memory::InMemoryOrderRepository;
pub use postgres::PostgresOrderRepository;
pub use query::{DEFAULT_LIMIT, MAX_LIMIT, OrderFilters, SortField, SortOrder};
pub use repository::{OrderRepository, OrderRepositoryExt};
