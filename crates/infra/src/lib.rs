//! Infrastructure layer: storage adapters for the core interfaces.
//!
//! `InMemoryRepository` backs development and tests; the Postgres trust
//! backend persists trust records across restarts.

pub mod postgres;
pub mod repository;

pub use postgres::PostgresTrustBackend;
pub use repository::InMemoryRepository;
