//! `PostgreSQL` event repository for Rally.
//!
//! This crate provides the production implementation of the
//! [`EventRepository`](rally_core::EventRepository) trait from `rally-core`.
//! It uses sqlx with a connection pool and supports:
//!
//! - Atomic, idempotent membership changes (one statement per join/leave)
//! - Filtered and sorted listings pushed down into SQL
//! - Embedded migrations
//!
//! # Example
//!
//! ```no_run
//! use rally_postgres::PostgresEventRepository;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), rally_core::RepositoryError> {
//! let repository =
//!     PostgresEventRepository::connect("postgres://localhost/rally", 10, 2, Duration::from_secs(30))
//!         .await?;
//! repository.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod repository;

pub use repository::PostgresEventRepository;
