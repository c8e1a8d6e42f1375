//! # bookshelf
//!
//! Audit timestamps, soft-delete and global query filters for a small
//! Sea-ORM bookstore model (books, authors, publishers, categories and book
//! details).
//!
//! - [`audit`]: the unit of work, the save-time interceptor and the
//!   [`Session`] that commits a unit in one transaction.
//! - [`filters`]: capability filters bound to every auditable entity at
//!   start-up, applied to every read.
//! - [`traits::TrackedResource`]: CRUD over any auditable entity, with
//!   `delete` meaning soft-delete.
//! - [`loading`]: eager, lazy, explicit and projected reads of books.
//! - [`evaluation`]: database, in-memory and mixed evaluation of book
//!   queries, and single- vs split-query graph loading.
//!
//! ```rust,ignore
//! let db = StoreConfig::from_env()?.connect().await?;
//! let session = Session::new(entities::query_filters());
//!
//! let book = book::Model::create(&session, &db, BookCreate { title: "Dune".into(), ..Default::default() }).await?;
//! book::Model::delete(&session, &db, book.id).await?;
//! assert!(book::Model::get_one(&session, &db, book.id).await.is_err());
//! ```

pub mod audit;
pub mod config;
pub mod entities;
pub mod evaluation;
pub mod filters;
pub mod loading;
pub mod resources;
pub mod seed;
pub mod traits;

pub use sea_orm;

pub use audit::{AuditInterceptor, Auditable, Clock, FixedClock, Session, SystemClock, UnitOfWork};
pub use config::StoreConfig;
pub use evaluation::EvaluationStrategy;
pub use filters::{CapabilityFilter, ModelBuilder, QueryFilters};
pub use traits::{MergeIntoActiveModel, TrackedResource};
