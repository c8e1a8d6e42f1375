//! Sea-ORM entities for the bookstore model.
//!
//! Every entity except the `book_categories` link table carries the audit
//! columns (`created_at`, `updated_at`, `is_deleted`) and implements
//! [`Auditable`](crate::audit::Auditable).

pub mod author;
pub mod book;
pub mod book_category;
pub mod book_details;
pub mod category;
pub mod publisher;

pub use author::Entity as Author;
pub use book::Entity as Book;
pub use book_category::Entity as BookCategory;
pub use book_details::Entity as BookDetails;
pub use category::Entity as Category;
pub use publisher::Entity as Publisher;

use crate::filters::{CapabilityFilter, ModelBuilder, QueryFilters};

/// A [`ModelBuilder`] with every auditable entity registered and the
/// soft-delete filter applied.
#[must_use]
pub fn model_builder() -> ModelBuilder {
    ModelBuilder::new()
        .entity::<Author>()
        .entity::<Publisher>()
        .entity::<Category>()
        .entity::<Book>()
        .entity::<BookDetails>()
        .apply_global_filter(CapabilityFilter::soft_delete())
}

/// The built filter registry for the bookstore model.
#[must_use]
pub fn query_filters() -> QueryFilters {
    model_builder().build()
}
