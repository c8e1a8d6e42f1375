use sea_orm::{DatabaseConnection, DbErr, PaginatorTrait};

use crate::audit::{Session, UnitOfWork};
use crate::entities::Category;
use crate::resources::CategoryCreate;

/// The predefined categories as `(name, description)`.
pub const CATEGORIES: [(&str, &str); 10] = [
    ("Fiction", "Literary works based on imagination rather than fact"),
    ("Non-Fiction", "Literary works based on factual information"),
    (
        "Science Fiction",
        "Fiction based on imagined future scientific or technological advances",
    ),
    ("Fantasy", "Fiction involving magical elements and imaginary worlds"),
    ("Mystery", "Fiction dealing with the solution of a crime or puzzle"),
    ("Biography", "An account of someone's life written by someone else"),
    ("History", "Books about past events and human societies"),
    ("Self-Help", "Books aimed at helping readers improve their lives"),
    (
        "Programming",
        "Books about computer programming and software development",
    ),
    (
        "Business",
        "Books about business management, entrepreneurship, and economics",
    ),
];

/// Inserts [`CATEGORIES`] in one commit when the table holds no categories,
/// including soft-deleted ones. Returns the number of rows inserted.
///
/// # Errors
///
/// Storage errors unchanged.
pub async fn seed_categories(session: &Session, db: &DatabaseConnection) -> Result<u64, DbErr> {
    let existing = session
        .filters()
        .find_ignoring_filters::<Category>()
        .count(db)
        .await?;
    if existing > 0 {
        tracing::debug!(existing, "Categories already present, skipping seed");
        return Ok(0);
    }

    let mut unit = UnitOfWork::new();
    for (name, description) in CATEGORIES {
        let category: crate::entities::category::ActiveModel = CategoryCreate {
            name: name.to_string(),
            description: Some(description.to_string()),
        }
        .into();
        unit.add(category);
    }
    session.save_changes(db, unit).await
}
