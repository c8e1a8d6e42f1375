//! Four ways of reading books together with their related rows.
//!
//! Every query goes through [`QueryFilters`], so soft-deleted authors,
//! publishers, details and categories are treated as absent.

use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, JoinType, LoaderTrait,
    ModelTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{
    Author, Book, BookCategory, BookDetails, Category, Publisher, author, book, book_category,
    book_details, category, publisher,
};
use crate::filters::QueryFilters;

/// Fallback for a missing author or publisher name in a [`BookSummary`].
pub const UNKNOWN: &str = "Unknown";

/// Human-readable description of a loading strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LoadingStrategy {
    pub name: &'static str,
    pub description: &'static str,
    pub advantages: &'static str,
    pub disadvantages: &'static str,
}

impl LoadingStrategy {
    pub const EAGER: Self = Self {
        name: "Eager Loading",
        description: "Loads related entities up front in a fixed number of batched queries",
        advantages: "Few database trips, prevents the N+1 query problem",
        disadvantages: "Can retrieve more data than needed",
    };
    pub const LAZY: Self = Self {
        name: "Lazy Loading",
        description: "Loads related entities on demand when a navigation is first accessed",
        advantages: "Simple to use, loads only what you access",
        disadvantages: "Can cause the N+1 query problem with many entities",
    };
    pub const EXPLICIT: Self = Self {
        name: "Explicit Loading",
        description: "Manually controls when related entities are loaded after the main entity",
        advantages: "Fine-grained control over what gets loaded and when",
        disadvantages: "Requires multiple database trips and more code",
    };
    pub const PROJECTION: Self = Self {
        name: "Projection with Select",
        description: "Maps rows directly to summaries, selecting only the needed columns",
        advantages: "Most efficient for reads, minimal memory usage",
        disadvantages: "Read-only: the result cannot be modified and saved",
    };

    pub const ALL: [Self; 4] = [Self::EAGER, Self::LAZY, Self::EXPLICIT, Self::PROJECTION];
}

// ============================================================================
// Eager
// ============================================================================

/// A book with every navigation populated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BookGraph {
    pub book: book::Model,
    pub author: Option<author::Model>,
    pub publisher: Option<publisher::Model>,
    pub details: Option<book_details::Model>,
    pub categories: Vec<category::Model>,
}

/// Loads all visible books ordered by title, with their navigations batched
/// into one query per relation.
///
/// # Errors
///
/// Storage errors unchanged.
pub async fn eager_load_books(
    filters: &QueryFilters,
    db: &DatabaseConnection,
) -> Result<Vec<BookGraph>, DbErr> {
    let books = filters
        .find::<Book>()
        .order_by_asc(book::Column::Title)
        .all(db)
        .await?;

    let authors = books.load_one(filters.find::<Author>(), db).await?;
    let publishers = books.load_one(filters.find::<Publisher>(), db).await?;
    let details = books.load_one(filters.find::<BookDetails>(), db).await?;
    let categories = books
        .load_many_to_many(filters.find::<Category>(), BookCategory, db)
        .await?;

    Ok(books
        .into_iter()
        .zip(authors)
        .zip(publishers)
        .zip(details)
        .zip(categories)
        .map(
            |((((book, author), publisher), details), mut categories)| {
                // Loader keeps link-table order.
                categories.sort_by(|a, b| a.name.cmp(&b.name));
                BookGraph {
                    book,
                    author,
                    publisher,
                    details,
                    categories,
                }
            },
        )
        .collect())
}

// ============================================================================
// Lazy
// ============================================================================

/// A book whose navigations are queried on first access and then cached.
#[derive(Debug)]
pub struct LazyBook {
    book: book::Model,
    filters: Arc<QueryFilters>,
    db: DatabaseConnection,
    author: Option<Option<author::Model>>,
    publisher: Option<Option<publisher::Model>>,
    details: Option<Option<book_details::Model>>,
    categories: Option<Vec<category::Model>>,
    loads: usize,
}

impl LazyBook {
    #[must_use]
    pub fn new(book: book::Model, filters: Arc<QueryFilters>, db: DatabaseConnection) -> Self {
        Self {
            book,
            filters,
            db,
            author: None,
            publisher: None,
            details: None,
            categories: None,
            loads: 0,
        }
    }

    #[must_use]
    pub fn book(&self) -> &book::Model {
        &self.book
    }

    /// Number of navigation queries issued so far.
    #[must_use]
    pub fn loads(&self) -> usize {
        self.loads
    }

    fn record_load(&mut self, navigation: &'static str) {
        self.loads += 1;
        tracing::trace!(book = %self.book.id, navigation, "Lazy navigation load");
    }

    /// # Errors
    ///
    /// Storage errors unchanged.
    pub async fn author(&mut self) -> Result<Option<&author::Model>, DbErr> {
        if self.author.is_none() {
            let author = self
                .filters
                .visible(self.book.find_related(Author))
                .one(&self.db)
                .await?;
            self.record_load("author");
            self.author = Some(author);
        }
        Ok(self.author.as_ref().and_then(Option::as_ref))
    }

    /// # Errors
    ///
    /// Storage errors unchanged.
    pub async fn publisher(&mut self) -> Result<Option<&publisher::Model>, DbErr> {
        if self.publisher.is_none() {
            let publisher = self
                .filters
                .visible(self.book.find_related(Publisher))
                .one(&self.db)
                .await?;
            self.record_load("publisher");
            self.publisher = Some(publisher);
        }
        Ok(self.publisher.as_ref().and_then(Option::as_ref))
    }

    /// # Errors
    ///
    /// Storage errors unchanged.
    pub async fn details(&mut self) -> Result<Option<&book_details::Model>, DbErr> {
        if self.details.is_none() {
            let details = self
                .filters
                .visible(self.book.find_related(BookDetails))
                .one(&self.db)
                .await?;
            self.record_load("details");
            self.details = Some(details);
        }
        Ok(self.details.as_ref().and_then(Option::as_ref))
    }

    /// # Errors
    ///
    /// Storage errors unchanged.
    pub async fn categories(&mut self) -> Result<&[category::Model], DbErr> {
        if self.categories.is_none() {
            let categories = self
                .filters
                .visible(self.book.find_related(Category))
                .order_by_asc(category::Column::Name)
                .all(&self.db)
                .await?;
            self.record_load("categories");
            self.categories = Some(categories);
        }
        Ok(self.categories.as_deref().unwrap_or_default())
    }
}

/// Loads visible books ordered by title without touching any navigation.
///
/// # Errors
///
/// Storage errors unchanged.
pub async fn lazy_load_books(
    filters: Arc<QueryFilters>,
    db: &DatabaseConnection,
) -> Result<Vec<LazyBook>, DbErr> {
    let books = filters
        .find::<Book>()
        .order_by_asc(book::Column::Title)
        .all(db)
        .await?;
    Ok(books
        .into_iter()
        .map(|book| LazyBook::new(book, Arc::clone(&filters), db.clone()))
        .collect())
}

// ============================================================================
// Explicit
// ============================================================================

/// A book with the navigations the caller chose to load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExplicitBook {
    pub book: book::Model,
    pub author: Option<author::Model>,
    pub details: Option<book_details::Model>,
    pub categories: Vec<category::Model>,
}

/// Loads one book, then its author, details and categories one query at a
/// time.
///
/// # Errors
///
/// `RecordNotFound` if the book is missing or soft-deleted.
pub async fn explicit_load_book(
    filters: &QueryFilters,
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<ExplicitBook, DbErr> {
    let book = filters
        .visible(Book::find_by_id(id))
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound("book not found".to_string()))?;

    let author = filters.visible(book.find_related(Author)).one(db).await?;
    let details = filters
        .visible(book.find_related(BookDetails))
        .one(db)
        .await?;
    let categories = filters
        .visible(book.find_related(Category))
        .order_by_asc(category::Column::Name)
        .all(db)
        .await?;

    Ok(ExplicitBook {
        book,
        author,
        details,
        categories,
    })
}

// ============================================================================
// Projection
// ============================================================================

/// Read-only flattened view of a book.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BookSummary {
    pub id: Uuid,
    pub title: String,
    pub author_name: String,
    pub publisher_name: String,
    pub page_count: i32,
    pub categories: Vec<String>,
}

#[derive(Debug, FromQueryResult)]
struct SummaryRow {
    id: Uuid,
    title: String,
    author_name: Option<String>,
    publisher_name: Option<String>,
    page_count: Option<i32>,
}

/// Projects visible books into [`BookSummary`] rows ordered by title.
///
/// Related rows hidden by a filter are left out of the join, so their
/// columns fall back to [`UNKNOWN`] or `0`.
///
/// # Errors
///
/// Storage errors unchanged.
pub async fn project_book_summaries(
    filters: &QueryFilters,
    db: &DatabaseConnection,
) -> Result<Vec<BookSummary>, DbErr> {
    let author_visible = filters.condition_for::<Author>();
    let publisher_visible = filters.condition_for::<Publisher>();
    let details_visible = filters.condition_for::<BookDetails>();

    let rows = filters
        .find::<Book>()
        .select_only()
        .column(book::Column::Id)
        .column(book::Column::Title)
        .column_as(author::Column::Name, "author_name")
        .column_as(publisher::Column::Name, "publisher_name")
        .column_as(book_details::Column::NumberOfPages, "page_count")
        .join(
            JoinType::LeftJoin,
            book::Relation::Author
                .def()
                .on_condition(move |_, _| author_visible.clone()),
        )
        .join(
            JoinType::LeftJoin,
            book::Relation::Publisher
                .def()
                .on_condition(move |_, _| publisher_visible.clone()),
        )
        .join(
            JoinType::LeftJoin,
            book::Relation::Details
                .def()
                .on_condition(move |_, _| details_visible.clone()),
        )
        .order_by_asc(book::Column::Title)
        .into_model::<SummaryRow>()
        .all(db)
        .await?;

    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let mut names_by_book: HashMap<Uuid, Vec<String>> = HashMap::new();
    if !ids.is_empty() {
        let links = BookCategory::find()
            .filter(book_category::Column::BookId.is_in(ids))
            .find_also_related(Category)
            .filter(filters.condition_for::<Category>())
            .order_by_asc(category::Column::Name)
            .all(db)
            .await?;
        for (link, category) in links {
            if let Some(category) = category {
                names_by_book
                    .entry(link.book_id)
                    .or_default()
                    .push(category.name);
            }
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| BookSummary {
            categories: names_by_book.remove(&row.id).unwrap_or_default(),
            id: row.id,
            title: row.title,
            author_name: row.author_name.unwrap_or_else(|| UNKNOWN.to_string()),
            publisher_name: row.publisher_name.unwrap_or_else(|| UNKNOWN.to_string()),
            page_count: row.page_count.unwrap_or(0),
        })
        .collect())
}
