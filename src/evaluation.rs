//! Where a book query is evaluated: in the database, in memory, or split
//! between the two. Also contrasts one joined query against one query per
//! relation when loading a book graph.
//!
//! Every query goes through [`QueryFilters`], so soft-deleted rows never reach
//! the in-memory stage either.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, IdenStatic,
    Iterable, JoinType, QueryFilter, QueryOrder, QueryResult, QuerySelect, RelationTrait, Select,
};
use serde::Serialize;

use crate::entities::{
    Author, Book, BookDetails, Category, Publisher, author, book, book_category, book_details,
    category, publisher,
};
use crate::filters::QueryFilters;
use crate::loading::{BookGraph, eager_load_books};

/// Human-readable description of an evaluation or query-shape strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EvaluationStrategy {
    pub name: &'static str,
    pub description: &'static str,
    pub advantages: &'static str,
    pub disadvantages: &'static str,
}

impl EvaluationStrategy {
    pub const SERVER: Self = Self {
        name: "Server Evaluation",
        description: "The query is translated to SQL and executed entirely by the database",
        advantages: "Efficient, uses database indexes, minimizes data transfer",
        disadvantages: "Limited to operations the database can express",
    };
    pub const CLIENT: Self = Self {
        name: "Client Evaluation",
        description: "Rows are loaded first and filtered in application memory",
        advantages: "Any Rust predicate can be used",
        disadvantages: "Inefficient for large datasets, loads unnecessary data, bypasses database indexes",
    };
    pub const MIXED: Self = Self {
        name: "Mixed Evaluation",
        description: "Part of the query runs in the database, part runs in memory",
        advantages: "The database narrows the rows before the in-memory predicate runs",
        disadvantages: "The split point is easy to get wrong",
    };
    pub const EXPLICIT_CLIENT: Self = Self {
        name: "Explicit Client Evaluation",
        description: "The query is executed, then further operations run on the loaded rows",
        advantages: "Allows operations that cannot be translated to SQL",
        disadvantages: "Everything after the split point loads into memory",
    };
    pub const DATABASE_FUNCTIONS: Self = Self {
        name: "Database Function Evaluation",
        description: "Uses SQL functions such as LIKE so the filter runs in the database",
        advantages: "Efficient, runs entirely in the database with its own optimizations",
        disadvantages: "Pattern semantics depend on the database backend",
    };
    pub const DEFERRED: Self = Self {
        name: "Deferred Query",
        description: "A query that has not been executed yet and can still be composed",
        advantages: "Filters, ordering and paging are folded into one SQL statement",
        disadvantages: "Nothing runs until the query is executed",
    };
    pub const IN_MEMORY: Self = Self {
        name: "In-Memory Collection",
        description: "A collection that has already been loaded into memory",
        advantages: "Immediate execution, data is available without further queries",
        disadvantages: "Every later filter runs in memory over all loaded rows",
    };
    pub const SINGLE_QUERY: Self = Self {
        name: "Single Query",
        description: "Loads a book graph in one SQL query with JOINs",
        advantages: "One database trip, better for small result sets",
        disadvantages: "Cartesian explosion with multiple collections, duplicate rows to fold",
    };
    pub const SPLIT_QUERY: Self = Self {
        name: "Split Query",
        description: "Executes a separate SQL query for each included relation",
        advantages: "Avoids cartesian explosion, better for large result sets",
        disadvantages: "More database trips",
    };

    pub const ALL: [Self; 9] = [
        Self::SERVER,
        Self::CLIENT,
        Self::MIXED,
        Self::EXPLICIT_CLIENT,
        Self::DATABASE_FUNCTIONS,
        Self::DEFERRED,
        Self::IN_MEMORY,
        Self::SINGLE_QUERY,
        Self::SPLIT_QUERY,
    ];
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

// ============================================================================
// Server, client and mixed evaluation
// ============================================================================

/// Visible books whose title contains `fragment`, filtered in SQL.
///
/// # Errors
///
/// Storage errors unchanged.
pub async fn server_evaluation(
    filters: &QueryFilters,
    db: &DatabaseConnection,
    fragment: &str,
) -> Result<Vec<book::Model>, DbErr> {
    deferred_title_query(filters, Some(fragment)).all(db).await
}

/// Same result as [`server_evaluation`], but every visible book is loaded and
/// the title is matched in memory, ignoring ASCII and Unicode case.
///
/// # Errors
///
/// Storage errors unchanged.
pub async fn client_evaluation(
    filters: &QueryFilters,
    db: &DatabaseConnection,
    fragment: &str,
) -> Result<Vec<book::Model>, DbErr> {
    let books = deferred_title_query(filters, None).all(db).await?;
    Ok(in_memory_title_filter(books, fragment))
}

/// Title matched in SQL, then description word count checked in memory.
///
/// # Errors
///
/// Storage errors unchanged.
pub async fn mixed_evaluation(
    filters: &QueryFilters,
    db: &DatabaseConnection,
    fragment: &str,
    min_description_words: usize,
) -> Result<Vec<book::Model>, DbErr> {
    let books = server_evaluation(filters, db, fragment).await?;
    Ok(books
        .into_iter()
        .filter(|book| book.description.split_whitespace().count() > min_description_words)
        .collect())
}

/// Title matched in SQL; the query is executed there, and the description is
/// matched case-insensitively on the loaded rows.
///
/// # Errors
///
/// Storage errors unchanged.
pub async fn explicit_client_evaluation(
    filters: &QueryFilters,
    db: &DatabaseConnection,
    title_fragment: &str,
    description_fragment: &str,
) -> Result<Vec<book::Model>, DbErr> {
    let loaded = server_evaluation(filters, db, title_fragment).await?;
    Ok(loaded
        .into_iter()
        .filter(|book| contains_ignore_case(&book.description, description_fragment))
        .collect())
}

/// Both patterns are passed to SQL `LIKE` as given, wildcards included.
///
/// # Errors
///
/// Storage errors unchanged.
pub async fn database_function_evaluation(
    filters: &QueryFilters,
    db: &DatabaseConnection,
    title_pattern: &str,
    description_pattern: &str,
) -> Result<Vec<book::Model>, DbErr> {
    filters
        .find::<Book>()
        .filter(book::Column::Title.like(title_pattern))
        .filter(book::Column::Description.like(description_pattern))
        .order_by_asc(book::Column::Title)
        .all(db)
        .await
}

// ============================================================================
// Deferred vs in-memory
// ============================================================================

/// An unexecuted, composable query over visible books ordered by title.
#[must_use]
pub fn deferred_title_query(filters: &QueryFilters, fragment: Option<&str>) -> Select<Book> {
    let query = filters.find::<Book>();
    let query = match fragment {
        Some(fragment) => query.filter(book::Column::Title.contains(fragment)),
        None => query,
    };
    query.order_by_asc(book::Column::Title)
}

/// Filters already loaded books by title, keeping their order.
#[must_use]
pub fn in_memory_title_filter(books: Vec<book::Model>, fragment: &str) -> Vec<book::Model> {
    books
        .into_iter()
        .filter(|book| contains_ignore_case(&book.title, fragment))
        .collect()
}

// ============================================================================
// Single vs split query
// ============================================================================

const BOOK_PREFIX: &str = "b_";
const AUTHOR_PREFIX: &str = "a_";
const PUBLISHER_PREFIX: &str = "p_";
const DETAILS_PREFIX: &str = "d_";
const CATEGORY_PREFIX: &str = "c_";

/// One row of the joined query: a book with at most one of its categories.
struct JoinedRow {
    book: book::Model,
    author: Option<author::Model>,
    publisher: Option<publisher::Model>,
    details: Option<book_details::Model>,
    category: Option<category::Model>,
}

impl FromQueryResult for JoinedRow {
    fn from_query_result(res: &QueryResult, _pre: &str) -> Result<Self, DbErr> {
        Ok(Self {
            book: book::Model::from_query_result(res, BOOK_PREFIX)?,
            author: author::Model::from_query_result_optional(res, AUTHOR_PREFIX)?,
            publisher: publisher::Model::from_query_result_optional(res, PUBLISHER_PREFIX)?,
            details: book_details::Model::from_query_result_optional(res, DETAILS_PREFIX)?,
            category: category::Model::from_query_result_optional(res, CATEGORY_PREFIX)?,
        })
    }
}

fn select_prefixed<E: EntityTrait>(select: Select<Book>, prefix: &str) -> Select<Book> {
    E::Column::iter().fold(select, |select, column| {
        select.column_as(
            Expr::col((E::default(), column)),
            format!("{prefix}{}", column.as_str()),
        )
    })
}

/// Loads visible books with their visible navigations in one SQL statement
/// and folds the duplicated rows back into graphs.
///
/// # Errors
///
/// Storage errors unchanged.
pub async fn single_query_books(
    filters: &QueryFilters,
    db: &DatabaseConnection,
) -> Result<Vec<BookGraph>, DbErr> {
    let author_visible = filters.condition_for::<Author>();
    let publisher_visible = filters.condition_for::<Publisher>();
    let details_visible = filters.condition_for::<BookDetails>();
    let category_visible = filters.condition_for::<Category>();

    let select = filters.find::<Book>().select_only();
    let select = select_prefixed::<Book>(select, BOOK_PREFIX);
    let select = select_prefixed::<Author>(select, AUTHOR_PREFIX);
    let select = select_prefixed::<Publisher>(select, PUBLISHER_PREFIX);
    let select = select_prefixed::<BookDetails>(select, DETAILS_PREFIX);
    let select = select_prefixed::<Category>(select, CATEGORY_PREFIX);

    let rows = select
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
        .join(JoinType::LeftJoin, book::Relation::BookCategories.def())
        .join(
            JoinType::LeftJoin,
            book_category::Relation::Category
                .def()
                .on_condition(move |_, _| category_visible.clone()),
        )
        .order_by_asc(book::Column::Title)
        .order_by_asc(book::Column::Id)
        .into_model::<JoinedRow>()
        .all(db)
        .await?;

    let row_count = rows.len();
    let mut graphs: Vec<BookGraph> = Vec::new();
    for row in rows {
        let starts_book = graphs
            .last()
            .is_none_or(|graph| graph.book.id != row.book.id);
        if starts_book {
            graphs.push(BookGraph {
                book: row.book,
                author: row.author,
                publisher: row.publisher,
                details: row.details,
                categories: Vec::new(),
            });
        }
        if let (Some(graph), Some(category)) = (graphs.last_mut(), row.category) {
            if !graph.categories.iter().any(|seen| seen.id == category.id) {
                graph.categories.push(category);
            }
        }
    }
    for graph in &mut graphs {
        graph.categories.sort_by(|a, b| a.name.cmp(&b.name));
    }

    tracing::debug!(rows = row_count, books = graphs.len(), "Folded single-query rows");
    Ok(graphs)
}

/// Loads the same graphs as [`single_query_books`] with one query per
/// relation.
///
/// # Errors
///
/// Storage errors unchanged.
pub async fn split_query_books(
    filters: &QueryFilters,
    db: &DatabaseConnection,
) -> Result<Vec<BookGraph>, DbErr> {
    eager_load_books(filters, db).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::query_filters;
    use sea_orm::{DbBackend, QueryTrait};

    #[test]
    fn test_strategy_names_are_unique() {
        let mut names: Vec<_> = EvaluationStrategy::ALL.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EvaluationStrategy::ALL.len());
    }

    #[test]
    fn test_deferred_query_is_filtered_in_sql() {
        let filters = query_filters();
        let sql = deferred_title_query(&filters, Some("Entity"))
            .build(DbBackend::Sqlite)
            .to_string();

        assert!(sql.contains(r#""books"."title" LIKE '%Entity%'"#), "{sql}");
        assert!(sql.contains(r#""books"."is_deleted" = "#), "{sql}");
        assert!(sql.contains("ORDER BY"), "{sql}");
    }

    #[test]
    fn test_unfiltered_deferred_query_keeps_visibility() {
        let filters = query_filters();
        let sql = deferred_title_query(&filters, None)
            .build(DbBackend::Sqlite)
            .to_string();

        assert!(!sql.contains("LIKE"), "{sql}");
        assert!(sql.contains(r#""books"."is_deleted" = "#), "{sql}");
    }

    #[test]
    fn test_in_memory_filter_ignores_case() {
        let now = chrono::Utc::now();
        let book = |title: &str| book::Model {
            id: uuid::Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            image_url: String::new(),
            author_id: None,
            publisher_id: None,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        };
        let books = vec![
            book("Programming Entity Framework"),
            book("Dune"),
            book("entity systems"),
        ];

        let titles: Vec<_> = in_memory_title_filter(books, "ENTITY")
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["Programming Entity Framework", "entity systems"]);
    }
}
