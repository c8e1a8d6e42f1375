#![allow(dead_code)]

use bookshelf::entities::{
    Author, Book, BookCategory, BookDetails, Category, Publisher, author, book, book_details,
    category, publisher, query_filters,
};
use bookshelf::resources::{
    AuthorCreate, BookCreate, BookDetailsCreate, CategoryCreate, PublisherCreate,
};
use bookshelf::{FixedClock, Session, StoreConfig, TrackedResource};
use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::{DatabaseConnection, DbErr, Schema};
use sea_orm_migration::prelude::*;
use uuid::Uuid;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    init_tracing();
    let db = StoreConfig::default().connect().await?;

    // Run migrations
    Migrator::up(&db, None).await?;

    Ok(db)
}

/// The instant every test session commits at unless advanced.
pub fn commit_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 22, 18, 28, 34).unwrap()
}

pub fn later(minutes: i64) -> DateTime<Utc> {
    commit_time() + Duration::minutes(minutes)
}

pub fn session_at(now: DateTime<Utc>) -> Session {
    Session::new(query_filters()).with_clock(FixedClock(now))
}

pub fn test_session() -> Session {
    session_at(commit_time())
}

// ============================================================================
// Fixtures
// ============================================================================

pub async fn create_author(session: &Session, db: &DatabaseConnection, name: &str) -> author::Model {
    author::Model::create(
        session,
        db,
        AuthorCreate {
            name: name.to_string(),
            biography: None,
            email: Some(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
        },
    )
    .await
    .unwrap()
}

pub async fn create_publisher(
    session: &Session,
    db: &DatabaseConnection,
    name: &str,
) -> publisher::Model {
    publisher::Model::create(
        session,
        db,
        PublisherCreate {
            name: name.to_string(),
            website: None,
            location: Some("London".to_string()),
        },
    )
    .await
    .unwrap()
}

pub async fn create_category(
    session: &Session,
    db: &DatabaseConnection,
    name: &str,
) -> category::Model {
    category::Model::create(
        session,
        db,
        CategoryCreate {
            name: name.to_string(),
            description: None,
        },
    )
    .await
    .unwrap()
}

pub async fn create_book(
    session: &Session,
    db: &DatabaseConnection,
    title: &str,
    author_id: Option<Uuid>,
    publisher_id: Option<Uuid>,
) -> book::Model {
    book::Model::create(
        session,
        db,
        BookCreate {
            title: title.to_string(),
            description: format!("About {title}"),
            image_url: format!("https://images.example.com/{}.png", title.to_lowercase()),
            author_id,
            publisher_id,
        },
    )
    .await
    .unwrap()
}

pub async fn create_details(
    session: &Session,
    db: &DatabaseConnection,
    book_id: Uuid,
    number_of_pages: i32,
) -> book_details::Model {
    book_details::Model::create(
        session,
        db,
        BookDetailsCreate {
            book_id,
            number_of_pages,
            language: Some("English".to_string()),
            isbn: None,
            published_date: None,
        },
    )
    .await
    .unwrap()
}

// ============================================================================
// Schema
// ============================================================================

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateBookstoreTables)]
    }
}

pub struct CreateBookstoreTables;

#[async_trait::async_trait]
impl MigrationName for CreateBookstoreTables {
    fn name(&self) -> &'static str {
        "m20250622_000001_create_bookstore_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateBookstoreTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(manager.get_database_backend());

        // Parents before children so foreign keys resolve.
        manager
            .create_table(schema.create_table_from_entity(Author))
            .await?;
        manager
            .create_table(schema.create_table_from_entity(Publisher))
            .await?;
        manager
            .create_table(schema.create_table_from_entity(Category))
            .await?;
        manager
            .create_table(schema.create_table_from_entity(Book))
            .await?;
        manager
            .create_table(schema.create_table_from_entity(BookDetails))
            .await?;
        manager
            .create_table(schema.create_table_from_entity(BookCategory))
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            "book_categories",
            "book_details",
            "books",
            "categories",
            "publishers",
            "authors",
        ] {
            manager
                .drop_table(Table::drop().table(Alias::new(table)).to_owned())
                .await?;
        }
        Ok(())
    }
}
