//! [`TrackedResource`] implementations and input models for the bookstore
//! entities, plus the book–category link operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelBehavior, ColumnTrait, DatabaseConnection, DbErr, ModelTrait, QueryFilter,
    QueryOrder,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::audit::{EntryState, Session, UnitOfWork};
use crate::entities::{author, book, book_category, book_details, category, publisher};
use crate::traits::{MergeIntoActiveModel, TrackedResource};

// ============================================================================
// Books
// ============================================================================

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BookCreate {
    pub title: String,
    pub description: String,
    pub image_url: String,
    #[serde(default)]
    pub author_id: Option<Uuid>,
    #[serde(default)]
    pub publisher_id: Option<Uuid>,
}

impl From<BookCreate> for book::ActiveModel {
    fn from(create: BookCreate) -> Self {
        Self {
            title: Set(create.title),
            description: Set(create.description),
            image_url: Set(create.image_url),
            author_id: Set(create.author_id),
            publisher_id: Set(create.publisher_id),
            ..<Self as ActiveModelBehavior>::new()
        }
    }
}

/// Partial update; the outer `Option` on nullable fields means "provided".
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[serde(default, with = "serde_with::rust::double_option")]
    pub author_id: Option<Option<Uuid>>,
    #[serde(default, with = "serde_with::rust::double_option")]
    pub publisher_id: Option<Option<Uuid>>,
}

impl MergeIntoActiveModel<book::ActiveModel> for BookUpdate {
    fn merge_into_activemodel(
        self,
        mut existing: book::ActiveModel,
    ) -> Result<book::ActiveModel, DbErr> {
        if let Some(title) = self.title {
            existing.title = Set(title);
        }
        if let Some(description) = self.description {
            existing.description = Set(description);
        }
        if let Some(image_url) = self.image_url {
            existing.image_url = Set(image_url);
        }
        if let Some(author_id) = self.author_id {
            existing.author_id = Set(author_id);
        }
        if let Some(publisher_id) = self.publisher_id {
            existing.publisher_id = Set(publisher_id);
        }
        Ok(existing)
    }
}

impl TrackedResource for book::Model {
    type EntityType = book::Entity;
    type ActiveModelType = book::ActiveModel;
    type CreateModel = BookCreate;
    type UpdateModel = BookUpdate;
    type Id = Uuid;

    const ID_COLUMN: book::Column = book::Column::Id;
    const RESOURCE_NAME_SINGULAR: &'static str = "book";
    const RESOURCE_NAME_PLURAL: &'static str = "books";
}

/// Links a visible book to visible categories in one commit.
///
/// # Errors
///
/// `RecordNotFound` if the book or any category is missing or soft-deleted;
/// storage errors (e.g. an existing link) unchanged.
pub async fn link_categories(
    session: &Session,
    db: &DatabaseConnection,
    book_id: Uuid,
    category_ids: &[i32],
) -> Result<u64, DbErr> {
    book::Model::get_one(session, db, book_id).await?;

    let visible: Vec<i32> = session
        .filters()
        .find::<category::Entity>()
        .filter(category::Column::Id.is_in(category_ids.iter().copied()))
        .all(db)
        .await?
        .into_iter()
        .map(|category| category.id)
        .collect();
    if let Some(missing) = category_ids.iter().find(|id| !visible.contains(id)) {
        return Err(DbErr::RecordNotFound(format!("category {missing} not found")));
    }

    let mut unit = UnitOfWork::new();
    for &category_id in category_ids {
        unit.add_untracked(book_category::ActiveModel {
            book_id: Set(book_id),
            category_id: Set(category_id),
        });
    }
    session.save_changes(db, unit).await
}

/// Removes a book–category link. Link rows are deleted physically.
///
/// # Errors
///
/// Storage errors unchanged.
pub async fn unlink_category(
    session: &Session,
    db: &DatabaseConnection,
    book_id: Uuid,
    category_id: i32,
) -> Result<u64, DbErr> {
    let mut unit = UnitOfWork::new();
    unit.remove_untracked(book_category::ActiveModel {
        book_id: Set(book_id),
        category_id: Set(category_id),
    });
    session.save_changes(db, unit).await
}

/// Visible books written by a visible author, ordered by title.
///
/// # Errors
///
/// `RecordNotFound` if the author is missing or soft-deleted.
pub async fn books_by_author(
    session: &Session,
    db: &DatabaseConnection,
    author_id: Uuid,
) -> Result<Vec<book::Model>, DbErr> {
    let author = author::Model::get_one(session, db, author_id).await?;
    session
        .filters()
        .visible(author.find_related(book::Entity))
        .order_by_asc(book::Column::Title)
        .all(db)
        .await
}

// ============================================================================
// Authors
// ============================================================================

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuthorCreate {
    pub name: String,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl From<AuthorCreate> for author::ActiveModel {
    fn from(create: AuthorCreate) -> Self {
        Self {
            name: Set(create.name),
            biography: Set(create.biography),
            email: Set(create.email),
            ..<Self as ActiveModelBehavior>::new()
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuthorUpdate {
    pub name: Option<String>,
    #[serde(default, with = "serde_with::rust::double_option")]
    pub biography: Option<Option<String>>,
    #[serde(default, with = "serde_with::rust::double_option")]
    pub email: Option<Option<String>>,
}

impl MergeIntoActiveModel<author::ActiveModel> for AuthorUpdate {
    fn merge_into_activemodel(
        self,
        mut existing: author::ActiveModel,
    ) -> Result<author::ActiveModel, DbErr> {
        if let Some(name) = self.name {
            existing.name = Set(name);
        }
        if let Some(biography) = self.biography {
            existing.biography = Set(biography);
        }
        if let Some(email) = self.email {
            existing.email = Set(email);
        }
        Ok(existing)
    }
}

impl TrackedResource for author::Model {
    type EntityType = author::Entity;
    type ActiveModelType = author::ActiveModel;
    type CreateModel = AuthorCreate;
    type UpdateModel = AuthorUpdate;
    type Id = Uuid;

    const ID_COLUMN: author::Column = author::Column::Id;
    const RESOURCE_NAME_SINGULAR: &'static str = "author";
    const RESOURCE_NAME_PLURAL: &'static str = "authors";
}

// ============================================================================
// Publishers
// ============================================================================

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PublisherCreate {
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl From<PublisherCreate> for publisher::ActiveModel {
    fn from(create: PublisherCreate) -> Self {
        Self {
            name: Set(create.name),
            website: Set(create.website),
            location: Set(create.location),
            ..<Self as ActiveModelBehavior>::new()
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PublisherUpdate {
    pub name: Option<String>,
    #[serde(default, with = "serde_with::rust::double_option")]
    pub website: Option<Option<String>>,
    #[serde(default, with = "serde_with::rust::double_option")]
    pub location: Option<Option<String>>,
}

impl MergeIntoActiveModel<publisher::ActiveModel> for PublisherUpdate {
    fn merge_into_activemodel(
        self,
        mut existing: publisher::ActiveModel,
    ) -> Result<publisher::ActiveModel, DbErr> {
        if let Some(name) = self.name {
            existing.name = Set(name);
        }
        if let Some(website) = self.website {
            existing.website = Set(website);
        }
        if let Some(location) = self.location {
            existing.location = Set(location);
        }
        Ok(existing)
    }
}

impl TrackedResource for publisher::Model {
    type EntityType = publisher::Entity;
    type ActiveModelType = publisher::ActiveModel;
    type CreateModel = PublisherCreate;
    type UpdateModel = PublisherUpdate;
    type Id = Uuid;

    const ID_COLUMN: publisher::Column = publisher::Column::Id;
    const RESOURCE_NAME_SINGULAR: &'static str = "publisher";
    const RESOURCE_NAME_PLURAL: &'static str = "publishers";
}

// ============================================================================
// Book details
// ============================================================================

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BookDetailsCreate {
    pub book_id: Uuid,
    pub number_of_pages: i32,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub published_date: Option<DateTime<Utc>>,
}

impl From<BookDetailsCreate> for book_details::ActiveModel {
    fn from(create: BookDetailsCreate) -> Self {
        Self {
            book_id: Set(create.book_id),
            number_of_pages: Set(create.number_of_pages),
            language: Set(create.language),
            isbn: Set(create.isbn),
            published_date: Set(create.published_date),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BookDetailsUpdate {
    pub number_of_pages: Option<i32>,
    #[serde(default, with = "serde_with::rust::double_option")]
    pub language: Option<Option<String>>,
    #[serde(default, with = "serde_with::rust::double_option")]
    pub isbn: Option<Option<String>>,
    #[serde(default, with = "serde_with::rust::double_option")]
    pub published_date: Option<Option<DateTime<Utc>>>,
}

impl MergeIntoActiveModel<book_details::ActiveModel> for BookDetailsUpdate {
    fn merge_into_activemodel(
        self,
        mut existing: book_details::ActiveModel,
    ) -> Result<book_details::ActiveModel, DbErr> {
        if let Some(number_of_pages) = self.number_of_pages {
            if number_of_pages < 0 {
                return Err(DbErr::Custom(format!(
                    "number_of_pages must not be negative, got {number_of_pages}"
                )));
            }
            existing.number_of_pages = Set(number_of_pages);
        }
        if let Some(language) = self.language {
            existing.language = Set(language);
        }
        if let Some(isbn) = self.isbn {
            existing.isbn = Set(isbn);
        }
        if let Some(published_date) = self.published_date {
            existing.published_date = Set(published_date);
        }
        Ok(existing)
    }
}

#[async_trait]
impl TrackedResource for book_details::Model {
    type EntityType = book_details::Entity;
    type ActiveModelType = book_details::ActiveModel;
    type CreateModel = BookDetailsCreate;
    type UpdateModel = BookDetailsUpdate;
    type Id = Uuid;

    const ID_COLUMN: book_details::Column = book_details::Column::BookId;
    const RESOURCE_NAME_SINGULAR: &'static str = "book details";
    const RESOURCE_NAME_PLURAL: &'static str = "book details";

    /// Details can only be attached to a visible book.
    async fn create(
        session: &Session,
        db: &DatabaseConnection,
        create_model: BookDetailsCreate,
    ) -> Result<Self, DbErr> {
        book::Model::get_one(session, db, create_model.book_id).await?;
        let active_model: book_details::ActiveModel = create_model.into();
        session
            .save_record(db, active_model, EntryState::ADDED)
            .await
    }
}

// ============================================================================
// Categories
// ============================================================================

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CategoryCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<CategoryCreate> for category::ActiveModel {
    fn from(create: CategoryCreate) -> Self {
        Self {
            name: Set(create.name),
            description: Set(create.description),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    #[serde(default, with = "serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
}

impl MergeIntoActiveModel<category::ActiveModel> for CategoryUpdate {
    fn merge_into_activemodel(
        self,
        mut existing: category::ActiveModel,
    ) -> Result<category::ActiveModel, DbErr> {
        if let Some(name) = self.name {
            existing.name = Set(name);
        }
        if let Some(description) = self.description {
            existing.description = Set(description);
        }
        Ok(existing)
    }
}

impl TrackedResource for category::Model {
    type EntityType = category::Entity;
    type ActiveModelType = category::ActiveModel;
    type CreateModel = CategoryCreate;
    type UpdateModel = CategoryUpdate;
    type Id = i32;

    const ID_COLUMN: category::Column = category::Column::Id;
    const RESOURCE_NAME_SINGULAR: &'static str = "category";
    const RESOURCE_NAME_PLURAL: &'static str = "categories";
}

/// Visible categories whose name contains `fragment`, ordered by name.
///
/// # Errors
///
/// Storage errors unchanged.
pub async fn search_categories(
    session: &Session,
    db: &DatabaseConnection,
    fragment: &str,
) -> Result<Vec<category::Model>, DbErr> {
    session
        .filters()
        .find::<category::Entity>()
        .filter(category::Column::Name.contains(fragment))
        .order_by_asc(category::Column::Name)
        .all(db)
        .await
}
