mod common;

use bookshelf::entities::{Author, Book, Category, author, book, category};
use bookshelf::{TrackedResource, UnitOfWork};
use common::{create_author, setup_test_db, test_session};
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelBehavior, DbErr, EntityTrait, IntoActiveModel, PaginatorTrait, SqlErr};
use uuid::Uuid;

#[tokio::test]
async fn test_duplicate_key_rolls_back_whole_batch() {
    let db = setup_test_db().await.unwrap();
    let session = test_session();
    let existing = create_author(&session, &db, "Existing").await;

    let mut unit = UnitOfWork::new();
    unit.add(category::ActiveModel {
        name: Set("Poetry".to_string()),
        description: Set(None),
        ..Default::default()
    });
    unit.add(author::ActiveModel {
        id: Set(existing.id),
        name: Set("Impostor".to_string()),
        biography: Set(None),
        email: Set(None),
        ..<author::ActiveModel as ActiveModelBehavior>::new()
    });

    let err = session.save_changes(&db, unit).await.unwrap_err();
    assert!(
        matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))),
        "{err:?}"
    );

    // Nothing from the batch persisted
    assert_eq!(Category::find().count(&db).await.unwrap(), 0);
    let stored = Author::find_by_id(existing.id).one(&db).await.unwrap().unwrap();
    assert_eq!(stored, existing);
}

#[tokio::test]
async fn test_foreign_key_failure_rolls_back_earlier_entries() {
    let db = setup_test_db().await.unwrap();
    let session = test_session();

    let mut unit = UnitOfWork::new();
    unit.add(author::ActiveModel {
        name: Set("Orphan Maker".to_string()),
        biography: Set(None),
        email: Set(None),
        ..<author::ActiveModel as ActiveModelBehavior>::new()
    });
    unit.add(book::ActiveModel {
        title: Set("Dangling".to_string()),
        description: Set(String::new()),
        image_url: Set(String::new()),
        author_id: Set(Some(Uuid::new_v4())),
        publisher_id: Set(None),
        ..<book::ActiveModel as ActiveModelBehavior>::new()
    });

    let result = session.save_changes(&db, unit).await;
    assert!(result.is_err());
    assert!(!matches!(result, Err(DbErr::Custom(_))));

    assert_eq!(Author::find().count(&db).await.unwrap(), 0);
    assert_eq!(Book::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_soft_delete_leaves_record_visible() {
    let db = setup_test_db().await.unwrap();
    let session = test_session();
    let keep = create_author(&session, &db, "Keeper").await;
    let clash = create_author(&session, &db, "Clash").await;

    let mut unit = UnitOfWork::new();
    unit.remove(keep.clone().into_active_model());
    unit.add(author::ActiveModel {
        id: Set(clash.id),
        name: Set("Clash again".to_string()),
        biography: Set(None),
        email: Set(None),
        ..<author::ActiveModel as ActiveModelBehavior>::new()
    });

    assert!(session.save_changes(&db, unit).await.is_err());

    let visible = author::Model::get_one(&session, &db, keep.id).await.unwrap();
    assert!(!visible.is_deleted);
}
