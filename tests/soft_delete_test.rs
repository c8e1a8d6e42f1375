mod common;

use bookshelf::entities::{Book, BookCategory, BookDetails, author, book, book_details, category};
use bookshelf::resources::{BookDetailsCreate, books_by_author, link_categories, unlink_category};
use bookshelf::{TrackedResource, UnitOfWork};
use common::{
    commit_time, create_author, create_book, create_category, later, session_at, setup_test_db,
    test_session,
};
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelBehavior, Condition, DbErr, EntityTrait, PaginatorTrait};

#[tokio::test]
async fn test_deleted_record_stays_in_storage() {
    let db = setup_test_db().await.unwrap();
    let session = test_session();
    let book = create_book(&session, &db, "Dune", None, None).await;

    let deleted_id = book::Model::delete(&session_at(later(10)), &db, book.id)
        .await
        .unwrap();
    assert_eq!(deleted_id, book.id);

    // Filtered reads no longer see it
    let result = book::Model::get_one(&session, &db, book.id).await;
    assert!(matches!(result, Err(DbErr::RecordNotFound(_))));
    assert_eq!(
        session.filters().find::<Book>().count(&db).await.unwrap(),
        0
    );

    // The row is still there, flagged
    let stored = session
        .filters()
        .find_ignoring_filters::<Book>()
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_deleted);
    assert_eq!(stored.created_at, commit_time());
    assert_eq!(stored.updated_at, commit_time());

    let soft_deleted = book::Model::get_deleted(&session, &db).await.unwrap();
    assert_eq!(soft_deleted.len(), 1);
    assert_eq!(soft_deleted[0].id, book.id);
}

#[tokio::test]
async fn test_deleting_twice_reports_not_found() {
    let db = setup_test_db().await.unwrap();
    let session = test_session();
    let author = create_author(&session, &db, "Frank Herbert").await;

    author::Model::delete(&session, &db, author.id).await.unwrap();
    let again = author::Model::delete(&session, &db, author.id).await;
    assert!(matches!(again, Err(DbErr::RecordNotFound(_))));
}

#[tokio::test]
async fn test_added_then_deleted_in_same_unit_is_inserted_deleted() {
    let db = setup_test_db().await.unwrap();
    let session = test_session();

    let mut unit = UnitOfWork::new();
    let entry = unit.add(book::ActiveModel {
        title: Set("Unpublished".to_string()),
        description: Set("Draft".to_string()),
        image_url: Set(String::new()),
        author_id: Set(None),
        publisher_id: Set(None),
        ..<book::ActiveModel as ActiveModelBehavior>::new()
    });
    assert!(unit.mark_deleted(entry));

    let rows = session.save_changes(&db, unit).await.unwrap();
    assert_eq!(rows, 1);

    let stored = Book::find().one(&db).await.unwrap().unwrap();
    assert!(stored.is_deleted);
    assert_eq!(stored.created_at, commit_time());
    assert_eq!(stored.updated_at, commit_time());
    assert_eq!(
        session.filters().find::<Book>().count(&db).await.unwrap(),
        0
    );
    assert_eq!(
        session
            .filters()
            .find_soft_deleted::<Book>()
            .count(&db)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_delete_many_soft_deletes_only_visible_ids() {
    let db = setup_test_db().await.unwrap();
    let session = test_session();
    let a = create_author(&session, &db, "Ada").await;
    let b = create_author(&session, &db, "Grace").await;
    let c = create_author(&session, &db, "Barbara").await;

    let rows = author::Model::delete_many(&session, &db, vec![a.id, b.id])
        .await
        .unwrap();
    assert_eq!(rows, 2);

    let visible = author::Model::total_count(&session, &db, &Condition::all())
        .await
        .unwrap();
    assert_eq!(visible, 1);
    assert_eq!(
        author::Model::get_one(&session, &db, c.id).await.unwrap().name,
        "Barbara"
    );

    // Already deleted ids are skipped
    let rows = author::Model::delete_many(&session, &db, vec![a.id])
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn test_soft_deleted_author_keeps_book_reference() {
    let db = setup_test_db().await.unwrap();
    let session = test_session();
    let author = create_author(&session, &db, "Mary Shelley").await;
    let book = create_book(&session, &db, "Frankenstein", Some(author.id), None).await;

    assert_eq!(
        books_by_author(&session, &db, author.id).await.unwrap().len(),
        1
    );

    author::Model::delete(&session, &db, author.id).await.unwrap();

    let stored = book::Model::get_one(&session, &db, book.id).await.unwrap();
    assert_eq!(stored.author_id, Some(author.id));
    let result = books_by_author(&session, &db, author.id).await;
    assert!(matches!(result, Err(DbErr::RecordNotFound(_))));
}

#[tokio::test]
async fn test_link_rows_are_deleted_physically() {
    let db = setup_test_db().await.unwrap();
    let session = test_session();
    let book = create_book(&session, &db, "Neuromancer", None, None).await;
    let cyberpunk = create_category(&session, &db, "Cyberpunk").await;
    let classic = create_category(&session, &db, "Classic").await;

    let linked = link_categories(&session, &db, book.id, &[cyberpunk.id, classic.id])
        .await
        .unwrap();
    assert_eq!(linked, 2);

    let removed = unlink_category(&session, &db, book.id, classic.id)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(BookCategory::find().count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_linking_deleted_book_is_rejected() {
    let db = setup_test_db().await.unwrap();
    let session = test_session();
    let book = create_book(&session, &db, "Gone", None, None).await;
    let category = create_category(&session, &db, "Lost").await;
    book::Model::delete(&session, &db, book.id).await.unwrap();

    let result = link_categories(&session, &db, book.id, &[category.id]).await;
    assert!(matches!(result, Err(DbErr::RecordNotFound(_))));
    assert_eq!(BookCategory::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_details_for_deleted_book_are_rejected() {
    let db = setup_test_db().await.unwrap();
    let session = test_session();
    let book = create_book(&session, &db, "Withdrawn", None, None).await;
    book::Model::delete(&session, &db, book.id).await.unwrap();

    let result = book_details::Model::create(
        &session,
        &db,
        BookDetailsCreate {
            book_id: book.id,
            number_of_pages: 120,
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(result, Err(DbErr::RecordNotFound(_))));
    assert_eq!(BookDetails::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_linking_deleted_category_is_rejected() {
    let db = setup_test_db().await.unwrap();
    let session = test_session();
    let book = create_book(&session, &db, "Kept", None, None).await;
    let kept = create_category(&session, &db, "Fiction").await;
    let retired = create_category(&session, &db, "Retired").await;
    category::Model::delete(&session, &db, retired.id).await.unwrap();

    let result = link_categories(&session, &db, book.id, &[kept.id, retired.id]).await;
    assert!(matches!(result, Err(DbErr::RecordNotFound(_))));
    // Nothing is linked when any category is hidden
    assert_eq!(BookCategory::find().count(&db).await.unwrap(), 0);

    assert_eq!(link_categories(&session, &db, book.id, &[kept.id]).await.unwrap(), 1);
}
