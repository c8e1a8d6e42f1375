mod common;

use bookshelf::entities::{Author, Category, author, category};
use bookshelf::resources::AuthorUpdate;
use bookshelf::{TrackedResource, UnitOfWork};
use common::{commit_time, create_author, later, session_at, setup_test_db, test_session};
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelBehavior, EntityTrait, IntoActiveModel, QueryOrder};

// ============================================================================
// Added records
// ============================================================================

#[tokio::test]
async fn test_created_record_gets_commit_time() {
    let db = setup_test_db().await.unwrap();
    let session = test_session();

    let author = create_author(&session, &db, "Ursula Le Guin").await;

    assert_eq!(author.created_at, commit_time());
    assert_eq!(author.updated_at, commit_time());
    assert!(!author.is_deleted);

    let stored = Author::find_by_id(author.id).one(&db).await.unwrap().unwrap();
    assert_eq!(stored, author);
}

#[tokio::test]
async fn test_added_record_ignores_caller_audit_values() {
    let db = setup_test_db().await.unwrap();
    let session = test_session();

    let mut unit = UnitOfWork::new();
    unit.add(author::ActiveModel {
        name: Set("Octavia Butler".to_string()),
        created_at: Set(later(-600)),
        updated_at: Set(later(-600)),
        is_deleted: Set(true),
        ..<author::ActiveModel as ActiveModelBehavior>::new()
    });
    let rows = session.save_changes(&db, unit).await.unwrap();
    assert_eq!(rows, 1);

    let stored = Author::find().one(&db).await.unwrap().unwrap();
    assert_eq!(stored.created_at, commit_time());
    assert_eq!(stored.updated_at, commit_time());
    assert!(!stored.is_deleted);
}

#[tokio::test]
async fn test_batch_shares_one_commit_time() {
    let db = setup_test_db().await.unwrap();
    let session = test_session();

    let mut unit = UnitOfWork::new();
    for name in ["Fiction", "History", "Programming"] {
        unit.add(category::ActiveModel {
            name: Set(name.to_string()),
            description: Set(None),
            ..Default::default()
        });
    }
    assert_eq!(unit.len(), 3);
    let rows = session.save_changes(&db, unit).await.unwrap();
    assert_eq!(rows, 3);

    let stored = Category::find()
        .order_by_asc(category::Column::Id)
        .all(&db)
        .await
        .unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|c| c.created_at == commit_time()));
    assert!(stored.iter().all(|c| c.updated_at == commit_time()));
}

// ============================================================================
// Modified records
// ============================================================================

#[tokio::test]
async fn test_modified_record_advances_updated_at_only() {
    let db = setup_test_db().await.unwrap();
    let author = create_author(&test_session(), &db, "Iain Banks").await;

    let updated = author::Model::update(
        &session_at(later(5)),
        &db,
        author.id,
        AuthorUpdate {
            name: Some("Iain M. Banks".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.name, "Iain M. Banks");
    assert_eq!(updated.created_at, commit_time());
    assert_eq!(updated.updated_at, later(5));
    assert!(updated.updated_at >= updated.created_at);
}

#[tokio::test]
async fn test_caller_supplied_created_at_is_discarded_on_update() {
    let db = setup_test_db().await.unwrap();
    let author = create_author(&test_session(), &db, "Ann Leckie").await;

    let mut active = author.clone().into_active_model();
    active.created_at = Set(later(-10_000));
    active.biography = Set(Some("Ancillary".to_string()));

    let mut unit = UnitOfWork::new();
    unit.update(active);
    session_at(later(1)).save_changes(&db, unit).await.unwrap();

    let stored = Author::find_by_id(author.id).one(&db).await.unwrap().unwrap();
    assert_eq!(stored.created_at, commit_time());
    assert_eq!(stored.updated_at, later(1));
    assert_eq!(stored.biography.as_deref(), Some("Ancillary"));
}

#[tokio::test]
async fn test_clock_behind_created_at_keeps_updated_at_in_order() {
    let db = setup_test_db().await.unwrap();
    let author = create_author(&test_session(), &db, "Gene Wolfe").await;

    let updated = author::Model::update(
        &session_at(later(-60)),
        &db,
        author.id,
        AuthorUpdate {
            biography: Some(Some("Book of the New Sun".to_string())),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.created_at, commit_time());
    assert_eq!(updated.updated_at, commit_time());
}

#[tokio::test]
async fn test_empty_unit_commits_nothing() {
    let db = setup_test_db().await.unwrap();
    let rows = test_session()
        .save_changes(&db, UnitOfWork::new())
        .await
        .unwrap();
    assert_eq!(rows, 0);
}
