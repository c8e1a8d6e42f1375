use async_trait::async_trait;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr,
    EntityTrait, IntoActiveModel, Order, PaginatorTrait, PrimaryKeyTrait, QueryFilter, QueryOrder,
    QuerySelect, Value,
};

use crate::audit::{Auditable, EntryState, Session, UnitOfWork};

pub type PrimaryKeyOf<E> = <<E as EntityTrait>::PrimaryKey as PrimaryKeyTrait>::ValueType;

pub trait MergeIntoActiveModel<ActiveModelType> {
    /// Merge this update model into an existing active model
    ///
    /// # Errors
    ///
    /// Returns a `DbErr` if the merge operation fails due to data conversion issues.
    fn merge_into_activemodel(self, existing: ActiveModelType) -> Result<ActiveModelType, DbErr>;
}

/// Resource operations over an auditable entity.
///
/// Reads go through the session's query filters, so soft-deleted rows are
/// invisible. Writes go through the session's unit of work, so `delete` is a
/// soft-delete and timestamps are stamped by the interceptor.
#[async_trait]
pub trait TrackedResource: Sized + Send + Sync
where
    Self::EntityType: Auditable + Sync,
    Self::ActiveModelType: ActiveModelTrait<Entity = Self::EntityType>
        + ActiveModelBehavior
        + Send
        + Sync
        + 'static,
    <Self::EntityType as EntityTrait>::Model: Sync + IntoActiveModel<Self::ActiveModelType>,
    Self: From<<Self::EntityType as EntityTrait>::Model>,
{
    type EntityType: Auditable + Sync;
    type ActiveModelType: ActiveModelTrait<Entity = Self::EntityType>;
    type CreateModel: Into<Self::ActiveModelType> + Send;
    type UpdateModel: Send + Sync + MergeIntoActiveModel<Self::ActiveModelType>;
    type Id: Into<PrimaryKeyOf<Self::EntityType>> + Into<Value> + Clone + Send + Sync + 'static;

    const ID_COLUMN: <Self::EntityType as EntityTrait>::Column;
    const RESOURCE_NAME_SINGULAR: &'static str;
    const RESOURCE_NAME_PLURAL: &'static str;

    async fn get_all(
        session: &Session,
        db: &DatabaseConnection,
        condition: &Condition,
        order_column: <Self::EntityType as EntityTrait>::Column,
        order_direction: Order,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Self>, DbErr> {
        let models = session
            .filters()
            .find::<Self::EntityType>()
            .filter(condition.clone())
            .order_by(order_column, order_direction)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await?;
        Ok(models.into_iter().map(Self::from).collect())
    }

    async fn get_one(session: &Session, db: &DatabaseConnection, id: Self::Id) -> Result<Self, DbErr> {
        let model = find_visible::<Self>(session, db, id).await?;
        Ok(Self::from(model))
    }

    async fn create(
        session: &Session,
        db: &DatabaseConnection,
        create_model: Self::CreateModel,
    ) -> Result<Self, DbErr> {
        let active_model: Self::ActiveModelType = create_model.into();
        let model = session
            .save_record(db, active_model, EntryState::ADDED)
            .await?;
        Ok(Self::from(model))
    }

    async fn update(
        session: &Session,
        db: &DatabaseConnection,
        id: Self::Id,
        update_model: Self::UpdateModel,
    ) -> Result<Self, DbErr> {
        let model = find_visible::<Self>(session, db, id).await?;
        let existing: Self::ActiveModelType = model.into_active_model();
        let updated_model = update_model.merge_into_activemodel(existing)?;
        let updated = session
            .save_record(db, updated_model, EntryState::MODIFIED)
            .await?;
        Ok(Self::from(updated))
    }

    /// Soft-deletes the record. Deleting an already deleted record reports
    /// `RecordNotFound`.
    async fn delete(session: &Session, db: &DatabaseConnection, id: Self::Id) -> Result<Self::Id, DbErr> {
        let model = find_visible::<Self>(session, db, id.clone()).await?;
        let existing: Self::ActiveModelType = model.into_active_model();
        session
            .save_record(db, existing, EntryState::DELETED)
            .await?;
        Ok(id)
    }

    /// Soft-deletes every visible record in `ids` in a single commit and
    /// returns the number of rows affected.
    async fn delete_many(
        session: &Session,
        db: &DatabaseConnection,
        ids: Vec<Self::Id>,
    ) -> Result<u64, DbErr> {
        let models = session
            .filters()
            .find::<Self::EntityType>()
            .filter(Self::ID_COLUMN.is_in(ids))
            .all(db)
            .await?;

        let mut unit = UnitOfWork::new();
        for model in models {
            let existing: Self::ActiveModelType = model.into_active_model();
            unit.remove(existing);
        }
        session.save_changes(db, unit).await
    }

    async fn total_count(
        session: &Session,
        db: &DatabaseConnection,
        condition: &Condition,
    ) -> Result<u64, DbErr> {
        let query = session
            .filters()
            .find::<Self::EntityType>()
            .filter(condition.clone());
        PaginatorTrait::count(query, db).await
    }

    /// Records hidden by the soft-delete filter.
    async fn get_deleted(session: &Session, db: &DatabaseConnection) -> Result<Vec<Self>, DbErr> {
        let models = session
            .filters()
            .find_soft_deleted::<Self::EntityType>()
            .order_by(Self::ID_COLUMN, Order::Asc)
            .all(db)
            .await?;
        Ok(models.into_iter().map(Self::from).collect())
    }

    #[must_use]
    fn default_index_column() -> <Self::EntityType as EntityTrait>::Column {
        Self::ID_COLUMN
    }
}

async fn find_visible<T>(
    session: &Session,
    db: &DatabaseConnection,
    id: T::Id,
) -> Result<<T::EntityType as EntityTrait>::Model, DbErr>
where
    T: TrackedResource,
    T::EntityType: Auditable + Sync,
    T::ActiveModelType: ActiveModelTrait<Entity = T::EntityType> + ActiveModelBehavior + Send + Sync + 'static,
    <T::EntityType as EntityTrait>::Model: Sync + IntoActiveModel<T::ActiveModelType>,
    T: From<<T::EntityType as EntityTrait>::Model>,
{
    session
        .filters()
        .visible(T::EntityType::find_by_id(id))
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("{} not found", T::RESOURCE_NAME_SINGULAR)))
}
