use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, TransactionTrait,
};
use std::sync::Arc;

use super::{
    AuditInterceptor, Auditable, Clock, EntryState, SaveChangesInterceptor, SystemClock,
    UnitOfWork, Written,
};
use crate::filters::QueryFilters;

/// Commits units of work through an interceptor and carries the read-side
/// query filters.
///
/// Cloning is cheap; the filter registry is shared.
#[derive(Clone, Debug)]
pub struct Session {
    filters: Arc<QueryFilters>,
    interceptor: Arc<dyn SaveChangesInterceptor>,
    clock: Arc<dyn Clock>,
}

impl Session {
    /// A session using [`AuditInterceptor`] and the system clock.
    #[must_use]
    pub fn new(filters: QueryFilters) -> Self {
        Self {
            filters: Arc::new(filters),
            interceptor: Arc::new(AuditInterceptor),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    #[must_use]
    pub fn with_interceptor(mut self, interceptor: impl SaveChangesInterceptor + 'static) -> Self {
        self.interceptor = Arc::new(interceptor);
        self
    }

    #[must_use]
    pub fn filters(&self) -> &QueryFilters {
        &self.filters
    }

    #[must_use]
    pub fn shared_filters(&self) -> Arc<QueryFilters> {
        Arc::clone(&self.filters)
    }

    /// Runs the interceptor over every staged entry, then writes them all in
    /// one transaction. Returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns the storage error unchanged; the transaction is rolled back and
    /// nothing from the unit is persisted.
    pub async fn save_changes(
        &self,
        db: &DatabaseConnection,
        unit: UnitOfWork,
    ) -> Result<u64, DbErr> {
        let written = self.commit(db, unit).await?;
        Ok(written.iter().map(|entry| entry.rows).sum())
    }

    /// Saves one auditable record and returns the stored model.
    ///
    /// # Errors
    ///
    /// Returns the storage error unchanged, or `DbErr::Custom` if the write
    /// produced no model (a state that maps to no statement).
    pub async fn save_record<A>(
        &self,
        db: &DatabaseConnection,
        record: A,
        state: EntryState,
    ) -> Result<<A::Entity as EntityTrait>::Model, DbErr>
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
        A::Entity: Auditable,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    {
        let mut unit = UnitOfWork::new();
        unit.attach(record, state);

        let model = self
            .commit(db, unit)
            .await?
            .pop()
            .and_then(|written| written.model)
            .ok_or_else(|| DbErr::Custom(format!("no record written for state {state:?}")))?;

        model
            .downcast::<<A::Entity as EntityTrait>::Model>()
            .map(|model| *model)
            .map_err(|_| DbErr::Custom("stored model has an unexpected type".to_string()))
    }

    async fn commit(
        &self,
        db: &DatabaseConnection,
        unit: UnitOfWork,
    ) -> Result<Vec<Written>, DbErr> {
        let mut entries = unit.into_entries();
        let now = self.clock.now();
        self.interceptor.saving_changes(&mut entries, now);

        let staged = entries.len();
        let txn = db.begin().await?;
        let mut written = Vec::with_capacity(staged);

        for entry in entries {
            let Some(op) = entry.state().write_op() else {
                continue;
            };
            let table = entry.record().table_name();

            match entry.into_record().write(op, &txn).await {
                Ok(result) => written.push(result),
                Err(err) => {
                    tracing::error!(table = %table, op = ?op, error = ?err, "Write failed, rolling back");
                    if let Err(rollback_err) = txn.rollback().await {
                        tracing::warn!(error = ?rollback_err, "Rollback failed");
                    }
                    return Err(err);
                }
            }
        }

        txn.commit().await.inspect_err(|err| {
            tracing::error!(error = ?err, "Commit failed");
        })?;

        tracing::debug!(
            staged,
            written = written.len(),
            at = %now,
            "Saved changes"
        );
        Ok(written)
    }
}
