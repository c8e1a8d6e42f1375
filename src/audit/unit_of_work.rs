use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ActiveValue, DatabaseTransaction, DbErr, EntityName,
    EntityTrait, IntoActiveModel, Value,
};
use std::any::Any;
use std::fmt;

use super::{AuditField, Auditable};

/// How an entry was staged. Flags combine: an added entry that is later
/// removed is both `added` and `deleted`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntryState {
    pub added: bool,
    pub modified: bool,
    pub deleted: bool,
}

impl EntryState {
    pub const ADDED: Self = Self {
        added: true,
        modified: false,
        deleted: false,
    };
    pub const MODIFIED: Self = Self {
        added: false,
        modified: true,
        deleted: false,
    };
    pub const DELETED: Self = Self {
        added: false,
        modified: false,
        deleted: true,
    };

    /// The statement this entry turns into at commit time, if any.
    ///
    /// An entry that is still both added and deleted never reached storage
    /// and is skipped. Auditable entries never get here in that state because
    /// the interceptor clears their `deleted` flag.
    #[must_use]
    pub fn write_op(self) -> Option<WriteOp> {
        match (self.added, self.modified, self.deleted) {
            (true, _, true) => None,
            (true, _, false) => Some(WriteOp::Insert),
            (false, _, true) => Some(WriteOp::Delete),
            (false, true, false) => Some(WriteOp::Update),
            (false, false, false) => None,
        }
    }
}

/// Physical statement issued for one staged entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Insert,
    Update,
    Delete,
}

/// Outcome of writing one entry.
pub struct Written {
    pub rows: u64,
    /// The stored model (boxed `Model`) for inserts and updates.
    pub model: Option<Box<dyn Any + Send>>,
}

impl fmt::Debug for Written {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Written")
            .field("rows", &self.rows)
            .field("has_model", &self.model.is_some())
            .finish()
    }
}

/// Object-safe view of a staged active model.
#[async_trait]
pub trait TrackedEntry: Send + Sync {
    fn table_name(&self) -> String;

    /// `false` for records without audit columns (link rows).
    fn is_auditable(&self) -> bool;

    /// Current value of an audit column, `None` when not auditable.
    fn audit_value(&self, field: AuditField) -> Option<ActiveValue<Value>>;

    fn stamp_created(&mut self, now: DateTime<Utc>);

    fn stamp_updated(&mut self, now: DateTime<Utc>);

    fn mark_soft_deleted(&mut self);

    /// Issues the statement against the open transaction.
    ///
    /// # Errors
    ///
    /// Returns the storage error unchanged.
    async fn write(
        self: Box<Self>,
        op: WriteOp,
        txn: &DatabaseTransaction,
    ) -> Result<Written, DbErr>;
}

struct Tracked<A>(A);

struct Untracked<A>(A);

async fn write_active_model<A>(
    record: A,
    op: WriteOp,
    txn: &DatabaseTransaction,
) -> Result<Written, DbErr>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    match op {
        WriteOp::Insert => {
            let model = record.insert(txn).await?;
            Ok(Written {
                rows: 1,
                model: Some(Box::new(model)),
            })
        }
        WriteOp::Update => {
            let model = record.update(txn).await?;
            Ok(Written {
                rows: 1,
                model: Some(Box::new(model)),
            })
        }
        WriteOp::Delete => {
            let result = record.delete(txn).await?;
            Ok(Written {
                rows: result.rows_affected,
                model: None,
            })
        }
    }
}

#[async_trait]
impl<A> TrackedEntry for Tracked<A>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
    A::Entity: Auditable,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    fn table_name(&self) -> String {
        A::Entity::default().table_name().to_owned()
    }

    fn is_auditable(&self) -> bool {
        true
    }

    fn audit_value(&self, field: AuditField) -> Option<ActiveValue<Value>> {
        Some(self.0.get(<A::Entity as Auditable>::audit_column(field)))
    }

    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.0.set(<A::Entity as Auditable>::CREATED_AT, now.into());
        self.0.set(<A::Entity as Auditable>::UPDATED_AT, now.into());
        self.0.set(<A::Entity as Auditable>::IS_DELETED, false.into());
    }

    fn stamp_updated(&mut self, now: DateTime<Utc>) {
        let created_at = self.0.get(<A::Entity as Auditable>::CREATED_AT);
        // created_at is immutable once stored
        if created_at.is_set() {
            self.0.not_set(<A::Entity as Auditable>::CREATED_AT);
        }
        // Never stamp updated_at before the stored created_at.
        let updated_at = match created_at {
            ActiveValue::Unchanged(Value::ChronoDateTimeUtc(Some(stored))) => now.max(*stored),
            _ => now,
        };
        self.0.set(<A::Entity as Auditable>::UPDATED_AT, updated_at.into());
    }

    fn mark_soft_deleted(&mut self) {
        self.0.set(<A::Entity as Auditable>::IS_DELETED, true.into());
    }

    async fn write(
        self: Box<Self>,
        op: WriteOp,
        txn: &DatabaseTransaction,
    ) -> Result<Written, DbErr> {
        write_active_model(self.0, op, txn).await
    }
}

#[async_trait]
impl<A> TrackedEntry for Untracked<A>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    fn table_name(&self) -> String {
        A::Entity::default().table_name().to_owned()
    }

    fn is_auditable(&self) -> bool {
        false
    }

    fn audit_value(&self, _field: AuditField) -> Option<ActiveValue<Value>> {
        None
    }

    fn stamp_created(&mut self, _now: DateTime<Utc>) {}

    fn stamp_updated(&mut self, _now: DateTime<Utc>) {}

    fn mark_soft_deleted(&mut self) {}

    async fn write(
        self: Box<Self>,
        op: WriteOp,
        txn: &DatabaseTransaction,
    ) -> Result<Written, DbErr> {
        write_active_model(self.0, op, txn).await
    }
}

/// One record in a [`UnitOfWork`] together with its staging state.
pub struct StagedEntry {
    state: EntryState,
    record: Box<dyn TrackedEntry>,
}

impl StagedEntry {
    #[must_use]
    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn state_mut(&mut self) -> &mut EntryState {
        &mut self.state
    }

    #[must_use]
    pub fn record(&self) -> &dyn TrackedEntry {
        self.record.as_ref()
    }

    pub fn record_mut(&mut self) -> &mut dyn TrackedEntry {
        self.record.as_mut()
    }

    #[must_use]
    pub fn is_auditable(&self) -> bool {
        self.record.is_auditable()
    }

    pub(crate) fn into_record(self) -> Box<dyn TrackedEntry> {
        self.record
    }
}

impl fmt::Debug for StagedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedEntry")
            .field("table", &self.record.table_name())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Handle to an entry inside a [`UnitOfWork`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

/// A batch of staged mutations committed together by
/// [`Session::save_changes`](super::Session::save_changes).
///
/// Entries are written in staging order, so stage parents before children.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    entries: Vec<StagedEntry>,
}

impl UnitOfWork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an auditable record with an explicit state.
    pub fn attach<A>(&mut self, record: A, state: EntryState) -> EntryId
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
        A::Entity: Auditable,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    {
        self.push(Box::new(Tracked(record)), state)
    }

    /// Stages a new auditable record for insertion.
    pub fn add<A>(&mut self, record: A) -> EntryId
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
        A::Entity: Auditable,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    {
        self.attach(record, EntryState::ADDED)
    }

    /// Stages changes to an existing auditable record.
    pub fn update<A>(&mut self, record: A) -> EntryId
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
        A::Entity: Auditable,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    {
        self.attach(record, EntryState::MODIFIED)
    }

    /// Stages an existing auditable record for deletion. The interceptor
    /// turns this into a soft-delete.
    pub fn remove<A>(&mut self, record: A) -> EntryId
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
        A::Entity: Auditable,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    {
        self.attach(record, EntryState::DELETED)
    }

    /// Stages a record without audit columns for insertion.
    pub fn add_untracked<A>(&mut self, record: A) -> EntryId
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    {
        self.push(Box::new(Untracked(record)), EntryState::ADDED)
    }

    /// Stages a record without audit columns for physical deletion.
    pub fn remove_untracked<A>(&mut self, record: A) -> EntryId
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    {
        self.push(Box::new(Untracked(record)), EntryState::DELETED)
    }

    /// Flags an already staged entry as deleted. Returns `false` for an
    /// unknown id.
    pub fn mark_deleted(&mut self, id: EntryId) -> bool {
        match self.entries.get_mut(id.0) {
            Some(entry) => {
                entry.state.deleted = true;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn state(&self, id: EntryId) -> Option<EntryState> {
        self.entries.get(id.0).map(StagedEntry::state)
    }

    #[must_use]
    pub fn entries(&self) -> &[StagedEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [StagedEntry] {
        &mut self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<StagedEntry> {
        self.entries
    }

    fn push(&mut self, record: Box<dyn TrackedEntry>, state: EntryState) -> EntryId {
        self.entries.push(StagedEntry { state, record });
        EntryId(self.entries.len() - 1)
    }
}
