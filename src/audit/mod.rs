//! # Audit & soft-delete interception
//!
//! Records staged in a [`UnitOfWork`] pass through a [`SaveChangesInterceptor`]
//! right before [`Session`] commits them. The default [`AuditInterceptor`]
//! stamps `created_at`/`updated_at` and turns deletions of auditable records
//! into `is_deleted = true` updates.
//!
//! ```rust,ignore
//! let session = Session::new(entities::query_filters());
//!
//! let mut unit = UnitOfWork::new();
//! unit.add(author::ActiveModel { name: Set("Ursula".into()), ..ActiveModelBehavior::new() });
//! unit.remove(stale_book.into_active_model());
//! let rows = session.save_changes(&db, unit).await?;
//! ```

mod interceptor;
mod session;
mod unit_of_work;

use chrono::{DateTime, Utc};
use sea_orm::EntityTrait;
use std::fmt::Debug;

pub use interceptor::{AuditInterceptor, SaveChangesInterceptor};
pub use session::Session;
pub use unit_of_work::{EntryId, EntryState, StagedEntry, TrackedEntry, UnitOfWork, WriteOp, Written};

/// The audit columns every trackable entity carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuditField {
    CreatedAt,
    UpdatedAt,
    IsDeleted,
}

/// Capability implemented by entities subject to audit stamping and
/// soft-delete. Implement it with [`impl_auditable!`](crate::impl_auditable).
pub trait Auditable: EntityTrait {
    const CREATED_AT: Self::Column;
    const UPDATED_AT: Self::Column;
    const IS_DELETED: Self::Column;

    /// Resolves an abstract audit field to this entity's concrete column.
    #[must_use]
    fn audit_column(field: AuditField) -> Self::Column {
        match field {
            AuditField::CreatedAt => Self::CREATED_AT,
            AuditField::UpdatedAt => Self::UPDATED_AT,
            AuditField::IsDeleted => Self::IS_DELETED,
        }
    }
}

/// Implements [`Auditable`] for an entity whose audit columns are named
/// `created_at`, `updated_at` and `is_deleted`.
///
/// Usage: `impl_auditable!(Entity, Column);`
#[macro_export]
macro_rules! impl_auditable {
    ($entity:ty, $column:ident) => {
        impl $crate::audit::Auditable for $entity {
            const CREATED_AT: <$entity as $crate::sea_orm::EntityTrait>::Column = $column::CreatedAt;
            const UPDATED_AT: <$entity as $crate::sea_orm::EntityTrait>::Column = $column::UpdatedAt;
            const IS_DELETED: <$entity as $crate::sea_orm::EntityTrait>::Column = $column::IsDeleted;
        }
    };
}

/// Source of the commit timestamp.
///
/// The clock is not required to be monotonic. When it reads earlier than a
/// modified record's stored `created_at`, `updated_at` is stamped with the
/// stored `created_at` instead.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time in UTC.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant. Useful for reproducible timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
