//! # Global query filters
//!
//! A [`CapabilityFilter`] is a predicate written once against an abstract
//! [`AuditField`]. [`ModelBuilder`] binds every applied filter to the concrete
//! `(table, column)` of every registered [`Auditable`] entity and freezes the
//! result into an immutable [`QueryFilters`] registry.
//!
//! ```rust,ignore
//! let filters = ModelBuilder::new()
//!     .entity::<book::Entity>()
//!     .entity::<author::Entity>()
//!     .apply_global_filter(CapabilityFilter::soft_delete())
//!     .build();
//!
//! // SELECT ... FROM "books" WHERE "books"."is_deleted" = FALSE
//! let books = filters.find::<book::Entity>().all(&db).await?;
//! ```

use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, Select};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::audit::{AuditField, Auditable};

/// A boolean predicate over one audit field, reusable across entity types.
#[derive(Clone, Copy)]
pub struct CapabilityFilter {
    name: &'static str,
    field: AuditField,
    predicate: fn(Expr) -> SimpleExpr,
}

impl CapabilityFilter {
    /// Filters are keyed by `name`: applying a second filter with the same
    /// name replaces the first.
    #[must_use]
    pub const fn new(name: &'static str, field: AuditField, predicate: fn(Expr) -> SimpleExpr) -> Self {
        Self {
            name,
            field,
            predicate,
        }
    }

    /// `is_deleted = false`
    #[must_use]
    pub fn soft_delete() -> Self {
        Self::new("soft_delete", AuditField::IsDeleted, |column| column.eq(false))
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn field(&self) -> AuditField {
        self.field
    }

    /// Rewrites the predicate against `E`'s concrete column.
    #[must_use]
    pub fn bind<E: Auditable>(&self) -> SimpleExpr {
        let column = Expr::col((E::default(), E::audit_column(self.field)));
        (self.predicate)(column)
    }
}

impl fmt::Debug for CapabilityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityFilter")
            .field("name", &self.name)
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

fn table_of<E: EntityTrait>() -> String {
    E::default().table_name().to_owned()
}

struct EntityTarget {
    table: String,
    bind: fn(&CapabilityFilter) -> SimpleExpr,
}

fn bind_target<E: Auditable>(filter: &CapabilityFilter) -> SimpleExpr {
    filter.bind::<E>()
}

/// Start-up registration of auditable entities and global filters.
#[derive(Default)]
pub struct ModelBuilder {
    entities: Vec<EntityTarget>,
    filters: Vec<CapabilityFilter>,
}

impl ModelBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity that implements the audit capability. Registering
    /// the same entity twice has no effect.
    #[must_use]
    pub fn entity<E: Auditable>(mut self) -> Self {
        let table = table_of::<E>();
        if !self.entities.iter().any(|target| target.table == table) {
            self.entities.push(EntityTarget {
                table,
                bind: bind_target::<E>,
            });
        }
        self
    }

    /// Applies `filter` to every registered entity, including ones
    /// registered after this call.
    #[must_use]
    pub fn apply_global_filter(mut self, filter: CapabilityFilter) -> Self {
        match self
            .filters
            .iter_mut()
            .find(|applied| applied.name == filter.name)
        {
            Some(applied) => *applied = filter,
            None => self.filters.push(filter),
        }
        self
    }

    /// Binds every filter to every entity.
    #[must_use]
    pub fn build(self) -> QueryFilters {
        let mut by_table: HashMap<String, BTreeMap<&'static str, SimpleExpr>> = HashMap::new();
        for target in &self.entities {
            let bound = by_table.entry(target.table.clone()).or_default();
            for filter in &self.filters {
                tracing::debug!(table = %target.table, filter = filter.name, "Binding query filter");
                bound.insert(filter.name, (target.bind)(filter));
            }
        }
        QueryFilters { by_table }
    }
}

impl fmt::Debug for ModelBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBuilder")
            .field(
                "entities",
                &self.entities.iter().map(|target| &target.table).collect::<Vec<_>>(),
            )
            .field("filters", &self.filters)
            .finish()
    }
}

/// Immutable per-table filter registry, built once by [`ModelBuilder`].
#[derive(Clone, Debug, Default)]
pub struct QueryFilters {
    by_table: HashMap<String, BTreeMap<&'static str, SimpleExpr>>,
}

impl QueryFilters {
    /// All filters bound to `E`, combined with AND. Empty when `E` has none.
    #[must_use]
    pub fn condition_for<E: EntityTrait>(&self) -> Condition {
        self.by_table
            .get(&table_of::<E>())
            .into_iter()
            .flat_map(BTreeMap::values)
            .fold(Condition::all(), |condition, expr| condition.add(expr.clone()))
    }

    #[must_use]
    pub fn filter_names<E: EntityTrait>(&self) -> Vec<&'static str> {
        self.by_table
            .get(&table_of::<E>())
            .map(|bound| bound.keys().copied().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_filters<E: EntityTrait>(&self) -> bool {
        self.by_table
            .get(&table_of::<E>())
            .is_some_and(|bound| !bound.is_empty())
    }

    /// Total number of effective (table, filter) pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_table.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `E::find()` with every filter for `E` applied.
    #[must_use]
    pub fn find<E: EntityTrait>(&self) -> Select<E> {
        self.visible(E::find())
    }

    /// Applies `E`'s filters to an existing query.
    #[must_use]
    pub fn visible<E: EntityTrait>(&self, select: Select<E>) -> Select<E> {
        if self.has_filters::<E>() {
            select.filter(self.condition_for::<E>())
        } else {
            select
        }
    }

    /// Bypasses every registered filter.
    #[must_use]
    pub fn find_ignoring_filters<E: EntityTrait>(&self) -> Select<E> {
        E::find()
    }

    /// Only rows hidden by the soft-delete filter.
    #[must_use]
    pub fn find_soft_deleted<E: Auditable>(&self) -> Select<E> {
        E::find().filter(E::IS_DELETED.eq(true))
    }
}
