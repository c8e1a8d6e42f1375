use chrono::{DateTime, Utc};
use std::fmt::Debug;

use super::StagedEntry;

/// Hook invoked on the whole change set right before it is written.
///
/// Implementations mutate entries in memory only; nothing is persisted until
/// the session opens its transaction afterwards.
pub trait SaveChangesInterceptor: Send + Sync + Debug {
    fn saving_changes(&self, entries: &mut [StagedEntry], now: DateTime<Utc>);
}

/// Stamps audit timestamps and converts deletions of auditable records into
/// soft-deletes.
///
/// Per entry, in order:
/// 1. added: `created_at = updated_at = now`, `is_deleted = false`
/// 2. modified: `updated_at = now`
/// 3. deleted: `is_deleted = true`, the delete becomes an update (or stays an
///    insert for an entry that was also added)
///
/// Entries without audit columns pass through untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuditInterceptor;

impl SaveChangesInterceptor for AuditInterceptor {
    fn saving_changes(&self, entries: &mut [StagedEntry], now: DateTime<Utc>) {
        for entry in entries.iter_mut().filter(|entry| entry.is_auditable()) {
            let state = entry.state();

            if state.added {
                entry.record_mut().stamp_created(now);
            }

            if state.modified {
                entry.record_mut().stamp_updated(now);
            }

            if state.deleted {
                entry.record_mut().mark_soft_deleted();
                let converted = entry.state_mut();
                converted.deleted = false;
                converted.modified = !state.added;
            }
        }
    }
}
