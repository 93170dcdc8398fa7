//! Quota usage accounting.

use super::runner::Reconciler;
use crate::core::error::PlaneResult;
use crate::store::quota::{quota_status, resource_quotas};
use crate::store::ObjectStore;

/// Recomputes the `used` status of every quota object, per tenant.
pub struct QuotaReconciler;

impl Reconciler for QuotaReconciler {
    fn reconcile(&self, store: &ObjectStore) -> PlaneResult<usize> {
        let mut changed = 0;
        for quota in store.list_all(&resource_quotas()) {
            let status = quota_status(store, &quota);
            if status == quota.status {
                continue;
            }
            store.update_status(&quota.key(), status)?;
            changed += 1;
        }
        Ok(changed)
    }
}
