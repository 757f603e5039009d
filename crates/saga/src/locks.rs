//! Per fulfillment group serialisation.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use common::{AggregateId, ProductId};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async locks keyed by (order, product).
///
/// Reconciliation and dispatch for one fulfillment group run one at a time;
/// different groups never contend. The map only holds weak handles: a group
/// nobody holds or waits on is dropped the next time a new group is created.
#[derive(Debug, Default)]
pub(crate) struct GroupLocks {
    groups: Mutex<HashMap<(AggregateId, ProductId), Weak<Mutex<()>>>>,
}

impl GroupLocks {
    pub(crate) async fn lock(
        &self,
        order_id: AggregateId,
        product_id: &ProductId,
    ) -> OwnedMutexGuard<()> {
        let group = {
            let mut groups = self.groups.lock().await;
            let key = (order_id, product_id.clone());
            match groups.get(&key).and_then(Weak::upgrade) {
                Some(group) => group,
                None => {
                    groups.retain(|_, group| group.strong_count() > 0);
                    let group = Arc::new(Mutex::new(()));
                    groups.insert(key, Arc::downgrade(&group));
                    group
                }
            }
        };
        group.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.groups.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_group_is_exclusive() {
        let locks = GroupLocks::default();
        let order_id = AggregateId::new();
        let sku = ProductId::new("SKU-1");

        let guard = locks.lock(order_id, &sku).await;
        let second = tokio::time::timeout(Duration::from_millis(20), locks.lock(order_id, &sku));
        assert!(second.await.is_err());
        drop(guard);

        let third = tokio::time::timeout(Duration::from_millis(20), locks.lock(order_id, &sku));
        assert!(third.await.is_ok());
    }

    #[tokio::test]
    async fn different_groups_do_not_contend() {
        let locks = GroupLocks::default();
        let order_id = AggregateId::new();
        let ring = ProductId::new("SKU-1");
        let chain = ProductId::new("SKU-2");

        let _a = locks.lock(order_id, &ring).await;
        let b = tokio::time::timeout(Duration::from_millis(20), locks.lock(order_id, &chain));
        assert!(b.await.is_ok());
    }

    #[tokio::test]
    async fn released_groups_are_pruned() {
        let locks = GroupLocks::default();
        let sku = ProductId::new("SKU-1");

        for _ in 0..50 {
            let guard = locks.lock(AggregateId::new(), &sku).await;
            drop(guard);
        }
        assert_eq!(locks.tracked().await, 1);

        let held = locks.lock(AggregateId::new(), &sku).await;
        let _other = locks.lock(AggregateId::new(), &sku).await;
        assert_eq!(locks.tracked().await, 2);
        drop(held);
    }
}
