//! Ordering properties of the priority queue and retry policy

use std::time::Duration;

use proptest::prelude::*;
use uuid::Uuid;

use txn_engine::core::{PriorityWorkQueue, RetryDecision, RetryPolicy, WorkItem, WorkStatus};

fn drain(q: &PriorityWorkQueue) -> Vec<WorkItem> {
    std::iter::from_fn(|| q.try_take()).collect()
}

proptest! {
    #[test]
    fn prop_dequeue_order_is_amount_desc_then_oldest(
        entries in prop::collection::vec((1u32..50, 0u64..20), 1..64)
    ) {
        let q = PriorityWorkQueue::new("prop");
        for (amount, created) in &entries {
            let item = WorkItem::restore(
                Uuid::new_v4(),
                f64::from(*amount),
                u128::from(*created),
                WorkStatus::New,
                0,
            ).unwrap();
            q.put(item);
        }

        let out = drain(&q);
        prop_assert_eq!(out.len(), entries.len());
        for pair in out.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.amount() >= b.amount());
            if a.amount() == b.amount() {
                prop_assert!(a.created_at_ms() <= b.created_at_ms());
            }
        }
    }

    #[test]
    fn prop_retry_count_bounded(max_retry in 0u32..10, start in 0u32..10) {
        let policy = RetryPolicy::new(max_retry, Duration::ZERO);
        let mut count = start.min(max_retry);
        let mut attempts = 0;
        while let RetryDecision::Requeue { next_retry_count } = policy.decide(count) {
            prop_assert_eq!(next_retry_count, count + 1);
            count = next_retry_count;
            attempts += 1;
        }
        prop_assert_eq!(count, max_retry);
        prop_assert!(attempts <= max_retry);
    }
}

#[test]
fn test_recovered_and_fresh_items_interleave_by_amount() {
    let q = PriorityWorkQueue::new("mixed");
    let old = WorkItem::restore(Uuid::new_v4(), 300.0, 1, WorkStatus::New, 2).unwrap();
    let fresh = WorkItem::new(300.0).unwrap();
    let big = WorkItem::new(900.0).unwrap();
    q.put(fresh.clone());
    q.put(old.clone());
    q.put(big.clone());

    let ids: Vec<_> = drain(&q).iter().map(WorkItem::id).collect();
    assert_eq!(ids, vec![big.id(), old.id(), fresh.id()]);
}
