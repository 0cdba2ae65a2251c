//! Batching missed products into retry partitions.
//!
//! Each missed id is re-fetched from its own detail page, which costs a
//! roughly fixed amount of time. Workers get a fixed time budget, so the
//! number of workers grows with the number of missed ids and each worker
//! receives an equal share.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use shelf_crawl_catalog_models::{ProductId, RetryPartition};

use crate::ReconcileError;

/// Throughput model for missed-product re-fetching.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Seconds it takes one worker to fetch one product page.
    pub seconds_per_item: f64,
    /// Minutes of work each retry worker may be given.
    pub budget_minutes: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            seconds_per_item: 13.0,
            budget_minutes: 12.5,
        }
    }
}

impl RetryPolicy {
    /// Checks both knobs are positive and finite.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::InvalidPolicy`] otherwise.
    pub fn validate(&self) -> Result<(), ReconcileError> {
        for (name, value) in [
            ("seconds_per_item", self.seconds_per_item),
            ("budget_minutes", self.budget_minutes),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ReconcileError::InvalidPolicy {
                    message: format!("{name} must be positive (got {value})"),
                });
            }
        }
        Ok(())
    }

    /// Number of workers needed to fetch `items` within the budget.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn workers_needed(&self, items: usize) -> usize {
        if items == 0 {
            return 0;
        }
        let minutes = self.seconds_per_item * items as f64 / 60.0;
        ((minutes / self.budget_minutes).ceil() as usize).max(1)
    }
}

/// Splits `missed` into contiguous, ascending chunks sized so each worker
/// finishes within the policy's time budget.
///
/// # Errors
///
/// Returns [`ReconcileError::InvalidPolicy`] if the policy is not positive.
pub fn plan_retries(
    missed: &BTreeSet<ProductId>,
    policy: &RetryPolicy,
) -> Result<Vec<RetryPartition>, ReconcileError> {
    policy.validate()?;

    if missed.is_empty() {
        return Ok(Vec::new());
    }

    let workers = policy.workers_needed(missed.len());
    let per_worker = missed.len().div_ceil(workers);
    log::info!(
        "Scheduling {} missed product(s) across {workers} worker(s), {per_worker} each",
        missed.len()
    );

    let ids: Vec<ProductId> = missed.iter().cloned().collect();
    Ok(ids
        .chunks(per_worker)
        .map(|chunk| RetryPartition {
            ids: chunk.to_vec(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(count: u64) -> BTreeSet<ProductId> {
        (0..count).map(ProductId::from).collect()
    }

    #[test]
    fn hundred_missed_items_need_two_workers_of_fifty() {
        let policy = RetryPolicy {
            seconds_per_item: 13.0,
            budget_minutes: 12.5,
        };
        let partitions = plan_retries(&ids(100), &policy).unwrap();

        assert_eq!(policy.workers_needed(100), 2);
        assert_eq!(partitions.len(), 2);
        assert!(partitions.iter().all(|p| p.ids.len() == 50));
    }

    #[test]
    fn chunks_are_sorted_and_contiguous() {
        let missed: BTreeSet<ProductId> = ["30", "10", "20"].into_iter().map(ProductId::new).collect();
        let policy = RetryPolicy {
            seconds_per_item: 60.0,
            budget_minutes: 1.0,
        };
        let partitions = plan_retries(&missed, &policy).unwrap();

        let flattened: Vec<&str> = partitions
            .iter()
            .flat_map(|p| p.ids.iter().map(ProductId::as_str))
            .collect();
        assert_eq!(flattened, vec!["10", "20", "30"]);
        assert_eq!(partitions.len(), 3);
    }

    #[test]
    fn few_missed_items_fit_one_worker() {
        let partitions = plan_retries(&ids(3), &RetryPolicy::default()).unwrap();
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].ids.len(), 3);
    }

    #[test]
    fn uneven_split_leaves_a_shorter_last_chunk() {
        // 13 * 101 / 60 / 12.5 = 1.75 -> 2 workers, ceil(101 / 2) = 51 each
        let partitions = plan_retries(&ids(101), &RetryPolicy::default()).unwrap();
        let sizes: Vec<usize> = partitions.iter().map(|p| p.ids.len()).collect();
        assert_eq!(sizes, vec![51, 50]);
    }

    #[test]
    fn nothing_missed_schedules_nothing() {
        assert!(plan_retries(&BTreeSet::new(), &RetryPolicy::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn rejects_non_positive_policy() {
        let policy = RetryPolicy {
            seconds_per_item: 0.0,
            budget_minutes: 12.5,
        };
        assert!(matches!(
            plan_retries(&ids(5), &policy),
            Err(ReconcileError::InvalidPolicy { .. })
        ));
    }
}
