#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reconciliation of crawl results against the persistent master table.
//!
//! | Step | Function |
//! |------|----------|
//! | Combine worker outputs | [`merge::merge`] |
//! | Fold a run into the master table | [`master::reconcile`] |
//! | Batch missed ids for re-fetching | [`retry::plan_retries`] |
//! | Drop dead products | [`prune::prune_dead`] |

pub mod master;
pub mod merge;
pub mod prune;
pub mod retry;

pub use master::{DEFAULT_MAX_MISSED_FRACTION, Reconciliation, reconcile};
pub use merge::merge;
pub use prune::{PruneStats, prune_dead};
pub use retry::{RetryPolicy, plan_retries};

/// Errors that abort a reconciliation step.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Too many known products went missing for this to be isolated dead
    /// listings; the crawl itself most likely failed.
    #[error(
        "Reconciliation anomaly: {missed} of {total} known products were missed \
         (threshold {threshold:.2} = {max_fraction} x master size)"
    )]
    Anomaly {
        /// Number of ids in the master table the run did not find.
        missed: usize,
        /// Size of the updated master table.
        total: usize,
        /// Largest missed count that would have been accepted.
        threshold: f64,
        /// The configured maximum missed fraction.
        max_fraction: f64,
    },

    /// The retry throughput model was configured with a non-positive value.
    #[error("Invalid retry policy: {message}")]
    InvalidPolicy {
        /// What is wrong with the policy.
        message: String,
    },
}
