//! Folding a run's results into the master id → name table.

use std::collections::BTreeSet;

use shelf_crawl_catalog_models::{MasterTable, ProductId, ResultSet};

use crate::ReconcileError;

/// Largest fraction of the master table that may go missing in one run
/// before the run is treated as a systemic failure.
pub const DEFAULT_MAX_MISSED_FRACTION: f64 = 0.333;

/// Outcome of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The master table with every product from the run upserted.
    pub master: MasterTable,
    /// Ids known to the master table that the run did not return.
    pub missed: BTreeSet<ProductId>,
    /// Number of ids the run added to the master table.
    pub added: usize,
}

/// Reconciles `results` against `master`.
///
/// `master` is `None` on the very first run, in which case the master table
/// is built from the results and nothing counts as missed.
///
/// # Errors
///
/// Returns [`ReconcileError::Anomaly`] if more than `max_missed_fraction`
/// of the updated master table was missed. Nothing is returned for the
/// caller to persist in that case.
#[allow(clippy::cast_precision_loss)]
pub fn reconcile(
    master: Option<MasterTable>,
    results: &ResultSet,
    max_missed_fraction: f64,
) -> Result<Reconciliation, ReconcileError> {
    let Some(mut master) = master else {
        log::info!(
            "No master table yet; creating one from {} scraped product(s)",
            results.len()
        );
        let master = results
            .records()
            .map(|r| (r.id.clone(), r.name.clone()))
            .collect();
        return Ok(Reconciliation {
            master,
            missed: BTreeSet::new(),
            added: results.len(),
        });
    };

    log::info!("Master table holds {} product(s)", master.len());

    let missed: BTreeSet<ProductId> = master
        .ids()
        .filter(|id| !results.contains(id))
        .cloned()
        .collect();
    log::info!("{} known product(s) missing from this run", missed.len());

    let before = master.len();
    for record in results.records() {
        master.upsert(record.id.clone(), record.name.clone());
    }
    let added = master.len() - before;
    log::info!(
        "Master table now holds {} product(s) ({added} new)",
        master.len()
    );

    let threshold = max_missed_fraction * master.len() as f64;
    if missed.len() as f64 > threshold {
        log::error!(
            "Missed {} of {} products, above threshold {threshold:.2}",
            missed.len(),
            master.len()
        );
        return Err(ReconcileError::Anomaly {
            missed: missed.len(),
            total: master.len(),
            threshold,
            max_fraction: max_missed_fraction,
        });
    }

    Ok(Reconciliation {
        master,
        missed,
        added,
    })
}
