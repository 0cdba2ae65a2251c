//! Removing dead products.
//!
//! A product whose detail page no longer yields a name is treated as
//! retired: it is dropped from the master table and from the run's results
//! for good, and is not queued for another retry.

use std::collections::BTreeSet;

use shelf_crawl_catalog_models::{MasterTable, ProductId, ResultSet};

/// Counts of what [`prune_dead`] removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneStats {
    /// Ids removed from the master table.
    pub from_master: usize,
    /// Ids removed from the run's results.
    pub from_results: usize,
}

impl std::fmt::Display for PruneStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} removed from master, {} removed from results",
            self.from_master, self.from_results
        )
    }
}

/// Drops every id in `dead` from `master` and `results`.
pub fn prune_dead(
    master: &mut MasterTable,
    results: &mut ResultSet,
    dead: &BTreeSet<ProductId>,
) -> PruneStats {
    let mut stats = PruneStats::default();

    for id in dead {
        if let Some(name) = master.remove(id) {
            log::warn!("Product {id} ({name}) no longer resolves; removing from master table");
            stats.from_master += 1;
        }
        if results.remove(id).is_some() {
            stats.from_results += 1;
        }
    }

    if !dead.is_empty() {
        log::info!("Pruned {} dead product(s): {stats}", dead.len());
    }

    stats
}
