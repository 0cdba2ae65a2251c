//! Combining worker result sets.

use shelf_crawl_catalog_models::ResultSet;

/// Merges result sets in order; on an id collision the later set wins.
///
/// Within one run no two partitions should return the same product, so
/// collisions are logged rather than treated as errors.
pub fn merge<I>(result_sets: I) -> ResultSet
where
    I: IntoIterator<Item = ResultSet>,
{
    let mut combined = ResultSet::new();
    let mut sources = 0usize;
    let mut collisions = 0usize;

    for set in result_sets {
        sources += 1;
        for (id, record) in set {
            if combined.insert(record).is_some() {
                log::warn!("Product {id} returned by more than one partition; keeping the later one");
                collisions += 1;
            }
        }
    }

    log::info!(
        "Merged {sources} result set(s) into {} product(s) ({collisions} collision(s))",
        combined.len()
    );

    combined
}

#[cfg(test)]
mod tests {
    use shelf_crawl_catalog_models::{ProductId, ProductRecord};

    use super::*;

    fn set(records: &[(&str, &str)]) -> ResultSet {
        records
            .iter()
            .map(|(id, name)| ProductRecord::new(*id, *name))
            .collect()
    }

    #[test]
    fn merging_a_single_set_is_identity() {
        let only = set(&[("1", "Milk"), ("2", "Bread")]);
        assert_eq!(merge([only.clone()]), only);
    }

    #[test]
    fn merging_nothing_is_empty() {
        assert!(merge(Vec::<ResultSet>::new()).is_empty());
    }

    #[test]
    fn disjoint_sets_union() {
        let merged = merge([set(&[("1", "Milk")]), set(&[("2", "Bread")])]);
        assert_eq!(merged, set(&[("1", "Milk"), ("2", "Bread")]));
    }

    #[test]
    fn later_set_wins_on_collision() {
        let merged = merge([
            set(&[("1", "Milk"), ("2", "Bread")]),
            set(&[("2", "Wholemeal Bread"), ("3", "Eggs")]),
        ]);

        assert_eq!(merged.len(), 3);
        assert_eq!(
            merged.get(&ProductId::new("2")).map(|r| r.name.as_str()),
            Some("Wholemeal Bread")
        );
        assert_eq!(
            merged.get(&ProductId::new("1")).map(|r| r.name.as_str()),
            Some("Milk")
        );
    }
}
