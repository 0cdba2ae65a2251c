//! Object key layout.
//!
//! ```text
//! raw_data/{date}_partition_{uuid}.json            one per scrape worker
//! intermediate_data/{datetime}_combined_data.json  one per combine
//! master_data/all_product_ids_names.json           master table
//! processed_data/{datetime}_processed_data.csv     flattened run output
//! ```

use chrono::{DateTime, Utc};

/// Prefix for per-worker result blobs.
pub const RAW_PREFIX: &str = "raw_data/";
/// Prefix for combined result blobs.
pub const INTERMEDIATE_PREFIX: &str = "intermediate_data/";
/// Prefix for processed CSV blobs.
pub const PROCESSED_PREFIX: &str = "processed_data/";
/// Key of the master id-to-name table.
pub const MASTER_KEY: &str = "master_data/all_product_ids_names.json";

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Key for a scrape worker's output. The uuid keeps concurrent workers from
/// colliding.
#[must_use]
pub fn worker_result(now: DateTime<Utc>) -> String {
    format!(
        "{RAW_PREFIX}{}_partition_{}.json",
        now.format(DATE_FORMAT),
        uuid::Uuid::new_v4().simple()
    )
}

/// Key for a combined result set.
#[must_use]
pub fn combined(now: DateTime<Utc>) -> String {
    format!(
        "{INTERMEDIATE_PREFIX}{}_combined_data.json",
        now.format(DATETIME_FORMAT)
    )
}

/// Key for the retry-stage combined result set. Kept distinct from
/// [`combined`] so both combines can run within the same second.
#[must_use]
pub fn combined_missed(now: DateTime<Utc>) -> String {
    format!(
        "{INTERMEDIATE_PREFIX}{}_combined_missed_data.json",
        now.format(DATETIME_FORMAT)
    )
}

/// Key for a processed CSV.
#[must_use]
pub fn processed(now: DateTime<Utc>) -> String {
    format!(
        "{PROCESSED_PREFIX}{}_processed_data.csv",
        now.format(DATETIME_FORMAT)
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    #[test]
    fn formats_dated_keys() {
        assert_eq!(
            combined(at()),
            "intermediate_data/2024-03-09_07-05-01_combined_data.json"
        );
        assert_eq!(
            combined_missed(at()),
            "intermediate_data/2024-03-09_07-05-01_combined_missed_data.json"
        );
        assert_eq!(
            processed(at()),
            "processed_data/2024-03-09_07-05-01_processed_data.csv"
        );
    }

    #[test]
    fn worker_keys_are_unique_per_call() {
        let a = worker_result(at());
        let b = worker_result(at());
        assert!(a.starts_with("raw_data/2024-03-09_partition_"));
        assert!(
            std::path::Path::new(&a)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        );
        assert_ne!(a, b);
    }
}
