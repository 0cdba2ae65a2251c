#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crawl partition planning.
//!
//! [`plan`] slices an ordered list of catalog sections into partitions of
//! page spans so that every partition except the last holds exactly
//! `pages_per_partition` pages, and every page of every section is covered
//! exactly once.
//!
//! Sections are consumed in the order given. Within a section the pages are
//! walked from the last page down to page 1; a partition closes as soon as it
//! is full, and whatever is left of the section opens the next partition. A
//! section that runs out before the partition is full leaves its span open so
//! the next section's pages are added to the same partition.

use std::collections::BTreeSet;

use shelf_crawl_catalog_models::{Partition, SectionPages, Span};

/// Errors raised for malformed planning input.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Partitions must hold at least one page.
    #[error("pages_per_partition must be at least 1 (got {0})")]
    InvalidPartitionSize(u32),

    /// A section appeared more than once in the input.
    #[error("Section '{section}' is listed more than once")]
    DuplicateSection {
        /// The repeated section name.
        section: String,
    },
}

/// Plans crawl partitions for `sections`.
///
/// Sections with zero pages contribute nothing. The last partition may hold
/// fewer than `pages_per_partition` pages.
///
/// # Errors
///
/// * [`PlanError::InvalidPartitionSize`] if `pages_per_partition` is zero
/// * [`PlanError::DuplicateSection`] if a section is listed twice
pub fn plan(
    sections: &[SectionPages],
    pages_per_partition: u32,
) -> Result<Vec<Partition>, PlanError> {
    validate(sections, pages_per_partition)?;

    let mut partitions = Vec::new();
    let mut open: Vec<Span> = Vec::new();
    let mut filled = 0u32;

    for SectionPages { section, pages } in sections {
        // Upper bound of the span currently being built for this section.
        let mut span_end = *pages;

        for page in (1..=*pages).rev() {
            filled += 1;
            if filled == pages_per_partition {
                open.push(Span::new(section.clone(), page, span_end));
                partitions.push(Partition::new(std::mem::take(&mut open)));
                filled = 0;
                span_end = page - 1;
            }
        }

        if span_end >= 1 {
            open.push(Span::new(section.clone(), 1, span_end));
        }
    }

    if !open.is_empty() {
        partitions.push(Partition::new(open));
    }

    log::debug!(
        "Planned {} partition(s) of up to {pages_per_partition} page(s) over {} section(s)",
        partitions.len(),
        sections.len()
    );

    Ok(partitions)
}

fn validate(sections: &[SectionPages], pages_per_partition: u32) -> Result<(), PlanError> {
    if pages_per_partition == 0 {
        return Err(PlanError::InvalidPartitionSize(pages_per_partition));
    }

    let mut seen = BTreeSet::new();
    for entry in sections {
        if !seen.insert(&entry.section) {
            return Err(PlanError::DuplicateSection {
                section: entry.section.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;
    use shelf_crawl_catalog_models::Section;

    use super::*;

    fn sections(input: &[(&str, u32)]) -> Vec<SectionPages> {
        input
            .iter()
            .map(|(name, pages)| SectionPages::new(*name, *pages))
            .collect()
    }

    fn span(section: &str, start: u32, end: u32) -> Span {
        Span::new(Section::new(section), start, end)
    }

    /// Asserts that every page of every section is covered exactly once.
    fn assert_covers(input: &[SectionPages], partitions: &[Partition]) {
        let mut by_section: BTreeMap<&str, Vec<(u32, u32)>> = BTreeMap::new();
        for partition in partitions {
            for s in &partition.spans {
                assert!(s.start_page >= 1 && s.start_page <= s.end_page, "{s:?}");
                by_section
                    .entry(s.section.as_str())
                    .or_default()
                    .push((s.start_page, s.end_page));
            }
        }

        for entry in input {
            let ranges = by_section.remove(entry.section.as_str()).unwrap_or_default();
            if entry.pages == 0 {
                assert!(ranges.is_empty(), "zero-page section {} emitted spans", entry.section);
                continue;
            }
            let mut ranges = ranges;
            ranges.sort_unstable();
            let mut next = 1;
            for (start, end) in ranges {
                assert_eq!(start, next, "gap or overlap in {}", entry.section);
                next = end + 1;
            }
            assert_eq!(next, entry.pages + 1, "section {} not fully covered", entry.section);
        }

        assert!(by_section.is_empty(), "spans for unknown sections: {by_section:?}");
    }

    fn assert_size_bound(partitions: &[Partition], pages_per_partition: u32) {
        let Some((last, full)) = partitions.split_last() else {
            return;
        };
        for partition in full {
            assert_eq!(partition.total_pages(), pages_per_partition);
        }
        assert!(last.total_pages() >= 1);
        assert!(last.total_pages() <= pages_per_partition);
    }

    #[test]
    fn reproduces_boundary_closing_scenario() {
        let input = sections(&[("A", 3), ("B", 2)]);
        let partitions = plan(&input, 4).unwrap();

        assert_eq!(
            partitions,
            vec![
                Partition::new(vec![span("A", 1, 3), span("B", 2, 2)]),
                Partition::new(vec![span("B", 1, 1)]),
            ]
        );
    }

    #[test]
    fn splits_a_large_section_into_descending_chunks() {
        let input = sections(&[("fresh-food", 10)]);
        let partitions = plan(&input, 4).unwrap();

        assert_eq!(
            partitions,
            vec![
                Partition::new(vec![span("fresh-food", 7, 10)]),
                Partition::new(vec![span("fresh-food", 3, 6)]),
                Partition::new(vec![span("fresh-food", 1, 2)]),
            ]
        );
    }

    #[test]
    fn exact_fit_leaves_no_trailing_partition() {
        let input = sections(&[("a", 2), ("b", 2)]);
        let partitions = plan(&input, 4).unwrap();

        assert_eq!(
            partitions,
            vec![Partition::new(vec![span("a", 1, 2), span("b", 1, 2)])]
        );
    }

    #[test]
    fn zero_page_sections_are_skipped() {
        let input = sections(&[("a", 0), ("b", 3), ("c", 0)]);
        let partitions = plan(&input, 2).unwrap();

        assert_eq!(
            partitions,
            vec![
                Partition::new(vec![span("b", 2, 3)]),
                Partition::new(vec![span("b", 1, 1)]),
            ]
        );
        assert_covers(&input, &partitions);
    }

    #[test]
    fn one_page_per_partition() {
        let input = sections(&[("a", 2), ("b", 1)]);
        let partitions = plan(&input, 1).unwrap();

        assert_eq!(
            partitions,
            vec![
                Partition::new(vec![span("a", 2, 2)]),
                Partition::new(vec![span("a", 1, 1)]),
                Partition::new(vec![span("b", 1, 1)]),
            ]
        );
    }

    #[test]
    fn empty_input_plans_nothing() {
        assert!(plan(&[], 5).unwrap().is_empty());
        assert!(plan(&sections(&[("a", 0)]), 5).unwrap().is_empty());
    }

    #[test]
    fn rejects_zero_partition_size() {
        let err = plan(&sections(&[("a", 3)]), 0).unwrap_err();
        assert!(matches!(err, PlanError::InvalidPartitionSize(0)));
    }

    #[test]
    fn rejects_duplicate_sections() {
        let err = plan(&sections(&[("a", 3), ("b", 1), ("a", 2)]), 4).unwrap_err();
        assert!(matches!(err, PlanError::DuplicateSection { section } if section == "a"));
    }

    #[test]
    fn covers_every_page_once_and_respects_size_bound() {
        let shapes: &[&[(&str, u32)]] = &[
            &[("a", 1)],
            &[("a", 7), ("b", 0), ("c", 13), ("d", 1)],
            &[("a", 48), ("b", 3), ("c", 3), ("d", 3)],
            &[("a", 5), ("b", 5), ("c", 5), ("d", 5), ("e", 5)],
            &[("a", 100), ("b", 1), ("c", 0), ("d", 99)],
        ];

        for shape in shapes {
            let input = sections(shape);
            for pages_per_partition in [1, 2, 3, 4, 7, 20, 1000] {
                let partitions = plan(&input, pages_per_partition).unwrap();
                assert_covers(&input, &partitions);
                assert_size_bound(&partitions, pages_per_partition);
            }
        }
    }

    proptest! {
        #[test]
        fn any_section_list_is_covered_within_the_size_bound(
            page_counts in prop::collection::vec(0u32..200, 0..16),
            pages_per_partition in 1u32..64,
        ) {
            let input: Vec<SectionPages> = page_counts
                .iter()
                .enumerate()
                .map(|(i, pages)| SectionPages::new(format!("section-{i}"), *pages))
                .collect();

            let partitions = plan(&input, pages_per_partition).unwrap();

            assert_covers(&input, &partitions);
            assert_size_bound(&partitions, pages_per_partition);

            let total: u32 = page_counts.iter().sum();
            prop_assert_eq!(
                partitions.len(),
                total.div_ceil(pages_per_partition) as usize
            );
        }
    }

    #[test]
    fn planning_is_deterministic() {
        let input = sections(&[("a", 17), ("b", 4), ("c", 9)]);
        let first = serde_json::to_vec(&plan(&input, 6).unwrap()).unwrap();
        let second = serde_json::to_vec(&plan(&input, 6).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn section_order_determines_boundaries() {
        let forward = plan(&sections(&[("a", 3), ("b", 2)]), 4).unwrap();
        let reverse = plan(&sections(&[("b", 2), ("a", 3)]), 4).unwrap();
        assert_ne!(forward, reverse);
        assert_eq!(
            reverse,
            vec![
                Partition::new(vec![span("b", 1, 2), span("a", 2, 3)]),
                Partition::new(vec![span("a", 1, 1)]),
            ]
        );
    }
}
