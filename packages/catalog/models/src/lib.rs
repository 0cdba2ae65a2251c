#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the grocery catalog crawl.
//!
//! The crawl is described in terms of catalog [`Section`]s (product
//! categories) and the number of result pages each one has. The planner
//! slices those pages into [`Partition`]s of [`Span`]s; each worker turns a
//! partition into a [`ResultSet`] of [`ProductRecord`]s, and the
//! reconciliation stages fold result sets into the persistent
//! [`MasterTable`].

pub mod offer;

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};

pub use offer::Offer;

/// Maximum depth of a product's category path.
pub const MAX_CATEGORY_DEPTH: usize = 4;

/// A named catalog subdivision (e.g. `"fresh-food"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Section(String);

impl Section {
    /// Creates a section from its catalog identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the catalog identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Section {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Number of result pages a section has.
pub type PageCount = u32;

/// A section together with its page count, in planning order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPages {
    /// The catalog section.
    pub section: Section,
    /// How many result pages the section has.
    pub pages: PageCount,
}

impl SectionPages {
    /// Pairs a section with its page count.
    #[must_use]
    pub fn new(section: impl Into<Section>, pages: PageCount) -> Self {
        Self {
            section: section.into(),
            pages,
        }
    }
}

impl From<String> for Section {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A span whose page range is not a valid 1-indexed ascending range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpanError {
    /// Pages are numbered from 1.
    #[error("Span over {section} starts at page 0; pages are numbered from 1")]
    ZeroStartPage {
        /// Section the span belongs to.
        section: Section,
    },

    /// The range runs backwards.
    #[error("Span over {section} is reversed (pages {start_page}-{end_page})")]
    Reversed {
        /// Section the span belongs to.
        section: Section,
        /// First page as given.
        start_page: PageCount,
        /// Last page as given.
        end_page: PageCount,
    },
}

/// An inclusive, 1-indexed range of pages within one section.
///
/// `1 <= start_page <= end_page` holds for every span that comes out of the
/// planner or through deserialization; spans are stored ascending no matter
/// which direction the planner walked the pages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSpan")]
pub struct Span {
    /// The section the pages belong to.
    pub section: Section,
    /// First page of the range (inclusive).
    pub start_page: PageCount,
    /// Last page of the range (inclusive).
    pub end_page: PageCount,
}

#[derive(Deserialize)]
struct RawSpan {
    section: Section,
    start_page: PageCount,
    end_page: PageCount,
}

impl TryFrom<RawSpan> for Span {
    type Error = SpanError;

    fn try_from(raw: RawSpan) -> Result<Self, Self::Error> {
        let span = Self::new(raw.section, raw.start_page, raw.end_page);
        span.validate()?;
        Ok(span)
    }
}

impl Span {
    /// Creates a span over `start_page..=end_page`. The range is not
    /// checked; see [`Self::validate`].
    #[must_use]
    pub const fn new(section: Section, start_page: PageCount, end_page: PageCount) -> Self {
        Self {
            section,
            start_page,
            end_page,
        }
    }

    /// Checks `1 <= start_page <= end_page`.
    ///
    /// # Errors
    ///
    /// Returns [`SpanError`] describing the first violation.
    pub fn validate(&self) -> Result<(), SpanError> {
        if self.start_page == 0 {
            return Err(SpanError::ZeroStartPage {
                section: self.section.clone(),
            });
        }
        if self.start_page > self.end_page {
            return Err(SpanError::Reversed {
                section: self.section.clone(),
                start_page: self.start_page,
                end_page: self.end_page,
            });
        }
        Ok(())
    }

    /// Number of pages covered by this span; zero for a reversed range.
    #[must_use]
    pub const fn page_count(&self) -> u32 {
        match self.end_page.checked_sub(self.start_page) {
            Some(diff) => diff.saturating_add(1),
            None => 0,
        }
    }

    /// Iterates the page numbers of this span in ascending order.
    pub fn pages(&self) -> impl Iterator<Item = PageCount> {
        self.start_page..=self.end_page
    }
}

/// One bounded unit of crawl work: an ordered list of spans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Partition {
    /// The spans to crawl, in planning order.
    pub spans: Vec<Span>,
}

impl Partition {
    /// Wraps a list of spans.
    #[must_use]
    pub const fn new(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    /// Total number of pages across all spans.
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        self.spans.iter().map(Span::page_count).sum()
    }

    /// Checks every span's page range.
    ///
    /// # Errors
    ///
    /// Returns the first [`SpanError`] found.
    pub fn validate(&self) -> Result<(), SpanError> {
        self.spans.iter().try_for_each(Span::validate)
    }
}

/// The catalog's native product identifier, stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a product id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<u64> for ProductId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// A product as extracted from a catalog listing or detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Native product identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Shelf price for one unit, if it could be extracted.
    pub price_per_unit: Option<f64>,
    /// Price per weight or quantity (e.g. per kg), if shown.
    pub price_per_weight_quant: Option<f64>,
    /// Unit label for [`Self::price_per_weight_quant`] (e.g. `"kg"`).
    pub weight_quant_unit: Option<String>,
    /// Free-text promotion shown against the product.
    pub offer: Option<String>,
    /// Category hierarchy, outermost first, at most
    /// [`MAX_CATEGORY_DEPTH`] entries.
    #[serde(default)]
    pub category_path: Vec<String>,
}

impl ProductRecord {
    /// Creates a record with only an id and name set.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price_per_unit: None,
            price_per_weight_quant: None,
            weight_quant_unit: None,
            offer: None,
            category_path: Vec::new(),
        }
    }

    /// Returns the category at `depth` (1-indexed), if present.
    #[must_use]
    pub fn category(&self, depth: usize) -> Option<&str> {
        depth
            .checked_sub(1)
            .and_then(|i| self.category_path.get(i))
            .map(String::as_str)
    }
}

/// Products keyed by id. Keys are unique; iteration is by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet(BTreeMap<ProductId, ProductRecord>);

impl ResultSet {
    /// Creates an empty result set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a record keyed by its own id, returning the record it
    /// replaced, if any.
    pub fn insert(&mut self, record: ProductRecord) -> Option<ProductRecord> {
        self.0.insert(record.id.clone(), record)
    }

    /// Removes a record by id.
    pub fn remove(&mut self, id: &ProductId) -> Option<ProductRecord> {
        self.0.remove(id)
    }

    /// Looks up a record by id.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&ProductRecord> {
        self.0.get(id)
    }

    /// Returns whether the set contains `id`.
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.0.contains_key(id)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &ProductId> {
        self.0.keys()
    }

    /// Iterates the records in id order.
    pub fn records(&self) -> impl Iterator<Item = &ProductRecord> {
        self.0.values()
    }
}

impl FromIterator<ProductRecord> for ResultSet {
    fn from_iter<T: IntoIterator<Item = ProductRecord>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<ProductRecord> for ResultSet {
    fn extend<T: IntoIterator<Item = ProductRecord>>(&mut self, iter: T) {
        for record in iter {
            self.insert(record);
        }
    }
}

impl IntoIterator for ResultSet {
    type Item = (ProductId, ProductRecord);
    type IntoIter = btree_map::IntoIter<ProductId, ProductRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// The persistent id → name index of every product ever seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MasterTable(BTreeMap<ProductId, String>);

impl MasterTable {
    /// Creates an empty master table.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts or refreshes the name for `id`.
    pub fn upsert(&mut self, id: ProductId, name: String) -> Option<String> {
        self.0.insert(id, name)
    }

    /// Removes `id`, returning its name if it was present.
    pub fn remove(&mut self, id: &ProductId) -> Option<String> {
        self.0.remove(id)
    }

    /// Returns the name recorded for `id`.
    #[must_use]
    pub fn name(&self, id: &ProductId) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    /// Whether `id` is known.
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.0.contains_key(id)
    }

    /// Number of known products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the known ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &ProductId> {
        self.0.keys()
    }
}

impl FromIterator<(ProductId, String)> for MasterTable {
    fn from_iter<T: IntoIterator<Item = (ProductId, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A bounded batch of product ids to re-fetch individually.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPartition {
    /// Ids to fetch, in ascending order.
    pub ids: Vec<ProductId>,
}
