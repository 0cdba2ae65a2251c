//! CSS selectors for the catalog's markup.
//!
//! Stored as strings so they can be overridden from config without a
//! rebuild. They are compiled per page, which keeps parsed selectors off
//! the async call stack.

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::FetchError;

/// Selectors for listing pages, section pages, and product pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Text like "Showing 1 to 48 of 1,234 items" on a section page.
    pub items_displayed: String,
    /// One product tile on a listing page.
    pub listing_item: String,
    /// Product name inside a tile.
    pub listing_name: String,
    /// Element carrying the product id in its `data-auto-id` attribute.
    pub listing_id: String,
    /// Unit price inside a tile.
    pub listing_price: String,
    /// "price/unit" subtext inside a tile.
    pub listing_unit_price: String,
    /// Promotion text inside a tile.
    pub listing_offer: String,
    /// Links whose path encodes the product's category.
    pub listing_category_link: String,
    /// Product name on a detail page. Its absence marks a dead product.
    pub detail_title: String,
    /// Unit price on a detail page.
    pub detail_price: String,
    /// Price per weight or quantity on a detail page.
    pub detail_unit_price: String,
    /// Weight or quantity unit on a detail page.
    pub detail_unit: String,
    /// Promotion text on a detail page.
    pub detail_offer: String,
    /// Element whose `data-redux-state` holds the category path.
    pub detail_state: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            items_displayed: ".pagination__items-displayed".to_owned(),
            listing_item: "li.product-list--list-item".to_owned(),
            listing_name: ".beans-link__text".to_owned(),
            listing_id: "[data-auto-id]".to_owned(),
            listing_price: ".beans-price__text".to_owned(),
            listing_unit_price: ".beans-price__subtext".to_owned(),
            listing_offer: ".offer-text".to_owned(),
            listing_category_link: "a.beans-link__anchor".to_owned(),
            detail_title: "h1.product-details-tile__title".to_owned(),
            detail_price: ".price-per-sellable-unit .value".to_owned(),
            detail_unit_price: ".price-per-quantity-weight .value".to_owned(),
            detail_unit: ".price-per-quantity-weight .weight".to_owned(),
            detail_offer: "li.product-promotion .offer-text".to_owned(),
            detail_state: "body[data-app-name='prd']".to_owned(),
        }
    }
}

impl SelectorConfig {
    /// Checks every selector parses.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Selector`] for the first invalid one.
    pub fn validate(&self) -> Result<(), FetchError> {
        for selector in [
            &self.items_displayed,
            &self.listing_item,
            &self.listing_name,
            &self.listing_id,
            &self.listing_price,
            &self.listing_unit_price,
            &self.listing_offer,
            &self.listing_category_link,
            &self.detail_title,
            &self.detail_price,
            &self.detail_unit_price,
            &self.detail_unit,
            &self.detail_offer,
            &self.detail_state,
        ] {
            parse_selector(selector)?;
        }
        Ok(())
    }
}

/// Parses a CSS selector string, returning a [`FetchError`] on failure.
///
/// # Errors
///
/// Returns [`FetchError::Selector`] if `selector` is not valid CSS.
pub fn parse_selector(selector: &str) -> Result<Selector, FetchError> {
    Selector::parse(selector).map_err(|e| FetchError::Selector {
        selector: selector.to_owned(),
        message: e.to_string(),
    })
}
