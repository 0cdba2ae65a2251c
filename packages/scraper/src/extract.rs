//! HTML extraction for landing, section, listing, and product pages.
//!
//! Missing optional fields (prices, offers, categories) become `None`
//! rather than errors; only a tile without a name or id is skipped.

use std::collections::BTreeSet;

use scraper::{ElementRef, Html, Selector};
use shelf_crawl_catalog_models::offer::parse_currency;
use shelf_crawl_catalog_models::{MAX_CATEGORY_DEPTH, ProductId, ProductRecord, Section};

use crate::FetchError;
use crate::selectors::{SelectorConfig, parse_selector};

/// Marker preceding the shelf URL inside a product page's redux state.
const SHELF_URL_MARKER: &str = "\"restOfShelfUrl\":";
/// Key that follows the shelf URL inside the redux state.
const SHELF_URL_END: &str = "\"template\"";
/// Characters stripped from category segments taken from the redux state.
const CATEGORY_NOISE: &[char] = &['\'', '+', ',', '"'];

/// Extracts section names from the landing page.
///
/// Keeps links under `shop_path`, takes the last path segment without its
/// query, and drops empty names, inspiration pages, excluded names, and
/// repeats.
///
/// # Errors
///
/// Returns [`FetchError::Selector`] only if the built-in link selector fails
/// to parse.
pub fn sections(html: &str, shop_path: &str, excluded: &[String]) -> Result<Vec<Section>, FetchError> {
    let document = Html::parse_document(html);
    let link_sel = parse_selector("a[href]")?;

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();

    for link in document.select(&link_sel) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some((_, rest)) = href.split_once(shop_path) else {
            continue;
        };

        let path = rest.split('?').next().unwrap_or("").trim_end_matches('/');
        let name = path.rsplit('/').next().unwrap_or("");

        if name.is_empty() || name.contains("inspiration") || excluded.iter().any(|e| e == name) {
            continue;
        }
        if seen.insert(name.to_owned()) {
            out.push(Section::new(name));
        }
    }

    Ok(out)
}

/// Reads the total item count from a section page.
///
/// Takes the last number in the "items displayed" text, so "Showing 1 to
/// 48 of 1,234 items" yields 1234.
///
/// # Errors
///
/// Returns [`FetchError::Parse`] if the element or a number is missing.
pub fn item_count(html: &str, selectors: &SelectorConfig) -> Result<u64, FetchError> {
    let document = Html::parse_document(html);
    let sel = parse_selector(&selectors.items_displayed)?;

    let text = document
        .select(&sel)
        .next()
        .map(text_of)
        .ok_or_else(|| {
            FetchError::Parse(format!(
                "no element matching '{}' found in section page",
                selectors.items_displayed
            ))
        })?;

    text.split_whitespace()
        .filter_map(|token| token.replace(',', "").parse::<u64>().ok())
        .last()
        .ok_or_else(|| FetchError::Parse(format!("no item count in '{text}'")))
}

/// Extracts every product tile from a listing page.
///
/// # Errors
///
/// Returns [`FetchError::Selector`] if a configured selector is invalid.
pub fn listing(
    html: &str,
    selectors: &SelectorConfig,
    shop_path: &str,
) -> Result<Vec<ProductRecord>, FetchError> {
    let document = Html::parse_document(html);
    let item_sel = parse_selector(&selectors.listing_item)?;
    let name_sel = parse_selector(&selectors.listing_name)?;
    let id_sel = parse_selector(&selectors.listing_id)?;
    let price_sel = parse_selector(&selectors.listing_price)?;
    let unit_price_sel = parse_selector(&selectors.listing_unit_price)?;
    let offer_sel = parse_selector(&selectors.listing_offer)?;
    let category_sel = parse_selector(&selectors.listing_category_link)?;

    let mut records = Vec::new();

    for tile in document.select(&item_sel) {
        let name = tile.select(&name_sel).next().map(text_of);
        let id = tile
            .select(&id_sel)
            .next()
            .and_then(|el| el.value().attr("data-auto-id"))
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let (Some(name), Some(id)) = (name.filter(|n| !n.is_empty()), id) else {
            log::debug!("Skipping product tile without a name or id");
            continue;
        };

        let mut record = ProductRecord::new(ProductId::new(id), name);
        record.price_per_unit = tile.select(&price_sel).next().and_then(|el| parse_price(&text_of(el)));

        if let Some(subtext) = tile.select(&unit_price_sel).next().map(text_of) {
            let (price, unit) = split_unit_price(&subtext);
            record.price_per_weight_quant = price;
            record.weight_quant_unit = unit;
        }

        record.offer = tile
            .select(&offer_sel)
            .next()
            .map(text_of)
            .filter(|o| !o.is_empty());

        // The last shop link wins; tiles sometimes carry several.
        if let Some(path) = tile
            .select(&category_sel)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| category_path(href, shop_path))
            .last()
        {
            record.category_path = path;
        }

        records.push(record);
    }

    Ok(records)
}

/// Extracts a product detail page. `None` means the page has no product
/// name, which marks the product as dead.
///
/// # Errors
///
/// Returns [`FetchError::Selector`] if a configured selector is invalid.
pub fn detail(
    html: &str,
    id: &ProductId,
    selectors: &SelectorConfig,
    shop_path: &str,
) -> Result<Option<ProductRecord>, FetchError> {
    let document = Html::parse_document(html);
    let title_sel = parse_selector(&selectors.detail_title)?;
    let price_sel = parse_selector(&selectors.detail_price)?;
    let unit_price_sel = parse_selector(&selectors.detail_unit_price)?;
    let unit_sel = parse_selector(&selectors.detail_unit)?;
    let offer_sel = parse_selector(&selectors.detail_offer)?;
    let state_sel = parse_selector(&selectors.detail_state)?;

    let Some(name) = document
        .select(&title_sel)
        .next()
        .map(text_of)
        .filter(|n| !n.is_empty())
    else {
        return Ok(None);
    };

    let mut record = ProductRecord::new(id.clone(), name);
    let first_text = |sel: &Selector| document.select(sel).next().map(text_of);

    record.price_per_unit = first_text(&price_sel).and_then(|t| parse_price(&t));
    record.price_per_weight_quant = first_text(&unit_price_sel).and_then(|t| parse_price(&t));
    record.weight_quant_unit = first_text(&unit_sel)
        .and_then(|t| t.rsplit('/').next().map(|u| u.trim().to_owned()))
        .filter(|u| !u.is_empty());
    record.offer = first_text(&offer_sel).filter(|o| !o.is_empty());

    if let Some(state) = document
        .select(&state_sel)
        .next()
        .and_then(|el| el.value().attr("data-redux-state"))
        && let Some(path) = shelf_url(state).and_then(|url| category_path(&url, shop_path))
    {
        record.category_path = path;
    }

    Ok(Some(record))
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_owned()
}

/// Parses `£1,250.00`, `85p`, or a bare `1.50`.
fn parse_price(text: &str) -> Option<f64> {
    let text = text.trim();
    parse_currency(text).or_else(|| text.replace(',', "").parse::<f64>().ok())
}

/// Splits `£0.66/litre` into its price and unit.
fn split_unit_price(text: &str) -> (Option<f64>, Option<String>) {
    let Some((price, unit)) = text.split_once('/') else {
        return (parse_price(text), None);
    };
    let unit = unit.rsplit('/').next().unwrap_or(unit).trim();
    (
        parse_price(price),
        Some(unit.to_owned()).filter(|u| !u.is_empty()),
    )
}

/// Path segments after `shop_path`, capped at the category depth.
fn category_path(href: &str, shop_path: &str) -> Option<Vec<String>> {
    let (_, rest) = href.split_once(shop_path)?;
    let rest = rest.split('?').next().unwrap_or(rest);
    let segments: Vec<String> = rest
        .split('/')
        .map(|s| s.trim_matches(CATEGORY_NOISE).to_owned())
        .filter(|s| !s.is_empty())
        .take(MAX_CATEGORY_DEPTH)
        .collect();
    (!segments.is_empty()).then_some(segments)
}

/// Pulls the shelf URL out of a product page's serialized redux state.
fn shelf_url(state: &str) -> Option<String> {
    let start = state.find(SHELF_URL_MARKER)? + SHELF_URL_MARKER.len();
    let rest = &state[start..];
    let end = rest.find(SHELF_URL_END).unwrap_or(rest.len());
    let url = rest[..end].trim().trim_end_matches(',').trim_matches('"');
    (!url.is_empty()).then(|| url.to_owned())
}
