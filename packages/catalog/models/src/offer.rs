//! Structured parsing of promotion text.
//!
//! Listings show promotions as free text. Loyalty-card prices take the form
//! `"<price> Clubcard Price"` or `"<price> with Clubcard"`, where the price is
//! either pounds (`£1.25`) or pence (`85p`). Anything else is kept verbatim
//! as a non-clubcard offer.

/// A promotion attached to a product.
#[derive(Debug, Clone, PartialEq)]
pub enum Offer {
    /// No promotion text at all.
    None,
    /// A promotion that does not carry a loyalty-card unit price.
    Other(String),
    /// A loyalty-card unit price, in pounds.
    Clubcard {
        /// Unit price with the card.
        price: f64,
    },
}

impl Offer {
    /// Parses optional promotion text.
    #[must_use]
    pub fn parse(text: Option<&str>) -> Self {
        let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
            return Self::None;
        };

        let tokens: Vec<&str> = text.split_whitespace().collect();
        if let [price, rest @ ..] = tokens.as_slice()
            && rest.len() == 2
            && rest.iter().any(|t| t.eq_ignore_ascii_case("clubcard"))
            && let Some(price) = parse_currency(price)
        {
            return Self::Clubcard { price };
        }

        Self::Other(text.to_string())
    }

    /// Returns the loyalty-card price, if this is a clubcard offer.
    #[must_use]
    pub const fn clubcard_price(&self) -> Option<f64> {
        match self {
            Self::Clubcard { price } => Some(*price),
            Self::None | Self::Other(_) => None,
        }
    }
}

/// Parses `£1.50` (pounds) or `75p` (pence) into pounds.
#[must_use]
pub fn parse_currency(token: &str) -> Option<f64> {
    if let Some(pounds) = token.strip_prefix('£') {
        return pounds.replace(',', "").parse::<f64>().ok();
    }
    if let Some(pence) = token.strip_suffix('p') {
        return pence.parse::<f64>().ok().map(|p| p / 100.0);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_text_is_no_offer() {
        assert_eq!(Offer::parse(None), Offer::None);
        assert_eq!(Offer::parse(Some("   ")), Offer::None);
    }

    #[test]
    fn parses_pound_clubcard_price() {
        let offer = Offer::parse(Some("£1.50 Clubcard Price"));
        assert_eq!(offer, Offer::Clubcard { price: 1.5 });
    }

    #[test]
    fn parses_pence_clubcard_price() {
        let offer = Offer::parse(Some("75p with Clubcard"));
        let price = offer.clubcard_price().unwrap();
        assert!((price - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn multi_buy_is_other_offer() {
        let offer = Offer::parse(Some("Any 3 for £10 Clubcard Price"));
        assert_eq!(
            offer,
            Offer::Other("Any 3 for £10 Clubcard Price".to_string())
        );
        assert_eq!(offer.clubcard_price(), None);
    }

    #[test]
    fn three_words_without_clubcard_is_other() {
        let offer = Offer::parse(Some("£1 Half Price"));
        assert!(matches!(offer, Offer::Other(_)));
    }

    #[test]
    fn unparseable_price_is_other() {
        let offer = Offer::parse(Some("Great Clubcard Price"));
        assert!(matches!(offer, Offer::Other(_)));
    }
}
