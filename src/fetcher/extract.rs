//! Offer price extraction from search-result markup.
//!
//! Strategies are tried in a fixed priority order and the first one that
//! yields at least one price wins. If none does, the result is empty.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// Prices outside `(0, MAX_PRICE)` are treated as noise (ids, phone numbers).
pub const MAX_PRICE: f64 = 100_000.0;

/// One way of locating price text in the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Elements whose `data-testid` contains the needle.
    TestIdContains(&'static str),
    /// Elements whose `class` contains the needle (case-sensitive, like CSS).
    ClassContains(&'static str),
    /// Any currency-marked amount in the visible page text.
    BodyCurrencyText,
}

/// Priority order used by [`extract_prices`].
pub const STRATEGIES: &[Strategy] = &[
    Strategy::TestIdContains("price"),
    Strategy::TestIdContains("total"),
    Strategy::ClassContains("totalPrice"),
    Strategy::ClassContains("Price"),
    Strategy::ClassContains("price"),
    Strategy::ClassContains("amount"),
    Strategy::BodyCurrencyText,
];

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TestIdContains(needle) => write!(f, "[data-testid*=\"{needle}\"]"),
            Self::ClassContains(needle) => write!(f, "[class*=\"{needle}\"]"),
            Self::BodyCurrencyText => write!(f, "body text"),
        }
    }
}

impl Strategy {
    /// Raw price strings located by this strategy.
    fn candidates(&self, html: &str) -> Result<Vec<String>, regex::Error> {
        match self {
            Self::TestIdContains(needle) => element_texts(html, "data-testid", needle),
            Self::ClassContains(needle) => element_texts(html, "class", needle),
            Self::BodyCurrencyText => Ok(body_currency_amounts(html)),
        }
    }
}

/// Prices found on a page and the strategy that found them.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub strategy: Option<Strategy>,
    /// Distinct prices, ascending.
    pub prices: Vec<f64>,
}

/// Run the strategy chain over `html`.
pub fn extract_prices(html: &str) -> Extraction {
    for strategy in STRATEGIES {
        let candidates = match strategy.candidates(html) {
            Ok(candidates) => candidates,
            Err(e) => {
                debug!(strategy = %strategy, error = %e, "Strategy failed");
                continue;
            }
        };

        let mut prices: Vec<f64> = candidates
            .iter()
            .filter_map(|text| parse_price_text(text))
            .filter(|p| *p > 0.0 && *p < MAX_PRICE)
            .collect();
        prices.sort_by(|a, b| a.total_cmp(b));
        prices.dedup();

        if !prices.is_empty() {
            debug!(strategy = %strategy, count = prices.len(), "Prices extracted");
            return Extraction {
                strategy: Some(*strategy),
                prices,
            };
        }
        debug!(strategy = %strategy, "No prices");
    }

    Extraction {
        strategy: None,
        prices: Vec::new(),
    }
}

/// Parse the first amount in strings like `"€ 45.00"`, `"123,45 €"` or
/// `"Total: 1.234,50 EUR"`.
///
/// When both `.` and `,` appear, the later one is the decimal separator. A
/// lone separator occurring once is decimal; repeated, it groups thousands.
pub fn parse_price_text(text: &str) -> Option<f64> {
    let token = number_token_re().find(text)?.as_str();
    let token = token.trim_end_matches(&['.', ','][..]);

    let last_dot = token.rfind('.');
    let last_comma = token.rfind(',');
    let normalized = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if dot > comma => token.replace(',', ""),
        (Some(_), Some(_)) => token.replace('.', "").replace(',', "."),
        (None, Some(_)) if token.matches(',').count() == 1 => token.replace(',', "."),
        (None, Some(_)) => token.replace(',', ""),
        (Some(_), None) if token.matches('.').count() > 1 => token.replace('.', ""),
        _ => token.to_string(),
    };

    normalized.parse::<f64>().ok()
}

fn number_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d[\d.,]*").expect("static regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

fn script_style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>").expect("static regex")
    })
}

fn body_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[€£]\s*(\d[\d.,]*)|(\d[\d.,]*)\s*(?:[€£]|EUR\b)").expect("static regex")
    })
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&euro;", "€")
        .replace("&pound;", "£")
        .replace("&amp;", "&")
}

/// Visible text of `html`: scripts and styles dropped, tags replaced by spaces.
fn visible_text(html: &str) -> String {
    let without_scripts = script_style_re().replace_all(html, " ");
    let without_tags = tag_re().replace_all(&without_scripts, " ");
    decode_entities(&without_tags)
}

/// One attribute inside an opening tag. Quoted values are consumed whole, so
/// a `>` or a foreign quote inside them does not end the tag.
const TAG_ATTR: &str = r#"[^\s"'<>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'<>=`]+))?"#;

/// Text of each element whose `attr` value contains `needle`. The text runs
/// from the opening tag to the first closing tag of a non-inline element,
/// with nested tags stripped.
fn element_texts(html: &str, attr: &str, needle: &str) -> Result<Vec<String>, regex::Error> {
    let pattern = format!(
        r#"(?s)<[A-Za-z][A-Za-z0-9]*(?:\s+{any})*?\s+{attr}\s*=\s*(?:"[^"]*{needle}[^"]*"|'[^']*{needle}[^']*')(?:\s+{any})*\s*/?>((?:[^<]|<[A-Za-z][^>]*>|</(?:span|b|strong|em|sup|sub|small)\s*>)*)"#,
        any = TAG_ATTR,
        attr = regex::escape(attr),
        needle = regex::escape(needle),
    );
    let re = Regex::new(&pattern)?;
    Ok(re
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| decode_entities(tag_re().replace_all(m.as_str(), " ").trim()))
        .filter(|text| !text.trim().is_empty())
        .collect())
}

fn body_currency_amounts(html: &str) -> Vec<String> {
    let text = visible_text(html);
    body_price_re()
        .captures_iter(&text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}
