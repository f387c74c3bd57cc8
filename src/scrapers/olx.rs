use crate::error::ExtractError;
use crate::models::{
    truncate_with_ellipsis, Listing, LOCATION_PLACEHOLDER, PRICE_PLACEHOLDER, TITLE_PLACEHOLDER,
};
use crate::scrapers::strategy::{first_hit, Card, Probe, Scope};
use crate::scrapers::types::ExtractConfig;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Titles longer than this are cut and end with an ellipsis
pub const TITLE_MAX_CHARS: usize = 120;

const LOCATION_MAX_CHARS: usize = 100;

/// How many ancestors of an anchor may be searched for its card markup
const CONTAINER_DEPTH: usize = 4;

/// Punctuation kept in titles besides letters, digits and spaces
const TITLE_PUNCTUATION: &str = "-.,:;!?()/+&%'\"#";

/// `-ID<token>.html`, the id suffix of current detail URLs
static SLUG_DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-ID([A-Za-z0-9]+)\.html").expect("valid slug-digits regex"));

/// A number followed by a currency marker. Separators are only accepted in
/// front of three-digit groups, so `iPhone 13 1200 zł` yields `1200 zł`.
static PRICE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:[\s.]\d{3})*(?:,\d+)?\s*(?:zł|pln|eur|€|\$|usd))")
        .expect("valid price token regex")
});

/// A number with an optional currency marker
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:[\s.]\d{3})*(?:,\d+)?)(?:\s*(zł|pln|eur|€|\$|usd))?")
        .expect("valid amount regex")
});

/// `Place - Dzisiaj o 10:32`, `Place, District - 12 maja 2025` and similar
static LOCATION_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(\p{Lu}[\p{L}'\-]*(?:,?\s+\p{L}[\p{L}'\-]*)*)\s+-\s+(?:Dzisiaj|Wczoraj|Odświeżono|\d{1,2}\.\d{1,2}\.\d{4}|\d{1,2}\s+\p{L}+\s+\d{4})",
    )
    .expect("valid location-date regex")
});

const KNOWN_PLACES: &[&str] = &[
    "Warszawa", "Kraków", "Gdańsk", "Wrocław", "Poznań", "Łódź", "Szczecin", "Bydgoszcz",
    "Lublin", "Katowice", "Białystok", "Gdynia", "Częstochowa", "Radom", "Sosnowiec", "Toruń",
    "Kielce", "Gliwice", "Zabrze", "Bytom", "Olsztyn", "Bielsko-Biała", "Rzeszów", "Ruda Śląska",
    "Rybnik", "Tychy", "Dąbrowa Górnicza", "Płock", "Elbląg", "Opole", "Gorzów Wielkopolski",
    "Włocławek", "Zielona Góra", "Tarnów", "Chorzów", "Kalisz", "Koszalin", "Legnica",
    "Grudziądz", "Słupsk", "Jaworzno", "Jelenia Góra", "Nowy Sącz", "Konin", "Siedlce",
    "Pruszków", "Brzesko",
];

static KNOWN_PLACES_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = KNOWN_PLACES
        .iter()
        .map(|place| regex::escape(place))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b({alternatives})\b")).expect("valid known places regex")
});

static IMG_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\s(?:data-src|data-lazy-src|src)\s*=\s*["']([^"']+)["']"#)
        .expect("valid img src regex")
});

/// Turns OLX search-results markup into listings.
///
/// Every field is recovered through its own probe table (see
/// [`crate::scrapers::strategy`]), so a renamed class or a missing element
/// costs at most one probe, never the listing.
pub struct OlxExtractor {
    config: ExtractConfig,
    anchors: Selector,
    path_segment: Regex,
    title: Vec<Probe>,
    price: Vec<Probe>,
    location: Vec<Probe>,
    image: Vec<Probe>,
}

impl OlxExtractor {
    pub fn new(config: ExtractConfig) -> Result<Self, ExtractError> {
        let anchor_css = format!("a[href*=\"{}\"]", config.listing_path);
        let anchors = parse_selector(&anchor_css)?;

        let marker = regex::escape(config.listing_path.trim_end_matches('/'));
        let path_segment = Regex::new(&format!(r"{marker}/[^/?#]+-([0-9A-Za-z]+)(?:\.html)?"))
            .map_err(|source| ExtractError::Pattern {
                listing_path: config.listing_path.clone(),
                source,
            })?;

        Ok(Self {
            title: title_probes()?,
            price: price_probes()?,
            location: location_probes()?,
            image: image_probes()?,
            config,
            anchors,
            path_segment,
        })
    }

    /// Extract listings in page order.
    ///
    /// Ids are unique (first occurrence wins), titles must match a configured
    /// keyword, and at most `max_results` listings are returned. Markup that
    /// cannot be understood yields an empty list.
    pub fn extract(&self, html: &str) -> Vec<Listing> {
        let document = Html::parse_document(html);
        let mut seen_ids = HashSet::new();
        let mut listings = Vec::new();
        let mut candidates = 0usize;

        for anchor in document.select(&self.anchors) {
            if listings.len() >= self.config.max_results {
                break;
            }
            candidates += 1;

            let Some(listing) = self.listing_from_anchor(anchor) else {
                continue;
            };

            if !seen_ids.insert(listing.id.clone()) {
                debug!(listing_id = %listing.id, "skipping duplicate anchor");
                continue;
            }

            if !self.matches_keywords(&listing.title) {
                debug!(listing_id = %listing.id, title = %listing.title, "title matches no keyword");
                continue;
            }

            listings.push(listing);
        }

        info!(
            "Extracted {} listings from {} candidate anchors",
            listings.len(),
            candidates
        );
        listings
    }

    fn listing_from_anchor(&self, anchor: ElementRef<'_>) -> Option<Listing> {
        let href = anchor.value().attr("href")?.trim();
        let url = normalize_url(&self.config.base_origin, href)?;
        let id = self.listing_id(&url);

        let card = Card {
            anchor,
            containers: self.containers(anchor, &url),
        };

        let title = first_hit(&self.title, &card, clean_title)
            .or_else(|| title_from_slug(&url, &self.config.listing_path))
            .unwrap_or_else(|| TITLE_PLACEHOLDER.to_string());

        let price = first_hit(&self.price, &card, |raw| {
            normalize_price(raw, &self.config.default_currency)
        })
        .unwrap_or_else(|| PRICE_PLACEHOLDER.to_string());

        let location = first_hit(&self.location, &card, clean_location)
            .unwrap_or_else(|| LOCATION_PLACEHOLDER.to_string());

        let image_url = first_hit(&self.image, &card, |raw| {
            normalize_image_url(&self.config.base_origin, raw)
        });

        Some(Listing {
            id,
            title,
            url,
            price,
            location,
            image_url,
        })
    }

    /// Ancestors that only wrap anchors pointing at the same listing.
    fn containers<'a>(&self, anchor: ElementRef<'a>, url: &str) -> Vec<ElementRef<'a>> {
        anchor
            .ancestors()
            .filter_map(ElementRef::wrap)
            .take(CONTAINER_DEPTH)
            .take_while(|el| {
                el.select(&self.anchors).all(|other| {
                    other
                        .value()
                        .attr("href")
                        .and_then(|href| normalize_url(&self.config.base_origin, href))
                        .is_some_and(|other_url| other_url == url)
                })
            })
            .collect()
    }

    /// `-ID<token>.html` first, then the last token of the listing path
    /// segment, then a hash of the URL.
    pub fn listing_id(&self, url: &str) -> String {
        SLUG_DIGITS_RE
            .captures(url)
            .or_else(|| self.path_segment.captures(url))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| url_hash(url))
    }

    fn matches_keywords(&self, title: &str) -> bool {
        if self.config.keywords.is_empty() {
            return true;
        }
        let title = title.to_lowercase();
        self.config
            .keywords
            .iter()
            .any(|keyword| title.contains(&keyword.to_lowercase()))
    }
}

fn parse_selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector {
        selector: css.to_string(),
        reason: format!("{e:?}"),
    })
}

fn title_probes() -> Result<Vec<Probe>, ExtractError> {
    Ok(vec![
        Probe::Text(Scope::Anchor, parse_selector(r#"[data-cy="ad-card-title"]"#)?),
        Probe::Text(Scope::Anchor, parse_selector(r#"[data-testid="ad-title"]"#)?),
        Probe::Text(Scope::Anchor, parse_selector("h6")?),
        Probe::Text(Scope::Anchor, parse_selector("h4")?),
        Probe::Text(Scope::Anchor, parse_selector("h3")?),
        Probe::OwnAttr("title"),
        Probe::OwnText,
        Probe::Attr(Scope::Anchor, parse_selector("img[alt]")?, "alt"),
        Probe::Text(Scope::Container, parse_selector(r#"[data-cy="ad-card-title"]"#)?),
        Probe::Text(Scope::Container, parse_selector("h6, h4")?),
    ])
}

fn price_probes() -> Result<Vec<Probe>, ExtractError> {
    Ok(vec![
        Probe::Text(Scope::Anchor, parse_selector(r#"[data-testid="ad-price"]"#)?),
        Probe::Text(Scope::Anchor, parse_selector(".price, .offer-price")?),
        Probe::Text(Scope::Anchor, parse_selector(r#"[class*="price"]"#)?),
        Probe::Text(Scope::Container, parse_selector(r#"[data-testid="ad-price"]"#)?),
        Probe::Text(Scope::Container, parse_selector(".price, .offer-price")?),
        Probe::TextPattern(Scope::Anchor, PRICE_TOKEN_RE.clone()),
        Probe::TextPattern(Scope::Container, PRICE_TOKEN_RE.clone()),
        Probe::MarkupPattern(Scope::Anchor, PRICE_TOKEN_RE.clone()),
    ])
}

fn location_probes() -> Result<Vec<Probe>, ExtractError> {
    Ok(vec![
        Probe::Text(Scope::Anchor, parse_selector(r#"[data-testid="location-date"]"#)?),
        Probe::Text(Scope::Anchor, parse_selector(".location")?),
        Probe::Text(Scope::Container, parse_selector(r#"[data-testid="location-date"]"#)?),
        Probe::Text(Scope::Container, parse_selector(".location")?),
        Probe::NodePattern(Scope::Anchor, LOCATION_DATE_RE.clone()),
        Probe::NodePattern(Scope::Container, LOCATION_DATE_RE.clone()),
        Probe::TextPattern(Scope::Anchor, KNOWN_PLACES_RE.clone()),
        Probe::TextPattern(Scope::Container, KNOWN_PLACES_RE.clone()),
    ])
}

fn image_probes() -> Result<Vec<Probe>, ExtractError> {
    let img = parse_selector("img")?;
    Ok(vec![
        Probe::Attr(Scope::Anchor, img.clone(), "src"),
        Probe::Attr(Scope::Anchor, img.clone(), "data-src"),
        Probe::Attr(Scope::Anchor, img.clone(), "data-lazy-src"),
        Probe::Attr(Scope::Anchor, img.clone(), "srcset"),
        Probe::Attr(Scope::Container, img.clone(), "src"),
        Probe::Attr(Scope::Container, img.clone(), "data-src"),
        Probe::Attr(Scope::Container, img, "data-lazy-src"),
        Probe::MarkupPattern(Scope::Anchor, IMG_SRC_RE.clone()),
        Probe::MarkupPattern(Scope::Container, IMG_SRC_RE.clone()),
    ])
}

/// Make `href` absolute against `origin` and drop query and fragment.
///
/// Returns `None` for non-http schemes (`javascript:`, `mailto:`) and for
/// anything that does not parse as a URL with a host.
pub fn normalize_url(origin: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let absolute = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if has_scheme(href) {
        href.to_string()
    } else {
        format!(
            "{}/{}",
            origin.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    };

    let mut url = Url::parse(&absolute).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    url.set_query(None);
    url.set_fragment(None);
    Some(url.into())
}

fn has_scheme(href: &str) -> bool {
    let Some((scheme, _)) = href.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn url_hash(url: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    digest[..16].to_string()
}

/// Collapse whitespace, drop decorative symbols and cap the length.
pub fn clean_title(raw: &str) -> Option<String> {
    let filtered: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || TITLE_PUNCTUATION.contains(c) {
                c
            } else {
                ' '
            }
        })
        .collect();
    let collapsed = filtered.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(truncate_with_ellipsis(&collapsed, TITLE_MAX_CHARS))
}

/// Last-resort title: `/oferta/iphone-13-pro-CID99-IDabc.html` -> `Iphone 13 Pro`.
pub fn title_from_slug(url: &str, listing_path: &str) -> Option<String> {
    let start = url.find(listing_path)? + listing_path.len();
    let slug = url[start..]
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches(".html");

    let slug = match slug.find("-CID") {
        Some(pos) => &slug[..pos],
        None => match slug.rfind("-ID") {
            Some(pos) => &slug[..pos],
            None => slug,
        },
    };

    let words = slug
        .split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    clean_title(&words)
}

/// Keep only the amount and currency of a price candidate.
/// `"1 200 zł do negocjacji"` -> `"1 200 zł"`, `"1200"` -> `"1200 zł"`.
pub fn normalize_price(raw: &str, default_currency: &str) -> Option<String> {
    let caps = AMOUNT_RE.captures(raw)?;
    let amount = caps
        .get(1)?
        .as_str()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let currency = caps
        .get(2)
        .map(|m| m.as_str())
        .unwrap_or(default_currency);
    Some(format!("{amount} {currency}"))
}

/// `"Warszawa, Mokotów - Dzisiaj o 10:32"` -> `"Warszawa, Mokotów"`.
pub fn clean_location(raw: &str) -> Option<String> {
    let place = raw.split(" - ").next().unwrap_or(raw);
    let collapsed = place.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c == ',' || c == '-' || c.is_whitespace());
    if trimmed.is_empty() {
        return None;
    }
    Some(truncate_with_ellipsis(trimmed, LOCATION_MAX_CHARS))
}

/// First URL of a `src`/`srcset` value, made absolute, query stripped.
/// Anything that is not a well-formed http(s) URL is rejected.
pub fn normalize_image_url(origin: &str, raw: &str) -> Option<String> {
    let candidate = raw.split_whitespace().next()?;
    if candidate.starts_with("data:") {
        return None;
    }
    let candidate = candidate.split('?').next().unwrap_or(candidate);
    normalize_url(origin, candidate)
}
