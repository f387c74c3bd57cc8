//! Cascading field probes.
//!
//! Each listing field is recovered by walking an ordered table of [`Probe`]s.
//! A probe either yields a raw candidate or nothing; the caller's refine step
//! may still reject a candidate, in which case the next probe is tried. The
//! first refined value wins. Broken selectors therefore degrade to the next
//! entry instead of losing the field.

use regex::Regex;
use scraper::{ElementRef, Selector};

/// Where a probe looks relative to the listing anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The anchor element and its descendants
    Anchor,
    /// The nearest ancestors that belong to this listing only
    Container,
}

/// The markup surrounding one listing anchor.
pub struct Card<'a> {
    pub anchor: ElementRef<'a>,
    /// Nearest first. Never contains an element that also wraps another listing.
    pub containers: Vec<ElementRef<'a>>,
}

impl<'a> Card<'a> {
    fn scoped<F>(&self, scope: Scope, mut probe: F) -> Option<String>
    where
        F: FnMut(ElementRef<'a>) -> Option<String>,
    {
        match scope {
            Scope::Anchor => probe(self.anchor),
            Scope::Container => self.containers.iter().copied().find_map(probe),
        }
    }
}

pub enum Probe {
    /// Text of the first non-empty element matching the selector
    Text(Scope, Selector),
    /// Attribute of the first matching element that carries it
    Attr(Scope, Selector, &'static str),
    /// Attribute on the anchor itself
    OwnAttr(&'static str),
    /// Visible text of the anchor
    OwnText,
    /// First capture group over visible text
    TextPattern(Scope, Regex),
    /// First capture group within a single text node
    NodePattern(Scope, Regex),
    /// First capture group over serialized markup
    MarkupPattern(Scope, Regex),
}

impl Probe {
    pub fn run(&self, card: &Card<'_>) -> Option<String> {
        match self {
            Probe::Text(scope, selector) => card.scoped(*scope, |el| {
                el.select(selector)
                    .map(visible_text)
                    .find(|text| !text.is_empty())
            }),
            Probe::Attr(scope, selector, attr) => card.scoped(*scope, |el| {
                el.select(selector)
                    .filter_map(|found| found.value().attr(attr))
                    .map(str::trim)
                    .find(|value| !value.is_empty())
                    .map(str::to_owned)
            }),
            Probe::OwnAttr(attr) => card
                .anchor
                .value()
                .attr(attr)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned),
            Probe::OwnText => Some(visible_text(card.anchor)).filter(|text| !text.is_empty()),
            Probe::TextPattern(scope, pattern) => {
                card.scoped(*scope, |el| first_capture(pattern, &visible_text(el)))
            }
            Probe::NodePattern(scope, pattern) => card.scoped(*scope, |el| {
                el.text().find_map(|node| {
                    let collapsed = node.split_whitespace().collect::<Vec<_>>().join(" ");
                    first_capture(pattern, &collapsed)
                })
            }),
            Probe::MarkupPattern(scope, pattern) => {
                card.scoped(*scope, |el| first_capture(pattern, &el.html()))
            }
        }
    }
}

/// Runs `probes` in order and returns the first candidate accepted by `refine`.
pub fn first_hit<F>(probes: &[Probe], card: &Card<'_>, mut refine: F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    probes
        .iter()
        .filter_map(|probe| probe.run(card))
        .find_map(|raw| refine(&raw))
}

/// Text nodes of `el` joined by single spaces.
pub fn visible_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_capture(pattern: &Regex, haystack: &str) -> Option<String> {
    let caps = pattern.captures(haystack)?;
    caps.get(1)
        .or_else(|| caps.get(0))
        .map(|m| m.as_str().trim().to_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    fn with_card<R>(html: &str, f: impl FnOnce(&Card<'_>) -> R) -> R {
        let doc = Html::parse_document(html);
        let anchor = doc.select(&sel("a")).next().unwrap();
        let containers = anchor
            .ancestors()
            .filter_map(ElementRef::wrap)
            .take(1)
            .collect();
        f(&Card { anchor, containers })
    }

    #[test]
    fn first_probe_with_a_value_wins() {
        let probes = vec![
            Probe::Text(Scope::Anchor, sel("h6")),
            Probe::Text(Scope::Anchor, sel("h4")),
            Probe::OwnText,
        ];
        let hit = with_card(r#"<a href="/x"><h4>Second</h4><span>rest</span></a>"#, |card| {
            first_hit(&probes, card, |raw| Some(raw.to_string()))
        });
        assert_eq!(hit.as_deref(), Some("Second"));
    }

    #[test]
    fn rejected_candidate_falls_through_to_next_probe() {
        let probes = vec![
            Probe::Attr(Scope::Anchor, sel("img"), "src"),
            Probe::Attr(Scope::Anchor, sel("img"), "data-src"),
        ];
        let hit = with_card(
            r#"<a href="/x"><img src="data:image/gif;base64,AAAA" data-src="https://cdn.example/1.jpg"></a>"#,
            |card| first_hit(&probes, card, |raw| raw.starts_with("https://").then(|| raw.to_string())),
        );
        assert_eq!(hit.as_deref(), Some("https://cdn.example/1.jpg"));
    }

    #[test]
    fn container_scope_searches_ancestors() {
        let probes = vec![
            Probe::Text(Scope::Anchor, sel(".price")),
            Probe::Text(Scope::Container, sel(".price")),
        ];
        let hit = with_card(
            r#"<div class="card"><a href="/x">Phone</a><p class="price">100 zł</p></div>"#,
            |card| first_hit(&probes, card, |raw| Some(raw.to_string())),
        );
        assert_eq!(hit.as_deref(), Some("100 zł"));
    }

    #[test]
    fn node_pattern_does_not_span_elements() {
        let pattern = Regex::new(r"(\p{Lu}\p{L}*(?:\s+\p{Lu}\p{L}*)*)\s+-\s+Dzisiaj").unwrap();
        let html = r#"<a href="/x"><h6>Apple Watch</h6><span>Kraków - Dzisiaj</span></a>"#;

        let across = with_card(html, |card| {
            Probe::TextPattern(Scope::Anchor, pattern.clone()).run(card)
        });
        let within = with_card(html, |card| {
            Probe::NodePattern(Scope::Anchor, pattern.clone()).run(card)
        });

        assert_eq!(across.as_deref(), Some("Apple Watch Kraków"));
        assert_eq!(within.as_deref(), Some("Kraków"));
    }

    #[test]
    fn markup_pattern_reads_raw_html() {
        let probes = vec![Probe::MarkupPattern(
            Scope::Anchor,
            Regex::new(r#"data-id="(\d+)""#).unwrap(),
        )];
        let hit = with_card(r#"<a href="/x"><span data-id="42"></span></a>"#, |card| {
            first_hit(&probes, card, |raw| Some(raw.to_string()))
        });
        assert_eq!(hit.as_deref(), Some("42"));
    }

    #[test]
    fn no_hit_returns_none() {
        let probes = vec![Probe::OwnAttr("title"), Probe::OwnText];
        let hit = with_card(r#"<a href="/x">   </a>"#, |card| {
            first_hit(&probes, card, |raw| Some(raw.to_string()))
        });
        assert_eq!(hit, None);
    }

    #[test]
    fn visible_text_collapses_whitespace() {
        let text = with_card("<a href=\"/x\">  iPhone\n\t13 <b>128GB</b> </a>", |card| {
            visible_text(card.anchor)
        });
        assert_eq!(text, "iPhone 13 128GB");
    }
}
