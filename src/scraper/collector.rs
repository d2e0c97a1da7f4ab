// collector.rs
use crate::scraper::renderer::{PageRenderer, RenderRequest};
use crate::scraper::CrawlSettings;
use crate::scraper::ScraperError;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{info, warn};
use url::Url;

pub const CARD_SELECTOR: &str = r#"a[href*="/advert/"]"#;

const HTML_DUMP_LIMIT: usize = 3000;

static RE_CARD_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/advert/\d+$").unwrap());
static SEL_CARD: LazyLock<Selector> = LazyLock::new(|| Selector::parse(CARD_SELECTOR).unwrap());
static SEL_IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());
static SEL_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Elements that start a new line of rendered text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption", "figure",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p",
    "pre", "section", "table", "tr", "ul",
];

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// One search-results entry before any parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCard {
    pub url: String,
    pub text: String,
    pub image_url: String,
}

#[derive(Debug, Default)]
pub struct CardPage {
    pub cards: Vec<RawCard>,
    /// Cards found before any business filtering. Zero means end of listings.
    pub raw_count: usize,
    pub has_next_page: bool,
}

/// Renders one search-results page and collects its cards.
///
/// A page whose cards never show up is treated as empty rather than failed.
pub async fn collect<R: PageRenderer + ?Sized>(
    renderer: &R,
    page_url: &str,
    page_number: u32,
    settings: &CrawlSettings,
) -> Result<CardPage, ScraperError> {
    let request = RenderRequest::new(page_url, settings.nav_timeout)
        .wait_for(CARD_SELECTOR, settings.card_wait);
    let page = renderer.render(&request).await?;

    if !page.selector_matched {
        warn!(
            page = page_number,
            html = %truncate(&page.html, HTML_DUMP_LIMIT),
            "listing cards never appeared"
        );
        return Ok(CardPage::default());
    }

    let cards = parse_cards(&page.html, &page.url);
    let has_next_page = has_next_page(&page.html, &page.url, page_number);
    info!(page = page_number, raw = cards.len(), has_next_page, "collected cards");

    Ok(CardPage {
        raw_count: cards.len(),
        cards,
        has_next_page,
    })
}

/// Detail-page anchors on a results page, first occurrence of each address only.
pub fn parse_cards(html: &str, page_url: &str) -> Vec<RawCard> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    let mut seen = HashSet::new();
    let mut cards = Vec::new();

    for anchor in document.select(&SEL_CARD) {
        let Some(url) = anchor
            .value()
            .attr("href")
            .and_then(|href| absolutize(base.as_ref(), href))
        else {
            continue;
        };
        if !RE_CARD_URL.is_match(&url) || !seen.insert(url.clone()) {
            continue;
        }

        let text = rendered_text(anchor);

        let image_url = anchor
            .select(&SEL_IMG)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| absolutize(base.as_ref(), src))
            .unwrap_or_default();

        cards.push(RawCard {
            url,
            text,
            image_url,
        });
    }

    cards
}

/// True if the page links to `current_page + 1`, or carries a "next" link.
pub fn has_next_page(html: &str, page_url: &str, current_page: u32) -> bool {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    let next = (current_page + 1).to_string();

    document.select(&SEL_LINK).any(|a| {
        let el = a.value();

        let links_next_number = el
            .attr("href")
            .and_then(|href| absolutize(base.as_ref(), href))
            .and_then(|href| Url::parse(&href).ok())
            .is_some_and(|u| u.query_pairs().any(|(k, v)| k == "page" && v == next.as_str()));

        let labelled_next = el
            .attr("aria-label")
            .is_some_and(|label| label.trim().eq_ignore_ascii_case("next page"));

        let rel_next = el
            .attr("rel")
            .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("next")));

        links_next_number || labelled_next || rel_next
    })
}

/// Visible text of `el` laid out like a browser would: inline runs stay on
/// one line, block boundaries and `<br>` break lines, whitespace collapses.
pub fn rendered_text(el: ElementRef<'_>) -> String {
    let mut lines = vec![String::new()];
    push_rendered(el, &mut lines);

    lines
        .iter()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_rendered(el: ElementRef<'_>, lines: &mut Vec<String>) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                if let Some(line) = lines.last_mut() {
                    line.push_str(text);
                }
            }
            Node::Element(child_el) => {
                let name = child_el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                if name == "br" {
                    lines.push(String::new());
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    lines.push(String::new());
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    push_rendered(child_ref, lines);
                }
                if block {
                    lines.push(String::new());
                }
            }
            _ => {}
        }
    }
}

fn absolutize(base: Option<&Url>, href: &str) -> Option<String> {
    match base {
        Some(base) => base.join(href).ok().map(String::from),
        None => Url::parse(href).ok().map(String::from),
    }
}

fn truncate(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
