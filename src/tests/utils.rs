use crate::db::connection::{init_db, Database};
use crate::domain::Listing;
use crate::enrich::client::{EnrichError, NormalizedFields, Normalizer};
use crate::scraper::renderer::{selector_present, PageRenderer, RenderRequest, RenderedPage};
use crate::scraper::ScraperError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Fresh database with the production schema. Keep the `TempDir` alive for
/// as long as the database is used.
pub fn make_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
    let path = dir.path().join("test.sqlite3");
    let db = Database::new(path.to_string_lossy().to_string());

    init_db(&db).unwrap_or_else(|e| panic!("Database initialization failed: {e}"));

    (dir, db)
}

pub fn sample_listing(external_id: &str, price: f64) -> Listing {
    Listing {
        title: "2016 Toyota RAV4 XLE".to_string(),
        price,
        currency: "KYD".to_string(),
        url: format!("https://ecaytrade.com/advert/{external_id}"),
        external_id: external_id.to_string(),
        make: "Toyota".to_string(),
        model: "RAV4".to_string(),
        year: Some(2016),
        mileage: "60,000 km".to_string(),
        mileage_value: Some(60_000),
        location: "George Town".to_string(),
        body_type: Some("SUV".to_string()),
        steering: Some("Right hand".to_string()),
        on_island: Some(true),
        ..Default::default()
    }
}

/// One card on a search-results page: id, then visible text lines.
pub struct CardFixture<'a> {
    pub id: u32,
    pub lines: &'a [&'a str],
}

/// Search-results page with the given cards and an optional link to `next`.
pub fn results_page(cards: &[CardFixture<'_>], next: Option<u32>) -> String {
    let mut html = String::from("<html><body><main>");
    for card in cards {
        html.push_str(&format!(
            r#"<a href="/advert/{}"><img src="/img/{}.jpg">"#,
            card.id, card.id
        ));
        for line in card.lines {
            html.push_str(&format!("<p>{line}</p>"));
        }
        html.push_str("</a>");
    }
    if let Some(next) = next {
        html.push_str(&format!(
            r#"<nav><a href="/autos-boats/autos?minprice=4000&amp;page={next}">{next}</a></nav>"#
        ));
    }
    html.push_str("</main></body></html>");
    html
}

/// Detail page in the site's `<div><strong>Label</strong><p>value</p></div>` layout.
pub fn detail_page(fields: &[(&str, &str)]) -> String {
    let mut html = String::from("<html><body><section>");
    for (label, value) in fields {
        html.push_str(&format!("<div><strong>{label}</strong><p>{value}</p></div>"));
    }
    html.push_str("</section></body></html>");
    html
}

pub fn detail_url(id: u32) -> String {
    format!("https://ecaytrade.com/advert/{id}")
}

/// In-memory renderer serving canned HTML by URL.
#[derive(Default)]
pub struct FakeRenderer {
    pages: HashMap<String, Result<String, String>>,
    requests: Mutex<Vec<String>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(html.to_string()));
        self
    }

    pub fn with_failure(mut self, url: &str, message: &str) -> Self {
        self.pages.insert(url.to_string(), Err(message.to_string()));
        self
    }

    /// Every URL rendered so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageRenderer for FakeRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, ScraperError> {
        self.requests.lock().unwrap().push(request.url.clone());

        match self.pages.get(&request.url) {
            Some(Ok(html)) => Ok(RenderedPage {
                url: request.url.clone(),
                html: html.clone(),
                selector_matched: request
                    .wait_for
                    .as_deref()
                    .map_or(true, |selector| selector_present(html, selector)),
            }),
            Some(Err(message)) => Err(ScraperError::Navigation {
                url: request.url.clone(),
                message: message.clone(),
            }),
            None => Err(ScraperError::Navigation {
                url: request.url.clone(),
                message: "404 Not Found".to_string(),
            }),
        }
    }
}

/// Normalizer with canned answers per external id. Unknown ids get an
/// all-empty answer.
#[derive(Default)]
pub struct FakeNormalizer {
    answers: HashMap<String, Option<NormalizedFields>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, external_id: &str, make: &str, model: &str, title: &str) -> Self {
        self.answers.insert(
            external_id.to_string(),
            Some(NormalizedFields {
                make: make.to_string(),
                model: model.to_string(),
                title: title.to_string(),
            }),
        );
        self
    }

    pub fn with_failure(mut self, external_id: &str) -> Self {
        self.answers.insert(external_id.to_string(), None);
        self
    }

    /// External ids sent so far; shared so it can be read after the
    /// normalizer is boxed into a gate.
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Normalizer for FakeNormalizer {
    async fn normalize(&self, listing: &Listing) -> Result<NormalizedFields, EnrichError> {
        self.calls.lock().unwrap().push(listing.external_id.clone());

        match self.answers.get(&listing.external_id) {
            Some(Some(fields)) => Ok(fields.clone()),
            Some(None) => Err(EnrichError::Http("connection reset by peer".to_string())),
            None => Ok(NormalizedFields::default()),
        }
    }
}
