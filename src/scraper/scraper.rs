// scraper.rs
use crate::domain::Listing;
use crate::scraper::collector::{self, RawCard};
use crate::scraper::extract::{extract_detail_page, FieldExtractor};
use crate::scraper::renderer::{PageRenderer, RenderRequest};
use crate::scraper::ScraperError;
use rand::Rng;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

pub const BASE_LISTINGS_URL: &str = "https://ecaytrade.com/autos-boats/autos";

/// Minimum listing price, applied both in the search URL and as a filter.
pub const DEFAULT_MIN_PRICE: f64 = 4000.0;

const PRICE_UPON_REQUEST: &str = "price upon request";

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub base_url: String,
    pub min_price: f64,
    /// `None` means crawl until the site runs out of pages.
    pub max_pages: Option<u32>,
    pub nav_timeout: Duration,
    pub card_wait: Duration,
    pub detail_timeout: Duration,
    /// Jittered pause between result pages, in ms: `[min, max)`.
    pub page_delay_ms: (u64, u64),
    /// Jittered pause after each detail page, in ms: `[min, max)`.
    pub detail_delay_ms: (u64, u64),
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            base_url: BASE_LISTINGS_URL.to_string(),
            min_price: DEFAULT_MIN_PRICE,
            max_pages: None,
            nav_timeout: Duration::from_secs(20),
            card_wait: Duration::from_secs(30),
            detail_timeout: Duration::from_secs(20),
            page_delay_ms: (2000, 3500),
            detail_delay_ms: (400, 800),
        }
    }
}

impl CrawlSettings {
    /// Search URL for `page`: the floor as `minprice`, and `page` after the first.
    pub fn page_url(&self, page: u32) -> Result<String, ScraperError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ScraperError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("minprice", &format!("{:.0}", self.min_price));
            if page > 1 {
                query.append_pair("page", &page.to_string());
            }
        }
        Ok(url.into())
    }
}

pub struct PaginatedResult {
    pub listings: Vec<Listing>,
    pub pages_fetched: u32,
}

/// Why a parsed card was left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Malformed,
    NoYear,
    BelowFloor,
    PriceUponRequest,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Malformed => write!(f, "no title and no price"),
            RejectReason::NoYear => write!(f, "no year"),
            RejectReason::BelowFloor => write!(f, "price below floor"),
            RejectReason::PriceUponRequest => write!(f, "price upon request"),
        }
    }
}

#[derive(Debug)]
pub enum CardOutcome {
    Accepted(Listing),
    Rejected(RejectReason, Listing),
    /// Same external id already collected earlier in this run.
    Duplicate(String),
}

/// Inclusion filter, checked in order; the first failing rule wins.
pub fn inclusion_filter(listing: &Listing, min_price: f64) -> Result<(), RejectReason> {
    if listing.title.is_empty() && listing.price == 0.0 {
        return Err(RejectReason::Malformed);
    }
    if listing.year.is_none() {
        return Err(RejectReason::NoYear);
    }
    if listing.price < min_price {
        return Err(RejectReason::BelowFloor);
    }
    if listing.title.to_lowercase().contains(PRICE_UPON_REQUEST) {
        return Err(RejectReason::PriceUponRequest);
    }
    Ok(())
}

/// Drives the crawl across result pages.
pub struct ListingScraper<R: PageRenderer> {
    renderer: R,
    extractor: FieldExtractor,
    settings: CrawlSettings,
}

impl<R: PageRenderer> ListingScraper<R> {
    pub fn new(renderer: R, extractor: FieldExtractor, settings: CrawlSettings) -> Self {
        Self {
            renderer,
            extractor,
            settings,
        }
    }

    /// Crawls pages 1..N and returns every listing that passed the filters.
    ///
    /// Stops on the first page with no raw cards, a page without a next-page
    /// link, `max_pages`, a page-level failure or cancellation. Listings
    /// collected before the stop are always returned.
    pub async fn crawl(&self, cancel: &CancellationToken) -> Result<PaginatedResult, ScraperError> {
        // Reject a bad base URL before touching the renderer.
        self.settings.page_url(1)?;

        let mut listings = Vec::new();
        let mut seen_ids = HashSet::new();
        let mut pages_fetched = 0;
        let mut page = 1;

        info!(max_pages = ?self.settings.max_pages, "starting crawl");

        loop {
            let page_url = self.settings.page_url(page)?;
            info!(page, url = %page_url, "scraping page");

            let card_page =
                match collector::collect(&self.renderer, &page_url, page, &self.settings).await {
                    Ok(card_page) => card_page,
                    Err(e) => {
                        error!(page, error = %e, "page failed; stopping pagination");
                        break;
                    }
                };
            pages_fetched += 1;

            if card_page.raw_count == 0 {
                info!(page, "no raw cards; end of listings");
                break;
            }

            let accepted = self.process_cards(page, card_page.cards, &mut seen_ids).await;
            listings.extend(accepted);
            info!(page, total = listings.len(), "page done");

            if !card_page.has_next_page {
                info!(page, "no next page; done");
                break;
            }
            if self.settings.max_pages.is_some_and(|max| page >= max) {
                info!(page, "reached max pages; stopping");
                break;
            }

            page += 1;
            let delay = jitter(self.settings.page_delay_ms);
            debug!(?delay, next_page = page, "waiting before next page");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(page, "cancelled; stopping pagination");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(pages = pages_fetched, listings = listings.len(), "crawl complete");
        Ok(PaginatedResult {
            listings,
            pages_fetched,
        })
    }

    /// Screens every card, then fetches detail pages for the accepted ones.
    async fn process_cards(
        &self,
        page: u32,
        cards: Vec<RawCard>,
        seen_ids: &mut HashSet<String>,
    ) -> Vec<Listing> {
        let outcomes: Vec<Result<CardOutcome, ScraperError>> = cards
            .iter()
            .map(|card| self.screen_card(card, seen_ids))
            .collect();

        let mut accepted = Vec::new();
        for (idx, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(CardOutcome::Accepted(mut listing)) => {
                    self.apply_detail_fields(&mut listing, page, idx).await;
                    accepted.push(listing);
                }
                Ok(CardOutcome::Rejected(reason, listing)) => {
                    debug!(page, card = idx, %reason, title = %listing.title, "skip");
                }
                Ok(CardOutcome::Duplicate(external_id)) => {
                    debug!(page, card = idx, %external_id, "skip; already collected");
                }
                Err(e) => {
                    warn!(page, card = idx, error = %e, "card failed; skipping");
                }
            }
        }
        accepted
    }

    fn screen_card(
        &self,
        card: &RawCard,
        seen_ids: &mut HashSet<String>,
    ) -> Result<CardOutcome, ScraperError> {
        let listing = self
            .extractor
            .parse_card(&card.text, &card.url, &card.image_url);

        if listing.external_id.is_empty() {
            return Err(ScraperError::MalformedCard(format!(
                "no listing id in {}",
                card.url
            )));
        }
        if let Err(reason) = inclusion_filter(&listing, self.settings.min_price) {
            return Ok(CardOutcome::Rejected(reason, listing));
        }
        if !seen_ids.insert(listing.external_id.clone()) {
            return Ok(CardOutcome::Duplicate(listing.external_id));
        }
        Ok(CardOutcome::Accepted(listing))
    }

    /// Fetches the detail page and merges its fields. A failed fetch keeps
    /// the card's own data.
    async fn apply_detail_fields(&self, listing: &mut Listing, page: u32, idx: usize) {
        let request = RenderRequest::new(listing.url.as_str(), self.settings.detail_timeout);

        match self.renderer.render(&request).await {
            Ok(detail) => {
                let (fields, full_text) = extract_detail_page(&detail.html);
                self.extractor
                    .merge_detail_fields(&fields, &full_text, listing);
                debug!(
                    page,
                    card = idx,
                    mileage = %listing.mileage,
                    body_type = ?listing.body_type,
                    drive = ?listing.drive,
                    cylinders = ?listing.cylinders,
                    steering = ?listing.steering,
                    on_island = ?listing.on_island,
                    "detail fields"
                );
            }
            Err(e) => {
                warn!(
                    page,
                    card = idx,
                    external_id = %listing.external_id,
                    error = %e,
                    "detail fetch failed; keeping card data"
                );
            }
        }

        tokio::time::sleep(jitter(self.settings.detail_delay_ms)).await;
    }
}

/// Uniform delay in `[min, max)` milliseconds.
fn jitter((min, max): (u64, u64)) -> Duration {
    if max <= min {
        return Duration::from_millis(min);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..max))
}

#[cfg(test)]
impl<R: PageRenderer> ListingScraper<R> {
    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}

#[cfg(test)]
impl CrawlSettings {
    /// No pacing and short waits, for tests.
    pub fn instant() -> Self {
        Self {
            base_url: "https://ecaytrade.com/autos-boats/autos".to_string(),
            nav_timeout: Duration::from_millis(50),
            card_wait: Duration::ZERO,
            detail_timeout: Duration::from_millis(50),
            page_delay_ms: (0, 0),
            detail_delay_ms: (0, 0),
            ..Self::default()
        }
    }
}
