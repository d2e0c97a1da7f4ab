use crate::domain::KnownMakes;
use crate::scraper::{CrawlSettings, FieldExtractor, ListingScraper};
use crate::tests::utils::{detail_page, detail_url, results_page, CardFixture, FakeRenderer};
use tokio_util::sync::CancellationToken;

const GOOD: &[&str] = &["2018 Honda Fit", "CI$8,000", "George Town"];

fn page_url(page: u32) -> String {
    CrawlSettings::instant().page_url(page).unwrap()
}

fn scraper(renderer: FakeRenderer, settings: CrawlSettings) -> ListingScraper<FakeRenderer> {
    ListingScraper::new(renderer, FieldExtractor::new(KnownMakes::default()), settings)
}

fn good_cards(ids: std::ops::Range<u32>) -> Vec<CardFixture<'static>> {
    ids.map(|id| CardFixture { id, lines: GOOD }).collect()
}

#[tokio::test]
async fn only_cards_passing_the_filter_get_detail_fetches() {
    let mut cards = good_cards(100..105);
    for id in 200..205 {
        cards.push(CardFixture { id, lines: &["Honda Fit", "CI$8,000"] });
    }
    for id in 300..305 {
        cards.push(CardFixture { id, lines: &["2010 Kia Rio", "CI$3,500"] });
    }
    for id in 400..403 {
        cards.push(CardFixture { id, lines: &["2021 BMW X5 Price Upon Request", "CI$60,000"] });
    }
    for id in 500..502 {
        cards.push(CardFixture { id, lines: &[] });
    }
    assert_eq!(cards.len(), 20);

    let renderer = FakeRenderer::new().with_page(&page_url(1), &results_page(&cards, None));
    let scraper = scraper(renderer, CrawlSettings::instant());

    let result = scraper.crawl(&CancellationToken::new()).await.unwrap();

    assert_eq!(result.pages_fetched, 1);
    assert_eq!(result.listings.len(), 5);
    let ids: Vec<&str> = result.listings.iter().map(|l| l.external_id.as_str()).collect();
    assert_eq!(ids, vec!["100", "101", "102", "103", "104"]);

    let requested = scraper.renderer().requested();
    let detail_fetches: Vec<&String> = requested.iter().filter(|u| u.contains("/advert/")).collect();
    assert_eq!(detail_fetches.len(), 5);
    for id in 100..105 {
        assert!(requested.contains(&detail_url(id)));
    }
}

#[tokio::test]
async fn price_equal_to_floor_is_included() {
    let cards = [CardFixture { id: 1, lines: &["2012 Toyota Yaris", "CI$4,000"] }];
    let renderer = FakeRenderer::new().with_page(&page_url(1), &results_page(&cards, None));

    let result = scraper(renderer, CrawlSettings::instant())
        .crawl(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.listings.len(), 1);
    assert_eq!(result.listings[0].price, 4000.0);
    assert_eq!(result.listings[0].make, "Toyota");
}

#[tokio::test]
async fn empty_page_stops_even_with_a_next_link() {
    let renderer = FakeRenderer::new()
        .with_page(&page_url(1), &results_page(&good_cards(1..3), Some(2)))
        .with_page(&page_url(2), &results_page(&[], Some(3)))
        .with_page(&page_url(3), &results_page(&good_cards(3..5), None));
    let scraper = scraper(renderer, CrawlSettings::instant());

    let result = scraper.crawl(&CancellationToken::new()).await.unwrap();

    assert_eq!(result.pages_fetched, 2);
    assert_eq!(result.listings.len(), 2);
    assert!(!scraper.renderer().requested().contains(&page_url(3)));
}

#[tokio::test]
async fn missing_next_link_stops_after_the_page() {
    let renderer = FakeRenderer::new()
        .with_page(&page_url(1), &results_page(&good_cards(1..4), None))
        .with_page(&page_url(2), &results_page(&good_cards(4..6), None));
    let scraper = scraper(renderer, CrawlSettings::instant());

    let result = scraper.crawl(&CancellationToken::new()).await.unwrap();

    assert_eq!(result.pages_fetched, 1);
    assert_eq!(result.listings.len(), 3);
    assert!(!scraper.renderer().requested().contains(&page_url(2)));
}

#[tokio::test]
async fn max_pages_stops_regardless_of_next_links() {
    let mut renderer = FakeRenderer::new();
    for page in 1..=5 {
        let first = page * 10;
        renderer = renderer.with_page(
            &page_url(page),
            &results_page(&good_cards(first..first + 2), Some(page + 1)),
        );
    }
    let settings = CrawlSettings {
        max_pages: Some(2),
        ..CrawlSettings::instant()
    };
    let scraper = scraper(renderer, settings);

    let result = scraper.crawl(&CancellationToken::new()).await.unwrap();

    assert_eq!(result.pages_fetched, 2);
    assert_eq!(result.listings.len(), 4);
    assert!(!scraper.renderer().requested().contains(&page_url(3)));
}

#[tokio::test]
async fn page_failure_keeps_earlier_pages() {
    let renderer = FakeRenderer::new()
        .with_page(&page_url(1), &results_page(&good_cards(1..4), Some(2)))
        .with_failure(&page_url(2), "net::ERR_TIMED_OUT");

    let result = scraper(renderer, CrawlSettings::instant())
        .crawl(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.pages_fetched, 1);
    assert_eq!(result.listings.len(), 3);
}

#[tokio::test]
async fn detail_failure_keeps_card_data() {
    let renderer = FakeRenderer::new()
        .with_page(&page_url(1), &results_page(&good_cards(1..3), None))
        .with_page(
            &detail_url(1),
            &detail_page(&[("Mileage", "45,000 mi"), ("Body Type", "Hatchback"), ("Steering", "Right hand")]),
        )
        .with_failure(&detail_url(2), "net::ERR_CONNECTION_RESET");

    let result = scraper(renderer, CrawlSettings::instant())
        .crawl(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.listings.len(), 2);

    let enriched = &result.listings[0];
    assert_eq!(enriched.mileage, "45,000 mi");
    assert_eq!(enriched.mileage_value, Some(45_000));
    assert_eq!(enriched.body_type.as_deref(), Some("Hatchback"));
    assert_eq!(enriched.steering.as_deref(), Some("Right hand"));

    let card_only = &result.listings[1];
    assert_eq!(card_only.title, "2018 Honda Fit");
    assert_eq!(card_only.price, 8000.0);
    assert_eq!(card_only.location, "George Town");
    assert_eq!(card_only.body_type, None);
}

#[tokio::test]
async fn listing_seen_on_an_earlier_page_is_skipped() {
    let renderer = FakeRenderer::new()
        .with_page(&page_url(1), &results_page(&good_cards(1..3), Some(2)))
        .with_page(&page_url(2), &results_page(&good_cards(2..4), None));

    let result = scraper(renderer, CrawlSettings::instant())
        .crawl(&CancellationToken::new())
        .await
        .unwrap();

    let ids: Vec<&str> = result.listings.iter().map(|l| l.external_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn cancellation_stops_between_pages() {
    let renderer = FakeRenderer::new()
        .with_page(&page_url(1), &results_page(&good_cards(1..3), Some(2)))
        .with_page(&page_url(2), &results_page(&good_cards(3..5), None));
    let scraper = scraper(renderer, CrawlSettings::instant());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = scraper.crawl(&cancel).await.unwrap();

    assert_eq!(result.pages_fetched, 1);
    assert_eq!(result.listings.len(), 2);
    assert!(!scraper.renderer().requested().contains(&page_url(2)));
}
