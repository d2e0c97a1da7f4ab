use crate::db::listings::save_listings;
use crate::domain::{KnownMakes, Listing};
use crate::enrich::EnrichmentGate;
use crate::tests::utils::{make_db, sample_listing, FakeNormalizer};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn ambiguous(id: &str) -> Listing {
    Listing {
        title: "2014 Benzz E350".to_string(),
        make: "Benzz".to_string(),
        model: "E350".to_string(),
        ..sample_listing(id, 18000.0)
    }
}

#[tokio::test]
async fn network_error_keeps_listing_and_set_size() {
    let normalizer = FakeNormalizer::new()
        .with_failure("2")
        .with_result("3", "Mercedes-Benz", "E-Class", "2014 Mercedes-Benz E350");
    let gate = EnrichmentGate::new(Some(Box::new(normalizer)), KnownMakes::default())
        .with_spacing(Duration::ZERO);

    let input = vec![sample_listing("1", 9000.0), ambiguous("2"), ambiguous("3")];
    let out = gate.enrich(input.clone(), &CancellationToken::new()).await;

    assert_eq!(out.len(), 3);
    assert_eq!(out[1].title, input[1].title);
    assert_eq!(out[1].make, input[1].make);
    assert_eq!(out[1].model, input[1].model);
    assert_eq!(out[2].make, "Mercedes-Benz");
}

#[tokio::test]
async fn empty_answer_never_erases_stored_make() {
    let (_dir, db) = make_db();
    save_listings(&db, &[sample_listing("55", 11000.0)]);

    // The rescrape lost its make; the service is not confident either.
    let mut rescraped = sample_listing("55", 11000.0);
    rescraped.make = String::new();

    let gate = EnrichmentGate::new(Some(Box::new(FakeNormalizer::new())), KnownMakes::default())
        .with_spacing(Duration::ZERO);
    let out = gate.enrich(vec![rescraped], &CancellationToken::new()).await;
    assert_eq!(out[0].make, "");

    let summary = save_listings(&db, &out);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.price_changed, 0);

    let make: String = db
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT make FROM listings WHERE external_id = '55'",
                [],
                |r| r.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(make, "Toyota");
}
