use crate::config::Config;
use crate::db::scrapes::{end_scrape_run, get_recent_scrapes, start_scrape_run, RunOutcome};
use crate::db::{init_db, save_listings, Database};
use crate::domain::KnownMakes;
use crate::enrich::{ChatNormalizer, EnrichmentGate, Normalizer};
use crate::errors::AppError;
use crate::scraper::{BrowserlessRenderer, FieldExtractor, ListingScraper};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod domain;
mod enrich;
mod errors;
mod scraper;


#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "run failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let db = Database::new(config.database_path.as_str());
    init_db(&db)?;

    let last_run = db.with_conn(|conn| get_recent_scrapes(conn))?;
    if let Some(last) = last_run.first() {
        info!(
            run_id = last.id,
            started_at = %last.started_at,
            success = last.success,
            listings_seen = ?last.listings_seen,
            inserted = ?last.inserted,
            updated = ?last.updated,
            errors = ?last.errors,
            "previous run"
        );
    }

    let run_id = db.with_conn(|conn| start_scrape_run(conn, Utc::now().naive_utc()))?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after the current step");
            signal_token.cancel();
        }
    });

    let mut outcome = RunOutcome::default();
    let result = execute(&config, &db, &cancel, &mut outcome).await;
    if let Err(ref e) = result {
        outcome.error = Some(e.to_string());
    }

    if let Err(e) = db.with_conn(|conn| end_scrape_run(conn, run_id, Utc::now().naive_utc(), &outcome)) {
        warn!(run_id, error = %e, "failed to record scrape run");
    }

    result
}

async fn execute(
    config: &Config,
    db: &Database,
    cancel: &CancellationToken,
    outcome: &mut RunOutcome,
) -> Result<(), AppError> {
    let renderer = BrowserlessRenderer::new(
        &config.browserless_url,
        config.browserless_token.as_deref(),
        config.headless,
    )?;
    let makes = KnownMakes::default();
    let scraper = ListingScraper::new(
        renderer,
        FieldExtractor::new(makes.clone()),
        config.crawl_settings(),
    );

    let crawl = scraper.crawl(cancel).await?;
    outcome.pages_fetched = crawl.pages_fetched;
    outcome.listings_seen = crawl.listings.len();

    if crawl.listings.is_empty() {
        return Err(AppError::NoListings);
    }
    info!(listings = crawl.listings.len(), pages = crawl.pages_fetched, "scraped listings");

    let normalizer: Option<Box<dyn Normalizer>> = match config.github_token.as_deref() {
        Some(token) => match ChatNormalizer::new(token) {
            Ok(client) => Some(Box::new(client)),
            Err(e) => {
                warn!(error = %e, "could not build normalization client; enrichment disabled");
                None
            }
        },
        None => None,
    };
    let gate = EnrichmentGate::new(normalizer, makes);
    let listings = gate.enrich(crawl.listings, cancel).await;

    let summary = save_listings(db, &listings);
    outcome.summary = summary;

    info!(
        "Done: {} inserted | {} updated ({} price changed) | {} errors",
        summary.inserted, summary.updated, summary.price_changed, summary.errors
    );
    Ok(())
}
