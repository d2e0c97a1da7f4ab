// gate.rs
use crate::domain::{KnownMakes, Listing};
use crate::enrich::client::{NormalizedFields, Normalizer};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Gap between normalization calls; the free tier allows ~15 requests/minute.
pub const CALL_SPACING: Duration = Duration::from_millis(4500);

/// Decides which listings need normalization and paces the calls.
pub struct EnrichmentGate {
    normalizer: Option<Box<dyn Normalizer>>,
    makes: KnownMakes,
    spacing: Duration,
}

impl EnrichmentGate {
    /// `normalizer` is `None` when no credential is configured.
    pub fn new(normalizer: Option<Box<dyn Normalizer>>, makes: KnownMakes) -> Self {
        Self {
            normalizer,
            makes,
            spacing: CALL_SPACING,
        }
    }

    /// A listing is ambiguous when its make is empty or not a known make.
    pub fn needs_enrichment(&self, listing: &Listing) -> bool {
        !self.makes.contains(&listing.make)
    }

    /// Normalizes ambiguous listings one at a time.
    ///
    /// Always returns every input listing, in order. Failed calls leave the
    /// listing untouched; cancellation during the spacing wait stops the loop.
    pub async fn enrich(&self, mut listings: Vec<Listing>, cancel: &CancellationToken) -> Vec<Listing> {
        let Some(normalizer) = self.normalizer.as_deref() else {
            info!("no normalization credential; skipping enrichment");
            return listings;
        };

        let pending: Vec<usize> = listings
            .iter()
            .enumerate()
            .filter(|(_, l)| self.needs_enrichment(l))
            .map(|(i, _)| i)
            .collect();

        if pending.is_empty() {
            info!("all listings have recognised makes; skipping enrichment");
            return listings;
        }

        info!(pending = pending.len(), total = listings.len(), "enriching listings");

        for (count, &idx) in pending.iter().enumerate() {
            if count > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        warn!(done = count, pending = pending.len(), "cancelled; stopping enrichment early");
                        return listings;
                    }
                    _ = tokio::time::sleep(self.spacing) => {}
                }
            }

            let listing = &mut listings[idx];
            match normalizer.normalize(listing).await {
                Ok(fields) => {
                    apply_normalized(listing, fields);
                    info!(
                        n = count + 1,
                        of = pending.len(),
                        external_id = %listing.external_id,
                        make = %listing.make,
                        model = %listing.model,
                        "enriched"
                    );
                }
                Err(e) => {
                    warn!(
                        external_id = %listing.external_id,
                        title = %listing.title,
                        error = %e,
                        "enrichment failed; keeping scraped values"
                    );
                }
            }
        }

        info!("enrichment complete");
        listings
    }
}

#[cfg(test)]
impl EnrichmentGate {
    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }
}

/// Only non-empty values overwrite; the service never erases known data.
fn apply_normalized(listing: &mut Listing, fields: NormalizedFields) {
    let NormalizedFields { make, model, title } = fields;
    if !make.trim().is_empty() {
        listing.make = make.trim().to_string();
    }
    if !model.trim().is_empty() {
        listing.model = model.trim().to_string();
    }
    if !title.trim().is_empty() {
        listing.title = title.trim().to_string();
    }
}
