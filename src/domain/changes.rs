// src/domain/changes.rs

use crate::domain::listing::{to_cents, Listing};

/// The current state of a listing as stored in the `listings` table.
#[derive(Debug, PartialEq, Clone)]
pub struct TrackedListing {
    pub id: i64,
    pub title: String,
    pub price: f64,
    pub make: String,
    pub model: String,
    pub year: Option<i32>,
    pub mileage: String,
}

/// A single change to a tracked field, to be stored in `listing_history`.
#[derive(Debug)]
pub struct ListingChange {
    pub listing_id: i64,
    pub field_name: String,
    pub previous_value: Option<String>,
    pub current_value: String,
}

/// How one listing was classified against the stored state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileResult {
    pub inserted: bool,
    pub updated: bool,
    pub price_changed: bool,
}

impl ReconcileResult {
    pub fn inserted() -> Self {
        Self {
            inserted: true,
            ..Default::default()
        }
    }

    pub fn updated(price_changed: bool) -> Self {
        Self {
            inserted: false,
            updated: true,
            price_changed,
        }
    }
}

/// Totals for one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    pub price_changed: usize,
    pub errors: usize,
}

impl ReconcileSummary {
    pub fn record(&mut self, result: ReconcileResult) {
        if result.inserted {
            self.inserted += 1;
        } else {
            self.updated += 1;
            if result.price_changed {
                self.price_changed += 1;
            }
        }
    }
}

impl TrackedListing {
    /// Compares the stored state with a freshly scraped listing and returns
    /// every tracked field that differs.
    pub fn diff(&self, new: &Listing) -> Vec<ListingChange> {
        let mut changes = Vec::new();

        macro_rules! compare_and_log {
            ($field:ident, $field_name:expr) => {
                compare_and_log!($field, $field_name, true)
            };
            // An empty incoming value never replaces stored data, so it is not a change.
            ($field:ident, $field_name:expr, nonempty) => {
                compare_and_log!($field, $field_name, !new.$field.is_empty())
            };
            ($field:ident, $field_name:expr, $guard:expr) => {
                if $guard && self.$field != new.$field {
                    changes.push(ListingChange {
                        listing_id: self.id,
                        field_name: $field_name.to_string(),
                        previous_value: Some(self.$field.to_string()),
                        current_value: new.$field.to_string(),
                    });
                }
            };
        }

        compare_and_log!(title, "title");
        compare_and_log!(make, "make", nonempty);
        compare_and_log!(model, "model", nonempty);
        compare_and_log!(mileage, "mileage");

        if self.year != new.year {
            changes.push(ListingChange {
                listing_id: self.id,
                field_name: "year".to_string(),
                previous_value: self.year.map(|y| y.to_string()),
                current_value: new.year.map(|y| y.to_string()).unwrap_or_default(),
            });
        }

        // Float prices are compared in cents.
        if to_cents(self.price) != new.price_cents() {
            changes.push(ListingChange {
                listing_id: self.id,
                field_name: "price".to_string(),
                previous_value: Some(self.price.to_string()),
                current_value: new.price.to_string(),
            });
        }

        changes
    }
}
