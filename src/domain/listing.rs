// src/domain/listing.rs

use serde::Serialize;

/// A single vehicle listing as scraped from the classifieds site.
///
/// Built from a search-results card, filled in from the detail page, possibly
/// corrected by enrichment, and finally handed to the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Listing {
    pub title: String,
    pub price: f64,
    pub currency: String,
    pub url: String,
    pub external_id: String,
    pub make: String,
    pub model: String,
    pub year: Option<i32>,
    pub mileage: String,
    pub image_url: String,
    pub location: String,

    // Detail page attributes, only present when the page exposes them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mileage_value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cylinders: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steering: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exterior_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interior_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_island: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Listing {
    /// Price in whole cents, used wherever two prices are compared.
    pub fn price_cents(&self) -> i64 {
        to_cents(self.price)
    }
}

pub fn to_cents(price: f64) -> i64 {
    (price * 100.0).round() as i64
}
