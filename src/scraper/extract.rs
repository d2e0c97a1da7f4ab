// extract.rs
//
// Turns card text and detail pages into `Listing` records.
use crate::domain::{KnownMakes, Listing};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Detail page labels we know how to use, lowercase without the trailing colon.
pub const RECOGNIZED_LABELS: &[&str] = &[
    "body type",
    "cylinders",
    "make",
    "drive",
    "fuel type",
    "transmission",
    "steering",
    "exterior color",
    "interior color",
    "doors",
    "on island",
    "condition",
    "mileage",
    "year",
];

const MAX_VALUE_LEN: usize = 80;

const DISTRICTS: &[&str] = &[
    "George Town",
    "West Bay",
    "Bodden Town",
    "North Side",
    "East End",
    "Seven Mile Beach",
    "Savannah",
    "Prospect",
    "Red Bay",
    "Cayman Brac",
    "Little Cayman",
];

static RE_ADVERT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/advert/(\d+)/?$").unwrap());
static RE_PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(CI\$|KYD|US\$|USD|\$)\s*(\d{1,3}(?:,\d{3})+|\d+)(\.\d{1,2})?").unwrap()
});
static RE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19[5-9]\d|20\d{2})\b").unwrap());
static RE_MILEAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3}(?:,\d{3})+|\d+)\s*(km|kms|kilometers|kilometres|miles|mi)\b")
        .unwrap()
});
static RE_LABELED_MILEAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:mileage|odometer)\s*:?\s*(\d{1,3}(?:,\d{3})+|\d+)(?:\s*(km|kms|miles|mi)\b)?")
        .unwrap()
});

static SEL_LABELS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("strong, b, dt").unwrap());
static SEL_DT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("dt").unwrap());

/// Label -> value map scraped off a detail page.
pub type DetailFields = BTreeMap<String, String>;

/// Parses cards and merges detail fields, using an injected makes dataset.
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    makes: KnownMakes,
}

impl FieldExtractor {
    pub fn new(makes: KnownMakes) -> Self {
        Self { makes }
    }

    /// Best-effort parse of one search-results card. Never fails; whatever
    /// can't be found is left empty.
    pub fn parse_card(&self, text: &str, url: &str, image_url: &str) -> Listing {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        let mut listing = Listing {
            url: url.to_string(),
            external_id: external_id_from_url(url).unwrap_or_default(),
            image_url: image_url.to_string(),
            currency: "KYD".to_string(),
            ..Default::default()
        };

        if let Some((price, currency)) = lines.iter().find_map(|l| parse_price(l)) {
            listing.price = price;
            listing.currency = currency.to_string();
        }

        let title = lines
            .iter()
            .filter(|l| !RE_PRICE.is_match(l))
            .find(|l| parse_year(l).is_some() && has_letters(l))
            .or_else(|| {
                lines
                    .iter()
                    .find(|l| !RE_PRICE.is_match(l) && has_letters(l))
            });

        if let Some(title) = title {
            listing.title = title.to_string();
            listing.year = parse_year(title);
            let (make, model) = self.make_and_model(title);
            listing.make = make;
            listing.model = model;
        }

        if let Some(m) = RE_MILEAGE.find(text) {
            listing.mileage = m.as_str().to_string();
            listing.mileage_value = mileage_number(m.as_str());
        }

        listing.location = lines
            .iter()
            .filter(|l| Some(**l) != title.copied())
            .find_map(|l| district_in(l))
            .unwrap_or_default()
            .to_string();

        listing
    }

    /// Merges a detail page field map into `listing`. `full_text` is the
    /// page's visible text, scanned for mileage when the map has none.
    pub fn merge_detail_fields(&self, fields: &DetailFields, full_text: &str, listing: &mut Listing) {
        let get = |label: &str| {
            fields
                .get(label)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        match get("mileage").filter(|v| v.chars().any(|c| c.is_ascii_digit())) {
            Some(mileage) => {
                listing.mileage = mileage.to_string();
                listing.mileage_value = mileage_number(mileage);
            }
            None => match scan_mileage(full_text) {
                Some((text, value)) => {
                    if listing.mileage.is_empty() {
                        listing.mileage = text;
                    }
                    listing.mileage_value = Some(value);
                }
                None => {
                    if listing.mileage_value.is_none() {
                        listing.mileage_value = mileage_number(&listing.mileage);
                    }
                }
            },
        }

        if listing.year.is_none() {
            listing.year = get("year").and_then(parse_year);
        }

        if let Some(make) = get("make") {
            let words: Vec<&str> = make.split_whitespace().collect();
            listing.make = self
                .makes
                .match_prefix(&words)
                .map(|(canonical, _)| canonical)
                .unwrap_or_else(|| make.to_string());
        }

        let owned = |label: &str| get(label).map(str::to_string);
        listing.body_type = owned("body type").or(listing.body_type.take());
        listing.cylinders = owned("cylinders").or(listing.cylinders.take());
        listing.drive = owned("drive").or(listing.drive.take());
        listing.fuel_type = owned("fuel type").or(listing.fuel_type.take());
        listing.transmission = owned("transmission").or(listing.transmission.take());
        listing.steering = owned("steering").or(listing.steering.take());
        listing.exterior_color = owned("exterior color").or(listing.exterior_color.take());
        listing.interior_color = owned("interior color").or(listing.interior_color.take());
        listing.doors = owned("doors").or(listing.doors.take());
        listing.condition = owned("condition").or(listing.condition.take());
        if let Some(on_island) = get("on island").and_then(parse_flag) {
            listing.on_island = Some(on_island);
        }
    }

    fn make_and_model(&self, title: &str) -> (String, String) {
        let words: Vec<&str> = title
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| c == ',' || c == '|' || c == '-'))
            .filter(|w| !w.is_empty())
            .collect();

        for start in 0..words.len() {
            if let Some((make, consumed)) = self.makes.match_prefix(&words[start..]) {
                let model = words
                    .get(start + consumed)
                    .filter(|w| parse_year(w).is_none())
                    .map(|w| w.to_string())
                    .unwrap_or_default();
                return (make, model);
            }
        }

        // Unknown make: assume "<year> <make> <model> ..." and leave the rest to enrichment.
        let Some(year_idx) = words.iter().position(|w| parse_year(w).is_some()) else {
            return (String::new(), String::new());
        };
        let make = words
            .get(year_idx + 1)
            .filter(|w| has_letters(w))
            .map(|w| w.to_string())
            .unwrap_or_default();
        let model = if make.is_empty() {
            String::new()
        } else {
            words.get(year_idx + 2).map(|w| w.to_string()).unwrap_or_default()
        };
        (make, model)
    }
}

/// The numeric id at the end of a detail page URL.
pub fn external_id_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    RE_ADVERT_ID
        .captures(path)
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
pub fn extract_detail_fields(html: &str) -> DetailFields {
    extract_detail_page(html).0
}

/// Runs the three detail strategies in precedence order, plus the page's
/// visible text, from a single parse. A label resolved by an earlier
/// strategy is never overwritten by a later one.
pub fn extract_detail_page(html: &str) -> (DetailFields, String) {
    let document = Html::parse_document(html);
    let lines = page_lines(&document);
    let mut fields = DetailFields::new();

    structural_pass(&document, &mut fields);
    definition_pair_pass(&document, &mut fields);
    line_scan_pass(&lines, &mut fields);

    (fields, lines.join("\n"))
}

/// Bold/label-like elements followed by a short value nearby.
pub fn structural_pass(document: &Html, fields: &mut DetailFields) {
    for el in document.select(&SEL_LABELS) {
        let Some(label) = recognized_label(&element_text(el)) else {
            continue;
        };
        if fields.contains_key(label) {
            continue;
        }

        let next = next_element_sibling(el);
        let parent_next = el
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(next_element_sibling);
        let parent_next_child = parent_next.and_then(first_element_child);

        for candidate in [next, parent_next, parent_next_child].into_iter().flatten() {
            let value = element_text(candidate);
            if is_short_value(&value) && !value.contains('\n') {
                fields.insert(label.to_string(), value);
                break;
            }
        }
    }
}

/// `<dt>label</dt><dd>value</dd>` pairs.
pub fn definition_pair_pass(document: &Html, fields: &mut DetailFields) {
    for dt in document.select(&SEL_DT) {
        let Some(label) = recognized_label(&element_text(dt)) else {
            continue;
        };
        if fields.contains_key(label) {
            continue;
        }
        if let Some(dd) = next_element_sibling(dt) {
            let value = element_text(dd);
            if !value.is_empty() {
                fields.insert(label.to_string(), value);
            }
        }
    }
}

/// "Label" on one line, value on the next.
pub fn line_scan_pass(lines: &[String], fields: &mut DetailFields) {
    for pair in lines.windows(2) {
        let Some(label) = recognized_label(&pair[0]) else {
            continue;
        };
        if !fields.contains_key(label) && is_short_value(&pair[1]) {
            fields.insert(label.to_string(), pair[1].clone());
        }
    }
}

/// Visible text of the page body, one trimmed non-empty line per entry.
pub fn page_lines(document: &Html) -> Vec<String> {
    let mut lines = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().filter_map(ElementRef::wrap).any(|el| {
            matches!(el.value().name(), "head" | "script" | "style" | "noscript" | "template")
        });
        if hidden {
            continue;
        }
        lines.extend(
            text.split('\n')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    }
    lines
}

#[cfg(test)]
pub fn page_text(html: &str) -> String {
    page_lines(&Html::parse_document(html)).join("\n")
}

fn recognized_label(text: &str) -> Option<&'static str> {
    let lowered = text.trim().to_lowercase();
    let label = lowered.strip_suffix(':').unwrap_or(&lowered).trim();
    RECOGNIZED_LABELS.iter().copied().find(|l| *l == label)
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn next_element_sibling(el: ElementRef) -> Option<ElementRef> {
    el.next_siblings().find_map(ElementRef::wrap)
}

fn first_element_child(el: ElementRef) -> Option<ElementRef> {
    el.children().find_map(ElementRef::wrap)
}

fn is_short_value(value: &str) -> bool {
    !value.is_empty() && value.chars().count() < MAX_VALUE_LEN
}

fn has_letters(s: &str) -> bool {
    s.chars().any(char::is_alphabetic)
}

fn parse_price(line: &str) -> Option<(f64, &'static str)> {
    let caps = RE_PRICE.captures(line)?;
    let whole = caps[2].replace(',', "");
    let cents = caps.get(3).map(|m| m.as_str()).unwrap_or("");
    let price: f64 = format!("{whole}{cents}").parse().ok()?;

    let currency = match caps[1].to_uppercase().as_str() {
        "US$" | "USD" => "USD",
        _ => "KYD",
    };
    Some((price, currency))
}

/// A plausible model year: 1950 through next year.
pub fn parse_year(text: &str) -> Option<i32> {
    use chrono::Datelike;
    let max_year = chrono::Utc::now().year() + 1;
    RE_YEAR
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse::<i32>().ok())
        .find(|y| *y <= max_year)
}

fn mileage_number(text: &str) -> Option<i64> {
    let digits: String = text
        .split(|c: char| !(c.is_ascii_digit() || c == ','))
        .find(|s| s.chars().any(|c| c.is_ascii_digit()))?
        .replace(',', "");
    digits.parse().ok()
}

/// Finds mileage in free page text, preferring an explicit label.
fn scan_mileage(full_text: &str) -> Option<(String, i64)> {
    if let Some(caps) = RE_LABELED_MILEAGE.captures(full_text) {
        let number = &caps[1];
        let value = number.replace(',', "").parse().ok()?;
        let text = match caps.get(2) {
            Some(unit) => format!("{number} {}", unit.as_str()),
            None => number.to_string(),
        };
        return Some((text, value));
    }
    let m = RE_MILEAGE.find(full_text)?;
    let value = mileage_number(m.as_str())?;
    Some((m.as_str().split_whitespace().collect::<Vec<_>>().join(" "), value))
}

fn district_in(line: &str) -> Option<&'static str> {
    let lowered = line.to_lowercase();
    DISTRICTS
        .iter()
        .copied()
        .find(|d| lowered.contains(&d.to_lowercase()))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "yes" | "y" | "true" => Some(true),
        "no" | "n" | "false" => Some(false),
        _ => None,
    }
}
