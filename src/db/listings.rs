use crate::db::connection::Database;
use crate::domain::changes::{ListingChange, TrackedListing};
use crate::domain::{Listing, ReconcileResult, ReconcileSummary};
use crate::errors::AppError;
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as RusqliteResult};
use tracing::{debug, error, info};

/// Reconciles every listing against the store.
///
/// Each listing gets its own transaction; a failure is logged, counted and
/// the pass moves on to the next listing.
pub fn save_listings(db: &Database, listings: &[Listing]) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();

    for listing in listings {
        match db.with_conn(|conn| reconcile_listing(conn, listing)) {
            Ok(result) => summary.record(result),
            Err(e) => {
                error!(external_id = %listing.external_id, error = %e, "failed to save listing");
                summary.errors += 1;
            }
        }
    }

    info!(
        inserted = summary.inserted,
        updated = summary.updated,
        price_changed = summary.price_changed,
        errors = summary.errors,
        "reconciliation complete"
    );
    summary
}

/// Classifies one listing against the stored state and persists it.
pub fn reconcile_listing(conn: &mut Connection, listing: &Listing) -> Result<ReconcileResult, AppError> {
    if listing.external_id.is_empty() {
        return Err(AppError::InvalidListing(format!("no external id for {}", listing.url)));
    }

    let now = Utc::now().naive_utc();
    let tx = conn.transaction()?;

    let result = match find_listing_by_external_id(&tx, &listing.external_id)? {
        Some(tracked) => {
            let changes = tracked.diff(listing);
            let price_changed = changes.iter().any(|c| c.field_name == "price");

            log_changes(&tx, &changes, now)?;
            update_listing(&tx, tracked.id, listing, price_changed, now)?;
            if price_changed {
                log_price(&tx, tracked.id, Some(tracked.price), listing.price, now)?;
                info!(
                    external_id = %listing.external_id,
                    old = tracked.price,
                    new = listing.price,
                    "price changed"
                );
            }
            debug!(external_id = %listing.external_id, changes = changes.len(), "updated");
            ReconcileResult::updated(price_changed)
        }
        None => {
            let id = insert_listing(&tx, listing, now)?;
            log_price(&tx, id, None, listing.price, now)?;
            debug!(external_id = %listing.external_id, id, "inserted");
            ReconcileResult::inserted()
        }
    };

    tx.commit()?;
    Ok(result)
}

fn find_listing_by_external_id(
    conn: &Connection,
    external_id: &str,
) -> Result<Option<TrackedListing>, AppError> {
    conn.query_row(
        r#"
        SELECT id, title, price, make, model, year, mileage
        FROM listings
        WHERE external_id = ?1
        "#,
        params![external_id],
        |row| {
            Ok(TrackedListing {
                id: row.get(0)?,
                title: row.get(1)?,
                price: row.get(2)?,
                make: row.get(3)?,
                model: row.get(4)?,
                year: row.get(5)?,
                mileage: row.get(6)?,
            })
        },
    )
    .optional()
    .map_err(|e| AppError::DbError(e.to_string()))
}

fn insert_listing(tx: &Connection, l: &Listing, now: NaiveDateTime) -> RusqliteResult<i64> {
    let mut stmt = tx.prepare(
        r#"
        INSERT INTO listings (
            external_id, title, price, currency, url,
            make, model, year, mileage, mileage_value, image_url, location,
            body_type, drive, cylinders, fuel_type, transmission, steering,
            exterior_color, interior_color, doors, on_island, vehicle_condition,
            first_seen_at, last_seen_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9, ?10, ?11, ?12,
            ?13, ?14, ?15, ?16, ?17, ?18,
            ?19, ?20, ?21, ?22, ?23,
            ?24, ?25
        )
        "#,
    )?;
    stmt.execute(params![
        &l.external_id,
        &l.title,
        l.price,
        &l.currency,
        &l.url,
        &l.make,
        &l.model,
        l.year,
        &l.mileage,
        l.mileage_value,
        &l.image_url,
        &l.location,
        &l.body_type,
        &l.drive,
        &l.cylinders,
        &l.fuel_type,
        &l.transmission,
        &l.steering,
        &l.exterior_color,
        &l.interior_color,
        &l.doors,
        l.on_island,
        &l.condition,
        now,
        now,
    ])?;
    Ok(tx.last_insert_rowid())
}

/// Overwrites the mutable fields. Empty make/model and absent detail fields
/// keep what is already stored.
fn update_listing(
    tx: &Connection,
    id: i64,
    l: &Listing,
    price_changed: bool,
    now: NaiveDateTime,
) -> RusqliteResult<()> {
    let price_changed_at = price_changed.then_some(now);

    tx.execute(
        r#"
        UPDATE listings SET
            title = ?1, price = ?2, currency = ?3, url = ?4,
            make = COALESCE(NULLIF(?5, ''), make),
            model = COALESCE(NULLIF(?6, ''), model),
            year = COALESCE(?7, year),
            mileage = ?8,
            mileage_value = COALESCE(?9, mileage_value),
            image_url = ?10, location = ?11,
            body_type = COALESCE(?12, body_type),
            drive = COALESCE(?13, drive),
            cylinders = COALESCE(?14, cylinders),
            fuel_type = COALESCE(?15, fuel_type),
            transmission = COALESCE(?16, transmission),
            steering = COALESCE(?17, steering),
            exterior_color = COALESCE(?18, exterior_color),
            interior_color = COALESCE(?19, interior_color),
            doors = COALESCE(?20, doors),
            on_island = COALESCE(?21, on_island),
            vehicle_condition = COALESCE(?22, vehicle_condition),
            last_seen_at = ?23,
            price_changed_at = COALESCE(?24, price_changed_at)
        WHERE id = ?25
        "#,
        params![
            &l.title,
            l.price,
            &l.currency,
            &l.url,
            &l.make,
            &l.model,
            l.year,
            &l.mileage,
            l.mileage_value,
            &l.image_url,
            &l.location,
            &l.body_type,
            &l.drive,
            &l.cylinders,
            &l.fuel_type,
            &l.transmission,
            &l.steering,
            &l.exterior_color,
            &l.interior_color,
            &l.doors,
            l.on_island,
            &l.condition,
            now,
            price_changed_at,
            id,
        ],
    )?;
    Ok(())
}

/// Inserts a batch of changes into the `listing_history` table.
fn log_changes(tx: &Connection, changes: &[ListingChange], now: NaiveDateTime) -> RusqliteResult<()> {
    let mut stmt = tx.prepare(
        r#"
        INSERT INTO listing_history (listing_id, observed_at, field_name, previous_value, current_value)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )?;
    for change in changes {
        stmt.execute(params![
            change.listing_id,
            now,
            &change.field_name,
            &change.previous_value,
            &change.current_value,
        ])?;
    }
    Ok(())
}

fn log_price(
    tx: &Connection,
    listing_id: i64,
    old_price: Option<f64>,
    new_price: f64,
    now: NaiveDateTime,
) -> RusqliteResult<()> {
    tx.execute(
        "INSERT INTO price_history (listing_id, old_price, new_price, observed_at) VALUES (?1, ?2, ?3, ?4)",
        params![listing_id, old_price, new_price, now],
    )?;
    Ok(())
}
