use crate::db::listings::{reconcile_listing, save_listings};
use crate::domain::{ReconcileResult, ReconcileSummary};
use crate::tests::utils::{make_db, sample_listing};

#[test]
fn price_drop_is_an_update_with_price_change() {
    let (_dir, db) = make_db();

    let first = db
        .with_conn(|conn| reconcile_listing(conn, &sample_listing("12345", 15000.0)))
        .unwrap();
    assert_eq!(
        first,
        ReconcileResult {
            inserted: true,
            updated: false,
            price_changed: false
        }
    );

    let second = db
        .with_conn(|conn| reconcile_listing(conn, &sample_listing("12345", 14500.0)))
        .unwrap();
    assert_eq!(
        second,
        ReconcileResult {
            inserted: false,
            updated: true,
            price_changed: true
        }
    );

    let (price, changed_at): (f64, Option<String>) = db
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT price, price_changed_at FROM listings WHERE external_id = '12345'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?)
        })
        .unwrap();
    assert_eq!(price, 14500.0);
    assert!(changed_at.is_some());

    let history: Vec<(Option<f64>, f64)> = db
        .with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT old_price, new_price FROM price_history ORDER BY id")?;
            let rows = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .unwrap();
    assert_eq!(history, vec![(None, 15000.0), (Some(15000.0), 14500.0)]);
}

#[test]
fn same_price_is_an_update_without_price_change() {
    let (_dir, db) = make_db();
    let mut listing = sample_listing("900", 22000.0);

    db.with_conn(|conn| reconcile_listing(conn, &listing)).unwrap();
    listing.title = "2016 Toyota RAV4 XLE - one owner".to_string();
    let result = db.with_conn(|conn| reconcile_listing(conn, &listing)).unwrap();

    assert_eq!(result, ReconcileResult::updated(false));

    let title: String = db
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT title FROM listings WHERE external_id = '900'",
                [],
                |r| r.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(title, "2016 Toyota RAV4 XLE - one owner");
}

#[test]
fn one_bad_record_does_not_stop_the_pass() {
    let (_dir, db) = make_db();

    let listings = vec![
        sample_listing("1", 9000.0),
        sample_listing("", 9000.0),
        sample_listing("2", 12000.0),
    ];
    let summary = save_listings(&db, &listings);

    assert_eq!(
        summary,
        ReconcileSummary {
            inserted: 2,
            updated: 0,
            price_changed: 0,
            errors: 1,
        }
    );

    let rescrape = vec![sample_listing("1", 8500.0), sample_listing("2", 12000.0)];
    let summary = save_listings(&db, &rescrape);
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.updated, 2);
    assert_eq!(summary.price_changed, 1);
    assert_eq!(summary.errors, 0);
}
