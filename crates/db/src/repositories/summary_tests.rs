//! Tests for the summary query builders.

use rstest::rstest;
use sea_orm::{DbBackend, QueryTrait};
use uuid::Uuid;

use super::*;

fn sql<E: EntityTrait>(query: Select<E>) -> String {
    query.build(DbBackend::Postgres).to_string()
}

#[test]
fn test_unfiltered_query_has_no_where() {
    let built = sql(approvals_totals_query(&SubscriptionFilter::All));
    assert!(!built.contains("WHERE"), "{built}");
    assert!(built.contains(r#"MIN("date_from") AS "approved_from""#), "{built}");
    assert!(built.contains(r#"SUM("amount") AS "approved""#), "{built}");
    assert!(built.contains(r#"GROUP BY "approvals"."subscription_id""#), "{built}");
}

#[test]
fn test_single_filter_uses_equality() {
    let id = Uuid::nil();
    let built = sql(allocations_totals_query(&SubscriptionFilter::One(id)));
    assert!(
        built.contains(&format!(r#""allocations"."subscription_id" = '{id}'"#)),
        "{built}"
    );
}

#[test]
fn test_many_filter_uses_in() {
    let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
    let built = sql(usage_totals_query(&SubscriptionFilter::Many(ids.clone())));
    assert!(built.contains(r#""usage_view"."subscription_id" IN ("#), "{built}");
    for id in ids {
        assert!(built.contains(&id.to_string()), "{built}");
    }
}

#[rstest]
#[case::status(sql(latest_status_query(&SubscriptionFilter::All)))]
#[case::persistence(sql(latest_persistence_query(&SubscriptionFilter::All)))]
#[case::details(sql(latest_details_query(&SubscriptionFilter::All)))]
fn test_latest_queries_pick_newest_row(#[case] built: String) {
    assert!(built.contains("DISTINCT ON"), "{built}");
    assert!(built.contains(r#""id" DESC"#), "{built}");
}

#[test]
fn test_filter_from_ids() {
    let id = Uuid::new_v4();
    assert_eq!(SubscriptionFilter::from_ids(None), SubscriptionFilter::All);
    assert_eq!(SubscriptionFilter::from_ids(Some(&[id])), SubscriptionFilter::One(id));
    assert!(SubscriptionFilter::from_ids(Some(&[])).is_empty());
}
