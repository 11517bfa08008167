use chrono::{DateTime, Duration, TimeZone, Utc};
use loyalty_core::{
    analytics::{TimeRange, TOP_CUSTOMER_LIMIT},
    directory::{DirectoryQuery, SortKey, SortOrder, SpendingBand},
    insight::CustomerInsight,
    model::{MerchantSession, PaymentMethod, TransactionStatus},
    segment::Segment,
    service::{LoyaltyService, NewCustomer, NewTransaction},
    trend::SpendingTrend,
};
use rust_decimal::Decimal;

// ── Test helpers ────────────────────────────────────────────────────────────

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn make_service(seed: u64) -> (LoyaltyService, MerchantSession) {
    let mut service = LoyaltyService::build_test(seed).unwrap();
    let session = service
        .register_merchant("Harbour Café", "HARBOUR", now() - Duration::days(400))
        .unwrap();
    (service, session)
}

fn enrol(
    service: &mut LoyaltyService,
    session: &MerchantSession,
    first: &str,
    joined_days_ago: i64,
) -> String {
    service
        .register_customer(
            session,
            NewCustomer {
                first_name: first.into(),
                last_name:  "Tester".into(),
                email:      Some(format!("{}@example.com", first.to_lowercase())),
                phone:      None,
                code:       None,
            },
            now() - Duration::days(joined_days_ago),
        )
        .unwrap()
        .customer_id
}

/// Record a purchase `days_ago`, offset by `seq` seconds so codes and
/// ordering stay distinct within a day.
fn buy(
    service: &mut LoyaltyService,
    session: &MerchantSession,
    customer_id: &str,
    amount: &str,
    days_ago: i64,
    seq: i64,
    pending: bool,
) -> String {
    service
        .record_transaction(
            session,
            NewTransaction {
                customer_id:    customer_id.into(),
                amount:         amount.parse::<Decimal>().unwrap(),
                payment_method: PaymentMethod::Card,
                notes:          None,
                currency:       None,
                pending,
            },
            now() - Duration::days(days_ago) - Duration::seconds(seq),
        )
        .unwrap()
        .transaction
        .transaction_id
}

fn by_name<'a>(insights: &'a [CustomerInsight], first: &str) -> &'a CustomerInsight {
    insights
        .iter()
        .find(|i| i.first_name == first)
        .unwrap_or_else(|| panic!("no insight for {first}"))
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Pending and cancelled purchases are invisible to every derived metric.
#[test]
fn only_completed_transactions_count() {
    let (mut service, session) = make_service(21);
    let ada = enrol(&mut service, &session, "Ada", 200);

    buy(&mut service, &session, &ada, "100", 1, 0, false);
    buy(&mut service, &session, &ada, "500", 0, 0, true);
    let cancelled = buy(&mut service, &session, &ada, "300", 0, 1, true);
    service
        .close_transaction(&session, &cancelled, TransactionStatus::Cancelled)
        .unwrap();

    let stored = service.store().transaction(&session.merchant_id, &cancelled).unwrap();
    assert_eq!(stored.status, TransactionStatus::Cancelled);

    let insights = service.customer_insights(&session, now()).unwrap();
    let i = by_name(&insights, "Ada");
    assert_eq!(i.total_spent, Decimal::from(100));
    assert_eq!(i.total_transactions, 1);
    assert_eq!(i.days_since_last_visit, Some(1));
    assert_eq!(i.last_transaction.as_ref().unwrap().amount, Decimal::from(100));
    assert_eq!(i.loyalty_points, 100);
}

/// Segments are assigned against the merchant-wide average spend.
#[test]
fn segments_from_stored_history() {
    let (mut service, session) = make_service(22);
    let big = enrol(&mut service, &session, "Big", 200);
    let mid = enrol(&mut service, &session, "Mid", 200);
    let gone = enrol(&mut service, &session, "Gone", 200);
    let fresh = enrol(&mut service, &session, "Fresh", 5);
    enrol(&mut service, &session, "Never", 200);

    buy(&mut service, &session, &big, "900", 3, 0, false);
    buy(&mut service, &session, &mid, "60", 5, 0, false);
    buy(&mut service, &session, &gone, "40", 120, 0, false);
    buy(&mut service, &session, &fresh, "0.50", 1, 0, false);

    // average = 1000.50 / 5 = 200.10
    let insights = service.customer_insights(&session, now()).unwrap();
    assert_eq!(insights.len(), 5);
    assert_eq!(by_name(&insights, "Big").segment, Segment::Vip);
    assert_eq!(by_name(&insights, "Mid").segment, Segment::Regular);
    assert_eq!(by_name(&insights, "Gone").segment, Segment::Inactive);
    assert_eq!(by_name(&insights, "Fresh").segment, Segment::New);

    let never = by_name(&insights, "Never");
    assert_eq!(never.segment, Segment::Inactive);
    assert_eq!(never.days_since_last_visit, None);
    assert_eq!(never.average_order_value, Decimal::ZERO);
}

/// 100 in the last 30 days against 50 in the 30 before is an upward trend.
#[test]
fn spending_trend_from_two_windows() {
    let (mut service, session) = make_service(23);
    let ada = enrol(&mut service, &session, "Ada", 300);
    buy(&mut service, &session, &ada, "100", 10, 0, false);
    buy(&mut service, &session, &ada, "50", 40, 0, false);

    let insights = service.customer_insights(&session, now()).unwrap();
    let i = by_name(&insights, "Ada");
    assert_eq!(i.spending_trend, SpendingTrend::Up);
    assert_eq!(i.recent_spending, Decimal::from(100));
    assert_eq!(i.customer_lifetime_value, Decimal::from(150));
    assert_eq!(i.average_order_value, Decimal::from(75));
    // 2 visits over 10 months
    assert_eq!(i.visit_frequency, "0.2".parse::<Decimal>().unwrap());
}

/// The same store and `now` give identical insights on every read.
#[test]
fn insights_are_recomputed_deterministically() {
    let (mut service, session) = make_service(24);
    let ada = enrol(&mut service, &session, "Ada", 90);
    let bob = enrol(&mut service, &session, "Bob", 90);
    buy(&mut service, &session, &ada, "12.34", 2, 0, false);
    buy(&mut service, &session, &bob, "56.78", 33, 0, false);

    let first = service.customer_insights(&session, now()).unwrap();
    let second = service.customer_insights(&session, now()).unwrap();
    assert_eq!(first, second);
}

/// One merchant never sees another merchant's customers.
#[test]
fn insights_are_scoped_to_the_session_merchant() {
    let (mut service, harbour) = make_service(25);
    let other = service
        .register_merchant("Hilltop Deli", "HILLTOP", now() - Duration::days(400))
        .unwrap();
    let ada = enrol(&mut service, &harbour, "Ada", 100);
    let zed = enrol(&mut service, &other, "Zed", 100);
    buy(&mut service, &harbour, &ada, "10", 1, 0, false);
    buy(&mut service, &other, &zed, "20", 1, 1, false);

    let harbour_view = service.customer_insights(&harbour, now()).unwrap();
    assert_eq!(harbour_view.len(), 1);
    assert_eq!(harbour_view[0].first_name, "Ada");

    let err = service.store().customer(&harbour.merchant_id, &zed).unwrap_err();
    assert!(matches!(err, loyalty_core::error::LoyaltyError::NotFound { .. }));
}

/// Analytics rank top customers by spend and keep five.
#[test]
fn analytics_top_customers_capped() {
    let (mut service, session) = make_service(26);
    for n in 1..=7 {
        let id = enrol(&mut service, &session, &format!("C{n}"), 100);
        buy(&mut service, &session, &id, &format!("{}", n * 10), 1, n, false);
    }

    let report = service
        .analytics(&session, TimeRange::Week, now())
        .unwrap()
        .expect("completed transactions exist");
    assert_eq!(report.total_transactions, 7);
    assert_eq!(report.unique_customers, 7);
    assert_eq!(report.total_sales, Decimal::from(280));
    assert_eq!(report.top_customers.len(), TOP_CUSTOMER_LIMIT);
    assert_eq!(report.top_customers[0].name, "C7 Tester");
    assert_eq!(report.top_customers[0].total, Decimal::from(70));
    assert!(report
        .top_customers
        .windows(2)
        .all(|w| w[0].total >= w[1].total));
}

/// A merchant with nothing completed gets no report.
#[test]
fn analytics_without_sales_is_none() {
    let (mut service, session) = make_service(27);
    let ada = enrol(&mut service, &session, "Ada", 10);
    buy(&mut service, &session, &ada, "15", 0, 0, true);

    assert!(service
        .analytics(&session, TimeRange::Month, now())
        .unwrap()
        .is_none());
}

/// Directory filters by spending band and sorts over live insights.
#[test]
fn directory_over_stored_customers() {
    let (mut service, session) = make_service(28);
    let amounts = [("Ann", "300"), ("Ben", "100"), ("Cat", "20"), ("Dan", "80")];
    for (i, (name, amount)) in amounts.iter().enumerate() {
        let id = enrol(&mut service, &session, name, 100);
        buy(&mut service, &session, &id, amount, 2, i as i64, false);
    }

    let high = service
        .customer_directory(
            &session,
            &DirectoryQuery {
                spending: Some(SpendingBand::High),
                ..Default::default()
            },
            now(),
        )
        .unwrap();
    assert_eq!(high.total_count, 1);
    assert_eq!(high.customers[0].first_name, "Ann");

    let by_spend = service
        .customer_directory(
            &session,
            &DirectoryQuery {
                sort_by: SortKey::TotalSpent,
                order: SortOrder::Desc,
                ..Default::default()
            },
            now(),
        )
        .unwrap();
    let names: Vec<_> = by_spend.customers.iter().map(|c| c.first_name.as_str()).collect();
    assert_eq!(names, vec!["Ann", "Ben", "Dan", "Cat"]);
    assert_eq!(by_spend.total_pages, 1);
}
