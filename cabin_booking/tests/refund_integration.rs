//! Integration tests for cancellation refunds.

mod common;

use cabin_booking::booking::{Booking, BookingStatus, Property};
use cabin_booking::events::BookingEvent;
use cabin_booking::locker::{BookingLocker, LockerConfig};
use cabin_booking::refund::{
    CachedRefundPolicy, ImmediateRefundStatus, PgRefundPolicy, RefundError, RefundOutcome,
    RefundResolver, RefundStatus,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use common::*;
use serial_test::serial;
use sqlx::PgPool;
use std::sync::Arc;

const CHECKIN: (i32, u32, u32) = (2033, 6, 20);

fn checkin() -> NaiveDate {
    date(CHECKIN.0, CHECKIN.1, CHECKIN.2)
}

/// Noon UTC `days` days before checkin
fn days_before(days: u64) -> DateTime<Utc> {
    let day = checkin() - chrono::Days::new(days);
    Utc.from_utc_datetime(&day.and_hms_opt(12, 0, 0).unwrap())
}

/// Helper to create a paid per-guest booking of 18000 USD
async fn paid_booking(locker: &BookingLocker) -> Booking {
    let hold = locker
        .create_per_guest_booking(11, Property::Lakeshore, stay(checkin(), 2), party(2))
        .await
        .unwrap();
    let booking = locker
        .confirm_booking_with_payment(hold.id, "pay_refund_test")
        .await
        .unwrap();
    assert_eq!(booking.total_price.amount, 18_000);
    booking
}

fn resolver(
    pool: Arc<PgPool>,
    locker: BookingLocker,
    payments: Arc<RecordingPaymentGateway>,
) -> RefundResolver {
    let policy = Arc::new(CachedRefundPolicy::new(Arc::new(PgRefundPolicy::new(pool))));
    RefundResolver::new(locker, policy, payments)
}

#[tokio::test]
#[serial]
async fn test_full_refund_rule_still_needs_review() {
    let pool = setup_test_db().await;
    reset(&pool).await;
    add_refund_rule(&pool, Property::Lakeshore, "per_guest", 30, 100).await;
    add_refund_rule(&pool, Property::Lakeshore, "per_guest", 7, 0).await;
    let (locker, mut events) = locker(pool.clone(), LockerConfig::default());
    let payments = Arc::new(RecordingPaymentGateway::default());
    let resolver = resolver(pool.clone(), locker.clone(), payments.clone());
    let booking = paid_booking(&locker).await;
    drain(&mut events);

    let cancellation = resolver
        .cancel_booking(booking.id, days_before(30), "plans changed")
        .await
        .unwrap();

    assert_eq!(cancellation.booking.status, BookingStatus::Canceled);
    let RefundOutcome::PendingReview(pending) = cancellation.refund else {
        panic!("A matching rule must produce a pending refund");
    };
    assert_eq!(pending.status, RefundStatus::Pending);
    assert_eq!(pending.applied_rule.days_before_checkin, 30);
    assert_eq!(pending.applied_rule.refund_percentage, 100);
    assert_eq!(pending.policy_refund_amount.amount, 18_000);
    assert_eq!(pending.payment_reference.as_deref(), Some("pay_refund_test"));
    assert_eq!(pending.cancellation_reason, "plans changed");
    assert!(payments.refunds().is_empty(), "No money moves before review");

    let names: Vec<_> = drain(&mut events).iter().map(BookingEvent::name).collect();
    assert_eq!(names, vec!["booking_canceled", "refund_pending"]);

    let stored = resolver.pending_refund_for(booking.id).await.unwrap();
    assert_eq!(stored.map(|p| p.id), Some(pending.id));
}

#[tokio::test]
#[serial]
async fn test_no_policy_refunds_immediately() {
    let pool = setup_test_db().await;
    reset(&pool).await;
    // A rule for another mode does not apply
    add_refund_rule(&pool, Property::Lakeshore, "buyout", 7, 50).await;
    let (locker, mut events) = locker(pool.clone(), LockerConfig::default());
    let payments = Arc::new(RecordingPaymentGateway::default());
    let resolver = resolver(pool.clone(), locker.clone(), payments.clone());
    let booking = paid_booking(&locker).await;
    drain(&mut events);

    let cancellation = resolver
        .cancel_booking(booking.id, days_before(10), "")
        .await
        .unwrap();

    assert_eq!(cancellation.booking.status, BookingStatus::Canceled);
    match &cancellation.refund {
        RefundOutcome::Immediate {
            amount,
            processor_reference,
        } => {
            assert_eq!(amount.amount, 18_000);
            assert!(processor_reference.is_some());
        }
        other => panic!("Expected an immediate refund, got {other:?}"),
    }
    assert_eq!(
        payments.refunds(),
        vec![("pay_refund_test".to_string(), booking.total_price.clone())]
    );
    assert!(resolver.pending_refund_for(booking.id).await.unwrap().is_none());
    let recorded = resolver.immediate_refund_for(booking.id).await.unwrap().unwrap();
    assert_eq!(recorded.status, ImmediateRefundStatus::Issued);
    assert_eq!(recorded.attempts, 1);

    let names: Vec<_> = drain(&mut events).iter().map(BookingEvent::name).collect();
    assert_eq!(names, vec!["booking_canceled", "refund_issued"]);
}

#[tokio::test]
#[serial]
async fn test_zero_percent_rule_creates_pending_zero_refund() {
    let pool = setup_test_db().await;
    reset(&pool).await;
    add_refund_rule(&pool, Property::Lakeshore, "per_guest", 7, 0).await;
    let (locker, _events) = locker(pool.clone(), LockerConfig::default());
    let payments = Arc::new(RecordingPaymentGateway::default());
    let resolver = resolver(pool.clone(), locker.clone(), payments.clone());
    let booking = paid_booking(&locker).await;

    let cancellation = resolver
        .cancel_booking(booking.id, days_before(5), "")
        .await
        .unwrap();
    let RefundOutcome::PendingReview(pending) = cancellation.refund else {
        panic!("The 7-day rule covers the last week before checkin");
    };
    assert_eq!(pending.applied_rule.days_before_checkin, 7);
    assert_eq!(pending.policy_refund_amount.amount, 0);
    assert_eq!(pending.status, RefundStatus::Pending);
    assert!(payments.refunds().is_empty());
}

#[tokio::test]
#[serial]
async fn test_cancel_after_checkin_refunds_nothing() {
    let pool = setup_test_db().await;
    reset(&pool).await;
    let (locker, _events) = locker(pool.clone(), LockerConfig::default());
    let payments = Arc::new(RecordingPaymentGateway::default());
    let resolver = resolver(pool.clone(), locker.clone(), payments.clone());
    let booking = paid_booking(&locker).await;

    let day_after = checkin() + chrono::Days::new(1);
    let canceled_at = Utc.from_utc_datetime(&day_after.and_hms_opt(9, 0, 0).unwrap());
    let cancellation = resolver
        .cancel_booking(booking.id, canceled_at, "no show")
        .await
        .unwrap();

    assert_eq!(cancellation.refund.amount().amount, 0);
    assert!(payments.refunds().is_empty(), "Zero refunds skip the processor");
    assert!(resolver.immediate_refund_for(booking.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_only_complete_bookings_can_be_canceled() {
    let pool = setup_test_db().await;
    reset(&pool).await;
    let (locker, _events) = locker(pool.clone(), LockerConfig::default());
    let payments = Arc::new(RecordingPaymentGateway::default());
    let resolver = resolver(pool.clone(), locker.clone(), payments);

    let hold = locker
        .create_per_guest_booking(1, Property::Ridge, stay(checkin(), 1), party(1))
        .await
        .unwrap();
    let err = resolver
        .cancel_booking(hold.id, days_before(3), "")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RefundError::NotCancelable {
            status: BookingStatus::Hold,
            ..
        }
    ));

    let booking = paid_booking(&locker).await;
    resolver
        .cancel_booking(booking.id, days_before(3), "")
        .await
        .unwrap();
    let again = resolver
        .cancel_booking(booking.id, days_before(2), "")
        .await
        .unwrap_err();
    assert_eq!(again.kind(), "not_cancelable");
}

#[tokio::test]
#[serial]
async fn test_failed_immediate_refund_stays_owed_until_retried() {
    let pool = setup_test_db().await;
    reset(&pool).await;
    let (locker, mut events) = locker(pool.clone(), LockerConfig::default());
    let payments = Arc::new(RecordingPaymentGateway::failing());
    let resolver = resolver(pool.clone(), locker.clone(), payments.clone());
    let booking = paid_booking(&locker).await;
    drain(&mut events);

    let err = resolver
        .cancel_booking(booking.id, days_before(20), "")
        .await
        .unwrap_err();
    match err {
        RefundError::RefundOwed {
            booking_id,
            amount,
            payment_reference,
            attempts,
            ..
        } => {
            assert_eq!(booking_id, booking.id);
            assert_eq!(amount.amount, 18_000);
            assert_eq!(payment_reference.as_deref(), Some("pay_refund_test"));
            assert_eq!(attempts, 1);
        }
        other => panic!("Expected an owed refund, got {other:?}"),
    }

    // The cancellation committed; only the payment is outstanding
    let repo = cabin_booking::db::PgBookingRepository::new(pool.clone());
    let stored = cabin_booking::db::BookingRepository::get_booking(&repo, booking.id)
        .await
        .unwrap();
    assert_eq!(stored.status, BookingStatus::Canceled);

    let owed = resolver
        .immediate_refund_for(booking.id)
        .await
        .unwrap()
        .expect("The owed refund must be recorded");
    assert_eq!(owed.status, ImmediateRefundStatus::Failed);
    assert_eq!(owed.amount.amount, 18_000);
    assert!(owed.last_error.as_deref().unwrap().contains("processor offline"));

    let unsettled = resolver.unsettled_refunds(10).await.unwrap();
    assert_eq!(unsettled.len(), 1);
    assert_eq!(unsettled[0].booking_id, booking.id);

    // Still down: the attempt is counted and nothing is paid
    let again = resolver.retry_refund(booking.id).await.unwrap_err();
    assert!(matches!(again, RefundError::RefundOwed { attempts: 2, .. }));
    assert!(payments.refunds().is_empty());

    payments.set_failing(false);
    let issued = resolver.retry_refund(booking.id).await.unwrap();
    assert_eq!(issued.status, ImmediateRefundStatus::Issued);
    assert_eq!(issued.attempts, 3);
    assert!(issued.processor_reference.is_some());
    assert_eq!(
        payments.refunds(),
        vec![("pay_refund_test".to_string(), booking.total_price.clone())]
    );

    // Settled refunds are returned as they are
    let settled = resolver.retry_refund(booking.id).await.unwrap();
    assert_eq!(settled, issued);
    assert_eq!(payments.refunds().len(), 1);
    assert!(resolver.unsettled_refunds(10).await.unwrap().is_empty());

    let names: Vec<_> = drain(&mut events).iter().map(BookingEvent::name).collect();
    assert_eq!(names, vec!["booking_canceled", "refund_issued"]);
}

#[tokio::test]
#[serial]
async fn test_retry_without_owed_refund_is_not_found() {
    let pool = setup_test_db().await;
    reset(&pool).await;
    let (locker, _events) = locker(pool.clone(), LockerConfig::default());
    let payments = Arc::new(RecordingPaymentGateway::default());
    let resolver = resolver(pool.clone(), locker.clone(), payments);
    let booking = paid_booking(&locker).await;

    let err = resolver.retry_refund(booking.id).await.unwrap_err();
    assert!(matches!(err, RefundError::ImmediateRefundNotFound(id) if id == booking.id));
}

#[tokio::test]
#[serial]
async fn test_review_approves_or_rejects_once() {
    let pool = setup_test_db().await;
    reset(&pool).await;
    add_refund_rule(&pool, Property::Lakeshore, "per_guest", 14, 50).await;
    let (locker, mut events) = locker(pool.clone(), LockerConfig::default());
    let payments = Arc::new(RecordingPaymentGateway::default());
    let resolver = resolver(pool.clone(), locker.clone(), payments.clone());

    let first = paid_booking(&locker).await;
    let pending = match resolver
        .cancel_booking(first.id, days_before(20), "")
        .await
        .unwrap()
        .refund
    {
        RefundOutcome::PendingReview(pending) => pending,
        other => panic!("Expected review, got {other:?}"),
    };
    assert_eq!(pending.policy_refund_amount.amount, 9_000);

    let too_much = resolver.approve(pending.id, 900, Some(18_001), "").await;
    assert!(matches!(too_much, Err(RefundError::InvalidAmount(18_001))));

    drain(&mut events);
    let approved = resolver
        .approve(pending.id, 900, Some(12_000), "goodwill")
        .await
        .unwrap();
    assert_eq!(approved.status, RefundStatus::Approved);
    assert_eq!(approved.reviewed_by, Some(900));
    assert_eq!(approved.payable_amount().amount, 12_000);
    assert_eq!(payments.refunds().len(), 1);
    assert_eq!(payments.refunds()[0].1.amount, 12_000);
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        BookingEvent::RefundIssued { booking_id, .. } if *booking_id == first.id
    )));

    let twice = resolver.approve(pending.id, 900, None, "").await;
    assert!(matches!(
        twice,
        Err(RefundError::AlreadyReviewed {
            status: RefundStatus::Approved,
            ..
        })
    ));
    assert_eq!(payments.refunds().len(), 1);

    let second = paid_booking(&locker).await;
    let pending = match resolver
        .cancel_booking(second.id, days_before(15), "")
        .await
        .unwrap()
        .refund
    {
        RefundOutcome::PendingReview(pending) => pending,
        other => panic!("Expected review, got {other:?}"),
    };
    let rejected = resolver
        .reject(pending.id, 901, "outside terms")
        .await
        .unwrap();
    assert_eq!(rejected.status, RefundStatus::Rejected);
    assert_eq!(rejected.admin_notes, "outside terms");
    assert_eq!(payments.refunds().len(), 1, "Rejection moves no money");
}
