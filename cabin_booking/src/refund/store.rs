//! Pending and immediate refund persistence.

use super::errors::{RefundError, RefundResult};
use super::models::{
    ImmediateRefund, ImmediateRefundStatus, PendingRefund, PendingRefundId, RefundRule, RefundStatus,
};
use crate::booking::{BookingError, BookingId, Money, UserId};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{PgConnection, Row, postgres::PgRow};

const PENDING_REFUND_COLUMNS: &str = "id, booking_id, payment_reference, policy_refund_amount, \
     admin_refund_amount, currency, status, applied_rule_days_before_checkin, \
     applied_rule_refund_percentage, cancellation_reason, admin_notes, reviewed_by, \
     reviewed_at, created_at";

fn pending_refund_from_row(row: &PgRow) -> RefundResult<PendingRefund> {
    let currency: String = row.get("currency");
    let status = row
        .get::<&str, _>("status")
        .parse()
        .map_err(|e: String| BookingError::Database(sqlx::Error::Decode(e.into())))?;

    Ok(PendingRefund {
        id: row.get("id"),
        booking_id: row.get("booking_id"),
        payment_reference: row.get("payment_reference"),
        policy_refund_amount: Money::new(row.get("policy_refund_amount"), currency.clone()),
        admin_refund_amount: row
            .get::<Option<i64>, _>("admin_refund_amount")
            .map(|amount| Money::new(amount, currency)),
        status,
        applied_rule: RefundRule::new(
            row.get("applied_rule_days_before_checkin"),
            row.get("applied_rule_refund_percentage"),
        ),
        cancellation_reason: row.get("cancellation_reason"),
        admin_notes: row.get("admin_notes"),
        reviewed_by: row.get("reviewed_by"),
        reviewed_at: row
            .get::<Option<NaiveDateTime>, _>("reviewed_at")
            .map(|at| at.and_utc()),
        created_at: row.get::<NaiveDateTime, _>("created_at").and_utc(),
    })
}

/// Record a refund awaiting review
pub async fn insert(
    conn: &mut PgConnection,
    booking_id: BookingId,
    payment_reference: Option<&str>,
    amount: &Money,
    rule: RefundRule,
    reason: &str,
) -> RefundResult<PendingRefund> {
    let sql = format!(
        r#"
        INSERT INTO pending_refunds (
            booking_id, payment_reference, policy_refund_amount, currency,
            applied_rule_days_before_checkin, applied_rule_refund_percentage,
            cancellation_reason
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {PENDING_REFUND_COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(booking_id)
        .bind(payment_reference)
        .bind(amount.amount)
        .bind(&amount.currency)
        .bind(rule.days_before_checkin)
        .bind(rule.refund_percentage)
        .bind(reason)
        .fetch_one(conn)
        .await?;

    pending_refund_from_row(&row)
}

/// Fetch the pending refund recorded for a booking, if any
pub async fn fetch_for_booking(
    conn: &mut PgConnection,
    booking_id: BookingId,
) -> RefundResult<Option<PendingRefund>> {
    let sql = format!("SELECT {PENDING_REFUND_COLUMNS} FROM pending_refunds WHERE booking_id = $1");
    let row = sqlx::query(&sql)
        .bind(booking_id)
        .fetch_optional(conn)
        .await?;

    row.as_ref().map(pending_refund_from_row).transpose()
}

/// Lock a pending refund for review
///
/// # Errors
///
/// * `RefundError::PendingRefundNotFound` - No such pending refund
pub async fn lock(conn: &mut PgConnection, id: PendingRefundId) -> RefundResult<PendingRefund> {
    let sql = format!("SELECT {PENDING_REFUND_COLUMNS} FROM pending_refunds WHERE id = $1 FOR UPDATE");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(RefundError::PendingRefundNotFound(id))?;

    pending_refund_from_row(&row)
}

/// Store the reviewer's decision on a `pending` refund
pub async fn record_review(
    conn: &mut PgConnection,
    id: PendingRefundId,
    status: RefundStatus,
    reviewed_by: UserId,
    admin_amount: Option<i64>,
    notes: &str,
) -> RefundResult<DateTime<Utc>> {
    let reviewed_at: NaiveDateTime = sqlx::query_scalar(
        r#"
        UPDATE pending_refunds
        SET status = $2,
            reviewed_by = $3,
            admin_refund_amount = $4,
            admin_notes = $5,
            reviewed_at = NOW()
        WHERE id = $1 AND status = 'pending'
        RETURNING reviewed_at
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(reviewed_by)
    .bind(admin_amount)
    .bind(notes)
    .fetch_one(conn)
    .await?;

    Ok(reviewed_at.and_utc())
}

const IMMEDIATE_REFUND_COLUMNS: &str = "booking_id, payment_reference, amount, currency, status, \
     processor_reference, attempts, last_error, created_at, updated_at";

fn immediate_refund_from_row(row: &PgRow) -> RefundResult<ImmediateRefund> {
    let status: ImmediateRefundStatus = row
        .get::<&str, _>("status")
        .parse()
        .map_err(|e: String| BookingError::Database(sqlx::Error::Decode(e.into())))?;

    Ok(ImmediateRefund {
        booking_id: row.get("booking_id"),
        payment_reference: row.get("payment_reference"),
        amount: Money::new(row.get("amount"), row.get::<String, _>("currency")),
        status,
        processor_reference: row.get("processor_reference"),
        attempts: row.get("attempts"),
        last_error: row.get("last_error"),
        created_at: row.get::<NaiveDateTime, _>("created_at").and_utc(),
        updated_at: row.get::<NaiveDateTime, _>("updated_at").and_utc(),
    })
}

/// Record a refund owed without review
pub async fn insert_immediate(
    conn: &mut PgConnection,
    booking_id: BookingId,
    payment_reference: Option<&str>,
    amount: &Money,
) -> RefundResult<ImmediateRefund> {
    let sql = format!(
        r#"
        INSERT INTO immediate_refunds (booking_id, payment_reference, amount, currency)
        VALUES ($1, $2, $3, $4)
        RETURNING {IMMEDIATE_REFUND_COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(booking_id)
        .bind(payment_reference)
        .bind(amount.amount)
        .bind(&amount.currency)
        .fetch_one(conn)
        .await?;

    immediate_refund_from_row(&row)
}

/// Fetch the immediate refund recorded for a booking, if any
pub async fn fetch_immediate(
    conn: &mut PgConnection,
    booking_id: BookingId,
) -> RefundResult<Option<ImmediateRefund>> {
    let sql = format!("SELECT {IMMEDIATE_REFUND_COLUMNS} FROM immediate_refunds WHERE booking_id = $1");
    let row = sqlx::query(&sql)
        .bind(booking_id)
        .fetch_optional(conn)
        .await?;

    row.as_ref().map(immediate_refund_from_row).transpose()
}

/// Lock an immediate refund before paying it
///
/// # Errors
///
/// * `RefundError::ImmediateRefundNotFound` - Nothing is owed for the booking
pub async fn lock_immediate(
    conn: &mut PgConnection,
    booking_id: BookingId,
) -> RefundResult<ImmediateRefund> {
    let sql = format!(
        "SELECT {IMMEDIATE_REFUND_COLUMNS} FROM immediate_refunds WHERE booking_id = $1 FOR UPDATE"
    );
    let row = sqlx::query(&sql)
        .bind(booking_id)
        .fetch_optional(conn)
        .await?
        .ok_or(RefundError::ImmediateRefundNotFound(booking_id))?;

    immediate_refund_from_row(&row)
}

/// Immediate refunds not yet accepted by the processor, oldest first
pub async fn list_unsettled(conn: &mut PgConnection, limit: i64) -> RefundResult<Vec<ImmediateRefund>> {
    let sql = format!(
        "SELECT {IMMEDIATE_REFUND_COLUMNS} FROM immediate_refunds \
         WHERE status <> 'issued' ORDER BY created_at, booking_id LIMIT $1"
    );
    let rows = sqlx::query(&sql).bind(limit).fetch_all(conn).await?;

    rows.iter().map(immediate_refund_from_row).collect()
}

/// Record one payment attempt on a locked immediate refund
///
/// `Ok` carries the processor's refund id, `Err` the failure message.
pub async fn record_attempt(
    conn: &mut PgConnection,
    booking_id: BookingId,
    outcome: Result<&str, &str>,
) -> RefundResult<ImmediateRefund> {
    let (status, processor_reference, last_error) = match outcome {
        Ok(reference) => (ImmediateRefundStatus::Issued, Some(reference), None),
        Err(error) => (ImmediateRefundStatus::Failed, None, Some(error)),
    };

    let sql = format!(
        r#"
        UPDATE immediate_refunds
        SET status = $2,
            processor_reference = $3,
            last_error = COALESCE($4, last_error),
            attempts = attempts + 1,
            updated_at = NOW()
        WHERE booking_id = $1 AND status <> 'issued'
        RETURNING {IMMEDIATE_REFUND_COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(booking_id)
        .bind(status.as_str())
        .bind(processor_reference)
        .bind(last_error)
        .fetch_optional(conn)
        .await?
        .ok_or(RefundError::ImmediateRefundNotFound(booking_id))?;

    immediate_refund_from_row(&row)
}
