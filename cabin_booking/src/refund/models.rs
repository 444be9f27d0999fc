//! Refund data models.

use crate::booking::{Booking, BookingId, Money, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Pending refund ID type
pub type PendingRefundId = i64;

/// Policy entry: cancel at least `days_before_checkin` days ahead to get
/// `refund_percentage` back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRule {
    pub days_before_checkin: i32,
    pub refund_percentage: i32,
}

impl RefundRule {
    pub fn new(days_before_checkin: i32, refund_percentage: i32) -> Self {
        Self {
            days_before_checkin,
            refund_percentage,
        }
    }
}

/// Review state of a pending refund
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Approved,
    Rejected,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Approved => "approved",
            RefundStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RefundStatus::Pending),
            "approved" => Ok(RefundStatus::Approved),
            "rejected" => Ok(RefundStatus::Rejected),
            other => Err(format!("unknown refund status '{other}'")),
        }
    }
}

/// Policy-governed refund awaiting an administrator's decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRefund {
    pub id: PendingRefundId,
    pub booking_id: BookingId,
    pub payment_reference: Option<String>,
    pub policy_refund_amount: Money,
    /// Amount set by the reviewer, overriding the policy amount
    pub admin_refund_amount: Option<Money>,
    pub status: RefundStatus,
    pub applied_rule: RefundRule,
    pub cancellation_reason: String,
    pub admin_notes: String,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PendingRefund {
    /// Amount paid out on approval
    pub fn payable_amount(&self) -> &Money {
        self.admin_refund_amount
            .as_ref()
            .unwrap_or(&self.policy_refund_amount)
    }
}

/// Settlement state of a refund executed without review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImmediateRefundStatus {
    /// Recorded with the cancellation, not attempted yet
    Owed,
    /// The last attempt failed; waiting for a retry
    Failed,
    /// Accepted by the processor
    Issued,
}

impl ImmediateRefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImmediateRefundStatus::Owed => "owed",
            ImmediateRefundStatus::Failed => "failed",
            ImmediateRefundStatus::Issued => "issued",
        }
    }
}

impl std::fmt::Display for ImmediateRefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImmediateRefundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owed" => Ok(ImmediateRefundStatus::Owed),
            "failed" => Ok(ImmediateRefundStatus::Failed),
            "issued" => Ok(ImmediateRefundStatus::Issued),
            other => Err(format!("unknown immediate refund status '{other}'")),
        }
    }
}

/// Non-zero refund owed by a cancellation no policy rule covered
///
/// Written in the cancellation transaction, so the debt survives a processor
/// failure until [`crate::refund::RefundResolver::retry_refund`] settles it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImmediateRefund {
    pub booking_id: BookingId,
    pub payment_reference: Option<String>,
    pub amount: Money,
    pub status: ImmediateRefundStatus,
    /// Processor refund id once issued
    pub processor_reference: Option<String>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImmediateRefund {
    pub fn is_settled(&self) -> bool {
        self.status == ImmediateRefundStatus::Issued
    }
}

/// What happened to the money when a booking was canceled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundOutcome {
    /// No rule applied; the refund was executed right away
    Immediate {
        amount: Money,
        /// Processor refund id; `None` when nothing was owed
        processor_reference: Option<String>,
    },
    /// A rule applied; the refund waits for review
    PendingReview(PendingRefund),
}

impl RefundOutcome {
    pub fn amount(&self) -> &Money {
        match self {
            RefundOutcome::Immediate { amount, .. } => amount,
            RefundOutcome::PendingReview(pending) => &pending.policy_refund_amount,
        }
    }
}

/// Result of canceling a complete booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    /// The booking, now `canceled`
    pub booking: Booking,
    pub refund: RefundOutcome,
}

/// Whole days between the cancellation date and checkin; negative after checkin
pub fn days_before_checkin(checkin: NaiveDate, canceled_at: DateTime<Utc>) -> i64 {
    (checkin - canceled_at.date_naive()).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_days_before_checkin_uses_calendar_days() {
        let checkin = NaiveDate::from_ymd_opt(2026, 12, 20).unwrap();
        let late_evening = Utc.with_ymd_and_hms(2026, 11, 20, 23, 59, 0).unwrap();
        let checkin_day = Utc.with_ymd_and_hms(2026, 12, 20, 8, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 12, 22, 8, 0, 0).unwrap();

        assert_eq!(days_before_checkin(checkin, late_evening), 30);
        assert_eq!(days_before_checkin(checkin, checkin_day), 0);
        assert_eq!(days_before_checkin(checkin, after), -2);
    }

    #[test]
    fn test_immediate_refund_status_db_codes() {
        for status in [
            ImmediateRefundStatus::Owed,
            ImmediateRefundStatus::Failed,
            ImmediateRefundStatus::Issued,
        ] {
            assert_eq!(status.as_str().parse::<ImmediateRefundStatus>().unwrap(), status);
        }
        assert!("pending".parse::<ImmediateRefundStatus>().is_err());
    }

    #[test]
    fn test_admin_amount_overrides_policy_amount() {
        let mut pending = PendingRefund {
            id: 1,
            booking_id: 2,
            payment_reference: Some("pay_1".to_string()),
            policy_refund_amount: Money::new(5_000, "USD"),
            admin_refund_amount: None,
            status: RefundStatus::Pending,
            applied_rule: RefundRule::new(14, 50),
            cancellation_reason: String::new(),
            admin_notes: String::new(),
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        };
        assert_eq!(pending.payable_amount().amount, 5_000);

        pending.admin_refund_amount = Some(Money::new(7_500, "USD"));
        assert_eq!(pending.payable_amount().amount, 7_500);
    }
}
