//! Cancellation of complete bookings and refund resolution.

use super::errors::{RefundError, RefundResult};
use super::models::{
    Cancellation, ImmediateRefund, PendingRefund, PendingRefundId, RefundOutcome, RefundStatus,
    days_before_checkin,
};
use super::policy::{RefundPolicyLookup, select_rule};
use super::store;
use crate::booking::{BookingError, BookingId, BookingStatus, Money, UserId, store as bookings};
use crate::collaborators::{PaymentError, PaymentGateway};
use crate::events::BookingEvent;
use crate::locker::BookingLocker;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Refund resolver
///
/// Cancels complete bookings and decides how the paid amount comes back:
/// - a matching policy rule always produces a pending refund for manual review,
///   even at 0% or 100%
/// - with no matching rule the refund is executed at once: the full amount before
///   checkin, nothing from checkin day on. A non-zero amount is recorded with the
///   cancellation and stays owed until the processor accepts it
#[derive(Clone)]
pub struct RefundResolver {
    locker: BookingLocker,
    policy: Arc<dyn RefundPolicyLookup>,
    payments: Arc<dyn PaymentGateway>,
}

impl RefundResolver {
    pub fn new(
        locker: BookingLocker,
        policy: Arc<dyn RefundPolicyLookup>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            locker,
            policy,
            payments,
        }
    }

    /// Cancel a complete booking and resolve its refund
    ///
    /// The booking is `canceled` once this returns, whatever happens to the refund.
    ///
    /// # Errors
    ///
    /// * `RefundError::NotCancelable` - The booking is not `complete`
    /// * `RefundError::Policy` - Rules could not be read; nothing was changed
    /// * `RefundError::RefundOwed` - An immediate refund failed after the booking
    ///   was canceled; it is recorded and [`RefundResolver::retry_refund`] pays it
    pub async fn cancel_booking(
        &self,
        booking_id: BookingId,
        canceled_at: DateTime<Utc>,
        reason: &str,
    ) -> RefundResult<Cancellation> {
        let current = {
            let mut conn = self.locker.pool().acquire().await?;
            bookings::fetch(&mut conn, booking_id)
                .await?
                .ok_or(BookingError::BookingNotFound(booking_id))?
        };
        if current.status != BookingStatus::Complete {
            return Err(RefundError::NotCancelable {
                booking_id,
                status: current.status,
            });
        }

        let days = days_before_checkin(current.checkin_date, canceled_at);
        let rules = self
            .policy
            .active_rules(current.property, current.mode)
            .await?;
        let rule = select_rule(&rules, days);

        let mut tx = self.locker.pool().begin().await?;
        let booking = self
            .locker
            .cancel_complete_in(&mut tx, booking_id)
            .await
            .map_err(|e| not_cancelable(booking_id, e))?;

        let immediate_amount = if days > 0 {
            booking.total_price.clone()
        } else {
            Money::zero(booking.total_price.currency.clone())
        };

        let pending = match rule {
            Some(rule) => {
                let amount = booking.total_price.percent(rule.refund_percentage);
                Some(
                    store::insert(
                        &mut tx,
                        booking.id,
                        booking.payment_reference.as_deref(),
                        &amount,
                        rule,
                        reason,
                    )
                    .await?,
                )
            }
            None => {
                if !immediate_amount.is_zero() {
                    store::insert_immediate(
                        &mut tx,
                        booking.id,
                        booking.payment_reference.as_deref(),
                        &immediate_amount,
                    )
                    .await?;
                }
                None
            }
        };

        tx.commit().await?;

        log::info!(
            "Booking {} ({}) canceled {} days before checkin",
            booking.id,
            booking.reference,
            days
        );
        self.locker.notifier().publish(BookingEvent::Canceled {
            booking_id: booking.id,
            reason: reason.to_string(),
        });

        if let Some(pending) = pending {
            log::info!(
                "Refund of {} for booking {} pending review (rule {} days, {}%)",
                pending.policy_refund_amount,
                booking.id,
                pending.applied_rule.days_before_checkin,
                pending.applied_rule.refund_percentage
            );
            self.locker.notifier().publish(BookingEvent::RefundPending {
                booking_id: booking.id,
                pending_refund_id: pending.id,
                amount: pending.policy_refund_amount.clone(),
            });
            return Ok(Cancellation {
                booking,
                refund: RefundOutcome::PendingReview(pending),
            });
        }

        if immediate_amount.is_zero() {
            log::info!("Booking {} canceled with nothing to refund", booking.id);
            return Ok(Cancellation {
                booking,
                refund: RefundOutcome::Immediate {
                    amount: immediate_amount,
                    processor_reference: None,
                },
            });
        }

        let issued = self.settle(booking.id).await?;

        Ok(Cancellation {
            booking,
            refund: RefundOutcome::Immediate {
                amount: issued.amount,
                processor_reference: issued.processor_reference,
            },
        })
    }

    /// Approve a pending refund and pay it out
    ///
    /// `admin_amount` overrides the policy amount and may not exceed what was paid.
    /// The decision is stored only if the payment succeeds.
    pub async fn approve(
        &self,
        pending_id: PendingRefundId,
        reviewed_by: UserId,
        admin_amount: Option<i64>,
        notes: &str,
    ) -> RefundResult<PendingRefund> {
        let mut tx = self.locker.pool().begin().await?;
        let mut pending = lock_unreviewed(&mut tx, pending_id).await?;

        if let Some(amount) = admin_amount {
            let booking = bookings::fetch(&mut tx, pending.booking_id)
                .await?
                .ok_or(BookingError::BookingNotFound(pending.booking_id))?;
            if amount < 0 || amount > booking.total_price.amount {
                return Err(RefundError::InvalidAmount(amount));
            }
            pending.admin_refund_amount = Some(Money::new(
                amount,
                pending.policy_refund_amount.currency.clone(),
            ));
        }

        // The row lock keeps a second reviewer from paying the same refund twice
        let amount = pending.payable_amount().clone();
        if !amount.is_zero() {
            let payment_reference = pending
                .payment_reference
                .as_deref()
                .ok_or(PaymentError::MissingPaymentReference)?;
            self.payments.refund(payment_reference, &amount).await?;
        }

        let reviewed_at = store::record_review(
            &mut tx,
            pending_id,
            RefundStatus::Approved,
            reviewed_by,
            admin_amount,
            notes,
        )
        .await?;
        tx.commit().await?;

        pending.status = RefundStatus::Approved;
        pending.reviewed_by = Some(reviewed_by);
        pending.reviewed_at = Some(reviewed_at);
        pending.admin_notes = notes.to_string();

        log::info!(
            "Refund {} of {} for booking {} approved by {}",
            pending.id,
            amount,
            pending.booking_id,
            reviewed_by
        );
        if !amount.is_zero() {
            self.locker.notifier().publish(BookingEvent::RefundIssued {
                booking_id: pending.booking_id,
                amount,
            });
        }

        Ok(pending)
    }

    /// Reject a pending refund; no money moves
    pub async fn reject(
        &self,
        pending_id: PendingRefundId,
        reviewed_by: UserId,
        notes: &str,
    ) -> RefundResult<PendingRefund> {
        let mut tx = self.locker.pool().begin().await?;
        let mut pending = lock_unreviewed(&mut tx, pending_id).await?;

        let reviewed_at = store::record_review(
            &mut tx,
            pending_id,
            RefundStatus::Rejected,
            reviewed_by,
            None,
            notes,
        )
        .await?;
        tx.commit().await?;

        pending.status = RefundStatus::Rejected;
        pending.reviewed_by = Some(reviewed_by);
        pending.reviewed_at = Some(reviewed_at);
        pending.admin_notes = notes.to_string();

        log::info!(
            "Refund {} for booking {} rejected by {}",
            pending.id,
            pending.booking_id,
            reviewed_by
        );

        Ok(pending)
    }

    /// Pending refund recorded for a booking, if any
    pub async fn pending_refund_for(
        &self,
        booking_id: BookingId,
    ) -> RefundResult<Option<PendingRefund>> {
        let mut conn = self.locker.pool().acquire().await?;
        store::fetch_for_booking(&mut conn, booking_id).await
    }

    /// Pay an owed immediate refund again
    ///
    /// Returns the refund unchanged when it was already issued, so calling this
    /// twice never pays twice.
    ///
    /// # Errors
    ///
    /// * `RefundError::ImmediateRefundNotFound` - Nothing is owed for the booking
    /// * `RefundError::RefundOwed` - The processor failed again; the attempt is recorded
    pub async fn retry_refund(&self, booking_id: BookingId) -> RefundResult<ImmediateRefund> {
        log::info!("Retrying refund for booking {booking_id}");
        self.settle(booking_id).await
    }

    /// Immediate refund recorded for a booking, if any
    pub async fn immediate_refund_for(
        &self,
        booking_id: BookingId,
    ) -> RefundResult<Option<ImmediateRefund>> {
        let mut conn = self.locker.pool().acquire().await?;
        store::fetch_immediate(&mut conn, booking_id).await
    }

    /// Immediate refunds still owed, oldest first
    pub async fn unsettled_refunds(&self, limit: i64) -> RefundResult<Vec<ImmediateRefund>> {
        let mut conn = self.locker.pool().acquire().await?;
        store::list_unsettled(&mut conn, limit).await
    }

    /// Pay a recorded immediate refund and store the outcome
    async fn settle(&self, booking_id: BookingId) -> RefundResult<ImmediateRefund> {
        let mut tx = self.locker.pool().begin().await?;
        // The row lock keeps concurrent retries from paying the same refund twice
        let owed = store::lock_immediate(&mut tx, booking_id).await?;
        if owed.is_settled() {
            tx.rollback().await?;
            return Ok(owed);
        }

        let result = match owed.payment_reference.as_deref() {
            Some(payment_reference) => self.payments.refund(payment_reference, &owed.amount).await,
            None => Err(PaymentError::MissingPaymentReference),
        };

        match result {
            Ok(processor_reference) => {
                let issued =
                    store::record_attempt(&mut tx, booking_id, Ok(&processor_reference)).await?;
                tx.commit().await?;

                log::info!(
                    "Refunded {} for booking {} ({})",
                    issued.amount,
                    booking_id,
                    processor_reference
                );
                self.locker.notifier().publish(BookingEvent::RefundIssued {
                    booking_id,
                    amount: issued.amount.clone(),
                });
                Ok(issued)
            }
            Err(source) => {
                let failed =
                    store::record_attempt(&mut tx, booking_id, Err(&source.to_string())).await?;
                tx.commit().await?;

                log::error!(
                    "Refund of {} for canceled booking {} failed (attempt {}): {}",
                    failed.amount,
                    booking_id,
                    failed.attempts,
                    source
                );
                Err(RefundError::RefundOwed {
                    booking_id,
                    amount: failed.amount,
                    payment_reference: failed.payment_reference,
                    attempts: failed.attempts,
                    source,
                })
            }
        }
    }
}

async fn lock_unreviewed(
    conn: &mut sqlx::PgConnection,
    pending_id: PendingRefundId,
) -> RefundResult<PendingRefund> {
    let pending = store::lock(conn, pending_id).await?;
    if pending.status != RefundStatus::Pending {
        return Err(RefundError::AlreadyReviewed {
            id: pending_id,
            status: pending.status,
        });
    }
    Ok(pending)
}

/// A booking that changed status between the policy lookup and the lock
fn not_cancelable(booking_id: BookingId, err: BookingError) -> RefundError {
    match err {
        BookingError::InvalidTransition { from, .. } => RefundError::NotCancelable {
            booking_id,
            status: from,
        },
        other => other.into(),
    }
}
