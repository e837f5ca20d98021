use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::clock::{Clock, SystemClock};
use super::domain::{Actor, ActorRole, Booking, BookingId, BookingStatus, BookingStatusView};
use super::evaluation::{
    PenaltyReason, PenaltyResult, PolicyEngine, RescheduleDenial, RescheduleEligibility,
};
use super::policy::{resolve_active_policy, PolicyRejected, RescheduleFeeKind};
use super::repository::{
    BookingEvent, BookingRepository, PolicyRepository, Precondition, RefundDecision,
    RefundPublisher, RepositoryError,
};

/// Lifecycle operations gated by this controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Cancel,
    MarkNoShow,
    Reschedule,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LifecycleAction::Cancel => "cancel",
            LifecycleAction::MarkNoShow => "mark as no-show",
            LifecycleAction::Reschedule => "reschedule",
        };
        f.write_str(label)
    }
}

/// Service applying policy decisions to stored bookings.
pub struct BookingLifecycleService<B, P, R> {
    bookings: Arc<B>,
    policies: Arc<P>,
    refunds: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<B, P, R> BookingLifecycleService<B, P, R>
where
    B: BookingRepository + 'static,
    P: PolicyRepository + 'static,
    R: RefundPublisher + 'static,
{
    pub fn new(bookings: Arc<B>, policies: Arc<P>, refunds: Arc<R>) -> Self {
        Self::with_clock(bookings, policies, refunds, Arc::new(SystemClock))
    }

    pub fn with_clock(
        bookings: Arc<B>,
        policies: Arc<P>,
        refunds: Arc<R>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bookings,
            policies,
            refunds,
            clock,
        }
    }

    /// Fetch a booking for status responses.
    pub fn get(&self, booking_id: &BookingId) -> Result<Booking, LifecycleError> {
        self.load_booking(booking_id)
    }

    /// Cancel a pending or confirmed booking and record the penalty/refund split.
    ///
    /// A supplied `reason_code` that matches a policy exception overrides the time-based
    /// rules entirely; an unknown code falls through to them and is reported on the outcome.
    pub fn cancel(
        &self,
        booking_id: &BookingId,
        actor: &Actor,
        reason_code: Option<&str>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let booking = self.load_booking(booking_id)?;
        authorize(&booking, actor, LifecycleAction::Cancel)?;
        ensure_actionable(&booking, LifecycleAction::Cancel)?;

        let engine = self.load_engine(&booking)?;
        let now = self.clock.now();
        let assessment =
            engine.assess_cancellation(booking.price, booking.scheduled_time, now, reason_code);

        if let Some(code) = &assessment.unrecognized_reason {
            debug!(
                booking_id = %booking.booking_id.0,
                reason_code = %code,
                "reason code matched no policy exception; applying time-based rules"
            );
        }

        let precondition = Precondition::observed(&booking);
        let mut updated = booking;
        apply_result(&mut updated, &assessment.result, now);
        updated.status = BookingStatus::Cancelled;
        updated.cancelled_by = Some(actor.role);

        self.commit(updated.clone(), precondition, LifecycleAction::Cancel)?;

        info!(
            booking_id = %updated.booking_id.0,
            cancelled_by = actor.role.label(),
            hours_until = %assessment.hours_until.round_dp(2),
            penalty = %assessment.result.penalty,
            refund = %assessment.result.refund,
            reason = %assessment.result.reason.summary(),
            "booking cancelled"
        );

        let refund_dispatched =
            self.dispatch_refund(&updated, BookingEvent::Cancellation, &assessment.result, now);

        Ok(TransitionOutcome {
            booking: updated,
            result: assessment.result,
            unrecognized_reason: assessment.unrecognized_reason,
            refund_dispatched,
        })
    }

    /// Provider-declared no-show. Whether the grace period has elapsed is the caller's call.
    pub fn mark_no_show(
        &self,
        booking_id: &BookingId,
        actor: &Actor,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let booking = self.load_booking(booking_id)?;
        if actor.role != ActorRole::Provider {
            return Err(unauthorized(&booking, actor, LifecycleAction::MarkNoShow));
        }
        authorize(&booking, actor, LifecycleAction::MarkNoShow)?;
        ensure_actionable(&booking, LifecycleAction::MarkNoShow)?;

        let engine = self.load_engine(&booking)?;
        let now = self.clock.now();
        let result = engine.no_show(booking.price);

        let precondition = Precondition::observed(&booking);
        let mut updated = booking;
        apply_result(&mut updated, &result, now);
        updated.status = BookingStatus::NoShow;
        updated.cancelled_by = Some(ActorRole::Provider);

        self.commit(updated.clone(), precondition, LifecycleAction::MarkNoShow)?;

        if result.reason == PenaltyReason::NoShowPolicyDisabled {
            warn!(
                booking_id = %updated.booking_id.0,
                "no-show recorded under a disabled no-show policy; refunding in full"
            );
        }
        info!(
            booking_id = %updated.booking_id.0,
            penalty = %result.penalty,
            refund = %result.refund,
            "booking marked no-show"
        );

        let refund_dispatched = self.dispatch_refund(&updated, BookingEvent::NoShow, &result, now);

        Ok(TransitionOutcome {
            booking: updated,
            result,
            unrecognized_reason: None,
            refund_dispatched,
        })
    }

    /// Move a booking to `new_time` if the policy permits. The fee is returned, not charged.
    pub fn reschedule(
        &self,
        booking_id: &BookingId,
        actor: &Actor,
        new_time: DateTime<Utc>,
    ) -> Result<RescheduleOutcome, LifecycleError> {
        let booking = self.load_booking(booking_id)?;
        if actor.role == ActorRole::Admin {
            return Err(unauthorized(&booking, actor, LifecycleAction::Reschedule));
        }
        authorize(&booking, actor, LifecycleAction::Reschedule)?;
        ensure_actionable(&booking, LifecycleAction::Reschedule)?;

        let engine = self.load_engine(&booking)?;
        let now = self.clock.now();
        if new_time <= now {
            warn!(booking_id = %booking.booking_id.0, %new_time, "reschedule target in the past");
            return Err(LifecycleError::InvalidRescheduleTime {
                requested: new_time,
                now,
            });
        }

        let (fee, fee_kind) =
            match engine.reschedule_eligibility(booking.scheduled_time, now, booking.reschedule_count)
            {
                RescheduleEligibility::Allowed { fee, fee_kind } => (fee, fee_kind),
                RescheduleEligibility::Denied(denial) => {
                    warn!(booking_id = %booking.booking_id.0, %denial, "reschedule denied");
                    return Err(LifecycleError::RescheduleDenied(denial));
                }
            };

        let precondition = Precondition::observed(&booking);
        let previous_time = booking.scheduled_time;
        let mut updated = booking;
        updated.scheduled_time = new_time;
        updated.reschedule_count += 1;

        self.commit(updated.clone(), precondition, LifecycleAction::Reschedule)?;

        info!(
            booking_id = %updated.booking_id.0,
            from = %previous_time,
            to = %new_time,
            reschedule_count = updated.reschedule_count,
            "booking rescheduled"
        );

        Ok(RescheduleOutcome {
            booking: updated,
            previous_time,
            fee,
            fee_kind,
        })
    }

    /// What cancelling now would cost, without touching the booking.
    pub fn quote_cancellation(
        &self,
        booking_id: &BookingId,
        reason_code: Option<&str>,
    ) -> Result<CancellationQuote, LifecycleError> {
        let booking = self.load_booking(booking_id)?;
        ensure_actionable(&booking, LifecycleAction::Cancel)?;

        let engine = self.load_engine(&booking)?;
        let now = self.clock.now();
        let assessment =
            engine.assess_cancellation(booking.price, booking.scheduled_time, now, reason_code);

        Ok(CancellationQuote {
            booking_id: booking.booking_id,
            evaluated_at: now,
            hours_until: assessment.hours_until.round_dp(2),
            penalty: assessment.result.penalty,
            refund: assessment.result.refund,
            refund_percentage: assessment.result.refund_percentage,
            reason: assessment.result.reason.summary(),
            unrecognized_reason: assessment.unrecognized_reason,
        })
    }

    /// Read-only reschedule gate for the booking's current schedule.
    pub fn reschedule_eligibility(
        &self,
        booking_id: &BookingId,
    ) -> Result<RescheduleEligibility, LifecycleError> {
        let booking = self.load_booking(booking_id)?;
        ensure_actionable(&booking, LifecycleAction::Reschedule)?;

        let engine = self.load_engine(&booking)?;
        Ok(engine.reschedule_eligibility(
            booking.scheduled_time,
            self.clock.now(),
            booking.reschedule_count,
        ))
    }

    fn load_booking(&self, booking_id: &BookingId) -> Result<Booking, LifecycleError> {
        self.bookings
            .fetch(booking_id)?
            .ok_or_else(|| LifecycleError::BookingNotFound(booking_id.clone()))
    }

    fn load_engine(&self, booking: &Booking) -> Result<PolicyEngine, LifecycleError> {
        let policies = self.policies.policies_for_provider(&booking.provider_id)?;
        let policy = resolve_active_policy(&policies, &booking.service_id).ok_or_else(|| {
            warn!(
                provider_id = %booking.provider_id.0,
                service_id = %booking.service_id.0,
                "no active cancellation policy"
            );
            LifecycleError::PolicyNotFound {
                provider_id: booking.provider_id.0.clone(),
                service_id: booking.service_id.0.clone(),
            }
        })?;

        PolicyEngine::new(policy.clone()).map_err(|rejected| {
            error!(%rejected, "stored cancellation policy failed validation");
            LifecycleError::MalformedPolicy(rejected)
        })
    }

    fn commit(
        &self,
        booking: Booking,
        precondition: Precondition,
        action: LifecycleAction,
    ) -> Result<(), LifecycleError> {
        let booking_id = booking.booking_id.clone();
        self.bookings
            .update_if(booking, precondition)
            .map_err(|err| {
                if matches!(err, RepositoryError::Conflict) {
                    warn!(booking_id = %booking_id.0, %action, "lost concurrent update");
                }
                LifecycleError::Repository(err)
            })
    }

    fn dispatch_refund(
        &self,
        booking: &Booking,
        event: BookingEvent,
        result: &PenaltyResult,
        decided_at: DateTime<Utc>,
    ) -> bool {
        let decision =
            RefundDecision::from_result(booking.booking_id.clone(), event, result, decided_at);
        match self.refunds.publish(decision) {
            Ok(()) => true,
            Err(err) => {
                // The transition is already committed; the decision can be replayed from the
                // booking's stored penalty and refund fields.
                warn!(booking_id = %booking.booking_id.0, %err, "refund decision not dispatched");
                false
            }
        }
    }
}

fn apply_result(booking: &mut Booking, result: &PenaltyResult, at: DateTime<Utc>) {
    booking.cancellation_penalty = Some(result.penalty);
    booking.refund_amount = Some(result.refund);
    booking.cancellation_time = Some(at);
}

fn authorize(booking: &Booking, actor: &Actor, action: LifecycleAction) -> Result<(), LifecycleError> {
    if actor.role == ActorRole::Admin || booking.is_owned_by(actor) {
        Ok(())
    } else {
        Err(unauthorized(booking, actor, action))
    }
}

fn unauthorized(booking: &Booking, actor: &Actor, action: LifecycleAction) -> LifecycleError {
    warn!(
        booking_id = %booking.booking_id.0,
        actor_id = %actor.id,
        role = actor.role.label(),
        %action,
        "unauthorized lifecycle action"
    );
    LifecycleError::UnauthorizedActor {
        actor_id: actor.id.clone(),
        role: actor.role,
        action,
        booking_id: booking.booking_id.clone(),
    }
}

fn ensure_actionable(booking: &Booking, action: LifecycleAction) -> Result<(), LifecycleError> {
    if booking.status.accepts_lifecycle_actions() {
        return Ok(());
    }
    if booking.status.is_terminal() {
        // Repeats of a settled action land here; stored fields stay as they are.
        info!(
            booking_id = %booking.booking_id.0,
            status = booking.status.label(),
            %action,
            "lifecycle action on settled booking ignored"
        );
    } else {
        warn!(
            booking_id = %booking.booking_id.0,
            status = booking.status.label(),
            %action,
            "lifecycle action on frozen booking"
        );
    }
    Err(LifecycleError::InvalidBookingState {
        booking_id: booking.booking_id.clone(),
        status: booking.status,
        action,
    })
}

/// Result of a committed cancel or no-show transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub booking: Booking,
    pub result: PenaltyResult,
    pub unrecognized_reason: Option<String>,
    pub refund_dispatched: bool,
}

impl TransitionOutcome {
    pub fn view(&self) -> TransitionView {
        let (requires_proof, notes) = match &self.result.reason {
            PenaltyReason::Exception {
                requires_proof,
                notes,
                ..
            } => (Some(*requires_proof), notes.clone()),
            _ => (None, None),
        };

        TransitionView {
            booking_id: self.booking.booking_id.clone(),
            status: self.booking.status.label(),
            penalty: self.result.penalty,
            refund: self.result.refund,
            refund_percentage: self.result.refund_percentage,
            reason: self.result.reason.summary(),
            requires_proof,
            notes,
            unrecognized_reason: self.unrecognized_reason.clone(),
            refund_dispatched: self.refund_dispatched,
        }
    }
}

/// Response body for cancel and no-show calls.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionView {
    pub booking_id: BookingId,
    pub status: &'static str,
    pub penalty: Decimal,
    pub refund: Decimal,
    pub refund_percentage: Decimal,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_proof: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unrecognized_reason: Option<String>,
    pub refund_dispatched: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RescheduleOutcome {
    pub booking: Booking,
    pub previous_time: DateTime<Utc>,
    pub fee: Decimal,
    pub fee_kind: RescheduleFeeKind,
}

impl RescheduleOutcome {
    pub fn view(&self) -> RescheduleView {
        RescheduleView {
            booking: self.booking.status_view(),
            previous_time: self.previous_time,
            fee: self.fee,
            fee_kind: self.fee_kind,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RescheduleView {
    pub booking: BookingStatusView,
    pub previous_time: DateTime<Utc>,
    pub fee: Decimal,
    pub fee_kind: RescheduleFeeKind,
}

/// Preview of a cancellation at `evaluated_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancellationQuote {
    pub booking_id: BookingId,
    pub evaluated_at: DateTime<Utc>,
    pub hours_until: Decimal,
    pub penalty: Decimal,
    pub refund: Decimal,
    pub refund_percentage: Decimal,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unrecognized_reason: Option<String>,
}

/// Rejections raised by the lifecycle controller. None of them leave a partial write behind.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("booking {0} not found")]
    BookingNotFound(BookingId),
    #[error("no active cancellation policy for provider {provider_id} and service {service_id}")]
    PolicyNotFound {
        provider_id: String,
        service_id: String,
    },
    #[error("cannot {action} booking {booking_id} while it is {}", .status.label())]
    InvalidBookingState {
        booking_id: BookingId,
        status: BookingStatus,
        action: LifecycleAction,
    },
    #[error("{} {actor_id} may not {action} booking {booking_id}", .role.label())]
    UnauthorizedActor {
        actor_id: String,
        role: ActorRole,
        action: LifecycleAction,
        booking_id: BookingId,
    },
    #[error(transparent)]
    MalformedPolicy(PolicyRejected),
    #[error("reschedule denied: {0}")]
    RescheduleDenied(RescheduleDenial),
    #[error("new appointment time {requested} is not after {now}")]
    InvalidRescheduleTime {
        requested: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
