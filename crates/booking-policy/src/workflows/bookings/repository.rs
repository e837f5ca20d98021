use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{Booking, BookingId, BookingStatus, ProviderId};
use super::evaluation::PenaltyResult;
use super::policy::CancellationPolicy;

/// State a booking must still be in for a conditional write to land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precondition {
    pub status: BookingStatus,
    pub reschedule_count: u32,
}

impl Precondition {
    pub fn observed(booking: &Booking) -> Self {
        Self {
            status: booking.status,
            reschedule_count: booking.reschedule_count,
        }
    }

    pub fn holds_for(&self, booking: &Booking) -> bool {
        booking.status == self.status && booking.reschedule_count == self.reschedule_count
    }
}

/// Storage abstraction for bookings.
///
/// `update_if` is a compare-and-swap: implementations must apply the write atomically and only
/// when the stored booking still satisfies `precondition`, otherwise return
/// [`RepositoryError::Conflict`]. This is what keeps two concurrent cancellations from both
/// writing refund fields.
pub trait BookingRepository: Send + Sync {
    fn insert(&self, booking: Booking) -> Result<Booking, RepositoryError>;
    fn fetch(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError>;
    fn update_if(&self, booking: Booking, precondition: Precondition)
        -> Result<(), RepositoryError>;
}

/// Read-only access to provider policies produced by the authoring side.
pub trait PolicyRepository: Send + Sync {
    fn policies_for_provider(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Vec<CancellationPolicy>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Duplicate,
    #[error("record not found")]
    NotFound,
    #[error("booking changed concurrently; transition not applied")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook towards the payment collaborator that executes refunds.
pub trait RefundPublisher: Send + Sync {
    fn publish(&self, decision: RefundDecision) -> Result<(), RefundDispatchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingEvent {
    Cancellation,
    NoShow,
}

/// Message handed to the payment side once a transition has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundDecision {
    pub booking_id: BookingId,
    pub event: BookingEvent,
    pub refund_amount: Decimal,
    pub penalty: Decimal,
    pub refund_percentage: Decimal,
    pub reason: String,
    pub decided_at: DateTime<Utc>,
}

impl RefundDecision {
    pub fn from_result(
        booking_id: BookingId,
        event: BookingEvent,
        result: &PenaltyResult,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            booking_id,
            event,
            refund_amount: result.refund,
            penalty: result.penalty,
            refund_percentage: result.refund_percentage,
            reason: result.reason.summary(),
            decided_at,
        }
    }
}

/// Refund dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum RefundDispatchError {
    #[error("refund transport unavailable: {0}")]
    Transport(String),
}
