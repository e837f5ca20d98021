//! Cancellation, refund, and reschedule decisions for marketplace bookings.
//!
//! Calculation lives in [`evaluation`] and is pure: every input, including the evaluation
//! instant, is passed in. [`lifecycle`] loads bookings and policies through the repository
//! traits, applies the decision, and hands refund decisions to the payment side.

mod clock;
pub mod domain;
pub mod evaluation;
pub mod lifecycle;
pub mod policy;
pub mod repository;
pub mod router;

#[cfg(test)]
mod tests;

pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    Actor, ActorRole, Booking, BookingId, BookingStatus, BookingStatusView, ClientId,
    InvalidPrice, Price, ProviderId, ServiceId, MAX_PRICE,
};
pub use evaluation::{
    CancellationAssessment, EligibilityView, PenaltyReason, PenaltyResult, PolicyEngine,
    RescheduleDenial, RescheduleEligibility,
};
pub use lifecycle::{
    BookingLifecycleService, CancellationQuote, LifecycleAction, LifecycleError,
    RescheduleOutcome, TransitionOutcome, TransitionView,
};
pub use policy::{
    resolve_active_policy, CancellationPolicy, FallbackPenaltyKind, FreeCancellationWindow,
    LateCancellationFallback, NoShowPenaltyKind, NoShowPolicy, PenaltyKind, PolicyException,
    PolicyId, PolicyRejected, PolicyRule, PolicyViolation, RescheduleFeeKind, ReschedulePolicy,
};
pub use repository::{
    BookingEvent, BookingRepository, PolicyRepository, Precondition, RefundDecision,
    RefundDispatchError, RefundPublisher, RepositoryError,
};
pub use router::booking_router;
