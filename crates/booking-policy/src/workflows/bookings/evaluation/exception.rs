use super::super::domain::Price;
use super::super::policy::CancellationPolicy;
use super::money::{percentage_of, settle_refund};
use super::{PenaltyReason, PenaltyResult};

/// Exact, case-sensitive match on the reason code.
pub(super) fn resolve(
    policy: &CancellationPolicy,
    reason_code: &str,
    price: Price,
) -> Option<PenaltyResult> {
    let exception = policy.exception(reason_code)?;
    let refund = percentage_of(price, exception.refund_percentage);

    Some(settle_refund(
        price,
        refund,
        PenaltyReason::Exception {
            reason_code: exception.reason_code.clone(),
            requires_proof: exception.requires_proof,
            notes: exception.notes.clone(),
        },
    ))
}
