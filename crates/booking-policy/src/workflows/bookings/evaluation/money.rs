use rust_decimal::{Decimal, RoundingStrategy};

use super::super::domain::Price;
use super::super::policy::PenaltyKind;
use super::{PenaltyReason, PenaltyResult};

/// Decimal places of the smallest currency unit.
pub const CURRENCY_SCALE: u32 = 2;

pub(super) fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointNearestEven)
}

pub(super) fn percentage_of(price: Price, percentage: Decimal) -> Decimal {
    round_currency(price.amount() * percentage / Decimal::ONE_HUNDRED)
}

/// Raw penalty for a kind/value pair, before clamping to the price.
pub(super) fn penalty_amount(kind: PenaltyKind, value: Decimal, price: Price) -> Decimal {
    match kind {
        PenaltyKind::None => Decimal::ZERO,
        PenaltyKind::Percentage => percentage_of(price, value),
        PenaltyKind::FixedAmount => round_currency(value).min(price.amount()),
        PenaltyKind::FullCharge => price.amount(),
    }
}

/// Split the price from the penalty side; refund takes the remainder.
pub(super) fn settle_penalty(price: Price, penalty: Decimal, reason: PenaltyReason) -> PenaltyResult {
    let penalty = round_currency(penalty).clamp(Decimal::ZERO, price.amount());
    let refund = price.amount() - penalty;
    PenaltyResult {
        penalty,
        refund,
        refund_percentage: refund_percentage(refund, price),
        reason,
    }
}

/// Split the price from the refund side; penalty takes the remainder.
pub(super) fn settle_refund(price: Price, refund: Decimal, reason: PenaltyReason) -> PenaltyResult {
    let refund = round_currency(refund).clamp(Decimal::ZERO, price.amount());
    PenaltyResult {
        penalty: price.amount() - refund,
        refund,
        refund_percentage: refund_percentage(refund, price),
        reason,
    }
}

fn refund_percentage(refund: Decimal, price: Price) -> Decimal {
    (refund * Decimal::ONE_HUNDRED / price.amount())
        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}
