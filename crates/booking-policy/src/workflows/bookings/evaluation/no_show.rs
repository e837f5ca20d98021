use rust_decimal::Decimal;

use super::super::domain::Price;
use super::super::policy::CancellationPolicy;
use super::money::{penalty_amount, settle_penalty};
use super::{PenaltyReason, PenaltyResult};

pub(super) fn resolve(policy: &CancellationPolicy, price: Price) -> PenaltyResult {
    let no_show = &policy.no_show_policy;
    if !no_show.enabled {
        return settle_penalty(price, Decimal::ZERO, PenaltyReason::NoShowPolicyDisabled);
    }

    let penalty = penalty_amount(no_show.penalty_kind.into(), no_show.penalty_value, price);
    settle_penalty(price, penalty, PenaltyReason::NoShow)
}
