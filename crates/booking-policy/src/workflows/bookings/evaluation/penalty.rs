use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::super::domain::Price;
use super::super::policy::{CancellationPolicy, PolicyRule};
use super::money::{penalty_amount, settle_penalty};
use super::{PenaltyReason, PenaltyResult};

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Signed hours from `at` until `scheduled_time`; negative once the appointment has started.
pub fn hours_until(scheduled_time: DateTime<Utc>, at: DateTime<Utc>) -> Decimal {
    let millis = (scheduled_time - at).num_milliseconds();
    Decimal::from(millis) / Decimal::from(MILLIS_PER_HOUR)
}

/// Largest threshold not exceeding `hours_until`. `rules` must be sorted ascending.
pub(super) fn select_rule(rules: &[PolicyRule], hours_until: Decimal) -> Option<&PolicyRule> {
    let satisfied = rules.partition_point(|rule| rule.threshold_hours <= hours_until);
    satisfied.checked_sub(1).map(|index| &rules[index])
}

pub(super) fn calculate(
    policy: &CancellationPolicy,
    price: Price,
    scheduled_time: DateTime<Utc>,
    evaluated_at: DateTime<Utc>,
) -> PenaltyResult {
    let hours_until = hours_until(scheduled_time, evaluated_at);

    let window = &policy.free_cancellation_window;
    if window.enabled && hours_until >= window.hours {
        return settle_penalty(price, Decimal::ZERO, PenaltyReason::FreeCancellationWindow);
    }

    if let Some(rule) = select_rule(&policy.rules, hours_until) {
        let penalty = penalty_amount(rule.penalty_kind, rule.penalty_value, price);
        return settle_penalty(
            price,
            penalty,
            PenaltyReason::StandardPolicy {
                threshold_hours: rule.threshold_hours,
            },
        );
    }

    let fallback = &policy.late_cancellation_fallback;
    let penalty = penalty_amount(fallback.penalty_kind.into(), fallback.penalty_value, price);
    settle_penalty(price, penalty, PenaltyReason::LateCancellation)
}
