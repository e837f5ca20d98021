use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::super::policy::{CancellationPolicy, RescheduleFeeKind};
use super::money::round_currency;
use super::penalty::hours_until;

/// Outcome of the reschedule gate. Carries fee information but never charges it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescheduleEligibility {
    Allowed {
        fee: Decimal,
        fee_kind: RescheduleFeeKind,
    },
    Denied(RescheduleDenial),
}

impl RescheduleEligibility {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RescheduleEligibility::Allowed { .. })
    }

    pub fn view(&self) -> EligibilityView {
        match self {
            RescheduleEligibility::Allowed { fee, fee_kind } => EligibilityView {
                allowed: true,
                reason: None,
                fee: Some(*fee),
                fee_kind: Some(*fee_kind),
            },
            RescheduleEligibility::Denied(denial) => EligibilityView {
                allowed: false,
                reason: Some(denial.to_string()),
                fee: None,
                fee_kind: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RescheduleDenial {
    #[error("rescheduling is not allowed by this policy")]
    NotAllowed,
    #[error("reschedule limit reached ({prior} of {max_reschedules} used)")]
    LimitReached { prior: u32, max_reschedules: u32 },
    #[error("requires {required_hours}h notice, only {notice_hours}h remain")]
    InsufficientNotice {
        required_hours: Decimal,
        notice_hours: Decimal,
    },
}

/// Wire shape of an eligibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityView {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_kind: Option<RescheduleFeeKind>,
}

pub(super) fn check(
    policy: &CancellationPolicy,
    scheduled_time: DateTime<Utc>,
    now: DateTime<Utc>,
    prior_reschedule_count: u32,
) -> RescheduleEligibility {
    let reschedule = &policy.reschedule_policy;

    if !reschedule.allowed {
        return RescheduleEligibility::Denied(RescheduleDenial::NotAllowed);
    }

    if prior_reschedule_count >= reschedule.max_reschedules {
        return RescheduleEligibility::Denied(RescheduleDenial::LimitReached {
            prior: prior_reschedule_count,
            max_reschedules: reschedule.max_reschedules,
        });
    }

    let notice = hours_until(scheduled_time, now);
    if notice < reschedule.min_notice_hours {
        return RescheduleEligibility::Denied(RescheduleDenial::InsufficientNotice {
            required_hours: reschedule.min_notice_hours,
            notice_hours: notice.round_dp(2),
        });
    }

    let fee = match reschedule.fee_kind {
        RescheduleFeeKind::None => Decimal::ZERO,
        RescheduleFeeKind::FixedAmount => round_currency(reschedule.fee_value),
    };

    RescheduleEligibility::Allowed {
        fee,
        fee_kind: reschedule.fee_kind,
    }
}
