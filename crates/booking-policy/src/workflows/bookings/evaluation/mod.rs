mod exception;
mod money;
mod no_show;
mod penalty;
mod reschedule;

pub use money::CURRENCY_SCALE;
pub use penalty::hours_until;
pub use reschedule::{EligibilityView, RescheduleDenial, RescheduleEligibility};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::Price;
use super::policy::{CancellationPolicy, PolicyRejected};

/// Stateless evaluator over one validated policy snapshot.
///
/// Construction validates the policy and sorts its tiered rules by ascending threshold, so
/// every calculation method is total and never fails.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    policy: CancellationPolicy,
}

impl PolicyEngine {
    pub fn new(mut policy: CancellationPolicy) -> Result<Self, PolicyRejected> {
        policy.validate()?;
        policy
            .rules
            .sort_by(|left, right| left.threshold_hours.cmp(&right.threshold_hours));
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &CancellationPolicy {
        &self.policy
    }

    /// Time-based penalty for a cancellation requested at `evaluated_at`.
    pub fn cancellation_penalty(
        &self,
        price: Price,
        scheduled_time: DateTime<Utc>,
        evaluated_at: DateTime<Utc>,
    ) -> PenaltyResult {
        penalty::calculate(&self.policy, price, scheduled_time, evaluated_at)
    }

    /// Monetary outcome of a provider-declared no-show.
    pub fn no_show(&self, price: Price) -> PenaltyResult {
        no_show::resolve(&self.policy, price)
    }

    /// Override result for a recognized exception reason, if any.
    pub fn exception(&self, reason_code: &str, price: Price) -> Option<PenaltyResult> {
        exception::resolve(&self.policy, reason_code, price)
    }

    /// Full cancellation decision: a matching exception wins, otherwise the time-based rules.
    pub fn assess_cancellation(
        &self,
        price: Price,
        scheduled_time: DateTime<Utc>,
        evaluated_at: DateTime<Utc>,
        reason_code: Option<&str>,
    ) -> CancellationAssessment {
        let hours_until = hours_until(scheduled_time, evaluated_at);

        if let Some(code) = reason_code {
            if let Some(result) = self.exception(code, price) {
                return CancellationAssessment {
                    result,
                    hours_until,
                    unrecognized_reason: None,
                };
            }
        }

        CancellationAssessment {
            result: self.cancellation_penalty(price, scheduled_time, evaluated_at),
            hours_until,
            unrecognized_reason: reason_code.map(str::to_string),
        }
    }

    pub fn reschedule_eligibility(
        &self,
        scheduled_time: DateTime<Utc>,
        now: DateTime<Utc>,
        prior_reschedule_count: u32,
    ) -> RescheduleEligibility {
        reschedule::check(&self.policy, scheduled_time, now, prior_reschedule_count)
    }
}

/// Penalty/refund split for one booking event. `penalty + refund` always equals the price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyResult {
    pub penalty: Decimal,
    pub refund: Decimal,
    pub refund_percentage: Decimal,
    pub reason: PenaltyReason,
}

/// Why a penalty was charged, kept for refund audits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PenaltyReason {
    FreeCancellationWindow,
    StandardPolicy {
        threshold_hours: Decimal,
    },
    LateCancellation,
    NoShow,
    NoShowPolicyDisabled,
    Exception {
        reason_code: String,
        requires_proof: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
}

impl PenaltyReason {
    pub fn summary(&self) -> String {
        match self {
            PenaltyReason::FreeCancellationWindow => "free cancellation window".to_string(),
            PenaltyReason::StandardPolicy { threshold_hours } => {
                format!("standard policy ({}h notice tier)", threshold_hours.normalize())
            }
            PenaltyReason::LateCancellation => "late cancellation".to_string(),
            PenaltyReason::NoShow => "no-show penalty".to_string(),
            PenaltyReason::NoShowPolicyDisabled => "no-show policy not enabled".to_string(),
            PenaltyReason::Exception {
                reason_code,
                requires_proof,
                ..
            } => {
                if *requires_proof {
                    format!("exception: {reason_code} (proof required)")
                } else {
                    format!("exception: {reason_code}")
                }
            }
        }
    }
}

/// Cancellation decision plus the context the controller logs and reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationAssessment {
    pub result: PenaltyResult,
    /// Signed notice in hours at evaluation time.
    pub hours_until: Decimal,
    /// Reason code that was supplied but matched no exception.
    pub unrecognized_reason: Option<String>,
}
