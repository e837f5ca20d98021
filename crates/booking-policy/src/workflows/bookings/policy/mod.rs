//! Provider-authored cancellation policy documents.
//!
//! Policies are plain data. They are checked once by [`CancellationPolicy::validate`] when a
//! provider saves them and again when the lifecycle controller builds a
//! [`PolicyEngine`](super::evaluation::PolicyEngine) from a stored copy.

mod resolution;
mod validation;

pub use resolution::resolve_active_policy;
pub use validation::{PolicyRejected, PolicyViolation};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{ProviderId, ServiceId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyId(pub String);

/// How a tiered rule's `penalty_value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyKind {
    None,
    Percentage,
    FixedAmount,
    FullCharge,
}

/// Penalty kinds permitted for the late-cancellation fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPenaltyKind {
    Percentage,
    FixedAmount,
}

impl From<FallbackPenaltyKind> for PenaltyKind {
    fn from(kind: FallbackPenaltyKind) -> Self {
        match kind {
            FallbackPenaltyKind::Percentage => PenaltyKind::Percentage,
            FallbackPenaltyKind::FixedAmount => PenaltyKind::FixedAmount,
        }
    }
}

/// Penalty kinds permitted for no-shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoShowPenaltyKind {
    Percentage,
    FixedAmount,
    FullCharge,
}

impl From<NoShowPenaltyKind> for PenaltyKind {
    fn from(kind: NoShowPenaltyKind) -> Self {
        match kind {
            NoShowPenaltyKind::Percentage => PenaltyKind::Percentage,
            NoShowPenaltyKind::FixedAmount => PenaltyKind::FixedAmount,
            NoShowPenaltyKind::FullCharge => PenaltyKind::FullCharge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleFeeKind {
    None,
    FixedAmount,
}

/// One time-tiered penalty rule keyed by minimum advance notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub threshold_hours: Decimal,
    pub penalty_kind: PenaltyKind,
    #[serde(default)]
    pub penalty_value: Decimal,
    pub refund_percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FreeCancellationWindow {
    pub enabled: bool,
    pub hours: Decimal,
}

/// Applied when no tiered rule is satisfied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateCancellationFallback {
    /// Informational only; the fallback applies whenever no tiered rule matches.
    pub threshold_hours: Decimal,
    pub penalty_kind: FallbackPenaltyKind,
    pub penalty_value: Decimal,
}

impl Default for LateCancellationFallback {
    fn default() -> Self {
        Self {
            threshold_hours: Decimal::ZERO,
            penalty_kind: FallbackPenaltyKind::Percentage,
            penalty_value: Decimal::ONE_HUNDRED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoShowPolicy {
    pub enabled: bool,
    pub penalty_kind: NoShowPenaltyKind,
    #[serde(default)]
    pub penalty_value: Decimal,
    /// Informational only; whether a no-show may be declared is decided by the caller.
    #[serde(default)]
    pub grace_period_minutes: u32,
}

impl Default for NoShowPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            penalty_kind: NoShowPenaltyKind::FullCharge,
            penalty_value: Decimal::ZERO,
            grace_period_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReschedulePolicy {
    pub allowed: bool,
    pub max_reschedules: u32,
    pub min_notice_hours: Decimal,
    pub fee_kind: RescheduleFeeKind,
    #[serde(default)]
    pub fee_value: Decimal,
}

impl Default for ReschedulePolicy {
    fn default() -> Self {
        Self {
            allowed: false,
            max_reschedules: 0,
            min_notice_hours: Decimal::ZERO,
            fee_kind: RescheduleFeeKind::None,
            fee_value: Decimal::ZERO,
        }
    }
}

/// Named override reason such as `emergency` or `provider_cancellation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyException {
    pub reason_code: String,
    pub refund_percentage: Decimal,
    #[serde(default)]
    pub requires_proof: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Stored alongside the policy but not read by any calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatOffenderPolicy {
    pub enabled: bool,
    pub max_late_cancellations: u32,
    pub lookback_days: u32,
    pub additional_penalty_percentage: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositKind {
    Percentage,
    FixedAmount,
}

/// Stored alongside the policy but not read by any calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositPolicy {
    pub required: bool,
    pub kind: DepositKind,
    pub value: Decimal,
    pub refundable: bool,
}

/// Cancellation and refund policy owned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationPolicy {
    pub policy_id: PolicyId,
    pub provider_id: ProviderId,
    #[serde(default)]
    pub name: String,
    /// Services this policy is scoped to; empty for provider-wide policies.
    #[serde(default)]
    pub applies_to: Vec<ServiceId>,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    #[serde(default)]
    pub free_cancellation_window: FreeCancellationWindow,
    #[serde(default)]
    pub late_cancellation_fallback: LateCancellationFallback,
    #[serde(default)]
    pub no_show_policy: NoShowPolicy,
    #[serde(default)]
    pub reschedule_policy: ReschedulePolicy,
    #[serde(default)]
    pub exceptions: Vec<PolicyException>,
    #[serde(default)]
    pub repeat_offender_policy: Option<RepeatOffenderPolicy>,
    #[serde(default)]
    pub deposit_policy: Option<DepositPolicy>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl CancellationPolicy {
    /// Empty provider-wide default policy; callers fill in rules and windows.
    pub fn new(policy_id: PolicyId, provider_id: ProviderId) -> Self {
        Self {
            policy_id,
            provider_id,
            name: String::new(),
            applies_to: Vec::new(),
            rules: Vec::new(),
            free_cancellation_window: FreeCancellationWindow::default(),
            late_cancellation_fallback: LateCancellationFallback::default(),
            no_show_policy: NoShowPolicy::default(),
            reschedule_policy: ReschedulePolicy::default(),
            exceptions: Vec::new(),
            repeat_offender_policy: None,
            deposit_policy: None,
            is_default: true,
            is_active: true,
        }
    }

    pub fn applies_to_service(&self, service_id: &ServiceId) -> bool {
        self.applies_to.iter().any(|candidate| candidate == service_id)
    }

    pub fn exception(&self, reason_code: &str) -> Option<&PolicyException> {
        self.exceptions
            .iter()
            .find(|exception| exception.reason_code == reason_code)
    }
}
