use std::collections::HashMap;

use rust_decimal::Decimal;

use super::{CancellationPolicy, PenaltyKind, PolicyId};

/// Authoring-time problems that make a policy unusable for calculation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("{field} has negative hours ({value})")]
    NegativeHours { field: String, value: Decimal },
    #[error("rules[{first}] and rules[{second}] share threshold {threshold_hours}h")]
    DuplicateThreshold {
        first: usize,
        second: usize,
        threshold_hours: Decimal,
    },
    #[error("{field} refund percentage {value} is outside 0-100")]
    RefundPercentageOutOfRange { field: String, value: Decimal },
    #[error("{field} penalty percentage {value} is outside 0-100")]
    PenaltyPercentageOutOfRange { field: String, value: Decimal },
    #[error("{field} amount {value} is negative")]
    NegativeAmount { field: String, value: Decimal },
    #[error("exceptions[{index}] has a blank reason code")]
    BlankReasonCode { index: usize },
    #[error("reason code '{reason_code}' is configured more than once")]
    DuplicateReasonCode { reason_code: String },
}

/// A policy that failed validation, with every violation found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("policy {} is malformed: {}", .policy_id.0, join_violations(.violations))]
pub struct PolicyRejected {
    pub policy_id: PolicyId,
    pub violations: Vec<PolicyViolation>,
}

fn join_violations(violations: &[PolicyViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn within_percent(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= Decimal::ONE_HUNDRED
}

impl CancellationPolicy {
    /// Collect every authoring problem in the policy. An empty list means the policy is usable.
    pub fn violations(&self) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();
        let mut seen_thresholds: HashMap<Decimal, usize> = HashMap::new();

        for (index, rule) in self.rules.iter().enumerate() {
            let field = format!("rules[{index}]");
            if rule.threshold_hours < Decimal::ZERO {
                violations.push(PolicyViolation::NegativeHours {
                    field: field.clone(),
                    value: rule.threshold_hours,
                });
            }
            // Decimal hashing normalizes scale, so 24 and 24.0 collide here.
            if let Some(first) = seen_thresholds.insert(rule.threshold_hours, index) {
                violations.push(PolicyViolation::DuplicateThreshold {
                    first,
                    second: index,
                    threshold_hours: rule.threshold_hours,
                });
            }
            if !within_percent(rule.refund_percentage) {
                violations.push(PolicyViolation::RefundPercentageOutOfRange {
                    field: field.clone(),
                    value: rule.refund_percentage,
                });
            }
            check_penalty(&mut violations, field, rule.penalty_kind, rule.penalty_value);
        }

        if self.free_cancellation_window.hours < Decimal::ZERO {
            violations.push(PolicyViolation::NegativeHours {
                field: "free_cancellation_window".to_string(),
                value: self.free_cancellation_window.hours,
            });
        }

        let fallback = &self.late_cancellation_fallback;
        if fallback.threshold_hours < Decimal::ZERO {
            violations.push(PolicyViolation::NegativeHours {
                field: "late_cancellation_fallback".to_string(),
                value: fallback.threshold_hours,
            });
        }
        check_penalty(
            &mut violations,
            "late_cancellation_fallback".to_string(),
            fallback.penalty_kind.into(),
            fallback.penalty_value,
        );

        check_penalty(
            &mut violations,
            "no_show_policy".to_string(),
            self.no_show_policy.penalty_kind.into(),
            self.no_show_policy.penalty_value,
        );

        let reschedule = &self.reschedule_policy;
        if reschedule.min_notice_hours < Decimal::ZERO {
            violations.push(PolicyViolation::NegativeHours {
                field: "reschedule_policy".to_string(),
                value: reschedule.min_notice_hours,
            });
        }
        if reschedule.fee_value < Decimal::ZERO {
            violations.push(PolicyViolation::NegativeAmount {
                field: "reschedule_policy fee".to_string(),
                value: reschedule.fee_value,
            });
        }

        let mut seen_codes: HashMap<&str, usize> = HashMap::new();
        for (index, exception) in self.exceptions.iter().enumerate() {
            if exception.reason_code.trim().is_empty() {
                violations.push(PolicyViolation::BlankReasonCode { index });
                continue;
            }
            if seen_codes
                .insert(exception.reason_code.as_str(), index)
                .is_some()
            {
                violations.push(PolicyViolation::DuplicateReasonCode {
                    reason_code: exception.reason_code.clone(),
                });
            }
            if !within_percent(exception.refund_percentage) {
                violations.push(PolicyViolation::RefundPercentageOutOfRange {
                    field: format!("exceptions[{index}]"),
                    value: exception.refund_percentage,
                });
            }
        }

        violations
    }

    /// Reject the policy unless it is well-formed.
    pub fn validate(&self) -> Result<(), PolicyRejected> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(PolicyRejected {
                policy_id: self.policy_id.clone(),
                violations,
            })
        }
    }
}

fn check_penalty(
    violations: &mut Vec<PolicyViolation>,
    field: String,
    kind: PenaltyKind,
    value: Decimal,
) {
    match kind {
        PenaltyKind::Percentage if !within_percent(value) => {
            violations.push(PolicyViolation::PenaltyPercentageOutOfRange { field, value });
        }
        PenaltyKind::FixedAmount if value < Decimal::ZERO => {
            violations.push(PolicyViolation::NegativeAmount { field, value });
        }
        _ => {}
    }
}
