use super::super::domain::ServiceId;
use super::CancellationPolicy;

/// Pick the policy governing a booking of `service_id` among one provider's policies.
///
/// Precedence: an active policy scoped to the service, then the provider's active default.
pub fn resolve_active_policy<'a>(
    policies: &'a [CancellationPolicy],
    service_id: &ServiceId,
) -> Option<&'a CancellationPolicy> {
    policies
        .iter()
        .find(|policy| policy.is_active && policy.applies_to_service(service_id))
        .or_else(|| {
            policies
                .iter()
                .find(|policy| policy.is_active && policy.is_default)
        })
}
