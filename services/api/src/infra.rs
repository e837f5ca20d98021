use booking_policy::error::AppError;
use booking_policy::workflows::bookings::{
    Booking, BookingId, BookingRepository, CancellationPolicy, LifecycleError, PolicyRepository,
    Precondition, Price, ProviderId, RefundDecision, RefundDispatchError, RefundPublisher,
    RepositoryError,
};
use chrono::Duration;
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

const MILLIS_PER_HOUR: i64 = 3_600_000;
/// Roughly a century either side of now.
const MAX_NOTICE_HOURS: i64 = 876_600;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryBookingRepository {
    records: Arc<Mutex<HashMap<BookingId, Booking>>>,
}

impl BookingRepository for InMemoryBookingRepository {
    fn insert(&self, booking: Booking) -> Result<Booking, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.contains_key(&booking.booking_id) {
            return Err(RepositoryError::Duplicate);
        }
        guard.insert(booking.booking_id.clone(), booking.clone());
        Ok(booking)
    }

    fn fetch(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn update_if(
        &self,
        booking: Booking,
        precondition: Precondition,
    ) -> Result<(), RepositoryError> {
        // Check and write under one guard so concurrent transitions serialize.
        let mut guard = self.lock()?;
        let current = guard
            .get(&booking.booking_id)
            .ok_or(RepositoryError::NotFound)?;
        if !precondition.holds_for(current) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(booking.booking_id.clone(), booking);
        Ok(())
    }
}

impl InMemoryBookingRepository {
    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<BookingId, Booking>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("booking store lock poisoned".to_string()))
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryPolicyRepository {
    policies: Arc<Mutex<Vec<CancellationPolicy>>>,
}

impl InMemoryPolicyRepository {
    pub(crate) fn add(&self, policy: CancellationPolicy) -> Result<(), RepositoryError> {
        self.policies
            .lock()
            .map_err(|_| RepositoryError::Unavailable("policy store lock poisoned".to_string()))?
            .push(policy);
        Ok(())
    }
}

impl PolicyRepository for InMemoryPolicyRepository {
    fn policies_for_provider(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Vec<CancellationPolicy>, RepositoryError> {
        let guard = self
            .policies
            .lock()
            .map_err(|_| RepositoryError::Unavailable("policy store lock poisoned".to_string()))?;
        Ok(guard
            .iter()
            .filter(|policy| &policy.provider_id == provider_id)
            .cloned()
            .collect())
    }
}

/// Stand-in for the payment processor: logs each decision and keeps it for inspection.
#[derive(Default, Clone)]
pub(crate) struct LoggingRefundPublisher {
    events: Arc<Mutex<Vec<RefundDecision>>>,
}

impl RefundPublisher for LoggingRefundPublisher {
    fn publish(&self, decision: RefundDecision) -> Result<(), RefundDispatchError> {
        info!(
            booking_id = %decision.booking_id.0,
            event = ?decision.event,
            refund = %decision.refund_amount,
            penalty = %decision.penalty,
            "refund decision dispatched"
        );
        let mut guard = self
            .events
            .lock()
            .map_err(|_| RefundDispatchError::Transport("refund log lock poisoned".to_string()))?;
        guard.push(decision);
        Ok(())
    }
}

impl LoggingRefundPublisher {
    pub(crate) fn events(&self) -> Vec<RefundDecision> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

/// Seed data for the in-memory stores.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FixtureDocument {
    #[serde(default)]
    pub(crate) policies: Vec<CancellationPolicy>,
    #[serde(default)]
    pub(crate) bookings: Vec<Booking>,
}

impl FixtureDocument {
    pub(crate) fn from_path(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parse and validate; a malformed policy rejects the whole document.
    pub(crate) fn from_json(raw: &str) -> Result<Self, AppError> {
        let document: Self = serde_json::from_str(raw)?;
        for policy in &document.policies {
            policy.validate()?;
        }
        Ok(document)
    }

    pub(crate) fn seed(
        self,
        bookings: &InMemoryBookingRepository,
        policies: &InMemoryPolicyRepository,
    ) -> Result<(), AppError> {
        let (policy_count, booking_count) = (self.policies.len(), self.bookings.len());
        for policy in self.policies {
            policies.add(policy).map_err(LifecycleError::from)?;
        }
        for booking in self.bookings {
            bookings.insert(booking).map_err(LifecycleError::from)?;
        }
        info!(policies = policy_count, bookings = booking_count, "fixtures loaded");
        Ok(())
    }
}

pub(crate) fn parse_price(raw: &str) -> Result<Price, String> {
    let amount: Decimal = raw
        .trim()
        .parse()
        .map_err(|err| format!("failed to parse '{raw}' as an amount ({err})"))?;
    Price::new(amount).map_err(|err| err.to_string())
}

/// Signed, possibly fractional hours such as `30`, `1.5`, or `-0.25`.
pub(crate) fn parse_notice(raw: &str) -> Result<Duration, String> {
    let hours: Decimal = raw
        .trim()
        .parse()
        .map_err(|err| format!("failed to parse '{raw}' as hours ({err})"))?;
    if hours.abs() > Decimal::from(MAX_NOTICE_HOURS) {
        return Err(format!(
            "'{raw}' hours is out of range (at most {MAX_NOTICE_HOURS} either way)"
        ));
    }
    hours
        .checked_mul(Decimal::from(MILLIS_PER_HOUR))
        .and_then(|millis| millis.trunc().to_i64())
        .and_then(Duration::try_milliseconds)
        .ok_or_else(|| format!("'{raw}' hours is out of range"))
}
