use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::workflows::bookings::clock::FixedClock;
use crate::workflows::bookings::domain::{
    Booking, BookingId, BookingStatus, ClientId, Price, ProviderId, ServiceId,
};
use crate::workflows::bookings::evaluation::PolicyEngine;
use crate::workflows::bookings::lifecycle::BookingLifecycleService;
use crate::workflows::bookings::policy::{
    CancellationPolicy, FreeCancellationWindow, NoShowPenaltyKind, NoShowPolicy, PenaltyKind,
    PolicyException, PolicyId, PolicyRule, RescheduleFeeKind, ReschedulePolicy,
};
use crate::workflows::bookings::repository::{
    BookingRepository, PolicyRepository, Precondition, RefundDecision, RefundDispatchError,
    RefundPublisher, RepositoryError,
};

pub(super) const PROVIDER: &str = "prov-1";
pub(super) const CLIENT: &str = "client-1";
pub(super) const SERVICE: &str = "svc-massage";

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 13, 9, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn price(amount: Decimal) -> Price {
    Price::new(amount).expect("valid price")
}

pub(super) fn rule(threshold: Decimal, kind: PenaltyKind, value: Decimal, refund: Decimal) -> PolicyRule {
    PolicyRule {
        threshold_hours: threshold,
        penalty_kind: kind,
        penalty_value: value,
        refund_percentage: refund,
    }
}

/// Two tiers (12h at 50%, 24h at 25%), a 48h free window, and the default fallback.
pub(super) fn standard_policy() -> CancellationPolicy {
    let mut policy = CancellationPolicy::new(
        PolicyId("pol-standard".to_string()),
        ProviderId(PROVIDER.to_string()),
    );
    policy.name = "Standard".to_string();
    policy.rules = vec![
        rule(dec!(12), PenaltyKind::Percentage, dec!(50), dec!(50)),
        rule(dec!(24), PenaltyKind::Percentage, dec!(25), dec!(75)),
    ];
    policy.free_cancellation_window = FreeCancellationWindow {
        enabled: true,
        hours: dec!(48),
    };
    policy.no_show_policy = NoShowPolicy {
        enabled: true,
        penalty_kind: NoShowPenaltyKind::FullCharge,
        penalty_value: Decimal::ZERO,
        grace_period_minutes: 15,
    };
    policy.reschedule_policy = ReschedulePolicy {
        allowed: true,
        max_reschedules: 2,
        min_notice_hours: dec!(24),
        fee_kind: RescheduleFeeKind::FixedAmount,
        fee_value: dec!(10),
    };
    policy.exceptions = vec![
        PolicyException {
            reason_code: "emergency".to_string(),
            refund_percentage: dec!(100),
            requires_proof: true,
            notes: Some("Upload documentation within 7 days".to_string()),
        },
        PolicyException {
            reason_code: "provider_cancellation".to_string(),
            refund_percentage: dec!(100),
            requires_proof: false,
            notes: None,
        },
        PolicyException {
            reason_code: "weather".to_string(),
            refund_percentage: dec!(80),
            requires_proof: false,
            notes: None,
        },
    ];
    policy
}

pub(super) fn engine() -> PolicyEngine {
    PolicyEngine::new(standard_policy()).expect("standard policy is valid")
}

pub(super) fn booking(id: &str, hours_ahead: i64) -> Booking {
    let mut booking = Booking::new(
        BookingId(id.to_string()),
        ClientId(CLIENT.to_string()),
        ProviderId(PROVIDER.to_string()),
        ServiceId(SERVICE.to_string()),
        now() + Duration::hours(hours_ahead),
        price(dec!(100)),
    );
    booking.status = BookingStatus::Confirmed;
    booking
}

pub(super) type TestService = BookingLifecycleService<MemoryBookings, MemoryPolicies, MemoryRefunds>;

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) bookings: Arc<MemoryBookings>,
    pub(super) refunds: Arc<MemoryRefunds>,
    pub(super) clock: Arc<FixedClock>,
}

pub(super) fn harness_with(policies: Vec<CancellationPolicy>, bookings: Vec<Booking>) -> Harness {
    let store = Arc::new(MemoryBookings::default());
    for booking in bookings {
        store.insert(booking).expect("seed booking");
    }
    let refunds = Arc::new(MemoryRefunds::default());
    let clock = Arc::new(FixedClock::new(now()));
    let service = Arc::new(BookingLifecycleService::with_clock(
        store.clone(),
        Arc::new(MemoryPolicies::with(policies)),
        refunds.clone(),
        clock.clone(),
    ));
    Harness {
        service,
        bookings: store,
        refunds,
        clock,
    }
}

pub(super) fn harness(bookings: Vec<Booking>) -> Harness {
    harness_with(vec![standard_policy()], bookings)
}

#[derive(Default, Clone)]
pub(super) struct MemoryBookings {
    pub(super) records: Arc<Mutex<HashMap<BookingId, Booking>>>,
}

impl MemoryBookings {
    pub(super) fn stored(&self, id: &str) -> Booking {
        self.fetch(&BookingId(id.to_string()))
            .expect("fetch succeeds")
            .expect("booking present")
    }
}

impl BookingRepository for MemoryBookings {
    fn insert(&self, booking: Booking) -> Result<Booking, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&booking.booking_id) {
            return Err(RepositoryError::Duplicate);
        }
        guard.insert(booking.booking_id.clone(), booking.clone());
        Ok(booking)
    }

    fn fetch(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update_if(
        &self,
        booking: Booking,
        precondition: Precondition,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        match guard.get(&booking.booking_id) {
            None => Err(RepositoryError::NotFound),
            Some(current) if !precondition.holds_for(current) => Err(RepositoryError::Conflict),
            Some(_) => {
                guard.insert(booking.booking_id.clone(), booking);
                Ok(())
            }
        }
    }
}

/// Simulates another request winning the race between fetch and write.
pub(super) struct RacingBookings {
    pub(super) inner: MemoryBookings,
}

impl BookingRepository for RacingBookings {
    fn insert(&self, booking: Booking) -> Result<Booking, RepositoryError> {
        self.inner.insert(booking)
    }

    fn fetch(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn update_if(
        &self,
        _booking: Booking,
        _precondition: Precondition,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Conflict)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryPolicies {
    policies: Vec<CancellationPolicy>,
}

impl MemoryPolicies {
    pub(super) fn with(policies: Vec<CancellationPolicy>) -> Self {
        Self { policies }
    }
}

impl PolicyRepository for MemoryPolicies {
    fn policies_for_provider(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Vec<CancellationPolicy>, RepositoryError> {
        Ok(self
            .policies
            .iter()
            .filter(|policy| &policy.provider_id == provider_id)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRefunds {
    events: Arc<Mutex<Vec<RefundDecision>>>,
}

impl MemoryRefunds {
    pub(super) fn events(&self) -> Vec<RefundDecision> {
        self.events.lock().expect("refund mutex poisoned").clone()
    }
}

impl RefundPublisher for MemoryRefunds {
    fn publish(&self, decision: RefundDecision) -> Result<(), RefundDispatchError> {
        self.events
            .lock()
            .expect("refund mutex poisoned")
            .push(decision);
        Ok(())
    }
}

pub(super) struct OfflineRefunds;

impl RefundPublisher for OfflineRefunds {
    fn publish(&self, _decision: RefundDecision) -> Result<(), RefundDispatchError> {
        Err(RefundDispatchError::Transport("processor offline".to_string()))
    }
}

pub(super) fn amount(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal serialized as string")
        .parse()
        .expect("decimal amount")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
