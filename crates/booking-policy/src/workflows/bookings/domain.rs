use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::evaluation::CURRENCY_SCALE;

/// Largest accepted booking price. Keeps every percentage split inside `Decimal` range.
pub const MAX_PRICE: Decimal = dec!(1000000000000);

/// Identifier wrapper for bookings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingId(pub String);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub String);

/// Strictly positive booking amount expressed in the currency's major unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    pub fn new(amount: Decimal) -> Result<Self, InvalidPrice> {
        if amount <= Decimal::ZERO {
            return Err(InvalidPrice::NotPositive(amount));
        }
        if amount > MAX_PRICE {
            return Err(InvalidPrice::TooLarge(amount));
        }
        if amount.normalize().scale() > CURRENCY_SCALE {
            return Err(InvalidPrice::SubMinorUnit(amount));
        }
        Ok(Self(amount))
    }

    pub fn amount(self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Price {
    type Error = InvalidPrice;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(value: Price) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPrice {
    #[error("booking price must be positive, found {0}")]
    NotPositive(Decimal),
    #[error("booking price {0} is finer than the smallest currency unit")]
    SubMinorUnit(Decimal),
    #[error("booking price {0} exceeds the supported maximum")]
    TooLarge(Decimal),
}

/// Lifecycle status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
    Disputed,
}

impl BookingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no-show",
            BookingStatus::Disputed => "disputed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }

    /// Only pending and confirmed bookings may be cancelled, rescheduled, or marked no-show.
    /// Disputed bookings stay frozen until the dispute workflow resolves them.
    pub const fn accepts_lifecycle_actions(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

/// Role of the party acting on a booking; also recorded as `cancelled_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Client,
    Provider,
    Admin,
}

impl ActorRole {
    pub const fn label(self) -> &'static str {
        match self {
            ActorRole::Client => "client",
            ActorRole::Provider => "provider",
            ActorRole::Admin => "admin",
        }
    }
}

/// Authenticated caller as resolved by the (external) auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn client(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: ActorRole::Client,
        }
    }

    pub fn provider(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: ActorRole::Provider,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: ActorRole::Admin,
        }
    }
}

/// Booking aggregate as far as the cancellation engine is concerned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: BookingId,
    pub client_id: ClientId,
    pub provider_id: ProviderId,
    pub service_id: ServiceId,
    pub status: BookingStatus,
    pub scheduled_time: DateTime<Utc>,
    pub price: Price,
    #[serde(default)]
    pub reschedule_count: u32,
    #[serde(default)]
    pub cancellation_penalty: Option<Decimal>,
    #[serde(default)]
    pub refund_amount: Option<Decimal>,
    #[serde(default)]
    pub cancellation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_by: Option<ActorRole>,
}

impl Booking {
    pub fn new(
        booking_id: BookingId,
        client_id: ClientId,
        provider_id: ProviderId,
        service_id: ServiceId,
        scheduled_time: DateTime<Utc>,
        price: Price,
    ) -> Self {
        Self {
            booking_id,
            client_id,
            provider_id,
            service_id,
            status: BookingStatus::Pending,
            scheduled_time,
            price,
            reschedule_count: 0,
            cancellation_penalty: None,
            refund_amount: None,
            cancellation_time: None,
            cancelled_by: None,
        }
    }

    pub fn is_owned_by(&self, actor: &Actor) -> bool {
        match actor.role {
            ActorRole::Client => self.client_id.0 == actor.id,
            ActorRole::Provider => self.provider_id.0 == actor.id,
            ActorRole::Admin => false,
        }
    }

    pub fn status_view(&self) -> BookingStatusView {
        BookingStatusView {
            booking_id: self.booking_id.clone(),
            status: self.status.label(),
            scheduled_time: self.scheduled_time,
            price: self.price.amount(),
            reschedule_count: self.reschedule_count,
            cancellation_penalty: self.cancellation_penalty,
            refund_amount: self.refund_amount,
            cancelled_by: self.cancelled_by.map(ActorRole::label),
        }
    }
}

/// Sanitized representation of a booking for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct BookingStatusView {
    pub booking_id: BookingId,
    pub status: &'static str,
    pub scheduled_time: DateTime<Utc>,
    pub price: Decimal,
    pub reschedule_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_penalty: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<&'static str>,
}
