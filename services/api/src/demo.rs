use crate::infra::{
    parse_notice, parse_price, InMemoryBookingRepository, InMemoryPolicyRepository,
    LoggingRefundPublisher,
};
use booking_policy::error::AppError;
use booking_policy::workflows::bookings::{
    Actor, Booking, BookingId, BookingLifecycleService, BookingRepository, BookingStatus,
    CancellationPolicy, ClientId, FixedClock, FreeCancellationWindow, LifecycleError,
    NoShowPenaltyKind, NoShowPolicy, PenaltyKind, PenaltyResult, PolicyEngine, PolicyException,
    PolicyId, PolicyRule, Price, ProviderId, RescheduleFeeKind, ReschedulePolicy, ServiceId,
    TransitionOutcome,
};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_PROVIDER: &str = "prov-harbor-spa";
const DEMO_CLIENT: &str = "client-jordan";
const DEMO_SERVICE: &str = "svc-massage-60";

#[derive(Args, Debug)]
pub(crate) struct QuoteArgs {
    /// Cancellation policy JSON document
    #[arg(long)]
    pub(crate) policy: PathBuf,
    /// Booking price in the currency's major unit (e.g. 120.50)
    #[arg(long, value_parser = parse_price)]
    pub(crate) price: Price,
    /// Hours between now and the appointment; negative once it has started
    #[arg(long, value_parser = parse_notice, allow_hyphen_values = true)]
    pub(crate) hours_before: Duration,
    /// Exception reason code supplied with the cancellation
    #[arg(long, conflicts_with = "no_show")]
    pub(crate) reason_code: Option<String>,
    /// Quote a provider-declared no-show instead of a cancellation
    #[arg(long)]
    pub(crate) no_show: bool,
    /// Print the result as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Price used for every demo booking. Defaults to 100.
    #[arg(long, value_parser = parse_price)]
    pub(crate) price: Option<Price>,
}

pub(crate) fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let QuoteArgs {
        policy,
        price,
        hours_before,
        reason_code,
        no_show,
        json,
    } = args;

    let raw = std::fs::read_to_string(&policy)?;
    let policy: CancellationPolicy = serde_json::from_str(&raw)?;
    let engine = PolicyEngine::new(policy)?;

    let evaluated_at = Utc::now();
    let scheduled_time = evaluated_at
        .checked_add_signed(hours_before)
        .ok_or_else(|| {
            AppError::InvalidInput(format!(
                "appointment {} from now is outside the supported calendar",
                format_notice(hours_before)
            ))
        })?;

    let (result, unrecognized_reason) = if no_show {
        (engine.no_show(price), None)
    } else {
        let assessment =
            engine.assess_cancellation(price, scheduled_time, evaluated_at, reason_code.as_deref());
        (assessment.result, assessment.unrecognized_reason)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let event = if no_show { "No-show" } else { "Cancellation" };
    println!(
        "{event} quote for policy {} ({})",
        engine.policy().policy_id.0,
        display_name(engine.policy())
    );
    println!("- price {} | notice {}", price.amount(), format_notice(hours_before));
    render_result("  ", &result);
    if let Some(code) = unrecognized_reason {
        println!("  note: reason code '{code}' matched no exception; time-based rules applied");
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let price = match args.price {
        Some(price) => price,
        None => Price::new(dec!(100))?,
    };
    let now = Utc::now();
    let clock = Arc::new(FixedClock::new(now));

    let bookings = Arc::new(InMemoryBookingRepository::default());
    let policies = InMemoryPolicyRepository::default();
    let refunds = Arc::new(LoggingRefundPublisher::default());

    let policy = demo_policy();
    policy.validate()?;
    policies
        .add(policy.clone())
        .map_err(LifecycleError::from)?;

    for (booking_id, hours_ahead) in [
        ("bk-tiered", 30),
        ("bk-late", 2),
        ("bk-provider", 0),
        ("bk-emergency", 6),
        ("bk-no-show", -1),
        ("bk-move", 72),
    ] {
        bookings
            .insert(demo_booking(booking_id, now + Duration::hours(hours_ahead), price))
            .map_err(LifecycleError::from)?;
    }

    let service = BookingLifecycleService::with_clock(
        bookings.clone(),
        Arc::new(policies),
        refunds.clone(),
        clock.clone(),
    );

    println!("Booking policy demo");
    println!(
        "Policy {} ({}): tiers at 12h/24h, free window 48h, full-charge no-show, 2 reschedules",
        policy.policy_id.0,
        display_name(&policy)
    );

    let client = Actor::client(DEMO_CLIENT);
    let provider = Actor::provider(DEMO_PROVIDER);

    println!("\n1. Client cancels 30h ahead");
    report_transition(service.cancel(&id("bk-tiered"), &client, None));

    println!("\n2. Client cancels 2h ahead (below every tier)");
    report_transition(service.cancel(&id("bk-late"), &client, None));

    println!("\n3. Provider cancels at appointment time");
    report_transition(service.cancel(
        &id("bk-provider"),
        &provider,
        Some("provider_cancellation"),
    ));

    println!("\n4. Client cancels 6h ahead citing an emergency");
    report_transition(service.cancel(&id("bk-emergency"), &client, Some("emergency")));

    println!("\n5. Provider records a no-show");
    report_transition(service.mark_no_show(&id("bk-no-show"), &provider));

    println!("\n6. Client reschedules until the limit is reached");
    for extra_days in 1..=3 {
        let target = now + Duration::hours(72) + Duration::days(extra_days);
        match service.reschedule(&id("bk-move"), &client, target) {
            Ok(outcome) => println!(
                "  - moved {} -> {} (fee {} {:?}, {} used)",
                outcome.previous_time.format("%Y-%m-%d %H:%M"),
                outcome.booking.scheduled_time.format("%Y-%m-%d %H:%M"),
                outcome.fee,
                outcome.fee_kind,
                outcome.booking.reschedule_count
            ),
            Err(err) => println!("  - rejected: {err}"),
        }
    }

    println!("\n7. Client retries the first cancellation a day later");
    clock.advance(Duration::days(1));
    let before = bookings.fetch(&id("bk-tiered")).ok().flatten();
    match service.cancel(&id("bk-tiered"), &client, Some("emergency")) {
        Ok(_) => println!("  unexpected: booking cancelled twice"),
        Err(err) => println!("  rejected: {err}"),
    }
    let after = bookings.fetch(&id("bk-tiered")).ok().flatten();
    if let (Some(before), Some(after)) = (before, after) {
        println!(
            "  stored booking unchanged: {} (refund {})",
            before == after,
            after
                .refund_amount
                .map(|amount| amount.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    let events = refunds.events();
    if events.is_empty() {
        println!("\nRefund decisions: none dispatched");
    } else {
        println!("\nRefund decisions dispatched to payments:");
        for decision in events {
            println!(
                "  - {} {:?}: refund {} / penalty {} ({})",
                decision.booking_id.0,
                decision.event,
                decision.refund_amount,
                decision.penalty,
                decision.reason
            );
        }
    }

    Ok(())
}

fn report_transition(
    outcome: Result<TransitionOutcome, LifecycleError>,
) {
    match outcome {
        Ok(outcome) => {
            let view = outcome.view();
            println!("  {} -> {}", view.booking_id.0, view.status);
            render_result("  ", &outcome.result);
            if let Some(notes) = view.notes {
                println!("  notes: {notes}");
            }
            if !view.refund_dispatched {
                println!("  refund decision not dispatched; replay from stored fields");
            }
        }
        Err(err) => println!("  rejected: {err}"),
    }
}

fn render_result(indent: &str, result: &PenaltyResult) {
    println!(
        "{indent}penalty {} | refund {} ({}%)",
        result.penalty,
        result.refund,
        result.refund_percentage.normalize()
    );
    println!("{indent}reason: {}", result.reason.summary());
}

fn format_notice(notice: Duration) -> String {
    let hours = Decimal::from(notice.num_minutes()) / Decimal::from(60);
    format!("{}h", hours.round_dp(2).normalize())
}

fn display_name(policy: &CancellationPolicy) -> &str {
    if policy.name.is_empty() {
        "unnamed"
    } else {
        &policy.name
    }
}

fn id(value: &str) -> BookingId {
    BookingId(value.to_string())
}

fn demo_booking(id: &str, scheduled_time: DateTime<Utc>, price: Price) -> Booking {
    let mut booking = Booking::new(
        BookingId(id.to_string()),
        ClientId(DEMO_CLIENT.to_string()),
        ProviderId(DEMO_PROVIDER.to_string()),
        ServiceId(DEMO_SERVICE.to_string()),
        scheduled_time,
        price,
    );
    booking.status = BookingStatus::Confirmed;
    booking
}

fn demo_policy() -> CancellationPolicy {
    let mut policy = CancellationPolicy::new(
        PolicyId("pol-harbor-standard".to_string()),
        ProviderId(DEMO_PROVIDER.to_string()),
    );
    policy.name = "Harbor Spa standard".to_string();
    policy.rules = vec![
        PolicyRule {
            threshold_hours: dec!(24),
            penalty_kind: PenaltyKind::Percentage,
            penalty_value: dec!(25),
            refund_percentage: dec!(75),
        },
        PolicyRule {
            threshold_hours: dec!(12),
            penalty_kind: PenaltyKind::Percentage,
            penalty_value: dec!(50),
            refund_percentage: dec!(50),
        },
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
            reason_code: "provider_cancellation".to_string(),
            refund_percentage: dec!(100),
            requires_proof: false,
            notes: None,
        },
        PolicyException {
            reason_code: "emergency".to_string(),
            refund_percentage: dec!(100),
            requires_proof: true,
            notes: Some("Documentation required within 7 days".to_string()),
        },
    ];
    policy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_policy_is_valid() {
        assert!(demo_policy().validate().is_ok());
    }

    #[test]
    fn notice_formats_in_hours() {
        assert_eq!(format_notice(Duration::minutes(90)), "1.5h");
        assert_eq!(format_notice(Duration::hours(-2)), "-2h");
    }

    #[test]
    fn quote_accepts_the_widest_notice() {
        let path = std::env::temp_dir().join(format!("quote-policy-{}.json", std::process::id()));
        std::fs::write(
            &path,
            serde_json::to_string(&demo_policy()).expect("policy serializes"),
        )
        .expect("policy written");

        let args = QuoteArgs {
            policy: path.clone(),
            price: parse_price("80").expect("price"),
            hours_before: parse_notice("-876600").expect("notice"),
            reason_code: None,
            no_show: false,
            json: true,
        };
        let outcome = run_quote(args);
        let _ = std::fs::remove_file(&path);

        assert!(outcome.is_ok());
    }

    #[test]
    fn demo_runs_to_completion() {
        assert!(run_demo(DemoArgs::default()).is_ok());
    }
}
