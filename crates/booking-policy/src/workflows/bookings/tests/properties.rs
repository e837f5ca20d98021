use chrono::Duration;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::common::{engine, now};
use crate::workflows::bookings::domain::Price;

fn price_strategy() -> impl Strategy<Value = Price> {
    (1i64..=5_000_000).prop_map(|cents| {
        Price::new(Decimal::new(cents, 2)).expect("positive two-place price")
    })
}

proptest! {
    #[test]
    fn cancellation_split_conserves_the_price(
        price in price_strategy(),
        minutes_ahead in -600i64..6_000,
    ) {
        let engine = engine();
        let scheduled = now() + Duration::minutes(minutes_ahead);

        let result = engine.cancellation_penalty(price, scheduled, now());

        prop_assert_eq!(result.penalty + result.refund, price.amount());
        prop_assert!(result.penalty >= Decimal::ZERO);
        prop_assert!(result.refund >= Decimal::ZERO);
        prop_assert!(result.penalty.scale() <= 2);
        prop_assert!(result.refund_percentage >= Decimal::ZERO);
        prop_assert!(result.refund_percentage <= Decimal::ONE_HUNDRED);
    }

    #[test]
    fn more_notice_never_costs_more(
        price in price_strategy(),
        earlier in 0i64..4_000,
        extra in 0i64..4_000,
    ) {
        let engine = engine();
        let short = engine.cancellation_penalty(price, now() + Duration::minutes(earlier), now());
        let long = engine.cancellation_penalty(
            price,
            now() + Duration::minutes(earlier + extra),
            now(),
        );

        prop_assert!(long.penalty <= short.penalty);
    }

    #[test]
    fn exception_and_no_show_splits_conserve_the_price(
        price in price_strategy(),
        code in prop::sample::select(vec!["emergency", "provider_cancellation", "weather"]),
    ) {
        let engine = engine();

        let exception = engine.exception(code, price).expect("configured exception");
        prop_assert_eq!(exception.penalty + exception.refund, price.amount());

        let no_show = engine.no_show(price);
        prop_assert_eq!(no_show.penalty + no_show.refund, price.amount());
        prop_assert_eq!(no_show.refund, Decimal::ZERO);
    }
}
