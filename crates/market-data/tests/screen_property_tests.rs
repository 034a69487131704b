//! Property-based tests for the quality filter.
//!
//! These tests verify that universal properties hold across all valid
//! inputs, using the `proptest` crate for random test case generation.

use proptest::prelude::*;
use rust_decimal::Decimal;
use stockdesk_market_data::{passes, screen, Instrument, ScreenThresholds};

// =============================================================================
// Generators
// =============================================================================

/// Generates a random exchange name, weighted toward the primary set.
fn arb_exchange() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("NYSE".to_string()),
        Just("NASDAQ".to_string()),
        Just("AMEX".to_string()),
        Just("TSX".to_string()),
        Just("LSE".to_string()),
        Just("OTC".to_string()),
    ]
}

/// Generates a random candidate instrument, with occasional missing facts.
fn arb_instrument() -> impl Strategy<Value = Instrument> {
    (
        "[A-Z]{1,5}",                                       // symbol
        "[A-Za-z ]{3,20}",                                  // name
        arb_exchange(),                                     // exchange
        proptest::option::of(0.0f64..5.0e12),               // market_cap
        proptest::option::of(1u64..100_000),                // price cents
        proptest::option::of(0.0f64..100_000_000.0),        // avg_volume
    )
        .prop_map(|(symbol, name, exchange, market_cap, price, avg_volume)| {
            let mut instrument = Instrument::new(symbol, name, exchange, "EQUITY");
            instrument.market_cap = market_cap;
            instrument.price = price.map(|cents| Decimal::new(cents as i64, 2));
            instrument.avg_volume = avg_volume;
            instrument
        })
}

fn arb_instruments(max_count: usize) -> impl Strategy<Value = Vec<Instrument>> {
    proptest::collection::vec(arb_instrument(), 0..=max_count)
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The filtered set equals the intersection of the sets obtained by
    /// applying each threshold predicate independently - order of
    /// predicate application does not affect the result.
    #[test]
    fn prop_screen_is_a_pure_intersection(candidates in arb_instruments(30)) {
        let thresholds = ScreenThresholds::default();

        let cap_only = ScreenThresholds {
            min_price: Decimal::ZERO,
            min_avg_volume: 0.0,
            allowed_exchanges: vec![
                "NYSE".into(), "NASDAQ".into(), "AMEX".into(),
                "TSX".into(), "LSE".into(), "OTC".into(),
            ],
            ..thresholds.clone()
        };
        let price_only = ScreenThresholds {
            min_market_cap: 0.0,
            min_avg_volume: 0.0,
            allowed_exchanges: cap_only.allowed_exchanges.clone(),
            ..thresholds.clone()
        };
        let volume_only = ScreenThresholds {
            min_market_cap: 0.0,
            min_price: Decimal::ZERO,
            allowed_exchanges: cap_only.allowed_exchanges.clone(),
            ..thresholds.clone()
        };
        let exchange_only = ScreenThresholds {
            min_market_cap: 0.0,
            min_price: Decimal::ZERO,
            min_avg_volume: 0.0,
            ..thresholds.clone()
        };

        // A candidate with a missing fact fails the corresponding
        // single-threshold screen only when that fact is screened, so
        // the intersection must treat missing facts the same way the
        // combined screen does.
        let combined: Vec<String> = screen(candidates.clone(), &thresholds)
            .into_iter()
            .map(|c| c.symbol)
            .collect();
        let intersected: Vec<String> = candidates
            .iter()
            .filter(|c| passes(c, &cap_only))
            .filter(|c| passes(c, &price_only))
            .filter(|c| passes(c, &volume_only))
            .filter(|c| passes(c, &exchange_only))
            .map(|c| c.symbol.clone())
            .collect();

        prop_assert_eq!(combined, intersected);
    }

    /// Every survivor clears every threshold; nothing new is invented.
    #[test]
    fn prop_survivors_pass_all_thresholds(candidates in arb_instruments(30)) {
        let thresholds = ScreenThresholds::default();
        let kept = screen(candidates.clone(), &thresholds);

        prop_assert!(kept.len() <= candidates.len());
        for survivor in &kept {
            prop_assert!(passes(survivor, &thresholds));
        }
    }

    /// Screening is idempotent: a second pass changes nothing.
    #[test]
    fn prop_screen_is_idempotent(candidates in arb_instruments(30)) {
        let thresholds = ScreenThresholds::default();
        let once = screen(candidates, &thresholds);
        let symbols_once: Vec<String> = once.iter().map(|c| c.symbol.clone()).collect();

        let twice = screen(once, &thresholds);
        let symbols_twice: Vec<String> = twice.iter().map(|c| c.symbol.clone()).collect();

        prop_assert_eq!(symbols_once, symbols_twice);
    }

    /// Input order of survivors is preserved.
    #[test]
    fn prop_screen_preserves_order(candidates in arb_instruments(30)) {
        let thresholds = ScreenThresholds::default();
        let kept = screen(candidates.clone(), &thresholds);

        let expected: Vec<String> = candidates
            .iter()
            .filter(|c| passes(c, &thresholds))
            .map(|c| c.symbol.clone())
            .collect();
        let actual: Vec<String> = kept.iter().map(|c| c.symbol.clone()).collect();
        prop_assert_eq!(actual, expected);
    }
}
