//! Macro snapshot and market-regime classification.
//!
//! A [`MacroSnapshot`] is a point-in-time fact: it is created whole and
//! never updated, so two snapshots can always be compared for drift. The
//! regime is a pure function of the indicator levels.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Volatility level below which the market reads risk-on.
const RISK_ON_VOLATILITY_CEILING: f64 = 20.0;

/// Volatility level above which the market reads risk-off.
const RISK_OFF_VOLATILITY_FLOOR: f64 = 25.0;

/// Minimum yield move (percentage points) for the trend refinement.
const YIELD_TREND_FLOOR: f64 = 0.05;

/// Minimum dollar-index move (percent) for the trend refinement.
const DOLLAR_TREND_FLOOR: f64 = 0.25;

/// Coarse classification of market risk appetite.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Regime {
    /// Volatility subdued; risk assets in demand.
    RiskOn,
    /// Volatility elevated; flight to safety.
    RiskOff,
    /// Neither reading is clear.
    Neutral,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RiskOn => "risk-on",
            Self::RiskOff => "risk-off",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify the market regime from the volatility index, refined by the
/// day's yield and dollar-index moves where available.
///
/// The volatility bands are authoritative at the extremes. Inside the
/// neutral band, an agreeing yield and dollar trend tilts the reading;
/// ties and ambiguous combinations resolve to neutral, as does any
/// non-finite input.
pub fn classify_regime(
    volatility_index: f64,
    yield_change: Option<f64>,
    dollar_change_pct: Option<f64>,
) -> Regime {
    if !volatility_index.is_finite() {
        return Regime::Neutral;
    }

    if volatility_index < RISK_ON_VOLATILITY_CEILING {
        return Regime::RiskOn;
    }
    if volatility_index > RISK_OFF_VOLATILITY_FLOOR {
        return Regime::RiskOff;
    }

    match (yield_change, dollar_change_pct) {
        (Some(dy), Some(dd)) if dy.is_finite() && dd.is_finite() => {
            if dy <= -YIELD_TREND_FLOOR && dd <= -DOLLAR_TREND_FLOOR {
                Regime::RiskOn
            } else if dy >= YIELD_TREND_FLOOR && dd >= DOLLAR_TREND_FLOOR {
                Regime::RiskOff
            } else {
                Regime::Neutral
            }
        }
        _ => Regime::Neutral,
    }
}

/// Point-in-time snapshot of the macro backdrop.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroSnapshot {
    /// Volatility index level (e.g., VIX).
    pub volatility_index: f64,

    /// Long-maturity treasury yield, in percent.
    pub long_yield: f64,

    /// Dollar index level.
    pub dollar_index: f64,

    /// Broad equity index level.
    pub equity_index_level: f64,

    /// Broad equity index change on the day, in percent.
    pub equity_index_change_pct: f64,

    /// Regime classified from the fields above.
    pub regime: Regime,

    /// When the snapshot was observed.
    pub observed_at: DateTime<Utc>,
}

/// Macro-trigger thresholds for analysis invalidation.
#[derive(Clone, Debug)]
pub struct MacroTriggerLimits {
    /// Volatility-index move (points) that invalidates.
    pub volatility_points: f64,
    /// Long-yield move (percentage points) that invalidates.
    pub yield_points: f64,
    /// Dollar-index move (percent) that invalidates.
    pub dollar_pct: f64,
}

impl Default for MacroTriggerLimits {
    fn default() -> Self {
        Self {
            volatility_points: 3.0,
            yield_points: 0.1,
            dollar_pct: 1.0,
        }
    }
}

/// Which macro indicator moved enough to invalidate an analysis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MacroTrigger {
    /// Volatility index moved by this many points.
    Volatility(f64),
    /// Long yield moved by this many percentage points.
    Yield(f64),
    /// Dollar index moved by this percent.
    Dollar(f64),
}

impl fmt::Display for MacroTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Volatility(points) => write!(f, "volatility moved {points:.1} points"),
            Self::Yield(points) => write!(f, "long yield moved {points:.2} points"),
            Self::Dollar(pct) => write!(f, "dollar index moved {pct:.2}%"),
        }
    }
}

impl MacroSnapshot {
    /// Check whether any macro indicator has drifted past the limits
    /// since `baseline`. Returns the first firing trigger.
    ///
    /// A non-finite comparison (bad data on either side) fires the
    /// corresponding trigger: an unverifiable reading is treated the
    /// same as a tripped one.
    pub fn trigger_since(
        &self,
        baseline: &MacroSnapshot,
        limits: &MacroTriggerLimits,
    ) -> Option<MacroTrigger> {
        let volatility_delta = (self.volatility_index - baseline.volatility_index).abs();
        if !volatility_delta.is_finite() || volatility_delta > limits.volatility_points {
            return Some(MacroTrigger::Volatility(volatility_delta));
        }

        let yield_delta = (self.long_yield - baseline.long_yield).abs();
        if !yield_delta.is_finite() || yield_delta > limits.yield_points {
            return Some(MacroTrigger::Yield(yield_delta));
        }

        let dollar_pct = if baseline.dollar_index != 0.0 {
            ((self.dollar_index - baseline.dollar_index) / baseline.dollar_index).abs() * 100.0
        } else {
            f64::INFINITY
        };
        if !dollar_pct.is_finite() || dollar_pct > limits.dollar_pct {
            return Some(MacroTrigger::Dollar(dollar_pct));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(volatility: f64, long_yield: f64, dollar: f64) -> MacroSnapshot {
        MacroSnapshot {
            volatility_index: volatility,
            long_yield,
            dollar_index: dollar,
            equity_index_level: 5000.0,
            equity_index_change_pct: 0.2,
            regime: classify_regime(volatility, None, None),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_regime_bands() {
        assert_eq!(classify_regime(16.0, None, None), Regime::RiskOn);
        assert_eq!(classify_regime(28.0, None, None), Regime::RiskOff);
        assert_eq!(classify_regime(22.0, None, None), Regime::Neutral);
    }

    #[test]
    fn test_regime_trend_refinement_in_neutral_band() {
        // Falling yields and a softening dollar tilt risk-on
        assert_eq!(
            classify_regime(22.0, Some(-0.08), Some(-0.5)),
            Regime::RiskOn
        );
        // Rising yields and a firming dollar tilt risk-off
        assert_eq!(classify_regime(22.0, Some(0.12), Some(0.8)), Regime::RiskOff);
        // Disagreeing trends are ambiguous
        assert_eq!(
            classify_regime(22.0, Some(0.12), Some(-0.8)),
            Regime::Neutral
        );
        // Moves below the trend floors do not tilt
        assert_eq!(
            classify_regime(22.0, Some(0.01), Some(0.05)),
            Regime::Neutral
        );
    }

    #[test]
    fn test_regime_extremes_ignore_trends() {
        assert_eq!(classify_regime(16.0, Some(0.5), Some(2.0)), Regime::RiskOn);
        assert_eq!(
            classify_regime(30.0, Some(-0.5), Some(-2.0)),
            Regime::RiskOff
        );
    }

    #[test]
    fn test_regime_bad_input_is_neutral() {
        assert_eq!(classify_regime(f64::NAN, None, None), Regime::Neutral);
    }

    #[test]
    fn test_volatility_trigger() {
        let baseline = snapshot(16.0, 4.2, 104.0);
        let now = snapshot(20.0, 4.2, 104.0);
        // A 4-point jump trips the 3-point limit
        assert!(matches!(
            now.trigger_since(&baseline, &MacroTriggerLimits::default()),
            Some(MacroTrigger::Volatility(_))
        ));
    }

    #[test]
    fn test_yield_trigger() {
        let baseline = snapshot(16.0, 4.20, 104.0);
        let now = snapshot(16.5, 4.35, 104.0);
        assert!(matches!(
            now.trigger_since(&baseline, &MacroTriggerLimits::default()),
            Some(MacroTrigger::Yield(_))
        ));
    }

    #[test]
    fn test_dollar_trigger() {
        let baseline = snapshot(16.0, 4.2, 104.0);
        let now = snapshot(16.5, 4.25, 106.0);
        assert!(matches!(
            now.trigger_since(&baseline, &MacroTriggerLimits::default()),
            Some(MacroTrigger::Dollar(_))
        ));
    }

    #[test]
    fn test_small_moves_do_not_trigger() {
        let baseline = snapshot(16.0, 4.20, 104.0);
        let now = snapshot(17.5, 4.25, 104.5);
        assert_eq!(
            now.trigger_since(&baseline, &MacroTriggerLimits::default()),
            None
        );
    }
}
