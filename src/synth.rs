//! Value synthesis — turns a reference-range expression into one plausible
//! random value of the same shape.
//!
//! Recognized shapes:
//! - `A/B-C/D` blood pressure: independent integer draws for systolic in
//!   `[A, C]` and diastolic in `[B, D]`
//! - `L-H` interval: real draw in `[L, H]`, one decimal
//! - `<M` upper bound: real draw in `[0.7·M, 0.95·M]`, one decimal
//!
//! Anything else (and any inverted or too-wide range) is returned unchanged.
//! Synthesis never panics on input text; the random source is always
//! injected.

use std::fmt;

use rand::Rng;
use serde::Serialize;

/// Lower and upper fractions of `M` used for `<M` expressions. Keeps values
/// just under the threshold, never at or above it.
const UPPER_BOUND_LOW_FRACTION: f64 = 0.7;
const UPPER_BOUND_HIGH_FRACTION: f64 = 0.95;

// ─── Types ────────────────────────────────────────────────────────────────────

/// Parsed shape of a reference-range expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeExpr {
    BloodPressure {
        low_systolic: i64,
        low_diastolic: i64,
        high_systolic: i64,
        high_diastolic: i64,
    },
    Interval {
        low: f64,
        high: f64,
    },
    UpperBound {
        max: f64,
    },
    Unrecognized,
}

/// One synthesized result value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SynthesizedValue {
    Pressure { systolic: i64, diastolic: i64 },
    /// Already rounded to one decimal place.
    Measured(f64),
    /// Pass-through of an unrecognized expression.
    Text(String),
}

// ─── Parsing ──────────────────────────────────────────────────────────────────

impl RangeExpr {
    /// Classifies an expression. Never fails: malformed input of a known
    /// shape is `Unrecognized`, as are non-finite bounds.
    pub fn parse(expr: &str) -> Self {
        let expr = expr.trim();

        if expr.contains('/') && expr.contains('-') {
            return parse_blood_pressure(expr).unwrap_or(Self::Unrecognized);
        }
        if let Some(rest) = expr.strip_prefix('<') {
            return match parse_finite(rest) {
                Some(max) => Self::UpperBound { max },
                None => Self::Unrecognized,
            };
        }
        if expr.contains('-') {
            return parse_interval(expr).unwrap_or(Self::Unrecognized);
        }
        Self::Unrecognized
    }

    /// True when any segment has low > high. `<M` with negative `M` counts,
    /// since its derived interval would be inverted.
    pub fn is_inverted(&self) -> bool {
        match *self {
            Self::BloodPressure {
                low_systolic,
                low_diastolic,
                high_systolic,
                high_diastolic,
            } => low_systolic > high_systolic || low_diastolic > high_diastolic,
            Self::Interval { low, high } => low > high,
            Self::UpperBound { max } => max < 0.0,
            Self::Unrecognized => false,
        }
    }

    /// True when a real-valued span is finite at both ends but too wide to
    /// draw from uniformly, e.g. `0-1.7976931348623157e308`.
    pub fn is_too_wide(&self) -> bool {
        let (low, high) = match *self {
            Self::Interval { low, high } => (low, high),
            Self::UpperBound { max } => (
                max * UPPER_BOUND_LOW_FRACTION,
                max * UPPER_BOUND_HIGH_FRACTION,
            ),
            Self::BloodPressure { .. } | Self::Unrecognized => return false,
        };
        // Same scale the inclusive float sampler computes.
        !((high - low) / (1.0 - f64::EPSILON)).is_finite()
    }

    /// Draws one value. `None` for unrecognized, inverted or too-wide
    /// expressions.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<SynthesizedValue> {
        if self.is_inverted() || self.is_too_wide() {
            return None;
        }
        match *self {
            Self::BloodPressure {
                low_systolic,
                low_diastolic,
                high_systolic,
                high_diastolic,
            } => Some(SynthesizedValue::Pressure {
                systolic: rng.gen_range(low_systolic..=high_systolic),
                diastolic: rng.gen_range(low_diastolic..=high_diastolic),
            }),
            Self::Interval { low, high } => Some(SynthesizedValue::Measured(draw_rounded(
                rng, low, high,
            ))),
            Self::UpperBound { max } => {
                let low = max * UPPER_BOUND_LOW_FRACTION;
                let high = max * UPPER_BOUND_HIGH_FRACTION;
                Some(SynthesizedValue::Measured(draw_rounded(rng, low, high)))
            }
            Self::Unrecognized => None,
        }
    }
}

fn parse_blood_pressure(expr: &str) -> Option<RangeExpr> {
    let (low, high) = expr.split_once('-')?;
    let (low_systolic, low_diastolic) = parse_pair(low)?;
    let (high_systolic, high_diastolic) = parse_pair(high)?;
    Some(RangeExpr::BloodPressure {
        low_systolic,
        low_diastolic,
        high_systolic,
        high_diastolic,
    })
}

fn parse_pair(part: &str) -> Option<(i64, i64)> {
    let (a, b) = part.split_once('/')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

fn parse_interval(expr: &str) -> Option<RangeExpr> {
    let (low, high) = expr.split_once('-')?;
    Some(RangeExpr::Interval {
        low: parse_finite(low)?,
        high: parse_finite(high)?,
    })
}

fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// ─── Synthesis ────────────────────────────────────────────────────────────────

/// Synthesizes one value for a raw range expression.
pub fn synthesize<R: Rng + ?Sized>(expr: &str, rng: &mut R) -> SynthesizedValue {
    RangeExpr::parse(expr)
        .sample(rng)
        .unwrap_or_else(|| SynthesizedValue::Text(expr.to_string()))
}

fn draw_rounded<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    let value = rng.gen_range(low..=high);
    round_within(value, low, high)
}

/// Rounds to one decimal without leaving `[low, high]`. Falls back to the
/// unrounded value when no one-decimal number lies inside the interval.
fn round_within(value: f64, low: f64, high: f64) -> f64 {
    let inside = |v: f64| v >= low && v <= high;

    let nearest = (value * 10.0).round() / 10.0;
    if inside(nearest) {
        return nearest;
    }
    let inward = if nearest > high {
        (high * 10.0).floor() / 10.0
    } else {
        (low * 10.0).ceil() / 10.0
    };
    if inside(inward) {
        inward
    } else {
        value
    }
}

impl fmt::Display for SynthesizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `pad` keeps width/alignment flags working in the results table.
        match self {
            Self::Pressure {
                systolic,
                diastolic,
            } => f.pad(&format!("{systolic}/{diastolic}")),
            Self::Measured(v) => f.pad(&format!("{v:.1}")),
            Self::Text(s) => f.pad(s),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
