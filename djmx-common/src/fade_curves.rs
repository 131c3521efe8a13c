//! Fade curves for crossfading
//!
//! A crossfade ramps the outgoing voice down with `fade_out` while the
//! incoming voice comes up with `fade_in`. Position is normalized to 0.0..=1.0
//! across the crossfade window and clamped.

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};
use std::str::FromStr;

/// Fade curve types
///
/// - Linear: constant rate of change
/// - SCurve: smooth acceleration and deceleration
/// - EqualPower: constant perceived loudness through the window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// v(t) = t
    #[default]
    Linear,

    /// v(t) = 0.5 × (1 - cos(π × t))
    SCurve,

    /// v(t) = sin(t × π/2)
    EqualPower,
}

impl FadeCurve {
    /// Gain for the incoming voice at `position` (0.0 = silent, 1.0 = full)
    pub fn calculate_fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Gain for the outgoing voice at `position` (1.0 at start, 0.0 at end)
    pub fn calculate_fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::SCurve => 0.5 * (1.0 + (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }

    /// (outgoing, incoming) gains at `position`
    pub fn crossfade_gains(&self, position: f32) -> (f32, f32) {
        (
            self.calculate_fade_out(position),
            self.calculate_fade_in(position),
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "linear",
            FadeCurve::SCurve => "s_curve",
            FadeCurve::EqualPower => "equal_power",
        }
    }
}

impl FromStr for FadeCurve {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(FadeCurve::Linear),
            "s_curve" | "scurve" | "cosine" => Ok(FadeCurve::SCurve),
            "equal_power" | "equalpower" => Ok(FadeCurve::EqualPower),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown fade curve: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 0.0001;

    #[test]
    fn test_linear_crossfade_endpoints() {
        let curve = FadeCurve::Linear;

        assert_eq!(curve.crossfade_gains(0.0), (1.0, 0.0));
        assert_eq!(curve.crossfade_gains(1.0), (0.0, 1.0));

        let (out, inc) = curve.crossfade_gains(0.25);
        assert!((out - 0.75).abs() < EPSILON);
        assert!((inc - 0.25).abs() < EPSILON);
    }

    #[test]
    fn test_position_is_clamped() {
        let curve = FadeCurve::Linear;
        assert_eq!(curve.calculate_fade_in(-1.0), 0.0);
        assert_eq!(curve.calculate_fade_in(2.5), 1.0);
        assert_eq!(curve.calculate_fade_out(2.5), 0.0);
    }

    #[test]
    fn test_scurve_midpoint() {
        let curve = FadeCurve::SCurve;
        assert!((curve.calculate_fade_in(0.5) - 0.5).abs() < EPSILON);
        assert!((curve.calculate_fade_out(0.5) - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_equal_power_constant_energy() {
        let curve = FadeCurve::EqualPower;
        for step in 0..=10 {
            let (out, inc) = curve.crossfade_gains(step as f32 / 10.0);
            let power = out * out + inc * inc;
            assert!((power - 1.0).abs() < 0.001, "power {} at step {}", power, step);
        }
    }

    #[test]
    fn test_parse_curve_names() {
        assert_eq!("linear".parse::<FadeCurve>().unwrap(), FadeCurve::Linear);
        assert_eq!("S_Curve".parse::<FadeCurve>().unwrap(), FadeCurve::SCurve);
        assert_eq!(
            "equal_power".parse::<FadeCurve>().unwrap(),
            FadeCurve::EqualPower
        );
        assert!("bouncy".parse::<FadeCurve>().is_err());
        assert_eq!(FadeCurve::default(), FadeCurve::Linear);
    }
}
