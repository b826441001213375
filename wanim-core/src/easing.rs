//! Easing functions for transitions
//!
//! Every easing is normalized on construction so that `f(0) = 0` and `f(1) = 1`.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

type EasingFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// Which end of a polynomial easing accelerates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccelerationMode {
    In,
    Out,
    #[default]
    InOut,
}

impl AccelerationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AccelerationMode::In => "in",
            AccelerationMode::Out => "out",
            AccelerationMode::InOut => "inout",
        }
    }
}

impl FromStr for AccelerationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "in" => Ok(AccelerationMode::In),
            "out" => Ok(AccelerationMode::Out),
            "inout" => Ok(AccelerationMode::InOut),
            _ => Err(Error::InvalidAccelerationMode(s.to_string())),
        }
    }
}

/// Describes how an easing was built, so it can be stored and rebuilt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EasingSpec {
    Linear,
    Polynomial { degree: f64, mode: AccelerationMode },
    /// An arbitrary function, rebuilt as linear
    Custom,
}

/// A normalized easing function over `[0, 1]`
#[derive(Clone)]
pub struct Easing {
    spec: EasingSpec,
    f: EasingFn,
}

impl Easing {
    pub fn linear() -> Self {
        Self {
            spec: EasingSpec::Linear,
            f: Arc::new(|t| t),
        }
    }

    /// Polynomial easing of the given degree
    pub fn polynomial(degree: f64, mode: AccelerationMode) -> Self {
        let f: EasingFn = match mode {
            AccelerationMode::In => Arc::new(move |t| pow(t, degree)),
            AccelerationMode::Out => {
                Arc::new(move |t| pow(-1.0, degree - 1.0) * pow(t - 1.0, degree) + 1.0)
            }
            AccelerationMode::InOut => Arc::new(move |t| {
                if t < 0.5 {
                    pow(2.0, degree - 1.0) * pow(t, degree)
                } else {
                    pow(-2.0, degree - 1.0) * pow(t - 1.0, degree) + 1.0
                }
            }),
        };
        Self {
            spec: EasingSpec::Polynomial { degree, mode },
            f: fix(f),
        }
    }

    /// Wraps an arbitrary function, normalizing its endpoints
    pub fn custom(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            spec: EasingSpec::Custom,
            f: fix(Arc::new(f)),
        }
    }

    pub fn from_spec(spec: EasingSpec) -> Self {
        match spec {
            EasingSpec::Polynomial { degree, mode } => Self::polynomial(degree, mode),
            EasingSpec::Linear | EasingSpec::Custom => Self::linear(),
        }
    }

    pub fn spec(&self) -> EasingSpec {
        self.spec
    }

    pub fn apply(&self, t: f64) -> f64 {
        (self.f)(t)
    }
}

impl Default for Easing {
    fn default() -> Self {
        Self::linear()
    }
}

impl fmt::Debug for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Easing").field("spec", &self.spec).finish()
    }
}

/// Shifts `f` to start at 0 and rescales it to end at 1. A function that still ends at
/// 0 after shifting gets a `t^4` term to break the degeneracy.
fn fix(f: EasingFn) -> EasingFn {
    let intercept = f(0.0);
    let shifted: EasingFn = if intercept.is_finite() {
        Arc::new(move |t| f(t) - intercept)
    } else {
        f
    };

    let end = shifted(1.0);
    if !end.is_finite() {
        shifted
    } else if end != 0.0 {
        Arc::new(move |t| shifted(t) / end)
    } else {
        Arc::new(move |t| shifted(t) + t.powi(4))
    }
}

fn pow(base: f64, exp: f64) -> f64 {
    if exp.fract() == 0.0 && exp.abs() <= i32::MAX as f64 {
        base.powi(exp as i32)
    } else {
        base.powf(exp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: [AccelerationMode; 3] = [
        AccelerationMode::In,
        AccelerationMode::Out,
        AccelerationMode::InOut,
    ];

    #[test]
    fn test_polynomial_endpoints() {
        for degree in 0..=7 {
            for mode in MODES {
                let easing = Easing::polynomial(degree as f64, mode);
                assert!(easing.apply(0.0).abs() < 1e-9, "{degree} {mode:?}");
                assert!((easing.apply(1.0) - 1.0).abs() < 1e-9, "{degree} {mode:?}");
            }
        }
    }

    #[test]
    fn test_polynomial_shapes() {
        let ease_in = Easing::polynomial(2.0, AccelerationMode::In);
        assert!((ease_in.apply(0.5) - 0.25).abs() < 1e-9);

        let ease_out = Easing::polynomial(2.0, AccelerationMode::Out);
        assert!((ease_out.apply(0.5) - 0.75).abs() < 1e-9);

        let ease_in_out = Easing::polynomial(3.0, AccelerationMode::InOut);
        assert!((ease_in_out.apply(0.5) - 0.5).abs() < 1e-9);
        assert!(ease_in_out.apply(0.25) < 0.25);
        assert!(ease_in_out.apply(0.75) > 0.75);
    }

    #[test]
    fn test_custom_is_normalized() {
        let shifted = Easing::custom(|t| 2.0 * t + 3.0);
        assert!(shifted.apply(0.0).abs() < 1e-9);
        assert!((shifted.apply(1.0) - 1.0).abs() < 1e-9);
        assert!((shifted.apply(0.5) - 0.5).abs() < 1e-9);

        let degenerate = Easing::custom(|t| t * (1.0 - t));
        assert!(degenerate.apply(0.0).abs() < 1e-9);
        assert!((degenerate.apply(1.0) - 1.0).abs() < 1e-9);
        assert_eq!(degenerate.spec(), EasingSpec::Custom);
    }

    #[test]
    fn test_acceleration_mode_names() {
        assert_eq!("inout".parse::<AccelerationMode>().unwrap(), AccelerationMode::InOut);
        assert!(matches!(
            "sideways".parse::<AccelerationMode>(),
            Err(Error::InvalidAccelerationMode(_))
        ));
    }

    #[test]
    fn test_rebuild_from_spec() {
        let spec = EasingSpec::Polynomial {
            degree: 2.0,
            mode: AccelerationMode::In,
        };
        let easing = Easing::from_spec(spec);
        assert_eq!(easing.spec(), spec);
        assert!((easing.apply(0.5) - 0.25).abs() < 1e-9);
    }
}
