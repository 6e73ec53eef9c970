//! Easing functions
//!
//! Every curve is defined once as an ease-in core `f(t)` over `[0, 1]`; the
//! [`EasingMode`] folds it into the other two shapes:
//!
//! - `In`: `f(t)`
//! - `Out`: `1 - f(1 - t)`
//! - `InOut`: `f(2t) / 2` for the first half, `1 - f(2 - 2t) / 2` for the second
//!
//! [`KeySpline`] is a cubic Bézier from `(0, 0)` to `(1, 1)` with two control
//! points, as used by spline key frames.

use std::f64::consts::{FRAC_PI_2, PI};

/// How an ease-in core is applied
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EasingMode {
    In,
    #[default]
    Out,
    InOut,
}

/// Ease-in curves
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EasingFunction {
    Quadratic,
    Cubic,
    Quartic,
    Quintic,
    /// `t^power`
    Power(f64),
    Sine,
    Circle,
    Exponential { exponent: f64 },
    /// Pulls back before moving; `amplitude >= 0`
    Back { amplitude: f64 },
    Bounce { bounces: u32, bounciness: f64 },
    Elastic { oscillations: u32, springiness: f64 },
}

impl EasingFunction {
    pub const BACK: EasingFunction = EasingFunction::Back { amplitude: 1.0 };
    pub const BOUNCE: EasingFunction = EasingFunction::Bounce {
        bounces: 3,
        bounciness: 2.0,
    };
    pub const ELASTIC: EasingFunction = EasingFunction::Elastic {
        oscillations: 3,
        springiness: 3.0,
    };
    pub const EXPONENTIAL: EasingFunction = EasingFunction::Exponential { exponent: 2.0 };

    /// The ease-in curve at `t`
    pub fn ease_in_core(&self, t: f64) -> f64 {
        match *self {
            EasingFunction::Quadratic => t * t,
            EasingFunction::Cubic => t * t * t,
            EasingFunction::Quartic => t.powi(4),
            EasingFunction::Quintic => t.powi(5),
            EasingFunction::Power(power) => t.powf(power.max(0.0)),
            EasingFunction::Sine => 1.0 - (FRAC_PI_2 * (1.0 - t)).sin(),
            EasingFunction::Circle => {
                let t = t.clamp(0.0, 1.0);
                1.0 - (1.0 - t * t).sqrt()
            }
            EasingFunction::Exponential { exponent } => {
                if exponent.abs() < 1e-10 {
                    t
                } else {
                    ((exponent * t).exp() - 1.0) / (exponent.exp() - 1.0)
                }
            }
            EasingFunction::Back { amplitude } => {
                let amplitude = amplitude.max(0.0);
                t.powi(3) - t * amplitude * (PI * t).sin()
            }
            EasingFunction::Bounce { bounces, bounciness } => bounce_core(t, bounces, bounciness),
            EasingFunction::Elastic {
                oscillations,
                springiness,
            } => {
                let springiness = springiness.max(0.0);
                let expo = if springiness.abs() < 1e-10 {
                    t
                } else {
                    ((springiness * t).exp() - 1.0) / (springiness.exp() - 1.0)
                };
                expo * ((2.0 * PI * oscillations as f64 + FRAC_PI_2) * t).sin()
            }
        }
    }

    pub fn apply(&self, mode: EasingMode, t: f64) -> f64 {
        match mode {
            EasingMode::In => self.ease_in_core(t),
            EasingMode::Out => 1.0 - self.ease_in_core(1.0 - t),
            EasingMode::InOut => {
                if t < 0.5 {
                    self.ease_in_core(t * 2.0) * 0.5
                } else {
                    (1.0 - self.ease_in_core((1.0 - t) * 2.0)) * 0.5 + 0.5
                }
            }
        }
    }
}

/// Series of decaying parabolic bounces ending at `t = 1`
fn bounce_core(t: f64, bounces: u32, bounciness: f64) -> f64 {
    let bounces = bounces as f64;
    let mut bounciness = bounciness;
    if bounciness <= 1.0 {
        bounciness = 1.001;
    }

    let pow = bounciness.powf(bounces);
    let one_minus_bounciness = 1.0 - bounciness;

    // Unit = time of the final (smallest) half bounce
    let sum_of_units = (1.0 - pow) / one_minus_bounciness + pow * 0.5;
    let unit_at_t = t * sum_of_units;

    let bounce_at_t = (-unit_at_t * (1.0 - bounciness) + 1.0).ln() / bounciness.ln();
    let start = bounce_at_t.floor();
    let end = start + 1.0;

    let start_time = (1.0 - bounciness.powf(start)) / (one_minus_bounciness * sum_of_units);
    let end_time = (1.0 - bounciness.powf(end)) / (one_minus_bounciness * sum_of_units);

    let mid_time = (start_time + end_time) * 0.5;
    let time_relative_to_peak = t - mid_time;
    let radius = mid_time - start_time;
    let amplitude = (1.0 / bounciness).powf(bounces - start);

    (-amplitude / (radius * radius)) * (time_relative_to_peak - radius) * (time_relative_to_peak + radius)
}

// =============================================================================
// KEY SPLINE
// =============================================================================

/// Cubic Bézier timing curve through `(0,0)`, `c1`, `c2`, `(1,1)`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeySpline {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Default for KeySpline {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}

impl KeySpline {
    /// Control point x coordinates are clamped into `[0, 1]` so the curve is
    /// a function of time
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.clamp(0.0, 1.0),
            y1,
            x2: x2.clamp(0.0, 1.0),
            y2,
        }
    }

    fn bezier(p1: f64, p2: f64, s: f64) -> f64 {
        let inv = 1.0 - s;
        3.0 * inv * inv * s * p1 + 3.0 * inv * s * s * p2 + s * s * s
    }

    fn bezier_slope(p1: f64, p2: f64, s: f64) -> f64 {
        let inv = 1.0 - s;
        3.0 * inv * inv * p1 + 6.0 * inv * s * (p2 - p1) + 3.0 * s * s * (1.0 - p2)
    }

    /// Curve parameter whose x equals `x`
    fn solve_parameter(&self, x: f64) -> f64 {
        let mut s = x;
        for _ in 0..8 {
            let error = Self::bezier(self.x1, self.x2, s) - x;
            if error.abs() < 1e-7 {
                return s;
            }
            let slope = Self::bezier_slope(self.x1, self.x2, s);
            if slope.abs() < 1e-6 {
                break;
            }
            s -= error / slope;
        }

        // Newton stalled; bisect
        let (mut lo, mut hi) = (0.0, 1.0);
        s = x;
        for _ in 0..50 {
            let value = Self::bezier(self.x1, self.x2, s);
            if (value - x).abs() < 1e-7 {
                break;
            }
            if value < x {
                lo = s;
            } else {
                hi = s;
            }
            s = (lo + hi) * 0.5;
        }
        s
    }

    /// Progress at time fraction `t`
    pub fn evaluate(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        let s = self.solve_parameter(t);
        Self::bezier(self.y1, self.y2, s)
    }
}

// =============================================================================
// EASING
// =============================================================================

/// Maps linear progress to eased progress
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Easing {
    #[default]
    Linear,
    Ease(EasingFunction, EasingMode),
    Spline(KeySpline),
}

impl Easing {
    pub fn ease_in(function: EasingFunction) -> Self {
        Easing::Ease(function, EasingMode::In)
    }

    pub fn ease_out(function: EasingFunction) -> Self {
        Easing::Ease(function, EasingMode::Out)
    }

    pub fn ease_in_out(function: EasingFunction) -> Self {
        Easing::Ease(function, EasingMode::InOut)
    }

    /// Eased progress; `t` is clamped to `[0, 1]`. Back and Elastic may
    /// overshoot the unit range.
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::Ease(function, mode) => function.apply(*mode, t),
            Easing::Spline(spline) => spline.evaluate(t),
        }
    }
}
