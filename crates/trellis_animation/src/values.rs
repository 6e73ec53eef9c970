//! Animatable value types
//!
//! An [`Animatable`] knows how to blend between two of itself, how to add
//! an offset (for `by` animations), and how to cross the [`Value`] boundary
//! of the property system.

use std::fmt::Debug;

use trellis_core::{Color, Point, Thickness, Value, ValueType};

/// A value that can be driven by an animation
pub trait Animatable: Clone + Debug + 'static {
    /// Property type this value animates
    const VALUE_TYPE: ValueType;

    /// Blend `from` toward `to` by `t`; `t` may leave `[0, 1]` for
    /// overshooting easings
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self;

    /// `self + offset`
    fn add(&self, offset: &Self) -> Self;

    fn to_value(&self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

// =============================================================================
// IMPLEMENTATIONS
// =============================================================================

impl Animatable for f64 {
    const VALUE_TYPE: ValueType = ValueType::Double;

    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        lerp(*from, *to, t)
    }

    fn add(&self, offset: &Self) -> Self {
        self + offset
    }

    fn to_value(&self) -> Value {
        Value::Double(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_double()
    }
}

impl Animatable for Color {
    const VALUE_TYPE: ValueType = ValueType::Color;

    /// Per-channel blend, clamped so overshooting easings stay in gamut
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        let t = t as f32;
        Color::rgba(
            from.r + (to.r - from.r) * t,
            from.g + (to.g - from.g) * t,
            from.b + (to.b - from.b) * t,
            from.a + (to.a - from.a) * t,
        )
        .clamped()
    }

    fn add(&self, offset: &Self) -> Self {
        Color::rgba(self.r + offset.r, self.g + offset.g, self.b + offset.b, self.a + offset.a).clamped()
    }

    fn to_value(&self) -> Value {
        Value::Color(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_color()
    }
}

impl Animatable for Point {
    const VALUE_TYPE: ValueType = ValueType::Point;

    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        Point::new(lerp(from.x, to.x, t), lerp(from.y, to.y, t))
    }

    fn add(&self, offset: &Self) -> Self {
        Point::new(self.x + offset.x, self.y + offset.y)
    }

    fn to_value(&self) -> Value {
        Value::Point(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Point(p) => Some(*p),
            _ => None,
        }
    }
}

impl Animatable for Thickness {
    const VALUE_TYPE: ValueType = ValueType::Thickness;

    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        Thickness::new(
            lerp(from.left, to.left, t),
            lerp(from.top, to.top, t),
            lerp(from.right, to.right, t),
            lerp(from.bottom, to.bottom, t),
        )
    }

    fn add(&self, offset: &Self) -> Self {
        Thickness::new(
            self.left + offset.left,
            self.top + offset.top,
            self.right + offset.right,
            self.bottom + offset.bottom,
        )
    }

    fn to_value(&self) -> Value {
        Value::Thickness(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Thickness(t) => Some(*t),
            _ => None,
        }
    }
}
