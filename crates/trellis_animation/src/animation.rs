//! From/To/By animations
//!
//! [`Animation<T>`] blends a single property from a start value to a
//! destination:
//!
//! - start: `from`, or the property's current value captured on the first
//!   active tick
//! - destination: `to`; else `start + by`; else the property's base value
//!   (the effective value ignoring animations)

use std::any::Any;

use trellis_core::{AnimationConfig, Color, ElementTree, ObjectId, Point, Property, Thickness, Value};

use crate::easing::Easing;
use crate::timeline::{timing_builders, AnimationTarget, EvalContext, PropertyWrite, Timeline, TimelineCore, TimelineStatus};
use crate::timing::{ClockPhase, ClockSnapshot, Duration, FillBehavior, RepeatBehavior, Timing};
use crate::values::Animatable;

pub type DoubleAnimation = Animation<f64>;
pub type ColorAnimation = Animation<Color>;
pub type PointAnimation = Animation<Point>;
pub type ThicknessAnimation = Animation<Thickness>;

#[derive(Debug)]
pub struct Animation<T: Animatable> {
    core: TimelineCore,
    from: Option<T>,
    to: Option<T>,
    by: Option<T>,
    easing: Easing,
    target: Option<AnimationTarget>,
    captured_from: Option<T>,
    warned: bool,
}

impl<T: Animatable> Default for Animation<T> {
    fn default() -> Self {
        Self {
            core: TimelineCore::default(),
            from: None,
            to: None,
            by: None,
            easing: Easing::Linear,
            target: None,
            captured_from: None,
            warned: false,
        }
    }
}

impl<T: Animatable> Animation<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, value: T) -> Self {
        self.from = Some(value);
        self
    }

    pub fn to(mut self, value: T) -> Self {
        self.to = Some(value);
        self
    }

    pub fn by(mut self, offset: T) -> Self {
        self.by = Some(offset);
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn target(mut self, object: ObjectId, property: Property) -> Self {
        self.target = Some(AnimationTarget::new(object, property));
        self
    }

    timing_builders!();

    pub fn from_value(&self) -> Option<&T> {
        self.from.as_ref()
    }

    pub fn to_value(&self) -> Option<&T> {
        self.to.as_ref()
    }

    pub fn by_value(&self) -> Option<&T> {
        self.by.as_ref()
    }

    pub fn easing_function(&self) -> Easing {
        self.easing
    }

    /// Start value in effect for the current run
    pub fn start_value(&self) -> Option<&T> {
        self.from.as_ref().or(self.captured_from.as_ref())
    }

    fn warn_once(&mut self, message: &str) {
        if !self.warned {
            self.warned = true;
            tracing::warn!("{}", message);
        }
    }

    fn resolve_start(&mut self, tree: &ElementTree, target: AnimationTarget) -> Option<T> {
        if let Some(from) = &self.from {
            return Some(from.clone());
        }
        if self.captured_from.is_none() {
            self.captured_from = T::from_value(&tree.get(target.object, target.property));
        }
        self.captured_from.clone()
    }

    fn resolve_destination(&self, tree: &ElementTree, target: AnimationTarget, start: &T) -> T {
        if let Some(to) = &self.to {
            return to.clone();
        }
        if let Some(by) = &self.by {
            return start.add(by);
        }
        T::from_value(&tree.base_value(target.object, target.property)).unwrap_or_else(|| start.clone())
    }
}

/// Checks shared by every single-property animation; returns the live,
/// correctly typed target or why there is none
pub(crate) fn live_target<T: Animatable>(
    target: Option<AnimationTarget>,
    core: &mut TimelineCore,
    tree: &ElementTree,
) -> Result<AnimationTarget, &'static str> {
    let target = target.ok_or("animation has no target; skipping")?;
    if !tree.contains(target.object) {
        tracing::debug!("target of {} was removed; stopping", target.property.qualified_name());
        core.status = TimelineStatus::Idle;
        return Err("animation target removed");
    }
    if target.property.value_type() != T::VALUE_TYPE {
        return Err("animation value type does not match its target property; skipping");
    }
    Ok(target)
}

impl<T: Animatable> Timeline for Animation<T> {
    fn core(&self) -> &TimelineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TimelineCore {
        &mut self.core
    }

    fn natural_duration(&self, config: &AnimationConfig) -> Option<f64> {
        Some(config.automatic_duration_ms)
    }

    fn reset(&mut self) {
        self.core.restart();
        self.captured_from = None;
        self.warned = false;
    }

    fn apply(&mut self, ctx: &mut EvalContext<'_>, clock: &ClockSnapshot) {
        if clock.phase == ClockPhase::Before {
            return;
        }
        let target = match live_target::<T>(self.target, &mut self.core, ctx.tree) {
            Ok(target) => target,
            Err(reason) => {
                if self.core.status == TimelineStatus::Active {
                    self.warn_once(reason);
                }
                return;
            }
        };
        let Some(start) = self.resolve_start(ctx.tree, target) else {
            self.warn_once("current value of animated property is not animatable; skipping");
            return;
        };
        let destination = self.resolve_destination(ctx.tree, target, &start);
        let value = T::interpolate(&start, &destination, self.easing.apply(clock.progress));
        ctx.set(target, value.to_value());
    }

    fn release(&self, out: &mut Vec<PropertyWrite>) {
        if let Some(target) = self.target {
            out.push(PropertyWrite::Clear(target));
        }
    }

    fn clone_timeline(&self) -> Box<dyn Timeline> {
        Box::new(Self {
            core: self.core.duplicate(),
            from: self.from.clone(),
            to: self.to.clone(),
            by: self.by.clone(),
            easing: self.easing,
            target: self.target,
            captured_from: None,
            warned: false,
        })
    }

    fn animation_target(&self) -> Option<AnimationTarget> {
        self.target
    }

    fn set_target(&mut self, target: AnimationTarget) -> bool {
        if target.property.value_type() != T::VALUE_TYPE {
            return false;
        }
        self.target = Some(target);
        true
    }

    fn set_to_value(&mut self, value: &Value) -> bool {
        match T::from_value(value) {
            Some(to) => {
                self.to = Some(to);
                self.by = None;
                true
            }
            None => false,
        }
    }

    fn generated_transition(&self, duration_ms: f64, easing: Easing, toward_base: bool) -> Option<Box<dyn Timeline>> {
        let (to, by) = if toward_base {
            (None, None)
        } else {
            (self.from.clone().or_else(|| self.to.clone()), self.by.clone())
        };
        Some(Box::new(generated::<T>(self.target, to, by, duration_ms, easing, toward_base)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A single-pass animation used for visual state transitions
pub(crate) fn generated<T: Animatable>(
    target: Option<AnimationTarget>,
    to: Option<T>,
    by: Option<T>,
    duration_ms: f64,
    easing: Easing,
    toward_base: bool,
) -> Animation<T> {
    let timing = Timing {
        duration: Duration::Time(duration_ms.max(0.0)),
        repeat: RepeatBehavior::Count(1),
        fill: if toward_base { FillBehavior::Stop } else { FillBehavior::HoldEnd },
        ..Timing::default()
    };
    Animation {
        core: TimelineCore::new(timing),
        to: if by.is_some() { None } else { to },
        by,
        easing,
        target,
        ..Animation::default()
    }
}
