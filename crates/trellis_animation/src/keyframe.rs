//! Key frame animations
//!
//! A [`KeyFrameAnimation<T>`] walks a list of [`KeyFrame`]s. Each frame
//! carries a value, a [`KeyTime`] and a [`KeyFrameKind`] describing how the
//! segment *ending* at that frame is interpolated. Before the first frame
//! the animation blends from the value captured on the first active tick;
//! after the last frame it holds the last value.

use std::any::Any;

use trellis_core::{AnimationConfig, Color, ObjectId, Point, Property, Thickness, Value};

use crate::animation::{generated, live_target};
use crate::easing::{Easing, KeySpline};
use crate::timeline::{timing_builders, AnimationTarget, EvalContext, PropertyWrite, Timeline, TimelineCore, TimelineStatus};
use crate::timing::{ClockPhase, ClockSnapshot};
use crate::values::Animatable;

pub type DoubleKeyFrameAnimation = KeyFrameAnimation<f64>;
pub type ColorKeyFrameAnimation = KeyFrameAnimation<Color>;
pub type PointKeyFrameAnimation = KeyFrameAnimation<Point>;
pub type ThicknessKeyFrameAnimation = KeyFrameAnimation<Thickness>;

/// When a key frame is reached
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KeyTime {
    /// Fraction of the simple duration, `[0, 1]`
    Percent(f64),
    /// Milliseconds from the start of the simple duration
    TimeSpan(f64),
    /// Spread evenly between resolved neighbours
    Uniform,
    /// Treated as [`KeyTime::Uniform`]
    Paced,
}

/// Interpolation of the segment that ends at a frame
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum KeyFrameKind {
    #[default]
    Linear,
    /// Holds the previous value until the frame's time is reached
    Discrete,
    Easing(Easing),
    Spline(KeySpline),
}

#[derive(Clone, Debug)]
pub struct KeyFrame<T: Animatable> {
    pub value: T,
    pub key_time: KeyTime,
    pub kind: KeyFrameKind,
}

impl<T: Animatable> KeyFrame<T> {
    pub fn new(value: T, key_time: KeyTime, kind: KeyFrameKind) -> Self {
        Self { value, key_time, kind }
    }

    pub fn linear(value: T, key_time: KeyTime) -> Self {
        Self::new(value, key_time, KeyFrameKind::Linear)
    }

    pub fn discrete(value: T, key_time: KeyTime) -> Self {
        Self::new(value, key_time, KeyFrameKind::Discrete)
    }

    pub fn eased(value: T, key_time: KeyTime, easing: Easing) -> Self {
        Self::new(value, key_time, KeyFrameKind::Easing(easing))
    }

    pub fn spline(value: T, key_time: KeyTime, spline: KeySpline) -> Self {
        Self::new(value, key_time, KeyFrameKind::Spline(spline))
    }

    /// Value at `s` through the segment from `previous` to this frame
    fn sample(&self, previous: &T, s: f64) -> T {
        match self.kind {
            KeyFrameKind::Linear => T::interpolate(previous, &self.value, s),
            KeyFrameKind::Discrete => {
                if s >= 1.0 {
                    self.value.clone()
                } else {
                    previous.clone()
                }
            }
            KeyFrameKind::Easing(easing) => T::interpolate(previous, &self.value, easing.apply(s)),
            KeyFrameKind::Spline(spline) => T::interpolate(previous, &self.value, spline.evaluate(s)),
        }
    }
}

/// Resolve key times against `duration`; returns frame indices sorted by
/// resolved time, paired with that time
pub fn resolve_key_times(key_times: &[KeyTime], duration: f64) -> Vec<(usize, f64)> {
    let count = key_times.len();
    let mut times: Vec<Option<f64>> = key_times
        .iter()
        .map(|key_time| match *key_time {
            KeyTime::Percent(p) => Some(p.clamp(0.0, 1.0) * duration),
            KeyTime::TimeSpan(ms) => Some(ms.max(0.0)),
            KeyTime::Uniform | KeyTime::Paced => None,
        })
        .collect();

    let mut index = 0;
    while index < count {
        if times[index].is_some() {
            index += 1;
            continue;
        }
        let run_start = index;
        let mut run_end = index;
        while run_end + 1 < count && times[run_end + 1].is_none() {
            run_end += 1;
        }
        let left = if run_start == 0 {
            0.0
        } else {
            times[run_start - 1].unwrap_or(0.0)
        };
        let run_len = (run_end - run_start + 1) as f64;
        match times.get(run_end + 1).copied().flatten() {
            // Spread strictly between the two anchors
            Some(right) => {
                for (k, slot) in times[run_start..=run_end].iter_mut().enumerate() {
                    *slot = Some(left + (right - left) * (k as f64 + 1.0) / (run_len + 1.0));
                }
            }
            // Trailing run: the last frame lands on the duration
            None => {
                for (k, slot) in times[run_start..=run_end].iter_mut().enumerate() {
                    *slot = Some(left + (duration - left) * (k as f64 + 1.0) / run_len);
                }
            }
        }
        index = run_end + 1;
    }

    let mut resolved: Vec<(usize, f64)> = times
        .into_iter()
        .enumerate()
        .map(|(i, time)| (i, time.unwrap_or(duration)))
        .collect();
    resolved.sort_by(|a, b| a.1.total_cmp(&b.1));
    resolved
}

#[derive(Debug)]
pub struct KeyFrameAnimation<T: Animatable> {
    core: TimelineCore,
    frames: Vec<KeyFrame<T>>,
    target: Option<AnimationTarget>,
    captured_from: Option<T>,
    /// Frame order for the current run, with the duration it was resolved at
    resolved: Option<(f64, Vec<(usize, f64)>)>,
    warned: bool,
}

impl<T: Animatable> Default for KeyFrameAnimation<T> {
    fn default() -> Self {
        Self {
            core: TimelineCore::default(),
            frames: Vec::new(),
            target: None,
            captured_from: None,
            resolved: None,
            warned: false,
        }
    }
}

impl<T: Animatable> KeyFrameAnimation<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_frame(mut self, frame: KeyFrame<T>) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn key_frames(mut self, frames: impl IntoIterator<Item = KeyFrame<T>>) -> Self {
        self.frames.extend(frames);
        self
    }

    pub fn target(mut self, object: ObjectId, property: Property) -> Self {
        self.target = Some(AnimationTarget::new(object, property));
        self
    }

    timing_builders!();

    pub fn frames(&self) -> &[KeyFrame<T>] {
        &self.frames
    }

    /// Value at `time` into a simple duration of `duration`
    pub fn sample(&self, start: &T, time: f64, duration: f64) -> T {
        let order = resolve_key_times(&self.key_times(), duration);
        self.sample_in_order(&order, start, time)
    }

    fn key_times(&self) -> Vec<KeyTime> {
        self.frames.iter().map(|f| f.key_time).collect()
    }

    /// Resolve once per run; a changed duration resolves again
    fn ensure_resolved(&mut self, duration: f64) {
        if !matches!(&self.resolved, Some((at, _)) if *at == duration) {
            self.resolved = Some((duration, resolve_key_times(&self.key_times(), duration)));
        }
    }

    fn sample_in_order(&self, order: &[(usize, f64)], start: &T, time: f64) -> T {
        let mut previous_value = start;
        let mut previous_time = 0.0;
        for &(index, frame_time) in order {
            let frame = &self.frames[index];
            if time <= frame_time {
                let span = frame_time - previous_time;
                let s = if span > 0.0 { ((time - previous_time) / span).clamp(0.0, 1.0) } else { 1.0 };
                return frame.sample(previous_value, s);
            }
            previous_value = &frame.value;
            previous_time = frame_time;
        }
        previous_value.clone()
    }

    fn warn_once(&mut self, message: &str) {
        if !self.warned {
            self.warned = true;
            tracing::warn!("{}", message);
        }
    }
}

impl<T: Animatable> Timeline for KeyFrameAnimation<T> {
    fn core(&self) -> &TimelineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TimelineCore {
        &mut self.core
    }

    /// The largest time-span key time, or the configured default
    fn natural_duration(&self, config: &AnimationConfig) -> Option<f64> {
        let longest = self
            .frames
            .iter()
            .filter_map(|frame| match frame.key_time {
                KeyTime::TimeSpan(ms) => Some(ms),
                _ => None,
            })
            .fold(None, |acc: Option<f64>, ms| Some(acc.map_or(ms, |a| a.max(ms))));
        Some(longest.unwrap_or(config.automatic_duration_ms))
    }

    fn reset(&mut self) {
        self.core.restart();
        self.captured_from = None;
        self.resolved = None;
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
        if self.frames.is_empty() {
            return;
        }
        if self.captured_from.is_none() {
            self.captured_from = T::from_value(&ctx.tree.get(target.object, target.property));
        }
        let Some(start) = self.captured_from.clone() else {
            self.warn_once("current value of animated property is not animatable; skipping");
            return;
        };

        let natural = self.natural_duration(ctx.config);
        let duration = self.core.timing.simple_duration(natural).unwrap_or(0.0);
        self.ensure_resolved(duration);
        let value = match &self.resolved {
            Some((_, order)) => self.sample_in_order(order, &start, clock.simple_time),
            None => return,
        };
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
            frames: self.frames.clone(),
            target: self.target,
            captured_from: None,
            resolved: None,
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

    /// Replaces the value of the last frame
    fn set_to_value(&mut self, value: &Value) -> bool {
        match (T::from_value(value), self.frames.last_mut()) {
            (Some(to), Some(last)) => {
                last.value = to;
                true
            }
            _ => false,
        }
    }

    /// Moves toward the first frame's value
    fn generated_transition(&self, duration_ms: f64, easing: Easing, toward_base: bool) -> Option<Box<dyn Timeline>> {
        let to = if toward_base {
            None
        } else {
            Some(self.frames.first()?.value.clone())
        };
        Some(Box::new(generated::<T>(self.target, to, None, duration_ms, easing, toward_base)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
