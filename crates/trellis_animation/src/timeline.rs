//! The timeline abstraction
//!
//! Every animation and storyboard implements [`Timeline`]. A timeline owns a
//! [`TimelineCore`] (timing plus run state) and knows how to turn a
//! [`ClockSnapshot`] into property writes. Writes are collected in an
//! [`EvalContext`] and applied by the caller once the timeline is no longer
//! borrowed, so a property-changed callback can safely begin or stop other
//! timelines.

use std::any::Any;
use std::rc::Rc;

use trellis_core::{AnimationConfig, ElementTree, ObjectId, Property, Value};

use crate::easing::Easing;
use crate::timing::{ClockSnapshot, FillBehavior, Timing};

/// Callback raised once per run when a timeline completes
pub type CompletedHandler = Rc<dyn Fn()>;

/// The `(object, property)` slot an animation drives
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationTarget {
    pub object: ObjectId,
    pub property: Property,
}

impl AnimationTarget {
    pub fn new(object: ObjectId, property: Property) -> Self {
        Self { object, property }
    }
}

/// A deferred write into the Animated channel
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyWrite {
    Set(AnimationTarget, Value),
    Clear(AnimationTarget),
}

impl PropertyWrite {
    pub fn target(&self) -> AnimationTarget {
        match self {
            PropertyWrite::Set(target, _) | PropertyWrite::Clear(target) => *target,
        }
    }
}

/// Apply collected writes; rejected writes are logged and skipped
pub fn apply_writes(tree: &mut ElementTree, writes: Vec<PropertyWrite>) {
    for write in writes {
        match write {
            PropertyWrite::Set(target, value) => {
                if let Err(err) = tree.set_animated(target.object, target.property, value) {
                    tracing::debug!("skipping animated write to {}: {}", target.property.qualified_name(), err);
                }
            }
            PropertyWrite::Clear(target) => tree.clear_animated(target.object, target.property),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimelineStatus {
    /// Never begun, or stopped
    #[default]
    Idle,
    Active,
    Completed,
}

/// Timing plus per-run state shared by every timeline
#[derive(Clone, Default)]
pub struct TimelineCore {
    pub timing: Timing,
    pub(crate) status: TimelineStatus,
    pub(crate) paused: bool,
    /// Time since Begin in parent units; negative while a begin delay runs
    pub(crate) elapsed: f64,
    /// Last parent time a storyboard drove this child with
    pub(crate) last_parent_time: f64,
    pub(crate) completed_raised: bool,
    pub(crate) last_snapshot: Option<ClockSnapshot>,
    pub(crate) completed: Vec<CompletedHandler>,
    pub(crate) registration: Option<crate::scheduler::ClockId>,
}

impl std::fmt::Debug for TimelineCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineCore")
            .field("timing", &self.timing)
            .field("status", &self.status)
            .field("paused", &self.paused)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

impl TimelineCore {
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            ..Self::default()
        }
    }

    pub fn status(&self) -> TimelineStatus {
        self.status
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn fill(&self) -> FillBehavior {
        self.timing.fill
    }

    pub fn snapshot(&self) -> Option<ClockSnapshot> {
        self.last_snapshot
    }

    /// Same timing, fresh run state and no handlers
    pub fn duplicate(&self) -> Self {
        Self::new(self.timing)
    }

    /// Ready for a new run
    pub(crate) fn restart(&mut self) {
        self.status = TimelineStatus::Active;
        self.paused = false;
        self.elapsed = 0.0;
        self.last_parent_time = 0.0;
        self.completed_raised = false;
        self.last_snapshot = None;
    }

    /// Parent time jumped backwards (a repeat or auto-reverse of the parent)
    pub(crate) fn rewind(&mut self) {
        if self.status == TimelineStatus::Completed {
            self.status = TimelineStatus::Active;
            self.completed_raised = false;
        }
    }
}

/// Evaluation scratch space for one tick
pub struct EvalContext<'a> {
    pub tree: &'a ElementTree,
    pub config: &'a AnimationConfig,
    pub(crate) writes: Vec<PropertyWrite>,
    pub(crate) completed: Vec<CompletedHandler>,
}

impl<'a> EvalContext<'a> {
    pub fn new(tree: &'a ElementTree, config: &'a AnimationConfig) -> Self {
        Self {
            tree,
            config,
            writes: Vec::new(),
            completed: Vec::new(),
        }
    }

    pub fn set(&mut self, target: AnimationTarget, value: Value) {
        self.writes.push(PropertyWrite::Set(target, value));
    }

    pub fn clear(&mut self, target: AnimationTarget) {
        self.writes.push(PropertyWrite::Clear(target));
    }

    pub fn writes(&self) -> &[PropertyWrite] {
        &self.writes
    }

    pub fn into_parts(self) -> (Vec<PropertyWrite>, Vec<CompletedHandler>) {
        (self.writes, self.completed)
    }
}

// =============================================================================
// TIMELINE TRAIT
// =============================================================================

pub trait Timeline: Any {
    fn core(&self) -> &TimelineCore;

    fn core_mut(&mut self) -> &mut TimelineCore;

    /// Duration used when timing says `Automatic`; `None` is unbounded
    fn natural_duration(&self, config: &AnimationConfig) -> Option<f64>;

    /// Clear per-run state ahead of Begin
    fn reset(&mut self) {
        self.core_mut().restart();
    }

    /// Produce writes for `clock`
    fn apply(&mut self, ctx: &mut EvalContext<'_>, clock: &ClockSnapshot);

    /// Writes that give every held value back to the underlying sources
    fn release(&self, out: &mut Vec<PropertyWrite>);

    /// Writes issued when the timeline is stopped
    fn release_on_stop(&self, out: &mut Vec<PropertyWrite>) {
        if self.core().fill() == FillBehavior::Stop {
            self.release(out);
        }
    }

    /// Independent copy with fresh run state
    fn clone_timeline(&self) -> Box<dyn Timeline>;

    fn animation_target(&self) -> Option<AnimationTarget> {
        None
    }

    /// Point the timeline at a slot; false when the property type does not fit
    fn set_target(&mut self, _target: AnimationTarget) -> bool {
        false
    }

    /// Replace the destination value; false when the value does not fit
    fn set_to_value(&mut self, _value: &Value) -> bool {
        false
    }

    /// An animation that moves this timeline's target to where this timeline
    /// starts (or to the base value when `toward_base`) over `duration_ms`
    fn generated_transition(&self, _duration_ms: f64, _easing: Easing, _toward_base: bool) -> Option<Box<dyn Timeline>> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Builder methods over a `core: TimelineCore` field
macro_rules! timing_builders {
    () => {
        pub fn duration_ms(mut self, ms: f64) -> Self {
            self.core.timing.duration = $crate::timing::Duration::Time(ms);
            self
        }

        pub fn duration(mut self, duration: $crate::timing::Duration) -> Self {
            self.core.timing.duration = duration;
            self
        }

        pub fn begin_offset(mut self, ms: f64) -> Self {
            self.core.timing.begin_offset = ms;
            self
        }

        pub fn speed_ratio(mut self, ratio: f64) -> Self {
            if ratio > 0.0 && ratio.is_finite() {
                self.core.timing.speed_ratio = ratio;
            } else {
                tracing::warn!("ignoring speed ratio {}; must be positive", ratio);
            }
            self
        }

        pub fn auto_reverse(mut self, auto_reverse: bool) -> Self {
            self.core.timing.auto_reverse = auto_reverse;
            self
        }

        pub fn repeat(mut self, repeat: $crate::timing::RepeatBehavior) -> Self {
            self.core.timing.repeat = repeat;
            self
        }

        pub fn fill(mut self, fill: $crate::timing::FillBehavior) -> Self {
            self.core.timing.fill = fill;
            self
        }

        pub fn timing(mut self, timing: $crate::timing::Timing) -> Self {
            self.core.timing = timing;
            self
        }
    };
}

pub(crate) use timing_builders;

/// Resolve and apply one timeline at `parent_time`, then settle completion
///
/// Returns the snapshot that was applied.
pub(crate) fn drive(timeline: &mut dyn Timeline, ctx: &mut EvalContext<'_>, parent_time: f64) -> ClockSnapshot {
    let natural = timeline.natural_duration(ctx.config);
    let snapshot = timeline.core().timing.resolve(parent_time, natural);
    timeline.core_mut().last_snapshot = Some(snapshot);
    timeline.apply(ctx, &snapshot);

    // apply() may have stopped the timeline (target removed)
    if snapshot.phase == crate::timing::ClockPhase::Completed && timeline.core().status == TimelineStatus::Active {
        timeline.core_mut().status = TimelineStatus::Completed;
        if timeline.core().fill() == FillBehavior::Stop {
            timeline.release(&mut ctx.writes);
        }
        if !timeline.core().completed_raised {
            timeline.core_mut().completed_raised = true;
            ctx.completed.extend(timeline.core().completed.iter().cloned());
        }
    }
    snapshot
}
