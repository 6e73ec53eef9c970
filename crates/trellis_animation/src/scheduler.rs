//! Animation manager and timeline handles
//!
//! The [`AnimationManager`] ticks every begun root timeline once per frame.
//! It holds weak references only: dropping the last [`TimelineHandle`] to a
//! timeline silently removes it at the next update.
//!
//! Each update:
//!
//! 1. clamps the frame delta to `max_frame_delta_ms`
//! 2. advances every active, unpaused root by the delta and evaluates it
//! 3. applies that timeline's writes to the tree before moving on
//! 4. drops completed or stopped timelines from the active set
//! 5. raises Completed handlers after every timeline has been evaluated

use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use trellis_core::{AnimationConfig, ElementTree};

use crate::timeline::{apply_writes, drive, CompletedHandler, EvalContext, Timeline, TimelineStatus};
use crate::timing::FillBehavior;

new_key_type! {
    /// Registration of a root timeline with a manager
    pub struct ClockId;
}

type SharedTimeline = Rc<RefCell<dyn Timeline>>;

/// Drives root timelines from frame deltas
pub struct AnimationManager {
    clocks: SlotMap<ClockId, Weak<RefCell<dyn Timeline>>>,
    config: AnimationConfig,
    frames: u64,
}

impl Default for AnimationManager {
    fn default() -> Self {
        Self::new()
    }
}

struct TickOutcome {
    handlers: Vec<CompletedHandler>,
    finished: bool,
}

impl AnimationManager {
    pub fn new() -> Self {
        Self::with_config(AnimationConfig::default())
    }

    pub fn with_config(config: AnimationConfig) -> Self {
        Self {
            clocks: SlotMap::with_key(),
            config,
            frames: 0,
        }
    }

    /// Uses the tree's `[animation]` settings
    pub fn for_tree(tree: &ElementTree) -> Self {
        Self::with_config(tree.config().animation.clone())
    }

    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    /// Number of registered timelines still alive
    pub fn active_count(&self) -> usize {
        self.clocks.values().filter(|weak| weak.strong_count() > 0).count()
    }

    /// Frames processed so far
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn is_registered(&self, id: ClockId) -> bool {
        self.clocks.contains_key(id)
    }

    pub(crate) fn register(&mut self, timeline: &SharedTimeline) -> ClockId {
        self.clocks.insert(Rc::downgrade(timeline))
    }

    pub(crate) fn unregister(&mut self, id: ClockId) -> bool {
        self.clocks.remove(id).is_some()
    }

    /// Forget every registration without touching animated values
    pub fn clear(&mut self) {
        for weak in self.clocks.values() {
            if let Some(timeline) = weak.upgrade() {
                if let Ok(mut timeline) = timeline.try_borrow_mut() {
                    timeline.core_mut().registration = None;
                }
            }
        }
        self.clocks.clear();
    }

    /// Advance every active root timeline by `delta_ms`
    ///
    /// Negative or non-finite deltas are ignored; a zero delta is a no-op.
    pub fn update(&mut self, tree: &mut ElementTree, delta_ms: f64) {
        if !delta_ms.is_finite() || delta_ms < 0.0 {
            tracing::warn!("ignoring invalid frame delta {}", delta_ms);
            return;
        }
        if delta_ms == 0.0 {
            return;
        }
        let delta = if delta_ms > self.config.max_frame_delta_ms {
            tracing::trace!("clamping frame delta {}ms to {}ms", delta_ms, self.config.max_frame_delta_ms);
            self.config.max_frame_delta_ms
        } else {
            delta_ms
        };
        self.frames += 1;

        let entries: SmallVec<[(ClockId, Weak<RefCell<dyn Timeline>>); 8]> =
            self.clocks.iter().map(|(id, weak)| (id, weak.clone())).collect();

        let mut handlers = Vec::new();
        for (id, weak) in entries {
            let Some(timeline) = weak.upgrade() else {
                tracing::trace!("dropping released timeline {:?}", id);
                self.clocks.remove(id);
                continue;
            };
            let outcome = self.tick(&timeline, tree, delta, false);
            if outcome.finished {
                self.clocks.remove(id);
            }
            handlers.extend(outcome.handlers);
        }

        for handler in handlers {
            handler();
        }
    }

    /// Advance one timeline and apply its writes
    fn tick(&self, timeline: &SharedTimeline, tree: &mut ElementTree, delta: f64, force: bool) -> TickOutcome {
        let (writes, handlers, finished) = {
            let Ok(mut timeline) = timeline.try_borrow_mut() else {
                tracing::debug!("timeline is busy; skipping this frame");
                return TickOutcome {
                    handlers: Vec::new(),
                    finished: false,
                };
            };
            let core = timeline.core_mut();
            if core.status != TimelineStatus::Active {
                core.registration = None;
                return TickOutcome {
                    handlers: Vec::new(),
                    finished: true,
                };
            }
            if core.paused && !force {
                return TickOutcome {
                    handlers: Vec::new(),
                    finished: false,
                };
            }
            core.elapsed += delta;
            let elapsed = core.elapsed;

            let mut ctx = EvalContext::new(tree, &self.config);
            drive(&mut *timeline, &mut ctx, elapsed);
            let finished = timeline.core().status != TimelineStatus::Active;
            if finished {
                timeline.core_mut().registration = None;
            }
            let (writes, handlers) = ctx.into_parts();
            (writes, handlers, finished)
        };
        apply_writes(tree, writes);
        TickOutcome { handlers, finished }
    }
}

// =============================================================================
// HANDLES
// =============================================================================

/// Shared handle to a timeline; the manager only holds it weakly
pub struct TimelineHandle<T: Timeline> {
    inner: Rc<RefCell<T>>,
}

impl<T: Timeline> Clone for TimelineHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Timeline> TimelineHandle<T> {
    pub fn new(timeline: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(timeline)),
        }
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.inner.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.inner.borrow_mut()
    }

    fn shared(&self) -> SharedTimeline {
        self.inner.clone()
    }

    /// Same underlying timeline
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Start from the beginning; writes begin on the next update
    pub fn begin(&self, manager: &mut AnimationManager) {
        self.begin_after(manager, 0.0);
    }

    /// Start after `delay_ms` of frame time
    pub fn begin_after(&self, manager: &mut AnimationManager, delay_ms: f64) {
        let registered = {
            let mut timeline = self.inner.borrow_mut();
            timeline.reset();
            timeline.core_mut().elapsed = -delay_ms.max(0.0);
            timeline
                .core()
                .registration
                .is_some_and(|id| manager.is_registered(id))
        };
        if !registered {
            let id = manager.register(&self.shared());
            self.inner.borrow_mut().core_mut().registration = Some(id);
        }
        tracing::trace!("timeline begun (delay {}ms)", delay_ms);
    }

    /// Stop and deregister; values are released only when the timeline fills
    /// with [`FillBehavior::Stop`]
    pub fn stop(&self, manager: &mut AnimationManager, tree: &mut ElementTree) {
        let mut writes = Vec::new();
        {
            let mut timeline = self.inner.borrow_mut();
            timeline.release_on_stop(&mut writes);
            let core = timeline.core_mut();
            core.status = TimelineStatus::Idle;
            core.paused = false;
            if let Some(id) = core.registration.take() {
                manager.unregister(id);
            }
        }
        apply_writes(tree, writes);
    }

    pub fn pause(&self) {
        let mut timeline = self.inner.borrow_mut();
        if timeline.core().status == TimelineStatus::Active {
            timeline.core_mut().paused = true;
        }
    }

    pub fn resume(&self) {
        self.inner.borrow_mut().core_mut().paused = false;
    }

    /// Jump to `offset_ms` after Begin and evaluate immediately
    ///
    /// Returns false when the timeline has not been begun.
    pub fn seek(&self, manager: &mut AnimationManager, tree: &mut ElementTree, offset_ms: f64) -> bool {
        let registration = {
            let mut timeline = self.inner.borrow_mut();
            let core = timeline.core_mut();
            if core.status == TimelineStatus::Idle {
                return false;
            }
            core.status = TimelineStatus::Active;
            core.elapsed = offset_ms;
            core.registration.filter(|id| manager.is_registered(*id))
        };
        let shared = self.shared();
        let outcome = manager.tick(&shared, tree, 0.0, true);
        match (outcome.finished, registration) {
            (true, Some(id)) => {
                manager.unregister(id);
            }
            (false, None) => {
                let id = manager.register(&shared);
                self.inner.borrow_mut().core_mut().registration = Some(id);
            }
            _ => {}
        }
        for handler in outcome.handlers {
            handler();
        }
        true
    }

    /// Raised once per run when the active period ends
    pub fn on_completed<F>(&self, handler: F)
    where
        F: Fn() + 'static,
    {
        self.inner.borrow_mut().core_mut().completed.push(Rc::new(handler));
    }

    pub fn set_fill(&self, fill: FillBehavior) {
        self.inner.borrow_mut().core_mut().timing.fill = fill;
    }

    pub fn status(&self) -> TimelineStatus {
        self.inner.borrow().core().status()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.borrow().core().is_paused()
    }

    pub fn current_time(&self) -> f64 {
        self.inner.borrow().core().snapshot().map_or(0.0, |s| s.current_time)
    }

    pub fn iteration(&self) -> u32 {
        self.inner.borrow().core().snapshot().map_or(0, |s| s.iteration)
    }

    pub fn progress(&self) -> f64 {
        self.inner.borrow().core().snapshot().map_or(0.0, |s| s.progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::DoubleAnimation;
    use std::sync::LazyLock;
    use trellis_core::{
        DependencyProperty, ObjectId, ObjectType, Property, PropertyMetadata, TrellisConfig, ValueType,
        FRAMEWORK_ELEMENT,
    };

    static SLIDER: ObjectType = ObjectType::element("SchedulerTestSlider", &FRAMEWORK_ELEMENT);

    static OFFSET: LazyLock<Property> = LazyLock::new(|| {
        DependencyProperty::register("Offset", ValueType::Double, &SLIDER, PropertyMetadata::new().default_value(0.0))
            .unwrap()
    });

    fn offset(tree: &ElementTree, id: ObjectId) -> f64 {
        tree.get_as::<f64>(id, *OFFSET).unwrap()
    }

    fn ramp(target: ObjectId) -> TimelineHandle<DoubleAnimation> {
        TimelineHandle::new(DoubleAnimation::new().from(0.0).to(100.0).duration_ms(100.0).target(target, *OFFSET))
    }

    #[test]
    fn test_invalid_deltas_are_ignored() {
        let mut tree = ElementTree::new();
        let slider = tree.create(&SLIDER);
        let mut manager = AnimationManager::new();
        let anim = ramp(slider);
        anim.begin(&mut manager);

        manager.update(&mut tree, -5.0);
        manager.update(&mut tree, f64::NAN);
        manager.update(&mut tree, 0.0);
        assert_eq!(manager.frame_count(), 0);
        assert_eq!(offset(&tree, slider), 0.0);

        manager.update(&mut tree, 10.0);
        assert_eq!(offset(&tree, slider), 10.0);
    }

    #[test]
    fn test_frame_delta_is_clamped() {
        let config = TrellisConfig::from_toml_str("[animation]\nmax_frame_delta_ms = 20.0").unwrap();
        let mut tree = ElementTree::with_config(config);
        let slider = tree.create(&SLIDER);
        let mut manager = AnimationManager::for_tree(&tree);
        let anim = ramp(slider);
        anim.begin(&mut manager);
        manager.update(&mut tree, 1000.0);
        assert_eq!(offset(&tree, slider), 20.0);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut tree = ElementTree::new();
        let slider = tree.create(&SLIDER);
        let mut manager = AnimationManager::new();
        let anim = ramp(slider);
        anim.begin(&mut manager);
        manager.update(&mut tree, 30.0);
        anim.pause();
        assert!(anim.is_paused());
        manager.update(&mut tree, 30.0);
        assert_eq!(offset(&tree, slider), 30.0);
        anim.resume();
        manager.update(&mut tree, 30.0);
        assert_eq!(offset(&tree, slider), 60.0);
    }

    #[test]
    fn test_begin_after_delay() {
        let mut tree = ElementTree::new();
        let slider = tree.create(&SLIDER);
        tree.set_local(slider, *OFFSET, 7.0).unwrap();
        let mut manager = AnimationManager::new();
        let anim = ramp(slider);
        anim.begin_after(&mut manager, 50.0);
        manager.update(&mut tree, 40.0);
        assert_eq!(offset(&tree, slider), 7.0);
        manager.update(&mut tree, 20.0);
        assert_eq!(offset(&tree, slider), 10.0);
    }

    #[test]
    fn test_seek_evaluates_immediately() {
        let mut tree = ElementTree::new();
        let slider = tree.create(&SLIDER);
        let mut manager = AnimationManager::new();
        let anim = ramp(slider);
        assert!(!anim.seek(&mut manager, &mut tree, 50.0));

        anim.begin(&mut manager);
        assert!(anim.seek(&mut manager, &mut tree, 75.0));
        assert_eq!(offset(&tree, slider), 75.0);
        assert_eq!(anim.progress(), 0.75);

        assert!(anim.seek(&mut manager, &mut tree, 200.0));
        assert_eq!(anim.status(), TimelineStatus::Completed);
        assert_eq!(manager.active_count(), 0);

        assert!(anim.seek(&mut manager, &mut tree, 25.0));
        assert_eq!(anim.status(), TimelineStatus::Active);
        assert_eq!(manager.active_count(), 1);
        assert_eq!(offset(&tree, slider), 25.0);
    }

    #[test]
    fn test_dropped_handles_are_forgotten() {
        let mut tree = ElementTree::new();
        let slider = tree.create(&SLIDER);
        let mut manager = AnimationManager::new();
        {
            let anim = ramp(slider);
            anim.begin(&mut manager);
            assert_eq!(manager.active_count(), 1);
        }
        assert_eq!(manager.active_count(), 0);
        manager.update(&mut tree, 10.0);
        assert_eq!(offset(&tree, slider), 0.0);
    }

    #[test]
    fn test_begin_twice_restarts() {
        let mut tree = ElementTree::new();
        let slider = tree.create(&SLIDER);
        let mut manager = AnimationManager::new();
        let anim = ramp(slider);
        anim.begin(&mut manager);
        manager.update(&mut tree, 80.0);
        anim.begin(&mut manager);
        assert_eq!(manager.active_count(), 1);
        manager.update(&mut tree, 10.0);
        assert_eq!(offset(&tree, slider), 10.0);
    }

    #[test]
    fn test_clear_forgets_without_releasing() {
        let mut tree = ElementTree::new();
        let slider = tree.create(&SLIDER);
        let mut manager = AnimationManager::new();
        let anim = ramp(slider);
        anim.begin(&mut manager);
        manager.update(&mut tree, 40.0);
        manager.clear();
        manager.update(&mut tree, 40.0);
        assert_eq!(offset(&tree, slider), 40.0);
        assert_eq!(manager.active_count(), 0);
    }
}
