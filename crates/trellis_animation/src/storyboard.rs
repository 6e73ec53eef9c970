//! Storyboards
//!
//! A [`Storyboard`] groups child timelines and drives them from its own
//! simple time. Children are addressed either by object id or by name plus a
//! property path; [`Storyboard::resolve_targets`] turns names and paths into
//! concrete `(object, property)` slots against a name scope.

use std::any::Any;

use trellis_core::{color_of, AnimationConfig, ElementTree, ObjectId, Property, PropertyPath, Value};

use crate::timeline::{drive, timing_builders, AnimationTarget, EvalContext, PropertyWrite, Timeline, TimelineCore, TimelineStatus};
use crate::timing::{ClockPhase, ClockSnapshot, FillBehavior};

/// A child timeline and where it points
pub struct StoryboardChild {
    timeline: Box<dyn Timeline>,
    target_name: Option<String>,
    target_property: Option<PropertyPath>,
    target: Option<ObjectId>,
    to_binding: Option<Property>,
}

impl StoryboardChild {
    pub fn new(timeline: impl Timeline) -> Self {
        Self::boxed(Box::new(timeline))
    }

    pub fn boxed(timeline: Box<dyn Timeline>) -> Self {
        Self {
            timeline,
            target_name: None,
            target_property: None,
            target: None,
            to_binding: None,
        }
    }

    /// Resolve the target object by name in the scope passed to
    /// [`Storyboard::resolve_targets`]
    pub fn target_name(mut self, name: impl Into<String>) -> Self {
        self.target_name = Some(name.into());
        self
    }

    pub fn target_property(mut self, path: impl Into<PropertyPath>) -> Self {
        self.target_property = Some(path.into());
        self
    }

    pub fn target(mut self, object: ObjectId) -> Self {
        self.target = Some(object);
        self
    }

    /// Take the destination value from this property of the templated
    /// parent each time the owning visual state is entered
    pub fn to_binding(mut self, property: Property) -> Self {
        self.to_binding = Some(property);
        self
    }

    pub fn timeline(&self) -> &dyn Timeline {
        self.timeline.as_ref()
    }

    pub fn timeline_mut(&mut self) -> &mut dyn Timeline {
        self.timeline.as_mut()
    }

    pub fn to_binding_property(&self) -> Option<Property> {
        self.to_binding
    }

    fn duplicate(&self) -> Self {
        Self {
            timeline: self.timeline.clone_timeline(),
            target_name: self.target_name.clone(),
            target_property: self.target_property.clone(),
            target: self.target,
            to_binding: self.to_binding,
        }
    }

    fn resolve(&mut self, tree: &ElementTree, scope_root: ObjectId) -> bool {
        let object = match (&self.target_name, self.target) {
            (_, Some(id)) if tree.contains(id) => id,
            (Some(name), _) => match tree.find_by_name(scope_root, name) {
                Some(id) => id,
                None => {
                    tracing::warn!("storyboard target '{}' not found", name);
                    return false;
                }
            },
            (None, _) => scope_root,
        };

        let Some(path) = &self.target_property else {
            // Keep a pre-set target slot when only the object was given
            return match self.timeline.animation_target() {
                Some(existing) => self.timeline.set_target(AnimationTarget::new(object, existing.property)),
                None => true,
            };
        };
        match path.resolve_target(tree, object) {
            Ok((object, property)) => {
                let accepted = self.timeline.set_target(AnimationTarget::new(object, property));
                if !accepted {
                    tracing::warn!(
                        "storyboard child cannot animate {} (type {})",
                        property.qualified_name(),
                        property.value_type()
                    );
                }
                accepted
            }
            Err(err) => {
                tracing::warn!("storyboard target path '{}' did not resolve: {}", path, err);
                false
            }
        }
    }
}

#[derive(Default)]
pub struct Storyboard {
    core: TimelineCore,
    children: Vec<StoryboardChild>,
}

impl Storyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(mut self, child: StoryboardChild) -> Self {
        self.children.push(child);
        self
    }

    pub fn add_child(&mut self, child: StoryboardChild) {
        self.children.push(child);
    }

    timing_builders!();

    pub fn children(&self) -> &[StoryboardChild] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [StoryboardChild] {
        &mut self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Resolve every child's name and path against `scope_root`; returns how
    /// many children have a usable target afterwards
    pub fn resolve_targets(&mut self, tree: &ElementTree, scope_root: ObjectId) -> usize {
        let mut resolved = 0;
        for child in &mut self.children {
            if child.resolve(tree, scope_root) && child.timeline.animation_target().is_some() {
                resolved += 1;
            }
        }
        resolved
    }

    /// Refresh `to_binding` destinations from `source`
    ///
    /// Brush values are reduced to their color for color animations.
    pub fn apply_to_bindings(&mut self, tree: &ElementTree, source: ObjectId) {
        for child in &mut self.children {
            let Some(property) = child.to_binding else {
                continue;
            };
            let value = tree.get(source, property);
            if child.timeline.set_to_value(&value) {
                continue;
            }
            let fitted = color_of(tree, &value).is_some_and(|color| child.timeline.set_to_value(&Value::Color(color)));
            if !fitted {
                tracing::debug!("to-binding {} produced an unusable value {}", property.qualified_name(), value);
            }
        }
    }

    /// Independent copy with fresh run state and no Completed handlers
    pub fn duplicate(&self) -> Storyboard {
        Storyboard {
            core: self.core.duplicate(),
            children: self.children.iter().map(StoryboardChild::duplicate).collect(),
        }
    }

    /// Every slot a child animation drives
    pub fn targets(&self) -> Vec<AnimationTarget> {
        let mut targets = Vec::new();
        for child in &self.children {
            if let Some(storyboard) = child.timeline.as_any().downcast_ref::<Storyboard>() {
                targets.extend(storyboard.targets());
            } else if let Some(target) = child.timeline.animation_target() {
                targets.push(target);
            }
        }
        targets
    }
}

impl Timeline for Storyboard {
    fn core(&self) -> &TimelineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TimelineCore {
        &mut self.core
    }

    /// Latest child end time; unbounded when any child is
    fn natural_duration(&self, config: &AnimationConfig) -> Option<f64> {
        let mut longest: f64 = 0.0;
        for child in &self.children {
            let natural = child.timeline.natural_duration(config);
            longest = longest.max(child.timeline.core().timing.end_time(natural)?);
        }
        Some(longest)
    }

    fn reset(&mut self) {
        self.core.restart();
        for child in &mut self.children {
            child.timeline.reset();
        }
    }

    fn apply(&mut self, ctx: &mut EvalContext<'_>, clock: &ClockSnapshot) {
        if clock.phase == ClockPhase::Before {
            return;
        }
        let parent_time = clock.simple_time;
        for child in &mut self.children {
            let timeline = child.timeline.as_mut();
            let core = timeline.core_mut();
            if core.status == TimelineStatus::Idle {
                continue;
            }
            if parent_time < core.last_parent_time {
                core.rewind();
            }
            core.last_parent_time = parent_time;
            if core.status == TimelineStatus::Completed {
                continue;
            }
            core.elapsed = parent_time;
            drive(timeline, ctx, parent_time);
        }
    }

    fn release(&self, out: &mut Vec<PropertyWrite>) {
        for child in &self.children {
            child.timeline.release(out);
        }
    }

    /// Everything when the storyboard itself fills with Stop; otherwise only
    /// the children that do
    fn release_on_stop(&self, out: &mut Vec<PropertyWrite>) {
        if self.core.fill() == FillBehavior::Stop {
            self.release(out);
        } else {
            for child in &self.children {
                child.timeline.release_on_stop(out);
            }
        }
    }

    fn clone_timeline(&self) -> Box<dyn Timeline> {
        Box::new(self.duplicate())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
