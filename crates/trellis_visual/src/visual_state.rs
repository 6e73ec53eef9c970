//! Visual state manager
//!
//! Controls describe their looks as named [`VisualState`]s grouped into
//! [`VisualStateGroup`]s. Each group has at most one current state; entering
//! a state stops what the group was running and begins the state's
//! storyboard, optionally through a [`VisualTransition`].
//!
//! The manager is attached to a control as tree data. Storyboards address
//! template parts by name; targets resolve against the control's template
//! root (or the control itself when it has no template).
//!
//! Transition selection, for a change `from -> to`:
//!
//! 1. a transition naming both `from` and `to`
//! 2. a transition naming only one side, the other left open
//! 3. a default transition naming neither
//!
//! A transition with its own storyboard runs it and delays the state's
//! storyboard until it ends. Without one, a transition of positive duration
//! synthesizes a storyboard that eases each animated property from its current
//! value to where the state starts, and properties the state no longer
//! animates back to their base values.

use std::cell::RefCell;
use std::rc::Rc;

use trellis_animation::{
    AnimationManager, AnimationTarget, Easing, Storyboard, StoryboardChild, StoryboardHandle, Timeline,
};
use trellis_core::{ElementTree, ObjectId, VisualStateConfig};

use crate::template::template_root;

/// Payload of the state-change events
#[derive(Clone, Debug, PartialEq)]
pub struct VisualStateChangedArgs {
    pub object: ObjectId,
    pub group: String,
    pub old_state: Option<String>,
    pub new_state: String,
}

pub type StateChangedHandler = Rc<dyn Fn(&VisualStateChangedArgs)>;

// =============================================================================
// STATES AND TRANSITIONS
// =============================================================================

#[derive(Clone)]
pub struct VisualState {
    name: String,
    storyboard: Option<StoryboardHandle>,
}

impl std::fmt::Debug for VisualState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualState")
            .field("name", &self.name)
            .field("storyboard", &self.storyboard.is_some())
            .finish()
    }
}

impl VisualState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storyboard: None,
        }
    }

    pub fn with_storyboard(mut self, storyboard: Storyboard) -> Self {
        self.storyboard = Some(StoryboardHandle::new(storyboard));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storyboard(&self) -> Option<&StoryboardHandle> {
        self.storyboard.as_ref()
    }

    fn duplicate(&self) -> Self {
        Self {
            name: self.name.clone(),
            storyboard: self.storyboard.as_ref().map(duplicate_handle),
        }
    }
}

/// How to move between two states of a group
#[derive(Clone, Default)]
pub struct VisualTransition {
    from: Option<String>,
    to: Option<String>,
    duration_ms: f64,
    easing: Easing,
    storyboard: Option<StoryboardHandle>,
}

impl std::fmt::Debug for VisualTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualTransition")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("duration_ms", &self.duration_ms)
            .field("storyboard", &self.storyboard.is_some())
            .finish()
    }
}

impl VisualTransition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, state: impl Into<String>) -> Self {
        self.from = Some(state.into());
        self
    }

    pub fn to(mut self, state: impl Into<String>) -> Self {
        self.to = Some(state.into());
        self
    }

    pub fn duration_ms(mut self, ms: f64) -> Self {
        self.duration_ms = ms.max(0.0);
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn storyboard(mut self, storyboard: Storyboard) -> Self {
        self.storyboard = Some(StoryboardHandle::new(storyboard));
        self
    }

    pub fn from_state(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn to_state(&self) -> Option<&str> {
        self.to.as_deref()
    }

    pub fn generated_duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub fn generated_easing(&self) -> Easing {
        self.easing
    }

    pub fn transition_storyboard(&self) -> Option<&StoryboardHandle> {
        self.storyboard.as_ref()
    }

    /// 2 for an exact match, 1 for a one-sided match, 0 for a default
    /// transition, `None` when it does not apply
    fn rank(&self, from: Option<&str>, to: &str) -> Option<u8> {
        let from_matches = match (&self.from, from) {
            (None, _) => None,
            (Some(name), Some(from)) if name == from => Some(true),
            (Some(_), _) => return None,
        };
        let to_matches = match &self.to {
            None => None,
            Some(name) if name == to => Some(true),
            Some(_) => return None,
        };
        Some(match (from_matches, to_matches) {
            (Some(_), Some(_)) => 2,
            (Some(_), None) | (None, Some(_)) => 1,
            (None, None) => 0,
        })
    }

    fn duplicate(&self) -> Self {
        Self {
            storyboard: self.storyboard.as_ref().map(duplicate_handle),
            ..self.clone()
        }
    }
}

fn duplicate_handle(handle: &StoryboardHandle) -> StoryboardHandle {
    StoryboardHandle::new(handle.borrow().duplicate())
}

// =============================================================================
// GROUPS
// =============================================================================

/// Mutually exclusive states
#[derive(Default)]
pub struct VisualStateGroup {
    name: String,
    states: Vec<VisualState>,
    transitions: Vec<VisualTransition>,
    current: Option<usize>,
    /// Storyboards started by the last state change
    running: Vec<StoryboardHandle>,
    resolved: bool,
}

impl std::fmt::Debug for VisualStateGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualStateGroup")
            .field("name", &self.name)
            .field("states", &self.states)
            .field("transitions", &self.transitions)
            .field("current", &self.current_state().map(VisualState::name))
            .field("running", &self.running.len())
            .finish()
    }
}

impl VisualStateGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn state(mut self, state: VisualState) -> Self {
        self.add_state(state);
        self
    }

    pub fn transition(mut self, transition: VisualTransition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Returns false when a state with that name already exists
    pub fn add_state(&mut self, state: VisualState) -> bool {
        if self.find_state(&state.name).is_some() {
            tracing::warn!("visual state '{}' already exists in group '{}'", state.name, self.name);
            return false;
        }
        self.states.push(state);
        self.resolved = false;
        true
    }

    pub fn add_transition(&mut self, transition: VisualTransition) {
        self.transitions.push(transition);
        self.resolved = false;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn states(&self) -> &[VisualState] {
        &self.states
    }

    pub fn transitions(&self) -> &[VisualTransition] {
        &self.transitions
    }

    pub fn find_state(&self, name: &str) -> Option<&VisualState> {
        self.states.iter().find(|s| s.name == name)
    }

    pub fn current_state(&self) -> Option<&VisualState> {
        self.current.and_then(|index| self.states.get(index))
    }

    /// Best match for `from -> to`; the first declared wins a tie
    pub fn best_transition(&self, from: Option<&str>, to: &str) -> Option<&VisualTransition> {
        let mut best: Option<(u8, &VisualTransition)> = None;
        for transition in &self.transitions {
            let Some(rank) = transition.rank(from, to) else {
                continue;
            };
            if best.map_or(true, |(top, _)| rank > top) {
                best = Some((rank, transition));
            }
        }
        best.map(|(_, transition)| transition)
    }

    /// Fresh copy for one control instance, with no current state
    pub fn duplicate(&self) -> Self {
        Self {
            name: self.name.clone(),
            states: self.states.iter().map(VisualState::duplicate).collect(),
            transitions: self.transitions.iter().map(VisualTransition::duplicate).collect(),
            current: None,
            running: Vec::new(),
            resolved: false,
        }
    }

    fn storyboards(&self) -> impl Iterator<Item = &StoryboardHandle> {
        self.states
            .iter()
            .filter_map(|s| s.storyboard.as_ref())
            .chain(self.transitions.iter().filter_map(|t| t.storyboard.as_ref()))
    }

    fn resolve_targets(&mut self, tree: &ElementTree, scope_root: ObjectId) -> usize {
        let resolved = self
            .storyboards()
            .map(|storyboard| storyboard.borrow_mut().resolve_targets(tree, scope_root))
            .sum();
        self.resolved = true;
        resolved
    }

    fn stop_running(&mut self, animations: &mut AnimationManager, tree: &mut ElementTree) {
        for storyboard in self.running.drain(..) {
            storyboard.stop(animations, tree);
        }
    }

    /// Steps 4-6 of a state change: stop, transition, start
    fn enter(&mut self, change: StateChange<'_>, tree: &mut ElementTree, animations: &mut AnimationManager) {
        let from = self.current_state().map(|s| s.name.clone());
        let target = &self.states[change.index];
        let to_name = target.name.clone();
        let to_storyboard = target.storyboard.clone();

        if let Some(storyboard) = &to_storyboard {
            storyboard.borrow_mut().apply_to_bindings(tree, change.templated_parent);
        }

        let transition = if change.use_transitions && from.is_some() {
            self.best_transition(from.as_deref(), &to_name).cloned()
        } else {
            None
        };

        let to_targets = to_storyboard.as_ref().map(|sb| sb.borrow().targets()).unwrap_or_default();
        let previous = std::mem::take(&mut self.running);
        let mut released: Vec<AnimationTarget> = Vec::new();
        for storyboard in &previous {
            for slot in storyboard.borrow().targets() {
                if !to_targets.contains(&slot) && !released.contains(&slot) {
                    released.push(slot);
                }
            }
        }

        let mut delay = 0.0;
        let mut covered: Vec<AnimationTarget> = Vec::new();
        let mut lead: Option<StoryboardHandle> = None;
        match transition {
            Some(VisualTransition {
                storyboard: Some(custom),
                ..
            }) => {
                {
                    let board = custom.borrow();
                    covered = board.targets();
                    // An unbounded transition storyboard lets the state start at once
                    delay = storyboard_end(&board, animations).unwrap_or(0.0);
                }
                lead = Some(custom);
            }
            Some(transition) if change.config.generated_transitions && transition.duration_ms > 0.0 => {
                let shim = generated_shim(&transition, to_storyboard.as_ref(), &previous, &released);
                covered = shim.targets();
                delay = transition.duration_ms;
                if !shim.is_empty() {
                    lead = Some(StoryboardHandle::new(shim));
                }
            }
            _ => {}
        }

        // HoldEnd storyboards keep their last values, so the next state
        // starts from what is on screen
        for storyboard in &previous {
            storyboard.stop(animations, tree);
        }
        for slot in released.iter().filter(|slot| !covered.contains(slot)) {
            tree.clear_animated(slot.object, slot.property);
        }

        if let Some(lead) = lead {
            lead.begin(animations);
            self.running.push(lead);
        }
        if let Some(storyboard) = to_storyboard {
            storyboard.begin_after(animations, delay);
            self.running.push(storyboard);
        }
        tracing::debug!(
            "group '{}': {} -> {} (delay {}ms)",
            self.name,
            from.as_deref().unwrap_or("<none>"),
            to_name,
            delay
        );
        self.current = Some(change.index);
    }
}

struct StateChange<'a> {
    index: usize,
    templated_parent: ObjectId,
    use_transitions: bool,
    config: &'a VisualStateConfig,
}

/// Frame time after Begin at which `storyboard` ends; `None` when unbounded
fn storyboard_end(storyboard: &Storyboard, animations: &AnimationManager) -> Option<f64> {
    storyboard
        .core()
        .timing
        .end_time(storyboard.natural_duration(animations.config()))
}

/// Animations leaving nested storyboards flattened out
fn leaf_timelines<'a>(storyboard: &'a Storyboard, out: &mut Vec<&'a dyn Timeline>) {
    for child in storyboard.children() {
        let timeline = child.timeline();
        match timeline.as_any().downcast_ref::<Storyboard>() {
            Some(nested) => leaf_timelines(nested, out),
            None => out.push(timeline),
        }
    }
}

/// Storyboard that eases into the next state and out of the previous one
fn generated_shim(
    transition: &VisualTransition,
    to: Option<&StoryboardHandle>,
    previous: &[StoryboardHandle],
    released: &[AnimationTarget],
) -> Storyboard {
    let duration = transition.duration_ms;
    let easing = transition.easing;
    let mut shim = Storyboard::new();
    let mut seen: Vec<AnimationTarget> = Vec::new();

    if let Some(to) = to {
        let board = to.borrow();
        let mut timelines = Vec::new();
        leaf_timelines(&board, &mut timelines);
        for timeline in timelines {
            let Some(slot) = timeline.animation_target() else {
                continue;
            };
            if seen.contains(&slot) {
                continue;
            }
            if let Some(generated) = timeline.generated_transition(duration, easing, false) {
                seen.push(slot);
                shim.add_child(StoryboardChild::boxed(generated));
            }
        }
    }

    for storyboard in previous {
        let board = storyboard.borrow();
        let mut timelines = Vec::new();
        leaf_timelines(&board, &mut timelines);
        for timeline in timelines {
            let Some(slot) = timeline.animation_target() else {
                continue;
            };
            if !released.contains(&slot) || seen.contains(&slot) {
                continue;
            }
            if let Some(generated) = timeline.generated_transition(duration, easing, true) {
                seen.push(slot);
                shim.add_child(StoryboardChild::boxed(generated));
            }
        }
    }
    shim
}

// =============================================================================
// MANAGER
// =============================================================================

/// State groups of one control
#[derive(Default)]
pub struct VisualStateManager {
    groups: Vec<VisualStateGroup>,
    config: VisualStateConfig,
    scope_root: Option<ObjectId>,
    changing: Vec<StateChangedHandler>,
    changed: Vec<StateChangedHandler>,
}

impl std::fmt::Debug for VisualStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualStateManager")
            .field("groups", &self.groups)
            .field("config", &self.config)
            .field("scope_root", &self.scope_root)
            .finish_non_exhaustive()
    }
}

impl VisualStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: VisualStateConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &VisualStateConfig {
        &self.config
    }

    /// Returns false when a group with that name already exists
    pub fn add_group(&mut self, group: VisualStateGroup) -> bool {
        if self.group(&group.name).is_some() {
            tracing::warn!("visual state group '{}' already exists", group.name);
            return false;
        }
        self.groups.push(group);
        true
    }

    pub fn remove_group(&mut self, name: &str) -> Option<VisualStateGroup> {
        let index = self.groups.iter().position(|g| g.name == name)?;
        Some(self.groups.remove(index))
    }

    pub fn group(&self, name: &str) -> Option<&VisualStateGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut VisualStateGroup> {
        self.groups.iter_mut().find(|g| g.name == name)
    }

    pub fn groups(&self) -> &[VisualStateGroup] {
        &self.groups
    }

    /// Name of the current state of `group`
    pub fn current_state_of(&self, group: &str) -> Option<&str> {
        self.group(group)?.current_state().map(VisualState::name)
    }

    pub fn on_current_state_changing<F>(&mut self, handler: F)
    where
        F: Fn(&VisualStateChangedArgs) + 'static,
    {
        self.changing.push(Rc::new(handler));
    }

    pub fn on_current_state_changed<F>(&mut self, handler: F)
    where
        F: Fn(&VisualStateChangedArgs) + 'static,
    {
        self.changed.push(Rc::new(handler));
    }

    /// Resolve every storyboard of every group against `scope_root`
    ///
    /// Returns how many animations have a usable target.
    pub fn resolve_targets(&mut self, tree: &ElementTree, scope_root: ObjectId) -> usize {
        self.scope_root = Some(scope_root);
        self.groups.iter_mut().map(|g| g.resolve_targets(tree, scope_root)).sum()
    }

    /// `(group, state)` indices of the state called `name`
    fn locate(&self, name: &str) -> Option<(usize, usize)> {
        self.groups
            .iter()
            .enumerate()
            .find_map(|(gi, group)| group.states.iter().position(|s| s.name == name).map(|si| (gi, si)))
    }

    fn stop_all(&mut self, animations: &mut AnimationManager, tree: &mut ElementTree) {
        for group in &mut self.groups {
            group.stop_running(animations, tree);
        }
    }
}

// =============================================================================
// ATTACHMENT
// =============================================================================

pub type SharedStateManager = Rc<RefCell<VisualStateManager>>;

/// Attach `manager` to `object`, resolving storyboard targets against the
/// object's template root
///
/// A manager attached earlier is replaced; its storyboards stop ticking once
/// dropped.
pub fn set_state_manager(tree: &mut ElementTree, object: ObjectId, mut manager: VisualStateManager) -> SharedStateManager {
    let scope_root = template_root(tree, object).unwrap_or(object);
    let resolved = manager.resolve_targets(tree, scope_root);
    tracing::debug!("visual state manager attached; {} animation target(s) resolved", resolved);

    let shared = Rc::new(RefCell::new(manager));
    if !tree.set_attached(object, Rc::clone(&shared)) {
        tracing::warn!("cannot attach a visual state manager to a removed object");
    }
    shared
}

pub fn get_state_manager(tree: &ElementTree, object: ObjectId) -> Option<SharedStateManager> {
    tree.attached::<RefCell<VisualStateManager>>(object)
}

/// Detach the manager from `object` and stop its storyboards
pub fn clear_state_manager(
    tree: &mut ElementTree,
    animations: &mut AnimationManager,
    object: ObjectId,
) -> Option<SharedStateManager> {
    let manager = tree.take_attached::<RefCell<VisualStateManager>>(object)?;
    match manager.try_borrow_mut() {
        Ok(mut vsm) => vsm.stop_all(animations, tree),
        Err(_) => tracing::warn!("visual state manager is busy; storyboards left running"),
    }
    Some(manager)
}

/// Move the group owning `state_name` into that state
///
/// Returns false when no group has the state (or the object has no manager).
/// Entering the current state again is a successful no-op.
pub fn go_to_state(
    tree: &mut ElementTree,
    animations: &mut AnimationManager,
    object: ObjectId,
    state_name: &str,
    use_transitions: bool,
) -> bool {
    let Some(manager) = get_state_manager(tree, object) else {
        tracing::debug!("no visual state manager on {:?}", object);
        return false;
    };

    let (args, changing) = {
        let Ok(vsm) = manager.try_borrow() else {
            tracing::warn!("visual state change to '{}' while the manager is busy", state_name);
            return false;
        };
        let Some((gi, si)) = vsm.locate(state_name) else {
            tracing::debug!("visual state '{}' not found", state_name);
            return false;
        };
        let group = &vsm.groups[gi];
        if group.current == Some(si) {
            return true;
        }
        let args = VisualStateChangedArgs {
            object,
            group: group.name.clone(),
            old_state: group.current_state().map(|s| s.name.clone()),
            new_state: state_name.to_string(),
        };
        (args, vsm.changing.clone())
    };

    for handler in &changing {
        handler(&args);
    }

    let changed = {
        let Ok(mut guard) = manager.try_borrow_mut() else {
            tracing::warn!("visual state change to '{}' while the manager is busy", state_name);
            return false;
        };
        let vsm = &mut *guard;
        // Handlers may have changed the groups
        let Some((gi, si)) = vsm.locate(state_name) else {
            return false;
        };
        let scope_root = vsm.scope_root.filter(|root| tree.contains(*root)).unwrap_or(object);
        let group = &mut vsm.groups[gi];
        if group.current == Some(si) {
            return true;
        }
        if !group.resolved {
            group.resolve_targets(tree, scope_root);
        }
        let change = StateChange {
            index: si,
            templated_parent: object,
            use_transitions,
            config: &vsm.config,
        };
        group.enter(change, tree, animations);
        vsm.changed.clone()
    };

    for handler in &changed {
        handler(&args);
    }
    true
}
