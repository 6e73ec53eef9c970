//! Binding engine
//!
//! A [`Binding`] links a source path to a target slot. Attaching one with
//! [`ElementTree::set_binding`] reads the source once and writes the target's
//! LocalBinding channel (TemplateBinding for [`Binding::template`]). Unless
//! the binding is OneTime, every link of the source path is watched: a change
//! to the leaf re-reads the value, a change to an intermediate link re-resolves
//! the rest of the path.
//!
//! TwoWay and OneWayToSource bindings push target changes back to the source
//! according to their [`UpdateSourceTrigger`]. Writes a binding makes are
//! flagged on the binding so their echoes never travel back the other way.
//!
//! ```rust
//! use std::sync::LazyLock;
//! use trellis_core::binding::Binding;
//! use trellis_core::object_type::{ObjectType, FRAMEWORK_ELEMENT};
//! use trellis_core::registry::{Property, PropertyMetadata, DependencyProperty};
//! use trellis_core::tree::ElementTree;
//! use trellis_core::value::{Value, ValueType};
//!
//! static GAUGE: ObjectType = ObjectType::element("DocGauge", &FRAMEWORK_ELEMENT);
//! static LEVEL: LazyLock<Property> = LazyLock::new(|| {
//!     DependencyProperty::register("Level", ValueType::Int, &GAUGE, PropertyMetadata::new()).unwrap()
//! });
//!
//! let mut tree = ElementTree::new();
//! let a = tree.create(&GAUGE);
//! let b = tree.create(&GAUGE);
//! tree.set_binding(b, *LEVEL, Binding::to_property(a, *LEVEL)).unwrap();
//!
//! tree.set_local(a, *LEVEL, 7i64).unwrap();
//! assert_eq!(tree.get(b, *LEVEL), Value::Int(7));
//! ```

use slotmap::new_key_type;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

use crate::error::{BindingError, PropertyError, Result};
use crate::framework::DATA_CONTEXT;
use crate::path::{PathResolution, PropertyPath};
use crate::registry::{Property, PropertyId};
use crate::store::{PropertyChange, ValueSource};
use crate::tree::{ElementTree, ObjectId};
use crate::value::Value;

new_key_type! {
    /// Handle to an attached binding
    pub struct BindingId;
}

/// Where a binding's path starts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingSource {
    /// A specific object
    Object(ObjectId),
    /// The target's templated parent
    TemplatedParent,
    /// The target itself
    SelfRef,
    /// The target's inherited `DataContext`
    DataContext,
}

/// Direction of value flow
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BindingMode {
    /// TwoWay if the target property binds two-way by default, else OneWay
    #[default]
    Default,
    OneTime,
    OneWay,
    TwoWay,
    OneWayToSource,
}

impl BindingMode {
    fn writes_target(self) -> bool {
        matches!(self, BindingMode::OneTime | BindingMode::OneWay | BindingMode::TwoWay)
    }

    fn writes_source(self) -> bool {
        matches!(self, BindingMode::TwoWay | BindingMode::OneWayToSource)
    }
}

/// When target changes are pushed back to the source
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdateSourceTrigger {
    /// The target property's default trigger, else PropertyChanged
    #[default]
    Default,
    PropertyChanged,
    /// On [`ElementTree::notify_lost_focus`]
    LostFocus,
    /// Only on [`ElementTree::update_source`]
    Explicit,
}

/// Converts values between source and target
pub trait ValueConverter: Send + Sync {
    fn convert(&self, value: &Value) -> std::result::Result<Value, String>;

    fn convert_back(&self, _value: &Value) -> std::result::Result<Value, String> {
        Err("convert_back is not supported".to_string())
    }
}

/// Declarative description of a binding
#[derive(Clone)]
pub struct Binding {
    source: BindingSource,
    path: PropertyPath,
    mode: BindingMode,
    trigger: UpdateSourceTrigger,
    converter: Option<Arc<dyn ValueConverter>>,
    fallback: Option<Value>,
    template: bool,
}

impl Binding {
    pub fn new(source: BindingSource, path: impl Into<PropertyPath>) -> Self {
        Self {
            source,
            path: path.into(),
            mode: BindingMode::Default,
            trigger: UpdateSourceTrigger::Default,
            converter: None,
            fallback: None,
            template: false,
        }
    }

    /// Bind to a dotted path on `object`
    pub fn to_object(object: ObjectId, path: &str) -> Self {
        Self::new(BindingSource::Object(object), PropertyPath::parse(path))
    }

    /// Bind to one property of `object`
    pub fn to_property(object: ObjectId, property: Property) -> Self {
        Self::new(BindingSource::Object(object), property)
    }

    /// Bind to a path below the target's data context
    pub fn to_data_context(path: &str) -> Self {
        Self::new(BindingSource::DataContext, PropertyPath::parse(path))
    }

    /// TemplateBinding: OneWay from the templated parent's `property`
    pub fn template(property: Property) -> Self {
        Self {
            mode: BindingMode::OneWay,
            template: true,
            ..Self::new(BindingSource::TemplatedParent, property)
        }
    }

    /// Ignored on template bindings, which are always OneWay
    pub fn mode(mut self, mode: BindingMode) -> Self {
        if !self.template {
            self.mode = mode;
        }
        self
    }

    pub fn trigger(mut self, trigger: UpdateSourceTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn converter(mut self, converter: impl ValueConverter + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }

    /// Value used when conversion or type checks fail
    pub fn fallback(mut self, value: impl Into<Value>) -> Self {
        self.fallback = Some(value.into());
        self
    }

    pub fn source(&self) -> BindingSource {
        self.source
    }

    pub fn path(&self) -> &PropertyPath {
        &self.path
    }

    pub fn is_template(&self) -> bool {
        self.template
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("source", &self.source)
            .field("path", &self.path.to_string())
            .field("mode", &self.mode)
            .field("trigger", &self.trigger)
            .field("template", &self.template)
            .finish()
    }
}

/// Runtime state of an attached binding
#[derive(Clone, Debug, PartialEq)]
pub enum BindingStatus {
    Active,
    Inactive(BindingError),
}

pub(crate) struct BindingEntry {
    spec: Binding,
    target: ObjectId,
    property: Property,
    mode: BindingMode,
    trigger: UpdateSourceTrigger,
    channel: ValueSource,
    /// Resolved source links, leaf last
    links: SmallVec<[(ObjectId, Property); 2]>,
    /// Every slot this binding is registered on in `dependents`
    watched: SmallVec<[(ObjectId, PropertyId); 3]>,
    status: BindingStatus,
    updating_target: bool,
    updating_source: bool,
    source_dirty: bool,
}

impl BindingEntry {
    pub(crate) fn is_template(&self) -> bool {
        self.spec.template
    }

    fn leaf(&self) -> Option<(ObjectId, Property)> {
        match self.status {
            BindingStatus::Active => self.links.last().copied(),
            BindingStatus::Inactive(_) => None,
        }
    }
}

impl ElementTree {
    // =========================================================================
    // Attach / detach
    // =========================================================================

    /// Attach `binding` to `(target, property)`, replacing any existing one
    pub fn set_binding(&mut self, target: ObjectId, property: Property, binding: Binding) -> Result<BindingId> {
        if !self.contains(target) {
            return Err(PropertyError::ObjectNotFound);
        }
        if self.binding_of(target, property).is_some() {
            self.clear_binding(target, property);
        }

        let mode = match binding.mode {
            BindingMode::Default if property.binds_two_way_by_default() => BindingMode::TwoWay,
            BindingMode::Default => BindingMode::OneWay,
            mode => mode,
        };
        let trigger = match (binding.trigger, property.default_update_trigger()) {
            (UpdateSourceTrigger::Default, UpdateSourceTrigger::Default) => UpdateSourceTrigger::PropertyChanged,
            (UpdateSourceTrigger::Default, trigger) => trigger,
            (trigger, _) => trigger,
        };
        let channel = if binding.template {
            ValueSource::TemplateBinding
        } else {
            ValueSource::LocalBinding
        };

        tracing::debug!(
            "binding {} on {:?} to {:?} '{}' ({:?})",
            property.qualified_name(),
            target,
            binding.source,
            binding.path,
            mode
        );

        let id = self.bindings.insert(BindingEntry {
            spec: binding,
            target,
            property,
            mode,
            trigger,
            channel,
            links: SmallVec::new(),
            watched: SmallVec::new(),
            status: BindingStatus::Active,
            updating_target: false,
            updating_source: false,
            source_dirty: false,
        });
        if let Some(store) = self.store_mut(target) {
            store.slot_or_insert(property).binding = Some(id);
        }

        self.activate_binding(id);
        Ok(id)
    }

    /// Detach the binding on `(target, property)` and clear its channel
    pub fn clear_binding(&mut self, target: ObjectId, property: Property) -> bool {
        let Some(id) = self.binding_of(target, property) else {
            return false;
        };
        let Some(entry) = self.detach_binding(id) else {
            return false;
        };
        self.write_source(target, property, entry.channel, None);
        if let Some(store) = self.store_mut(target) {
            store.compact(property);
        }
        true
    }

    pub fn binding_of(&self, target: ObjectId, property: Property) -> Option<BindingId> {
        self.store(target)?.slot(property)?.binding()
    }

    pub fn binding(&self, id: BindingId) -> Option<&Binding> {
        self.bindings.get(id).map(|entry| &entry.spec)
    }

    pub fn binding_status(&self, id: BindingId) -> Option<BindingStatus> {
        self.bindings.get(id).map(|entry| entry.status.clone())
    }

    /// Re-resolve every binding that targets `root` or its subtree
    ///
    /// Used after template instantiation, and to retry inactive bindings.
    pub fn refresh_bindings(&mut self, root: ObjectId) {
        let targets: Vec<ObjectId> = std::iter::once(root).chain(self.descendants(root)).collect();
        let mut ids: SmallVec<[BindingId; 8]> = SmallVec::new();
        for target in targets {
            if let Some(store) = self.store(target) {
                ids.extend(
                    store
                        .properties()
                        .filter_map(|p| store.slot(p).and_then(|slot| slot.binding())),
                );
            }
        }
        for id in ids {
            self.activate_binding(id);
        }
    }

    fn detach_binding(&mut self, id: BindingId) -> Option<BindingEntry> {
        let entry = self.bindings.remove(id)?;
        self.unwatch(id, &entry.watched);
        if let Some(slot) = self
            .store_mut(entry.target)
            .and_then(|store| store.slot_mut(entry.property))
        {
            if slot.binding == Some(id) {
                slot.binding = None;
            }
        }
        tracing::trace!("detached binding on {}", entry.property.qualified_name());
        Some(entry)
    }

    /// Drop every binding targeting `object`; no notification is sent
    pub(crate) fn detach_bindings_of(&mut self, object: ObjectId) {
        let ids: SmallVec<[BindingId; 4]> = match self.store(object) {
            Some(store) => store
                .properties()
                .filter_map(|p| store.slot(p).and_then(|slot| slot.binding()))
                .collect(),
            None => return,
        };
        for id in ids {
            self.detach_binding(id);
        }
    }

    fn unwatch(&mut self, id: BindingId, watched: &[(ObjectId, PropertyId)]) {
        for key in watched {
            if let Some(ids) = self.dependents.get_mut(key) {
                ids.retain(|b| *b != id);
                if ids.is_empty() {
                    self.dependents.remove(key);
                }
            }
        }
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve the source path, re-register watches, and transfer once
    pub(crate) fn activate_binding(&mut self, id: BindingId) {
        let Some(entry) = self.bindings.get(id) else {
            return;
        };
        let target = entry.target;
        let mode = entry.mode;
        let source = entry.spec.source;
        let old_watched = entry.watched.clone();

        let mut watched: SmallVec<[(ObjectId, PropertyId); 3]> = SmallVec::new();
        let root = match source {
            BindingSource::Object(object) if self.contains(object) => Ok(Value::Object(object)),
            BindingSource::Object(_) => Err(BindingError::SourceMissing),
            BindingSource::SelfRef => Ok(Value::Object(target)),
            BindingSource::TemplatedParent => self
                .templated_parent(target)
                .map(Value::Object)
                .ok_or(BindingError::TemplatedParentMissing),
            BindingSource::DataContext => {
                watched.push((target, DATA_CONTEXT.id()));
                Ok(self.get(target, *DATA_CONTEXT))
            }
        };

        let resolution = match root {
            Ok(root) => self
                .bindings
                .get(id)
                .map(|entry| entry.spec.path.resolve(self, root))
                .unwrap_or_else(|| PathResolution {
                    links: SmallVec::new(),
                    result: Err(BindingError::SourceMissing),
                }),
            Err(err) => PathResolution {
                links: SmallVec::new(),
                result: Err(err),
            },
        };

        self.unwatch(id, &old_watched);
        if mode != BindingMode::OneTime {
            watched.extend(resolution.links.iter().map(|(o, p)| (*o, p.id())));
            for key in &watched {
                let ids = self.dependents.entry(*key).or_default();
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        } else {
            watched.clear();
        }

        let Some(entry) = self.bindings.get_mut(id) else {
            return;
        };
        entry.watched = watched;
        entry.links = resolution.links;
        entry.status = match &resolution.result {
            Ok(_) => BindingStatus::Active,
            Err(err) => BindingStatus::Inactive(err.clone()),
        };

        match resolution.result {
            Ok(value) => {
                if mode.writes_target() {
                    self.transfer_to_target(id, Ok(value));
                } else {
                    self.push_to_source(id);
                }
            }
            Err(err) => {
                tracing::debug!("binding on {:?} inactive: {}", target, err);
                if mode.writes_target() {
                    self.transfer_to_target(id, Err(err));
                }
            }
        }
    }

    // =========================================================================
    // Transfer
    // =========================================================================

    /// Write the binding's channel on the target
    fn transfer_to_target(&mut self, id: BindingId, value: std::result::Result<Value, BindingError>) {
        let Some(entry) = self.bindings.get(id) else {
            return;
        };
        let target = entry.target;
        let property = entry.property;
        let channel = entry.channel;
        let fallback = || {
            entry
                .spec
                .fallback
                .clone()
                .unwrap_or_else(|| property.default_value().clone())
        };

        let next = match value {
            Ok(value) => match &entry.spec.converter {
                Some(converter) => match converter.convert(&value) {
                    Ok(converted) => Some(converted),
                    Err(reason) => {
                        tracing::warn!(
                            "converter failed for {}: {}",
                            property.qualified_name(),
                            BindingError::ConversionFailed(reason)
                        );
                        Some(fallback())
                    }
                },
                None => Some(value),
            },
            // Null intermediate: the target shows its default
            Err(BindingError::NullIntermediate { .. }) => Some(fallback()),
            // Unresolvable: lower-precedence sources show through
            Err(_) => None,
        };

        let next = match next {
            Some(value) => match self.check_write(target, property, &value) {
                Ok(()) => Some(value),
                Err(err) => {
                    tracing::warn!("binding value rejected by {}: {}", property.qualified_name(), err);
                    let fallback = self
                        .bindings
                        .get(id)
                        .and_then(|entry| entry.spec.fallback.clone())
                        .filter(|v| self.check_write(target, property, v).is_ok());
                    Some(fallback.unwrap_or_else(|| property.default_value().clone()))
                }
            },
            None => None,
        };

        self.with_target_update(id, |tree| {
            tree.write_source(target, property, channel, next);
        });
    }

    /// Push the target's effective value to the source leaf
    fn push_to_source(&mut self, id: BindingId) {
        let Some(entry) = self.bindings.get(id) else {
            return;
        };
        let Some((source, source_property)) = entry.leaf() else {
            tracing::debug!("binding on {:?} has no source to update", entry.target);
            return;
        };
        let target = entry.target;
        let property = entry.property;
        let channel = entry.channel;
        let mode = entry.mode;
        let target_value = self.get(target, property);

        let value = match &entry.spec.converter {
            Some(converter) => match converter.convert_back(&target_value) {
                Ok(value) => value,
                Err(reason) => {
                    tracing::warn!(
                        "convert_back failed for {}: {}",
                        source_property.qualified_name(),
                        reason
                    );
                    return;
                }
            },
            None => target_value.clone(),
        };

        if let Err(err) = self.check_write(source, source_property, &value) {
            tracing::warn!("source update rejected by {}: {}", source_property.qualified_name(), err);
            return;
        }

        if let Some(entry) = self.bindings.get_mut(id) {
            entry.updating_source = true;
            entry.source_dirty = false;
        }
        self.write_source(source, source_property, ValueSource::Local, Some(value));
        if let Some(entry) = self.bindings.get_mut(id) {
            entry.updating_source = false;
        }

        // Keep the binding's own channel in step with what the source now holds
        if mode == BindingMode::TwoWay {
            self.with_target_update(id, |tree| {
                tree.write_source(target, property, channel, Some(target_value));
            });
        }
    }

    fn with_target_update(&mut self, id: BindingId, write: impl FnOnce(&mut ElementTree)) {
        if let Some(entry) = self.bindings.get_mut(id) {
            entry.updating_target = true;
        }
        write(self);
        if let Some(entry) = self.bindings.get_mut(id) {
            entry.updating_target = false;
        }
    }

    // =========================================================================
    // Change propagation
    // =========================================================================

    /// Bindings reading the changed slot, then write-back from a bound target
    pub(crate) fn propagate_to_bindings(&mut self, change: &PropertyChange) {
        let key = (change.object, change.property.id());
        let readers: SmallVec<[BindingId; 2]> = self.dependents.get(&key).cloned().unwrap_or_default();
        for id in readers {
            self.on_source_changed(id, key);
        }

        if let Some(id) = self.binding_of(change.object, change.property) {
            self.on_target_changed(id, change);
        }
    }

    fn on_source_changed(&mut self, id: BindingId, key: (ObjectId, PropertyId)) {
        let Some(entry) = self.bindings.get(id) else {
            return;
        };
        if entry.updating_source {
            return;
        }
        let is_leaf = entry
            .leaf()
            .is_some_and(|(object, property)| (object, property.id()) == key);

        if !is_leaf {
            self.activate_binding(id);
        } else if entry.mode.writes_target() {
            let value = self.get(key.0, entry.links[entry.links.len() - 1].1);
            self.transfer_to_target(id, Ok(value));
        }
    }

    fn on_target_changed(&mut self, id: BindingId, change: &PropertyChange) {
        let Some(entry) = self.bindings.get_mut(id) else {
            return;
        };
        if !entry.mode.writes_source() || entry.updating_target || change.new_source != ValueSource::Local {
            return;
        }
        match entry.trigger {
            UpdateSourceTrigger::PropertyChanged | UpdateSourceTrigger::Default => self.push_to_source(id),
            UpdateSourceTrigger::LostFocus | UpdateSourceTrigger::Explicit => entry.source_dirty = true,
        }
    }

    // =========================================================================
    // Deferred source updates
    // =========================================================================

    /// Push a TwoWay / OneWayToSource binding's target value to its source now
    pub fn update_source(&mut self, id: BindingId) -> bool {
        match self.bindings.get(id) {
            Some(entry) if entry.mode.writes_source() => {
                self.push_to_source(id);
                true
            }
            _ => false,
        }
    }

    /// Flush pending LostFocus updates of bindings targeting `object`
    pub fn notify_lost_focus(&mut self, object: ObjectId) {
        let pending: SmallVec<[BindingId; 2]> = match self.store(object) {
            Some(store) => store
                .properties()
                .filter_map(|p| store.slot(p).and_then(|slot| slot.binding()))
                .filter(|id| {
                    self.bindings.get(*id).is_some_and(|entry| {
                        entry.trigger == UpdateSourceTrigger::LostFocus && entry.source_dirty
                    })
                })
                .collect(),
            None => return,
        };
        for id in pending {
            self.push_to_source(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::{create_solid_brush, SOLID_COLOR_BRUSH_COLOR};
    use crate::object_type::{ObjectType, CONTROL, FRAMEWORK_ELEMENT};
    use crate::primitives::Color;
    use crate::registry::{PropertyMetadata, PropertyRegistry};
    use crate::value::ValueType;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::LazyLock;

    static NODE: ObjectType = ObjectType::element("BindingTestNode", &CONTROL);
    static PERSON: ObjectType = ObjectType::data("BindingTestPerson", &crate::object_type::DEPENDENCY_OBJECT);

    static X: LazyLock<Property> = LazyLock::new(|| {
        PropertyRegistry::global()
            .register("X", ValueType::Int, &NODE, PropertyMetadata::new().default_value(-1i64))
            .unwrap()
    });

    static TEXT: LazyLock<Property> = LazyLock::new(|| {
        PropertyRegistry::global()
            .register(
                "Text",
                ValueType::String,
                &NODE,
                PropertyMetadata::new().binds_two_way_by_default(),
            )
            .unwrap()
    });

    static FILL: LazyLock<Property> = LazyLock::new(|| {
        PropertyRegistry::global()
            .register("Fill", ValueType::Brush, &NODE, PropertyMetadata::new())
            .unwrap()
    });

    static TINT: LazyLock<Property> = LazyLock::new(|| {
        PropertyRegistry::global()
            .register("Tint", ValueType::Color, &NODE, PropertyMetadata::new())
            .unwrap()
    });

    static NAME: LazyLock<Property> = LazyLock::new(|| {
        PropertyRegistry::global()
            .register("Name", ValueType::String, &PERSON, PropertyMetadata::new())
            .unwrap()
    });

    fn count_changes(tree: &mut ElementTree, id: ObjectId, property: Property) -> Rc<Cell<usize>> {
        let count = Rc::new(Cell::new(0));
        let sink = count.clone();
        tree.subscribe(id, property, move |_, _| sink.set(sink.get() + 1))
            .unwrap();
        count
    }

    struct Doubler;

    impl ValueConverter for Doubler {
        fn convert(&self, value: &Value) -> std::result::Result<Value, String> {
            match value {
                Value::Int(n) => Ok(Value::Int(n * 2)),
                other => Err(format!("cannot double {other}")),
            }
        }

        fn convert_back(&self, value: &Value) -> std::result::Result<Value, String> {
            match value {
                Value::Int(n) => Ok(Value::Int(n / 2)),
                other => Err(format!("cannot halve {other}")),
            }
        }
    }

    struct Rejecting;

    impl ValueConverter for Rejecting {
        fn convert(&self, _value: &Value) -> std::result::Result<Value, String> {
            Err("no".into())
        }
    }

    #[test]
    fn test_one_way_follows_source() {
        let mut tree = ElementTree::new();
        let a = tree.create(&NODE);
        let b = tree.create(&NODE);
        tree.set_binding(b, *X, Binding::to_property(a, *X)).unwrap();
        let events = count_changes(&mut tree, b, *X);

        tree.set_local(a, *X, 7i64).unwrap();
        assert_eq!(tree.get(b, *X), Value::Int(7));
        assert_eq!(tree.value_source(b, *X), ValueSource::LocalBinding);
        assert_eq!(events.get(), 1);

        tree.clear(a, *X);
        assert_eq!(tree.get(b, *X), Value::Int(-1));
    }

    #[test]
    fn test_local_value_shadows_binding() {
        let mut tree = ElementTree::new();
        let a = tree.create(&NODE);
        let b = tree.create(&NODE);
        tree.set_local(a, *X, 3i64).unwrap();
        tree.set_binding(b, *X, Binding::to_property(a, *X)).unwrap();
        tree.set_local(b, *X, 10i64).unwrap();
        assert_eq!(tree.get(b, *X), Value::Int(10));

        // OneWay: the source is untouched
        assert_eq!(tree.get(a, *X), Value::Int(3));
    }

    #[test]
    fn test_one_time_reads_once() {
        let mut tree = ElementTree::new();
        let a = tree.create(&NODE);
        let b = tree.create(&NODE);
        tree.set_local(a, *X, 1i64).unwrap();
        tree.set_binding(b, *X, Binding::to_property(a, *X).mode(BindingMode::OneTime))
            .unwrap();
        tree.set_local(a, *X, 2i64).unwrap();
        assert_eq!(tree.get(b, *X), Value::Int(1));
    }

    #[test]
    fn test_two_way_does_not_oscillate() {
        let mut tree = ElementTree::new();
        let a = tree.create(&NODE);
        let b = tree.create(&NODE);
        tree.set_binding(b, *X, Binding::to_property(a, *X).mode(BindingMode::TwoWay))
            .unwrap();
        let writes_a = count_changes(&mut tree, a, *X);
        let writes_b = count_changes(&mut tree, b, *X);

        tree.set_local(a, *X, 5i64).unwrap();
        assert_eq!(tree.get(b, *X), Value::Int(5));
        assert_eq!(writes_a.get() + writes_b.get(), 2);

        tree.set_local(b, *X, 9i64).unwrap();
        assert_eq!(tree.get(a, *X), Value::Int(9));
        assert_eq!(writes_a.get() + writes_b.get(), 4);
    }

    #[test]
    fn test_default_mode_from_metadata() {
        let mut tree = ElementTree::new();
        let a = tree.create(&NODE);
        let b = tree.create(&NODE);
        tree.set_binding(b, *TEXT, Binding::to_property(a, *TEXT)).unwrap();
        tree.set_local(b, *TEXT, "typed").unwrap();
        assert_eq!(tree.get(a, *TEXT), Value::string("typed"));
    }

    #[test]
    fn test_one_way_to_source() {
        let mut tree = ElementTree::new();
        let a = tree.create(&NODE);
        let b = tree.create(&NODE);
        tree.set_local(b, *X, 4i64).unwrap();
        tree.set_binding(b, *X, Binding::to_property(a, *X).mode(BindingMode::OneWayToSource))
            .unwrap();
        assert_eq!(tree.get(a, *X), Value::Int(4));

        tree.set_local(a, *X, 100i64).unwrap();
        assert_eq!(tree.get(b, *X), Value::Int(4));

        tree.set_local(b, *X, 6i64).unwrap();
        assert_eq!(tree.get(a, *X), Value::Int(6));
    }

    #[test]
    fn test_lost_focus_and_explicit_triggers() {
        let mut tree = ElementTree::new();
        let a = tree.create(&NODE);
        let b = tree.create(&NODE);
        let c = tree.create(&NODE);
        tree.set_binding(
            b,
            *X,
            Binding::to_property(a, *X)
                .mode(BindingMode::TwoWay)
                .trigger(UpdateSourceTrigger::LostFocus),
        )
        .unwrap();
        let explicit = tree
            .set_binding(
                c,
                *X,
                Binding::to_property(a, *X)
                    .mode(BindingMode::TwoWay)
                    .trigger(UpdateSourceTrigger::Explicit),
            )
            .unwrap();

        tree.set_local(b, *X, 8i64).unwrap();
        assert_eq!(tree.get(a, *X), Value::Int(-1));
        tree.notify_lost_focus(b);
        assert_eq!(tree.get(a, *X), Value::Int(8));

        tree.set_local(c, *X, 11i64).unwrap();
        tree.notify_lost_focus(c);
        assert_eq!(tree.get(a, *X), Value::Int(8));
        assert!(tree.update_source(explicit));
        assert_eq!(tree.get(a, *X), Value::Int(11));
    }

    #[test]
    fn test_replacing_binding_keeps_one_per_slot() {
        let mut tree = ElementTree::new();
        let a = tree.create(&NODE);
        let a2 = tree.create(&NODE);
        let b = tree.create(&NODE);
        tree.set_local(a, *X, 1i64).unwrap();
        tree.set_local(a2, *X, 2i64).unwrap();
        let first = tree.set_binding(b, *X, Binding::to_property(a, *X)).unwrap();
        let second = tree.set_binding(b, *X, Binding::to_property(a2, *X)).unwrap();

        assert!(tree.binding(first).is_none());
        assert_eq!(tree.binding_of(b, *X), Some(second));
        assert_eq!(tree.get(b, *X), Value::Int(2));

        tree.set_local(a, *X, 50i64).unwrap();
        assert_eq!(tree.get(b, *X), Value::Int(2));

        assert!(tree.clear_binding(b, *X));
        assert_eq!(tree.get(b, *X), Value::Int(-1));
        assert!(!tree.clear_binding(b, *X));
    }

    #[test]
    fn test_path_binding_re_resolves_intermediate() {
        let mut tree = ElementTree::new();
        let source = tree.create(&NODE);
        let target = tree.create(&NODE);
        let red = create_solid_brush(&mut tree, Color::RED);
        let blue = create_solid_brush(&mut tree, Color::BLUE);

        let id = tree
            .set_binding(target, *TINT, Binding::to_object(source, "Fill.Color"))
            .unwrap();
        assert!(matches!(
            tree.binding_status(id),
            Some(BindingStatus::Inactive(BindingError::NullIntermediate { .. }))
        ));
        assert_eq!(tree.get(target, *TINT), Value::Color(Color::TRANSPARENT));

        tree.set_local(source, *FILL, red).unwrap();
        assert_eq!(tree.binding_status(id), Some(BindingStatus::Active));
        assert_eq!(tree.get(target, *TINT), Value::Color(Color::RED));

        tree.set_local(red, *SOLID_COLOR_BRUSH_COLOR, Color::GREEN).unwrap();
        assert_eq!(tree.get(target, *TINT), Value::Color(Color::GREEN));

        tree.set_local(source, *FILL, blue).unwrap();
        assert_eq!(tree.get(target, *TINT), Value::Color(Color::BLUE));

        // The old brush is no longer watched
        tree.set_local(red, *SOLID_COLOR_BRUSH_COLOR, Color::WHITE).unwrap();
        assert_eq!(tree.get(target, *TINT), Value::Color(Color::BLUE));
    }

    #[test]
    fn test_unresolvable_path_is_inactive() {
        let mut tree = ElementTree::new();
        let source = tree.create(&NODE);
        let target = tree.create(&NODE);
        tree.set_style_value(target, *X, 12i64).unwrap();

        let id = tree
            .set_binding(target, *X, Binding::to_object(source, "DoesNotExist"))
            .unwrap();
        assert!(matches!(
            tree.binding_status(id),
            Some(BindingStatus::Inactive(BindingError::PathResolutionFailed { .. }))
        ));
        assert_eq!(tree.get(target, *X), Value::Int(12));
    }

    #[test]
    fn test_removed_source_deactivates_binding() {
        let mut tree = ElementTree::new();
        let a = tree.create(&NODE);
        let b = tree.create(&NODE);
        tree.set_local(a, *X, 3i64).unwrap();
        let id = tree.set_binding(b, *X, Binding::to_property(a, *X)).unwrap();

        tree.remove(a);
        assert_eq!(tree.binding_status(id), Some(BindingStatus::Inactive(BindingError::SourceMissing)));
        assert_eq!(tree.get(b, *X), Value::Int(-1));
    }

    #[test]
    fn test_removed_target_detaches_binding() {
        let mut tree = ElementTree::new();
        let a = tree.create(&NODE);
        let b = tree.create(&NODE);
        let id = tree.set_binding(b, *X, Binding::to_property(a, *X)).unwrap();
        tree.remove(b);
        assert!(tree.binding(id).is_none());
        tree.set_local(a, *X, 1i64).unwrap();
    }

    #[test]
    fn test_converter_and_fallback() {
        let mut tree = ElementTree::new();
        let a = tree.create(&NODE);
        let b = tree.create(&NODE);
        let c = tree.create(&NODE);
        tree.set_local(a, *X, 4i64).unwrap();

        tree.set_binding(
            b,
            *X,
            Binding::to_property(a, *X).mode(BindingMode::TwoWay).converter(Doubler),
        )
        .unwrap();
        assert_eq!(tree.get(b, *X), Value::Int(8));
        tree.set_local(b, *X, 20i64).unwrap();
        assert_eq!(tree.get(a, *X), Value::Int(10));

        tree.set_binding(c, *X, Binding::to_property(a, *X).converter(Rejecting).fallback(0i64))
            .unwrap();
        assert_eq!(tree.get(c, *X), Value::Int(0));
    }

    #[test]
    fn test_mistyped_source_uses_default() {
        let mut tree = ElementTree::new();
        let a = tree.create(&NODE);
        let b = tree.create(&NODE);
        tree.set_local(a, *TEXT, "seven").unwrap();
        tree.set_binding(b, *X, Binding::to_property(a, *TEXT)).unwrap();
        assert_eq!(tree.get(b, *X), Value::Int(-1));
    }

    #[test]
    fn test_template_binding_reads_templated_parent() {
        let mut tree = ElementTree::new();
        let control = tree.create(&NODE);
        let part = tree.create(&NODE);
        tree.set_local(control, *X, 42i64).unwrap();

        let id = tree.set_binding(part, *X, Binding::template(*X).mode(BindingMode::TwoWay)).unwrap();
        assert_eq!(
            tree.binding_status(id),
            Some(BindingStatus::Inactive(BindingError::TemplatedParentMissing))
        );

        tree.set_templated_parent(part, Some(control));
        tree.refresh_bindings(part);
        assert_eq!(tree.get(part, *X), Value::Int(42));
        assert_eq!(tree.value_source(part, *X), ValueSource::TemplateBinding);

        // Always OneWay
        tree.set_local(part, *X, 1i64).unwrap();
        assert_eq!(tree.get(control, *X), Value::Int(42));

        // clear() leaves template bindings alone
        tree.clear(part, *X);
        assert_eq!(tree.get(part, *X), Value::Int(42));
    }

    #[test]
    fn test_data_context_binding() {
        let mut tree = ElementTree::new();
        let root = tree.create(&NODE);
        let label = tree.create(&NODE);
        tree.add_child(root, label).unwrap();
        tree.set_binding(label, *TEXT, Binding::to_data_context("Name").mode(BindingMode::OneWay))
            .unwrap();

        let alice = tree.create(&PERSON);
        tree.set_local(alice, *NAME, "Alice").unwrap();
        tree.set_local(root, *DATA_CONTEXT, alice).unwrap();
        assert_eq!(tree.get(label, *TEXT), Value::string("Alice"));

        let bob = tree.create(&PERSON);
        tree.set_local(bob, *NAME, "Bob").unwrap();
        tree.set_local(root, *DATA_CONTEXT, bob).unwrap();
        assert_eq!(tree.get(label, *TEXT), Value::string("Bob"));

        tree.set_local(bob, *NAME, "Robert").unwrap();
        assert_eq!(tree.get(label, *TEXT), Value::string("Robert"));
    }

    #[test]
    fn test_brush_reference_binding_with_element_source() {
        static PANEL: ObjectType = ObjectType::element("BindingTestPanel", &FRAMEWORK_ELEMENT);
        let mut tree = ElementTree::new();
        let a = tree.create(&NODE);
        let b = tree.create(&NODE);
        let panel = tree.create(&PANEL);
        let brush = create_solid_brush(&mut tree, Color::RED);
        tree.set_binding(b, *FILL, Binding::to_property(a, *FILL)).unwrap();

        tree.set_local(a, *FILL, brush).unwrap();
        assert_eq!(tree.get(b, *FILL), Value::Object(brush));

        // An element reference never reaches a brush slot
        assert!(tree.set_local(a, *FILL, panel).is_err());
        assert_eq!(tree.get(b, *FILL), Value::Object(brush));
    }
}
