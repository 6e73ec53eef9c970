//! Element tree arena
//!
//! Every object (elements, brushes, data objects) lives in one generational
//! arena owned by an [`ElementTree`]. An [`ObjectId`] is an
//! `{index, generation}` handle: once the object is removed the handle goes
//! stale, and [`ElementTree::contains`] reports it. Bindings and animations
//! hold plain `ObjectId`s and check liveness before touching a target.
//!
//! The tree also owns notification. A write to any value source goes through
//! the object's [`AttributeStore`]; if the effective value or source changed,
//! the tree dispatches, in order:
//!
//! 1. the descriptor's change callback
//! 2. listeners registered with [`ElementTree::subscribe`]
//! 3. bindings that read the slot
//! 4. write-back of a TwoWay / OneWayToSource binding targeting the slot
//! 5. value inheritance to logical children
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use std::sync::LazyLock;
//! use trellis_core::object_type::{ObjectType, FRAMEWORK_ELEMENT};
//! use trellis_core::registry::{Property, PropertyMetadata, DependencyProperty};
//! use trellis_core::tree::ElementTree;
//! use trellis_core::value::{Value, ValueType};
//!
//! static LABEL: ObjectType = ObjectType::element("DocLabel", &FRAMEWORK_ELEMENT);
//! static OPACITY: LazyLock<Property> = LazyLock::new(|| {
//!     DependencyProperty::register(
//!         "Opacity",
//!         ValueType::Double,
//!         &LABEL,
//!         PropertyMetadata::new().default_value(1.0),
//!     )
//!     .unwrap()
//! });
//!
//! let mut tree = ElementTree::new();
//! let label = tree.create(&LABEL);
//!
//! let changes = Rc::new(Cell::new(0));
//! let counter = changes.clone();
//! tree.subscribe(label, *OPACITY, move |_, _| counter.set(counter.get() + 1)).unwrap();
//!
//! tree.set_local(label, *OPACITY, 0.5).unwrap();
//! tree.set_local(label, *OPACITY, 0.5).unwrap();
//! assert_eq!(tree.get(label, *OPACITY), Value::Double(0.5));
//! assert_eq!(changes.get(), 1);
//! ```

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::any::{Any, TypeId};
use std::rc::Rc;
use std::sync::LazyLock;

use crate::binding::{BindingEntry, BindingId};
use crate::brush::SOLID_COLOR_BRUSH_COLOR;
use crate::config::TrellisConfig;
use crate::error::{PropertyError, Result};
use crate::framework::DATA_CONTEXT;
use crate::object_type::{ObjectKind, ObjectType};
use crate::registry::{Property, PropertyId, PropertyRegistry};
use crate::store::{AttributeStore, Listener, PropertyChange, ValueSource};
use crate::value::{FromValue, Value, ValueType};

new_key_type! {
    /// Generational handle to an object in an [`ElementTree`]
    pub struct ObjectId;
}

/// Identifies one listener on one slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Handle returned by [`ElementTree::subscribe`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Subscription {
    pub object: ObjectId,
    pub property: Property,
    pub id: SubscriptionId,
}

type SlotKey = (ObjectId, PropertyId);

struct ObjectNode {
    object_type: &'static ObjectType,
    name: Option<String>,
    parent: Option<ObjectId>,
    children: SmallVec<[ObjectId; 4]>,
    templated_parent: Option<ObjectId>,
    store: AttributeStore,
    /// Present on name scope roots
    name_index: Option<FxHashMap<String, ObjectId>>,
    attached: FxHashMap<TypeId, Rc<dyn Any>>,
    /// Objects removed together with this one (brushes it created)
    owned: SmallVec<[ObjectId; 2]>,
}

impl ObjectNode {
    fn new(object_type: &'static ObjectType, name: Option<String>) -> Self {
        Self {
            object_type,
            name,
            parent: None,
            children: SmallVec::new(),
            templated_parent: None,
            store: AttributeStore::new(),
            name_index: None,
            attached: FxHashMap::default(),
            owned: SmallVec::new(),
        }
    }
}

/// Arena of objects plus the binding graph that links their properties
pub struct ElementTree {
    objects: SlotMap<ObjectId, ObjectNode>,
    pub(crate) bindings: SlotMap<BindingId, BindingEntry>,
    /// Bindings that read a slot, keyed by the slot
    pub(crate) dependents: FxHashMap<SlotKey, SmallVec<[BindingId; 2]>>,
    /// Slots whose notification is in flight
    notifying: FxHashSet<SlotKey>,
    /// In-flight slots written again during their own notification
    trailing: FxHashSet<SlotKey>,
    next_subscription: u64,
    config: TrellisConfig,
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementTree {
    /// Empty tree using the global registry and default configuration
    pub fn new() -> Self {
        Self::with_config(TrellisConfig::default())
    }

    pub fn with_config(config: TrellisConfig) -> Self {
        // Built-in properties must be registered before paths name them
        LazyLock::force(&SOLID_COLOR_BRUSH_COLOR);
        LazyLock::force(&DATA_CONTEXT);
        Self {
            objects: SlotMap::with_key(),
            bindings: SlotMap::with_key(),
            dependents: FxHashMap::default(),
            notifying: FxHashSet::default(),
            trailing: FxHashSet::default(),
            next_subscription: 1,
            config,
        }
    }

    /// Registry used to resolve property names in paths
    pub fn registry(&self) -> &'static PropertyRegistry {
        PropertyRegistry::global()
    }

    pub fn config(&self) -> &TrellisConfig {
        &self.config
    }

    // =========================================================================
    // Objects
    // =========================================================================

    /// Create a detached object
    pub fn create(&mut self, object_type: &'static ObjectType) -> ObjectId {
        self.objects.insert(ObjectNode::new(object_type, None))
    }

    /// Create a detached object with a name for `find_by_name`
    pub fn create_named(&mut self, object_type: &'static ObjectType, name: impl Into<String>) -> ObjectId {
        self.objects
            .insert(ObjectNode::new(object_type, Some(name.into())))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn object_type(&self, id: ObjectId) -> Option<&'static ObjectType> {
        self.objects.get(id).map(|node| node.object_type)
    }

    pub fn name(&self, id: ObjectId) -> Option<&str> {
        self.objects.get(id).and_then(|node| node.name.as_deref())
    }

    pub fn set_name(&mut self, id: ObjectId, name: impl Into<String>) {
        if let Some(node) = self.objects.get_mut(id) {
            node.name = Some(name.into());
        }
    }

    /// Remove an object, its whole subtree and every object they own
    ///
    /// Bindings targeting removed objects are detached. Bindings reading from
    /// them go inactive. Attached data is dropped with the objects.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        if !self.contains(id) {
            return false;
        }

        let mut removed = vec![id];
        let mut next = 0;
        while next < removed.len() {
            let object = removed[next];
            next += 1;
            let Some(node) = self.objects.get(object) else {
                continue;
            };
            for other in node.children.iter().chain(node.owned.iter()) {
                if self.contains(*other) && !removed.contains(other) {
                    removed.push(*other);
                }
            }
        }

        for object in &removed {
            if let Some(parent) = self.parent(*object) {
                if removed.contains(&parent) {
                    continue;
                }
                if let Some(node) = self.objects.get_mut(parent) {
                    node.children.retain(|c| *c != *object);
                }
            }
        }

        for object in &removed {
            self.detach_bindings_of(*object);
        }

        let mut affected: SmallVec<[BindingId; 4]> = SmallVec::new();
        for (key, ids) in &self.dependents {
            if removed.contains(&key.0) {
                for binding in ids {
                    if !affected.contains(binding) {
                        affected.push(*binding);
                    }
                }
            }
        }
        for object in &removed {
            self.objects.remove(*object);
        }

        tracing::debug!("removed {} object(s)", removed.len());

        for binding in affected {
            self.activate_binding(binding);
        }
        self.dependents
            .retain(|key, ids| !ids.is_empty() && !removed.contains(&key.0));
        true
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    pub fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.objects.get(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: ObjectId) -> &[ObjectId] {
        self.objects
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Append `child` to `parent`, detaching it from any previous parent
    pub fn add_child(&mut self, parent: ObjectId, child: ObjectId) -> Result<()> {
        if !self.contains(parent) || !self.contains(child) || parent == child {
            return Err(PropertyError::ObjectNotFound);
        }
        if let Some(previous) = self.parent(child) {
            if let Some(node) = self.objects.get_mut(previous) {
                node.children.retain(|c| *c != child);
            }
        }
        if let Some(node) = self.objects.get_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.objects.get_mut(child) {
            node.parent = Some(parent);
        }
        self.sync_inherited(child);
        Ok(())
    }

    /// Detach `child` from `parent`; returns false if it was not a child
    pub fn remove_child(&mut self, parent: ObjectId, child: ObjectId) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        if let Some(node) = self.objects.get_mut(parent) {
            node.children.retain(|c| *c != child);
        }
        if let Some(node) = self.objects.get_mut(child) {
            node.parent = None;
        }
        self.sync_inherited(child);
        true
    }

    /// Pre-order iterator over the subtree below `root` (excluding `root`)
    pub fn descendants(&self, root: ObjectId) -> Descendants<'_> {
        let mut stack: Vec<ObjectId> = self.children(root).to_vec();
        stack.reverse();
        Descendants { tree: self, stack }
    }

    pub fn set_templated_parent(&mut self, id: ObjectId, templated_parent: Option<ObjectId>) {
        if let Some(node) = self.objects.get_mut(id) {
            node.templated_parent = templated_parent;
        }
    }

    pub fn templated_parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.objects
            .get(id)
            .and_then(|node| node.templated_parent)
            .filter(|parent| self.contains(*parent))
    }

    /// Tie `owned`'s lifetime to `owner`: removing `owner` removes it too
    pub fn set_owner(&mut self, owned: ObjectId, owner: ObjectId) -> bool {
        if !self.contains(owned) || owned == owner {
            return false;
        }
        match self.objects.get_mut(owner) {
            Some(node) => {
                if !node.owned.contains(&owned) {
                    node.owned.push(owned);
                }
                true
            }
            None => false,
        }
    }

    /// Live objects owned by `id`
    pub fn owned(&self, id: ObjectId) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects
            .get(id)
            .into_iter()
            .flat_map(|node| node.owned.iter().copied())
            .filter(|owned| self.contains(*owned))
    }

    // =========================================================================
    // Name scopes
    // =========================================================================

    /// Index every named object in `root`'s subtree (including `root`)
    ///
    /// The first object with a given name wins.
    pub fn register_name_scope(&mut self, root: ObjectId) {
        if !self.contains(root) {
            return;
        }
        let mut index = FxHashMap::default();
        for id in std::iter::once(root).chain(self.descendants(root)) {
            if let Some(name) = self.name(id) {
                if index.contains_key(name) {
                    tracing::warn!("duplicate name '{}' in name scope; keeping the first", name);
                    continue;
                }
                index.insert(name.to_string(), id);
            }
        }
        if let Some(node) = self.objects.get_mut(root) {
            node.name_index = Some(index);
        }
    }

    /// Find a named object in `root`'s subtree
    pub fn find_by_name(&self, root: ObjectId, name: &str) -> Option<ObjectId> {
        let node = self.objects.get(root)?;
        if let Some(index) = &node.name_index {
            return index.get(name).copied().filter(|id| self.contains(*id));
        }
        std::iter::once(root)
            .chain(self.descendants(root))
            .find(|id| self.name(*id) == Some(name))
    }

    // =========================================================================
    // Attached data
    // =========================================================================

    /// Attach a value keyed by its type; replaces any previous one
    pub fn set_attached<T: Any>(&mut self, id: ObjectId, value: Rc<T>) -> bool {
        match self.objects.get_mut(id) {
            Some(node) => {
                node.attached.insert(TypeId::of::<T>(), value);
                true
            }
            None => false,
        }
    }

    pub fn attached<T: Any>(&self, id: ObjectId) -> Option<Rc<T>> {
        self.objects
            .get(id)?
            .attached
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    pub fn take_attached<T: Any>(&mut self, id: ObjectId) -> Option<Rc<T>> {
        self.objects
            .get_mut(id)?
            .attached
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
    }

    // =========================================================================
    // Property access
    // =========================================================================

    pub fn store(&self, id: ObjectId) -> Option<&AttributeStore> {
        self.objects.get(id).map(|node| &node.store)
    }

    pub(crate) fn store_mut(&mut self, id: ObjectId) -> Option<&mut AttributeStore> {
        self.objects.get_mut(id).map(|node| &mut node.store)
    }

    /// Effective value, or the default for unknown objects
    pub fn get(&self, id: ObjectId, property: Property) -> Value {
        match self.objects.get(id) {
            Some(node) => node.store.get(property),
            None => property.default_value().clone(),
        }
    }

    pub fn get_as<T: FromValue>(&self, id: ObjectId, property: Property) -> Option<T> {
        T::from_value(&self.get(id, property))
    }

    pub fn value_source(&self, id: ObjectId, property: Property) -> ValueSource {
        self.objects
            .get(id)
            .map(|node| node.store.value_source(property))
            .unwrap_or(ValueSource::Default)
    }

    /// Effective value ignoring the Animated source
    pub fn base_value(&self, id: ObjectId, property: Property) -> Value {
        match self.objects.get(id) {
            Some(node) => node.store.base_value(property),
            None => property.default_value().clone(),
        }
    }

    /// Type, validation and reference-kind checks for a write
    pub fn check_write(&self, id: ObjectId, property: Property, value: &Value) -> Result<()> {
        if !self.contains(id) {
            return Err(PropertyError::ObjectNotFound);
        }
        property.check_value(value)?;

        if let Value::Object(target) = value {
            let expected = match property.value_type() {
                ValueType::Brush => Some(ObjectKind::Brush),
                ValueType::Element => Some(ObjectKind::Element),
                ValueType::Object => None,
                _ => return Ok(()),
            };
            let target_type = self
                .object_type(*target)
                .ok_or(PropertyError::ObjectNotFound)?;
            if let Some(kind) = expected {
                if target_type.kind() != kind {
                    return Err(PropertyError::TypeMismatch {
                        property: property.qualified_name(),
                        expected: property.value_type().to_string(),
                        found: target_type.name(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Set the Local value. On failure the slot is unchanged.
    pub fn set_local(&mut self, id: ObjectId, property: Property, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.check_write(id, property, &value)?;
        self.write_source(id, property, ValueSource::Local, Some(value));
        Ok(())
    }

    /// Alias for [`set_local`](Self::set_local)
    pub fn set(&mut self, id: ObjectId, property: Property, value: impl Into<Value>) -> Result<()> {
        self.set_local(id, property, value)
    }

    /// Clear the Local value and detach a non-template binding
    pub fn clear(&mut self, id: ObjectId, property: Property) {
        self.write_source(id, property, ValueSource::Local, None);
        if let Some(binding) = self.binding_of(id, property) {
            if !self.bindings[binding].is_template() {
                self.clear_binding(id, property);
            }
        }
    }

    pub fn set_style_value(&mut self, id: ObjectId, property: Property, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.check_write(id, property, &value)?;
        self.write_source(id, property, ValueSource::Style, Some(value));
        Ok(())
    }

    pub fn clear_style_value(&mut self, id: ObjectId, property: Property) {
        self.write_source(id, property, ValueSource::Style, None);
    }

    /// Set the Animated value (animation engine only)
    pub fn set_animated(&mut self, id: ObjectId, property: Property, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.check_write(id, property, &value)?;
        self.write_source(id, property, ValueSource::Animated, Some(value));
        Ok(())
    }

    pub fn clear_animated(&mut self, id: ObjectId, property: Property) {
        self.write_source(id, property, ValueSource::Animated, None);
    }

    /// Write one channel and notify on a net change
    pub(crate) fn write_source(
        &mut self,
        id: ObjectId,
        property: Property,
        source: ValueSource,
        value: Option<Value>,
    ) -> bool {
        let Some(node) = self.objects.get_mut(id) else {
            return false;
        };
        match node.store.write(id, property, source, value) {
            Some(change) => {
                self.notify(change);
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Listen for effective value / source changes on one slot
    pub fn subscribe<F>(&mut self, id: ObjectId, property: Property, callback: F) -> Result<Subscription>
    where
        F: Fn(&mut ElementTree, &PropertyChange) + 'static,
    {
        let subscription = SubscriptionId(self.next_subscription);
        let node = self
            .objects
            .get_mut(id)
            .ok_or(PropertyError::ObjectNotFound)?;
        self.next_subscription += 1;
        let listener: Listener = Rc::new(callback);
        node.store
            .slot_or_insert(property)
            .listeners
            .push((subscription, listener));
        Ok(Subscription {
            object: id,
            property,
            id: subscription,
        })
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let Some(store) = self.store_mut(subscription.object) else {
            return false;
        };
        let Some(slot) = store.slot_mut(subscription.property) else {
            return false;
        };
        let before = slot.listeners.len();
        slot.listeners.retain(|(id, _)| *id != subscription.id);
        let removed = slot.listeners.len() != before;
        store.compact(subscription.property);
        removed
    }

    // =========================================================================
    // Notification
    // =========================================================================

    fn notify(&mut self, change: PropertyChange) {
        let key = (change.object, change.property.id());
        if self.notifying.contains(&key) {
            tracing::debug!(
                "coalescing re-entrant write to {} on {:?}",
                change.property.qualified_name(),
                change.object
            );
            self.trailing.insert(key);
            return;
        }

        self.notifying.insert(key);
        let max_trailing = self.config.properties.max_trailing_notifications;
        let mut rounds = 0;
        let mut pending = Some(change);

        while let Some(change) = pending.take() {
            self.dispatch(&change);

            if !self.trailing.remove(&key) {
                break;
            }
            let Some(store) = self.store(change.object) else {
                break;
            };
            let current = store.get(change.property);
            let current_source = store.value_source(change.property);
            if current == change.new_value && current_source == change.new_source {
                break;
            }
            rounds += 1;
            if rounds > max_trailing {
                tracing::warn!(
                    "notification cycle on {} ({:?}); dropping further notifications",
                    change.property.qualified_name(),
                    change.object
                );
                break;
            }
            pending = Some(PropertyChange {
                object: change.object,
                property: change.property,
                old_value: change.new_value,
                new_value: current,
                old_source: change.new_source,
                new_source: current_source,
            });
        }

        self.trailing.remove(&key);
        self.notifying.remove(&key);
    }

    fn dispatch(&mut self, change: &PropertyChange) {
        if let Some(callback) = change.property.change_callback() {
            callback(self, change);
        }

        let listeners: SmallVec<[Listener; 2]> = self
            .store(change.object)
            .and_then(|store| store.slot(change.property))
            .map(|slot| slot.listeners.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();
        for listener in listeners {
            listener(self, change);
        }

        self.propagate_to_bindings(change);

        if change.property.inherits() {
            let children: SmallVec<[ObjectId; 4]> = self.children(change.object).into();
            let inherited = (change.new_source != ValueSource::Default).then(|| change.new_value.clone());
            for child in children {
                self.write_source(child, change.property, ValueSource::Inherited, inherited.clone());
            }
        }
    }

    /// Recompute `child`'s Inherited channels from its current parent
    fn sync_inherited(&mut self, child: ObjectId) {
        let parent = self.parent(child);
        let mut properties: SmallVec<[Property; 4]> = SmallVec::new();
        if let Some(store) = parent.and_then(|p| self.store(p)) {
            properties.extend(store.properties().filter(|p| p.inherits()));
        }
        if let Some(store) = self.store(child) {
            properties.extend(
                store
                    .properties()
                    .filter(|p| {
                        p.inherits()
                            && store
                                .slot(*p)
                                .and_then(|s| s.channel(ValueSource::Inherited))
                                .is_some()
                    }),
            );
        }
        properties.sort_by_key(|p| p.id());
        properties.dedup();

        for property in properties {
            let inherited = parent.and_then(|p| {
                let store = self.store(p)?;
                (store.value_source(property) != ValueSource::Default).then(|| store.get(property))
            });
            self.write_source(child, property, ValueSource::Inherited, inherited);
        }
    }
}

/// Pre-order subtree iterator driven by an explicit stack
pub struct Descendants<'a> {
    tree: &'a ElementTree,
    stack: Vec<ObjectId>,
}

impl Iterator for Descendants<'_> {
    type Item = ObjectId;

    fn next(&mut self) -> Option<ObjectId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}
