//! Per-object attribute store
//!
//! An [`AttributeStore`] is a sparse map from property id to [`Slot`]. Each
//! slot keeps one channel per [`ValueSource`] and materializes the effective
//! value from the highest-ranked non-empty channel:
//!
//! **Animated → Local → LocalBinding → TemplateBinding → Style → Inherited → Default**
//!
//! The store itself is pure bookkeeping: writes return the resulting
//! [`PropertyChange`] (if any) and the owning
//! [`ElementTree`](crate::tree::ElementTree) performs notification.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;

use crate::binding::BindingId;
use crate::registry::{Property, PropertyId};
use crate::tree::{ElementTree, ObjectId, SubscriptionId};
use crate::value::Value;

/// Where an effective value came from, ordered low to high by precedence
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueSource {
    Default,
    Inherited,
    Style,
    TemplateBinding,
    LocalBinding,
    Local,
    Animated,
}

impl ValueSource {
    /// Every non-default source, highest precedence first
    pub const RANKED: [ValueSource; 6] = [
        ValueSource::Animated,
        ValueSource::Local,
        ValueSource::LocalBinding,
        ValueSource::TemplateBinding,
        ValueSource::Style,
        ValueSource::Inherited,
    ];
}

/// A net change of a slot's effective value or source
#[derive(Clone, Debug)]
pub struct PropertyChange {
    pub object: ObjectId,
    pub property: Property,
    pub old_value: Value,
    pub new_value: Value,
    pub old_source: ValueSource,
    pub new_source: ValueSource,
}

/// Change listener registered through `ElementTree::subscribe`
pub type Listener = Rc<dyn Fn(&mut ElementTree, &PropertyChange)>;

/// Storage for one property on one object
pub struct Slot {
    property: Property,
    effective: Value,
    source: ValueSource,
    inherited: Option<Value>,
    style: Option<Value>,
    template_binding: Option<Value>,
    local_binding: Option<Value>,
    local: Option<Value>,
    animated: Option<Value>,
    /// Binding attached to this slot (at most one)
    pub(crate) binding: Option<BindingId>,
    pub(crate) listeners: SmallVec<[(SubscriptionId, Listener); 1]>,
}

impl Slot {
    fn new(property: Property) -> Self {
        Self {
            property,
            effective: property.default_value().clone(),
            source: ValueSource::Default,
            inherited: None,
            style: None,
            template_binding: None,
            local_binding: None,
            local: None,
            animated: None,
            binding: None,
            listeners: SmallVec::new(),
        }
    }

    pub fn property(&self) -> Property {
        self.property
    }

    pub fn effective(&self) -> &Value {
        &self.effective
    }

    pub fn source(&self) -> ValueSource {
        self.source
    }

    pub fn binding(&self) -> Option<BindingId> {
        self.binding
    }

    /// Value currently held by one channel
    pub fn channel(&self, source: ValueSource) -> Option<&Value> {
        match source {
            ValueSource::Default => Some(self.property.default_value()),
            ValueSource::Inherited => self.inherited.as_ref(),
            ValueSource::Style => self.style.as_ref(),
            ValueSource::TemplateBinding => self.template_binding.as_ref(),
            ValueSource::LocalBinding => self.local_binding.as_ref(),
            ValueSource::Local => self.local.as_ref(),
            ValueSource::Animated => self.animated.as_ref(),
        }
    }

    fn channel_mut(&mut self, source: ValueSource) -> Option<&mut Option<Value>> {
        match source {
            ValueSource::Default => None,
            ValueSource::Inherited => Some(&mut self.inherited),
            ValueSource::Style => Some(&mut self.style),
            ValueSource::TemplateBinding => Some(&mut self.template_binding),
            ValueSource::LocalBinding => Some(&mut self.local_binding),
            ValueSource::Local => Some(&mut self.local),
            ValueSource::Animated => Some(&mut self.animated),
        }
    }

    /// Highest-ranked non-empty channel
    fn winner(&self, skip_animated: bool) -> (Value, ValueSource) {
        ValueSource::RANKED
            .iter()
            .filter(|s| !(skip_animated && **s == ValueSource::Animated))
            .find_map(|s| self.channel(*s).map(|v| (v.clone(), *s)))
            .unwrap_or_else(|| (self.property.default_value().clone(), ValueSource::Default))
    }

    /// Value this slot would have without any animation
    pub fn base_value(&self) -> Value {
        self.winner(true).0
    }

    /// Recompute the effective value; returns the previous value and source if
    /// either changed
    fn recompute(&mut self) -> Option<(Value, ValueSource)> {
        let (value, source) = self.winner(false);
        if value == self.effective && source == self.source {
            return None;
        }
        let old_value = std::mem::replace(&mut self.effective, value);
        let old_source = std::mem::replace(&mut self.source, source);
        Some((old_value, old_source))
    }

    /// Nothing worth keeping: no channel, binding, or listener
    fn is_vacant(&self) -> bool {
        self.source == ValueSource::Default
            && self.binding.is_none()
            && self.listeners.is_empty()
            && ValueSource::RANKED.iter().all(|s| self.channel(*s).is_none())
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("property", &self.property.qualified_name())
            .field("effective", &self.effective)
            .field("source", &self.source)
            .field("binding", &self.binding)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Sparse property storage for one object
#[derive(Debug, Default)]
pub struct AttributeStore {
    slots: FxHashMap<PropertyId, Slot>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective value, or the default when no slot exists
    pub fn get(&self, property: Property) -> Value {
        self.slots
            .get(&property.id())
            .map(|slot| slot.effective.clone())
            .unwrap_or_else(|| property.default_value().clone())
    }

    pub fn value_source(&self, property: Property) -> ValueSource {
        self.slots
            .get(&property.id())
            .map(|slot| slot.source)
            .unwrap_or(ValueSource::Default)
    }

    /// Value without the Animated channel
    pub fn base_value(&self, property: Property) -> Value {
        self.slots
            .get(&property.id())
            .map(Slot::base_value)
            .unwrap_or_else(|| property.default_value().clone())
    }

    pub fn slot(&self, property: Property) -> Option<&Slot> {
        self.slots.get(&property.id())
    }

    pub(crate) fn slot_mut(&mut self, property: Property) -> Option<&mut Slot> {
        self.slots.get_mut(&property.id())
    }

    pub(crate) fn slot_or_insert(&mut self, property: Property) -> &mut Slot {
        self.slots
            .entry(property.id())
            .or_insert_with(|| Slot::new(property))
    }

    /// Properties that currently have a slot
    pub fn properties(&self) -> impl Iterator<Item = Property> + '_ {
        self.slots.values().map(|slot| slot.property)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Write (or clear, with `None`) one channel and recompute
    ///
    /// Returns the net change, if the effective value or source moved.
    pub fn write(
        &mut self,
        object: ObjectId,
        property: Property,
        source: ValueSource,
        value: Option<Value>,
    ) -> Option<PropertyChange> {
        if value.is_none() && !self.slots.contains_key(&property.id()) {
            return None;
        }

        let slot = self.slot_or_insert(property);
        let channel = slot.channel_mut(source)?;
        if *channel == value {
            return None;
        }
        *channel = value;

        let change = slot.recompute().map(|(old_value, old_source)| PropertyChange {
            object,
            property,
            old_value,
            new_value: slot.effective.clone(),
            old_source,
            new_source: slot.source,
        });

        if slot.is_vacant() {
            self.slots.remove(&property.id());
        }
        change
    }

    /// Drop the slot if it holds nothing
    pub(crate) fn compact(&mut self, property: Property) {
        if self
            .slots
            .get(&property.id())
            .is_some_and(Slot::is_vacant)
        {
            self.slots.remove(&property.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_type::{ObjectType, FRAMEWORK_ELEMENT};
    use crate::registry::{PropertyMetadata, PropertyRegistry};
    use crate::value::ValueType;
    use slotmap::KeyData;
    use std::sync::LazyLock;

    static STORE_TEST: ObjectType = ObjectType::element("StoreTestElement", &FRAMEWORK_ELEMENT);

    static OPACITY: LazyLock<Property> = LazyLock::new(|| {
        PropertyRegistry::global()
            .register(
                "Opacity",
                ValueType::Double,
                &STORE_TEST,
                PropertyMetadata::new().default_value(1.0),
            )
            .unwrap()
    });

    fn object() -> ObjectId {
        KeyData::from_ffi(1).into()
    }

    #[test]
    fn test_missing_slot_reads_default() {
        let store = AttributeStore::new();
        assert_eq!(store.get(*OPACITY), Value::Double(1.0));
        assert_eq!(store.value_source(*OPACITY), ValueSource::Default);
    }

    #[test]
    fn test_precedence_highest_channel_wins() {
        let mut store = AttributeStore::new();
        let o = object();

        store.write(o, *OPACITY, ValueSource::Style, Some(Value::Double(0.2)));
        assert_eq!(store.get(*OPACITY), Value::Double(0.2));

        store.write(o, *OPACITY, ValueSource::Local, Some(Value::Double(0.5)));
        store.write(o, *OPACITY, ValueSource::TemplateBinding, Some(Value::Double(0.3)));
        assert_eq!(store.get(*OPACITY), Value::Double(0.5));
        assert_eq!(store.value_source(*OPACITY), ValueSource::Local);

        store.write(o, *OPACITY, ValueSource::Animated, Some(Value::Double(0.9)));
        assert_eq!(store.get(*OPACITY), Value::Double(0.9));
        assert_eq!(store.base_value(*OPACITY), Value::Double(0.5));

        store.write(o, *OPACITY, ValueSource::Animated, None);
        store.write(o, *OPACITY, ValueSource::Local, None);
        assert_eq!(store.get(*OPACITY), Value::Double(0.3));
        assert_eq!(store.value_source(*OPACITY), ValueSource::TemplateBinding);
    }

    #[test]
    fn test_write_reports_net_change_only() {
        let mut store = AttributeStore::new();
        let o = object();

        let change = store
            .write(o, *OPACITY, ValueSource::Local, Some(Value::Double(0.5)))
            .unwrap();
        assert_eq!(change.old_value, Value::Double(1.0));
        assert_eq!(change.new_value, Value::Double(0.5));
        assert_eq!(change.old_source, ValueSource::Default);
        assert_eq!(change.new_source, ValueSource::Local);

        // Same value, same channel
        assert!(store
            .write(o, *OPACITY, ValueSource::Local, Some(Value::Double(0.5)))
            .is_none());

        // Shadowed channel
        assert!(store
            .write(o, *OPACITY, ValueSource::Style, Some(Value::Double(0.1)))
            .is_none());
    }

    #[test]
    fn test_source_change_with_equal_value_is_a_change() {
        let mut store = AttributeStore::new();
        let o = object();
        store.write(o, *OPACITY, ValueSource::Style, Some(Value::Double(0.5)));
        let change = store
            .write(o, *OPACITY, ValueSource::Local, Some(Value::Double(0.5)))
            .unwrap();
        assert_eq!(change.old_value, change.new_value);
        assert_eq!(change.new_source, ValueSource::Local);
    }

    #[test]
    fn test_clearing_everything_drops_slot() {
        let mut store = AttributeStore::new();
        let o = object();
        store.write(o, *OPACITY, ValueSource::Local, Some(Value::Double(0.5)));
        assert_eq!(store.len(), 1);
        let change = store.write(o, *OPACITY, ValueSource::Local, None).unwrap();
        assert_eq!(change.new_value, Value::Double(1.0));
        assert!(store.is_empty());
        assert!(store.write(o, *OPACITY, ValueSource::Local, None).is_none());
    }
}
