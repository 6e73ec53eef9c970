//! Dependency property registry
//!
//! Properties are registered once per `(owner type, name)` and live for the
//! rest of the process. Registration hands back a [`Property`], a
//! `&'static PropertyDescriptor`, which is the handle used everywhere else:
//!
//! ```rust
//! use trellis_core::object_type::{ObjectType, FRAMEWORK_ELEMENT};
//! use trellis_core::registry::{PropertyMetadata, PropertyRegistry};
//! use trellis_core::value::{Value, ValueType};
//!
//! static SLIDER: ObjectType = ObjectType::element("DocSlider", &FRAMEWORK_ELEMENT);
//!
//! let registry = PropertyRegistry::global();
//! let value = registry
//!     .register(
//!         "Value",
//!         ValueType::Double,
//!         &SLIDER,
//!         PropertyMetadata::new()
//!             .default_value(0.0)
//!             .validate(|v| v.as_double().is_some_and(|d| d >= 0.0)),
//!     )
//!     .unwrap();
//!
//! assert_eq!(value.default_value(), &Value::Double(0.0));
//! assert!(registry.register("Value", ValueType::Double, &SLIDER, PropertyMetadata::new()).is_err());
//! ```
//!
//! The index maps sit behind a single `RwLock`. Descriptors themselves are
//! immutable, so holders of a [`Property`] never touch the lock again. No
//! user code runs under the lock, so a poisoned lock still guards consistent
//! maps and is recovered rather than propagated.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::binding::UpdateSourceTrigger;
use crate::error::{PropertyError, Result};
use crate::object_type::ObjectType;
use crate::store::PropertyChange;
use crate::tree::ElementTree;
use crate::value::{Value, ValueType};

/// Handle to a registered property
pub type Property = &'static PropertyDescriptor;

/// Invoked after a property's effective value changes, before listeners
pub type PropertyChangedCallback = Arc<dyn Fn(&mut ElementTree, &PropertyChange) + Send + Sync>;

/// Returns `false` to reject a value
pub type ValidateCallback = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Process-wide unique property id, assigned monotonically
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(u64);

impl PropertyId {
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

/// Ids are unique across every registry in the process
static NEXT_PROPERTY_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// METADATA
// =============================================================================

/// Registration-time options for a property
#[derive(Clone, Default)]
pub struct PropertyMetadata {
    default_value: Option<Value>,
    change_callback: Option<PropertyChangedCallback>,
    validate_callback: Option<ValidateCallback>,
    inherits: bool,
    nullable: bool,
    binds_two_way_by_default: bool,
    default_update_trigger: UpdateSourceTrigger,
}

impl PropertyMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default value (falls back to the type's zero value)
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Callback run after the effective value changes
    pub fn on_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut ElementTree, &PropertyChange) + Send + Sync + 'static,
    {
        self.change_callback = Some(Arc::new(callback));
        self
    }

    /// Validation run on every write and on the default value
    pub fn validate<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validate_callback = Some(Arc::new(callback));
        self
    }

    /// Children inherit this property's effective value
    pub fn inherits(mut self) -> Self {
        self.inherits = true;
        self
    }

    /// Accept `Null` for value types
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Bindings with `BindingMode::Default` resolve to TwoWay
    pub fn binds_two_way_by_default(mut self) -> Self {
        self.binds_two_way_by_default = true;
        self
    }

    /// Trigger used by bindings with `UpdateSourceTrigger::Default`
    pub fn default_update_trigger(mut self, trigger: UpdateSourceTrigger) -> Self {
        self.default_update_trigger = trigger;
        self
    }
}

// =============================================================================
// DESCRIPTOR
// =============================================================================

/// Immutable description of a registered property
pub struct PropertyDescriptor {
    id: PropertyId,
    name: String,
    value_type: ValueType,
    owner: &'static ObjectType,
    default_value: Value,
    change_callback: Option<PropertyChangedCallback>,
    validate_callback: Option<ValidateCallback>,
    inherits: bool,
    nullable: bool,
    binds_two_way_by_default: bool,
    default_update_trigger: UpdateSourceTrigger,
    attached: bool,
}

impl PropertyDescriptor {
    pub fn id(&self) -> PropertyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn owner(&self) -> &'static ObjectType {
        self.owner
    }

    pub fn default_value(&self) -> &Value {
        &self.default_value
    }

    pub fn inherits(&self) -> bool {
        self.inherits
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn binds_two_way_by_default(&self) -> bool {
        self.binds_two_way_by_default
    }

    pub fn default_update_trigger(&self) -> UpdateSourceTrigger {
        self.default_update_trigger
    }

    pub fn change_callback(&self) -> Option<&PropertyChangedCallback> {
        self.change_callback.as_ref()
    }

    /// `Owner.Name`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner.name(), self.name)
    }

    /// Tag and validation check. Object-kind checks happen in the tree.
    pub fn check_value(&self, value: &Value) -> Result<()> {
        let tag_ok = self.value_type.accepts(value) || (self.nullable && value.is_null());
        if !tag_ok {
            return Err(PropertyError::TypeMismatch {
                property: self.qualified_name(),
                expected: self.value_type.to_string(),
                found: value.tag(),
            });
        }
        if let Some(validate) = &self.validate_callback {
            if !validate(value) {
                return Err(PropertyError::ValidationFailed {
                    property: self.qualified_name(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("id", &self.id)
            .field("name", &self.qualified_name())
            .field("value_type", &self.value_type)
            .field("attached", &self.attached)
            .finish()
    }
}

impl PartialEq for PropertyDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PropertyDescriptor {}

impl Hash for PropertyDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Default)]
struct RegistryInner {
    by_key: FxHashMap<(&'static str, String), Property>,
    by_id: FxHashMap<PropertyId, Property>,
    attached_by_name: FxHashMap<String, SmallVec<[Property; 1]>>,
}

/// Registry of property descriptors
#[derive(Default)]
pub struct PropertyRegistry {
    inner: RwLock<RegistryInner>,
}

static GLOBAL_REGISTRY: LazyLock<PropertyRegistry> = LazyLock::new(PropertyRegistry::new);

impl PropertyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> &'static PropertyRegistry {
        &GLOBAL_REGISTRY
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a property owned by `owner`
    pub fn register(
        &self,
        name: &str,
        value_type: ValueType,
        owner: &'static ObjectType,
        metadata: PropertyMetadata,
    ) -> Result<Property> {
        self.register_inner(name, value_type, owner, metadata, false)
    }

    /// Register an attached property, settable on any object
    pub fn register_attached(
        &self,
        name: &str,
        value_type: ValueType,
        owner: &'static ObjectType,
        metadata: PropertyMetadata,
    ) -> Result<Property> {
        self.register_inner(name, value_type, owner, metadata, true)
    }

    fn register_inner(
        &self,
        name: &str,
        value_type: ValueType,
        owner: &'static ObjectType,
        metadata: PropertyMetadata,
        attached: bool,
    ) -> Result<Property> {
        if name.trim().is_empty() {
            return Err(PropertyError::InvalidName {
                owner: owner.name(),
            });
        }

        let default_value = metadata
            .default_value
            .unwrap_or_else(|| value_type.zero());

        let mut descriptor = PropertyDescriptor {
            id: PropertyId(0),
            name: name.to_string(),
            value_type,
            owner,
            default_value,
            change_callback: metadata.change_callback,
            validate_callback: metadata.validate_callback,
            inherits: metadata.inherits,
            nullable: metadata.nullable,
            binds_two_way_by_default: metadata.binds_two_way_by_default,
            default_update_trigger: metadata.default_update_trigger,
            attached,
        };

        if let Err(err) = descriptor.check_value(&descriptor.default_value) {
            return Err(PropertyError::InvalidDefault {
                owner: owner.name(),
                name: name.to_string(),
                reason: err.to_string(),
            });
        }

        let mut inner = self.write();
        let key = (owner.name(), name.to_string());
        if inner.by_key.contains_key(&key) {
            return Err(PropertyError::AlreadyRegistered {
                owner: owner.name(),
                name: name.to_string(),
            });
        }

        descriptor.id = PropertyId(NEXT_PROPERTY_ID.fetch_add(1, Ordering::Relaxed));
        let property: Property = Box::leak(Box::new(descriptor));

        inner.by_key.insert(key, property);
        inner.by_id.insert(property.id, property);
        if attached {
            inner
                .attached_by_name
                .entry(name.to_string())
                .or_default()
                .push(property);
        }

        tracing::trace!("registered property {}", property.qualified_name());
        Ok(property)
    }

    /// Exact lookup by owner type and name
    pub fn lookup(&self, owner: &ObjectType, name: &str) -> Option<Property> {
        self.read()
            .by_key
            .get(&(owner.name(), name.to_string()))
            .copied()
    }

    /// Resolve `name` as seen from an object of type `object_type`
    ///
    /// Walks the type's base chain first, then falls back to an attached
    /// property registered under that name.
    pub fn find(&self, object_type: &ObjectType, name: &str) -> Option<Property> {
        let inner = self.read();
        for ty in object_type.ancestors() {
            if let Some(property) = inner.by_key.get(&(ty.name(), name.to_string())) {
                return Some(*property);
            }
        }
        inner
            .attached_by_name
            .get(name)
            .and_then(|candidates| candidates.first().copied())
    }

    pub fn by_id(&self, id: PropertyId) -> Option<Property> {
        self.read().by_id.get(&id).copied()
    }

    /// Number of registered properties
    pub fn len(&self) -> usize {
        self.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shortcuts onto the global registry
pub struct DependencyProperty;

impl DependencyProperty {
    pub fn register(
        name: &str,
        value_type: ValueType,
        owner: &'static ObjectType,
        metadata: PropertyMetadata,
    ) -> Result<Property> {
        PropertyRegistry::global().register(name, value_type, owner, metadata)
    }

    pub fn register_attached(
        name: &str,
        value_type: ValueType,
        owner: &'static ObjectType,
        metadata: PropertyMetadata,
    ) -> Result<Property> {
        PropertyRegistry::global().register_attached(name, value_type, owner, metadata)
    }

    pub fn lookup(owner: &ObjectType, name: &str) -> Option<Property> {
        PropertyRegistry::global().lookup(owner, name)
    }
}
