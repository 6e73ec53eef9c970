//! Styles and setters
//!
//! A [`Style`] is a list of property setters for one target type, optionally
//! based on another style. Applying a style writes every effective setter into
//! the Style channel of the object's attribute store, below Local values and
//! bindings. Effective setters merge the based-on chain with the derived
//! style's setters winning.
//!
//! A style seals on first apply; after that its setters are fixed.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use std::sync::LazyLock;
//! use trellis_core::{DependencyProperty, ElementTree, ObjectType, Property, PropertyMetadata, ValueType, CONTROL};
//! use trellis_visual::Style;
//!
//! static LABEL: ObjectType = ObjectType::element("DocStyleLabel", &CONTROL);
//! static FONT_SIZE: LazyLock<Property> = LazyLock::new(|| {
//!     DependencyProperty::register("FontSize", ValueType::Double, &LABEL, PropertyMetadata::new().default_value(12.0))
//!         .unwrap()
//! });
//!
//! let mut tree = ElementTree::new();
//! let label = tree.create(&LABEL);
//! let style = Rc::new(Style::new(&LABEL).setter(*FONT_SIZE, 18.0));
//! style.apply(&mut tree, label).unwrap();
//! assert_eq!(tree.get_as::<f64>(label, *FONT_SIZE), Some(18.0));
//! ```

use std::cell::Cell;
use std::rc::Rc;

use indexmap::IndexMap;
use trellis_core::{ElementTree, ObjectId, ObjectType, Property, PropertyError, PropertyId, Value};

use crate::error::{StyleError, StyleResult};

/// One `(property, value)` pair of a style
#[derive(Clone, Debug, PartialEq)]
pub struct Setter {
    property: Property,
    value: Value,
}

impl Setter {
    pub fn new(property: Property, value: impl Into<Value>) -> Self {
        Self {
            property,
            value: value.into(),
        }
    }

    pub fn property(&self) -> Property {
        self.property
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

pub struct Style {
    target_type: &'static ObjectType,
    based_on: Option<Rc<Style>>,
    setters: Vec<Setter>,
    sealed: Cell<bool>,
}

impl std::fmt::Debug for Style {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Style")
            .field("target_type", &self.target_type.name())
            .field("based_on", &self.based_on.as_ref().map(|s| s.target_type.name()))
            .field("setters", &self.setters.len())
            .field("sealed", &self.sealed.get())
            .finish()
    }
}

/// What an applied style left on an object
struct AppliedStyle {
    style: Rc<Style>,
    properties: Vec<Property>,
}

impl Style {
    pub fn new(target_type: &'static ObjectType) -> Self {
        Self {
            target_type,
            based_on: None,
            setters: Vec::new(),
            sealed: Cell::new(false),
        }
    }

    pub fn based_on(mut self, base: Rc<Style>) -> Self {
        self.based_on = Some(base);
        self
    }

    /// Builder form of [`add_setter`](Self::add_setter); invalid setters are
    /// logged and dropped
    pub fn setter(mut self, property: Property, value: impl Into<Value>) -> Self {
        if let Err(err) = self.add_setter(property, value) {
            tracing::warn!("dropping setter for {}: {}", property.qualified_name(), err);
        }
        self
    }

    /// Add or replace the setter for `property`
    pub fn add_setter(&mut self, property: Property, value: impl Into<Value>) -> StyleResult<()> {
        if self.sealed.get() {
            return Err(StyleError::Sealed);
        }
        let value = value.into();
        property.check_value(&value)?;
        match self.setters.iter_mut().find(|s| s.property == property) {
            Some(existing) => existing.value = value,
            None => self.setters.push(Setter { property, value }),
        }
        Ok(())
    }

    pub fn target_type(&self) -> &'static ObjectType {
        self.target_type
    }

    pub fn base(&self) -> Option<&Rc<Style>> {
        self.based_on.as_ref()
    }

    /// Setters declared on this style only
    pub fn setters(&self) -> &[Setter] {
        &self.setters
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.get()
    }

    /// Freeze this style and its based-on chain
    pub fn seal(&self) {
        self.sealed.set(true);
        if let Some(base) = &self.based_on {
            base.seal();
        }
    }

    /// Setters of the whole based-on chain; a derived setter replaces the
    /// base one in place
    pub fn effective_setters(&self) -> IndexMap<PropertyId, Setter> {
        let mut merged = match &self.based_on {
            Some(base) => base.effective_setters(),
            None => IndexMap::new(),
        };
        for setter in &self.setters {
            merged.insert(setter.property.id(), setter.clone());
        }
        merged
    }

    /// Every style in the based-on chain must target a base of the derived
    /// target type
    fn check_chain(&self) -> StyleResult<()> {
        let mut current = self;
        while let Some(base) = &current.based_on {
            if !current.target_type.is_a(base.target_type) {
                return Err(StyleError::TargetTypeMismatch {
                    expected: base.target_type.name(),
                    found: current.target_type.name(),
                });
            }
            current = base;
        }
        Ok(())
    }

    /// Apply to `object`, replacing any style applied before
    ///
    /// Seals the style. Setters the store rejects are logged and skipped.
    pub fn apply(self: &Rc<Self>, tree: &mut ElementTree, object: ObjectId) -> StyleResult<()> {
        let object_type = tree
            .object_type(object)
            .ok_or(StyleError::Property(PropertyError::ObjectNotFound))?;
        if !object_type.is_a(self.target_type) {
            return Err(StyleError::TargetTypeMismatch {
                expected: self.target_type.name(),
                found: object_type.name(),
            });
        }
        self.check_chain()?;
        self.seal();

        if let Some(previous) = tree.take_attached::<AppliedStyle>(object) {
            for property in &previous.properties {
                tree.clear_style_value(object, *property);
            }
        }

        let mut properties = Vec::new();
        for setter in self.effective_setters().into_values() {
            match tree.set_style_value(object, setter.property, setter.value) {
                Ok(()) => properties.push(setter.property),
                Err(err) => tracing::warn!(
                    "style setter for {} skipped: {}",
                    setter.property.qualified_name(),
                    err
                ),
            }
        }
        tracing::debug!("applied {} style setter(s) to {}", properties.len(), object_type.name());
        tree.set_attached(
            object,
            Rc::new(AppliedStyle {
                style: Rc::clone(self),
                properties,
            }),
        );
        Ok(())
    }

    /// Remove this style's values from `object`
    ///
    /// Only properties this style set are cleared. Returns false when this
    /// style is not the one applied to `object`.
    pub fn unapply(&self, tree: &mut ElementTree, object: ObjectId) -> bool {
        let is_applied = tree
            .attached::<AppliedStyle>(object)
            .is_some_and(|applied| std::ptr::eq(Rc::as_ptr(&applied.style), self));
        if !is_applied {
            return false;
        }
        if let Some(applied) = tree.take_attached::<AppliedStyle>(object) {
            for property in &applied.properties {
                tree.clear_style_value(object, *property);
            }
        }
        true
    }
}

/// The style currently applied to `object`
pub fn applied_style(tree: &ElementTree, object: ObjectId) -> Option<Rc<Style>> {
    tree.attached::<AppliedStyle>(object).map(|applied| Rc::clone(&applied.style))
}
