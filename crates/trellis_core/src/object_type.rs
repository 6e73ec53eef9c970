//! Static object type descriptors
//!
//! Every object in an [`ElementTree`](crate::tree::ElementTree) carries an
//! [`ObjectType`]. Types form a single-inheritance chain through `base`, which
//! is what property lookup by name, style target checks and template target
//! checks walk.
//!
//! Consumers declare their own types as statics:
//!
//! ```rust
//! use trellis_core::object_type::{ObjectType, CONTROL};
//!
//! pub static BUTTON: ObjectType = ObjectType::element("Button", &CONTROL);
//! assert!(BUTTON.is_a(&CONTROL));
//! ```

/// Broad category of an object, used for reference type checks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Part of the visual/logical tree
    Element,
    /// Paint resource referenced by element properties
    Brush,
    /// Plain dependency object (data contexts, view models)
    Data,
}

/// A statically declared object type
#[derive(Debug)]
pub struct ObjectType {
    name: &'static str,
    base: Option<&'static ObjectType>,
    kind: ObjectKind,
}

impl ObjectType {
    pub const fn new(name: &'static str, base: Option<&'static ObjectType>, kind: ObjectKind) -> Self {
        Self { name, base, kind }
    }

    /// Declare an element type deriving from `base`
    pub const fn element(name: &'static str, base: &'static ObjectType) -> Self {
        Self::new(name, Some(base), ObjectKind::Element)
    }

    /// Declare a brush type deriving from `base`
    pub const fn brush(name: &'static str, base: &'static ObjectType) -> Self {
        Self::new(name, Some(base), ObjectKind::Brush)
    }

    /// Declare a plain data type deriving from `base`
    pub const fn data(name: &'static str, base: &'static ObjectType) -> Self {
        Self::new(name, Some(base), ObjectKind::Data)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn base(&self) -> Option<&'static ObjectType> {
        self.base
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Iterate this type followed by its base chain
    pub fn ancestors(&self) -> impl Iterator<Item = &ObjectType> {
        let mut next = Some(self);
        std::iter::from_fn(move || {
            let current = next?;
            next = current.base;
            Some(current)
        })
    }

    /// Whether this type is `other` or derives from it
    ///
    /// Type names are the identity, so two declarations with the same name
    /// are treated as the same type.
    pub fn is_a(&self, other: &ObjectType) -> bool {
        self.ancestors().any(|t| t.name == other.name)
    }
}

impl PartialEq for ObjectType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ObjectType {}

// =============================================================================
// BUILT-IN TYPES
// =============================================================================

/// Root of every object type
pub static DEPENDENCY_OBJECT: ObjectType =
    ObjectType::new("DependencyObject", None, ObjectKind::Data);

/// Base of all tree elements
pub static FRAMEWORK_ELEMENT: ObjectType = ObjectType::element("FrameworkElement", &DEPENDENCY_OBJECT);

/// Base of templated controls
pub static CONTROL: ObjectType = ObjectType::element("Control", &FRAMEWORK_ELEMENT);

/// Base of all brushes
pub static BRUSH: ObjectType = ObjectType::brush("Brush", &DEPENDENCY_OBJECT);

/// Single-color brush with an animatable `Color`
pub static SOLID_COLOR_BRUSH: ObjectType = ObjectType::brush("SolidColorBrush", &BRUSH);
