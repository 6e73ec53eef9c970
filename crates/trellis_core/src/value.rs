//! Tagged property values
//!
//! Every dependency property slot carries a [`Value`]. Values are an explicit
//! sum type; the store never converts between tags. A descriptor's
//! [`ValueType`] decides which tags a slot accepts:
//!
//! ```rust
//! use trellis_core::value::{Value, ValueType};
//!
//! assert!(ValueType::Double.accepts(&Value::Double(0.5)));
//! assert!(!ValueType::Double.accepts(&Value::Int(1)));
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::primitives::{Color, Point, Thickness};
use crate::tree::ObjectId;

/// Enumeration value tagged with the enum's name
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub type_name: &'static str,
    pub ordinal: u32,
}

impl EnumValue {
    pub const fn new(type_name: &'static str, ordinal: u32) -> Self {
        Self { type_name, ordinal }
    }
}

/// User-registered opaque handle; compared by identity
#[derive(Clone)]
pub struct OpaqueValue {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl OpaqueValue {
    pub fn new<T: Any + Send + Sync>(type_name: &'static str, value: T) -> Self {
        Self {
            type_name,
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.type_name)
    }
}

impl PartialEq for OpaqueValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A property value
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(Arc<str>),
    Color(Color),
    Point(Point),
    Thickness(Thickness),
    /// Reference to another object in the same tree (brush, element, data)
    Object(ObjectId),
    Enum(EnumValue),
    Opaque(OpaqueValue),
}

impl Value {
    /// Short tag name used in diagnostics
    pub fn tag(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Double(_) => "Double",
            Value::String(_) => "String",
            Value::Color(_) => "Color",
            Value::Point(_) => "Point",
            Value::Thickness(_) => "Thickness",
            Value::Object(_) => "Object",
            Value::Enum(_) => "Enum",
            Value::Opaque(_) => "Opaque",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Value::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Color(a), Value::Color(b)) => a == b,
            (Value::Point(a), Value::Point(b)) => a == b,
            (Value::Thickness(a), Value::Thickness(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Color(c) => write!(f, "rgba({}, {}, {}, {})", c.r, c.g, c.b, c.a),
            Value::Point(p) => write!(f, "({}, {})", p.x, p.y),
            Value::Thickness(t) => write!(f, "[{}, {}, {}, {}]", t.left, t.top, t.right, t.bottom),
            Value::Object(id) => write!(f, "object {id:?}"),
            Value::Enum(e) => write!(f, "{}#{}", e.type_name, e.ordinal),
            Value::Opaque(o) => write!(f, "{o:?}"),
        }
    }
}

// =============================================================================
// VALUE TYPES
// =============================================================================

/// Declared type of a dependency property
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    /// Accepts any tag (e.g. `DataContext`)
    Any,
    Bool,
    Int,
    Double,
    String,
    Color,
    Point,
    Thickness,
    /// Object reference whose target must be a brush
    Brush,
    /// Object reference whose target must be an element
    Element,
    /// Object reference of any kind
    Object,
    /// Enum value of the named enum
    Enum(&'static str),
    /// Opaque handle of the named type
    Opaque(&'static str),
}

impl ValueType {
    /// Whether this type is a reference type that admits `Null` by nature
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            ValueType::Any
                | ValueType::Brush
                | ValueType::Element
                | ValueType::Object
                | ValueType::Opaque(_)
        )
    }

    /// Tag-level check. Object kind checks for `Brush` / `Element` need the
    /// tree and are done by [`ElementTree`](crate::tree::ElementTree).
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::Any, _) => true,
            (t, Value::Null) => t.is_reference(),
            (ValueType::Bool, Value::Bool(_))
            | (ValueType::Int, Value::Int(_))
            | (ValueType::Double, Value::Double(_))
            | (ValueType::String, Value::String(_))
            | (ValueType::Color, Value::Color(_))
            | (ValueType::Point, Value::Point(_))
            | (ValueType::Thickness, Value::Thickness(_))
            | (ValueType::Brush, Value::Object(_))
            | (ValueType::Element, Value::Object(_))
            | (ValueType::Object, Value::Object(_)) => true,
            (ValueType::Enum(name), Value::Enum(e)) => *name == e.type_name,
            (ValueType::Opaque(name), Value::Opaque(o)) => *name == o.type_name(),
            _ => false,
        }
    }

    /// Default value for this type when a descriptor does not supply one
    pub fn zero(&self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Double => Value::Double(0.0),
            ValueType::String => Value::string(""),
            ValueType::Color => Value::Color(Color::TRANSPARENT),
            ValueType::Point => Value::Point(Point::ZERO),
            ValueType::Thickness => Value::Thickness(Thickness::ZERO),
            ValueType::Enum(name) => Value::Enum(EnumValue::new(name, 0)),
            _ => Value::Null,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Enum(name) => write!(f, "Enum({name})"),
            ValueType::Opaque(name) => write!(f, "Opaque({name})"),
            other => write!(f, "{other:?}"),
        }
    }
}

// =============================================================================
// CONVERSIONS
// =============================================================================

/// Typed extraction from a [`Value`]
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! value_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

value_conversions! {
    bool => Bool,
    i64 => Int,
    f64 => Double,
    Color => Color,
    Point => Point,
    Thickness => Thickness,
    ObjectId => Object,
    EnumValue => Enum,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Arc::from(v))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}
