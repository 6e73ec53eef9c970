//! Trellis Core
//!
//! The property system underneath Trellis controls:
//!
//! - **Property Registry**: process-wide dependency property descriptors
//! - **Attribute Store**: per-object value slots with source precedence
//! - **Element Tree**: generational arena of objects, notification, inheritance
//! - **Bindings**: one-way, two-way and template bindings over property paths
//! - **Dispatcher**: hand-off of cross-thread work to the UI thread
//!
//! Effective values follow a fixed precedence:
//! Animated > Local > LocalBinding > TemplateBinding > Style > Inherited > Default.
//!
//! # Example
//!
//! ```rust
//! use std::sync::LazyLock;
//! use trellis_core::{
//!     Binding, DependencyProperty, ElementTree, ObjectType, Property, PropertyMetadata, Value,
//!     ValueSource, ValueType, FRAMEWORK_ELEMENT,
//! };
//!
//! static SLIDER: ObjectType = ObjectType::element("DocCoreSlider", &FRAMEWORK_ELEMENT);
//! static AMOUNT: LazyLock<Property> = LazyLock::new(|| {
//!     DependencyProperty::register(
//!         "Amount",
//!         ValueType::Double,
//!         &SLIDER,
//!         PropertyMetadata::new().default_value(0.0),
//!     )
//!     .unwrap()
//! });
//!
//! let mut tree = ElementTree::new();
//! let source = tree.create(&SLIDER);
//! let mirror = tree.create(&SLIDER);
//! tree.set_binding(mirror, *AMOUNT, Binding::to_property(source, *AMOUNT)).unwrap();
//!
//! tree.set_local(source, *AMOUNT, 0.75).unwrap();
//! assert_eq!(tree.get(mirror, *AMOUNT), Value::Double(0.75));
//! assert_eq!(tree.value_source(mirror, *AMOUNT), ValueSource::LocalBinding);
//!
//! tree.set_animated(mirror, *AMOUNT, 0.1).unwrap();
//! assert_eq!(tree.get(mirror, *AMOUNT), Value::Double(0.1));
//! ```

pub mod binding;
pub mod brush;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod framework;
pub mod object_type;
pub mod path;
pub mod primitives;
pub mod registry;
pub mod store;
pub mod tree;
pub mod value;

pub use binding::{
    Binding, BindingId, BindingMode, BindingSource, BindingStatus, UpdateSourceTrigger,
    ValueConverter,
};
pub use brush::{brush_color, color_of, create_solid_brush, SOLID_COLOR_BRUSH_COLOR};
pub use config::{AnimationConfig, PropertyConfig, TrellisConfig, VisualStateConfig};
pub use dispatcher::{Dispatcher, DispatcherHandle, RepeatTimer};
pub use error::{BindingError, ConfigError, PropertyError, Result};
pub use framework::DATA_CONTEXT;
pub use object_type::{
    ObjectKind, ObjectType, BRUSH, CONTROL, DEPENDENCY_OBJECT, FRAMEWORK_ELEMENT, SOLID_COLOR_BRUSH,
};
pub use path::{PathResolution, PathSegment, PropertyPath};
pub use primitives::{Color, Point, Thickness};
pub use registry::{
    DependencyProperty, Property, PropertyDescriptor, PropertyId, PropertyMetadata, PropertyRegistry,
};
pub use store::{AttributeStore, PropertyChange, Slot, ValueSource};
pub use tree::{Descendants, ElementTree, ObjectId, Subscription, SubscriptionId};
pub use value::{EnumValue, FromValue, OpaqueValue, Value, ValueType};
