//! Properties shared by every framework element

use std::sync::LazyLock;

use crate::object_type::FRAMEWORK_ELEMENT;
use crate::registry::{DependencyProperty, Property, PropertyMetadata};
use crate::value::ValueType;

/// `FrameworkElement.DataContext`: inherited, untyped
pub static DATA_CONTEXT: LazyLock<Property> = LazyLock::new(|| {
    DependencyProperty::register(
        "DataContext",
        ValueType::Any,
        &FRAMEWORK_ELEMENT,
        PropertyMetadata::new().inherits(),
    )
    .expect("FrameworkElement.DataContext registers once")
});
