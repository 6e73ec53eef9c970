//! Solid color brushes
//!
//! Brushes are ordinary tree objects of kind [`ObjectKind::Brush`]; element
//! properties reference them by [`ObjectId`]. Animating `Background.Color`
//! therefore writes the `Color` property of the referenced brush object.
//!
//! [`ObjectKind::Brush`]: crate::object_type::ObjectKind::Brush

use std::sync::LazyLock;

use crate::object_type::SOLID_COLOR_BRUSH;
use crate::primitives::Color;
use crate::registry::{DependencyProperty, Property, PropertyMetadata};
use crate::store::ValueSource;
use crate::tree::{ElementTree, ObjectId};
use crate::value::{Value, ValueType};

/// `SolidColorBrush.Color`
pub static SOLID_COLOR_BRUSH_COLOR: LazyLock<Property> = LazyLock::new(|| {
    DependencyProperty::register(
        "Color",
        ValueType::Color,
        &SOLID_COLOR_BRUSH,
        PropertyMetadata::new().default_value(Color::TRANSPARENT),
    )
    .expect("SolidColorBrush.Color registers once")
});

/// Create a detached solid brush with a local color
pub fn create_solid_brush(tree: &mut ElementTree, color: Color) -> ObjectId {
    let brush = tree.create(&SOLID_COLOR_BRUSH);
    tree.write_source(
        brush,
        *SOLID_COLOR_BRUSH_COLOR,
        ValueSource::Local,
        Some(Value::Color(color)),
    );
    brush
}

/// Effective color of a solid brush
pub fn brush_color(tree: &ElementTree, brush: ObjectId) -> Option<Color> {
    let ty = tree.object_type(brush)?;
    if !ty.is_a(&SOLID_COLOR_BRUSH) {
        return None;
    }
    tree.get_as::<Color>(brush, *SOLID_COLOR_BRUSH_COLOR)
}

/// Color carried by a value: either a color or a solid brush reference
pub fn color_of(tree: &ElementTree, value: &Value) -> Option<Color> {
    match value {
        Value::Color(color) => Some(*color),
        Value::Object(brush) => brush_color(tree, *brush),
        _ => None,
    }
}
