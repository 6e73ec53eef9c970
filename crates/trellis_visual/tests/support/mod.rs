//! A tiny widget set for end-to-end tests: a Button whose default template is
//! a single Border named `RootBorder`.

#![allow(dead_code)]

use std::rc::Rc;
use std::sync::LazyLock;

use trellis_animation::{ColorAnimation, DoubleAnimation, Storyboard, StoryboardChild};
use trellis_core::{
    Color, DependencyProperty, EnumValue, ObjectType, Property, PropertyMetadata, Thickness, ValueType, CONTROL,
    FRAMEWORK_ELEMENT,
};
use trellis_visual::{ControlTemplate, ElementSpec, VisualState, VisualStateGroup};

pub static BUTTON: ObjectType = ObjectType::element("Button", &CONTROL);
pub static BORDER: ObjectType = ObjectType::element("Border", &FRAMEWORK_ELEMENT);

pub const FONT_WEIGHT: &str = "FontWeight";
pub const NORMAL: EnumValue = EnumValue::new(FONT_WEIGHT, 400);
pub const BOLD: EnumValue = EnumValue::new(FONT_WEIGHT, 700);

fn register(name: &str, value_type: ValueType, owner: &'static ObjectType, metadata: PropertyMetadata) -> Property {
    DependencyProperty::register(name, value_type, owner, metadata).unwrap()
}

pub static BUTTON_BACKGROUND: LazyLock<Property> =
    LazyLock::new(|| register("Background", ValueType::Brush, &BUTTON, PropertyMetadata::new()));

pub static BUTTON_MOUSE_OVER_BACKGROUND: LazyLock<Property> =
    LazyLock::new(|| register("MouseOverBackground", ValueType::Brush, &BUTTON, PropertyMetadata::new()));

pub static BUTTON_PADDING: LazyLock<Property> = LazyLock::new(|| {
    register(
        "Padding",
        ValueType::Thickness,
        &BUTTON,
        PropertyMetadata::new().default_value(Thickness::uniform(4.0)),
    )
});

pub static BUTTON_FONT_SIZE: LazyLock<Property> = LazyLock::new(|| {
    register("FontSize", ValueType::Double, &BUTTON, PropertyMetadata::new().default_value(12.0))
});

pub static BUTTON_FONT_WEIGHT: LazyLock<Property> = LazyLock::new(|| {
    register(
        "FontWeight",
        ValueType::Enum(FONT_WEIGHT),
        &BUTTON,
        PropertyMetadata::new().default_value(NORMAL),
    )
});

pub static OPACITY: LazyLock<Property> = LazyLock::new(|| {
    register(
        "Opacity",
        ValueType::Double,
        &BUTTON,
        PropertyMetadata::new()
            .default_value(1.0)
            .validate(|v| v.as_double().is_some_and(|d| (0.0..=1.0).contains(&d))),
    )
});

pub static BORDER_BACKGROUND: LazyLock<Property> =
    LazyLock::new(|| register("Background", ValueType::Brush, &BORDER, PropertyMetadata::new()));

pub static BORDER_PADDING: LazyLock<Property> = LazyLock::new(|| {
    register(
        "Padding",
        ValueType::Thickness,
        &BORDER,
        PropertyMetadata::new().default_value(Thickness::ZERO),
    )
});

pub static BORDER_OPACITY: LazyLock<Property> = LazyLock::new(|| {
    register("Opacity", ValueType::Double, &BORDER, PropertyMetadata::new().default_value(1.0))
});

/// Touch every property so name lookups can find them
pub fn register_widgets() {
    let _ = (
        *BUTTON_BACKGROUND,
        *BUTTON_MOUSE_OVER_BACKGROUND,
        *BUTTON_PADDING,
        *BUTTON_FONT_SIZE,
        *BUTTON_FONT_WEIGHT,
        *OPACITY,
        *BORDER_BACKGROUND,
        *BORDER_PADDING,
        *BORDER_OPACITY,
    );
}

pub const RESTING: Color = Color::GRAY;

/// `Normal` has no storyboard; `MouseOver` recolors the RootBorder brush to
/// the button's MouseOverBackground; `Pressed` dims the border
pub fn common_states() -> VisualStateGroup {
    VisualStateGroup::new("CommonStates")
        .state(VisualState::new("Normal"))
        .state(
            VisualState::new("MouseOver").with_storyboard(
                Storyboard::new().child(
                    StoryboardChild::new(ColorAnimation::new().duration_ms(150.0))
                        .target_name("RootBorder")
                        .target_property("Background.Color")
                        .to_binding(*BUTTON_MOUSE_OVER_BACKGROUND),
                ),
            ),
        )
        .state(
            VisualState::new("Pressed").with_storyboard(
                Storyboard::new().child(
                    StoryboardChild::new(DoubleAnimation::new().to(0.6).duration_ms(100.0))
                        .target_name("RootBorder")
                        .target_property("Opacity"),
                ),
            ),
        )
}

pub fn button_template() -> Rc<ControlTemplate> {
    register_widgets();
    Rc::new(
        ControlTemplate::from_tree(
            &BUTTON,
            ElementSpec::new(&BORDER)
                .name("RootBorder")
                .brush(*BORDER_BACKGROUND, RESTING)
                .template_binding(*BORDER_PADDING, *BUTTON_PADDING),
        )
        .state_group(common_states()),
    )
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
