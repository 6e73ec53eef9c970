//! Trellis Visual
//!
//! The layer that gives controls their look:
//!
//! - **Styles**: setter lists per target type, merged along `based_on` chains
//! - **Control Templates**: per-instance subtrees built from a factory or an
//!   element spec, wired to the control through template bindings
//! - **Data Templates**: subtrees built around a data context
//! - **Visual State Manager**: named states, transitions and the storyboards
//!   that animate template parts between them
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use std::sync::LazyLock;
//! use trellis_animation::{AnimationManager, DoubleAnimation, Storyboard, StoryboardChild};
//! use trellis_core::{DependencyProperty, ElementTree, ObjectType, Property, PropertyMetadata, ValueType, CONTROL, FRAMEWORK_ELEMENT};
//! use trellis_visual::{apply_template, go_to_state, ControlTemplate, ElementSpec, VisualState, VisualStateGroup};
//!
//! static TOGGLE: ObjectType = ObjectType::element("DocVisualToggle", &CONTROL);
//! static KNOB: ObjectType = ObjectType::element("DocVisualKnob", &FRAMEWORK_ELEMENT);
//! static OFFSET: LazyLock<Property> = LazyLock::new(|| {
//!     DependencyProperty::register("Offset", ValueType::Double, &KNOB, PropertyMetadata::new().default_value(0.0))
//!         .unwrap()
//! });
//!
//! let mut tree = ElementTree::new();
//! let _ = *OFFSET;
//! let mut animations = AnimationManager::for_tree(&tree);
//! let template = Rc::new(
//!     ControlTemplate::from_tree(&TOGGLE, ElementSpec::new(&KNOB).name("Knob")).state_group(
//!         VisualStateGroup::new("CheckStates").state(VisualState::new("Unchecked")).state(
//!             VisualState::new("Checked").with_storyboard(Storyboard::new().child(
//!                 StoryboardChild::new(DoubleAnimation::new().to(20.0).duration_ms(100.0))
//!                     .target_name("Knob")
//!                     .target_property("Offset"),
//!             )),
//!         ),
//!     ),
//! );
//!
//! let toggle = tree.create(&TOGGLE);
//! let knob = apply_template(&mut tree, &mut animations, toggle, &template).unwrap();
//! assert!(go_to_state(&mut tree, &mut animations, toggle, "Checked", true));
//! animations.update(&mut tree, 100.0);
//! assert_eq!(tree.get_as::<f64>(knob, *OFFSET), Some(20.0));
//! ```

pub mod error;
pub mod style;
pub mod template;
pub mod visual_state;

pub use error::{StyleError, StyleResult, TemplateError, TemplateResult};
pub use style::{applied_style, Setter, Style};
pub use template::{
    applied_template, apply_template, template_root, ControlTemplate, DataTemplate, ElementSpec, SpecValue,
    TemplateContent, TemplateFactory,
};
pub use visual_state::{
    clear_state_manager, get_state_manager, go_to_state, set_state_manager, SharedStateManager,
    StateChangedHandler, VisualState, VisualStateChangedArgs, VisualStateGroup, VisualStateManager,
    VisualTransition,
};
