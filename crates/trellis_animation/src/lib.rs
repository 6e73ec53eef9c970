//! Trellis Animation
//!
//! Time-based animation of dependency properties:
//!
//! - **Easing**: ease-in cores folded into In/Out/InOut, plus Bézier key splines
//! - **Timing**: begin offsets, speed ratio, auto-reverse, repeat and fill
//! - **Animations**: from/to/by animations for doubles, colors, points and thicknesses
//! - **Key Frames**: linear, discrete, eased and spline key frames
//! - **Storyboards**: grouped timelines addressed by name and property path
//! - **Animation Manager**: frame-delta driven scheduler over weakly held timelines
//!
//! Animated values are written into the Animated channel of the target's
//! attribute store, so they win over local values without replacing them.
//!
//! # Example
//!
//! ```rust
//! use std::sync::LazyLock;
//! use trellis_animation::{AnimationManager, DoubleAnimation, TimelineHandle};
//! use trellis_core::{DependencyProperty, ElementTree, ObjectType, Property, PropertyMetadata, ValueType, FRAMEWORK_ELEMENT};
//!
//! static CARD: ObjectType = ObjectType::element("DocAnimationCard", &FRAMEWORK_ELEMENT);
//! static OPACITY: LazyLock<Property> = LazyLock::new(|| {
//!     DependencyProperty::register("Opacity", ValueType::Double, &CARD, PropertyMetadata::new().default_value(1.0))
//!         .unwrap()
//! });
//!
//! let mut tree = ElementTree::new();
//! let card = tree.create(&CARD);
//! let mut manager = AnimationManager::for_tree(&tree);
//!
//! let fade = TimelineHandle::new(DoubleAnimation::new().to(0.0).duration_ms(200.0).target(card, *OPACITY));
//! fade.begin(&mut manager);
//! manager.update(&mut tree, 100.0);
//! assert_eq!(tree.get_as::<f64>(card, *OPACITY), Some(0.5));
//! ```

pub mod animation;
pub mod easing;
pub mod keyframe;
pub mod scheduler;
pub mod storyboard;
pub mod timeline;
pub mod timing;
pub mod values;

pub use animation::{Animation, ColorAnimation, DoubleAnimation, PointAnimation, ThicknessAnimation};
pub use easing::{Easing, EasingFunction, EasingMode, KeySpline};
pub use keyframe::{
    ColorKeyFrameAnimation, DoubleKeyFrameAnimation, KeyFrame, KeyFrameAnimation, KeyFrameKind, KeyTime,
    PointKeyFrameAnimation, ThicknessKeyFrameAnimation,
};
pub use scheduler::{AnimationManager, ClockId, TimelineHandle};
pub use storyboard::{Storyboard, StoryboardChild};
pub use timeline::{
    apply_writes, AnimationTarget, CompletedHandler, EvalContext, PropertyWrite, Timeline, TimelineCore,
    TimelineStatus,
};
pub use timing::{ClockPhase, ClockSnapshot, Duration, FillBehavior, RepeatBehavior, Timing};
pub use values::Animatable;

/// Handle to a storyboard
pub type StoryboardHandle = TimelineHandle<Storyboard>;
