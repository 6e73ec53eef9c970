//! End-to-end scenarios across the property system, bindings, animation,
//! styles, templates and the visual state manager.

mod support;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use support::*;
use trellis_animation::{
    AnimationManager, ColorAnimation, DoubleAnimation, DoubleKeyFrameAnimation, Easing, EasingFunction, FillBehavior,
    KeyFrame, KeyTime, TimelineHandle, TimelineStatus,
};
use trellis_core::{
    brush_color, create_solid_brush, Binding, BindingMode, Color, ElementTree, ObjectId, Thickness, Value,
    ValueSource,
};
use trellis_visual::{
    apply_template, get_state_manager, go_to_state, template_root, Style, VisualState, VisualStateGroup,
    VisualStateManager, VisualTransition,
};

fn opacity(tree: &ElementTree, id: ObjectId) -> f64 {
    tree.get_as::<f64>(id, *OPACITY).unwrap()
}

/// Records `(old, new)` effective values of one slot
fn record(tree: &mut ElementTree, id: ObjectId, property: trellis_core::Property) -> Rc<RefCell<Vec<(Value, Value)>>> {
    let log: Rc<RefCell<Vec<(Value, Value)>>> = Rc::default();
    let sink = log.clone();
    tree.subscribe(id, property, move |_, change| {
        sink.borrow_mut().push((change.old_value.clone(), change.new_value.clone()))
    })
    .unwrap();
    log
}

/// Object from S1 with Opacity set locally to 0.5
fn faded_button() -> (ElementTree, ObjectId) {
    init_tracing();
    register_widgets();
    let mut tree = ElementTree::new();
    let button = tree.create(&BUTTON);
    tree.set_local(button, *OPACITY, 0.5).unwrap();
    (tree, button)
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn test_s1_local_value_and_single_change_event() {
    init_tracing();
    register_widgets();
    let mut tree = ElementTree::new();
    let o = tree.create(&BUTTON);
    let events = record(&mut tree, o, *OPACITY);

    tree.set_local(o, *OPACITY, 0.5).unwrap();

    assert_eq!(opacity(&tree, o), 0.5);
    assert_eq!(*events.borrow(), vec![(Value::Double(1.0), Value::Double(0.5))]);
}

#[test]
fn test_s2_animation_starts_from_captured_value() {
    let (mut tree, o) = faded_button();
    let mut animations = AnimationManager::for_tree(&tree);
    let anim = TimelineHandle::new(DoubleAnimation::new().to(0.0).duration_ms(1000.0).target(o, *OPACITY));
    anim.begin(&mut animations);

    // Two frames; one 500ms frame would be clamped to max_frame_delta_ms
    animations.update(&mut tree, 250.0);
    animations.update(&mut tree, 250.0);

    assert!((opacity(&tree, o) - 0.25).abs() < 1e-9);
    assert_eq!(tree.value_source(o, *OPACITY), ValueSource::Animated);
    assert_eq!(tree.base_value(o, *OPACITY), Value::Double(0.5));
}

#[test]
fn test_s3_completion_holds_then_stop_releases() {
    let (mut tree, o) = faded_button();
    let mut animations = AnimationManager::for_tree(&tree);
    let anim = TimelineHandle::new(DoubleAnimation::new().to(0.0).duration_ms(1000.0).target(o, *OPACITY));
    let completed = Rc::new(Cell::new(0));
    let counter = completed.clone();
    anim.on_completed(move || counter.set(counter.get() + 1));
    anim.begin(&mut animations);

    for _ in 0..4 {
        animations.update(&mut tree, 250.0);
    }
    assert_eq!(opacity(&tree, o), 0.0);
    assert_eq!(anim.status(), TimelineStatus::Completed);
    assert_eq!(completed.get(), 1);

    animations.update(&mut tree, 250.0);
    assert_eq!(opacity(&tree, o), 0.0);
    assert_eq!(completed.get(), 1);

    anim.set_fill(FillBehavior::Stop);
    anim.stop(&mut animations, &mut tree);
    assert_eq!(opacity(&tree, o), 0.5);
    assert_eq!(tree.value_source(o, *OPACITY), ValueSource::Local);
}

#[test]
fn test_s4_one_way_binding_follows_source() {
    init_tracing();
    register_widgets();
    let mut tree = ElementTree::new();
    let a = tree.create(&BUTTON);
    let b = tree.create(&BUTTON);
    tree.set_binding(b, *BUTTON_FONT_SIZE, Binding::to_property(a, *BUTTON_FONT_SIZE).mode(BindingMode::OneWay))
        .unwrap();
    let events = record(&mut tree, b, *BUTTON_FONT_SIZE);

    tree.set_local(a, *BUTTON_FONT_SIZE, 7.0).unwrap();
    assert_eq!(tree.get(b, *BUTTON_FONT_SIZE), Value::Double(7.0));
    assert_eq!(events.borrow().len(), 1);

    tree.clear(a, *BUTTON_FONT_SIZE);
    assert_eq!(tree.get(b, *BUTTON_FONT_SIZE), Value::Double(12.0));
    assert_eq!(events.borrow().len(), 2);
}

#[test]
fn test_stop_falls_back_to_binding_value() {
    init_tracing();
    register_widgets();
    let mut tree = ElementTree::new();
    let mut animations = AnimationManager::for_tree(&tree);
    let a = tree.create(&BUTTON);
    let b = tree.create(&BUTTON);
    tree.set_local(a, *BUTTON_FONT_SIZE, 7.0).unwrap();
    tree.set_binding(b, *BUTTON_FONT_SIZE, Binding::to_property(a, *BUTTON_FONT_SIZE).mode(BindingMode::OneWay))
        .unwrap();
    assert_eq!(tree.value_source(b, *BUTTON_FONT_SIZE), ValueSource::LocalBinding);

    let anim = TimelineHandle::new(
        DoubleAnimation::new()
            .to(30.0)
            .duration_ms(1000.0)
            .fill(FillBehavior::Stop)
            .target(b, *BUTTON_FONT_SIZE),
    );
    anim.begin(&mut animations);
    animations.update(&mut tree, 500.0);
    assert_eq!(tree.value_source(b, *BUTTON_FONT_SIZE), ValueSource::Animated);

    // The binding keeps writing underneath the animation
    tree.set_local(a, *BUTTON_FONT_SIZE, 9.0).unwrap();
    assert_eq!(tree.value_source(b, *BUTTON_FONT_SIZE), ValueSource::Animated);
    assert_eq!(tree.base_value(b, *BUTTON_FONT_SIZE), Value::Double(9.0));

    anim.stop(&mut animations, &mut tree);
    assert_eq!(tree.get(b, *BUTTON_FONT_SIZE), Value::Double(9.0));
    assert_eq!(tree.value_source(b, *BUTTON_FONT_SIZE), ValueSource::LocalBinding);
}

#[test]
fn test_s5_mouse_over_recolors_template_border() {
    init_tracing();
    let template = button_template();
    let mut tree = ElementTree::new();
    let mut animations = AnimationManager::for_tree(&tree);
    let button = tree.create(&BUTTON);
    let red = create_solid_brush(&mut tree, Color::RED);
    tree.set_local(button, *BUTTON_MOUSE_OVER_BACKGROUND, red).unwrap();

    let root = apply_template(&mut tree, &mut animations, button, &template).unwrap();
    let root_border = tree.find_by_name(root, "RootBorder").unwrap();
    let border_brush = tree.get(root_border, *BORDER_BACKGROUND).as_object().unwrap();
    assert_eq!(brush_color(&tree, border_brush), Some(RESTING));

    assert!(go_to_state(&mut tree, &mut animations, button, "MouseOver", true));
    animations.update(&mut tree, 75.0);
    animations.update(&mut tree, 75.0);

    assert_eq!(brush_color(&tree, border_brush), Some(Color::RED));
    let manager = get_state_manager(&tree, button).unwrap();
    let vsm = manager.borrow();
    let group = vsm.group("CommonStates").unwrap();
    assert_eq!(group.current_state().map(VisualState::name), Some("MouseOver"));
}

#[test]
fn test_s5_other_instances_keep_their_brush() {
    init_tracing();
    let template = button_template();
    let mut tree = ElementTree::new();
    let mut animations = AnimationManager::for_tree(&tree);
    let hovered = tree.create(&BUTTON);
    let idle = tree.create(&BUTTON);
    let blue = create_solid_brush(&mut tree, Color::BLUE);
    tree.set_local(hovered, *BUTTON_MOUSE_OVER_BACKGROUND, blue).unwrap();

    apply_template(&mut tree, &mut animations, hovered, &template).unwrap();
    let idle_root = apply_template(&mut tree, &mut animations, idle, &template).unwrap();

    go_to_state(&mut tree, &mut animations, hovered, "MouseOver", false);
    animations.update(&mut tree, 150.0);

    let idle_brush = tree.get(idle_root, *BORDER_BACKGROUND).as_object().unwrap();
    assert_eq!(brush_color(&tree, idle_brush), Some(RESTING));
    let hovered_root = template_root(&tree, hovered).unwrap();
    let hovered_brush = tree.get(hovered_root, *BORDER_BACKGROUND).as_object().unwrap();
    assert_eq!(brush_color(&tree, hovered_brush), Some(Color::BLUE));
}

#[test]
fn test_s5_template_binding_tracks_the_button() {
    init_tracing();
    let template = button_template();
    let mut tree = ElementTree::new();
    let mut animations = AnimationManager::for_tree(&tree);
    let button = tree.create(&BUTTON);
    let root = apply_template(&mut tree, &mut animations, button, &template).unwrap();

    assert_eq!(tree.get(root, *BORDER_PADDING), Value::Thickness(Thickness::uniform(4.0)));
    tree.set_local(button, *BUTTON_PADDING, Thickness::symmetric(8.0, 2.0)).unwrap();
    assert_eq!(tree.get(root, *BORDER_PADDING), Value::Thickness(Thickness::symmetric(8.0, 2.0)));
    assert_eq!(tree.value_source(root, *BORDER_PADDING), ValueSource::TemplateBinding);
}

#[test]
fn test_s5_template_churn_frees_brushes() {
    init_tracing();
    let template = button_template();
    let mut tree = ElementTree::new();
    let mut animations = AnimationManager::for_tree(&tree);
    let button = tree.create(&BUTTON);

    apply_template(&mut tree, &mut animations, button, &template).unwrap();
    let settled = tree.len();
    for _ in 0..10 {
        apply_template(&mut tree, &mut animations, button, &template).unwrap();
    }
    assert_eq!(tree.len(), settled);

    assert!(tree.remove(button));
    assert_eq!(tree.len(), 0);
}

#[test]
fn test_s6_based_on_style() {
    init_tracing();
    register_widgets();
    let mut tree = ElementTree::new();
    let button = tree.create(&BUTTON);
    let base = Rc::new(
        Style::new(&BUTTON)
            .setter(*BUTTON_FONT_SIZE, 14.0)
            .setter(*BUTTON_FONT_WEIGHT, BOLD),
    );
    let style = Rc::new(Style::new(&BUTTON).based_on(base).setter(*BUTTON_FONT_SIZE, 18.0));

    style.apply(&mut tree, button).unwrap();
    assert_eq!(tree.get(button, *BUTTON_FONT_SIZE), Value::Double(18.0));
    assert_eq!(tree.get(button, *BUTTON_FONT_WEIGHT), Value::Enum(BOLD));

    assert!(style.unapply(&mut tree, button));
    assert_eq!(tree.get(button, *BUTTON_FONT_SIZE), Value::Double(12.0));
    assert_eq!(tree.get(button, *BUTTON_FONT_WEIGHT), Value::Enum(NORMAL));
}

#[test]
fn test_s7_key_frames_with_discrete_end() {
    init_tracing();
    register_widgets();
    let mut tree = ElementTree::new();
    let o = tree.create(&BUTTON);
    let mut animations = AnimationManager::for_tree(&tree);
    let anim = TimelineHandle::new(
        DoubleKeyFrameAnimation::new()
            .key_frame(KeyFrame::linear(0.0, KeyTime::Percent(0.0)))
            .key_frame(KeyFrame::linear(1.0, KeyTime::Percent(0.5)))
            .key_frame(KeyFrame::discrete(0.3, KeyTime::Percent(1.0)))
            .duration_ms(1000.0)
            .target(o, *OPACITY),
    );
    anim.begin(&mut animations);

    let mut samples = Vec::new();
    for _ in 0..4 {
        animations.update(&mut tree, 250.0);
        samples.push(opacity(&tree, o));
    }
    assert_eq!(samples, vec![0.5, 1.0, 1.0, 0.3]);
}

// =============================================================================
// INVARIANTS
// =============================================================================

#[test]
fn test_precedence_follows_highest_source() {
    init_tracing();
    register_widgets();
    let mut tree = ElementTree::new();
    let source = tree.create(&BUTTON);
    let button = tree.create(&BUTTON);
    tree.set_local(source, *BUTTON_FONT_SIZE, 16.0).unwrap();

    let expect = |tree: &ElementTree, value: f64, src: ValueSource| {
        assert_eq!(tree.get(button, *BUTTON_FONT_SIZE), Value::Double(value));
        assert_eq!(tree.value_source(button, *BUTTON_FONT_SIZE), src);
    };

    expect(&tree, 12.0, ValueSource::Default);
    tree.set_style_value(button, *BUTTON_FONT_SIZE, 14.0).unwrap();
    expect(&tree, 14.0, ValueSource::Style);
    tree.set_binding(button, *BUTTON_FONT_SIZE, Binding::to_property(source, *BUTTON_FONT_SIZE))
        .unwrap();
    expect(&tree, 16.0, ValueSource::LocalBinding);
    tree.set_animated(button, *BUTTON_FONT_SIZE, 20.0).unwrap();
    expect(&tree, 20.0, ValueSource::Animated);
    tree.set_local(button, *BUTTON_FONT_SIZE, 18.0).unwrap();
    expect(&tree, 20.0, ValueSource::Animated);

    tree.clear_animated(button, *BUTTON_FONT_SIZE);
    expect(&tree, 18.0, ValueSource::Local);
    tree.clear(button, *BUTTON_FONT_SIZE);
    expect(&tree, 14.0, ValueSource::Style);
    tree.clear_style_value(button, *BUTTON_FONT_SIZE);
    expect(&tree, 12.0, ValueSource::Default);
}

#[test]
fn test_template_binding_beats_style() {
    init_tracing();
    let template = button_template();
    let mut tree = ElementTree::new();
    let mut animations = AnimationManager::for_tree(&tree);
    let button = tree.create(&BUTTON);
    let root = apply_template(&mut tree, &mut animations, button, &template).unwrap();

    tree.set_style_value(root, *BORDER_PADDING, Thickness::uniform(1.0)).unwrap();
    assert_eq!(tree.value_source(root, *BORDER_PADDING), ValueSource::TemplateBinding);
    tree.set_local(root, *BORDER_PADDING, Thickness::uniform(2.0)).unwrap();
    assert_eq!(tree.get(root, *BORDER_PADDING), Value::Thickness(Thickness::uniform(2.0)));
}

#[test]
fn test_listeners_fire_once_per_net_change() {
    let (mut tree, o) = faded_button();
    let events = record(&mut tree, o, *OPACITY);

    // Below the Local value: no effective change
    tree.set_style_value(o, *OPACITY, 0.8).unwrap();
    assert!(events.borrow().is_empty());

    tree.set_animated(o, *OPACITY, 0.1).unwrap();
    tree.clear_animated(o, *OPACITY);
    tree.clear(o, *OPACITY);
    assert_eq!(
        *events.borrow(),
        vec![
            (Value::Double(0.5), Value::Double(0.1)),
            (Value::Double(0.1), Value::Double(0.5)),
            (Value::Double(0.5), Value::Double(0.8)),
        ]
    );
}

#[test]
fn test_idempotent_set_is_silent() {
    let (mut tree, o) = faded_button();
    let events = record(&mut tree, o, *OPACITY);
    tree.set_local(o, *OPACITY, 0.5).unwrap();
    tree.set_local(o, *OPACITY, 0.5).unwrap();
    assert!(events.borrow().is_empty());
}

#[test]
fn test_clear_restores_default() {
    let (mut tree, o) = faded_button();
    tree.clear(o, *OPACITY);
    assert_eq!(opacity(&tree, o), 1.0);
    assert_eq!(tree.value_source(o, *OPACITY), ValueSource::Default);
}

#[test]
fn test_two_way_binding_does_not_oscillate() {
    init_tracing();
    register_widgets();
    let mut tree = ElementTree::new();
    let a = tree.create(&BUTTON);
    let b = tree.create(&BUTTON);
    tree.set_binding(b, *BUTTON_FONT_SIZE, Binding::to_property(a, *BUTTON_FONT_SIZE).mode(BindingMode::TwoWay))
        .unwrap();
    let a_events = record(&mut tree, a, *BUTTON_FONT_SIZE);
    let b_events = record(&mut tree, b, *BUTTON_FONT_SIZE);

    tree.set_local(a, *BUTTON_FONT_SIZE, 20.0).unwrap();
    assert_eq!(tree.get(b, *BUTTON_FONT_SIZE), Value::Double(20.0));
    assert_eq!(a_events.borrow().len() + b_events.borrow().len(), 2);

    tree.set_local(b, *BUTTON_FONT_SIZE, 24.0).unwrap();
    assert_eq!(tree.get(a, *BUTTON_FONT_SIZE), Value::Double(24.0));
    assert_eq!(a_events.borrow().len() + b_events.borrow().len(), 4);
}

#[test]
fn test_animation_converges_with_hold_end() {
    let (mut tree, o) = faded_button();
    let mut animations = AnimationManager::for_tree(&tree);
    let anim = TimelineHandle::new(
        DoubleAnimation::new()
            .from(0.2)
            .to(0.9)
            .easing(Easing::ease_in_out(EasingFunction::Sine))
            .duration_ms(300.0)
            .target(o, *OPACITY),
    );
    anim.begin(&mut animations);
    for _ in 0..40 {
        animations.update(&mut tree, 16.0);
    }
    assert_eq!(anim.status(), TimelineStatus::Completed);
    assert!((opacity(&tree, o) - 0.9).abs() <= 1e-5);
}

#[test]
fn test_color_animation_converges() {
    init_tracing();
    let template = button_template();
    let mut tree = ElementTree::new();
    let mut animations = AnimationManager::for_tree(&tree);
    let button = tree.create(&BUTTON);
    let root = apply_template(&mut tree, &mut animations, button, &template).unwrap();
    let brush = tree.get(root, *BORDER_BACKGROUND).as_object().unwrap();

    let anim = TimelineHandle::new(
        ColorAnimation::new()
            .to(Color::rgb(0.2, 0.4, 0.6))
            .duration_ms(100.0)
            .target(brush, *trellis_core::SOLID_COLOR_BRUSH_COLOR),
    );
    anim.begin(&mut animations);
    for _ in 0..7 {
        animations.update(&mut tree, 16.0);
    }
    let color = brush_color(&tree, brush).unwrap();
    assert!((color.r - 0.2).abs() <= 1e-5);
    assert!((color.g - 0.4).abs() <= 1e-5);
    assert!((color.b - 0.6).abs() <= 1e-5);
}

#[test]
fn test_animation_starts_smoothly_from_any_source() {
    init_tracing();
    register_widgets();
    let mut tree = ElementTree::new();
    let o = tree.create(&BUTTON);
    tree.set_style_value(o, *OPACITY, 0.7).unwrap();
    let mut animations = AnimationManager::for_tree(&tree);
    let anim = TimelineHandle::new(DoubleAnimation::new().to(0.0).duration_ms(500.0).target(o, *OPACITY));
    anim.begin(&mut animations);

    assert!(anim.seek(&mut animations, &mut tree, 0.0));
    assert_eq!(opacity(&tree, o), 0.7);
    animations.update(&mut tree, 0.5);
    assert!((opacity(&tree, o) - 0.7).abs() < 1e-3);
}

#[test]
fn test_exactly_one_current_state_per_group() {
    init_tracing();
    let template = button_template();
    let mut tree = ElementTree::new();
    let mut animations = AnimationManager::for_tree(&tree);
    let button = tree.create(&BUTTON);
    let red = create_solid_brush(&mut tree, Color::RED);
    tree.set_local(button, *BUTTON_MOUSE_OVER_BACKGROUND, red).unwrap();
    apply_template(&mut tree, &mut animations, button, &template).unwrap();
    {
        let manager = get_state_manager(&tree, button).unwrap();
        manager.borrow_mut().add_group(
            VisualStateGroup::new("FocusStates")
                .state(VisualState::new("Unfocused"))
                .state(VisualState::new("Focused"))
                .transition(VisualTransition::new().duration_ms(50.0)),
        );
    }

    let steps = [
        ("MouseOver", "CommonStates"),
        ("Focused", "FocusStates"),
        ("Pressed", "CommonStates"),
        ("Pressed", "CommonStates"),
        ("Unfocused", "FocusStates"),
        ("Normal", "CommonStates"),
    ];
    for (state, group) in steps {
        assert!(go_to_state(&mut tree, &mut animations, button, state, true));
        animations.update(&mut tree, 40.0);
        let manager = get_state_manager(&tree, button).unwrap();
        let vsm = manager.borrow();
        assert_eq!(vsm.current_state_of(group), Some(state));
    }
    let manager = get_state_manager(&tree, button).unwrap();
    let vsm = manager.borrow();
    assert_eq!(vsm.current_state_of("CommonStates"), Some("Normal"));
    assert_eq!(vsm.current_state_of("FocusStates"), Some("Unfocused"));
}

#[test]
fn test_manual_manager_on_untemplated_control() {
    init_tracing();
    register_widgets();
    let mut tree = ElementTree::new();
    let mut animations = AnimationManager::for_tree(&tree);
    let button = tree.create(&BUTTON);

    let mut manager = VisualStateManager::new();
    manager.add_group(
        VisualStateGroup::new("CommonStates").state(VisualState::new("Normal")).state(
            VisualState::new("Disabled").with_storyboard(trellis_animation::Storyboard::new().child(
                trellis_animation::StoryboardChild::new(DoubleAnimation::new().to(0.4).duration_ms(100.0))
                    .target_property("Opacity"),
            )),
        ),
    );
    trellis_visual::set_state_manager(&mut tree, button, manager);

    assert!(go_to_state(&mut tree, &mut animations, button, "Disabled", true));
    animations.update(&mut tree, 100.0);
    assert!((opacity(&tree, button) - 0.4).abs() < 1e-9);
}
