//! Control and data templates
//!
//! A [`ControlTemplate`] builds a fresh subtree for every control it is
//! applied to, either from a factory closure or from a declarative
//! [`ElementSpec`]. Instantiation:
//!
//! - marks every element with the control as its templated parent
//! - registers the subtree root as a name scope
//! - attaches the root as the control's child
//! - resolves template bindings against the control
//!
//! [`apply_template`] also replaces a previously applied instance and gives
//! the control a visual state manager built from the template's state groups.

use std::rc::Rc;

use trellis_animation::AnimationManager;
use trellis_core::{
    create_solid_brush, Binding, Color, ElementTree, ObjectId, ObjectType, Property, Value, DATA_CONTEXT,
};

use crate::error::{TemplateError, TemplateResult};
use crate::visual_state::{clear_state_manager, get_state_manager, set_state_manager, VisualStateGroup, VisualStateManager};

pub type TemplateFactory = Rc<dyn Fn(&mut ElementTree) -> ObjectId>;

/// How a property of a template element gets its value
#[derive(Clone, Debug, PartialEq)]
pub enum SpecValue {
    /// A Local value
    Value(Value),
    /// A new solid brush per instance
    SolidBrush(Color),
    /// TemplateBinding to a property of the templated parent
    TemplateBinding(Property),
}

/// Declarative description of one template element and its children
#[derive(Clone, Debug)]
pub struct ElementSpec {
    object_type: &'static ObjectType,
    name: Option<String>,
    values: Vec<(Property, SpecValue)>,
    children: Vec<ElementSpec>,
}

impl ElementSpec {
    pub fn new(object_type: &'static ObjectType) -> Self {
        Self {
            object_type,
            name: None,
            values: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn set(mut self, property: Property, value: impl Into<Value>) -> Self {
        self.values.push((property, SpecValue::Value(value.into())));
        self
    }

    pub fn brush(mut self, property: Property, color: Color) -> Self {
        self.values.push((property, SpecValue::SolidBrush(color)));
        self
    }

    pub fn template_binding(mut self, property: Property, source: Property) -> Self {
        self.values.push((property, SpecValue::TemplateBinding(source)));
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn object_type(&self) -> &'static ObjectType {
        self.object_type
    }

    pub fn values(&self) -> &[(Property, SpecValue)] {
        &self.values
    }

    pub fn children(&self) -> &[ElementSpec] {
        &self.children
    }

    /// Create the subtree; a failed element removes what was built for it,
    /// including the brushes it owns
    fn build(&self, tree: &mut ElementTree, templated_parent: Option<ObjectId>) -> TemplateResult<ObjectId> {
        let id = match &self.name {
            Some(name) => tree.create_named(self.object_type, name.clone()),
            None => tree.create(self.object_type),
        };
        tree.set_templated_parent(id, templated_parent);
        if let Err(err) = self.fill(tree, id, templated_parent) {
            tree.remove(id);
            return Err(err);
        }
        Ok(id)
    }

    fn fill(&self, tree: &mut ElementTree, id: ObjectId, templated_parent: Option<ObjectId>) -> TemplateResult<()> {
        for (property, value) in &self.values {
            match value {
                SpecValue::Value(value) => tree.set_local(id, *property, value.clone())?,
                SpecValue::SolidBrush(color) => {
                    let brush = create_solid_brush(tree, *color);
                    tree.set_owner(brush, id);
                    tree.set_local(id, *property, brush)?;
                }
                SpecValue::TemplateBinding(source) => {
                    tree.set_binding(id, *property, Binding::template(*source))?;
                }
            }
        }
        for spec in &self.children {
            let child = spec.build(tree, templated_parent)?;
            tree.add_child(id, child)?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub enum TemplateContent {
    Factory(TemplateFactory),
    VisualTree(ElementSpec),
}

impl std::fmt::Debug for TemplateContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateContent::Factory(_) => f.write_str("Factory(..)"),
            TemplateContent::VisualTree(spec) => f.debug_tuple("VisualTree").field(spec).finish(),
        }
    }
}

impl TemplateContent {
    fn build(&self, tree: &mut ElementTree, templated_parent: Option<ObjectId>) -> TemplateResult<ObjectId> {
        let root = match self {
            TemplateContent::Factory(factory) => factory(tree),
            TemplateContent::VisualTree(spec) => spec.build(tree, templated_parent)?,
        };
        if !tree.contains(root) {
            return Err(TemplateError::ObjectNotFound);
        }
        Ok(root)
    }
}

// =============================================================================
// CONTROL TEMPLATES
// =============================================================================

#[derive(Debug)]
pub struct ControlTemplate {
    target_type: &'static ObjectType,
    content: TemplateContent,
    visual_state_groups: Vec<VisualStateGroup>,
}

/// The template instance currently applied to a control
struct AppliedTemplate {
    template: Rc<ControlTemplate>,
    root: ObjectId,
}

impl ControlTemplate {
    pub fn new(target_type: &'static ObjectType, content: TemplateContent) -> Self {
        Self {
            target_type,
            content,
            visual_state_groups: Vec::new(),
        }
    }

    pub fn from_factory<F>(target_type: &'static ObjectType, factory: F) -> Self
    where
        F: Fn(&mut ElementTree) -> ObjectId + 'static,
    {
        Self::new(target_type, TemplateContent::Factory(Rc::new(factory)))
    }

    pub fn from_tree(target_type: &'static ObjectType, root: ElementSpec) -> Self {
        Self::new(target_type, TemplateContent::VisualTree(root))
    }

    /// State groups copied into each instance's visual state manager
    pub fn state_group(mut self, group: VisualStateGroup) -> Self {
        self.visual_state_groups.push(group);
        self
    }

    pub fn target_type(&self) -> &'static ObjectType {
        self.target_type
    }

    pub fn content(&self) -> &TemplateContent {
        &self.content
    }

    pub fn visual_state_groups(&self) -> &[VisualStateGroup] {
        &self.visual_state_groups
    }

    fn check_target(&self, tree: &ElementTree, control: ObjectId) -> TemplateResult<()> {
        let control_type = tree.object_type(control).ok_or(TemplateError::ObjectNotFound)?;
        if !control_type.is_a(self.target_type) {
            return Err(TemplateError::TargetTypeMismatch {
                expected: self.target_type.name(),
                found: control_type.name(),
            });
        }
        Ok(())
    }

    /// Build a new instance under `templated_parent` and return its root
    ///
    /// Elements a factory already gave a templated parent (parts of nested
    /// templated controls) keep it.
    pub fn instantiate(&self, tree: &mut ElementTree, templated_parent: ObjectId) -> TemplateResult<ObjectId> {
        self.check_target(tree, templated_parent)?;
        let root = self.content.build(tree, Some(templated_parent))?;

        let elements: Vec<ObjectId> = std::iter::once(root).chain(tree.descendants(root)).collect();
        for id in &elements {
            if tree.templated_parent(*id).is_none() {
                tree.set_templated_parent(*id, Some(templated_parent));
            }
        }
        tree.register_name_scope(root);
        if let Err(err) = tree.add_child(templated_parent, root) {
            tree.remove(root);
            return Err(err.into());
        }
        tree.refresh_bindings(root);
        tracing::debug!(
            "instantiated {} template ({} element(s))",
            self.target_type.name(),
            elements.len()
        );
        Ok(root)
    }
}

/// Apply `template` to `control`, replacing any previous instance
///
/// The control's visual state manager is cleared and rebuilt from the
/// template's state groups, with targets resolved against the new subtree.
pub fn apply_template(
    tree: &mut ElementTree,
    animations: &mut AnimationManager,
    control: ObjectId,
    template: &Rc<ControlTemplate>,
) -> TemplateResult<ObjectId> {
    template.check_target(tree, control)?;

    if get_state_manager(tree, control).is_some() {
        clear_state_manager(tree, animations, control);
    }
    if let Some(previous) = tree.take_attached::<AppliedTemplate>(control) {
        tree.remove(previous.root);
        tracing::debug!("replaced {} template instance", previous.template.target_type.name());
    }

    let root = template.instantiate(tree, control)?;
    tree.set_attached(
        control,
        Rc::new(AppliedTemplate {
            template: Rc::clone(template),
            root,
        }),
    );

    if !template.visual_state_groups.is_empty() {
        let mut manager = VisualStateManager::with_config(tree.config().visual_states.clone());
        for group in &template.visual_state_groups {
            manager.add_group(group.duplicate());
        }
        set_state_manager(tree, control, manager);
    }
    Ok(root)
}

/// Root of the template instance applied to `control`
pub fn template_root(tree: &ElementTree, control: ObjectId) -> Option<ObjectId> {
    tree.attached::<AppliedTemplate>(control)
        .map(|applied| applied.root)
        .filter(|root| tree.contains(*root))
}

pub fn applied_template(tree: &ElementTree, control: ObjectId) -> Option<Rc<ControlTemplate>> {
    tree.attached::<AppliedTemplate>(control)
        .map(|applied| Rc::clone(&applied.template))
}

// =============================================================================
// DATA TEMPLATES
// =============================================================================

/// Visual representation of a data item
#[derive(Clone, Debug)]
pub struct DataTemplate {
    content: TemplateContent,
}

impl DataTemplate {
    pub fn new(content: TemplateContent) -> Self {
        Self { content }
    }

    pub fn from_factory<F>(factory: F) -> Self
    where
        F: Fn(&mut ElementTree) -> ObjectId + 'static,
    {
        Self::new(TemplateContent::Factory(Rc::new(factory)))
    }

    pub fn from_tree(root: ElementSpec) -> Self {
        Self::new(TemplateContent::VisualTree(root))
    }

    /// Build a detached instance whose DataContext is `data`
    pub fn instantiate(&self, tree: &mut ElementTree, data: impl Into<Value>) -> TemplateResult<ObjectId> {
        let root = self.content.build(tree, None)?;
        if let Err(err) = tree.set_local(root, *DATA_CONTEXT, data) {
            tree.remove(root);
            return Err(err.into());
        }
        tree.register_name_scope(root);
        tree.refresh_bindings(root);
        Ok(root)
    }
}
