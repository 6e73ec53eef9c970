//! Dotted property paths
//!
//! A [`PropertyPath`] names a chain of properties, each applied to the object
//! the previous one evaluated to: `Background.Color` reads `Background` (a
//! brush reference) and then `Color` on that brush. Segments may be
//! owner-qualified in parentheses, `(SolidColorBrush.Color)`, which restricts
//! resolution to properties declared by that owner.

use smallvec::SmallVec;
use std::fmt;

use crate::error::BindingError;
use crate::registry::Property;
use crate::tree::{ElementTree, ObjectId};
use crate::value::Value;

/// One step of a path
#[derive(Clone, Debug, PartialEq)]
pub enum PathSegment {
    /// Resolved by name against the object's type at resolution time
    Named { owner: Option<String>, name: String },
    /// A specific registered property
    Property(Property),
}

impl PathSegment {
    fn resolve(&self, tree: &ElementTree, object: ObjectId) -> Option<Property> {
        let ty = tree.object_type(object)?;
        match self {
            PathSegment::Property(property) => {
                (property.is_attached() || ty.is_a(property.owner())).then_some(*property)
            }
            PathSegment::Named { owner, name } => {
                let property = tree.registry().find(ty, name)?;
                match owner {
                    Some(owner) if property.owner().name() != owner => None,
                    _ => Some(property),
                }
            }
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Named { owner: Some(owner), name } => write!(f, "({owner}.{name})"),
            PathSegment::Named { owner: None, name } => write!(f, "{name}"),
            PathSegment::Property(property) => write!(f, "({})", property.qualified_name()),
        }
    }
}

/// Outcome of walking a path from a root value
#[derive(Clone, Debug)]
pub struct PathResolution {
    /// Every `(object, property)` link that resolved, in path order
    pub links: SmallVec<[(ObjectId, Property); 2]>,
    /// Leaf value, or why the walk stopped
    pub result: Result<Value, BindingError>,
}

impl PathResolution {
    /// The leaf link, when the whole path resolved
    pub fn leaf(&self) -> Option<(ObjectId, Property)> {
        match self.result {
            Ok(_) => self.links.last().copied(),
            Err(_) => None,
        }
    }
}

/// A parsed property path; the empty path denotes the root itself
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyPath {
    segments: SmallVec<[PathSegment; 2]>,
}

impl PropertyPath {
    /// Parse `A.B.(Owner.C)`; empty segments are ignored
    pub fn parse(text: &str) -> Self {
        let mut segments = SmallVec::new();
        let mut depth = 0usize;
        let mut start = 0;
        for (i, ch) in text.char_indices() {
            match ch {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                '.' if depth == 0 => {
                    push_segment(&mut segments, &text[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        push_segment(&mut segments, &text[start..]);
        Self { segments }
    }

    pub fn from_property(property: Property) -> Self {
        let mut segments = SmallVec::new();
        segments.push(PathSegment::Property(property));
        Self { segments }
    }

    /// Append a property segment
    pub fn then(mut self, property: Property) -> Self {
        self.segments.push(PathSegment::Property(property));
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Walk the path starting from `root`
    pub fn resolve(&self, tree: &ElementTree, root: Value) -> PathResolution {
        let mut links = SmallVec::new();
        let mut current = root;

        for (index, segment) in self.segments.iter().enumerate() {
            let object = match current {
                Value::Object(id) if tree.contains(id) => id,
                Value::Object(_) if index == 0 => {
                    return PathResolution {
                        links,
                        result: Err(BindingError::SourceMissing),
                    }
                }
                Value::Object(_) | Value::Null => {
                    return PathResolution {
                        links,
                        result: Err(BindingError::NullIntermediate {
                            path: self.to_string(),
                            segment: segment.to_string(),
                        }),
                    }
                }
                other => {
                    return PathResolution {
                        links,
                        result: Err(BindingError::PathResolutionFailed {
                            path: self.to_string(),
                            segment: segment.to_string(),
                            object_type: other.tag(),
                        }),
                    }
                }
            };

            let Some(property) = segment.resolve(tree, object) else {
                return PathResolution {
                    links,
                    result: Err(BindingError::PathResolutionFailed {
                        path: self.to_string(),
                        segment: segment.to_string(),
                        object_type: tree.object_type(object).map_or("?", |t| t.name()),
                    }),
                };
            };
            links.push((object, property));
            current = tree.get(object, property);
        }

        PathResolution {
            links,
            result: Ok(current),
        }
    }

    /// Resolve to the `(object, property)` slot the path ends at
    pub fn resolve_target(&self, tree: &ElementTree, root: ObjectId) -> Result<(ObjectId, Property), BindingError> {
        if self.is_empty() {
            return Err(BindingError::PathResolutionFailed {
                path: String::new(),
                segment: String::new(),
                object_type: tree.object_type(root).map_or("?", |t| t.name()),
            });
        }
        let resolution = self.resolve(tree, Value::Object(root));
        match resolution.result {
            Ok(_) => resolution
                .links
                .last()
                .copied()
                .ok_or(BindingError::SourceMissing),
            Err(err) => Err(err),
        }
    }
}

fn push_segment(segments: &mut SmallVec<[PathSegment; 2]>, raw: &str) {
    let raw = raw.trim();
    if raw.is_empty() {
        return;
    }
    let inner = raw
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .map(str::trim);
    let segment = match inner {
        Some(qualified) => match qualified.rsplit_once('.') {
            Some((owner, name)) => PathSegment::Named {
                owner: Some(owner.trim().to_string()),
                name: name.trim().to_string(),
            },
            None => PathSegment::Named {
                owner: None,
                name: qualified.to_string(),
            },
        },
        None => PathSegment::Named {
            owner: None,
            name: raw.to_string(),
        },
    };
    segments.push(segment);
}

impl From<&str> for PropertyPath {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<Property> for PropertyPath {
    fn from(property: Property) -> Self {
        Self::from_property(property)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}
