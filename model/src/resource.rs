use crate::error::{self, Result};
use serde_yaml::{Mapping, Value};
use snafu::{OptionExt, ResultExt, Snafu};
use std::collections::BTreeMap;

/// Why a typed lookup into a [`Resource`] did not produce a value.
#[derive(Debug, Clone, Eq, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FieldError {
    #[snafu(display("Field '{}' not found", path))]
    NotFound { path: String },

    #[snafu(display("Field '{}' is not a {}", path, expected))]
    TypeMismatch { path: String, expected: &'static str },
}

/// One cluster object as returned by `kubectl get <kind> <name> -o yaml`.
///
/// No schema is enforced: the document is the decoded YAML mapping, and callers project out the
/// fields they care about with the typed accessors. Paths are given as segments so that keys
/// containing dots (annotations, labels) can be addressed, e.g.
/// `["metadata", "annotations", "pv.kubernetes.io/bind-completed"]`. A segment applied to a
/// sequence is parsed as an index.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    value: Value,
}

impl Resource {
    /// Decode `text` (the output of `command`) into a `Resource`. Either the whole document is
    /// decoded into a mapping or an error is returned.
    pub(crate) fn decode(command: &str, text: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(text).context(error::DecodeSnafu { command })?;
        Self::from_value(value).context(error::DecodeShapeSnafu {
            command,
            expected: "mapping",
        })
    }

    /// Wrap `value`, which must be a mapping.
    pub fn from_value(value: Value) -> Option<Self> {
        if value.is_mapping() {
            Some(Self { value })
        } else {
            None
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Look up the raw value at `path`.
    pub fn get(&self, path: &[&str]) -> std::result::Result<&Value, FieldError> {
        let mut current = &self.value;
        for (depth, segment) in path.iter().enumerate() {
            let next = match current {
                Value::Mapping(mapping) => mapping.get(&Value::String((*segment).to_string())),
                Value::Sequence(sequence) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| sequence.get(index)),
                _ => None,
            };
            current = match next {
                Some(Value::Null) | None => {
                    return NotFoundSnafu {
                        path: join(&path[..=depth]),
                    }
                    .fail()
                }
                Some(value) => value,
            };
        }
        Ok(current)
    }

    /// `true` if `path` resolves to a non-null value.
    pub fn contains(&self, path: &[&str]) -> bool {
        self.get(path).is_ok()
    }

    pub fn str_at(&self, path: &[&str]) -> std::result::Result<&str, FieldError> {
        self.get(path)?
            .as_str()
            .context(TypeMismatchSnafu {
                path: join(path),
                expected: "string",
            })
    }

    pub fn bool_at(&self, path: &[&str]) -> std::result::Result<bool, FieldError> {
        self.get(path)?
            .as_bool()
            .context(TypeMismatchSnafu {
                path: join(path),
                expected: "boolean",
            })
    }

    pub fn i64_at(&self, path: &[&str]) -> std::result::Result<i64, FieldError> {
        self.get(path)?
            .as_i64()
            .context(TypeMismatchSnafu {
                path: join(path),
                expected: "integer",
            })
    }

    pub fn list_at(&self, path: &[&str]) -> std::result::Result<&[Value], FieldError> {
        self.get(path)?
            .as_sequence()
            .map(Vec::as_slice)
            .context(TypeMismatchSnafu {
                path: join(path),
                expected: "sequence",
            })
    }

    pub fn map_at(&self, path: &[&str]) -> std::result::Result<&Mapping, FieldError> {
        self.get(path)?
            .as_mapping()
            .context(TypeMismatchSnafu {
                path: join(path),
                expected: "mapping",
            })
    }

    /// The elements of the sequence at `path`, each wrapped as a `Resource`. Elements that are
    /// not mappings are a type mismatch.
    pub fn resources_at(&self, path: &[&str]) -> std::result::Result<Vec<Resource>, FieldError> {
        self.list_at(path)?
            .iter()
            .map(|value| {
                Resource::from_value(value.clone()).context(TypeMismatchSnafu {
                    path: format!("{}[]", join(path)),
                    expected: "mapping",
                })
            })
            .collect()
    }

    /// `metadata.name`
    pub fn name(&self) -> std::result::Result<&str, FieldError> {
        self.str_at(&["metadata", "name"])
    }

    /// `metadata.labels`, empty when the object has none. Non-string label values are skipped.
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.map_at(&["metadata", "labels"])
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// The `items` of a list-style query such as `kubectl get pods -o yaml`, in the order the control
/// plane listed them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceList {
    items: Vec<Resource>,
}

impl ResourceList {
    pub(crate) fn decode(command: &str, text: &str) -> Result<Self> {
        let document = Resource::decode(command, text)?;
        let items = document
            .resources_at(&["items"])
            .or_else(|e| match e {
                // `items: null` or a missing key both mean "nothing listed".
                FieldError::NotFound { .. } => Ok(Vec::new()),
                FieldError::TypeMismatch { .. } => Err(e),
            })
            .ok()
            .context(error::DecodeShapeSnafu {
                command,
                expected: "list of objects under 'items'",
            })?;
        Ok(Self { items })
    }

    pub fn new(items: Vec<Resource>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[Resource] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Resource> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.items.iter()
    }

    /// The `metadata.name` of every item, in listing order.
    pub fn names(&self) -> std::result::Result<Vec<&str>, FieldError> {
        self.items.iter().map(Resource::name).collect()
    }

    /// The first item whose `metadata.name` is `name`.
    pub fn find(&self, name: &str) -> Option<&Resource> {
        self.items
            .iter()
            .find(|item| item.name().map(|n| n == name).unwrap_or(false))
    }
}

impl IntoIterator for ResourceList {
    type Item = Resource;
    type IntoIter = std::vec::IntoIter<Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResourceList {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

fn join(path: &[&str]) -> String {
    path.join(".")
}
