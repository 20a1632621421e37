use super::{DerivedPart, ProjectionField, ProjectionSpec};
use crate::core::{Key, Record, RepoError, Result, Value};
use crate::entity::FromValue;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// Nested views fetched separately, by nested field name and associated key.
pub(crate) type SecondaryViews = HashMap<String, HashMap<Key, ClosedView>>;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum ViewValue {
    Scalar(Value),
    Nested(Option<Box<ClosedView>>),
}

/// Read-only view exposing exactly the fields its projection declares.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedView {
    projection: String,
    fields: Vec<(String, ViewValue)>,
}

impl ClosedView {
    pub fn projection(&self) -> &str {
        &self.projection
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    fn lookup(&self, field: &str) -> Result<&ViewValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
            .ok_or_else(|| RepoError::UnsupportedProjectionField {
                projection: self.projection.clone(),
                field: field.to_string(),
            })
    }

    /// Value of a declared scalar field.
    pub fn get(&self, field: &str) -> Result<&Value> {
        match self.lookup(field)? {
            ViewValue::Scalar(value) => Ok(value),
            ViewValue::Nested(_) => Err(RepoError::TypeMismatch(format!(
                "Field '{}' of projection '{}' is a nested projection",
                field, self.projection
            ))),
        }
    }

    pub fn read<T: FromValue>(&self, field: &str) -> Result<T> {
        T::from_value(self.get(field)?).map_err(|err| match err {
            RepoError::TypeMismatch(msg) => RepoError::TypeMismatch(format!(
                "{}.{}: {}",
                self.projection, field, msg
            )),
            other => other,
        })
    }

    /// Nested view of a declared nested field; `None` when the association is null.
    pub fn nested(&self, field: &str) -> Result<Option<&ClosedView>> {
        match self.lookup(field)? {
            ViewValue::Nested(view) => Ok(view.as_deref()),
            ViewValue::Scalar(_) => Err(RepoError::TypeMismatch(format!(
                "Field '{}' of projection '{}' is not a nested projection",
                field, self.projection
            ))),
        }
    }
}

impl Serialize for ClosedView {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Builds the view of one fetched row. Labels in `record` are full paths;
/// `prefix` locates the nested part of a joined row (`team.`).
pub(crate) fn build_view(
    spec: &ProjectionSpec,
    record: &Record,
    prefix: &str,
    secondary: &SecondaryViews,
) -> Result<ClosedView> {
    let label = |path: &str| format!("{}{}", prefix, path);
    let mut fields = Vec::with_capacity(spec.fields().len());

    for field in spec.fields() {
        let value = match field {
            ProjectionField::Column { path, .. } => {
                ViewValue::Scalar(record.require(&label(path.as_str()))?.clone())
            }
            ProjectionField::Derived { parts, .. } => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        DerivedPart::Field(path) => {
                            text.push_str(&render(record.require(&label(path.as_str()))?))
                        }
                        DerivedPart::Literal(literal) => text.push_str(literal),
                    }
                }
                ViewValue::Scalar(Value::Text(text))
            }
            ProjectionField::Nested {
                name,
                association,
                spec: nested,
            } => {
                let assoc_label = label(association);
                let key = record.require(&assoc_label)?.as_i64();
                let view = match key {
                    None => None,
                    Some(key) => match secondary.get(name) {
                        Some(views) => views.get(&key).cloned(),
                        None => Some(build_view(
                            nested,
                            record,
                            &format!("{}.", assoc_label),
                            secondary,
                        )?),
                    },
                };
                ViewValue::Nested(view.map(Box::new))
            }
        };
        fields.push((field.name().to_string(), value));
    }

    Ok(ClosedView {
        projection: spec.name().to_string(),
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn username_only() -> ProjectionSpec {
        ProjectionSpec::new("UsernameOnly").column("username")
    }

    #[test]
    fn test_closed_view_rejects_undeclared_field() {
        let record = Record::new().with("username", "m1").with("age", 10);
        let view = build_view(&username_only(), &record, "", &SecondaryViews::new()).unwrap();
        assert_eq!(view.get("username").unwrap(), &Value::Text("m1".into()));
        let err = view.get("age").unwrap_err();
        assert!(matches!(
            err,
            RepoError::UnsupportedProjectionField { ref field, .. } if field == "age"
        ));
    }

    #[test]
    fn test_joined_nested_view() {
        let spec = ProjectionSpec::new("NestedClosedProjection")
            .column("username")
            .nested("team", "team", ProjectionSpec::new("TeamInfo").column("name"));
        let with_team = Record::new()
            .with("username", "m1")
            .with("team", 1)
            .with("team.name", "teamA");
        let view = build_view(&spec, &with_team, "", &SecondaryViews::new()).unwrap();
        let team = view.nested("team").unwrap().unwrap();
        assert_eq!(team.read::<String>("name").unwrap(), "teamA");
        assert!(team.get("id").is_err());

        let without_team = Record::new()
            .with("username", "m2")
            .with("team", Value::Null)
            .with("team.name", Value::Null);
        let view = build_view(&spec, &without_team, "", &SecondaryViews::new()).unwrap();
        assert!(view.nested("team").unwrap().is_none());
    }

    #[test]
    fn test_derived_value_and_json() {
        let spec = ProjectionSpec::new("MemberSummary").derived(
            "summary",
            vec![
                DerivedPart::Field("username".into()),
                DerivedPart::Literal(" ".into()),
                DerivedPart::Field("age".into()),
            ],
        );
        let record = Record::new().with("username", "m1").with("age", 10);
        let view = build_view(&spec, &record, "", &SecondaryViews::new()).unwrap();
        assert_eq!(view.read::<String>("summary").unwrap(), "m1 10");
        assert_eq!(
            serde_json::to_string(&view).unwrap(),
            r#"{"summary":{"Text":"m1 10"}}"#
        );
    }
}
