//! Projection shapes and their materialization.
//!
//! A [`ProjectionSpec`] lists the fields a view exposes: plain columns,
//! derived values concatenated from fields and literals (open projections),
//! and nested projections over a many-to-one association. Views are read
//! through [`ClosedView`], which refuses anything the spec does not declare.

mod view;

pub use view::{ClosedView, ViewValue};
pub(crate) use view::{SecondaryViews, build_view};

use crate::config::NestedFetch;
use crate::core::{Key, RepoError, Result, Value};
use crate::mapping::{AssociationKind, MappingRegistry};
use crate::query::{FieldPath, Predicate, QueryDescription, ResultShape};
use crate::session::UnitOfWork;
use async_recursion::async_recursion;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum DerivedPart {
    Field(FieldPath),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionField {
    Column {
        name: String,
        path: FieldPath,
    },
    /// Open projection value, e.g. `username + ' ' + age`.
    Derived {
        name: String,
        parts: Vec<DerivedPart>,
    },
    Nested {
        name: String,
        association: String,
        spec: Box<ProjectionSpec>,
    },
}

impl ProjectionField {
    pub fn name(&self) -> &str {
        match self {
            ProjectionField::Column { name, .. }
            | ProjectionField::Derived { name, .. }
            | ProjectionField::Nested { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionSpec {
    name: String,
    fields: Vec<ProjectionField>,
}

impl ProjectionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Exposes the entity property of the same name.
    pub fn column(self, name: &str) -> Self {
        self.column_as(name, name)
    }

    pub fn column_as(mut self, name: &str, path: &str) -> Self {
        self.fields.push(ProjectionField::Column {
            name: name.to_string(),
            path: FieldPath::new(path),
        });
        self
    }

    pub fn derived(mut self, name: &str, parts: Vec<DerivedPart>) -> Self {
        self.fields.push(ProjectionField::Derived {
            name: name.to_string(),
            parts,
        });
        self
    }

    pub fn nested(mut self, name: &str, association: &str, spec: ProjectionSpec) -> Self {
        self.fields.push(ProjectionField::Nested {
            name: name.to_string(),
            association: association.to_string(),
            spec: Box::new(spec),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[ProjectionField] {
        &self.fields
    }

    pub fn declares(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.name() == field)
    }

    /// Whether the spec computes values beyond plain columns.
    pub fn is_open(&self) -> bool {
        self.fields
            .iter()
            .any(|f| matches!(f, ProjectionField::Derived { .. }))
    }

    /// Paths the executor must select. Nested fields contribute the owning
    /// foreign key, plus the nested columns when they are joined.
    pub fn select_paths(&self, nested: NestedFetch) -> Vec<FieldPath> {
        let mut paths: Vec<FieldPath> = Vec::new();
        let mut push = |path: FieldPath| {
            if !paths.contains(&path) {
                paths.push(path);
            }
        };

        for field in &self.fields {
            match field {
                ProjectionField::Column { path, .. } => push(path.clone()),
                ProjectionField::Derived { parts, .. } => {
                    for part in parts {
                        if let DerivedPart::Field(path) = part {
                            push(path.clone());
                        }
                    }
                }
                ProjectionField::Nested {
                    association, spec, ..
                } => {
                    let assoc = FieldPath::new(association.as_str());
                    push(assoc.clone());
                    if nested == NestedFetch::Join {
                        for path in spec.select_paths(NestedFetch::Join) {
                            push(assoc.child(path.as_str()));
                        }
                    }
                }
            }
        }
        paths
    }

    /// Checks every path against the mapping of `entity`.
    pub fn validate(&self, registry: &MappingRegistry, entity: &str) -> Result<()> {
        for field in &self.fields {
            match field {
                ProjectionField::Column { path, .. } => {
                    registry.resolve_path(entity, path.as_str())?;
                }
                ProjectionField::Derived { parts, .. } => {
                    for part in parts {
                        if let DerivedPart::Field(path) = part {
                            registry.resolve_path(entity, path.as_str())?;
                        }
                    }
                }
                ProjectionField::Nested {
                    name,
                    association,
                    spec,
                } => {
                    let mapping = registry.get(entity)?;
                    let assoc = mapping
                        .association(association)
                        .filter(|a| a.kind == AssociationKind::ManyToOne)
                        .ok_or_else(|| {
                            RepoError::Configuration(format!(
                                "Nested field '{}' of projection '{}' needs a many-to-one association '{}' on '{}'",
                                name, self.name, association, entity
                            ))
                        })?;
                    spec.validate(registry, &assoc.target)?;
                }
            }
        }
        Ok(())
    }
}

/// Any typed view over a projection, usually a hand-written accessor struct.
pub trait Projection: Sized + Send {
    fn spec() -> ProjectionSpec;

    fn from_view(view: &ClosedView) -> Result<Self>;
}

/// Runs `query` with a projection shape and builds one view per row.
///
/// With [`NestedFetch::Secondary`] every distinct associated key costs one
/// additional fetch of the nested projection.
#[async_recursion]
pub(crate) async fn fetch_views(
    uow: &UnitOfWork,
    query: QueryDescription,
    spec: &ProjectionSpec,
    strategy: NestedFetch,
) -> Result<Vec<ClosedView>> {
    let entity = query.entity.clone();
    let rows = uow
        .fetch_rows(&query.shape(ResultShape::Projection {
            spec: spec.clone(),
            nested: strategy,
        }))
        .await?
        .records();

    let mut secondary = SecondaryViews::new();
    if strategy == NestedFetch::Secondary {
        for field in spec.fields() {
            let ProjectionField::Nested {
                name,
                association,
                spec: nested_spec,
            } = field
            else {
                continue;
            };

            let mapping = uow.registry().get(&entity)?;
            let target_entity = mapping
                .association(association)
                .map(|a| a.target.clone())
                .ok_or_else(|| {
                    RepoError::Configuration(format!(
                        "No association '{}' on '{}'",
                        association, entity
                    ))
                })?;
            let id_property = uow.registry().get(&target_entity)?.id.name.clone();

            let mut keys: Vec<Key> = rows
                .iter()
                .filter_map(|row| row.get(association).and_then(Value::as_i64))
                .collect();
            keys.sort_unstable();
            keys.dedup();

            let mut views = HashMap::with_capacity(keys.len());
            for key in keys {
                let nested_query = QueryDescription::new(target_entity.clone())
                    .filter(Predicate::eq(id_property.as_str(), key))
                    .read_only(true);
                let found = fetch_views(uow, nested_query, nested_spec, strategy).await?;
                if let Some(view) = found.into_iter().next() {
                    views.insert(key, view);
                }
            }
            secondary.insert(name.clone(), views);
        }
    }

    rows.iter()
        .map(|row| build_view(spec, row, "", &secondary))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample;

    fn nested_spec() -> ProjectionSpec {
        ProjectionSpec::new("NestedClosedProjection")
            .column("username")
            .nested("team", "team", ProjectionSpec::new("TeamInfo").column("name"))
    }

    #[test]
    fn test_select_paths_per_strategy() {
        let spec = nested_spec();
        let joined: Vec<String> = spec
            .select_paths(NestedFetch::Join)
            .into_iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(joined, vec!["username", "team", "team.name"]);

        let secondary: Vec<String> = spec
            .select_paths(NestedFetch::Secondary)
            .into_iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(secondary, vec!["username", "team"]);
    }

    #[test]
    fn test_validate_against_mapping() {
        let registry = sample::mapping().unwrap();
        assert!(nested_spec().validate(&registry, "Member").is_ok());

        let bad = ProjectionSpec::new("Bad").column("nickname");
        assert!(matches!(
            bad.validate(&registry, "Member"),
            Err(RepoError::Configuration(_))
        ));

        let collection = ProjectionSpec::new("Bad")
            .nested("members", "members", ProjectionSpec::new("M").column("username"));
        assert!(collection.validate(&registry, "Team").is_err());
    }

    #[test]
    fn test_open_projection() {
        let spec = ProjectionSpec::new("MemberSummary").derived(
            "summary",
            vec![
                DerivedPart::Field("username".into()),
                DerivedPart::Literal(" ".into()),
                DerivedPart::Field("age".into()),
            ],
        );
        assert!(spec.is_open());
        let paths: Vec<String> = spec
            .select_paths(NestedFetch::Join)
            .into_iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(paths, vec!["username", "age"]);
    }
}
