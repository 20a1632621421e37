use super::{AssociationKind, FieldMapping, MappingRegistry};
use crate::core::{DataType, RepoError, Result};

/// One many-to-one step of a property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathHop {
    pub association: String,
    pub source: String,
    pub target: String,
    pub join_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// A scalar field or the id of the last entity on the path.
    Field(FieldMapping),
    /// An owning association itself, i.e. its foreign key value.
    ForeignKey { association: String, column: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub root: String,
    pub hops: Vec<PathHop>,
    pub terminal: Terminal,
    /// Entity that owns the terminal column.
    pub owner: String,
}

impl ResolvedPath {
    pub fn column(&self) -> &str {
        match &self.terminal {
            Terminal::Field(field) => &field.column,
            Terminal::ForeignKey { column, .. } => column,
        }
    }

    pub fn data_type(&self) -> DataType {
        match &self.terminal {
            Terminal::Field(field) => field.data_type,
            Terminal::ForeignKey { .. } => DataType::Integer,
        }
    }

    pub fn is_local(&self) -> bool {
        self.hops.is_empty()
    }
}

pub(super) fn resolve(registry: &MappingRegistry, entity: &str, path: &str) -> Result<ResolvedPath> {
    let segments: Vec<&str> = path.split('.').collect();
    if path.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(RepoError::Configuration(format!(
            "Invalid property path '{}' on '{}'",
            path, entity
        )));
    }

    let mut current = registry.get(entity)?;
    let mut hops = Vec::new();

    for (idx, segment) in segments.iter().enumerate() {
        let last = idx + 1 == segments.len();

        if let Some(field) = current.field_mapping(segment) {
            if !last {
                return Err(RepoError::Configuration(format!(
                    "Property '{}' of '{}' is a scalar and cannot be traversed in path '{}'",
                    segment, current.name, path
                )));
            }
            return Ok(ResolvedPath {
                root: entity.to_string(),
                hops,
                terminal: Terminal::Field(field.clone()),
                owner: current.name.clone(),
            });
        }

        let Some(assoc) = current.association(segment) else {
            return Err(RepoError::Configuration(format!(
                "No property '{}' on '{}' (path '{}')",
                segment, current.name, path
            )));
        };

        if assoc.kind == AssociationKind::OneToMany {
            return Err(RepoError::Configuration(format!(
                "Collection association '{}.{}' cannot be used in path '{}'",
                current.name, assoc.name, path
            )));
        }

        let join_column = assoc.join_column.clone().ok_or_else(|| {
            RepoError::Configuration(format!(
                "Association '{}.{}' has no join column",
                current.name, assoc.name
            ))
        })?;

        if last {
            return Ok(ResolvedPath {
                root: entity.to_string(),
                hops,
                terminal: Terminal::ForeignKey {
                    association: assoc.name.clone(),
                    column: join_column,
                },
                owner: current.name.clone(),
            });
        }

        hops.push(PathHop {
            association: assoc.name.clone(),
            source: current.name.clone(),
            target: assoc.target.clone(),
            join_column,
        });
        current = registry.get(&assoc.target)?;
    }

    Err(RepoError::Configuration(format!(
        "Invalid property path '{}' on '{}'",
        path, entity
    )))
}

#[cfg(test)]
mod tests {
    use crate::core::DataType;
    use crate::mapping::{EntityMapping, FetchType, MappingRegistry, Terminal};

    fn registry() -> MappingRegistry {
        MappingRegistry::from_mappings([
            EntityMapping::new("Member", "member")
                .id("id", "member_id")
                .field("username", DataType::Text)
                .many_to_one("team", "Team", "team_id", FetchType::Lazy),
            EntityMapping::new("Team", "team")
                .id("id", "team_id")
                .field("name", DataType::Text)
                .one_to_many("members", "Member", "team"),
        ])
        .unwrap()
    }

    #[test]
    fn test_resolve_across_association() {
        let resolved = registry().resolve_path("Member", "team.name").unwrap();
        assert_eq!(resolved.hops.len(), 1);
        assert_eq!(resolved.hops[0].join_column, "team_id");
        assert_eq!(resolved.owner, "Team");
        assert_eq!(resolved.column(), "name");
    }

    #[test]
    fn test_resolve_foreign_key_terminal() {
        let resolved = registry().resolve_path("Member", "team").unwrap();
        assert!(resolved.is_local());
        assert!(matches!(resolved.terminal, Terminal::ForeignKey { .. }));
        assert_eq!(resolved.column(), "team_id");
    }

    #[test]
    fn test_resolve_rejects_unknown_and_collections() {
        let registry = registry();
        assert!(registry.resolve_path("Member", "nickname").is_err());
        assert!(registry.resolve_path("Member", "username.length").is_err());
        assert!(registry.resolve_path("Team", "members.username").is_err());
        assert!(registry.resolve_path("Member", "team..name").is_err());
    }
}
