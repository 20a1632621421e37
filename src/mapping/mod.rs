//! Mapping metadata: entity → table, field → column, association → join column.
//!
//! Declared once at startup, either with the fluent builder on
//! [`EntityMapping`] or deserialized from JSON, and consumed read-only by the
//! query resolver, the materializer, the projection engine and executors.

mod path;

pub use path::{PathHop, ResolvedPath, Terminal};

use crate::core::{DataType, RepoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub name: String,
    pub column: String,
    pub data_type: DataType,
    #[serde(default = "default_true")]
    pub nullable: bool,
}

impl FieldMapping {
    pub fn new(name: impl Into<String>, column: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            data_type,
            nullable: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchType {
    Eager,
    #[default]
    Lazy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyGeneration {
    /// The executor assigns the next key on insert.
    #[default]
    Identity,
    /// The entity carries its own key before the first persist.
    Assigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssociationKind {
    ManyToOne,
    OneToMany,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationMapping {
    pub name: String,
    pub target: String,
    pub kind: AssociationKind,
    /// Foreign key column on the owning side (`ManyToOne` only).
    #[serde(default)]
    pub join_column: Option<String>,
    /// Owning association name on the target (`OneToMany` only).
    #[serde(default)]
    pub mapped_by: Option<String>,
    #[serde(default)]
    pub fetch: FetchType,
}

impl AssociationMapping {
    pub fn is_owning(&self) -> bool {
        self.kind == AssociationKind::ManyToOne
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Id,
    Field,
    ForeignKey,
}

/// One physical column of an entity table together with the property it backs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageColumn {
    pub property: String,
    pub column: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMapping {
    pub name: String,
    pub table: String,
    pub id: FieldMapping,
    #[serde(default)]
    pub key_generation: KeyGeneration,
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
    #[serde(default)]
    pub associations: Vec<AssociationMapping>,
}

impl EntityMapping {
    /// Starts a mapping with an `id` property stored in column `id`.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        let mut id = FieldMapping::new("id", "id", DataType::Integer);
        id.nullable = false;
        Self {
            name: name.into(),
            table: table.into(),
            id,
            key_generation: KeyGeneration::Identity,
            fields: Vec::new(),
            associations: Vec::new(),
        }
    }

    pub fn id(mut self, name: &str, column: &str) -> Self {
        self.id.name = name.to_string();
        self.id.column = column.to_string();
        self
    }

    pub fn assigned_keys(mut self) -> Self {
        self.key_generation = KeyGeneration::Assigned;
        self
    }

    /// Adds a field stored in a column of the same name.
    pub fn field(self, name: &str, data_type: DataType) -> Self {
        self.column(name, name, data_type)
    }

    pub fn column(mut self, name: &str, column: &str, data_type: DataType) -> Self {
        self.fields.push(FieldMapping::new(name, column, data_type));
        self
    }

    pub fn not_null(mut self) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.nullable = false;
        }
        self
    }

    pub fn many_to_one(mut self, name: &str, target: &str, join_column: &str, fetch: FetchType) -> Self {
        self.associations.push(AssociationMapping {
            name: name.to_string(),
            target: target.to_string(),
            kind: AssociationKind::ManyToOne,
            join_column: Some(join_column.to_string()),
            mapped_by: None,
            fetch,
        });
        self
    }

    pub fn one_to_many(mut self, name: &str, target: &str, mapped_by: &str) -> Self {
        self.associations.push(AssociationMapping {
            name: name.to_string(),
            target: target.to_string(),
            kind: AssociationKind::OneToMany,
            join_column: None,
            mapped_by: Some(mapped_by.to_string()),
            fetch: FetchType::Lazy,
        });
        self
    }

    /// Scalar field (including the id) by property name.
    pub fn field_mapping(&self, name: &str) -> Option<&FieldMapping> {
        if self.id.name == name {
            return Some(&self.id);
        }
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn association(&self, name: &str) -> Option<&AssociationMapping> {
        self.associations.iter().find(|a| a.name == name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.field_mapping(name).is_some() || self.association(name).is_some()
    }

    /// Physical columns in storage order: id, fields, owning foreign keys.
    pub fn storage_columns(&self) -> Vec<StorageColumn> {
        let mut columns = Vec::with_capacity(1 + self.fields.len() + self.associations.len());
        columns.push(StorageColumn {
            property: self.id.name.clone(),
            column: self.id.column.clone(),
            data_type: self.id.data_type,
            nullable: false,
            kind: ColumnKind::Id,
        });
        for field in &self.fields {
            columns.push(StorageColumn {
                property: field.name.clone(),
                column: field.column.clone(),
                data_type: field.data_type,
                nullable: field.nullable,
                kind: ColumnKind::Field,
            });
        }
        for assoc in self.associations.iter().filter(|a| a.is_owning()) {
            if let Some(join_column) = &assoc.join_column {
                columns.push(StorageColumn {
                    property: assoc.name.clone(),
                    column: join_column.clone(),
                    data_type: DataType::Integer,
                    nullable: true,
                    kind: ColumnKind::ForeignKey,
                });
            }
        }
        columns
    }

    /// Storage column backing a property (a field, the id, or an owning association's key).
    pub fn column_for_property(&self, property: &str) -> Option<String> {
        if let Some(field) = self.field_mapping(property) {
            return Some(field.column.clone());
        }
        self.association(property)
            .filter(|a| a.is_owning())
            .and_then(|a| a.join_column.clone())
    }

    pub fn property_for_column(&self, column: &str) -> Option<String> {
        self.storage_columns()
            .into_iter()
            .find(|c| c.column == column)
            .map(|c| c.property)
    }
}

/// All entity mappings known to an application.
#[derive(Debug, Clone, Default)]
pub struct MappingRegistry {
    entities: HashMap<String, EntityMapping>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, mapping: EntityMapping) -> Result<()> {
        if self.entities.contains_key(&mapping.name) {
            return Err(RepoError::Configuration(format!(
                "Entity '{}' is already mapped",
                mapping.name
            )));
        }
        self.entities.insert(mapping.name.clone(), mapping);
        Ok(())
    }

    /// Registers every mapping and validates cross references.
    pub fn from_mappings(mappings: impl IntoIterator<Item = EntityMapping>) -> Result<Self> {
        let mut registry = Self::new();
        for mapping in mappings {
            registry.register(mapping)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Loads a JSON array of entity mappings.
    pub fn from_json(json: &str) -> Result<Self> {
        let mappings: Vec<EntityMapping> = serde_json::from_str(json)?;
        Self::from_mappings(mappings)
    }

    pub fn get(&self, entity: &str) -> Result<&EntityMapping> {
        self.entities
            .get(entity)
            .ok_or_else(|| RepoError::Configuration(format!("Entity '{}' is not mapped", entity)))
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn validate(&self) -> Result<()> {
        for mapping in self.entities.values() {
            let mut seen = std::collections::HashSet::new();
            for column in mapping.storage_columns() {
                if !seen.insert(column.column.clone()) {
                    return Err(RepoError::Configuration(format!(
                        "Entity '{}' maps column '{}' twice",
                        mapping.name, column.column
                    )));
                }
            }

            for assoc in &mapping.associations {
                let target = self.get(&assoc.target).map_err(|_| {
                    RepoError::Configuration(format!(
                        "Association '{}.{}' targets unmapped entity '{}'",
                        mapping.name, assoc.name, assoc.target
                    ))
                })?;

                match assoc.kind {
                    AssociationKind::ManyToOne if assoc.join_column.is_none() => {
                        return Err(RepoError::Configuration(format!(
                            "Association '{}.{}' has no join column",
                            mapping.name, assoc.name
                        )));
                    }
                    AssociationKind::OneToMany => {
                        let mapped_by = assoc.mapped_by.as_deref().unwrap_or_default();
                        let owner = target.association(mapped_by).filter(|owner| {
                            owner.is_owning() && owner.target == mapping.name
                        });
                        if owner.is_none() {
                            return Err(RepoError::Configuration(format!(
                                "Association '{}.{}' is mapped by '{}.{}', which is not an owning reference back to '{}'",
                                mapping.name, assoc.name, assoc.target, mapped_by, mapping.name
                            )));
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Resolves a dotted property path (`team.name`) starting at `entity`.
    pub fn resolve_path(&self, entity: &str, path: &str) -> Result<ResolvedPath> {
        path::resolve(self, entity, path)
    }
}
