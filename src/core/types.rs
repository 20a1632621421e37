use super::{DataType, RepoError, Result, Value};
use serde::{Deserialize, Serialize};

pub type Row = Vec<Value>;

/// Surrogate identity of an entity row.
pub type Key = i64;

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if matches!(value, Value::Null) {
            if !self.nullable {
                return Err(RepoError::ConstraintViolation(format!(
                    "Column '{}' cannot be NULL",
                    self.name
                )));
            }
            return Ok(());
        }

        if !self.data_type.accepts(value) {
            return Err(RepoError::TypeMismatch(format!(
                "Column '{}' expects type {}, got {}",
                self.name,
                self.data_type,
                value.type_name()
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn find_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Ordered field-name to value pairs.
///
/// This is the neutral shape that entities, storage rows and projections are
/// converted through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Inserts or replaces a value, keeping the original position on replace.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// Like [`Record::get`] but a missing field is an error naming the field.
    pub fn require(&self, name: &str) -> Result<&Value> {
        self.get(name)
            .ok_or_else(|| RepoError::Execution(format!("Record has no field '{}'", name)))
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Field names whose values differ from `other` (missing counts as different).
    pub fn changed_fields(&self, other: &Record) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(name, value)| other.get(name) != Some(value))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.set(name, value);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_set_replaces_in_place() {
        let mut record = Record::new().with("id", 1i64).with("username", "m1");
        record.set("id", 2i64);
        let names: Vec<_> = record.names().collect();
        assert_eq!(names, vec!["id", "username"]);
        assert_eq!(record.get("id"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_changed_fields() {
        let before = Record::new().with("username", "a").with("age", 10i64);
        let after = Record::new().with("username", "b").with("age", 10i64);
        assert_eq!(after.changed_fields(&before), vec!["username".to_string()]);
    }

    #[test]
    fn test_column_validate() {
        let column = Column::new("age", DataType::Integer).not_null();
        assert!(column.validate(&Value::Integer(3)).is_ok());
        assert!(matches!(
            column.validate(&Value::Null),
            Err(RepoError::ConstraintViolation(_))
        ));
        assert!(matches!(
            column.validate(&Value::Text("x".into())),
            Err(RepoError::TypeMismatch(_))
        ));
    }
}
