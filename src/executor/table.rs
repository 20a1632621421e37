use crate::core::{Column, Key, RepoError, Result, Row, Schema, Value};
use crate::mapping::{EntityMapping, KeyGeneration};
use std::collections::BTreeMap;

/// Rows of one entity table, keyed by entity key and stored in mapping column order.
#[derive(Debug, Clone)]
pub struct Table {
    entity: String,
    name: String,
    schema: Schema,
    key_generation: KeyGeneration,
    rows: BTreeMap<Key, Row>,
    next_key: Key,
}

impl Table {
    pub fn new(mapping: &EntityMapping) -> Self {
        let columns = mapping
            .storage_columns()
            .into_iter()
            .map(|c| {
                let column = Column::new(c.column, c.data_type);
                if c.nullable { column } else { column.not_null() }
            })
            .collect();

        Self {
            entity: mapping.name.clone(),
            name: mapping.table.clone(),
            schema: Schema::new(columns),
            key_generation: mapping.key_generation,
            rows: BTreeMap::new(),
            next_key: 1,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.schema.find_column_index(column).ok_or_else(|| {
            RepoError::Execution(format!("Table '{}' has no column '{}'", self.name, column))
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: Key) -> Option<&Row> {
        self.rows.get(&key)
    }

    pub fn scan(&self) -> impl Iterator<Item = (Key, &Row)> {
        self.rows.iter().map(|(key, row)| (*key, row))
    }

    /// Inserts a row whose first column is the key. A null key is assigned
    /// for identity tables and rejected for assigned-key tables.
    pub fn insert(&mut self, mut row: Row) -> Result<Key> {
        let key = match row.first() {
            Some(Value::Null) | None => match self.key_generation {
                KeyGeneration::Identity => {
                    let key = self.next_key;
                    if row.is_empty() {
                        row.push(Value::Integer(key));
                    } else {
                        row[0] = Value::Integer(key);
                    }
                    key
                }
                KeyGeneration::Assigned => {
                    return Err(RepoError::ConstraintViolation(format!(
                        "{} uses assigned keys but no key was set",
                        self.entity
                    )));
                }
            },
            Some(value) => value.as_i64().ok_or_else(|| {
                RepoError::TypeMismatch(format!(
                    "Key of {} must be an integer, got {}",
                    self.entity,
                    value.type_name()
                ))
            })?,
        };

        self.validate_row(&row)?;
        if self.rows.contains_key(&key) {
            return Err(RepoError::ConstraintViolation(format!(
                "Duplicate key {} in table '{}'",
                key, self.name
            )));
        }

        self.next_key = self.next_key.max(key.saturating_add(1));
        self.rows.insert(key, row);
        Ok(key)
    }

    /// Replaces a row, returning the previous version.
    pub fn update(&mut self, key: Key, row: Row) -> Result<Option<Row>> {
        self.validate_row(&row)?;
        if row.first().and_then(Value::as_i64) != Some(key) {
            return Err(RepoError::ConstraintViolation(format!(
                "Cannot change the key of {}#{}",
                self.entity, key
            )));
        }
        Ok(self
            .rows
            .get_mut(&key)
            .map(|existing| std::mem::replace(existing, row)))
    }

    pub fn delete(&mut self, key: Key) -> Option<Row> {
        self.rows.remove(&key)
    }

    /// Puts a row back exactly as it was; used when undoing changes.
    pub fn restore(&mut self, key: Key, row: Row) {
        self.rows.insert(key, row);
    }

    fn validate_row(&self, row: &Row) -> Result<()> {
        let columns = self.schema.columns();
        if row.len() != columns.len() {
            return Err(RepoError::Execution(format!(
                "Table '{}' expects {} columns, got {}",
                self.name,
                columns.len(),
                row.len()
            )));
        }
        for (column, value) in columns.iter().zip(row.iter()) {
            column.validate(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;

    fn member_table() -> Table {
        Table::new(
            &EntityMapping::new("Member", "member")
                .id("id", "member_id")
                .field("username", DataType::Text)
                .not_null()
                .field("age", DataType::Integer),
        )
    }

    #[test]
    fn test_identity_keys() {
        let mut table = member_table();
        let k1 = table
            .insert(vec![Value::Null, "m1".into(), 10.into()])
            .unwrap();
        let k2 = table
            .insert(vec![Value::Null, "m2".into(), 20.into()])
            .unwrap();
        assert_eq!((k1, k2), (1, 2));
        assert_eq!(table.get(2).unwrap()[0], Value::Integer(2));
    }

    #[test]
    fn test_constraints() {
        let mut table = member_table();
        let err = table
            .insert(vec![Value::Null, Value::Null, 10.into()])
            .unwrap_err();
        assert!(matches!(err, RepoError::ConstraintViolation(_)));

        table.insert(vec![5.into(), "m5".into(), 1.into()]).unwrap();
        let err = table
            .insert(vec![5.into(), "again".into(), 1.into()])
            .unwrap_err();
        assert!(matches!(err, RepoError::ConstraintViolation(_)));
        assert_eq!(
            table.insert(vec![Value::Null, "m6".into(), 1.into()]).unwrap(),
            6
        );
    }

    #[test]
    fn test_largest_assigned_key_does_not_overflow() {
        let mut table = member_table();
        table
            .insert(vec![i64::MAX.into(), "last".into(), 1.into()])
            .unwrap();
        let err = table
            .insert(vec![Value::Null, "next".into(), 1.into()])
            .unwrap_err();
        assert!(matches!(err, RepoError::ConstraintViolation(_)));
    }

    #[test]
    fn test_update_returns_previous_row() {
        let mut table = member_table();
        let key = table
            .insert(vec![Value::Null, "m1".into(), 10.into()])
            .unwrap();
        let old = table
            .update(key, vec![key.into(), "m1".into(), 11.into()])
            .unwrap()
            .unwrap();
        assert_eq!(old[2], Value::Integer(10));
        assert!(table
            .update(99, vec![99.into(), "x".into(), 1.into()])
            .unwrap()
            .is_none());
    }
}
