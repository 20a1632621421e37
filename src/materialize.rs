//! Conversions between storage rows, records and constructor-bound DTOs.

use crate::core::{Record, RepoError, Result, Row, Value};
use crate::mapping::EntityMapping;
use crate::result::ResultSet;

/// A DTO built positionally from selected columns, like a constructor call.
///
/// `columns` lists the selected property paths in parameter order; a result
/// with a different number of columns is rejected before any row is built.
pub trait FromColumns: Sized {
    fn columns() -> &'static [&'static str];

    fn from_row(row: &[Value]) -> Result<Self>;
}

/// Lays out a property record in storage column order. Missing properties
/// are stored as NULL.
pub fn entity_row(mapping: &EntityMapping, record: &Record) -> Row {
    mapping
        .storage_columns()
        .iter()
        .map(|col| record.get(&col.property).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Labels a storage-ordered row with property names.
pub fn entity_record(mapping: &EntityMapping, row: &[Value]) -> Result<Record> {
    let columns = mapping.storage_columns();
    if columns.len() != row.len() {
        return Err(RepoError::TypeMismatch(format!(
            "{} has {} storage columns, row has {} values",
            mapping.name,
            columns.len(),
            row.len()
        )));
    }
    Ok(columns
        .into_iter()
        .zip(row.iter().cloned())
        .map(|(col, value)| (col.property, value))
        .collect())
}

/// Records keyed by property from a result labelled with physical column
/// names, as native queries return them. Labels may be qualified (`m.age`);
/// columns the mapping does not know are dropped.
pub fn records_by_property(mapping: &EntityMapping, result: &ResultSet) -> Vec<Record> {
    let properties: Vec<Option<String>> = result
        .columns
        .iter()
        .map(|label| {
            let column = label.rsplit('.').next().unwrap_or(label);
            mapping.property_for_column(column)
        })
        .collect();

    result
        .rows()
        .iter()
        .map(|row| {
            properties
                .iter()
                .zip(row.iter())
                .filter_map(|(property, value)| {
                    property.as_ref().map(|p| (p.clone(), value.clone()))
                })
                .collect()
        })
        .collect()
}

/// Builds one DTO per row after checking positional arity.
pub fn materialize_dtos<D: FromColumns>(result: &ResultSet) -> Result<Vec<D>> {
    let expected = D::columns().len();
    if result.columns.len() != expected {
        return Err(RepoError::TypeMismatch(format!(
            "DTO expects {} constructor argument(s) ({}), query selects {} ({})",
            expected,
            D::columns().join(", "),
            result.columns.len(),
            result.columns.join(", ")
        )));
    }
    result.rows().iter().map(|row| D::from_row(row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::FromValue;
    use crate::sample;

    #[derive(Debug, PartialEq)]
    struct NameAge(String, i32);

    impl FromColumns for NameAge {
        fn columns() -> &'static [&'static str] {
            &["username", "age"]
        }

        fn from_row(row: &[Value]) -> Result<Self> {
            Ok(NameAge(String::from_value(&row[0])?, i32::from_value(&row[1])?))
        }
    }

    #[test]
    fn test_entity_row_round_trip() {
        let registry = sample::mapping().unwrap();
        let mapping = registry.get("Member").unwrap();
        let record = Record::new()
            .with("id", 1)
            .with("username", "m1")
            .with("age", 10)
            .with("team", 2);

        let row = entity_row(mapping, &record);
        assert_eq!(row.len(), mapping.storage_columns().len());
        assert_eq!(entity_record(mapping, &row).unwrap(), record);
    }

    #[test]
    fn test_native_labels_map_to_properties() {
        let registry = sample::mapping().unwrap();
        let mapping = registry.get("Member").unwrap();
        let result = ResultSet::new(
            vec!["member_id".into(), "m.username".into(), "extra".into()],
            vec![vec![Value::Integer(1), Value::Text("m1".into()), Value::Null]],
        );
        let records = records_by_property(mapping, &result);
        assert_eq!(
            records[0],
            Record::new().with("id", 1).with("username", "m1")
        );
    }

    #[test]
    fn test_dto_arity_is_checked() {
        let ok = ResultSet::new(
            vec!["username".into(), "age".into()],
            vec![vec![Value::Text("m1".into()), Value::Integer(10)]],
        );
        assert_eq!(
            materialize_dtos::<NameAge>(&ok).unwrap(),
            vec![NameAge("m1".into(), 10)]
        );

        let short = ResultSet::new(vec!["username".into()], vec![]);
        assert!(matches!(
            materialize_dtos::<NameAge>(&short),
            Err(RepoError::TypeMismatch(_))
        ));
    }
}
