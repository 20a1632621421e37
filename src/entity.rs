use crate::core::{Key, Record, RepoError, Result, Value};
use crate::session::{FetchPlan, LoadContext};
use chrono::{DateTime, Utc};

/// A mapped domain type with a surrogate key.
///
/// Entities convert to and from [`Record`]s keyed by property name. Owning
/// associations appear in the record as the associated key under the
/// association name.
pub trait Entity: Send + Sync + Sized + 'static {
    /// Entity name as registered in the mapping.
    const NAME: &'static str;

    /// Returns the key, or `None` while the entity is transient.
    fn key(&self) -> Option<Key>;

    /// Called once with the key assigned at first persist.
    fn set_key(&mut self, key: Key);

    /// Whether a save should insert. Entities with assigned keys override
    /// this, e.g. by checking an unset creation timestamp.
    fn is_new(&self) -> bool {
        self.key().is_none()
    }

    /// Current state as a record of mapped properties.
    fn to_record(&self) -> Record;

    /// Rebuilds an instance from a fetched record. Associations are obtained
    /// from `ctx` so they resolve through the owning unit of work.
    fn from_record(record: &Record, ctx: &mut LoadContext) -> Result<Self>;

    /// Lifecycle hook run right before the first insert.
    fn on_persist(&mut self) {}

    /// Records of associated entities held in memory, by association name.
    fn associated_records(&self) -> Result<Vec<(&'static str, Record)>> {
        Ok(Vec::new())
    }

    /// Registers loaders for to-one associations that may be fetched eagerly.
    fn fetch_plan(_plan: &mut FetchPlan) {}
}

/// Conversion from a stored [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(expected: &str, value: &Value) -> RepoError {
    RepoError::TypeMismatch(format!("expected {}, got {}", expected, value.type_name()))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Integer(i) => Ok(*i),
            other => Err(mismatch("INTEGER", other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide)
            .map_err(|_| RepoError::TypeMismatch(format!("{} does not fit in i32", wide)))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| mismatch("FLOAT", value))
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_boolean().ok_or_else(|| mismatch("BOOLEAN", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => Err(mismatch("TEXT", other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_timestamp().ok_or_else(|| mismatch("TIMESTAMP", value))
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl Record {
    /// Typed read of a field; a missing field or wrong type is an error naming the field.
    pub fn read<T: FromValue>(&self, name: &str) -> Result<T> {
        T::from_value(self.require(name)?).map_err(|err| match err {
            RepoError::TypeMismatch(msg) => {
                RepoError::TypeMismatch(format!("field '{}': {}", name, msg))
            }
            other => other,
        })
    }
}
