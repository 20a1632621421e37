pub mod error;
pub mod types;
pub mod value;

pub use error::{RepoError, Result};
pub use types::{Column, Key, Record, Row, Schema};
pub use value::{DataType, Value};
