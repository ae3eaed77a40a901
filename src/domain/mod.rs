pub mod big_number;
pub mod error;
pub mod field;
pub mod row;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use big_number::BigNumber;
pub use error::ValueError;
pub use field::{FieldMeta, StorageType};
pub use row::Row;
pub use schema::{Schema, compare_keys};
pub use value::{DEFAULT_DATE_FORMAT, LazyValue, Value, ValueType};
