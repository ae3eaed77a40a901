use std::cmp::Ordering;

use tracing::warn;

use super::error::ValueError;
use super::field::FieldMeta;
use super::row::Row;

/// Ordered field descriptors describing the rows on a channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<FieldMeta>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema, rejecting duplicate field names
    pub fn from_fields(fields: impl IntoIterator<Item = FieldMeta>) -> Result<Self, ValueError> {
        let mut schema = Self::new();
        for field in fields {
            schema.push(field)?;
        }
        Ok(schema)
    }

    pub fn push(&mut self, field: FieldMeta) -> Result<(), ValueError> {
        if self.index_of(&field.name).is_some() {
            return Err(ValueError::DuplicateField(field.name));
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&FieldMeta> {
        self.fields.get(index)
    }

    /// Position of a field by exact (case-sensitive) name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Resolve a list of field names to positions
    pub fn indexes_of<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>, ValueError> {
        names
            .iter()
            .map(|name| {
                self.index_of(name.as_ref())
                    .ok_or_else(|| ValueError::UnknownField(name.as_ref().to_string()))
            })
            .collect()
    }

    /// Copy of this schema with every field tagged with an origin stage
    pub fn with_origin(&self, origin: &str) -> Schema {
        Schema {
            fields: self
                .fields
                .iter()
                .cloned()
                .map(|f| f.with_origin(origin))
                .collect(),
        }
    }

    /// Concatenate `other` after this schema.
    ///
    /// A right-hand field whose name is already taken is renamed with the
    /// first free `_1`, `_2`, ... suffix so names stay unique.
    pub fn merge(&self, other: &Schema) -> Schema {
        let mut merged = self.clone();
        for field in &other.fields {
            let mut field = field.clone();
            if merged.index_of(&field.name).is_some() {
                let original = field.name.clone();
                let mut suffix = 1;
                while merged.index_of(&format!("{}_{}", original, suffix)).is_some() {
                    suffix += 1;
                }
                field.name = format!("{}_{}", original, suffix);
                warn!(field = %original, renamed = %field.name, "Duplicate field renamed on merge");
            }
            merged.fields.push(field);
        }
        merged
    }

    /// Verify a row has one value per field
    pub fn check_row(&self, row: &Row) -> Result<(), ValueError> {
        if row.len() != self.len() {
            return Err(ValueError::ArityMismatch {
                expected: self.len(),
                actual: row.len(),
            });
        }
        Ok(())
    }

    /// Compare two rows of this schema on the given key positions
    pub fn compare_rows(&self, a: &Row, b: &Row, keys: &[usize]) -> Result<Ordering, ValueError> {
        compare_keys(self, a, keys, self, b, keys)
    }
}

/// Field-by-field comparison of two rows from (possibly) different schemas.
///
/// Key lists must have equal length; ordering rules come from the left field.
pub fn compare_keys(
    left: &Schema,
    left_row: &Row,
    left_keys: &[usize],
    right: &Schema,
    right_row: &Row,
    right_keys: &[usize],
) -> Result<Ordering, ValueError> {
    for (&li, &ri) in left_keys.iter().zip(right_keys) {
        let left_field = left
            .field(li)
            .ok_or_else(|| ValueError::UnknownField(format!("#{}", li)))?;
        let right_field = right
            .field(ri)
            .ok_or_else(|| ValueError::UnknownField(format!("#{}", ri)))?;
        let a = left_row.get(li).ok_or(ValueError::ArityMismatch {
            expected: left.len(),
            actual: left_row.len(),
        })?;
        let b = right_row.get(ri).ok_or(ValueError::ArityMismatch {
            expected: right.len(),
            actual: right_row.len(),
        })?;

        let cmp = left_field.compare_with(a, right_field, b)?;
        if cmp != Ordering::Equal {
            return Ok(cmp);
        }
    }
    Ok(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Value, ValueType};

    fn schema(names: &[&str]) -> Schema {
        Schema::from_fields(names.iter().map(|n| FieldMeta::new(*n, ValueType::Integer))).unwrap()
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut s = schema(&["id"]);
        assert_eq!(
            s.push(FieldMeta::new("id", ValueType::String)),
            Err(ValueError::DuplicateField("id".to_string()))
        );
        // names are case-sensitive
        assert!(s.push(FieldMeta::new("ID", ValueType::String)).is_ok());
    }

    #[test]
    fn merge_renames_collisions() {
        let left = schema(&["id", "name", "name_1"]);
        let right = schema(&["id", "name", "extra"]);
        let merged = left.merge(&right);
        let names: Vec<_> = merged.names().collect();
        assert_eq!(
            names,
            vec!["id", "name", "name_1", "id_1", "name_2", "extra"]
        );
    }

    #[test]
    fn resolves_key_indexes() {
        let s = schema(&["a", "b", "c"]);
        assert_eq!(s.indexes_of(&["c", "a"]).unwrap(), vec![2, 0]);
        assert_eq!(
            s.indexes_of(&["z"]),
            Err(ValueError::UnknownField("z".to_string()))
        );
    }

    #[test]
    fn compares_multi_field_keys() {
        let s = schema(&["a", "b"]);
        let r1 = Row::new(vec![Value::from(1), Value::from(5)]);
        let r2 = Row::new(vec![Value::from(1), Value::from(7)]);
        assert_eq!(s.compare_rows(&r1, &r2, &[0]).unwrap(), Ordering::Equal);
        assert_eq!(s.compare_rows(&r1, &r2, &[0, 1]).unwrap(), Ordering::Less);
    }

    #[test]
    fn compares_keys_across_schemas() {
        let left = schema(&["x", "key"]);
        let right = schema(&["key"]);
        let l = Row::new(vec![Value::from(0), Value::from(3)]);
        let r = Row::new(vec![Value::from(2)]);
        assert_eq!(
            compare_keys(&left, &l, &[1], &right, &r, &[0]).unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn checks_row_arity() {
        let s = schema(&["a", "b"]);
        assert!(s.check_row(&Row::nulls(2)).is_ok());
        assert_eq!(
            s.check_row(&Row::nulls(1)),
            Err(ValueError::ArityMismatch {
                expected: 2,
                actual: 1
            })
        );
    }
}
