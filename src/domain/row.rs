use super::value::Value;

/// One record: a fixed-length positional sequence of values.
///
/// Rows are moved into channels and never mutated once sent. Stages that
/// enlarge a row build a fresh allocation with [`Row::extended`] or
/// [`Row::concat`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// A row of `len` nulls, used as the stand-in for a missing join side
    pub fn nulls(len: usize) -> Self {
        Self {
            values: vec![Value::Null; len],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Concatenate two rows into a new row
    pub fn concat(left: &Row, right: &Row) -> Row {
        let mut values = Vec::with_capacity(left.len() + right.len());
        values.extend_from_slice(&left.values);
        values.extend_from_slice(&right.values);
        Row { values }
    }

    /// Copy of this row with extra values appended
    pub fn extended(&self, extra: impl IntoIterator<Item = Value>) -> Row {
        let extra = extra.into_iter();
        let mut values = Vec::with_capacity(self.len() + extra.size_hint().0);
        values.extend_from_slice(&self.values);
        values.extend(extra);
        Row { values }
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl<V: Into<Value>> FromIterator<V> for Row {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}
