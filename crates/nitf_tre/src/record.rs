//! A decoded (or decoding) TRE instance.

use std::fmt::{self, Display};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::field::{Field, FieldType};
use crate::schema::{base_name, Layout, SchemaSet};

/// One TRE: its tag, the layout chosen for it, and the fields read so far
///
/// ```
/// use std::sync::Arc;
/// use nitf_tre::{FieldType, Record, SchemaEntry, SchemaSet};
///
/// # fn main() -> nitf_tre::error::Result<()> {
/// let set = Arc::new(SchemaSet::single(
///     "EXAMPA",
///     vec![
///         SchemaEntry::loop_const(2),
///         SchemaEntry::field("A", FieldType::Text, 3),
///         SchemaEntry::end_loop(),
///         SchemaEntry::field("B", FieldType::NumericText, 4),
///     ],
/// ));
///
/// let mut record = Record::new(set, Some(10))?;
/// record.decode_slice(b"abcdef1234")?;
///
/// assert_eq!(record.field("A[1]").unwrap().as_bytes(), b"def");
/// assert_eq!(record.compute_length()?, 10);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Record {
    tag: String,
    set: Arc<SchemaSet>,
    layout: usize,
    length: Option<usize>,
    fields: IndexMap<String, Field>,
}

impl Record {
    /// Create an empty record, selecting the layout that fits `declared_length`
    #[instrument(skip(set), fields(tag = %set.tag), err)]
    pub fn new(set: Arc<SchemaSet>, declared_length: Option<usize>) -> Result<Record> {
        let (layout, length) = set.select(declared_length)?;
        Ok(Record {
            tag: set.tag.clone(),
            set,
            layout,
            length,
            fields: IndexMap::new(),
        })
    }

    /// The tag of this TRE
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The schema set the layout was chosen from
    pub fn schema_set(&self) -> &Arc<SchemaSet> {
        &self.set
    }

    /// The layout used to walk this record
    pub fn layout(&self) -> &Layout {
        &self.set.layouts[self.layout]
    }

    /// Index of the layout inside [`Record::schema_set`]
    pub fn layout_index(&self) -> usize {
        self.layout
    }

    /// The byte length declared for (or adopted by) this record, if known
    pub fn declared_length(&self) -> Option<usize> {
        self.length
    }

    /// Get a field by its resolved name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Number of populated fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(name, field)` pairs in the order they were first inserted
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Insert or replace a field, returning the previous value
    pub fn insert_field(&mut self, name: impl Into<String>, field: Field) -> Option<Field> {
        self.fields.insert(name.into(), field)
    }

    /// Insert or replace a field built from raw bytes, returning the previous value
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        field_type: FieldType,
        raw: impl Into<Vec<u8>>,
    ) -> Option<Field> {
        self.insert_field(name, Field::new(field_type, raw))
    }

    /// Set the value stored under a resolved name
    ///
    /// The field keeps the type it already has. A new field takes the type of the data entry its
    /// name was declared with, so `BAND[3]` becomes whatever `BAND` is in the layout.
    pub fn set_field(&mut self, name: &str, raw: impl Into<Vec<u8>>) -> Result<()> {
        let field_type = match self.fields.get(name) {
            Some(field) => field.field_type(),
            None => self
                .layout()
                .iter()
                .filter(|e| e.base_name() == base_name(name))
                .find_map(|e| e.field_type())
                .ok_or_else(|| Error::InvalidParameter {
                    message: format!("{name} is not a field of layout {}", self.layout().name),
                    context: self.tag.clone(),
                })?,
        };
        self.insert(name, field_type, raw);
        Ok(())
    }

    /// Remove a field, returning it if it existed
    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.fields.shift_remove(name)
    }

    /// Remove every field
    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.tag, self.layout().name)?;
        for (name, field) in &self.fields {
            writeln!(f, "  {name} = {field}")?;
        }
        Ok(())
    }
}
