//! Declarative descriptions of TRE layouts.
//!
//! A [`Layout`] is an ordered list of [`SchemaEntry`] values. Each entry is either a data field or
//! a control marker that opens or closes a loop or a conditional section. A [`SchemaSet`] groups the
//! alternative layouts known for one tag and picks one based on the length declared in the file.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use bon::Builder;
use derive_more::Deref;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::expr::CountProvider;
use crate::field::FieldType;
use crate::record::Record;

/// Where the repeat count of a loop comes from
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LoopCount {
    /// The integer value of the field named by the entry
    Field,

    /// A literal count
    Constant(i64),

    /// A [`CountProvider`] registered on the schema set under this name
    Provider(String),
}

/// The role of a [`SchemaEntry`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EntryKind {
    /// A value stored in the TRE
    Field(FieldType),
    /// Start of a repeated group
    Loop(LoopCount),
    /// End of the innermost repeated group
    EndLoop,
    /// Start of a section only present when a predicate holds
    If,
    /// End of the innermost conditional section
    EndIf,
    /// Marks the reference used by a following conditional length field
    ComputedLength,
    /// Terminates the layout, never iterated
    End,
}

/// How many bytes a data field occupies
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Length {
    /// A fixed number of bytes
    Fixed(usize),

    /// Computed from the entry immediately before this one
    Conditional,
}

/// One line of a layout
///
/// `name` is a name template for data fields and a reference for control entries. Placeholders
/// written as `[]` are replaced by the index of the enclosing loops, outermost first.
///
/// `expr` holds the embedded expression of the entry:
///
/// | kind                          | expression                                 |
/// |-------------------------------|--------------------------------------------|
/// | loop                          | optional adjustment such as `"+ 1"`        |
/// | if                            | predicate such as `"eq Y"` or `">= 2"`     |
/// | conditional field             | optional adjustment of the computed length |
/// | computed length marker        | optional adjustment of the computed length |
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SchemaEntry {
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,

    pub kind: EntryKind,

    #[cfg_attr(feature = "serde", serde(default = "no_length"))]
    pub length: Length,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub expr: Option<String>,
}

#[cfg(feature = "serde")]
fn no_length() -> Length {
    Length::Fixed(0)
}

impl SchemaEntry {
    fn new(name: impl Into<String>, kind: EntryKind, length: Length, expr: Option<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            length,
            expr,
        }
    }

    /// A data field of fixed length
    pub fn field(name: impl Into<String>, field_type: FieldType, length: usize) -> Self {
        Self::new(name, EntryKind::Field(field_type), Length::Fixed(length), None)
    }

    /// A data field whose length is the value of the previous entry's field
    pub fn conditional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self::new(name, EntryKind::Field(field_type), Length::Conditional, None)
    }

    /// A data field whose length is the value of the previous entry's field, adjusted by `expr`
    pub fn conditional_with(
        name: impl Into<String>,
        field_type: FieldType,
        expr: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            EntryKind::Field(field_type),
            Length::Conditional,
            Some(expr.into()),
        )
    }

    /// A loop repeated as many times as the value of the field `counter`
    pub fn loop_count(counter: impl Into<String>) -> Self {
        Self::new(counter, EntryKind::Loop(LoopCount::Field), Length::Fixed(0), None)
    }

    /// A loop repeated as many times as the value of `counter` adjusted by `expr`
    pub fn loop_count_with(counter: impl Into<String>, expr: impl Into<String>) -> Self {
        Self::new(
            counter,
            EntryKind::Loop(LoopCount::Field),
            Length::Fixed(0),
            Some(expr.into()),
        )
    }

    /// A loop repeated a fixed number of times
    pub fn loop_const(count: i64) -> Self {
        Self::new(
            count.to_string(),
            EntryKind::Loop(LoopCount::Constant(count)),
            Length::Fixed(0),
            None,
        )
    }

    /// A loop whose count is supplied by a registered [`CountProvider`]
    pub fn loop_provider(provider: impl Into<String>) -> Self {
        let provider = provider.into();
        Self::new(
            provider.clone(),
            EntryKind::Loop(LoopCount::Provider(provider)),
            Length::Fixed(0),
            None,
        )
    }

    pub fn end_loop() -> Self {
        Self::new("", EntryKind::EndLoop, Length::Fixed(0), None)
    }

    /// A conditional section entered when `predicate` holds for the field `reference`
    pub fn if_(reference: impl Into<String>, predicate: impl Into<String>) -> Self {
        Self::new(reference, EntryKind::If, Length::Fixed(0), Some(predicate.into()))
    }

    pub fn end_if() -> Self {
        Self::new("", EntryKind::EndIf, Length::Fixed(0), None)
    }

    /// Names the field a following conditional length field is computed from
    pub fn computed_length(reference: impl Into<String>, expr: Option<&str>) -> Self {
        Self::new(
            reference,
            EntryKind::ComputedLength,
            Length::Fixed(0),
            expr.map(str::to_owned),
        )
    }

    pub fn end() -> Self {
        Self::new("", EntryKind::End, Length::Fixed(0), None)
    }

    /// Returns the field type when this entry is a data field
    pub fn field_type(&self) -> Option<FieldType> {
        match self.kind {
            EntryKind::Field(field_type) => Some(field_type),
            _ => None,
        }
    }

    /// The name template with every placeholder removed
    pub fn base_name(&self) -> &str {
        base_name(&self.name)
    }
}

/// The part of a (possibly qualified) name before its first bracket
pub(crate) fn base_name(name: &str) -> &str {
    name.split_once('[').map_or(name, |(base, _)| base)
}

/// One alternative layout of a TRE
#[derive(Debug, Clone, PartialEq, Eq, Deref, Builder)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Layout {
    /// Name of the layout, usually the tag with a version suffix
    #[builder(into)]
    pub name: String,

    /// Ordered entries, optionally terminated with [`EntryKind::End`]
    #[deref]
    pub entries: Vec<SchemaEntry>,

    /// The byte length this layout applies to, if it only fits one
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub length: Option<usize>,
}

impl Layout {
    /// Number of iterable entries, those before the first end sentinel
    pub fn num_entries(&self) -> usize {
        self.entries
            .iter()
            .position(|e| e.kind == EntryKind::End)
            .unwrap_or(self.entries.len())
    }
}

/// All known layouts for a single tag
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SchemaSet {
    pub tag: String,

    pub layouts: Vec<Layout>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub default_index: usize,

    #[cfg_attr(feature = "serde", serde(skip))]
    providers: HashMap<String, Arc<dyn CountProvider>>,
}

impl Debug for SchemaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaSet")
            .field("tag", &self.tag)
            .field("layouts", &self.layouts)
            .field("default_index", &self.default_index)
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SchemaSet {
    pub fn new(tag: impl Into<String>, layouts: Vec<Layout>, default_index: usize) -> Self {
        Self {
            tag: tag.into(),
            layouts,
            default_index,
            providers: HashMap::new(),
        }
    }

    /// A set with one layout that accepts any length
    pub fn single(tag: impl Into<String>, entries: Vec<SchemaEntry>) -> Self {
        let tag = tag.into();
        let layout = Layout::builder()
            .name(tag.clone())
            .entries(entries)
            .build();
        Self::new(tag, vec![layout], 0)
    }

    /// Register a [`CountProvider`] that loops can refer to by `name`
    pub fn with_provider(mut self, name: impl Into<String>, provider: impl CountProvider) -> Self {
        self.register_provider(name, provider);
        self
    }

    /// Register a [`CountProvider`] that loops can refer to by `name`
    pub fn register_provider(&mut self, name: impl Into<String>, provider: impl CountProvider) {
        self.providers.insert(name.into(), Arc::new(provider));
    }

    /// Look up a registered [`CountProvider`]
    pub fn provider(&self, name: &str) -> Option<&dyn CountProvider> {
        self.providers.get(name).map(|p| p.as_ref())
    }

    /// Get a layout by index
    pub fn layout(&self, index: usize) -> Option<&Layout> {
        self.layouts.get(index)
    }

    /// Pick the layout for a TRE that declares `declared_length` bytes
    ///
    /// Returns the index of the chosen layout and the length the record should use. A layout
    /// whose length matches exactly wins. Otherwise the default layout is chosen, and when no
    /// length was declared it lends its own length to the record.
    pub fn select(&self, declared_length: Option<usize>) -> Result<(usize, Option<usize>)> {
        if let Some(length) = declared_length {
            if let Some(index) = self.layouts.iter().position(|l| l.length == Some(length)) {
                debug!(tag = %self.tag, layout = %self.layouts[index].name, "matched layout by length");
                return Ok((index, declared_length));
            }
        }

        let layout = self
            .layouts
            .get(self.default_index)
            .ok_or_else(|| Error::NoMatchingSchema {
                tag: self.tag.clone(),
                message: format!(
                    "default layout {} does not exist in a set of {}",
                    self.default_index,
                    self.layouts.len()
                ),
                context: match declared_length {
                    Some(length) => format!("declared length {length}"),
                    None => "no declared length".into(),
                },
            })?;

        debug!(tag = %self.tag, layout = %layout.name, "using default layout");
        Ok((self.default_index, declared_length.or(layout.length)))
    }
}

/// Schema sets indexed by tag
#[derive(Debug, Clone, Default)]
pub struct Registry {
    sets: HashMap<String, Arc<SchemaSet>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a schema set, replacing any previous set for the same tag
    pub fn register(&mut self, set: SchemaSet) -> Arc<SchemaSet> {
        let set = Arc::new(set);
        self.sets.insert(set.tag.clone(), set.clone());
        set
    }

    /// Look up the schema set for `tag`
    pub fn get(&self, tag: &str) -> Result<Arc<SchemaSet>> {
        self.sets
            .get(tag)
            .cloned()
            .ok_or_else(|| Error::NoMatchingSchema {
                tag: tag.to_owned(),
                message: "tag is not registered".into(),
                context: format!("registry of {} tags", self.sets.len()),
            })
    }

    /// Create an empty record for `tag`
    pub fn record(&self, tag: &str, declared_length: Option<usize>) -> Result<Record> {
        Record::new(self.get(tag)?, declared_length)
    }

    /// Registered tags
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl FromIterator<SchemaSet> for Registry {
    fn from_iter<T: IntoIterator<Item = SchemaSet>>(iter: T) -> Self {
        let mut registry = Registry::new();
        for set in iter {
            registry.register(set);
        }
        registry
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::error::{ErrorCategory, Result};
    use crate::field::FieldType;
    use crate::schema::{Layout, Registry, SchemaEntry, SchemaSet};

    fn layouts() -> Vec<Layout> {
        vec![
            Layout::builder()
                .name("SHORT")
                .entries(vec![SchemaEntry::field("A", FieldType::Text, 4)])
                .length(4)
                .build(),
            Layout::builder()
                .name("LONG")
                .entries(vec![SchemaEntry::field("A", FieldType::Text, 8)])
                .length(8)
                .build(),
        ]
    }

    #[test]
    fn num_entries_stops_at_end() {
        let layout = Layout::builder()
            .name("X")
            .entries(vec![
                SchemaEntry::field("A", FieldType::Text, 1),
                SchemaEntry::field("B", FieldType::Text, 1),
                SchemaEntry::end(),
                SchemaEntry::field("C", FieldType::Text, 1),
            ])
            .build();
        assert_eq!(layout.num_entries(), 2);
    }

    #[test]
    fn select_exact_length() -> Result<()> {
        let set = SchemaSet::new("TEST", layouts(), 0);
        assert_eq!(set.select(Some(8))?, (1, Some(8)));
        assert_eq!(set.select(Some(4))?, (0, Some(4)));
        Ok(())
    }

    #[test]
    fn select_default_keeps_declared_length() -> Result<()> {
        let set = SchemaSet::new("TEST", layouts(), 1);
        assert_eq!(set.select(Some(6))?, (1, Some(6)));
        Ok(())
    }

    #[test]
    fn select_default_adopts_layout_length() -> Result<()> {
        let set = SchemaSet::new("TEST", layouts(), 1);
        assert_eq!(set.select(None)?, (1, Some(8)));
        Ok(())
    }

    #[test]
    fn select_missing_default() {
        let set = SchemaSet::new("TEST", layouts(), 5);
        let err = set.select(Some(3)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NoMatchingSchema);
        assert!(err.to_string().ends_with("(declared length 3)"));
    }

    #[test]
    fn registry_lookup() {
        let registry: Registry = [SchemaSet::single("AAA", vec![])].into_iter().collect();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("AAA").is_ok());
        let err = registry.get("BBB").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NoMatchingSchema);
        assert_eq!(
            err.to_string(),
            "no schema matches BBB: tag is not registered (registry of 1 tags)"
        );
    }

    #[test]
    fn base_names() {
        assert_eq!(SchemaEntry::field("A[][]", FieldType::Text, 1).base_name(), "A");
        assert_eq!(SchemaEntry::field("A", FieldType::Text, 1).base_name(), "A");
    }
}
