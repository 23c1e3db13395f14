//! Walking a record's layout one data field at a time.
//!
//! A [`Cursor`] tracks the position in the layout and a stack of open loops. Each call to
//! [`Cursor::advance`] moves through control entries until it reaches a data field and yields its
//! resolved name and length as a [`Step`]. Loop counts, conditions and conditional lengths are
//! evaluated against the record passed to `advance`, so a decoder can insert each field before
//! asking for the next one.

use std::sync::Arc;

use tracing::trace;

use crate::error::{Error, Result};
use crate::expr;
use crate::field::FieldType;
use crate::name::qualify;
use crate::record::Record;
use crate::schema::{EntryKind, Length, SchemaEntry, SchemaSet};

/// Deepest loop nesting a cursor accepts
pub const MAX_NESTING: usize = 10;

/// A data field reached by a [`Cursor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Resolved name, qualified with the open loop indices
    pub name: String,
    /// Number of bytes the field occupies
    pub length: usize,
    /// Declared encoding of the field
    pub field_type: FieldType,
    /// Index of the entry in the layout
    pub position: usize,
}

/// Lifecycle of a [`Cursor`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CursorState {
    NotStarted,
    Iterating,
    Done,
    Failed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct LoopFrame {
    /// Passes left, including the current one
    remaining: usize,
    /// Zero based index of the current pass
    index: usize,
    /// Position of the loop start entry
    start: usize,
}

/// Open loops, innermost last
#[derive(Debug, Clone, Default)]
struct LoopStack {
    frames: Vec<LoopFrame>,
}

impl LoopStack {
    fn push(&mut self, frame: LoopFrame, context: impl FnOnce() -> String) -> Result<()> {
        if self.frames.len() >= MAX_NESTING {
            return Err(Error::NestingTooDeep {
                limit: MAX_NESTING,
                context: context(),
            });
        }
        self.frames.push(frame);
        Ok(())
    }

    fn pop(&mut self) -> Option<LoopFrame> {
        self.frames.pop()
    }

    fn depth(&self) -> usize {
        self.frames.len()
    }

    fn indices(&self) -> Vec<usize> {
        self.frames.iter().map(|f| f.index).collect()
    }
}

/// Traversal state over the layout of one [`Record`]
///
/// The cursor keeps its own handle on the schema set, not on the record, so the record can be
/// updated between steps. Always pass the same record to every call.
#[derive(Debug, Clone)]
pub struct Cursor {
    set: Arc<SchemaSet>,
    layout: usize,
    num_entries: usize,
    position: Option<usize>,
    name: String,
    length: usize,
    loops: LoopStack,
    state: CursorState,
}

impl Cursor {
    /// Start a walk over the layout of `record`
    pub fn begin(record: &Record) -> Cursor {
        Cursor {
            set: record.schema_set().clone(),
            layout: record.layout_index(),
            num_entries: record.layout().num_entries(),
            position: None,
            name: String::new(),
            length: 0,
            loops: LoopStack::default(),
            state: CursorState::NotStarted,
        }
    }

    fn entry(&self, position: usize) -> &SchemaEntry {
        &self.set.layouts[self.layout].entries[position]
    }

    /// Current position in the layout, `None` before the first step
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Number of iterable entries in the layout
    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    /// Resolved name of the last yielded field
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length of the last yielded field
    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of loops currently open
    pub fn depth(&self) -> usize {
        self.loops.depth()
    }

    /// Indices of the open loops, outermost first
    pub fn indices(&self) -> Vec<usize> {
        self.loops.indices()
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Move to the next data field
    ///
    /// Returns `Ok(None)` once the layout is exhausted. Any error leaves the cursor in the
    /// [`CursorState::Failed`] state, after which it only returns `Ok(None)`.
    pub fn advance(&mut self, record: &Record) -> Result<Option<Step>> {
        match self.state {
            CursorState::Done | CursorState::Failed => return Ok(None),
            _ => self.state = CursorState::Iterating,
        }

        match self.step(record) {
            Ok(Some(step)) => Ok(Some(step)),
            Ok(None) => {
                self.state = CursorState::Done;
                Ok(None)
            }
            Err(e) => {
                self.state = CursorState::Failed;
                Err(e)
            }
        }
    }

    fn step(&mut self, record: &Record) -> Result<Option<Step>> {
        let set = Arc::clone(&self.set);
        let entries = &set.layouts[self.layout].entries;
        let context = |position: usize| format!("{} entry {position}", set.tag);

        loop {
            let position = self.position.map_or(0, |p| p + 1);
            self.position = Some(position);
            if position >= self.num_entries {
                return Ok(None);
            }

            let entry = &entries[position];
            match &entry.kind {
                EntryKind::Field(field_type) => {
                    let indices = self.loops.indices();
                    let name = qualify(&entry.name, &indices)?;
                    let length = match entry.length {
                        Length::Fixed(length) => length,
                        Length::Conditional => {
                            let reference = position
                                .checked_sub(1)
                                .map(|p| &entries[p])
                                .ok_or_else(|| {
                                    Error::malformed(
                                        "conditional length on the first entry",
                                        context(position),
                                    )
                                })?;
                            let length =
                                expr::conditional_length(record, reference, entry, &indices)?;
                            if length == 0 {
                                trace!(%name, "eliding zero length field");
                                continue;
                            }
                            length
                        }
                    };

                    trace!(%name, length, "yielding field");
                    self.name.clone_from(&name);
                    self.length = length;
                    return Ok(Some(Step {
                        name,
                        length,
                        field_type: *field_type,
                        position,
                    }));
                }
                EntryKind::Loop(source) => {
                    let indices = self.loops.indices();
                    let count = expr::loop_count(record, entry, source, &indices)?;
                    if count > 0 {
                        let frame = LoopFrame {
                            remaining: count,
                            index: 0,
                            start: position,
                        };
                        self.loops.push(frame, || context(position))?;
                        trace!(position, count, depth = self.loops.depth(), "entering loop");
                    } else {
                        self.skip_block(
                            position,
                            |k| matches!(k, EntryKind::Loop(_)),
                            |k| *k == EntryKind::EndLoop,
                        );
                        trace!(position, "skipping empty loop");
                    }
                }
                EntryKind::EndLoop => {
                    let frame = self.loops.pop().ok_or_else(|| {
                        Error::malformed("end of loop without a matching start", context(position))
                    })?;
                    if frame.remaining > 1 {
                        self.loops.frames.push(LoopFrame {
                            remaining: frame.remaining - 1,
                            index: frame.index + 1,
                            start: frame.start,
                        });
                        self.position = Some(frame.start);
                    } else {
                        trace!(position, depth = self.loops.depth(), "leaving loop");
                    }
                }
                EntryKind::If => {
                    let indices = self.loops.indices();
                    if !expr::evaluate_if(record, entry, &indices)? {
                        self.skip_block(position, |k| *k == EntryKind::If, |k| *k == EntryKind::EndIf);
                        trace!(position, "skipping conditional section");
                    }
                }
                EntryKind::EndIf | EntryKind::ComputedLength => {}
                EntryKind::End => {
                    return Err(Error::malformed(
                        "end sentinel inside the iterable entries",
                        context(position),
                    ))
                }
            }
        }
    }

    /// Move to the entry closing the block opened at `start`, honouring nested blocks
    fn skip_block(
        &mut self,
        start: usize,
        opens: impl Fn(&EntryKind) -> bool,
        closes: impl Fn(&EntryKind) -> bool,
    ) {
        let mut open = 1usize;
        let mut position = start;
        while open > 0 && position + 1 < self.num_entries {
            position += 1;
            let kind = &self.entry(position).kind;
            if opens(kind) {
                open += 1;
            } else if closes(kind) {
                open -= 1;
            }
        }
        if open > 0 {
            position = self.num_entries;
        }
        self.position = Some(position);
    }

    /// Whether no data field follows the current one
    ///
    /// A fresh cursor walks the layout until it reaches the field this cursor last yielded and
    /// reports whether anything comes after it. The walk costs a full pass over the layout and
    /// never touches this cursor.
    pub fn is_done(&self, record: &Record) -> bool {
        if self.position.is_none() {
            return false;
        }

        if self.loops.frames.iter().any(|f| f.remaining > 1) {
            return false;
        }

        let mut replay = Cursor::begin(record);
        let mut found = false;
        loop {
            match replay.advance(record) {
                Ok(Some(step)) => {
                    if found {
                        return false;
                    }
                    found = step.name == self.name;
                }
                Ok(None) | Err(_) => return true,
            }
        }
    }
}

/// Iterator over the data fields of a record, see [`Record::steps`]
#[derive(Debug)]
pub struct Steps<'a> {
    cursor: Cursor,
    record: &'a Record,
}

impl Iterator for Steps<'_> {
    type Item = Result<Step>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.advance(self.record).transpose()
    }
}

impl Record {
    /// Walk the layout against the fields currently stored
    pub fn steps(&self) -> Steps<'_> {
        Steps {
            cursor: Cursor::begin(self),
            record: self,
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::cursor::{Cursor, CursorState, MAX_NESTING};
    use crate::error::{ErrorCategory, Result};
    use crate::field::FieldType;
    use crate::record::Record;
    use crate::schema::{SchemaEntry, SchemaSet};

    fn record(entries: Vec<SchemaEntry>) -> Result<Record> {
        Record::new(Arc::new(SchemaSet::single("TEST", entries)), None)
    }

    fn names(record: &Record) -> Result<Vec<String>> {
        record
            .steps()
            .map(|s| s.map(|s| s.name))
            .collect::<Result<Vec<_>>>()
    }

    #[traced_test]
    #[test]
    fn constant_loop_indexes_names() -> Result<()> {
        let record = record(vec![
            SchemaEntry::loop_const(3),
            SchemaEntry::field("A", FieldType::Text, 1),
            SchemaEntry::end_loop(),
            SchemaEntry::field("B", FieldType::Text, 1),
        ])?;
        assert_eq!(names(&record)?, vec!["A[0]", "A[1]", "A[2]", "B"]);
        Ok(())
    }

    #[traced_test]
    #[test]
    fn empty_loop_lands_after_matching_end() -> Result<()> {
        let mut record = record(vec![
            SchemaEntry::field("N", FieldType::NumericText, 1),
            SchemaEntry::loop_count("N"),
            SchemaEntry::loop_const(2),
            SchemaEntry::field("INNER", FieldType::Text, 1),
            SchemaEntry::end_loop(),
            SchemaEntry::field("OUTER", FieldType::Text, 1),
            SchemaEntry::end_loop(),
            SchemaEntry::field("AFTER", FieldType::Text, 1),
        ])?;
        record.insert("N", FieldType::NumericText, "0");
        assert_eq!(names(&record)?, vec!["N", "AFTER"]);
        Ok(())
    }

    #[traced_test]
    #[test]
    fn nested_loops() -> Result<()> {
        let mut record = record(vec![
            SchemaEntry::field("ROWS", FieldType::NumericText, 1),
            SchemaEntry::loop_count("ROWS"),
            SchemaEntry::field("COLS", FieldType::NumericText, 1),
            SchemaEntry::loop_count("COLS"),
            SchemaEntry::field("V", FieldType::Text, 1),
            SchemaEntry::end_loop(),
            SchemaEntry::end_loop(),
        ])?;
        record.insert("ROWS", FieldType::NumericText, "2");
        record.insert("COLS[0]", FieldType::NumericText, "1");
        record.insert("COLS[1]", FieldType::NumericText, "2");
        assert_eq!(
            names(&record)?,
            vec!["ROWS", "COLS[0]", "V[0][0]", "COLS[1]", "V[1][0]", "V[1][1]"]
        );
        Ok(())
    }

    #[traced_test]
    #[test]
    fn false_condition_skips_nested_sections() -> Result<()> {
        let mut record = record(vec![
            SchemaEntry::field("FLAG", FieldType::Text, 1),
            SchemaEntry::if_("FLAG", "eq Y"),
            SchemaEntry::if_("FLAG", "eq Y"),
            SchemaEntry::field("INNER", FieldType::Text, 1),
            SchemaEntry::end_if(),
            SchemaEntry::field("OUTER", FieldType::Text, 1),
            SchemaEntry::end_if(),
            SchemaEntry::field("AFTER", FieldType::Text, 1),
        ])?;
        record.insert("FLAG", FieldType::Text, "N");
        assert_eq!(names(&record)?, vec!["FLAG", "AFTER"]);

        record.insert("FLAG", FieldType::Text, "Y");
        assert_eq!(names(&record)?, vec!["FLAG", "INNER", "OUTER", "AFTER"]);
        Ok(())
    }

    #[traced_test]
    #[test]
    fn zero_conditional_length_is_elided() -> Result<()> {
        let mut record = record(vec![
            SchemaEntry::field("N", FieldType::NumericText, 2),
            SchemaEntry::conditional("DATA", FieldType::Binary),
            SchemaEntry::field("TAIL", FieldType::Text, 1),
        ])?;
        record.insert("N", FieldType::NumericText, "00");
        assert_eq!(names(&record)?, vec!["N", "TAIL"]);

        record.insert("N", FieldType::NumericText, "04");
        let steps = record.steps().collect::<Result<Vec<_>>>()?;
        assert_eq!(steps[1].name, "DATA");
        assert_eq!(steps[1].length, 4);
        Ok(())
    }

    #[traced_test]
    #[test]
    fn many_elided_fields_in_a_row() -> Result<()> {
        let mut entries = vec![SchemaEntry::field("N", FieldType::NumericText, 1)];
        for _ in 0..10_000 {
            entries.push(SchemaEntry::computed_length("N", None));
            entries.push(SchemaEntry::conditional("D", FieldType::Binary));
        }
        let mut record = record(entries)?;
        record.insert("N", FieldType::NumericText, "0");
        assert_eq!(names(&record)?, vec!["N"]);
        Ok(())
    }

    #[test]
    fn nesting_too_deep() -> Result<()> {
        let mut entries = Vec::new();
        for _ in 0..=MAX_NESTING {
            entries.push(SchemaEntry::loop_const(1));
        }
        entries.push(SchemaEntry::field("A", FieldType::Text, 1));
        for _ in 0..=MAX_NESTING {
            entries.push(SchemaEntry::end_loop());
        }
        let record = record(entries)?;
        let err = record.steps().find_map(|s| s.err()).unwrap();
        assert_eq!(err.category(), ErrorCategory::NestingTooDeep);
        Ok(())
    }

    #[test]
    fn unbalanced_end_loop() -> Result<()> {
        let record = record(vec![SchemaEntry::end_loop()])?;
        let mut cursor = Cursor::begin(&record);
        let err = cursor.advance(&record).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::MalformedSchema);
        assert_eq!(cursor.state(), CursorState::Failed);
        assert_eq!(cursor.advance(&record)?, None);
        Ok(())
    }

    #[test]
    fn unresolved_loop_counter() -> Result<()> {
        let record = record(vec![
            SchemaEntry::loop_count("MISSING"),
            SchemaEntry::field("A", FieldType::Text, 1),
            SchemaEntry::end_loop(),
        ])?;
        let err = record.steps().find_map(|s| s.err()).unwrap();
        assert_eq!(err.category(), ErrorCategory::UnresolvedReference);
        Ok(())
    }

    #[test]
    fn stops_at_end_sentinel() -> Result<()> {
        let record = record(vec![
            SchemaEntry::field("A", FieldType::Text, 1),
            SchemaEntry::end(),
            SchemaEntry::field("B", FieldType::Text, 1),
        ])?;
        assert_eq!(names(&record)?, vec!["A"]);
        Ok(())
    }

    #[traced_test]
    #[test]
    fn is_done_replays_without_mutating() -> Result<()> {
        let record = record(vec![
            SchemaEntry::loop_const(2),
            SchemaEntry::field("A", FieldType::Text, 1),
            SchemaEntry::end_loop(),
            SchemaEntry::field("B", FieldType::Text, 1),
        ])?;

        let mut cursor = Cursor::begin(&record);
        assert!(!cursor.is_done(&record));
        assert_eq!(cursor.position(), None);

        let mut seen = Vec::new();
        while let Some(step) = cursor.advance(&record)? {
            let before = (cursor.position(), cursor.indices(), cursor.name().to_owned());
            seen.push((step.name, cursor.is_done(&record)));
            assert_eq!(
                before,
                (cursor.position(), cursor.indices(), cursor.name().to_owned())
            );
        }

        assert_eq!(
            seen,
            vec![
                ("A[0]".to_owned(), false),
                ("A[1]".to_owned(), false),
                ("B".to_owned(), true),
            ]
        );
        assert!(cursor.is_done(&record));
        assert_eq!(cursor.state(), CursorState::Done);
        Ok(())
    }
}
