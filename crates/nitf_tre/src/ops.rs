//! Decoding, encoding and measuring records by walking their layout.

use std::io::{self, Read, Write};

use tracing::{debug, instrument, warn};

use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::record::Record;
use crate::schema::{Layout, SchemaSet};

/// Pick the layout of `set` for a TRE declaring `declared_length` bytes
///
/// See [`SchemaSet::select`] for the selection rule.
pub fn select_layout(set: &SchemaSet, declared_length: Option<usize>) -> Result<&Layout> {
    let (index, _) = set.select(declared_length)?;
    set.layout(index).ok_or_else(|| Error::NoMatchingSchema {
        tag: set.tag.clone(),
        message: format!("layout {index} does not exist"),
        context: format!("{} layouts", set.layouts.len()),
    })
}

fn allocate(size: usize, context: impl FnOnce() -> String) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|e| Error::AllocationFailure {
            size,
            message: e.to_string(),
            context: context(),
        })?;
    Ok(buffer)
}

impl Record {
    /// Read every field of the layout from `reader`
    ///
    /// Each field is inserted as soon as it is read so later loop counts, conditions and lengths
    /// can refer to it. On error the fields read so far are left in place.
    ///
    /// With a declared length the walk never reads past it, and a field that would cross it fails
    /// with [`Error::LengthMismatch`] before anything is read.
    #[instrument(skip_all, fields(tag = %self.tag()), err)]
    pub fn decode<R: Read>(&mut self, reader: R) -> Result<()> {
        match self.declared_length() {
            Some(length) => self.decode_within(reader.take(length as u64), Some(length)),
            None => self.decode_within(reader, None),
        }
    }

    /// Walk the layout reading each field, refusing fields longer than `budget` bytes left
    fn decode_within<R: Read>(&mut self, mut reader: R, mut budget: Option<usize>) -> Result<()> {
        let mut cursor = Cursor::begin(self);
        while let Some(step) = cursor.advance(self)? {
            if let Some(left) = budget {
                if step.length > left {
                    return Err(Error::LengthMismatch {
                        name: step.name,
                        expected: step.length,
                        actual: left,
                        context: format!("{} has {left} bytes left", self.tag()),
                    });
                }
                budget = Some(left - step.length);
            }

            // grows with the bytes read, not with the length the data claims
            let mut buffer = Vec::new();
            let read = reader
                .by_ref()
                .take(step.length as u64)
                .read_to_end(&mut buffer)?;
            if read < step.length {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "{} {}: read {read} of {} bytes",
                        self.tag(),
                        step.name,
                        step.length
                    ),
                )));
            }

            let field = Field::new(step.field_type, buffer);
            debug!(name = %step.name, value = %field, "decoded field");
            self.insert_field(step.name, field);
        }
        Ok(())
    }

    /// Decode a complete TRE held in memory
    ///
    /// Fails with [`Error::LengthMismatch`] when a field is longer than the bytes left, or when
    /// bytes are left over after the last field.
    #[instrument(skip_all, fields(tag = %self.tag(), len = data.len()), err)]
    pub fn decode_slice(&mut self, data: &[u8]) -> Result<()> {
        let mut remaining = data;
        self.decode_within(&mut remaining, Some(data.len()))?;
        if !remaining.is_empty() {
            return Err(Error::LengthMismatch {
                name: self.tag().to_owned(),
                expected: data.len() - remaining.len(),
                actual: data.len(),
                context: format!("{} trailing bytes", remaining.len()),
            });
        }
        Ok(())
    }

    /// Create a record for `set` and decode it from `data`, using the data length for layout
    /// selection
    pub fn from_bytes(set: std::sync::Arc<SchemaSet>, data: &[u8]) -> Result<Record> {
        let mut record = Record::new(set, Some(data.len()))?;
        record.decode_slice(data)?;
        Ok(record)
    }

    /// Number of bytes the record occupies when encoded
    #[instrument(skip_all, fields(tag = %self.tag()), err)]
    pub fn compute_length(&self) -> Result<usize> {
        let mut cursor = Cursor::begin(self);
        let mut length = 0usize;
        while let Some(step) = cursor.advance(self)? {
            length += step.length;
        }
        Ok(length)
    }

    /// Write every field of the layout to `writer`
    ///
    /// Fields longer than the layout requires are truncated. Missing or shorter fields are errors.
    #[instrument(skip_all, fields(tag = %self.tag()), err)]
    pub fn encode<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut cursor = Cursor::begin(self);
        while let Some(step) = cursor.advance(self)? {
            let field = self.field(&step.name).ok_or_else(|| {
                Error::unresolved(&step.name, format!("{} encode", self.tag()))
            })?;

            if field.len() < step.length {
                return Err(Error::LengthMismatch {
                    name: step.name,
                    expected: step.length,
                    actual: field.len(),
                    context: format!("{} encode", self.tag()),
                });
            }

            if field.len() > step.length {
                warn!(name = %step.name, stored = field.len(), length = step.length, "truncating field");
            }

            writer.write_all(&field.as_bytes()[..step.length])?;
        }
        Ok(())
    }

    /// Encode into a buffer sized with [`Record::compute_length`]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let length = self.compute_length()?;
        let mut buffer = allocate(length, || format!("{} encode", self.tag()))?;
        self.encode(&mut buffer)?;
        Ok(buffer)
    }

    /// Insert a blank field under every name the layout yields that is not yet set
    ///
    /// Fields are filled in layout order, so counters filled with zero produce empty loops.
    #[instrument(skip_all, fields(tag = %self.tag()), err)]
    pub fn fill_blank(&mut self) -> Result<()> {
        let mut cursor = Cursor::begin(self);
        while let Some(step) = cursor.advance(self)? {
            if !self.contains(&step.name) {
                self.insert_field(step.name, Field::blank(step.field_type, step.length));
            }
        }
        Ok(())
    }

    /// Whether the record holds exactly the fields its layout yields
    ///
    /// A record that fails to walk, or whose field count differs from the number of fields the
    /// walk yields, is incomplete or over-complete.
    pub fn is_sane(&self) -> bool {
        let mut yielded = 0usize;
        for step in self.steps() {
            match step {
                Ok(step) if self.contains(&step.name) => yielded += 1,
                Ok(step) => {
                    debug!(name = %step.name, "field missing");
                    return false;
                }
                Err(e) => {
                    debug!(error = %e, "layout walk failed");
                    return false;
                }
            }
        }

        if yielded != self.len() {
            debug!(yielded, stored = self.len(), "field count differs");
            return false;
        }
        true
    }
}
