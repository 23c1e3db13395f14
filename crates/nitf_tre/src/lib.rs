//! This library reads and writes NITF **Tagged Record Extensions** (TREs) by walking a schema.
//!
//! # Schema Driven Records
//!
//! A TRE is a short run of fixed width fields identified by a six character tag. Rather than
//! hand-writing a parser per tag, each tag is described by a [`SchemaSet`]: one or more
//! [`Layout`]s, each a flat list of [`SchemaEntry`] values. The same description drives
//! decoding, encoding, length computation and validation.
//!
//! ## Entries
//!
//! | Kind               | Meaning                                                              |
//! |--------------------|----------------------------------------------------------------------|
//! | `Field`            | A data field with a fixed length, or a conditional length            |
//! | `Loop`             | Repeat until the matching `EndLoop`, count from a field, a constant or a provider |
//! | `EndLoop`          | Close the innermost loop                                             |
//! | `If`               | Skip to the matching `EndIf` unless a predicate on a field holds     |
//! | `EndIf`            | Close the innermost conditional section                              |
//! | `ComputedLength`   | Reference whose value sizes the next conditional length field        |
//! | `End`              | Sentinel, nothing after it is walked                                 |
//!
//! ### Names
//!
//! Fields inside loops are stored under names qualified with the loop indices, outermost first,
//! so `BAND` read in the third pass of a loop becomes `BAND[2]`. Templates may also carry explicit
//! placeholders (`PT[][]`). References to counters and flags are looked up unqualified first and
//! then with progressively more indices, which finds both loop invariant fields and counters
//! declared in an enclosing loop.
//!
//! ### Expressions
//!
//! Loop counts and lengths may be adjusted with `op int`, where `op` is one of `+ - * / %`.
//! Conditional sections compare a field with `eq`/`ne` (text) or `< > <= >= == !=` (numeric).
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use nitf_tre::{FieldType, Record, SchemaEntry, SchemaSet};
//!
//! # fn main() -> nitf_tre::error::Result<()> {
//! let set = Arc::new(SchemaSet::single(
//!     "EXAMPB",
//!     vec![
//!         SchemaEntry::field("N", FieldType::NumericText, 1),
//!         SchemaEntry::loop_count("N"),
//!         SchemaEntry::field("X", FieldType::Text, 2),
//!         SchemaEntry::end_loop(),
//!     ],
//! ));
//!
//! let record = Record::from_bytes(set, b"2aabb")?;
//! assert_eq!(record.field("X[1]").unwrap().as_bytes(), b"bb");
//! assert_eq!(record.to_bytes()?, b"2aabb");
//! # Ok(())
//! # }
//! ```

pub mod cursor;
pub mod error;
pub mod expr;
pub mod field;
pub mod name;
pub mod ops;
pub mod record;
pub mod schema;

pub use cursor::{Cursor, CursorState, Step, Steps, MAX_NESTING};
pub use expr::CountProvider;
pub use field::{Field, FieldType};
pub use ops::select_layout;
pub use record::Record;
pub use schema::{EntryKind, Layout, Length, LoopCount, Registry, SchemaEntry, SchemaSet};
