//! Evaluation of the small expressions embedded in schema entries.
//!
//! Three contexts use expressions:
//!
//! * loop counts, a literal, a [`CountProvider`] or a field, followed by an optional adjustment
//!   such as `"+ 1"` or `"/ 2"`
//! * conditional lengths, the value of the field named by the previous entry plus the same kind
//!   of adjustment
//! * if predicates, `"eq TEXT"`, `"ne TEXT"` or a signed integer comparison such as `">= 3"`
//!
//! Negative counts and lengths clamp to zero. Division or modulo by zero is an error.

use std::cmp::Ordering;

use tracing::trace;
use winnow::ascii::{digit1, space0, space1};
use winnow::combinator::{alt, opt};
use winnow::prelude::*;
use winnow::token::one_of;

use crate::error::{Error, Result};
use crate::field::FieldType;
use crate::name::resolve;
use crate::record::Record;
use crate::schema::{LoopCount, SchemaEntry};

/// Supplies loop counts that cannot be expressed as a field reference
///
/// Providers are registered on a [`crate::SchemaSet`] and referenced by name from
/// [`LoopCount::Provider`] entries. They receive the record as decoded so far and the indices of
/// the loops enclosing the one being started, outermost first. They may be impure, every walk
/// asks again.
pub trait CountProvider: Send + Sync + 'static {
    fn count(&self, record: &Record, indices: &[usize]) -> Result<i64>;
}

impl<F> CountProvider for F
where
    F: Fn(&Record, &[usize]) -> Result<i64> + Send + Sync + 'static,
{
    fn count(&self, record: &Record, indices: &[usize]) -> Result<i64> {
        self(record, indices)
    }
}

/// Arithmetic operator of an adjustment clause
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// A trailing `<op> <int>` clause
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Adjustment {
    pub op: ArithOp,
    pub operand: i64,
}

/// Comparison operator of an if predicate
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Comparison {
    /// `eq`, byte comparison
    Equal,
    /// `ne`, byte comparison
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    /// `==`
    NumEqual,
    /// `!=`
    NumNotEqual,
}

/// Right hand side of an if predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Text(String),
    Int(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub op: Comparison,
    pub operand: Operand,
}

fn integer(input: &mut &str) -> PResult<i64> {
    (opt(one_of(['+', '-'])), digit1)
        .try_map(|(sign, digits): (Option<char>, &str)| {
            digits
                .parse::<i64>()
                .map(|v| if sign == Some('-') { -v } else { v })
        })
        .parse_next(input)
}

fn arith_op(input: &mut &str) -> PResult<ArithOp> {
    one_of(['+', '-', '*', '/', '%'])
        .map(|c| match c {
            '+' => ArithOp::Add,
            '-' => ArithOp::Sub,
            '*' => ArithOp::Mul,
            '/' => ArithOp::Div,
            _ => ArithOp::Rem,
        })
        .parse_next(input)
}

fn comparison(input: &mut &str) -> PResult<Comparison> {
    alt((
        "eq".value(Comparison::Equal),
        "ne".value(Comparison::NotEqual),
        "<=".value(Comparison::LessEqual),
        ">=".value(Comparison::GreaterEqual),
        "==".value(Comparison::NumEqual),
        "!=".value(Comparison::NumNotEqual),
        "<".value(Comparison::Less),
        ">".value(Comparison::Greater),
    ))
    .parse_next(input)
}

/// Parse an adjustment clause, blank text means no adjustment
pub fn parse_adjustment(text: &str) -> Result<Option<Adjustment>> {
    if text.trim().is_empty() {
        return Ok(None);
    }

    (space0, arith_op, space0, integer, space0)
        .map(|(_, op, _, operand, _)| Adjustment { op, operand })
        .parse(text)
        .map(Some)
        .map_err(|e| Error::malformed(format!("invalid adjustment {text:?}: {e}"), text))
}

/// Parse an if predicate
///
/// The text operand of `eq` and `ne` is everything after the single space following the
/// operator, so operands may carry significant padding.
pub fn parse_predicate(text: &str) -> Result<Predicate> {
    let malformed = |e: &dyn std::fmt::Display| {
        Error::malformed(format!("invalid predicate {text:?}: {e}"), text)
    };

    let mut input = text;
    let op = (space0, comparison)
        .map(|(_, op)| op)
        .parse_next(&mut input)
        .map_err(|e| malformed(&e))?;

    match op {
        Comparison::Equal | Comparison::NotEqual => {
            let operand = input
                .strip_prefix(' ')
                .ok_or_else(|| malformed(&"missing operand"))?;
            Ok(Predicate {
                op,
                operand: Operand::Text(operand.to_owned()),
            })
        }
        _ => {
            let value = (space1, integer, space0)
                .map(|(_, value, _)| value)
                .parse(input)
                .map_err(|e| malformed(&e))?;
            let value = i32::try_from(value).map_err(|e| malformed(&e))?;
            Ok(Predicate {
                op,
                operand: Operand::Int(value),
            })
        }
    }
}

/// Apply an optional adjustment to `base`, clamping negative results to zero
pub fn adjust(base: i64, adjustment: Option<Adjustment>, context: &str) -> Result<usize> {
    let value = match adjustment {
        None => Some(base),
        Some(Adjustment { op, operand }) => {
            if operand == 0 && matches!(op, ArithOp::Div | ArithOp::Rem) {
                return Err(Error::arithmetic("attempt to divide by zero", context));
            }
            match op {
                ArithOp::Add => base.checked_add(operand),
                ArithOp::Sub => base.checked_sub(operand),
                ArithOp::Mul => base.checked_mul(operand),
                ArithOp::Div => base.checked_div(operand),
                ArithOp::Rem => base.checked_rem(operand),
            }
        }
    };

    let value = value.ok_or_else(|| Error::arithmetic("integer overflow", context))?;
    Ok(usize::try_from(value.max(0)).unwrap_or(usize::MAX))
}

fn adjustment_of(entry: &SchemaEntry) -> Result<Option<Adjustment>> {
    entry
        .expr
        .as_deref()
        .map_or(Ok(None), parse_adjustment)
}

/// Number of times the loop started by `entry` repeats
pub fn loop_count(
    record: &Record,
    entry: &SchemaEntry,
    source: &LoopCount,
    indices: &[usize],
) -> Result<usize> {
    let context = format!("{} loop on {}", record.tag(), entry.name);
    let base = match source {
        LoopCount::Constant(count) => *count,
        LoopCount::Provider(name) => record
            .schema_set()
            .provider(name)
            .ok_or_else(|| Error::unresolved(format!("count provider {name}"), &context))?
            .count(record, indices)?,
        LoopCount::Field => resolve(record, &entry.name, indices)?.1.as_int()?,
    };

    let count = adjust(base, adjustment_of(entry)?, &context)?;
    trace!(%context, base, count, "evaluated loop count");
    Ok(count)
}

/// Length of a conditional field, computed from the entry preceding it
///
/// The adjustment written on the conditional field wins over one written on the reference entry.
pub fn conditional_length(
    record: &Record,
    reference: &SchemaEntry,
    entry: &SchemaEntry,
    indices: &[usize],
) -> Result<usize> {
    let context = format!("{} length of {}", record.tag(), entry.name);
    let base = resolve(record, &reference.name, indices)?.1.as_int()?;

    let adjustment = match adjustment_of(entry)? {
        Some(adjustment) => Some(adjustment),
        None => adjustment_of(reference)?,
    };

    let length = adjust(base, adjustment, &context)?;
    trace!(%context, base, length, "evaluated conditional length");
    Ok(length)
}

/// Whether the section opened by `entry` is present
pub fn evaluate_if(record: &Record, entry: &SchemaEntry, indices: &[usize]) -> Result<bool> {
    let (name, field) = resolve(record, &entry.name, indices)?;
    let context = format!("{} condition on {name}", record.tag());
    let predicate = parse_predicate(entry.expr.as_deref().unwrap_or_default())?;

    let result = match (predicate.op, predicate.operand) {
        (Comparison::Equal | Comparison::NotEqual, Operand::Text(operand)) => {
            if field.field_type() == FieldType::NumericText {
                return Err(Error::type_mismatch(
                    "can't use eq/ne to compare a number",
                    context,
                ));
            }
            let raw = field.as_bytes();
            let equal = operand.as_bytes().get(..raw.len()) == Some(raw);
            equal == (predicate.op == Comparison::Equal)
        }
        (op, Operand::Int(operand)) => {
            if field.field_type() != FieldType::NumericText {
                return Err(Error::type_mismatch(
                    "can't use strings for logical expressions",
                    context,
                ));
            }
            let ordering = field.as_int()?.cmp(&(operand as i64));
            match op {
                Comparison::Less => ordering == Ordering::Less,
                Comparison::Greater => ordering == Ordering::Greater,
                Comparison::LessEqual => ordering != Ordering::Greater,
                Comparison::GreaterEqual => ordering != Ordering::Less,
                Comparison::NumEqual => ordering == Ordering::Equal,
                _ => ordering != Ordering::Equal,
            }
        }
        (_, Operand::Text(_)) => {
            return Err(Error::malformed("numeric comparison without a number", context))
        }
    };

    trace!(%context, result, "evaluated condition");
    Ok(result)
}
