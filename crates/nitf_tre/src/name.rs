//! Turning name templates into keys of a record's field table.
//!
//! Fields declared inside a loop are stored under names qualified with the loop indices, such
//! as `BAND[2]` or `PT[0][3]`. Templates may spell the placeholders out (`PT[][]`), in which case
//! each bracket takes the index of the loop at the same nesting depth, outermost first.

use crate::error::{Error, Result};
use crate::field::Field;
use crate::record::Record;
use crate::schema::base_name;

/// Number of `[` placeholders in a template
fn placeholders(template: &str) -> usize {
    template.bytes().filter(|b| *b == b'[').count()
}

fn push_index(name: &mut String, index: usize) {
    name.push('[');
    name.push_str(&index.to_string());
    name.push(']');
}

fn substitute(template: &str, indices: &[usize]) -> Result<String> {
    let wanted = placeholders(template);
    if wanted > indices.len() {
        return Err(Error::malformed(
            format!(
                "{template} has {wanted} placeholders but only {} loops are open",
                indices.len()
            ),
            template,
        ));
    }

    let mut name = base_name(template).to_owned();
    for index in &indices[..wanted] {
        push_index(&mut name, *index);
    }
    Ok(name)
}

/// The name a data field is stored under
///
/// Templates with placeholders are substituted. Templates without are qualified with every open
/// loop index, so `A` read inside two loops becomes `A[i][j]`.
pub fn qualify(template: &str, indices: &[usize]) -> Result<String> {
    if template.contains('[') {
        return substitute(template, indices);
    }

    let mut name = template.to_owned();
    for index in indices {
        push_index(&mut name, *index);
    }
    Ok(name)
}

/// Find the field a template refers to
///
/// Without placeholders the unqualified name is tried first, then the name qualified with the
/// outermost index, then the outermost two, and so on. This finds loop invariant fields as well
/// as counters declared in an enclosing loop.
pub fn resolve<'r>(record: &'r Record, template: &str, indices: &[usize]) -> Result<(String, &'r Field)> {
    let context = || format!("{} with {} open loops", record.tag(), indices.len());

    if template.contains('[') {
        let name = substitute(template, indices)?;
        return match record.field(&name) {
            Some(field) => Ok((name, field)),
            None => Err(Error::unresolved(name, context())),
        };
    }

    let mut name = template.to_owned();
    if let Some(field) = record.field(&name) {
        return Ok((name, field));
    }

    for index in indices {
        push_index(&mut name, *index);
        if let Some(field) = record.field(&name) {
            return Ok((name, field));
        }
    }

    Err(Error::unresolved(template, context()))
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use crate::error::{ErrorCategory, Result};
    use crate::field::FieldType;
    use crate::name::{qualify, resolve};
    use crate::record::Record;
    use crate::schema::SchemaSet;

    fn record() -> Result<Record> {
        let mut record = Record::new(Arc::new(SchemaSet::single("TEST", vec![])), None)?;
        record.insert("COUNT", FieldType::NumericText, "2");
        record.insert("INNER[1]", FieldType::NumericText, "3");
        record.insert("VALUE[1][0]", FieldType::Text, "x");
        Ok(record)
    }

    #[test]
    fn qualify_appends_every_index() -> Result<()> {
        assert_eq!(qualify("A", &[])?, "A");
        assert_eq!(qualify("A", &[1])?, "A[1]");
        assert_eq!(qualify("A", &[1, 4])?, "A[1][4]");
        Ok(())
    }

    #[test]
    fn qualify_substitutes_placeholders() -> Result<()> {
        assert_eq!(qualify("A[]", &[2, 5])?, "A[2]");
        assert_eq!(qualify("A[][]", &[2, 5])?, "A[2][5]");
        Ok(())
    }

    #[test]
    fn too_many_placeholders() {
        let err = qualify("A[][]", &[2]).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::MalformedSchema);
    }

    #[test]
    fn resolve_unqualified_first() -> Result<()> {
        let record = record()?;
        let (name, field) = resolve(&record, "COUNT", &[1, 0])?;
        assert_eq!(name, "COUNT");
        assert_eq!(field.as_int()?, 2);
        Ok(())
    }

    #[test]
    fn resolve_progressively_qualified() -> Result<()> {
        let record = record()?;
        assert_eq!(resolve(&record, "INNER", &[1, 0])?.0, "INNER[1]");
        assert_eq!(resolve(&record, "VALUE", &[1, 0])?.0, "VALUE[1][0]");
        assert_eq!(resolve(&record, "VALUE[][]", &[1, 0])?.0, "VALUE[1][0]");
        Ok(())
    }

    #[test]
    fn resolve_missing() -> Result<()> {
        let record = record()?;
        let err = resolve(&record, "INNER", &[0]).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::UnresolvedReference);
        let err = resolve(&record, "NOPE", &[]).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::UnresolvedReference);
        Ok(())
    }
}
