//! Typed, fixed length values stored in a TRE.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use derive_more::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifies how the bytes of a [`Field`] are interpreted
#[derive(Display, Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FieldType {
    /// Space padded ASCII text (BCS-A)
    #[default]
    #[display("BCS-A")]
    #[cfg_attr(feature = "serde", serde(rename = "text", alias = "BCS-A"))]
    Text,

    /// ASCII digits with an optional sign (BCS-N)
    #[display("BCS-N")]
    #[cfg_attr(feature = "serde", serde(rename = "numeric", alias = "BCS-N"))]
    NumericText,

    /// Opaque bytes
    #[display("binary")]
    #[cfg_attr(feature = "serde", serde(rename = "binary"))]
    Binary,
}

/// A single value of a TRE
///
/// The length of a field is exactly the number of bytes it was decoded from or will be encoded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    field_type: FieldType,
    raw: Vec<u8>,
}

impl Field {
    /// Create a field holding `raw` as-is
    pub fn new(field_type: FieldType, raw: impl Into<Vec<u8>>) -> Self {
        Self {
            field_type,
            raw: raw.into(),
        }
    }

    /// Create a field of `length` bytes holding the neutral value for its type
    ///
    /// Text is filled with spaces, numeric text with `'0'` and binary with zero bytes.
    pub fn blank(field_type: FieldType, length: usize) -> Self {
        let fill = match field_type {
            FieldType::Text => b' ',
            FieldType::NumericText => b'0',
            FieldType::Binary => 0u8,
        };
        Self::new(field_type, vec![fill; length])
    }

    /// Encoding of the field
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Number of bytes held
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Whether the field holds no bytes
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// The raw on-disk bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Lossy text view of the bytes
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.raw)
    }

    /// Interpret the field as a signed integer
    ///
    /// Text fields are parsed as decimal after trimming surrounding spaces, an all blank field
    /// reads as `0`. Binary fields are read as big endian unsigned integers of 1, 2, 4 or 8 bytes.
    pub fn as_int(&self) -> Result<i64> {
        match self.field_type {
            FieldType::Text | FieldType::NumericText => {
                let text = std::str::from_utf8(&self.raw).map_err(|_| {
                    Error::type_mismatch("field is not ASCII", format!("{:02X?}", self.raw))
                })?;
                let text = text.trim_matches(|c: char| c == ' ' || c == '\0');
                if text.is_empty() {
                    return Ok(0);
                }
                text.parse::<i64>().map_err(|e| {
                    Error::type_mismatch(format!("{text:?} is not an integer: {e}"), "as_int")
                })
            }
            FieldType::Binary => match self.raw.len() {
                1 => Ok(self.raw[0] as i64),
                2 => Ok(BigEndian::read_u16(&self.raw) as i64),
                4 => Ok(BigEndian::read_u32(&self.raw) as i64),
                8 => i64::try_from(BigEndian::read_u64(&self.raw)).map_err(|_| {
                    Error::type_mismatch("binary value does not fit in an i64", "as_int")
                }),
                n => Err(Error::type_mismatch(
                    format!("cannot read a {n} byte binary field as an integer"),
                    "as_int",
                )),
            },
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field_type {
            FieldType::Text | FieldType::NumericText => write!(f, "{}", self.as_str()),
            FieldType::Binary => {
                for b in &self.raw {
                    write!(f, "{b:02X}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::error::{ErrorCategory, Result};
    use crate::field::{Field, FieldType};

    #[test]
    fn blank_fields() {
        assert_eq!(Field::blank(FieldType::Text, 3).as_bytes(), b"   ");
        assert_eq!(Field::blank(FieldType::NumericText, 2).as_bytes(), b"00");
        assert_eq!(Field::blank(FieldType::Binary, 2).as_bytes(), &[0, 0]);
    }

    #[test]
    fn numeric_text_as_int() -> Result<()> {
        assert_eq!(Field::new(FieldType::NumericText, "0042").as_int()?, 42);
        assert_eq!(Field::new(FieldType::NumericText, "-007").as_int()?, -7);
        assert_eq!(Field::new(FieldType::NumericText, "+12").as_int()?, 12);
        assert_eq!(Field::new(FieldType::Text, " 15 ").as_int()?, 15);
        assert_eq!(Field::new(FieldType::Text, "   ").as_int()?, 0);
        Ok(())
    }

    #[test]
    fn text_that_is_not_a_number() {
        let err = Field::new(FieldType::Text, "AB").as_int().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::TypeMismatch);
    }

    #[test]
    fn binary_as_int() -> Result<()> {
        assert_eq!(Field::new(FieldType::Binary, vec![0x05]).as_int()?, 5);
        assert_eq!(Field::new(FieldType::Binary, vec![0x01, 0x00]).as_int()?, 256);
        assert_eq!(
            Field::new(FieldType::Binary, vec![0x00, 0x01, 0x00, 0x00]).as_int()?,
            65536
        );
        assert!(Field::new(FieldType::Binary, vec![0, 0, 1]).as_int().is_err());
        Ok(())
    }

    #[test]
    fn display() {
        assert_eq!(Field::new(FieldType::Text, "abc").to_string(), "abc");
        assert_eq!(Field::new(FieldType::Binary, vec![0xDE, 0xAD]).to_string(), "DEAD");
    }
}
