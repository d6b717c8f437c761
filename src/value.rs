//! Typed field values carried by a record.
//!
//! Every record type declares an ordered list of [`FieldType`]s; decoding a
//! text field against its declared type yields a [`FieldValue`].

use serde::{Deserialize, Serialize};

/// The declared type of one record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
}

impl FieldType {
    /// Returns a human-readable type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Char => "char",
        }
    }

    /// Parses one raw text field into a value of this type.
    ///
    /// Returns `None` if the text is not a valid literal of this type.
    /// Booleans accept `true`/`false` in any letter case.
    #[must_use]
    pub fn parse(self, raw: &str) -> Option<FieldValue> {
        match self {
            Self::String => Some(FieldValue::String(raw.to_string())),
            Self::Bool => {
                if raw.eq_ignore_ascii_case("true") {
                    Some(FieldValue::Bool(true))
                } else if raw.eq_ignore_ascii_case("false") {
                    Some(FieldValue::Bool(false))
                } else {
                    None
                }
            }
            Self::Byte => raw.parse().ok().map(FieldValue::Byte),
            Self::Short => raw.parse().ok().map(FieldValue::Short),
            Self::Int => raw.parse().ok().map(FieldValue::Int),
            Self::Long => raw.parse().ok().map(FieldValue::Long),
            Self::Float => raw.parse().ok().map(FieldValue::Float),
            Self::Double => raw.parse().ok().map(FieldValue::Double),
            Self::Char => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(FieldValue::Char(c)),
                    _ => None,
                }
            }
        }
    }
}

/// A decoded field value.
///
/// # Examples
///
/// ```
/// use tailmerge::{FieldType, FieldValue};
///
/// let v = FieldType::Long.parse("42").unwrap();
/// assert_eq!(v, FieldValue::Long(42));
/// assert_eq!(v.as_i64(), Some(42));
/// assert!(FieldType::Int.parse("4x").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    String(String),
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
}

impl FieldValue {
    /// The declared type this value belongs to.
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        match self {
            Self::String(_) => FieldType::String,
            Self::Bool(_) => FieldType::Bool,
            Self::Byte(_) => FieldType::Byte,
            Self::Short(_) => FieldType::Short,
            Self::Int(_) => FieldType::Int,
            Self::Long(_) => FieldType::Long,
            Self::Float(_) => FieldType::Float,
            Self::Double(_) => FieldType::Double,
            Self::Char(_) => FieldType::Char,
        }
    }

    /// Returns the boolean, if this is a `Bool`.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Widens any integral value to `i64`.
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Byte(v) => Some(*v as i64),
            Self::Short(v) => Some(*v as i64),
            Self::Int(v) => Some(*v as i64),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Widens `Float` and `Double` values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Short(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Char(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integral_types() {
        assert_eq!(FieldType::Byte.parse("-7"), Some(FieldValue::Byte(-7)));
        assert_eq!(FieldType::Short.parse("300"), Some(FieldValue::Short(300)));
        assert_eq!(FieldType::Int.parse("70000"), Some(FieldValue::Int(70000)));
        assert_eq!(
            FieldType::Long.parse("1400000000000000000"),
            Some(FieldValue::Long(1_400_000_000_000_000_000))
        );
        assert_eq!(FieldType::Byte.parse("300"), None);
        assert_eq!(FieldType::Int.parse(""), None);
    }

    #[test]
    fn test_parse_bool_is_case_insensitive() {
        assert_eq!(FieldType::Bool.parse("TRUE"), Some(FieldValue::Bool(true)));
        assert_eq!(FieldType::Bool.parse("false"), Some(FieldValue::Bool(false)));
        assert_eq!(FieldType::Bool.parse("yes"), None);
    }

    #[test]
    fn test_parse_char_needs_single_char() {
        assert_eq!(FieldType::Char.parse("x"), Some(FieldValue::Char('x')));
        assert_eq!(FieldType::Char.parse("xy"), None);
        assert_eq!(FieldType::Char.parse(""), None);
    }

    #[test]
    fn test_string_keeps_raw_text() {
        let v = FieldType::String.parse("public void a.B.c()").unwrap();
        assert_eq!(v.as_str(), Some("public void a.B.c()"));
        assert_eq!(v.field_type(), FieldType::String);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(FieldValue::Int(5).as_i64(), Some(5));
        assert_eq!(FieldValue::Double(1.5).as_f64(), Some(1.5));
        assert_eq!(FieldValue::Bool(true).as_bool(), Some(true));
        assert_eq!(FieldValue::Long(1).as_str(), None);
    }

    #[test]
    fn test_value_serialization() {
        let v = FieldValue::Long(42);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"type":"long","value":42}"#);
        let back: FieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
