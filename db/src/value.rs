//! Cell values exchanged with drivers.
//!
//! [`SqlValue`] is the backend-agnostic value used for bind variables and by the
//! bundled SQLite driver for row cells. Drivers expose cells through the [`Value`]
//! trait so they can keep their native representation; [`FromValue`] converts a
//! non-null cell into a Rust type.

use serde::Serialize;

/// Backend-agnostic value for query bindings and row cells.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// String value
    Str(String),
    /// Binary value
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Short type name used in decode error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Int(_) => "integer",
            SqlValue::Float(_) => "float",
            SqlValue::Bool(_) => "boolean",
            SqlValue::Str(_) => "text",
            SqlValue::Blob(_) => "blob",
        }
    }
}

/// Trait for extracting typed values from a driver cell.
///
/// Accessors return `None` when the cell does not hold a value of the requested
/// shape; they never panic.
pub trait Value: Send + Sync + std::fmt::Debug {
    /// Returns true if the cell is SQL NULL.
    fn is_null(&self) -> bool;

    /// Attempts to extract the value as a string reference.
    fn as_str(&self) -> Option<&str>;

    /// Attempts to extract the value as a signed 64-bit integer.
    fn as_i64(&self) -> Option<i64>;

    /// Attempts to extract the value as a 64-bit float.
    fn as_f64(&self) -> Option<f64>;

    /// Attempts to extract the value as a boolean.
    fn as_bool(&self) -> Option<bool>;

    /// Attempts to extract the value as raw bytes.
    fn as_bytes(&self) -> Option<&[u8]>;

    /// Name of the stored type, for error messages.
    fn type_name(&self) -> &'static str;

    /// Copies the cell into an owned [`SqlValue`].
    fn to_sql_value(&self) -> SqlValue;
}

impl Value for SqlValue {
    fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            SqlValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Int(i) => Some(*i as f64),
            SqlValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(b) => Some(*b),
            // SQLite and friends store booleans as 0/1 integers
            SqlValue::Int(0) => Some(false),
            SqlValue::Int(1) => Some(true),
            _ => None,
        }
    }

    fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Blob(b) => Some(b),
            SqlValue::Str(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        SqlValue::type_name(self)
    }

    fn to_sql_value(&self) -> SqlValue {
        self.clone()
    }
}

/// Conversion from a non-null cell into a Rust type.
///
/// Returns a human-readable message on mismatch or overflow; the caller adds
/// the column position.
pub trait FromValue: Sized {
    fn from_value(value: &dyn Value) -> Result<Self, String>;
}

fn mismatch(expected: &str, value: &dyn Value) -> String {
    format!("expected {}, got {}", expected, value.type_name())
}

impl FromValue for i64 {
    fn from_value(value: &dyn Value) -> Result<Self, String> {
        value.as_i64().ok_or_else(|| mismatch("integer", value))
    }
}

macro_rules! narrow_integer {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &dyn Value) -> Result<Self, String> {
                    let wide = value.as_i64().ok_or_else(|| mismatch("integer", value))?;
                    <$ty>::try_from(wide).map_err(|_| {
                        format!("value {} overflows {}", wide, stringify!($ty))
                    })
                }
            }
        )*
    };
}

narrow_integer!(i32, i16, u8);

impl FromValue for f64 {
    fn from_value(value: &dyn Value) -> Result<Self, String> {
        value.as_f64().ok_or_else(|| mismatch("float", value))
    }
}

impl FromValue for f32 {
    fn from_value(value: &dyn Value) -> Result<Self, String> {
        value
            .as_f64()
            .map(|f| f as f32)
            .ok_or_else(|| mismatch("float", value))
    }
}

impl FromValue for bool {
    fn from_value(value: &dyn Value) -> Result<Self, String> {
        value.as_bool().ok_or_else(|| mismatch("boolean", value))
    }
}

impl FromValue for String {
    fn from_value(value: &dyn Value) -> Result<Self, String> {
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| mismatch("text", value))
    }
}

impl FromValue for char {
    fn from_value(value: &dyn Value) -> Result<Self, String> {
        let s = value.as_str().ok_or_else(|| mismatch("text", value))?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(format!("expected a single character, got {:?}", s)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &dyn Value) -> Result<Self, String> {
        value
            .as_bytes()
            .map(|b| b.to_vec())
            .ok_or_else(|| mismatch("blob", value))
    }
}

impl FromValue for SqlValue {
    fn from_value(value: &dyn Value) -> Result<Self, String> {
        Ok(value.to_sql_value())
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v.into())
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        SqlValue::Int(v.into())
    }
}

impl From<u8> for SqlValue {
    fn from(v: u8) -> Self {
        SqlValue::Int(v.into())
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        SqlValue::Float(v.into())
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Str(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Str(v)
    }
}

impl From<char> for SqlValue {
    fn from(v: char) -> Self {
        SqlValue::Str(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl From<&[u8]> for SqlValue {
    fn from(v: &[u8]) -> Self {
        SqlValue::Blob(v.to_vec())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_value_extraction() {
        let str_value = SqlValue::Str("hello".to_string());
        assert_eq!(str_value.as_str(), Some("hello"));
        assert!(str_value.as_i64().is_none());

        let int_value = SqlValue::Int(42);
        assert_eq!(int_value.as_i64(), Some(42));
        assert_eq!(int_value.as_f64(), Some(42.0));

        let float_value = SqlValue::Float(3.5);
        assert_eq!(float_value.as_f64(), Some(3.5));
        assert!(float_value.as_i64().is_none());

        assert_eq!(SqlValue::Bool(true).as_bool(), Some(true));
        assert!(SqlValue::Null.is_null());
    }

    #[rstest]
    #[case(SqlValue::Int(0), Some(false))]
    #[case(SqlValue::Int(1), Some(true))]
    #[case(SqlValue::Int(2), None)]
    #[case(SqlValue::Str("true".into()), None)]
    fn test_integer_booleans(#[case] value: SqlValue, #[case] expected: Option<bool>) {
        assert_eq!(value.as_bool(), expected);
    }

    #[rstest]
    fn test_narrowing_overflow_is_reported() {
        let err = u8::from_value(&SqlValue::Int(300)).unwrap_err();
        assert_eq!(err, "value 300 overflows u8");
        assert_eq!(i16::from_value(&SqlValue::Int(-12)), Ok(-12));
    }

    #[rstest]
    fn test_type_mismatch_message() {
        let err = i32::from_value(&SqlValue::Str("x".into())).unwrap_err();
        assert_eq!(err, "expected integer, got text");
    }

    #[rstest]
    fn test_char_requires_single_character() {
        assert_eq!(char::from_value(&SqlValue::Str("z".into())), Ok('z'));
        assert!(char::from_value(&SqlValue::Str("zz".into())).is_err());
    }

    #[rstest]
    fn test_option_into_sql_value() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some("a")), SqlValue::Str("a".into()));
    }

    #[rstest]
    fn test_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            SqlValue::Null,
            SqlValue::Int(1),
            SqlValue::Str("a".into()),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,1,"a"]"#);
    }
}
