//! Dynamically typed SQL values.
//!
//! `SqlValue` is what statement parameters are bound from and what result rows
//! hold. Typed access goes through [`FromSqlValue`], which is deliberately
//! lenient in the way JDBC getters are: a numeric string converts to a number,
//! an integer converts to a bool, and so on. Range overflow and unparsable text
//! are still errors.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::errors::CoreError;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// A single SQL scalar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
}

impl SqlValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type tag used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "BOOL",
            Self::Int(_) => "INT",
            Self::UInt(_) => "UINT",
            Self::Float(_) => "FLOAT",
            Self::Double(_) => "DOUBLE",
            Self::Text(_) => "TEXT",
            Self::Bytes(_) => "BYTES",
            Self::Date(_) => "DATE",
            Self::DateTime(_) => "DATETIME",
            Self::Time(_) => "TIME",
        }
    }

    /// Parse a literal typed on the command line.
    ///
    /// `null` is NULL, `true`/`false` are booleans, integers and decimals are
    /// numbers, and a value wrapped in single quotes is always text (quotes
    /// removed). Anything else is text as given.
    #[must_use]
    pub fn parse_literal(text: &str) -> Self {
        if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
            return Self::Text(text[1..text.len() - 1].to_string());
        }
        if text.eq_ignore_ascii_case("null") {
            return Self::Null;
        }
        if text.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if text.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Ok(v) = text.parse::<i64>() {
            return Self::Int(v);
        }
        if let Ok(v) = text.parse::<u64>() {
            return Self::UInt(v);
        }
        if text.chars().any(|c| c.is_ascii_digit()) {
            if let Ok(v) = text.parse::<f64>() {
                if v.is_finite() {
                    return Self::Double(v);
                }
            }
        }
        Self::Text(text.to_string())
    }

    /// Convert into `T`, reporting failures against `column`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::UnexpectedNull` or `CoreError::TypeMismatch`.
    pub fn to<T: FromSqlValue>(&self, column: &str) -> Result<T, CoreError> {
        T::from_sql_value(self).map_err(|e| e.for_column(column))
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{v}'"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Self::Date(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{v}"),
            Self::Time(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    u64 => UInt,
    f32 => Float,
    f64 => Double,
    String => Text,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    NaiveDateTime => DateTime,
    NaiveTime => Time,
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

impl From<&[u8]> for SqlValue {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl<T: Into<Self>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Typed extraction
// ---------------------------------------------------------------------------

/// Why a `SqlValue` could not be converted. Attach a column name with
/// [`ConversionError::for_column`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    UnexpectedNull,
    Mismatch {
        expected: &'static str,
        found: String,
    },
}

impl ConversionError {
    fn mismatch(expected: &'static str, value: &SqlValue) -> Self {
        Self::Mismatch {
            expected,
            found: format!("{} {value}", value.type_name()),
        }
    }

    #[must_use]
    pub fn for_column(self, column: &str) -> CoreError {
        match self {
            Self::UnexpectedNull => CoreError::UnexpectedNull {
                column: column.to_string(),
            },
            Self::Mismatch { expected, found } => CoreError::TypeMismatch {
                column: column.to_string(),
                expected: expected.to_string(),
                found,
            },
        }
    }
}

/// Conversion from a borrowed `SqlValue`.
pub trait FromSqlValue: Sized {
    /// # Errors
    ///
    /// Returns `ConversionError` when the value is NULL or of an incompatible type.
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError>;
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Null => Err(ConversionError::UnexpectedNull),
            SqlValue::Text(s) => Ok(s.clone()),
            SqlValue::Bytes(b) => {
                Self::from_utf8(b.clone()).map_err(|_| ConversionError::mismatch("TEXT", value))
            }
            SqlValue::Bool(v) => Ok(v.to_string()),
            SqlValue::Int(v) => Ok(v.to_string()),
            SqlValue::UInt(v) => Ok(v.to_string()),
            SqlValue::Float(v) => Ok(v.to_string()),
            SqlValue::Double(v) => Ok(v.to_string()),
            SqlValue::Date(v) => Ok(v.to_string()),
            SqlValue::DateTime(v) => Ok(v.to_string()),
            SqlValue::Time(v) => Ok(v.to_string()),
        }
    }
}

impl FromSqlValue for i64 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        let mismatch = || ConversionError::mismatch("INT", value);
        match value {
            SqlValue::Null => Err(ConversionError::UnexpectedNull),
            SqlValue::Int(v) => Ok(*v),
            SqlValue::UInt(v) => Self::try_from(*v).map_err(|_| mismatch()),
            SqlValue::Bool(v) => Ok(Self::from(*v)),
            SqlValue::Double(v) => integral_f64(*v).ok_or_else(mismatch),
            SqlValue::Float(v) => integral_f64(f64::from(*v)).ok_or_else(mismatch),
            SqlValue::Text(s) => s.trim().parse().map_err(|_| mismatch()),
            _ => Err(mismatch()),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral_f64(v: f64) -> Option<i64> {
    if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

impl FromSqlValue for i32 {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        let wide = i64::from_sql_value(value).map_err(|e| match e {
            ConversionError::Mismatch { .. } => ConversionError::mismatch("INT", value),
            null => null,
        })?;
        Self::try_from(wide).map_err(|_| ConversionError::mismatch("INT", value))
    }
}

impl FromSqlValue for u64 {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        let mismatch = || ConversionError::mismatch("UINT", value);
        match value {
            SqlValue::Null => Err(ConversionError::UnexpectedNull),
            SqlValue::UInt(v) => Ok(*v),
            SqlValue::Int(v) => Self::try_from(*v).map_err(|_| mismatch()),
            SqlValue::Bool(v) => Ok(Self::from(*v)),
            SqlValue::Text(s) => s.trim().parse().map_err(|_| mismatch()),
            _ => Err(mismatch()),
        }
    }
}

impl FromSqlValue for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        let mismatch = || ConversionError::mismatch("DOUBLE", value);
        match value {
            SqlValue::Null => Err(ConversionError::UnexpectedNull),
            SqlValue::Double(v) => Ok(*v),
            SqlValue::Float(v) => Ok(Self::from(*v)),
            SqlValue::Int(v) => Ok(*v as Self),
            SqlValue::UInt(v) => Ok(*v as Self),
            SqlValue::Text(s) => s.trim().parse().map_err(|_| mismatch()),
            _ => Err(mismatch()),
        }
    }
}

impl FromSqlValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Float(v) => Ok(*v),
            other => f64::from_sql_value(other)
                .map(|v| v as Self)
                .map_err(|e| match e {
                    ConversionError::Mismatch { .. } => ConversionError::mismatch("FLOAT", other),
                    null => null,
                }),
        }
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        let mismatch = || ConversionError::mismatch("BOOL", value);
        match value {
            SqlValue::Null => Err(ConversionError::UnexpectedNull),
            SqlValue::Bool(v) => Ok(*v),
            SqlValue::Int(v) => Ok(*v != 0),
            SqlValue::UInt(v) => Ok(*v != 0),
            SqlValue::Text(s) => match s.trim() {
                t if t.eq_ignore_ascii_case("true") || t == "1" => Ok(true),
                t if t.eq_ignore_ascii_case("false") || t == "0" => Ok(false),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        }
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Null => Err(ConversionError::UnexpectedNull),
            SqlValue::Bytes(b) => Ok(b.clone()),
            SqlValue::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(ConversionError::mismatch("BYTES", other)),
        }
    }
}

impl FromSqlValue for NaiveDate {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        let mismatch = || ConversionError::mismatch("DATE", value);
        match value {
            SqlValue::Null => Err(ConversionError::UnexpectedNull),
            SqlValue::Date(d) => Ok(*d),
            SqlValue::DateTime(dt) => Ok(dt.date()),
            SqlValue::Text(s) => Self::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| mismatch()),
            _ => Err(mismatch()),
        }
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        let mismatch = || ConversionError::mismatch("DATETIME", value);
        match value {
            SqlValue::Null => Err(ConversionError::UnexpectedNull),
            SqlValue::DateTime(dt) => Ok(*dt),
            SqlValue::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            SqlValue::Text(s) => DATETIME_FORMATS
                .iter()
                .find_map(|fmt| Self::parse_from_str(s.trim(), fmt).ok())
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        }
    }
}

impl FromSqlValue for NaiveTime {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        let mismatch = || ConversionError::mismatch("TIME", value);
        match value {
            SqlValue::Null => Err(ConversionError::UnexpectedNull),
            SqlValue::Time(t) => Ok(*t),
            SqlValue::DateTime(dt) => Ok(dt.time()),
            SqlValue::Text(s) => Self::parse_from_str(s.trim(), "%H:%M:%S%.f").map_err(|_| mismatch()),
            _ => Err(mismatch()),
        }
    }
}
