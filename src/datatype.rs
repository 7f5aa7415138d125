// used for persistence
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};

// used for timestamps in the database
use chrono::{Datelike, NaiveDateTime};

// values are part of persisted predicates
use serde::{Deserialize, Serialize};

// used to print out readable forms of a value
use std::fmt;
use std::ops::RangeInclusive;

use crate::error::{CatalogueError, Result};

/// Timestamps are written as fixed-width text so that the backend orders them
/// lexicographically in the same way as chronologically.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

pub fn format_timestamp(t: &NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()
}

/// Years written with exactly four digits. Outside of these the text form no
/// longer sorts chronologically (`+10000-01-01` sorts before `2020-01-01`).
pub const STORABLE_YEARS: RangeInclusive<i32> = 0..=9999;

/// Fails with [`CatalogueError::InvalidValue`] for timestamps outside [`STORABLE_YEARS`].
pub fn check_timestamp(t: &NaiveDateTime, operand: &str) -> Result<()> {
    if STORABLE_YEARS.contains(&t.year()) {
        Ok(())
    } else {
        Err(CatalogueError::InvalidValue {
            operand: operand.to_string(),
            message: format!(
                "year {} is outside {}..={}",
                t.year(),
                STORABLE_YEARS.start(),
                STORABLE_YEARS.end()
            ),
        })
    }
}

/// Implemented by the Rust types that can be held in a [`Value`]. The constants
/// are what ends up in the type tag column of the attribute tables.
pub trait DataType: Sized {
    const DATA_TYPE: &'static str;
    fn wrap(self) -> Value;
    fn peek(value: &Value) -> Option<&Self>;
}

// ------------- Data Types --------------
impl DataType for i64 {
    const DATA_TYPE: &'static str = "integer";
    fn wrap(self) -> Value {
        Value::Integer(self)
    }
    fn peek(value: &Value) -> Option<&i64> {
        match value {
            Value::Integer(i) => Some(i),
            _ => None,
        }
    }
}
impl DataType for String {
    const DATA_TYPE: &'static str = "string";
    fn wrap(self) -> Value {
        Value::String(self)
    }
    fn peek(value: &Value) -> Option<&String> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}
impl DataType for bool {
    const DATA_TYPE: &'static str = "boolean";
    fn wrap(self) -> Value {
        Value::Boolean(self)
    }
    fn peek(value: &Value) -> Option<&bool> {
        match value {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }
}
impl DataType for NaiveDateTime {
    const DATA_TYPE: &'static str = "datetime";
    fn wrap(self) -> Value {
        Value::Timestamp(self)
    }
    fn peek(value: &Value) -> Option<&NaiveDateTime> {
        match value {
            Value::Timestamp(t) => Some(t),
            _ => None,
        }
    }
}
impl DataType for f64 {
    const DATA_TYPE: &'static str = "float";
    fn wrap(self) -> Value {
        Value::Float(self)
    }
    fn peek(value: &Value) -> Option<&f64> {
        match value {
            Value::Float(f) => Some(f),
            _ => None,
        }
    }
}

/// The kinds a [`Value`] can have. Each kind owns exactly one physical column
/// in the attribute tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Integer,
    String,
    Boolean,
    Timestamp,
    Float,
}

impl ValueKind {
    pub const ALL: [ValueKind; 5] = [
        ValueKind::Integer,
        ValueKind::String,
        ValueKind::Boolean,
        ValueKind::Timestamp,
        ValueKind::Float,
    ];
    /// The type tag stored next to the value.
    pub fn discriminator(self) -> &'static str {
        match self {
            ValueKind::Integer => i64::DATA_TYPE,
            ValueKind::String => String::DATA_TYPE,
            ValueKind::Boolean => bool::DATA_TYPE,
            ValueKind::Timestamp => NaiveDateTime::DATA_TYPE,
            ValueKind::Float => f64::DATA_TYPE,
        }
    }
    pub fn from_discriminator(tag: &str) -> Option<ValueKind> {
        ValueKind::ALL
            .into_iter()
            .find(|kind| kind.discriminator() == tag)
    }
    /// The physical column holding values of this kind.
    pub fn column(self) -> &'static str {
        match self {
            ValueKind::Integer => "int_value",
            ValueKind::String => "char_value",
            ValueKind::Boolean => "boolean_value",
            ValueKind::Timestamp => "datetime_value",
            ValueKind::Float => "float_value",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.discriminator())
    }
}

/// A typed attribute value or predicate literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    String(String),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Float(f64),
}

impl Value {
    /// Rejects values that would not read back or order as written: non-finite
    /// floats (SQLite binds NaN as null) and timestamps outside [`STORABLE_YEARS`].
    pub fn check(&self, operand: &str) -> Result<()> {
        match self {
            Value::Float(x) if !x.is_finite() => Err(CatalogueError::InvalidValue {
                operand: operand.to_string(),
                message: format!("{} is not a finite float", x),
            }),
            Value::Timestamp(t) => check_timestamp(t, operand),
            _ => Ok(()),
        }
    }
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::String(_) => ValueKind::String,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Float(_) => ValueKind::Float,
        }
    }
    pub fn get<T: DataType>(&self) -> Option<&T> {
        T::peek(self)
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Timestamp(t) => write!(f, "{}", t),
            Value::Float(x) => write!(f, "{}", x),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        i.wrap()
    }
}
impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        s.wrap()
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        b.wrap()
    }
}
impl From<NaiveDateTime> for Value {
    fn from(t: NaiveDateTime) -> Self {
        t.wrap()
    }
}
impl From<f64> for Value {
    fn from(x: f64) -> Self {
        x.wrap()
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Boolean(b) => ToSqlOutput::from(*b),
            Value::Timestamp(t) => ToSqlOutput::Owned(SqlValue::Text(format_timestamp(t))),
            Value::Float(x) => ToSqlOutput::from(*x),
        })
    }
}
