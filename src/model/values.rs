//! Logical column types and literal values

use std::fmt;

/// Provider-independent data type of a column or sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    Boolean,
    Byte,
    Int16,
    Int32,
    Int64,
    Decimal,
    Single,
    Double,
    String,
    Binary,
    Guid,
    Date,
    Time,
    DateTime,
    DateTimeOffset,
}

impl LogicalType {
    /// Name used in snapshots
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::Boolean => "Boolean",
            LogicalType::Byte => "Byte",
            LogicalType::Int16 => "Int16",
            LogicalType::Int32 => "Int32",
            LogicalType::Int64 => "Int64",
            LogicalType::Decimal => "Decimal",
            LogicalType::Single => "Single",
            LogicalType::Double => "Double",
            LogicalType::String => "String",
            LogicalType::Binary => "Binary",
            LogicalType::Guid => "Guid",
            LogicalType::Date => "Date",
            LogicalType::Time => "Time",
            LogicalType::DateTime => "DateTime",
            LogicalType::DateTimeOffset => "DateTimeOffset",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, LogicalType::String)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            LogicalType::Byte
                | LogicalType::Int16
                | LogicalType::Int32
                | LogicalType::Int64
                | LogicalType::Decimal
                | LogicalType::Single
                | LogicalType::Double
        )
    }

    /// Value written into existing rows when a column becomes required
    /// without an explicit default.
    pub fn backfill_value(&self) -> SqlValue {
        match self {
            LogicalType::Boolean => SqlValue::Bool(false),
            LogicalType::Byte | LogicalType::Int16 | LogicalType::Int32 | LogicalType::Int64 => {
                SqlValue::Int(0)
            }
            LogicalType::Decimal => SqlValue::Decimal("0.0".to_string()),
            LogicalType::Single | LogicalType::Double => SqlValue::Float(0.0),
            LogicalType::String => SqlValue::String(String::new()),
            LogicalType::Binary => SqlValue::Binary(Vec::new()),
            LogicalType::Guid => {
                SqlValue::Guid("00000000-0000-0000-0000-000000000000".to_string())
            }
            LogicalType::Date => SqlValue::Date("0001-01-01".to_string()),
            LogicalType::Time => SqlValue::Time("00:00:00".to_string()),
            LogicalType::DateTime => SqlValue::DateTime("0001-01-01T00:00:00.0000000".to_string()),
            LogicalType::DateTimeOffset => {
                SqlValue::DateTimeOffset("0001-01-01T00:00:00.0000000+00:00".to_string())
            }
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogicalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "boolean" | "bool" => Ok(LogicalType::Boolean),
            "byte" => Ok(LogicalType::Byte),
            "int16" | "short" => Ok(LogicalType::Int16),
            "int32" | "int" => Ok(LogicalType::Int32),
            "int64" | "long" => Ok(LogicalType::Int64),
            "decimal" => Ok(LogicalType::Decimal),
            "single" | "float" => Ok(LogicalType::Single),
            "double" => Ok(LogicalType::Double),
            "string" => Ok(LogicalType::String),
            "binary" | "bytes" => Ok(LogicalType::Binary),
            "guid" => Ok(LogicalType::Guid),
            "date" => Ok(LogicalType::Date),
            "time" => Ok(LogicalType::Time),
            "datetime" => Ok(LogicalType::DateTime),
            "datetimeoffset" => Ok(LogicalType::DateTimeOffset),
            _ => Err(format!("Unknown logical type: {}", s)),
        }
    }
}

/// A literal value used for column defaults and seed data.
///
/// Temporal and decimal values keep their textual form so that the
/// rendered literal is exactly what was supplied.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(String),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
    Guid(String),
    Date(String),
    Time(String),
    DateTime(String),
    DateTimeOffset(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Tag used in snapshots
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "Null",
            SqlValue::Bool(_) => "Bool",
            SqlValue::Int(_) => "Int",
            SqlValue::Decimal(_) => "Decimal",
            SqlValue::Float(_) => "Float",
            SqlValue::String(_) => "String",
            SqlValue::Binary(_) => "Binary",
            SqlValue::Guid(_) => "Guid",
            SqlValue::Date(_) => "Date",
            SqlValue::Time(_) => "Time",
            SqlValue::DateTime(_) => "DateTime",
            SqlValue::DateTimeOffset(_) => "DateTimeOffset",
        }
    }

    /// Raw textual payload used in snapshots
    pub fn raw_text(&self) -> String {
        match self {
            SqlValue::Null => String::new(),
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Binary(bytes) => hex::encode(bytes),
            SqlValue::Decimal(s)
            | SqlValue::String(s)
            | SqlValue::Guid(s)
            | SqlValue::Date(s)
            | SqlValue::Time(s)
            | SqlValue::DateTime(s)
            | SqlValue::DateTimeOffset(s) => s.clone(),
        }
    }

    /// Rebuild a value from its snapshot tag and payload
    pub fn from_raw(kind: &str, text: &str) -> Option<SqlValue> {
        let value = match kind {
            "Null" => SqlValue::Null,
            "Bool" => SqlValue::Bool(text.parse().ok()?),
            "Int" => SqlValue::Int(text.parse().ok()?),
            "Float" => SqlValue::Float(text.parse().ok()?),
            "Binary" => SqlValue::Binary(hex::decode(text).ok()?),
            "Decimal" => SqlValue::Decimal(text.to_string()),
            "String" => SqlValue::String(text.to_string()),
            "Guid" => SqlValue::Guid(text.to_string()),
            "Date" => SqlValue::Date(text.to_string()),
            "Time" => SqlValue::Time(text.to_string()),
            "DateTime" => SqlValue::DateTime(text.to_string()),
            "DateTimeOffset" => SqlValue::DateTimeOffset(text.to_string()),
            _ => return None,
        };
        Some(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::String(value.to_string())
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value as i64)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}
