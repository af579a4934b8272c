//! Dialect-specific quoting, type mapping and literal formatting

use crate::model::{Column, LogicalType, SqlValue};

/// Largest length SQL Server accepts before `max` is required
const MAX_UNICODE_LENGTH: u32 = 4000;
const MAX_ANSI_LENGTH: u32 = 8000;

/// The pieces of SQL text that differ between database engines.
pub trait Dialect {
    /// Quote a single identifier
    fn delimit(&self, identifier: &str) -> String;

    /// Quote a possibly schema-qualified name
    fn qualify(&self, name: &str, schema: Option<&str>) -> String {
        match schema {
            Some(schema) => format!("{}.{}", self.delimit(schema), self.delimit(name)),
            None => self.delimit(name),
        }
    }

    /// Native store type for a column, unless one was configured explicitly
    fn store_type(&self, column: &Column) -> String;

    /// Store type used for `CREATE SEQUENCE .. AS`, `None` for the engine default
    fn sequence_type(&self, logical_type: LogicalType) -> Option<String>;

    /// Literal for a value. `unicode` selects national string literals.
    fn literal(&self, value: &SqlValue, unicode: bool) -> String;

    /// National string literal
    fn string_literal(&self, value: &str) -> String {
        self.literal(&SqlValue::String(value.to_string()), true)
    }

    fn statement_terminator(&self) -> &'static str {
        ";"
    }

    fn batch_separator(&self) -> &'static str {
        "GO"
    }
}

/// Transact-SQL for SQL Server and Azure SQL
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl SqlServerDialect {
    fn string_type(column: &Column) -> String {
        let unicode = column.unicode.unwrap_or(true);
        let (prefix, limit) = if unicode {
            ("n", MAX_UNICODE_LENGTH)
        } else {
            ("", MAX_ANSI_LENGTH)
        };
        let base = if column.fixed_length { "char" } else { "varchar" };
        match column.max_length {
            Some(length) if length <= limit => format!("{prefix}{base}({length})"),
            _ if column.fixed_length => format!("{prefix}{base}(1)"),
            _ => format!("{prefix}{base}(max)"),
        }
    }

    fn binary_type(column: &Column) -> String {
        if column.is_row_version {
            return "rowversion".to_string();
        }
        let base = if column.fixed_length {
            "binary"
        } else {
            "varbinary"
        };
        match column.max_length {
            Some(length) if length <= MAX_ANSI_LENGTH => format!("{base}({length})"),
            _ if column.fixed_length => format!("{base}(1)"),
            _ => format!("{base}(max)"),
        }
    }

    /// N'..' pieces joined with CONCAT when the text holds line breaks
    fn text_literal(text: &str, unicode: bool) -> String {
        let (prefix, char_fn) = if unicode { ("N", "NCHAR") } else { ("", "CHAR") };
        let mut pieces = Vec::new();
        let mut current = String::new();
        for ch in text.chars() {
            match ch {
                '\r' | '\n' => {
                    if !current.is_empty() {
                        pieces.push(format!("{prefix}'{}'", std::mem::take(&mut current)));
                    }
                    pieces.push(format!("{char_fn}({})", ch as u32));
                }
                '\'' => current.push_str("''"),
                _ => current.push(ch),
            }
        }
        if !current.is_empty() || pieces.is_empty() {
            pieces.push(format!("{prefix}'{current}'"));
        }
        if pieces.len() == 1 {
            pieces.remove(0)
        } else {
            format!("CONCAT({})", pieces.join(", "))
        }
    }

    fn float_literal(value: f64) -> String {
        let text = format!("{value:?}");
        if text.contains('e') {
            text.replace('e', "E")
        } else {
            format!("{text}E0")
        }
    }
}

impl Dialect for SqlServerDialect {
    fn delimit(&self, identifier: &str) -> String {
        format!("[{}]", identifier.replace(']', "]]"))
    }

    fn store_type(&self, column: &Column) -> String {
        if let Some(store_type) = &column.store_type {
            return store_type.clone();
        }
        match column.logical_type {
            LogicalType::Boolean => "bit".to_string(),
            LogicalType::Byte => "tinyint".to_string(),
            LogicalType::Int16 => "smallint".to_string(),
            LogicalType::Int32 => "int".to_string(),
            LogicalType::Int64 => "bigint".to_string(),
            LogicalType::Decimal => match (column.precision, column.scale) {
                (Some(precision), Some(scale)) => format!("decimal({precision},{scale})"),
                (Some(precision), None) => format!("decimal({precision})"),
                _ => "decimal(18,2)".to_string(),
            },
            LogicalType::Single => "real".to_string(),
            LogicalType::Double => "float".to_string(),
            LogicalType::String => Self::string_type(column),
            LogicalType::Binary => Self::binary_type(column),
            LogicalType::Guid => "uniqueidentifier".to_string(),
            LogicalType::Date => "date".to_string(),
            LogicalType::Time => match column.precision {
                Some(precision) => format!("time({precision})"),
                None => "time".to_string(),
            },
            LogicalType::DateTime => match column.precision {
                Some(precision) => format!("datetime2({precision})"),
                None => "datetime2".to_string(),
            },
            LogicalType::DateTimeOffset => match column.precision {
                Some(precision) => format!("datetimeoffset({precision})"),
                None => "datetimeoffset".to_string(),
            },
        }
    }

    fn sequence_type(&self, logical_type: LogicalType) -> Option<String> {
        match logical_type {
            LogicalType::Int64 => None,
            LogicalType::Byte => Some("tinyint".to_string()),
            LogicalType::Int16 => Some("smallint".to_string()),
            LogicalType::Int32 => Some("int".to_string()),
            LogicalType::Decimal => Some("decimal(18,0)".to_string()),
            other => Some(self.store_type(&Column::new("", other))),
        }
    }

    fn literal(&self, value: &SqlValue, unicode: bool) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(true) => "CAST(1 AS bit)".to_string(),
            SqlValue::Bool(false) => "CAST(0 AS bit)".to_string(),
            SqlValue::Int(value) => value.to_string(),
            SqlValue::Decimal(text) => text.clone(),
            SqlValue::Float(value) => Self::float_literal(*value),
            SqlValue::String(text) => Self::text_literal(text, unicode),
            SqlValue::Binary(bytes) => format!("0x{}", hex::encode_upper(bytes)),
            SqlValue::Guid(text)
            | SqlValue::Date(text)
            | SqlValue::Time(text)
            | SqlValue::DateTime(text)
            | SqlValue::DateTimeOffset(text) => format!("'{}'", text.replace('\'', "''")),
        }
    }
}
