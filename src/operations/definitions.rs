//! Name-resolved definitions embedded in operations

use crate::model::ReferentialAction;

/// Primary key or unique constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub clustered: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckDefinition {
    pub name: String,
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub principal_schema: Option<String>,
    pub principal_table: String,
    pub principal_columns: Vec<String>,
    pub on_delete: ReferentialAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub filter: Option<String>,
    pub include: Vec<String>,
    pub clustered: Option<bool>,
    pub fill_factor: Option<u8>,
    pub online: bool,
}

/// Versioning settings rendered into CREATE TABLE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalDefinition {
    pub history_table: String,
    pub history_schema: Option<String>,
    pub period_start: String,
    pub period_end: String,
}
