//! Schema model element types
//!
//! Every element carries a stable `id` used to correlate it across two
//! snapshots. The id survives renames; by default it equals the name the
//! element was first created with. Keys, indexes and foreign keys refer to
//! columns by column id.

use std::collections::BTreeMap;

use super::{LogicalType, SqlValue};

/// Table element
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub id: String,
    pub name: String,
    /// Owning schema, `None` for the model's default schema
    pub schema: Option<String>,
    pub columns: Vec<Column>,
    pub primary_key: Option<PrimaryKey>,
    pub unique_constraints: Vec<UniqueConstraint>,
    pub indexes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
    pub check_constraints: Vec<CheckConstraint>,
    pub comment: Option<String>,
    pub temporal: Option<TemporalTable>,
    pub memory_optimized: bool,
    pub seed_data: Vec<SeedRow>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            schema: None,
            columns: Vec::new(),
            primary_key: None,
            unique_constraints: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            check_constraints: Vec::new(),
            comment: None,
            temporal: None,
            memory_optimized: false,
            seed_data: Vec::new(),
        }
    }

    /// Look up a column by its stable id
    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Resolve column ids to current column names, skipping unknown ids
    pub fn column_names(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.column(id).map(|c| c.name.clone()))
            .collect()
    }

    pub fn is_temporal(&self) -> bool {
        self.temporal.is_some()
    }

    /// Whether the index uses the column as a key or INCLUDE column
    pub fn index_touches(&self, index: &Index, column_id: &str) -> bool {
        index.columns.iter().any(|c| c == column_id) || index.include.iter().any(|c| c == column_id)
    }

    /// Get the full name (e.g., [dbo].[Users] or [Users])
    pub fn full_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("[{}].[{}]", schema, self.name),
            None => format!("[{}]", self.name),
        }
    }
}

/// Column element
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub id: String,
    pub name: String,
    pub logical_type: LogicalType,
    /// Provider-native type; resolved from the logical type and facets when absent
    pub store_type: Option<String>,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
    pub computed: Option<ComputedColumn>,
    pub value_generation: ValueGeneration,
    pub identity: Option<IdentitySpec>,
    pub max_length: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    /// `Some(false)` selects ANSI string types
    pub unicode: Option<bool>,
    pub fixed_length: bool,
    pub collation: Option<String>,
    pub comment: Option<String>,
    pub is_row_version: bool,
    pub is_sparse: bool,
    /// Set on the period columns of a temporal table
    pub period: Option<PeriodBoundary>,
}

impl Column {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            logical_type,
            store_type: None,
            nullable: false,
            default: None,
            computed: None,
            value_generation: ValueGeneration::None,
            identity: None,
            max_length: None,
            precision: None,
            scale: None,
            unicode: None,
            fixed_length: false,
            collation: None,
            comment: None,
            is_row_version: false,
            is_sparse: false,
            period: None,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.identity.is_some()
    }

    pub fn is_computed(&self) -> bool {
        self.computed.is_some()
    }
}

/// Default of a column: a literal value or a SQL expression, never both
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    Value(SqlValue),
    Sql(String),
}

/// Computed column definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedColumn {
    pub sql: String,
    /// PERSISTED
    pub stored: bool,
}

/// When the database generates a value for the column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueGeneration {
    #[default]
    None,
    OnAdd,
    OnAddOrUpdate,
}

impl ValueGeneration {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueGeneration::None => "None",
            ValueGeneration::OnAdd => "OnAdd",
            ValueGeneration::OnAddOrUpdate => "OnAddOrUpdate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "None" => Some(ValueGeneration::None),
            "OnAdd" => Some(ValueGeneration::OnAdd),
            "OnAddOrUpdate" => Some(ValueGeneration::OnAddOrUpdate),
            _ => None,
        }
    }
}

/// IDENTITY(seed, increment)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentitySpec {
    pub seed: i64,
    pub increment: i64,
}

impl Default for IdentitySpec {
    fn default() -> Self {
        Self {
            seed: 1,
            increment: 1,
        }
    }
}

/// Which end of SYSTEM_TIME a period column holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodBoundary {
    Start,
    End,
}

/// Primary key constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    pub id: String,
    pub name: String,
    /// Column ids
    pub columns: Vec<String>,
    pub clustered: Option<bool>,
}

/// Unique constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub id: String,
    pub name: String,
    pub columns: Vec<String>,
}

/// Index element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub id: String,
    pub name: String,
    /// Key column ids, in order
    pub columns: Vec<String>,
    pub unique: bool,
    /// Partial index predicate
    pub filter: Option<String>,
    /// Non-key column ids
    pub include: Vec<String>,
    pub clustered: Option<bool>,
    pub fill_factor: Option<u8>,
    pub online: bool,
}

/// Foreign key constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub id: String,
    pub name: String,
    /// Dependent column ids
    pub columns: Vec<String>,
    /// Id of the referenced table
    pub principal_table: String,
    /// Referenced column ids
    pub principal_columns: Vec<String>,
    pub on_delete: ReferentialAction,
}

/// Delete behavior of a foreign key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NoAction",
            ReferentialAction::Restrict => "Restrict",
            ReferentialAction::Cascade => "Cascade",
            ReferentialAction::SetNull => "SetNull",
            ReferentialAction::SetDefault => "SetDefault",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NoAction" => Some(ReferentialAction::NoAction),
            "Restrict" => Some(ReferentialAction::Restrict),
            "Cascade" => Some(ReferentialAction::Cascade),
            "SetNull" => Some(ReferentialAction::SetNull),
            "SetDefault" => Some(ReferentialAction::SetDefault),
            _ => None,
        }
    }
}

/// Check constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConstraint {
    pub id: String,
    pub name: String,
    pub sql: String,
}

/// Sequence element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub id: String,
    pub name: String,
    pub schema: Option<String>,
    pub logical_type: LogicalType,
    pub start: i64,
    pub increment: i64,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub cyclic: bool,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            schema: None,
            logical_type: LogicalType::Int64,
            start: 1,
            increment: 1,
            min_value: None,
            max_value: None,
            cyclic: false,
        }
    }
}

/// System-versioning metadata of a temporal table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalTable {
    pub history_table: String,
    /// `None` resolves to the current user's default schema at run time
    pub history_schema: Option<String>,
    /// Column id of the period start column
    pub period_start: String,
    /// Column id of the period end column
    pub period_end: String,
}

/// One seed row, values keyed by column id
pub type SeedRow = BTreeMap<String, SqlValue>;
