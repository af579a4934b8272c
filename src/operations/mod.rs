//! Migration operations
//!
//! A closed set of atomic schema changes. The differ produces them, the
//! scheduler orders them and the SQL generator renders each one. Object
//! names in operations are resolved names, not model ids.

mod definitions;

pub use definitions::*;

use crate::model::{Column, ColumnDefault, Sequence, SqlValue};

/// One atomic schema change
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    EnsureSchema(EnsureSchemaOperation),
    DropSchema(DropSchemaOperation),
    CreateTable(CreateTableOperation),
    DropTable(DropTableOperation),
    RenameTable(RenameTableOperation),
    MoveTable(MoveTableOperation),
    AlterTable(AlterTableOperation),
    AddColumn(AddColumnOperation),
    DropColumn(DropColumnOperation),
    AlterColumn(AlterColumnOperation),
    RenameColumn(RenameColumnOperation),
    AddDefaultConstraint(AddDefaultConstraintOperation),
    DropDefaultConstraint(DropDefaultConstraintOperation),
    CreateIndex(CreateIndexOperation),
    DropIndex(DropIndexOperation),
    RenameIndex(RenameIndexOperation),
    AddPrimaryKey(AddPrimaryKeyOperation),
    DropPrimaryKey(DropConstraintOperation),
    AddUniqueConstraint(AddUniqueConstraintOperation),
    DropUniqueConstraint(DropConstraintOperation),
    AddForeignKey(AddForeignKeyOperation),
    DropForeignKey(DropConstraintOperation),
    AddCheckConstraint(AddCheckConstraintOperation),
    DropCheckConstraint(DropConstraintOperation),
    CreateSequence(CreateSequenceOperation),
    AlterSequence(AlterSequenceOperation),
    DropSequence(DropSequenceOperation),
    RenameSequence(RenameSequenceOperation),
    MoveSequence(MoveSequenceOperation),
    RestartSequence(RestartSequenceOperation),
    InsertData(InsertDataOperation),
    UpdateData(UpdateDataOperation),
    DeleteData(DeleteDataOperation),
    DisableSystemVersioning(SystemVersioningOperation),
    EnableSystemVersioning(EnableSystemVersioningOperation),
    AddPeriod(AddPeriodOperation),
    DropPeriod(SystemVersioningOperation),
    CreateDatabase(CreateDatabaseOperation),
    DropDatabase(DropDatabaseOperation),
    AlterDatabase(AlterDatabaseOperation),
    Sql(SqlOperation),
}

impl Operation {
    /// Short kind name used in logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::EnsureSchema(_) => "EnsureSchema",
            Operation::DropSchema(_) => "DropSchema",
            Operation::CreateTable(_) => "CreateTable",
            Operation::DropTable(_) => "DropTable",
            Operation::RenameTable(_) => "RenameTable",
            Operation::MoveTable(_) => "MoveTable",
            Operation::AlterTable(_) => "AlterTable",
            Operation::AddColumn(_) => "AddColumn",
            Operation::DropColumn(_) => "DropColumn",
            Operation::AlterColumn(_) => "AlterColumn",
            Operation::RenameColumn(_) => "RenameColumn",
            Operation::AddDefaultConstraint(_) => "AddDefaultConstraint",
            Operation::DropDefaultConstraint(_) => "DropDefaultConstraint",
            Operation::CreateIndex(_) => "CreateIndex",
            Operation::DropIndex(_) => "DropIndex",
            Operation::RenameIndex(_) => "RenameIndex",
            Operation::AddPrimaryKey(_) => "AddPrimaryKey",
            Operation::DropPrimaryKey(_) => "DropPrimaryKey",
            Operation::AddUniqueConstraint(_) => "AddUniqueConstraint",
            Operation::DropUniqueConstraint(_) => "DropUniqueConstraint",
            Operation::AddForeignKey(_) => "AddForeignKey",
            Operation::DropForeignKey(_) => "DropForeignKey",
            Operation::AddCheckConstraint(_) => "AddCheckConstraint",
            Operation::DropCheckConstraint(_) => "DropCheckConstraint",
            Operation::CreateSequence(_) => "CreateSequence",
            Operation::AlterSequence(_) => "AlterSequence",
            Operation::DropSequence(_) => "DropSequence",
            Operation::RenameSequence(_) => "RenameSequence",
            Operation::MoveSequence(_) => "MoveSequence",
            Operation::RestartSequence(_) => "RestartSequence",
            Operation::InsertData(_) => "InsertData",
            Operation::UpdateData(_) => "UpdateData",
            Operation::DeleteData(_) => "DeleteData",
            Operation::DisableSystemVersioning(_) => "DisableSystemVersioning",
            Operation::EnableSystemVersioning(_) => "EnableSystemVersioning",
            Operation::AddPeriod(_) => "AddPeriod",
            Operation::DropPeriod(_) => "DropPeriod",
            Operation::CreateDatabase(_) => "CreateDatabase",
            Operation::DropDatabase(_) => "DropDatabase",
            Operation::AlterDatabase(_) => "AlterDatabase",
            Operation::Sql(_) => "Sql",
        }
    }

    /// Table the operation touches, as (schema, name)
    pub fn table(&self) -> Option<(Option<&str>, &str)> {
        let (schema, table) = match self {
            Operation::CreateTable(op) => (&op.schema, &op.name),
            Operation::DropTable(op) => (&op.schema, &op.name),
            Operation::RenameTable(op) => (&op.schema, &op.name),
            Operation::MoveTable(op) => (&op.schema, &op.name),
            Operation::AlterTable(op) => (&op.schema, &op.name),
            Operation::AddColumn(op) => (&op.schema, &op.table),
            Operation::DropColumn(op) => (&op.schema, &op.table),
            Operation::AlterColumn(op) => (&op.schema, &op.table),
            Operation::RenameColumn(op) => (&op.schema, &op.table),
            Operation::AddDefaultConstraint(op) => (&op.schema, &op.table),
            Operation::DropDefaultConstraint(op) => (&op.schema, &op.table),
            Operation::CreateIndex(op) => return op.table.as_deref().map(|t| (op.schema.as_deref(), t)),
            Operation::DropIndex(op) => return op.table.as_deref().map(|t| (op.schema.as_deref(), t)),
            Operation::RenameIndex(op) => return op.table.as_deref().map(|t| (op.schema.as_deref(), t)),
            Operation::AddPrimaryKey(op) => (&op.schema, &op.table),
            Operation::AddUniqueConstraint(op) => (&op.schema, &op.table),
            Operation::AddForeignKey(op) => (&op.schema, &op.table),
            Operation::AddCheckConstraint(op) => (&op.schema, &op.table),
            Operation::DropPrimaryKey(op)
            | Operation::DropUniqueConstraint(op)
            | Operation::DropForeignKey(op)
            | Operation::DropCheckConstraint(op) => (&op.schema, &op.table),
            Operation::InsertData(op) => (&op.schema, &op.table),
            Operation::UpdateData(op) => (&op.schema, &op.table),
            Operation::DeleteData(op) => (&op.schema, &op.table),
            Operation::DisableSystemVersioning(op) | Operation::DropPeriod(op) => {
                (&op.schema, &op.table)
            }
            Operation::EnableSystemVersioning(op) => (&op.schema, &op.table),
            Operation::AddPeriod(op) => (&op.schema, &op.table),
            _ => return None,
        };
        Some((schema.as_deref(), table.as_str()))
    }

    /// Whether the operation must run outside of a transaction
    pub fn suppresses_transaction(&self) -> bool {
        match self {
            Operation::CreateDatabase(_)
            | Operation::DropDatabase(_)
            | Operation::AlterDatabase(_) => true,
            Operation::Sql(op) => op.suppress_transaction,
            Operation::CreateIndex(op) => op.index.online,
            Operation::CreateTable(op) => op.memory_optimized,
            Operation::DropTable(op) => op.memory_optimized,
            _ => false,
        }
    }

    /// Whether applying the operation can lose data
    pub fn is_destructive(&self) -> bool {
        match self {
            Operation::DropTable(_)
            | Operation::DropColumn(_)
            | Operation::DropSequence(_)
            | Operation::DeleteData(_)
            | Operation::DropDatabase(_)
            | Operation::DropSchema(_) => true,
            Operation::AlterColumn(op) => op.narrows(),
            _ => false,
        }
    }
}

/// CREATE SCHEMA when it does not exist yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureSchemaOperation {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropSchemaOperation {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableOperation {
    pub schema: Option<String>,
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Option<KeyDefinition>,
    pub unique_constraints: Vec<KeyDefinition>,
    pub check_constraints: Vec<CheckDefinition>,
    pub foreign_keys: Vec<ForeignKeyDefinition>,
    pub comment: Option<String>,
    pub temporal: Option<TemporalDefinition>,
    pub memory_optimized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTableOperation {
    pub schema: Option<String>,
    pub name: String,
    /// Outgoing foreign keys of the dropped table, used for ordering drops
    pub foreign_keys: Vec<ForeignKeyDefinition>,
    pub memory_optimized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameTableOperation {
    pub schema: Option<String>,
    pub name: String,
    pub new_name: String,
}

/// Transfer a table to another schema; `None` is the default schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTableOperation {
    pub schema: Option<String>,
    pub name: String,
    pub new_schema: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterTableOperation {
    pub schema: Option<String>,
    pub name: String,
    pub comment: Option<String>,
    pub old_comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddColumnOperation {
    pub schema: Option<String>,
    pub table: String,
    pub column: Column,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropColumnOperation {
    pub schema: Option<String>,
    pub table: String,
    pub name: String,
}

/// Change a column in place. Default constraints are handled by separate
/// drop/add default constraint operations.
#[derive(Debug, Clone, PartialEq)]
pub struct AlterColumnOperation {
    pub schema: Option<String>,
    pub table: String,
    pub column: Column,
    pub old_column: Column,
}

impl AlterColumnOperation {
    pub fn narrows(&self) -> bool {
        column_narrows(&self.old_column, &self.column)
    }
}

/// Type, collation or nullable to required: existing data or dependent
/// indexes may not survive an in-place ALTER COLUMN.
pub fn column_narrows(old: &Column, new: &Column) -> bool {
    new.logical_type != old.logical_type
        || new.store_type != old.store_type
        || new.max_length != old.max_length
        || new.precision != old.precision
        || new.scale != old.scale
        || new.unicode != old.unicode
        || new.fixed_length != old.fixed_length
        || new.collation != old.collation
        || (old.nullable && !new.nullable)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameColumnOperation {
    pub schema: Option<String>,
    pub table: String,
    pub name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddDefaultConstraintOperation {
    pub schema: Option<String>,
    pub table: String,
    pub column: String,
    pub default: ColumnDefault,
}

/// Drop whatever default constraint is bound to the column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropDefaultConstraintOperation {
    pub schema: Option<String>,
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIndexOperation {
    pub schema: Option<String>,
    pub table: Option<String>,
    pub index: IndexDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropIndexOperation {
    pub schema: Option<String>,
    pub table: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameIndexOperation {
    pub schema: Option<String>,
    pub table: Option<String>,
    pub name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPrimaryKeyOperation {
    pub schema: Option<String>,
    pub table: String,
    pub key: KeyDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddUniqueConstraintOperation {
    pub schema: Option<String>,
    pub table: String,
    pub key: KeyDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddForeignKeyOperation {
    pub schema: Option<String>,
    pub table: String,
    pub foreign_key: ForeignKeyDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddCheckConstraintOperation {
    pub schema: Option<String>,
    pub table: String,
    pub check: CheckDefinition,
}

/// Drop a named constraint (primary key, unique, foreign key or check)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropConstraintOperation {
    pub schema: Option<String>,
    pub table: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSequenceOperation {
    pub sequence: Sequence,
}

/// Change increment, bounds or cycling of a sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterSequenceOperation {
    pub sequence: Sequence,
    pub old_sequence: Sequence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropSequenceOperation {
    pub schema: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameSequenceOperation {
    pub schema: Option<String>,
    pub name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveSequenceOperation {
    pub schema: Option<String>,
    pub name: String,
    pub new_schema: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartSequenceOperation {
    pub schema: Option<String>,
    pub name: String,
    pub start_value: i64,
}

/// Insert seed rows; `values[i]` lines up with `columns`
#[derive(Debug, Clone, PartialEq)]
pub struct InsertDataOperation {
    pub schema: Option<String>,
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Vec<SqlValue>>,
    /// Wrap the insert in SET IDENTITY_INSERT ON/OFF
    pub identity_insert: bool,
}

/// Update seed rows identified by key values
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateDataOperation {
    pub schema: Option<String>,
    pub table: String,
    pub key_columns: Vec<String>,
    pub key_values: Vec<Vec<SqlValue>>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<SqlValue>>,
}

/// Delete seed rows identified by key values
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteDataOperation {
    pub schema: Option<String>,
    pub table: String,
    pub key_columns: Vec<String>,
    pub key_values: Vec<Vec<SqlValue>>,
}

/// SYSTEM_VERSIONING = OFF or DROP PERIOD on a temporal table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemVersioningOperation {
    pub schema: Option<String>,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnableSystemVersioningOperation {
    pub schema: Option<String>,
    pub table: String,
    pub history_table: String,
    pub history_schema: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPeriodOperation {
    pub schema: Option<String>,
    pub table: String,
    pub period_start: String,
    pub period_end: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDatabaseOperation {
    pub name: String,
    pub file_name: Option<String>,
    pub collation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropDatabaseOperation {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterDatabaseOperation {
    pub collation: Option<String>,
    pub old_collation: Option<String>,
    /// Add a memory-optimized filegroup if the database has none
    pub memory_optimized: bool,
}

/// Free-form SQL, split on standalone batch separator lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlOperation {
    pub sql: String,
    pub suppress_transaction: bool,
}
