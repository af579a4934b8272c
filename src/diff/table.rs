//! Table-level diffing: tables, columns, keys, constraints and indexes

use std::collections::{HashMap, HashSet};

use super::correlate::correlate;
use super::expr::references_column;
use super::{
    foreign_key_definition, index_definition, key_definition, temporal_definition,
    unique_definition, Differ,
};
use crate::error::MigrationError;
use crate::model::{
    CheckConstraint, Column, ColumnDefault, ForeignKey, Index, PeriodBoundary, SqlValue, Table,
    UniqueConstraint,
};
use crate::operations::{
    column_narrows, AddCheckConstraintOperation, AddColumnOperation,
    AddDefaultConstraintOperation, AddForeignKeyOperation, AddPrimaryKeyOperation,
    AddUniqueConstraintOperation, AlterColumnOperation, AlterTableOperation, CheckDefinition,
    CreateIndexOperation, CreateTableOperation, DropColumnOperation, DropConstraintOperation,
    DropDefaultConstraintOperation, DropIndexOperation, DropTableOperation, MoveTableOperation,
    Operation, RenameColumnOperation, RenameIndexOperation, RenameTableOperation,
    SystemVersioningOperation,
};

const PERIOD_START_DEFAULT: &str = "0001-01-01T00:00:00.0000000";
const PERIOD_END_DEFAULT: &str = "9999-12-31T23:59:59.9999999";

/// Column ids per target table id whose in-place alteration invalidates
/// dependent indexes and constraints
pub(crate) type RebuiltColumns = HashMap<String, HashSet<String>>;

/// A correlated table and its resolved schemas
pub(crate) struct TablePair<'a> {
    pub source: &'a Table,
    pub target: &'a Table,
    pub source_schema: Option<String>,
    pub target_schema: Option<String>,
}

/// Names of a history table on both sides of a temporal diff
pub(crate) struct HistoryNames {
    pub source_schema: Option<String>,
    pub source_name: String,
    pub target_schema: Option<String>,
    pub target_name: String,
}

impl<'a> Differ<'a> {
    pub(super) fn diff_tables(&mut self) -> Result<(), MigrationError> {
        let tables = correlate(
            "table",
            &self.source.tables,
            &self.target.tables,
            |t: &Table| t.id.as_str(),
            |t: &Table| t.name.as_str(),
        )?;

        let rebuilt = rebuilt_columns(&tables.matched);

        for source in tables.removed {
            self.drop_table(source);
        }
        for &(source, target) in &tables.matched {
            let pair = TablePair {
                source,
                target,
                source_schema: self.source_schema(source.schema.as_deref()),
                target_schema: self.target_schema(target.schema.as_deref()),
            };
            self.diff_table(&pair, &rebuilt)?;
        }
        for target in tables.added {
            self.create_table(target);
        }
        Ok(())
    }

    fn create_table(&mut self, table: &Table) {
        let schema = self.target_schema(table.schema.as_deref());
        self.push(Operation::CreateTable(CreateTableOperation {
            schema: schema.clone(),
            name: table.name.clone(),
            columns: table.columns.clone(),
            primary_key: table.primary_key.as_ref().map(|pk| key_definition(table, pk)),
            unique_constraints: table
                .unique_constraints
                .iter()
                .map(|u| unique_definition(table, u))
                .collect(),
            check_constraints: table
                .check_constraints
                .iter()
                .map(check_definition)
                .collect(),
            foreign_keys: table
                .foreign_keys
                .iter()
                .map(|fk| foreign_key_definition(self.target, table, fk))
                .collect(),
            comment: table.comment.clone(),
            temporal: temporal_definition(self.target, table),
            memory_optimized: table.memory_optimized,
        }));

        for index in &table.indexes {
            self.push(Operation::CreateIndex(CreateIndexOperation {
                schema: schema.clone(),
                table: Some(table.name.clone()),
                index: index_definition(table, index),
            }));
        }
    }

    fn drop_table(&mut self, table: &Table) {
        let schema = self.source_schema(table.schema.as_deref());
        if table.is_temporal() {
            self.push(Operation::DisableSystemVersioning(SystemVersioningOperation {
                schema: schema.clone(),
                table: table.name.clone(),
            }));
        }
        self.push(Operation::DropTable(DropTableOperation {
            schema,
            name: table.name.clone(),
            foreign_keys: table
                .foreign_keys
                .iter()
                .map(|fk| foreign_key_definition(self.source, table, fk))
                .collect(),
            memory_optimized: table.memory_optimized,
        }));
        if let Some(history) = temporal_definition(self.source, table) {
            self.push(Operation::DropTable(DropTableOperation {
                schema: history.history_schema,
                name: history.history_table,
                foreign_keys: Vec::new(),
                memory_optimized: false,
            }));
        }
    }

    fn diff_table(&mut self, pair: &TablePair<'_>, rebuilt: &RebuiltColumns) -> Result<(), MigrationError> {
        let (source, target) = (pair.source, pair.target);

        if source.memory_optimized != target.memory_optimized {
            return Err(MigrationError::unsupported(
                target.full_name(),
                "memory optimization cannot be changed on an existing table",
            ));
        }

        let start = self.operations.len();

        if source.name != target.name {
            self.push(Operation::RenameTable(RenameTableOperation {
                schema: pair.source_schema.clone(),
                name: source.name.clone(),
                new_name: target.name.clone(),
            }));
        }
        if pair.source_schema != pair.target_schema {
            self.push(Operation::MoveTable(MoveTableOperation {
                schema: pair.source_schema.clone(),
                name: target.name.clone(),
                new_schema: pair.target_schema.clone(),
            }));
        }
        if source.comment != target.comment {
            self.push(Operation::AlterTable(AlterTableOperation {
                schema: pair.target_schema.clone(),
                name: target.name.clone(),
                comment: target.comment.clone(),
                old_comment: source.comment.clone(),
            }));
        }

        let history = match (&source.temporal, &target.temporal) {
            (Some(_), Some(_)) => {
                let source_history = temporal_definition(self.source, source);
                let target_history = temporal_definition(self.target, target);
                source_history.zip(target_history).map(|(s, t)| HistoryNames {
                    source_schema: s.history_schema,
                    source_name: s.history_table,
                    target_schema: t.history_schema,
                    target_name: t.history_table,
                })
            }
            _ => None,
        };

        let empty = HashSet::new();
        let table_rebuilt = rebuilt.get(&target.id).unwrap_or(&empty);

        let mirrored = self.diff_columns(pair, history.as_ref())?;
        self.diff_primary_key(pair, table_rebuilt);
        self.diff_unique_constraints(pair, table_rebuilt)?;
        self.diff_check_constraints(pair)?;
        self.diff_foreign_keys(pair, rebuilt)?;
        self.diff_indexes(pair, table_rebuilt)?;

        self.diff_temporal(pair, history.as_ref(), start, mirrored);
        Ok(())
    }

    /// Diff the columns of a table. Returns the operations to replay on the
    /// history table of a temporal table.
    fn diff_columns(
        &mut self,
        pair: &TablePair<'_>,
        history: Option<&HistoryNames>,
    ) -> Result<Vec<Operation>, MigrationError> {
        let (source, target) = (pair.source, pair.target);
        let columns = correlate(
            "column",
            &source.columns,
            &target.columns,
            |c: &Column| c.id.as_str(),
            |c: &Column| c.name.as_str(),
        )?;
        let mut mirrored = Vec::new();

        for column in columns.removed {
            self.push(Operation::DropColumn(DropColumnOperation {
                schema: pair.source_schema.clone(),
                table: source.name.clone(),
                name: column.name.clone(),
            }));
            if let Some(history) = history {
                mirrored.push(Operation::DropColumn(DropColumnOperation {
                    schema: history.source_schema.clone(),
                    table: history.source_name.clone(),
                    name: column.name.clone(),
                }));
            }
        }

        for (old, new) in columns.matched {
            self.diff_column(pair, old, new, history, &mut mirrored)?;
        }

        for column in columns.added {
            let mut added = column.clone();
            apply_add_default(&mut added);
            if let Some(history) = history {
                mirrored.push(Operation::AddColumn(AddColumnOperation {
                    schema: history.target_schema.clone(),
                    table: history.target_name.clone(),
                    column: history_column(&added),
                }));
            }
            self.push(Operation::AddColumn(AddColumnOperation {
                schema: pair.target_schema.clone(),
                table: target.name.clone(),
                column: added,
            }));
        }
        Ok(mirrored)
    }

    fn diff_column(
        &mut self,
        pair: &TablePair<'_>,
        old: &Column,
        new: &Column,
        history: Option<&HistoryNames>,
        mirrored: &mut Vec<Operation>,
    ) -> Result<(), MigrationError> {
        let (source, target) = (pair.source, pair.target);
        let entity = format!("{}.[{}]", target.full_name(), new.name);

        match (old.identity, new.identity) {
            (None, Some(_)) => {
                return Err(MigrationError::unsupported(
                    entity,
                    "IDENTITY cannot be added to an existing column",
                ))
            }
            (Some(_), None) => {
                return Err(MigrationError::unsupported(
                    entity,
                    "IDENTITY cannot be removed from an existing column",
                ))
            }
            (Some(a), Some(b)) if a != b => {
                return Err(MigrationError::unsupported(
                    entity,
                    "IDENTITY seed and increment cannot be altered in place",
                ))
            }
            _ => {}
        }

        if old.computed != new.computed {
            // No in-place form exists; recreate the column
            self.push(Operation::DropColumn(DropColumnOperation {
                schema: pair.source_schema.clone(),
                table: source.name.clone(),
                name: old.name.clone(),
            }));
            let mut added = new.clone();
            apply_add_default(&mut added);
            self.push(Operation::AddColumn(AddColumnOperation {
                schema: pair.target_schema.clone(),
                table: target.name.clone(),
                column: added,
            }));
            if let (Some(history), true) = (history, old.name != new.name) {
                mirrored.push(Operation::RenameColumn(RenameColumnOperation {
                    schema: history.target_schema.clone(),
                    table: history.target_name.clone(),
                    name: old.name.clone(),
                    new_name: new.name.clone(),
                }));
            }
            return Ok(());
        }

        if old.name != new.name {
            self.push(Operation::RenameColumn(RenameColumnOperation {
                schema: pair.target_schema.clone(),
                table: target.name.clone(),
                name: old.name.clone(),
                new_name: new.name.clone(),
            }));
            if let Some(history) = history {
                mirrored.push(Operation::RenameColumn(RenameColumnOperation {
                    schema: history.target_schema.clone(),
                    table: history.target_name.clone(),
                    name: old.name.clone(),
                    new_name: new.name.clone(),
                }));
            }
        }

        let backfill = old.nullable
            && !new.nullable
            && new.default.is_none()
            && !new.is_identity()
            && !new.is_row_version
            && new.period.is_none();
        let mut altered = new.clone();
        if backfill {
            altered.default = Some(ColumnDefault::Value(new.logical_type.backfill_value()));
        }

        let structural = column_narrows(old, new)
            || old.nullable != new.nullable
            || old.is_sparse != new.is_sparse
            || old.is_row_version != new.is_row_version;
        let comment_changed = old.comment != new.comment;
        let default_changed = old.default != new.default;

        let rebind_default = default_changed || backfill || (structural && old.default.is_some());
        if rebind_default && old.default.is_some() {
            self.push(Operation::DropDefaultConstraint(DropDefaultConstraintOperation {
                schema: pair.source_schema.clone(),
                table: source.name.clone(),
                column: old.name.clone(),
            }));
        }

        if structural || comment_changed {
            if structural {
                if let Some(history) = history {
                    let mut history_old = history_column(old);
                    history_old.name = new.name.clone();
                    mirrored.push(Operation::AlterColumn(AlterColumnOperation {
                        schema: history.target_schema.clone(),
                        table: history.target_name.clone(),
                        column: history_column(&altered),
                        old_column: history_old,
                    }));
                }
            }
            self.push(Operation::AlterColumn(AlterColumnOperation {
                schema: pair.target_schema.clone(),
                table: target.name.clone(),
                column: altered.clone(),
                old_column: old.clone(),
            }));
        }

        if rebind_default {
            if let Some(default) = altered.default {
                self.push(Operation::AddDefaultConstraint(AddDefaultConstraintOperation {
                    schema: pair.target_schema.clone(),
                    table: target.name.clone(),
                    column: new.name.clone(),
                    default,
                }));
            }
        }
        Ok(())
    }

    fn diff_primary_key(&mut self, pair: &TablePair<'_>, rebuilt: &HashSet<String>) {
        let (source, target) = (pair.source, pair.target);
        let (drop, add) = match (&source.primary_key, &target.primary_key) {
            (Some(old), Some(new)) if old.id == new.id => {
                let changed = old.name != new.name
                    || old.columns != new.columns
                    || old.clustered != new.clustered
                    || touches(&new.columns, rebuilt);
                if changed {
                    (Some(old), Some(new))
                } else {
                    (None, None)
                }
            }
            (old, new) => (old.as_ref(), new.as_ref()),
        };

        if let Some(old) = drop {
            self.push(Operation::DropPrimaryKey(DropConstraintOperation {
                schema: pair.source_schema.clone(),
                table: source.name.clone(),
                name: old.name.clone(),
            }));
        }
        if let Some(new) = add {
            self.push(Operation::AddPrimaryKey(AddPrimaryKeyOperation {
                schema: pair.target_schema.clone(),
                table: target.name.clone(),
                key: key_definition(target, new),
            }));
        }
    }

    fn diff_unique_constraints(
        &mut self,
        pair: &TablePair<'_>,
        rebuilt: &HashSet<String>,
    ) -> Result<(), MigrationError> {
        let (source, target) = (pair.source, pair.target);
        let keys = correlate(
            "unique constraint",
            &source.unique_constraints,
            &target.unique_constraints,
            |u: &UniqueConstraint| u.id.as_str(),
            |u: &UniqueConstraint| u.name.as_str(),
        )?;

        let mut dropped: Vec<&UniqueConstraint> = keys.removed;
        let mut added: Vec<&UniqueConstraint> = keys.added;
        for (old, new) in keys.matched {
            if old.name != new.name || old.columns != new.columns || touches(&new.columns, rebuilt) {
                dropped.push(old);
                added.push(new);
            }
        }

        for old in dropped {
            self.push(Operation::DropUniqueConstraint(DropConstraintOperation {
                schema: pair.source_schema.clone(),
                table: source.name.clone(),
                name: old.name.clone(),
            }));
        }
        for new in added {
            self.push(Operation::AddUniqueConstraint(AddUniqueConstraintOperation {
                schema: pair.target_schema.clone(),
                table: target.name.clone(),
                key: unique_definition(target, new),
            }));
        }
        Ok(())
    }

    fn diff_check_constraints(&mut self, pair: &TablePair<'_>) -> Result<(), MigrationError> {
        let (source, target) = (pair.source, pair.target);
        let checks = correlate(
            "check constraint",
            &source.check_constraints,
            &target.check_constraints,
            |c: &CheckConstraint| c.id.as_str(),
            |c: &CheckConstraint| c.name.as_str(),
        )?;

        let mut dropped: Vec<&CheckConstraint> = checks.removed;
        let mut added: Vec<&CheckConstraint> = checks.added;
        for (old, new) in checks.matched {
            if old.name != new.name || old.sql != new.sql {
                dropped.push(old);
                added.push(new);
            }
        }

        for old in dropped {
            self.push(Operation::DropCheckConstraint(DropConstraintOperation {
                schema: pair.source_schema.clone(),
                table: source.name.clone(),
                name: old.name.clone(),
            }));
        }
        for new in added {
            self.push(Operation::AddCheckConstraint(AddCheckConstraintOperation {
                schema: pair.target_schema.clone(),
                table: target.name.clone(),
                check: check_definition(new),
            }));
        }
        Ok(())
    }

    fn diff_foreign_keys(
        &mut self,
        pair: &TablePair<'_>,
        rebuilt: &RebuiltColumns,
    ) -> Result<(), MigrationError> {
        let (source, target) = (pair.source, pair.target);
        let keys = correlate(
            "foreign key",
            &source.foreign_keys,
            &target.foreign_keys,
            |f: &ForeignKey| f.id.as_str(),
            |f: &ForeignKey| f.name.as_str(),
        )?;

        let empty = HashSet::new();
        let own = rebuilt.get(&target.id).unwrap_or(&empty);
        let mut dropped: Vec<&ForeignKey> = keys.removed;
        let mut added: Vec<&ForeignKey> = keys.added;
        for (old, new) in keys.matched {
            let principal = rebuilt.get(&new.principal_table).unwrap_or(&empty);
            if old != new || touches(&new.columns, own) || touches(&new.principal_columns, principal) {
                dropped.push(old);
                added.push(new);
            }
        }

        for old in dropped {
            self.push(Operation::DropForeignKey(DropConstraintOperation {
                schema: pair.source_schema.clone(),
                table: source.name.clone(),
                name: old.name.clone(),
            }));
        }
        for new in added {
            self.push(Operation::AddForeignKey(AddForeignKeyOperation {
                schema: pair.target_schema.clone(),
                table: target.name.clone(),
                foreign_key: foreign_key_definition(self.target, target, new),
            }));
        }
        Ok(())
    }

    fn diff_indexes(
        &mut self,
        pair: &TablePair<'_>,
        rebuilt: &HashSet<String>,
    ) -> Result<(), MigrationError> {
        let (source, target) = (pair.source, pair.target);
        let indexes = correlate(
            "index",
            &source.indexes,
            &target.indexes,
            |i: &Index| i.id.as_str(),
            |i: &Index| i.name.as_str(),
        )?;

        let mut dropped: Vec<&Index> = indexes.removed;
        let mut added: Vec<&Index> = indexes.added;
        for (old, new) in indexes.matched {
            let redefined = old.columns != new.columns
                || old.unique != new.unique
                || old.filter != new.filter
                || old.include != new.include
                || old.clustered != new.clustered
                || old.fill_factor != new.fill_factor;
            if redefined || index_depends_on(target, new, rebuilt) {
                dropped.push(old);
                added.push(new);
            } else if old.name != new.name {
                self.push(Operation::RenameIndex(RenameIndexOperation {
                    schema: pair.target_schema.clone(),
                    table: Some(target.name.clone()),
                    name: old.name.clone(),
                    new_name: new.name.clone(),
                }));
            }
        }

        for old in dropped {
            self.push(Operation::DropIndex(DropIndexOperation {
                schema: pair.source_schema.clone(),
                table: Some(source.name.clone()),
                name: old.name.clone(),
            }));
        }
        for new in added {
            self.push(Operation::CreateIndex(CreateIndexOperation {
                schema: pair.target_schema.clone(),
                table: Some(target.name.clone()),
                index: index_definition(target, new),
            }));
        }
        Ok(())
    }
}

/// Columns of matched tables that are narrowed or recreated
fn rebuilt_columns(matched: &[(&Table, &Table)]) -> RebuiltColumns {
    let mut rebuilt = RebuiltColumns::new();
    for (source, target) in matched {
        for new in &target.columns {
            let Some(old) = source.column(&new.id) else {
                continue;
            };
            if column_narrows(old, new) || old.computed != new.computed {
                rebuilt
                    .entry(target.id.clone())
                    .or_default()
                    .insert(new.id.clone());
            }
        }
    }
    rebuilt
}

fn touches(columns: &[String], rebuilt: &HashSet<String>) -> bool {
    columns.iter().any(|c| rebuilt.contains(c))
}

/// Whether an index uses any rebuilt column as key, INCLUDE or in its filter
fn index_depends_on(table: &Table, index: &Index, rebuilt: &HashSet<String>) -> bool {
    rebuilt.iter().any(|id| {
        table.index_touches(index, id)
            || match (&index.filter, table.column(id)) {
                (Some(filter), Some(column)) => references_column(filter, &column.name),
                _ => false,
            }
    })
}

fn check_definition(check: &CheckConstraint) -> CheckDefinition {
    CheckDefinition {
        name: check.name.clone(),
        sql: check.sql.clone(),
    }
}

/// Give a required column being added to an existing table a default so
/// existing rows satisfy NOT NULL.
pub(crate) fn apply_add_default(column: &mut Column) {
    if let Some(boundary) = column.period {
        if column.default.is_none() {
            let value = match boundary {
                PeriodBoundary::Start => PERIOD_START_DEFAULT,
                PeriodBoundary::End => PERIOD_END_DEFAULT,
            };
            column.default = Some(ColumnDefault::Value(SqlValue::DateTime(value.to_string())));
        }
        return;
    }
    if column.nullable
        || column.default.is_some()
        || column.is_identity()
        || column.is_computed()
        || column.is_row_version
    {
        return;
    }
    column.default = Some(ColumnDefault::Value(column.logical_type.backfill_value()));
}

/// Shape of a column on a history table: plain, never generated
fn history_column(column: &Column) -> Column {
    let mut plain = column.clone();
    plain.identity = None;
    plain.computed = None;
    plain.period = None;
    plain.comment = None;
    plain.is_row_version = false;
    if column.is_computed() {
        plain.nullable = true;
    }
    plain
}
