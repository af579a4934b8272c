//! Tables, columns, defaults and descriptions

use super::builder::CommandListBuilder;
use super::generator::SqlGenerator;
use crate::model::{Column, ColumnDefault, PeriodBoundary};
use crate::operations::{
    column_narrows, AddColumnOperation, AddDefaultConstraintOperation, AlterColumnOperation,
    AlterTableOperation, CreateTableOperation, DropColumnOperation, DropTableOperation,
};

/// Variables already declared by the description statements of one command
#[derive(Debug, Default)]
pub(super) struct Declarations {
    default_schema: bool,
    description: bool,
}

impl SqlGenerator<'_> {
    // ========================================================================
    // Tables
    // ========================================================================

    pub(super) fn create_table(&self, op: &CreateTableOperation, b: &mut CommandListBuilder) {
        let mut body = CommandListBuilder::new();
        match &op.temporal {
            Some(temporal) => self.create_temporal_table(op, temporal, &mut body),
            None => {
                self.create_table_head(op, &mut body);
                if op.memory_optimized {
                    body.append_line("")
                        .increment_indent()
                        .append_line("WITH")
                        .increment_indent()
                        .append("(MEMORY_OPTIMIZED = ON)")
                        .decrement_indent()
                        .decrement_indent();
                }
                body.append_line(self.terminator());
            }
        }

        let mut declarations = Declarations::default();
        if let Some(comment) = &op.comment {
            self.add_description(op.schema.as_deref(), &op.name, None, comment, &mut declarations, &mut body);
        }
        for column in &op.columns {
            if let Some(comment) = &column.comment {
                self.add_description(
                    op.schema.as_deref(),
                    &op.name,
                    Some(&column.name),
                    comment,
                    &mut declarations,
                    &mut body,
                );
            }
        }

        let condition = self.object_missing(&op.name, op.schema.as_deref());
        self.append_guarded(&condition, &body.take_pending(), b);
    }

    /// `CREATE TABLE [t] (` through the closing parenthesis, unterminated
    pub(super) fn create_table_head(&self, op: &CreateTableOperation, b: &mut CommandListBuilder) {
        let mut lines: Vec<String> = op
            .columns
            .iter()
            .map(|column| self.column_definition(column, true))
            .collect();

        if let Some(key) = &op.primary_key {
            lines.push(format!(
                "CONSTRAINT {} PRIMARY KEY {}{}",
                self.dialect.delimit(&key.name),
                clustering(key.clustered),
                self.column_list(&key.columns)
            ));
        }
        for key in &op.unique_constraints {
            lines.push(format!(
                "CONSTRAINT {} UNIQUE {}{}",
                self.dialect.delimit(&key.name),
                clustering(key.clustered),
                self.column_list(&key.columns)
            ));
        }
        for check in &op.check_constraints {
            lines.push(format!(
                "CONSTRAINT {} CHECK ({})",
                self.dialect.delimit(&check.name),
                check.sql
            ));
        }
        for foreign_key in &op.foreign_keys {
            lines.push(format!(
                "CONSTRAINT {} {}",
                self.dialect.delimit(&foreign_key.name),
                self.foreign_key_clause(foreign_key)
            ));
        }
        if let Some(temporal) = &op.temporal {
            lines.push(format!(
                "PERIOD FOR SYSTEM_TIME({}, {})",
                self.dialect.delimit(&temporal.period_start),
                self.dialect.delimit(&temporal.period_end)
            ));
        }

        b.append("CREATE TABLE ")
            .append(&self.dialect.qualify(&op.name, op.schema.as_deref()))
            .append_line(" (")
            .increment_indent();
        let last = lines.len().saturating_sub(1);
        for (i, line) in lines.iter().enumerate() {
            b.append(line);
            b.append_line(if i < last { "," } else { "" });
        }
        b.decrement_indent().append(")");
    }

    pub(super) fn drop_table(&self, op: &DropTableOperation, b: &mut CommandListBuilder) {
        let sql = format!(
            "DROP TABLE {}{}\n",
            self.dialect.qualify(&op.name, op.schema.as_deref()),
            self.terminator()
        );
        let condition = self.object_exists(&op.name, op.schema.as_deref());
        self.append_guarded(&condition, &sql, b);
    }

    pub(super) fn alter_table(&self, op: &AlterTableOperation, b: &mut CommandListBuilder) {
        if op.comment == op.old_comment {
            return;
        }
        let mut declarations = Declarations::default();
        if op.old_comment.is_some() {
            self.drop_description(op.schema.as_deref(), &op.name, None, &mut declarations, b);
        }
        if let Some(comment) = &op.comment {
            self.add_description(op.schema.as_deref(), &op.name, None, comment, &mut declarations, b);
        }
    }

    // ========================================================================
    // Columns
    // ========================================================================

    /// Full column definition as used by CREATE TABLE and ADD. Period
    /// columns are only `GENERATED ALWAYS` inside CREATE TABLE; columns
    /// added to an existing table become period columns via ADD PERIOD.
    pub(super) fn column_definition(&self, column: &Column, generated: bool) -> String {
        if let Some(computed) = &column.computed {
            let mut sql = format!("{} AS {}", self.dialect.delimit(&column.name), computed.sql);
            if computed.stored {
                sql.push_str(" PERSISTED");
            }
            if let Some(collation) = &column.collation {
                sql.push_str(" COLLATE ");
                sql.push_str(collation);
            }
            return sql;
        }

        let mut sql = self.column_shape(column, generated);
        if let Some(default) = column.default.as_ref().filter(|_| !column.is_identity()) {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.default_value(default, column.unicode.unwrap_or(true)));
        }
        if let Some(identity) = &column.identity {
            sql.push_str(" IDENTITY");
            if (identity.seed, identity.increment) != (1, 1) {
                sql.push_str(&format!("({}, {})", identity.seed, identity.increment));
            }
        }
        sql
    }

    /// Name, type and nullability, without default or identity
    fn column_shape(&self, column: &Column, generated: bool) -> String {
        let mut sql = format!(
            "{} {}",
            self.dialect.delimit(&column.name),
            self.dialect.store_type(column)
        );
        match column.period.filter(|_| generated) {
            Some(PeriodBoundary::Start) => sql.push_str(" GENERATED ALWAYS AS ROW START"),
            Some(PeriodBoundary::End) => sql.push_str(" GENERATED ALWAYS AS ROW END"),
            None => {}
        }
        if column.is_sparse {
            sql.push_str(" SPARSE");
        }
        if let Some(collation) = &column.collation {
            sql.push_str(" COLLATE ");
            sql.push_str(collation);
        }
        sql.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
        sql
    }

    pub(super) fn default_value(&self, default: &ColumnDefault, unicode: bool) -> String {
        match default {
            ColumnDefault::Value(value) => self.dialect.literal(value, unicode),
            ColumnDefault::Sql(sql) => format!("({sql})"),
        }
    }

    pub(super) fn add_column(&self, op: &AddColumnOperation, b: &mut CommandListBuilder) {
        let mut body = CommandListBuilder::new();
        self.add_column_body(op.schema.as_deref(), &op.table, &op.column, &mut body);
        let condition = self.column_missing(op.schema.as_deref(), &op.table, &op.column.name);
        self.append_guarded(&condition, &body.take_pending(), b);
    }

    fn add_column_body(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &Column,
        b: &mut CommandListBuilder,
    ) {
        let statement = format!(
            "ALTER TABLE {} ADD {}{}\n",
            self.dialect.qualify(table, schema),
            self.column_definition(column, false),
            self.terminator()
        );
        if column.is_computed() {
            self.append_exec_when_idempotent(&statement, b);
        } else {
            b.append(&statement);
        }
        if let Some(comment) = &column.comment {
            let mut declarations = Declarations::default();
            self.add_description(schema, table, Some(&column.name), comment, &mut declarations, b);
        }
    }

    pub(super) fn drop_column(&mut self, op: &DropColumnOperation, b: &mut CommandListBuilder) {
        let mut body = CommandListBuilder::new();
        self.drop_column_body(op.schema.as_deref(), &op.table, &op.name, &mut body);
        let condition = self.column_exists(op.schema.as_deref(), &op.table, &op.name);
        self.append_guarded(&condition, &body.take_pending(), b);
    }

    fn drop_column_body(
        &mut self,
        schema: Option<&str>,
        table: &str,
        column: &str,
        b: &mut CommandListBuilder,
    ) {
        self.drop_default_constraint(schema, table, column, b);
        b.append_line(&format!(
            "ALTER TABLE {} DROP COLUMN {}{}",
            self.dialect.qualify(table, schema),
            self.dialect.delimit(column),
            self.terminator()
        ));
    }

    /// Change a column in place. Computed columns cannot be altered, so a
    /// changed computation drops and re-adds the column.
    pub(super) fn alter_column(&mut self, op: &AlterColumnOperation, b: &mut CommandListBuilder) {
        let (old, new) = (&op.old_column, &op.column);
        let schema = op.schema.as_deref();
        let table = self.dialect.qualify(&op.table, schema);

        if new.is_computed() {
            if old.computed != new.computed || old.collation != new.collation {
                self.drop_column_body(schema, &op.table, &old.name, b);
                self.add_column_body(schema, &op.table, new, b);
            } else {
                self.alter_column_comment(op, b);
            }
            return;
        }

        if old.nullable && !new.nullable {
            if let Some(default) = &new.default {
                let column = self.dialect.delimit(&new.name);
                let backfill = format!(
                    "UPDATE {table} SET {column} = {} WHERE {column} IS NULL{}\n",
                    self.default_value(default, new.unicode.unwrap_or(true)),
                    self.terminator()
                );
                self.append_exec_when_idempotent(&backfill, b);
            }
        }

        let structural = column_narrows(old, new)
            || old.nullable != new.nullable
            || old.is_sparse != new.is_sparse
            || old.is_row_version != new.is_row_version
            || old.period != new.period;
        if structural {
            b.append_line(&format!(
                "ALTER TABLE {table} ALTER COLUMN {}{}",
                self.column_shape(new, false),
                self.terminator()
            ));
        }
        self.alter_column_comment(op, b);
    }

    fn alter_column_comment(&self, op: &AlterColumnOperation, b: &mut CommandListBuilder) {
        let (old, new) = (&op.old_column, &op.column);
        if old.comment == new.comment {
            return;
        }
        let schema = op.schema.as_deref();
        let mut declarations = Declarations::default();
        if old.comment.is_some() {
            self.drop_description(schema, &op.table, Some(&new.name), &mut declarations, b);
        }
        if let Some(comment) = &new.comment {
            self.add_description(schema, &op.table, Some(&new.name), comment, &mut declarations, b);
        }
    }

    pub(super) fn add_default_constraint(
        &self,
        op: &AddDefaultConstraintOperation,
        b: &mut CommandListBuilder,
    ) {
        b.append_line(&format!(
            "ALTER TABLE {} ADD DEFAULT {} FOR {}{}",
            self.dialect.qualify(&op.table, op.schema.as_deref()),
            self.default_value(&op.default, true),
            self.dialect.delimit(&op.column),
            self.terminator()
        ));
    }

    fn column_missing(&self, schema: Option<&str>, table: &str, column: &str) -> String {
        format!(
            "COL_LENGTH({}, {}) IS NULL",
            self.literal(&self.dialect.qualify(table, schema)),
            self.literal(column)
        )
    }

    fn column_exists(&self, schema: Option<&str>, table: &str, column: &str) -> String {
        format!(
            "COL_LENGTH({}, {}) IS NOT NULL",
            self.literal(&self.dialect.qualify(table, schema)),
            self.literal(column)
        )
    }

    // ========================================================================
    // Descriptions
    // ========================================================================

    fn declare_description_variables(
        &self,
        schema: Option<&str>,
        declarations: &mut Declarations,
        with_description: bool,
        b: &mut CommandListBuilder,
    ) {
        if schema.is_none() && !declarations.default_schema {
            b.append_line("DECLARE @defaultSchema AS sysname;")
                .append_line("SET @defaultSchema = SCHEMA_NAME();");
            declarations.default_schema = true;
        }
        if with_description && !declarations.description {
            b.append_line("DECLARE @description AS sql_variant;");
            declarations.description = true;
        }
    }

    fn description_target(&self, schema: Option<&str>, table: &str, column: Option<&str>) -> String {
        let schema = match schema {
            Some(schema) => self.literal(schema),
            None => "@defaultSchema".to_string(),
        };
        let mut target = format!("'SCHEMA', {schema}, 'TABLE', {}", self.literal(table));
        if let Some(column) = column {
            target.push_str(&format!(", 'COLUMN', {}", self.literal(column)));
        }
        target
    }

    pub(super) fn add_description(
        &self,
        schema: Option<&str>,
        table: &str,
        column: Option<&str>,
        description: &str,
        declarations: &mut Declarations,
        b: &mut CommandListBuilder,
    ) {
        self.declare_description_variables(schema, declarations, true, b);
        b.append_line(&format!(
            "SET @description = {}{}",
            self.literal(description),
            self.terminator()
        ))
        .append_line(&format!(
            "EXEC sp_addextendedproperty 'MS_Description', @description, {}{}",
            self.description_target(schema, table, column),
            self.terminator()
        ));
    }

    pub(super) fn drop_description(
        &self,
        schema: Option<&str>,
        table: &str,
        column: Option<&str>,
        declarations: &mut Declarations,
        b: &mut CommandListBuilder,
    ) {
        self.declare_description_variables(schema, declarations, false, b);
        b.append_line(&format!(
            "EXEC sp_dropextendedproperty 'MS_Description', {}{}",
            self.description_target(schema, table, column),
            self.terminator()
        ));
    }
}

fn clustering(clustered: Option<bool>) -> &'static str {
    match clustered {
        Some(true) => "CLUSTERED ",
        Some(false) => "NONCLUSTERED ",
        None => "",
    }
}
