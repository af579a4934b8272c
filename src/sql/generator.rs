//! Operation dispatch and shared statement fragments

use tracing::trace;

use super::builder::{indent_lines, CommandListBuilder};
use super::dialect::Dialect;
use super::separator::split_batches;
use super::{CommandBatch, GenerateOptions};
use crate::error::MigrationError;
use crate::operations::{
    AlterDatabaseOperation, CreateDatabaseOperation, DropDatabaseOperation, DropSchemaOperation,
    EnsureSchemaOperation, Operation, SqlOperation,
};
use crate::schedule::Batch;

/// Schema every principal owns; never created or dropped
const DBO_SCHEMA: &str = "dbo";

/// Renders operations into commands for one dialect.
///
/// A generator numbers the T-SQL variables it declares, so one instance
/// should render one whole migration.
pub struct SqlGenerator<'a> {
    pub(super) dialect: &'a dyn Dialect,
    pub(super) options: &'a GenerateOptions,
    variable_counter: usize,
}

impl<'a> SqlGenerator<'a> {
    pub fn new(dialect: &'a dyn Dialect, options: &'a GenerateOptions) -> Self {
        Self {
            dialect,
            options,
            variable_counter: 0,
        }
    }

    /// Render every operation of every batch, in order
    pub fn generate(&mut self, batches: &[Batch]) -> Result<Vec<CommandBatch>, MigrationError> {
        let mut builder = CommandListBuilder::new();
        for batch in batches {
            for operation in &batch.operations {
                trace!(kind = operation.kind(), "generating SQL");
                let suppress = !batch.transactional || operation.suppresses_transaction();
                self.operation(operation, &mut builder, suppress)?;
            }
        }
        Ok(builder.into_commands())
    }

    fn operation(
        &mut self,
        operation: &Operation,
        b: &mut CommandListBuilder,
        suppress: bool,
    ) -> Result<(), MigrationError> {
        match operation {
            Operation::EnsureSchema(op) => self.ensure_schema(op, b),
            Operation::DropSchema(op) => self.drop_schema(op, b),
            Operation::CreateTable(op) => self.create_table(op, b),
            Operation::DropTable(op) => self.drop_table(op, b),
            Operation::RenameTable(op) => {
                let old = self.dialect.qualify(&op.name, op.schema.as_deref());
                self.rename(&old, &op.new_name, None, b);
            }
            Operation::MoveTable(op) => {
                self.transfer(op.new_schema.as_deref(), op.schema.as_deref(), &op.name, b)
            }
            Operation::AlterTable(op) => self.alter_table(op, b),
            Operation::AddColumn(op) => self.add_column(op, b),
            Operation::DropColumn(op) => self.drop_column(op, b),
            Operation::AlterColumn(op) => self.alter_column(op, b),
            Operation::RenameColumn(op) => {
                let old = format!(
                    "{}.{}",
                    self.dialect.qualify(&op.table, op.schema.as_deref()),
                    self.dialect.delimit(&op.name)
                );
                self.rename(&old, &op.new_name, Some("COLUMN"), b);
            }
            Operation::AddDefaultConstraint(op) => self.add_default_constraint(op, b),
            Operation::DropDefaultConstraint(op) => {
                self.drop_default_constraint(op.schema.as_deref(), &op.table, &op.column, b)
            }
            Operation::CreateIndex(op) => self.create_index(op, b)?,
            Operation::DropIndex(op) => self.drop_index(op, b)?,
            Operation::RenameIndex(op) => self.rename_index(op, b)?,
            Operation::AddPrimaryKey(op) => self.add_primary_key(op, b),
            Operation::AddUniqueConstraint(op) => self.add_unique_constraint(op, b),
            Operation::AddForeignKey(op) => self.add_foreign_key(op, b),
            Operation::AddCheckConstraint(op) => self.add_check_constraint(op, b),
            Operation::DropPrimaryKey(op)
            | Operation::DropUniqueConstraint(op)
            | Operation::DropForeignKey(op)
            | Operation::DropCheckConstraint(op) => self.drop_constraint(op, b),
            Operation::CreateSequence(op) => self.create_sequence(op, b),
            Operation::AlterSequence(op) => self.alter_sequence(op, b),
            Operation::DropSequence(op) => self.drop_sequence(op, b),
            Operation::RenameSequence(op) => {
                let old = self.dialect.qualify(&op.name, op.schema.as_deref());
                self.rename(&old, &op.new_name, None, b);
            }
            Operation::MoveSequence(op) => {
                self.transfer(op.new_schema.as_deref(), op.schema.as_deref(), &op.name, b)
            }
            Operation::RestartSequence(op) => self.restart_sequence(op, b),
            Operation::InsertData(op) => self.insert_data(op, b),
            Operation::UpdateData(op) => self.update_data(op, b),
            Operation::DeleteData(op) => self.delete_data(op, b),
            Operation::DisableSystemVersioning(op) => self.disable_versioning(op, b),
            Operation::EnableSystemVersioning(op) => self.enable_versioning(op, b),
            Operation::AddPeriod(op) => self.add_period(op, b),
            Operation::DropPeriod(op) => self.drop_period(op, b),
            Operation::CreateDatabase(op) => self.create_database(op, b),
            Operation::DropDatabase(op) => self.drop_database(op, b),
            Operation::AlterDatabase(op) => self.alter_database(op, b),
            Operation::Sql(op) => self.sql(op, b, suppress),
        }
        b.end_command(suppress);
        Ok(())
    }

    // ========================================================================
    // Shared fragments
    // ========================================================================

    pub(super) fn terminator(&self) -> &'static str {
        self.dialect.statement_terminator()
    }

    pub(super) fn literal(&self, text: &str) -> String {
        self.dialect.string_literal(text)
    }

    pub(super) fn next_variable(&mut self) -> String {
        let variable = format!("@var{}", self.variable_counter);
        self.variable_counter += 1;
        variable
    }

    /// `EXEC sp_rename` for tables, columns, indexes and sequences
    pub(super) fn rename(
        &self,
        name: &str,
        new_name: &str,
        kind: Option<&str>,
        b: &mut CommandListBuilder,
    ) {
        b.append("EXEC sp_rename ")
            .append(&self.literal(name))
            .append(", ")
            .append(&self.literal(new_name));
        if let Some(kind) = kind {
            b.append(", ").append(&self.literal(kind));
        }
        b.append_line(self.terminator());
    }

    /// Move an object between schemas; `None` targets the caller's default
    /// schema, which is only known at run time.
    pub(super) fn transfer(
        &self,
        new_schema: Option<&str>,
        schema: Option<&str>,
        name: &str,
        b: &mut CommandListBuilder,
    ) {
        let object = self.dialect.qualify(name, schema);
        match new_schema {
            Some(new_schema) => {
                b.append("ALTER SCHEMA ")
                    .append(&self.dialect.delimit(new_schema))
                    .append(" TRANSFER ")
                    .append(&object)
                    .append_line(self.terminator());
            }
            None => {
                b.append_line("DECLARE @defaultSchema sysname = SCHEMA_NAME();")
                    .append("EXEC(N'ALTER SCHEMA [' + @defaultSchema + ")
                    .append(&self.literal(&format!("] TRANSFER {object};")))
                    .append_line(");");
            }
        }
    }

    /// Drop whatever default constraint is bound to a column, looked up by
    /// name at run time
    pub(super) fn drop_default_constraint(
        &mut self,
        schema: Option<&str>,
        table: &str,
        column: &str,
        b: &mut CommandListBuilder,
    ) {
        let variable = self.next_variable();
        let table = self.dialect.qualify(table, schema);
        b.append_line(&format!("DECLARE {variable} sysname;"))
            .append_line(&format!("SELECT {variable} = [d].[name]"))
            .append_line("FROM [sys].[default_constraints] [d]")
            .append_line(
                "INNER JOIN [sys].[columns] [c] ON [d].[parent_column_id] = [c].[column_id] AND [d].[parent_object_id] = [c].[object_id]",
            )
            .append_line(&format!(
                "WHERE ([d].[parent_object_id] = OBJECT_ID({}) AND [c].[name] = {});",
                self.literal(&table),
                self.literal(column)
            ))
            .append_line(&format!(
                "IF {variable} IS NOT NULL EXEC({} + {variable} + '];');",
                self.literal(&format!("ALTER TABLE {table} DROP CONSTRAINT ["))
            ));
    }

    /// `EXEC(N'...')` around a statement that must be compiled late
    pub(super) fn append_exec(&self, sql: &str, b: &mut CommandListBuilder) {
        let body = sql.trim_end_matches(['\n', '\r', ';']).replace('\'', "''");
        b.append("EXEC(N'")
            .append(&body)
            .append("')")
            .append_line(self.terminator());
    }

    /// Append `sql`, wrapped in `EXEC` when generating idempotent scripts
    pub(super) fn append_exec_when_idempotent(&self, sql: &str, b: &mut CommandListBuilder) {
        if self.options.idempotent {
            self.append_exec(sql, b);
        } else {
            b.append(sql);
        }
    }

    /// Append `sql`, guarded by `condition` when generating idempotent scripts
    pub(super) fn append_guarded(&self, condition: &str, sql: &str, b: &mut CommandListBuilder) {
        if !self.options.idempotent {
            b.append(sql);
            return;
        }
        b.append_line(&format!("IF {condition}"))
            .append_line("BEGIN")
            .append_line(&indent_lines(sql))
            .append_line("END;");
    }

    pub(super) fn object_missing(&self, name: &str, schema: Option<&str>) -> String {
        format!(
            "OBJECT_ID({}) IS NULL",
            self.literal(&self.dialect.qualify(name, schema))
        )
    }

    pub(super) fn object_exists(&self, name: &str, schema: Option<&str>) -> String {
        format!(
            "OBJECT_ID({}) IS NOT NULL",
            self.literal(&self.dialect.qualify(name, schema))
        )
    }

    // ========================================================================
    // Schemas and databases
    // ========================================================================

    fn ensure_schema(&self, op: &EnsureSchemaOperation, b: &mut CommandListBuilder) {
        if op.name.eq_ignore_ascii_case(DBO_SCHEMA) {
            return;
        }
        let create = format!(
            "CREATE SCHEMA {}{}",
            self.dialect.delimit(&op.name),
            self.terminator()
        );
        b.append("IF SCHEMA_ID(")
            .append(&self.literal(&op.name))
            .append(") IS NULL EXEC(")
            .append(&self.literal(&create))
            .append(")")
            .append_line(self.terminator());
    }

    fn drop_schema(&self, op: &DropSchemaOperation, b: &mut CommandListBuilder) {
        if op.name.eq_ignore_ascii_case(DBO_SCHEMA) {
            return;
        }
        let drop = format!("DROP SCHEMA {}{}", self.dialect.delimit(&op.name), self.terminator());
        if self.options.idempotent {
            b.append("IF SCHEMA_ID(")
                .append(&self.literal(&op.name))
                .append(") IS NOT NULL EXEC(")
                .append(&self.literal(&drop))
                .append(")")
                .append_line(self.terminator());
        } else {
            b.append_line(&drop);
        }
    }

    fn create_database(&self, op: &CreateDatabaseOperation, b: &mut CommandListBuilder) {
        let name = self.dialect.delimit(&op.name);
        b.append("CREATE DATABASE ").append(&name);
        if let Some(file_name) = op.file_name.as_deref().filter(|f| !f.is_empty()) {
            let stem = file_name
                .rsplit_once('.')
                .map(|(stem, _)| stem)
                .unwrap_or(file_name);
            let logical = stem.rsplit(['/', '\\']).next().unwrap_or(stem);
            b.append_line("")
                .append(&format!(
                    "ON (NAME = {}, FILENAME = {})",
                    self.literal(logical),
                    self.literal(file_name)
                ))
                .append_line("")
                .append(&format!(
                    "LOG ON (NAME = {}, FILENAME = {})",
                    self.literal(&format!("{logical}_log")),
                    self.literal(&format!("{stem}_log.ldf"))
                ));
        }
        if let Some(collation) = &op.collation {
            b.append_line("").append("COLLATE ").append(collation);
        }
        b.append_line(self.terminator()).end_command(true);

        b.append_line("IF SERVERPROPERTY('EngineEdition') <> 5")
            .append_line("BEGIN")
            .increment_indent()
            .append_line(&format!(
                "ALTER DATABASE {name} SET READ_COMMITTED_SNAPSHOT ON{}",
                self.terminator()
            ))
            .decrement_indent()
            .append_line("END;")
            .end_command(true);
    }

    fn drop_database(&self, op: &DropDatabaseOperation, b: &mut CommandListBuilder) {
        let name = self.dialect.delimit(&op.name);
        b.append_line("IF SERVERPROPERTY('EngineEdition') <> 5")
            .append_line("BEGIN")
            .increment_indent()
            .append_line(&format!(
                "ALTER DATABASE {name} SET SINGLE_USER WITH ROLLBACK IMMEDIATE{}",
                self.terminator()
            ))
            .decrement_indent()
            .append_line("END;")
            .end_command(true);
        b.append_line(&format!("DROP DATABASE {name}{}", self.terminator()))
            .end_command(true);
    }

    fn alter_database(&self, op: &AlterDatabaseOperation, b: &mut CommandListBuilder) {
        if op.collation != op.old_collation {
            if let Some(collation) = &op.collation {
                b.append_line("BEGIN")
                    .append_line("DECLARE @db_name nvarchar(max) = DB_NAME();")
                    .append_line(&format!(
                        "EXEC(N'ALTER DATABASE [' + @db_name + '] COLLATE {collation};');"
                    ))
                    .append_line("END;")
                    .append_line("");
            }
        }
        if !op.memory_optimized {
            return;
        }
        b.append_line(
            "IF SERVERPROPERTY('IsXTPSupported') = 1 AND SERVERPROPERTY('EngineEdition') <> 5",
        )
        .append_line("BEGIN")
        .increment_indent()
        .append_line("IF NOT EXISTS (")
        .append_line(
            "    SELECT 1 FROM [sys].[filegroups] [FG] JOIN [sys].[database_files] [F] ON [FG].[data_space_id] = [F].[data_space_id] WHERE [FG].[type] = N'FX' AND [F].[type] = 2)",
        )
        .append_line("BEGIN")
        .increment_indent()
        .append_line("ALTER DATABASE CURRENT SET AUTO_CLOSE OFF;")
        .append_line("DECLARE @db_name nvarchar(max) = DB_NAME();")
        .append_line("DECLARE @fg_name nvarchar(max);")
        .append_line("SELECT TOP(1) @fg_name = [name] FROM [sys].[filegroups] WHERE [type] = N'FX';")
        .append_line("IF @fg_name IS NULL")
        .append_line("BEGIN")
        .append_line("    SET @fg_name = @db_name + N'_MODFG';")
        .append_line(
            "    EXEC(N'ALTER DATABASE CURRENT ADD FILEGROUP [' + @fg_name + '] CONTAINS MEMORY_OPTIMIZED_DATA;');",
        )
        .append_line("END;")
        .append_line(
            "DECLARE @new_path nvarchar(max) = REPLACE(CAST(SERVERPROPERTY('InstanceDefaultDataPath') AS nvarchar(max)), '''', '''''') + @db_name + N'_MOD';",
        )
        .append_line(
            "EXEC(N'ALTER DATABASE CURRENT ADD FILE (NAME=''' + @db_name + N'_MOD'', filename=''' + @new_path + ''') TO FILEGROUP [' + @fg_name + '];');",
        )
        .decrement_indent()
        .append_line("END;")
        .decrement_indent()
        .append_line("END;")
        .append_line("")
        .append_line("IF SERVERPROPERTY('IsXTPSupported') = 1")
        .append_line("EXEC(N'ALTER DATABASE CURRENT SET MEMORY_OPTIMIZED_ELEVATE_TO_SNAPSHOT ON;');");
    }

    // ========================================================================
    // Raw SQL
    // ========================================================================

    /// Each separator-delimited batch becomes its own command
    fn sql(&self, op: &SqlOperation, b: &mut CommandListBuilder, suppress: bool) {
        for batch in split_batches(&op.sql) {
            for _ in 0..batch.count {
                b.append(&batch.sql);
                if !batch.sql.ends_with('\n') {
                    b.append_line("");
                }
                b.end_command(suppress || op.suppress_transaction);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::MoveTableOperation;
    use crate::sql::{generate_operations, SqlServerDialect};

    fn render(operation: Operation) -> Vec<CommandBatch> {
        generate_operations(&[operation], &GenerateOptions::default()).unwrap()
    }

    #[test]
    fn test_ensure_schema() {
        let commands = render(Operation::EnsureSchema(EnsureSchemaOperation {
            name: "sales".to_string(),
        }));
        assert_eq!(
            commands[0].sql,
            "IF SCHEMA_ID(N'sales') IS NULL EXEC(N'CREATE SCHEMA [sales];');\n"
        );
    }

    #[test]
    fn test_ensure_dbo_is_skipped() {
        let commands = render(Operation::EnsureSchema(EnsureSchemaOperation {
            name: "DBO".to_string(),
        }));
        assert!(commands.is_empty());
    }

    #[test]
    fn test_transfer_to_default_schema() {
        let commands = render(Operation::MoveTable(MoveTableOperation {
            schema: Some("archive".to_string()),
            name: "Orders".to_string(),
            new_schema: None,
        }));
        assert_eq!(
            commands[0].sql,
            "DECLARE @defaultSchema sysname = SCHEMA_NAME();\n\
             EXEC(N'ALTER SCHEMA [' + @defaultSchema + N'] TRANSFER [archive].[Orders];');\n"
        );
    }

    #[test]
    fn test_drop_database_is_two_isolated_commands() {
        let commands = render(Operation::DropDatabase(DropDatabaseOperation {
            name: "Blogging".to_string(),
        }));
        assert_eq!(commands.len(), 2);
        assert!(commands.iter().all(|c| c.suppress_transaction));
        assert_eq!(commands[1].sql, "DROP DATABASE [Blogging];\n");
    }

    #[test]
    fn test_sql_split_and_repeated() {
        let commands = render(Operation::Sql(SqlOperation {
            sql: "SELECT 1\nGO 2\nSELECT 2".to_string(),
            suppress_transaction: false,
        }));
        let texts: Vec<&str> = commands.iter().map(|c| c.sql.as_str()).collect();
        assert_eq!(texts, vec!["SELECT 1\n", "SELECT 1\n", "SELECT 2\n"]);
    }

    #[test]
    fn test_variables_numbered_across_generation() {
        let options = GenerateOptions::default();
        let mut generator = SqlGenerator::new(&SqlServerDialect, &options);
        let mut builder = CommandListBuilder::new();
        generator.drop_default_constraint(None, "People", "Name", &mut builder);
        generator.drop_default_constraint(None, "People", "Age", &mut builder);
        let sql = builder.take_pending();
        assert!(sql.contains("DECLARE @var0 sysname;"));
        assert!(sql.contains("DECLARE @var1 sysname;"));
        assert!(sql.contains(
            "IF @var1 IS NOT NULL EXEC(N'ALTER TABLE [People] DROP CONSTRAINT [' + @var1 + '];');"
        ));
    }
}
