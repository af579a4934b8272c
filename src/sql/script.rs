//! Assembles generated commands of several migrations into one script

use tracing::debug;

use super::builder::indent_lines;
use super::dialect::Dialect;
use super::history::HistoryRepository;
use super::{CommandBatch, GenerateOptions};

/// Whether a script applies migrations or reverts them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptDirection {
    Up,
    Down,
}

/// Generated commands of one migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationCommands {
    pub id: String,
    pub commands: Vec<CommandBatch>,
}

/// Builds a deployable script: transactions around each migration, a batch
/// separator after every command, and history bookkeeping.
pub struct ScriptGenerator<'a> {
    dialect: &'a dyn Dialect,
    options: &'a GenerateOptions,
}

impl<'a> ScriptGenerator<'a> {
    pub fn new(dialect: &'a dyn Dialect, options: &'a GenerateOptions) -> Self {
        Self { dialect, options }
    }

    /// Render `migrations` in the given order. Down scripts expect the
    /// migrations already reversed.
    pub fn generate(&self, migrations: &[MigrationCommands], direction: ScriptDirection) -> String {
        let history = HistoryRepository::new(self.dialect, &self.options.history_table);
        let mut script = String::new();

        if direction == ScriptDirection::Up {
            self.push_command(&mut script, &history.create_if_not_exists_script());
        }

        for migration in migrations {
            debug!(
                migration = %migration.id,
                commands = migration.commands.len(),
                "scripting migration"
            );
            let bookkeeping = CommandBatch {
                sql: match direction {
                    ScriptDirection::Up => {
                        history.insert_script(&migration.id, &self.options.product_version)
                    }
                    ScriptDirection::Down => history.delete_script(&migration.id),
                },
                suppress_transaction: false,
            };

            let mut in_transaction = false;
            for command in migration.commands.iter().chain(std::iter::once(&bookkeeping)) {
                if command.suppress_transaction && in_transaction {
                    self.push_command(&mut script, "COMMIT;\n");
                    in_transaction = false;
                }
                if !command.suppress_transaction && !in_transaction {
                    self.push_command(&mut script, "BEGIN TRANSACTION;\n");
                    in_transaction = true;
                }
                let sql = if self.options.idempotent {
                    self.guard(&history, &migration.id, direction, &command.sql)
                } else {
                    command.sql.clone()
                };
                self.push_command(&mut script, &sql);
            }
            if in_transaction {
                self.push_command(&mut script, "COMMIT;\n");
            }
        }
        script
    }

    fn guard(
        &self,
        history: &HistoryRepository<'_>,
        migration_id: &str,
        direction: ScriptDirection,
        sql: &str,
    ) -> String {
        let begin = match direction {
            ScriptDirection::Up => history.begin_if_not_exists(migration_id),
            ScriptDirection::Down => history.begin_if_exists(migration_id),
        };
        format!("{begin}{}\n{}", indent_lines(sql), history.end_block())
    }

    /// Append a command and its separator; separators never repeat
    fn push_command(&self, script: &mut String, sql: &str) {
        if sql.trim().is_empty() {
            return;
        }
        script.push_str(sql);
        if !sql.ends_with('\n') {
            script.push('\n');
        }
        let separator = format!("{}\n\n", self.dialect.batch_separator());
        if !script.ends_with(&separator) {
            script.push_str(&separator);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::SqlServerDialect;
    use pretty_assertions::assert_eq;

    fn options(idempotent: bool) -> GenerateOptions {
        GenerateOptions {
            idempotent,
            product_version: "1.0.0".to_string(),
            ..Default::default()
        }
    }

    fn command(sql: &str, suppress_transaction: bool) -> CommandBatch {
        CommandBatch {
            sql: sql.to_string(),
            suppress_transaction,
        }
    }

    #[test]
    fn test_up_script() {
        let options = options(false);
        let generator = ScriptGenerator::new(&SqlServerDialect, &options);
        let script = generator.generate(
            &[MigrationCommands {
                id: "20240101000000_Initial".to_string(),
                commands: vec![command("CREATE TABLE [People] ([Id] int NOT NULL);\n", false)],
            }],
            ScriptDirection::Up,
        );
        let expected = "IF OBJECT_ID(N'[__EFMigrationsHistory]') IS NULL\n\
                        BEGIN\n    \
                        CREATE TABLE [__EFMigrationsHistory] (\n        \
                        [MigrationId] nvarchar(150) NOT NULL,\n        \
                        [ProductVersion] nvarchar(32) NOT NULL,\n        \
                        CONSTRAINT [PK___EFMigrationsHistory] PRIMARY KEY ([MigrationId])\n    \
                        );\n\
                        END;\n\
                        GO\n\n\
                        BEGIN TRANSACTION;\n\
                        GO\n\n\
                        CREATE TABLE [People] ([Id] int NOT NULL);\n\
                        GO\n\n\
                        INSERT INTO [__EFMigrationsHistory] ([MigrationId], [ProductVersion])\n\
                        VALUES (N'20240101000000_Initial', N'1.0.0');\n\
                        GO\n\n\
                        COMMIT;\n\
                        GO\n\n";
        assert_eq!(script, expected);
    }

    #[test]
    fn test_non_transactional_command_splits_transaction() {
        let options = options(false);
        let generator = ScriptGenerator::new(&SqlServerDialect, &options);
        let script = generator.generate(
            &[MigrationCommands {
                id: "m1".to_string(),
                commands: vec![
                    command("SELECT 1;\n", false),
                    command("CREATE INDEX [IX] ON [T] ([C]) WITH (ONLINE = ON);\n", true),
                    command("SELECT 2;\n", false),
                ],
            }],
            ScriptDirection::Down,
        );
        let expected = "BEGIN TRANSACTION;\nGO\n\n\
                        SELECT 1;\nGO\n\n\
                        COMMIT;\nGO\n\n\
                        CREATE INDEX [IX] ON [T] ([C]) WITH (ONLINE = ON);\nGO\n\n\
                        BEGIN TRANSACTION;\nGO\n\n\
                        SELECT 2;\nGO\n\n\
                        DELETE FROM [__EFMigrationsHistory]\nWHERE [MigrationId] = N'm1';\nGO\n\n\
                        COMMIT;\nGO\n\n";
        assert_eq!(script, expected);
    }

    #[test]
    fn test_idempotent_commands_guarded_by_history() {
        let options = options(true);
        let generator = ScriptGenerator::new(&SqlServerDialect, &options);
        let script = generator.generate(
            &[MigrationCommands {
                id: "m1".to_string(),
                commands: vec![command("SELECT 1;\n", false)],
            }],
            ScriptDirection::Up,
        );
        assert!(script.contains(
            "IF NOT EXISTS (\n    SELECT * FROM [__EFMigrationsHistory]\n    WHERE [MigrationId] = N'm1'\n)\nBEGIN\n    SELECT 1;\nEND;\nGO\n\n"
        ));
        assert_eq!(script.matches("IF NOT EXISTS (").count(), 2);
        assert!(!script.contains("GO\n\nGO\n\n"));
    }
}
