//! Statements against the migration history table

use super::dialect::Dialect;
use super::HistoryTable;

/// Renders reads and writes of the table that records applied migrations.
pub struct HistoryRepository<'a> {
    dialect: &'a dyn Dialect,
    table: &'a HistoryTable,
}

impl<'a> HistoryRepository<'a> {
    pub fn new(dialect: &'a dyn Dialect, table: &'a HistoryTable) -> Self {
        Self { dialect, table }
    }

    fn qualified(&self) -> String {
        self.dialect.qualify(&self.table.name, self.table.schema.as_deref())
    }

    fn literal(&self, text: &str) -> String {
        self.dialect.string_literal(text)
    }

    /// Creates the schema (when configured) and the table if missing
    pub fn create_if_not_exists_script(&self) -> String {
        let mut script = String::new();
        if let Some(schema) = &self.table.schema {
            script.push_str(&format!(
                "IF SCHEMA_ID({}) IS NULL EXEC({});\n",
                self.literal(schema),
                self.literal(&format!("CREATE SCHEMA {};", self.dialect.delimit(schema)))
            ));
        }
        let table = self.qualified();
        script.push_str(&format!("IF OBJECT_ID({}) IS NULL\n", self.literal(&table)));
        script.push_str("BEGIN\n");
        script.push_str(&format!("    CREATE TABLE {table} (\n"));
        script.push_str("        [MigrationId] nvarchar(150) NOT NULL,\n");
        script.push_str("        [ProductVersion] nvarchar(32) NOT NULL,\n");
        script.push_str(&format!(
            "        CONSTRAINT {} PRIMARY KEY ([MigrationId])\n",
            self.dialect.delimit(&format!("PK_{}", self.table.name))
        ));
        script.push_str("    );\n");
        script.push_str("END;\n");
        script
    }

    pub fn insert_script(&self, migration_id: &str, product_version: &str) -> String {
        format!(
            "INSERT INTO {} ([MigrationId], [ProductVersion])\nVALUES ({}, {});\n",
            self.qualified(),
            self.literal(migration_id),
            self.literal(product_version)
        )
    }

    pub fn delete_script(&self, migration_id: &str) -> String {
        format!(
            "DELETE FROM {}\nWHERE [MigrationId] = {};\n",
            self.qualified(),
            self.literal(migration_id)
        )
    }

    /// Opens a block that runs only while the migration is unapplied
    pub fn begin_if_not_exists(&self, migration_id: &str) -> String {
        format!("IF NOT EXISTS (\n{}\n)\nBEGIN\n", self.exists_query(migration_id))
    }

    /// Opens a block that runs only once the migration is applied
    pub fn begin_if_exists(&self, migration_id: &str) -> String {
        format!("IF EXISTS (\n{}\n)\nBEGIN\n", self.exists_query(migration_id))
    }

    pub fn end_block(&self) -> String {
        "END;\n".to_string()
    }

    fn exists_query(&self, migration_id: &str) -> String {
        format!(
            "    SELECT * FROM {}\n    WHERE [MigrationId] = {}",
            self.qualified(),
            self.literal(migration_id)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::SqlServerDialect;

    #[test]
    fn test_create_script() {
        let table = HistoryTable::default();
        let repository = HistoryRepository::new(&SqlServerDialect, &table);
        assert_eq!(
            repository.create_if_not_exists_script(),
            "IF OBJECT_ID(N'[__EFMigrationsHistory]') IS NULL\n\
             BEGIN\n    \
             CREATE TABLE [__EFMigrationsHistory] (\n        \
             [MigrationId] nvarchar(150) NOT NULL,\n        \
             [ProductVersion] nvarchar(32) NOT NULL,\n        \
             CONSTRAINT [PK___EFMigrationsHistory] PRIMARY KEY ([MigrationId])\n    \
             );\n\
             END;\n"
        );
    }

    #[test]
    fn test_create_script_with_schema() {
        let table = HistoryTable {
            name: "Migrations".to_string(),
            schema: Some("ops".to_string()),
        };
        let script = HistoryRepository::new(&SqlServerDialect, &table).create_if_not_exists_script();
        assert!(script.starts_with("IF SCHEMA_ID(N'ops') IS NULL EXEC(N'CREATE SCHEMA [ops];');\n"));
        assert!(script.contains("IF OBJECT_ID(N'[ops].[Migrations]') IS NULL"));
    }

    #[test]
    fn test_insert_and_delete() {
        let table = HistoryTable::default();
        let repository = HistoryRepository::new(&SqlServerDialect, &table);
        assert_eq!(
            repository.insert_script("20240101000000_Initial", "1.0.0"),
            "INSERT INTO [__EFMigrationsHistory] ([MigrationId], [ProductVersion])\n\
             VALUES (N'20240101000000_Initial', N'1.0.0');\n"
        );
        assert_eq!(
            repository.delete_script("20240101000000_Initial"),
            "DELETE FROM [__EFMigrationsHistory]\nWHERE [MigrationId] = N'20240101000000_Initial';\n"
        );
    }

    #[test]
    fn test_guards() {
        let table = HistoryTable::default();
        let repository = HistoryRepository::new(&SqlServerDialect, &table);
        assert_eq!(
            repository.begin_if_not_exists("m1"),
            "IF NOT EXISTS (\n    SELECT * FROM [__EFMigrationsHistory]\n    WHERE [MigrationId] = N'm1'\n)\nBEGIN\n"
        );
        assert!(repository.begin_if_exists("m1").starts_with("IF EXISTS (\n"));
    }
}
