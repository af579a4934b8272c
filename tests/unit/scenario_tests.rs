//! End-to-end behavior of diff, schedule and generate on small models

use pretty_assertions::assert_eq;
use rust_sqlmigrate::model::{LogicalType, ModelBuilder, SqlValue};
use rust_sqlmigrate::operations::{Operation, SqlOperation};
use rust_sqlmigrate::sql::{generate, generate_operations};
use rust_sqlmigrate::{diff, migration_commands, schedule, GenerateOptions, SchemaModel};

fn people(configure_name: impl FnOnce(&mut rust_sqlmigrate::model::TableBuilder)) -> SchemaModel {
    ModelBuilder::new()
        .table("People", |t| {
            t.column("Id", LogicalType::Int32);
            configure_name(t);
            t.primary_key("PK_People", &["Id"]);
        })
        .build()
        .unwrap()
}

fn sql_of(source: &SchemaModel, target: &SchemaModel, options: &GenerateOptions) -> Vec<String> {
    migration_commands(source, target, options)
        .unwrap()
        .into_iter()
        .map(|c| c.sql)
        .collect()
}

// ============================================================================
// Creating a table
// ============================================================================

#[test]
fn test_create_table_with_inline_primary_key() {
    let target = people(|t| {
        t.column("Name", LogicalType::String).nullable();
    });

    let operations = diff::diff(&SchemaModel::new(), &target).unwrap();
    assert_eq!(operations.len(), 1);
    assert!(matches!(operations[0], Operation::CreateTable(_)));

    let sql = sql_of(&SchemaModel::new(), &target, &GenerateOptions::default());
    assert_eq!(
        sql,
        vec!["CREATE TABLE [People] (\n    \
              [Id] int NOT NULL,\n    \
              [Name] nvarchar(max) NULL,\n    \
              CONSTRAINT [PK_People] PRIMARY KEY ([Id])\n\
              );\n"
            .to_string()]
    );
    assert!(!sql[0].contains("ADD CONSTRAINT"));
}

// ============================================================================
// Renaming a column
// ============================================================================

#[test]
fn test_renamed_column_is_a_single_rename() {
    let source = people(|t| {
        t.column("Foo", LogicalType::Int32);
    });
    let target = people(|t| {
        t.column("Bar", LogicalType::Int32).id("Foo");
    });

    let operations = diff::diff(&source, &target).unwrap();
    assert_eq!(operations.len(), 1);
    assert!(matches!(&operations[0], Operation::RenameColumn(op) if op.name == "Foo" && op.new_name == "Bar"));

    let sql = sql_of(&source, &target, &GenerateOptions::default());
    assert_eq!(sql, vec!["EXEC sp_rename N'[People].[Foo]', N'Bar', N'COLUMN';\n".to_string()]);
}

// ============================================================================
// Making a column required
// ============================================================================

#[test]
fn test_required_string_column_gets_empty_default() {
    let source = people(|t| {
        t.column("Name", LogicalType::String).nullable();
    });
    let target = people(|t| {
        t.column("Name", LogicalType::String);
    });

    let kinds: Vec<&str> = schedule::order(diff::diff(&source, &target).unwrap())
        .unwrap()
        .iter()
        .map(Operation::kind)
        .collect();
    assert_eq!(kinds, vec!["AlterColumn", "AddDefaultConstraint"]);

    let sql = sql_of(&source, &target, &GenerateOptions::default());
    assert_eq!(
        sql,
        vec![
            "UPDATE [People] SET [Name] = N'' WHERE [Name] IS NULL;\n\
             ALTER TABLE [People] ALTER COLUMN [Name] nvarchar(max) NOT NULL;\n"
                .to_string(),
            "ALTER TABLE [People] ADD DEFAULT N'' FOR [Name];\n".to_string(),
        ]
    );
}

#[test]
fn test_required_indexed_column_rebuilds_index_around_alter() {
    let source = people(|t| {
        t.column("Name", LogicalType::String).nullable();
        t.index("IX_People_Name", &["Name"]);
    });
    let target = people(|t| {
        t.column("Name", LogicalType::String);
        t.index("IX_People_Name", &["Name"]);
    });

    let kinds: Vec<&str> = schedule::order(diff::diff(&source, &target).unwrap())
        .unwrap()
        .iter()
        .map(Operation::kind)
        .collect();
    assert_eq!(
        kinds,
        vec!["DropIndex", "AlterColumn", "AddDefaultConstraint", "CreateIndex"]
    );
}

#[test]
fn test_existing_default_is_dropped_and_rebound() {
    let source = people(|t| {
        t.column("Name", LogicalType::String)
            .nullable()
            .default_value("anonymous");
    });
    let target = people(|t| {
        t.column("Name", LogicalType::String).default_value("anonymous");
    });

    let kinds: Vec<&str> = schedule::order(diff::diff(&source, &target).unwrap())
        .unwrap()
        .iter()
        .map(Operation::kind)
        .collect();
    assert_eq!(
        kinds,
        vec!["DropDefaultConstraint", "AlterColumn", "AddDefaultConstraint"]
    );
}

// ============================================================================
// Raw SQL batches
// ============================================================================

#[test]
fn test_separator_inside_literal_does_not_split() {
    let operation = Operation::Sql(SqlOperation {
        sql: "INSERT INTO [Notes] ([Text]) VALUES (N'first line\nGO\nlast line');\nGO\nSELECT 1;\n"
            .to_string(),
        suppress_transaction: false,
    });

    let commands = generate_operations(&[operation], &GenerateOptions::default()).unwrap();
    assert_eq!(commands.len(), 2);
    assert!(commands[0].sql.contains("first line\nGO\nlast line"));
    assert_eq!(commands[1].sql, "SELECT 1;\n");
}

// ============================================================================
// Idempotent generation
// ============================================================================

#[test]
fn test_idempotent_create_table_is_guarded() {
    let target = people(|_| {});
    let batches = schedule::schedule(diff::diff(&SchemaModel::new(), &target).unwrap()).unwrap();

    let guarded = generate(
        &batches,
        &GenerateOptions {
            idempotent: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(guarded[0]
        .sql
        .starts_with("IF OBJECT_ID(N'[People]') IS NULL\nBEGIN\n    CREATE TABLE [People] ("));
    assert!(guarded[0].sql.ends_with("END;\n"));

    let bare = generate(&batches, &GenerateOptions::default()).unwrap();
    assert!(bare[0].sql.starts_with("CREATE TABLE [People] ("));
    assert!(!bare[0].sql.contains("OBJECT_ID"));
}

#[test]
fn test_seed_rows_respect_batch_size() {
    let target = ModelBuilder::new()
        .table("Tags", |t| {
            t.column("Id", LogicalType::Int32);
            t.primary_key("PK_Tags", &["Id"]);
            for id in 1..=100 {
                t.seed(&[("Id", SqlValue::Int(id))]);
            }
        })
        .build()
        .unwrap();

    let options = GenerateOptions {
        max_batch_size: 42,
        ..Default::default()
    };
    let sql = sql_of(&SchemaModel::new(), &target, &options).concat();

    // Ids inserted by each statement, in statement order
    let batches: Vec<Vec<i64>> = sql
        .split("INSERT INTO [Tags] ([Id])\nVALUES ")
        .skip(1)
        .map(|statement| {
            let rows = &statement[..statement.find(';').unwrap()];
            rows.split(",\n")
                .map(|row| row.trim_matches(['(', ')']).parse().unwrap())
                .collect()
        })
        .collect();

    assert_eq!(
        batches,
        vec![
            (1..=42).collect::<Vec<i64>>(),
            (43..=84).collect::<Vec<i64>>(),
            (85..=100).collect::<Vec<i64>>(),
        ]
    );
}
