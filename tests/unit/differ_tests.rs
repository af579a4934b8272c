//! Differ behavior on whole models

use std::io;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use rust_sqlmigrate::diff::{diff, has_destructive_changes};
use rust_sqlmigrate::model::{LogicalType, ModelBuilder, TableBuilder};
use rust_sqlmigrate::operations::Operation;
use rust_sqlmigrate::{
    migration_commands, plan_migration, schedule, GenerateOptions, MigrationError, SchemaModel,
};

use crate::common::people_model;

fn model(name: &str, configure: impl FnOnce(&mut TableBuilder)) -> SchemaModel {
    ModelBuilder::new()
        .table(name, |t| {
            t.column("Id", LogicalType::Int32);
            t.primary_key("PK_People", &["Id"]);
            configure(t);
        })
        .build()
        .unwrap()
}

fn ordered_kinds(source: &SchemaModel, target: &SchemaModel) -> Vec<&'static str> {
    schedule::order(diff(source, target).unwrap())
        .unwrap()
        .iter()
        .map(Operation::kind)
        .collect()
}

// ============================================================================
// Tables
// ============================================================================

#[test]
fn test_renamed_table_keeps_its_data() {
    let source = model("People", |_| {});
    let target = model("Persons", |t| {
        t.id("People");
    });

    assert_eq!(ordered_kinds(&source, &target), vec!["RenameTable"]);
    let commands = migration_commands(&source, &target, &GenerateOptions::default()).unwrap();
    assert_eq!(commands[0].sql, "EXEC sp_rename N'[People]', N'Persons';\n");
}

#[test]
fn test_moved_table_ensures_schema_first() {
    let source = model("People", |_| {});
    let target = model("People", |t| {
        t.schema("hr");
    });

    assert_eq!(ordered_kinds(&source, &target), vec!["EnsureSchema", "MoveTable"]);
    let sql: String = migration_commands(&source, &target, &GenerateOptions::default())
        .unwrap()
        .into_iter()
        .map(|c| c.sql)
        .collect();
    assert!(sql.contains("IF SCHEMA_ID(N'hr') IS NULL EXEC(N'CREATE SCHEMA [hr];');"));
    assert!(sql.contains("ALTER SCHEMA [hr] TRANSFER [People];"));
}

#[test]
fn test_dropping_a_table_is_destructive() {
    let operations = diff(&people_model(), &SchemaModel::new()).unwrap();
    assert!(matches!(operations.as_slice(), [Operation::DropTable(_)]));
    assert!(has_destructive_changes(&operations));
}

#[test]
fn test_adding_a_column_is_not_destructive() {
    let source = model("People", |_| {});
    let target = model("People", |t| {
        t.column("Email", LogicalType::String).nullable();
    });
    let operations = diff(&source, &target).unwrap();
    assert!(matches!(operations.as_slice(), [Operation::AddColumn(_)]));
    assert!(!has_destructive_changes(&operations));
}

/// Log output captured from a scoped subscriber
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn plan(&self, source: &SchemaModel, target: &SchemaModel) -> String {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            plan_migration(source, target).unwrap();
        });
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[test]
fn test_destructive_plan_logs_a_warning() {
    let logs = CapturedLogs::default().plan(&people_model(), &SchemaModel::new());
    assert!(logs.contains("WARN"));
    assert!(logs.contains("this migration may result in the loss of data"));
    assert!(logs.contains("operations=1"));
}

#[test]
fn test_additive_plan_logs_nothing() {
    let source = model("People", |_| {});
    let target = model("People", |t| {
        t.column("Email", LogicalType::String).nullable();
    });
    assert_eq!(CapturedLogs::default().plan(&source, &target), "");
}

#[test]
fn test_required_column_added_with_backfill_default() {
    let source = model("People", |_| {});
    let target = model("People", |t| {
        t.column("Active", LogicalType::Boolean);
    });
    let commands = migration_commands(&source, &target, &GenerateOptions::default()).unwrap();
    assert_eq!(
        commands[0].sql,
        "ALTER TABLE [People] ADD [Active] bit NOT NULL DEFAULT CAST(0 AS bit);\n"
    );
}

#[test]
fn test_memory_optimization_cannot_be_toggled() {
    let source = model("People", |_| {});
    let target = model("People", |t| {
        t.memory_optimized();
    });
    let err = diff(&source, &target).unwrap_err();
    assert!(matches!(err, MigrationError::UnsupportedAlteration { .. }));
}

// ============================================================================
// Columns
// ============================================================================

#[test]
fn test_identity_cannot_be_added() {
    let source = model("People", |t| {
        t.column("Number", LogicalType::Int64);
    });
    let target = model("People", |t| {
        t.column("Number", LogicalType::Int64).identity(1, 1);
    });
    let err = diff(&source, &target).unwrap_err();
    assert!(err.to_string().contains("IDENTITY"));
}

#[test]
fn test_changed_computation_recreates_column_and_index() {
    let with = |stored: bool| {
        model("People", |t| {
            t.column("First", LogicalType::String).max_length(50);
            t.column("Last", LogicalType::String).max_length(50);
            t.column("FullName", LogicalType::String)
                .computed("[First] + N' ' + [Last]", stored);
            t.index("IX_People_FullName", &["FullName"]);
        })
    };
    assert_eq!(
        ordered_kinds(&with(false), &with(true)),
        vec!["DropIndex", "DropColumn", "AddColumn", "CreateIndex"]
    );
}

#[test]
fn test_narrowed_type_is_destructive() {
    let source = model("People", |t| {
        t.column("Code", LogicalType::String).max_length(100);
    });
    let target = model("People", |t| {
        t.column("Code", LogicalType::String).max_length(10);
    });
    let operations = diff(&source, &target).unwrap();
    assert!(matches!(operations.as_slice(), [Operation::AlterColumn(_)]));
    assert!(has_destructive_changes(&operations));
}

// ============================================================================
// Temporal tables
// ============================================================================

#[test]
fn test_table_becomes_temporal() {
    let source = model("People", |_| {});
    let target = model("People", |t| {
        t.temporal("PeopleHistory", "ValidFrom", "ValidTo");
    });
    assert_eq!(
        ordered_kinds(&source, &target),
        vec!["AddColumn", "AddColumn", "AddPeriod", "EnableSystemVersioning"]
    );

    let sql: String = migration_commands(&source, &target, &GenerateOptions::default())
        .unwrap()
        .into_iter()
        .map(|c| c.sql)
        .collect();
    assert_eq!(
        sql,
        "ALTER TABLE [People] ADD [ValidFrom] datetime2 NOT NULL DEFAULT '0001-01-01T00:00:00.0000000';\n\
         ALTER TABLE [People] ADD [ValidTo] datetime2 NOT NULL DEFAULT '9999-12-31T23:59:59.9999999';\n\
         ALTER TABLE [People] ADD PERIOD FOR SYSTEM_TIME ([ValidFrom], [ValidTo]);\n\
         DECLARE @historyTableSchema sysname = SCHEMA_NAME()\n\
         EXEC(N'ALTER TABLE [People] SET (SYSTEM_VERSIONING = ON (HISTORY_TABLE = [' + @historyTableSchema + '].[PeopleHistory]))');\n"
    );
    assert!(!sql.contains("GENERATED ALWAYS"));
}

#[test]
fn test_dropping_temporal_table_drops_history() {
    let source = model("People", |t| {
        t.temporal("PeopleHistory", "ValidFrom", "ValidTo");
    });
    let operations = schedule::order(diff(&source, &SchemaModel::new()).unwrap()).unwrap();
    let kinds: Vec<&str> = operations.iter().map(Operation::kind).collect();
    assert_eq!(kinds, vec!["DisableSystemVersioning", "DropTable", "DropTable"]);
    match &operations[2] {
        Operation::DropTable(op) => assert_eq!(op.name, "PeopleHistory"),
        other => panic!("expected history drop, got {other:?}"),
    }
}

#[test]
fn test_column_added_to_temporal_table_is_mirrored() {
    let source = model("People", |t| {
        t.temporal("PeopleHistory", "ValidFrom", "ValidTo");
    });
    let target = model("People", |t| {
        t.column("Email", LogicalType::String).nullable();
        t.temporal("PeopleHistory", "ValidFrom", "ValidTo");
    });

    let operations = schedule::order(diff(&source, &target).unwrap()).unwrap();
    let kinds: Vec<&str> = operations.iter().map(Operation::kind).collect();
    assert_eq!(kinds.first(), Some(&"DisableSystemVersioning"));
    assert_eq!(kinds.last(), Some(&"EnableSystemVersioning"));

    let added: Vec<&str> = operations
        .iter()
        .filter_map(|op| match op {
            Operation::AddColumn(add) => Some(add.table.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(added.len(), 2);
    assert!(added.contains(&"People"));
    assert!(added.contains(&"PeopleHistory"));
}
