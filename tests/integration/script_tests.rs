//! Script generation from projects written to disk

use std::fs;

use rust_sqlmigrate::model::{LogicalType, ModelBuilder, SqlValue};
use rust_sqlmigrate::{generate_script, MigrationError, ScriptOptions};

use crate::common::{people_model, TestContext};

fn people_with_email() -> rust_sqlmigrate::SchemaModel {
    ModelBuilder::new()
        .table("People", |t| {
            t.column("Id", LogicalType::Int32).identity(1, 1);
            t.column("Name", LogicalType::String).nullable();
            t.column("Email", LogicalType::String).max_length(256).nullable();
            t.primary_key("PK_People", &["Id"]);
        })
        .build()
        .unwrap()
}

fn two_migrations() -> (TestContext, String, String) {
    let mut ctx = TestContext::new();
    let initial = ctx.add_migration("Initial", &people_model());
    let email = ctx.add_migration("AddEmail", &people_with_email());
    (ctx, initial, email)
}

// ============================================================================
// Up scripts
// ============================================================================

#[test]
fn test_full_script_applies_every_migration() {
    let (ctx, initial, email) = two_migrations();
    let script = ctx.script_successfully(None, None);

    assert!(script.starts_with("IF OBJECT_ID(N'[__EFMigrationsHistory]') IS NULL\nBEGIN\n"));
    assert!(script.contains("CREATE TABLE [People] ("));
    assert!(script.contains("ALTER TABLE [People] ADD [Email] nvarchar(256) NULL;"));

    let first = script.find(&format!("VALUES (N'{initial}'")).unwrap();
    let second = script.find(&format!("VALUES (N'{email}'")).unwrap();
    assert!(first < second);
    assert_eq!(script.matches("BEGIN TRANSACTION;").count(), 2);
    assert_eq!(script.matches("COMMIT;").count(), 2);
}

#[test]
fn test_script_from_a_migration_skips_it() {
    let (ctx, initial, _) = two_migrations();
    let script = ctx.script_successfully(Some(initial.as_str()), None);

    assert!(!script.contains("CREATE TABLE [People]"));
    assert!(script.contains("ADD [Email]"));
}

#[test]
fn test_migrations_are_found_by_name() {
    let (ctx, _, _) = two_migrations();
    let script = ctx.script_successfully(Some("initial"), Some("AddEmail"));
    assert!(script.contains("ADD [Email]"));
}

#[test]
fn test_same_endpoints_only_create_history() {
    let (ctx, initial, _) = two_migrations();
    let script = ctx.script_successfully(Some(initial.as_str()), Some(initial.as_str()));
    assert!(script.contains("CREATE TABLE [__EFMigrationsHistory]"));
    assert!(!script.contains("BEGIN TRANSACTION;"));
}

// ============================================================================
// Down scripts
// ============================================================================

#[test]
fn test_down_script_reverts_in_reverse_order() {
    let (ctx, initial, email) = two_migrations();
    let script = ctx.script_successfully(Some(email.as_str()), Some("0"));

    assert!(!script.contains("CREATE TABLE [__EFMigrationsHistory]"));
    assert!(script.contains("ALTER TABLE [People] DROP COLUMN [Email];"));
    assert!(script.contains("DROP TABLE [People];"));

    let email_removed = script
        .find(&format!("WHERE [MigrationId] = N'{email}';"))
        .unwrap();
    let initial_removed = script
        .find(&format!("WHERE [MigrationId] = N'{initial}';"))
        .unwrap();
    assert!(email_removed < initial_removed);
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn test_idempotent_script_guards_each_migration() {
    let (ctx, initial, email) = two_migrations();
    let script = generate_script(ScriptOptions {
        project_path: ctx.project_path(),
        idempotent: true,
        ..Default::default()
    })
    .unwrap();

    assert!(script.contains(&format!(
        "IF NOT EXISTS (\n    SELECT * FROM [__EFMigrationsHistory]\n    WHERE [MigrationId] = N'{initial}'\n)\nBEGIN\n"
    )));
    assert!(script.contains(&format!("WHERE [MigrationId] = N'{email}'")));
    assert!(script.contains("IF OBJECT_ID(N'[People]') IS NULL"));
}

#[test]
fn test_project_settings_apply() {
    let mut ctx = TestContext::new();
    ctx.property("MaxBatchSize", "2")
        .property("HistoryTable", "Migrations")
        .property("HistorySchema", "ops")
        .property("ProductVersion", "9.9.9");
    let tags = ModelBuilder::new()
        .table("Tags", |t| {
            t.column("Id", LogicalType::Int32);
            t.primary_key("PK_Tags", &["Id"]);
            for id in 1..=5 {
                t.seed(&[("Id", SqlValue::Int(id))]);
            }
        })
        .build()
        .unwrap();
    let id = ctx.add_migration("Tags", &tags);

    let script = ctx.script_successfully(None, None);
    assert_eq!(script.matches("INSERT INTO [Tags]").count(), 3);
    assert!(script.contains("IF SCHEMA_ID(N'ops') IS NULL"));
    assert!(script.contains("CREATE TABLE [ops].[Migrations]"));
    assert!(script.contains(&format!("VALUES (N'{id}', N'9.9.9');")));
}

#[test]
fn test_max_batch_size_option_overrides_project() {
    let mut ctx = TestContext::new();
    ctx.property("MaxBatchSize", "100");
    let tags = ModelBuilder::new()
        .table("Tags", |t| {
            t.column("Id", LogicalType::Int32);
            t.primary_key("PK_Tags", &["Id"]);
            for id in 1..=4 {
                t.seed(&[("Id", SqlValue::Int(id))]);
            }
        })
        .build()
        .unwrap();
    ctx.add_migration("Tags", &tags);

    let script = generate_script(ScriptOptions {
        project_path: ctx.project_path(),
        max_batch_size: Some(1),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(script.matches("INSERT INTO [Tags]").count(), 4);
}

#[test]
fn test_script_written_to_output_path() {
    let (ctx, _, _) = two_migrations();
    let output = ctx.project_dir.join("migrate.sql");
    let script = generate_script(ScriptOptions {
        project_path: ctx.project_path(),
        output_path: Some(output.clone()),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(fs::read_to_string(&output).unwrap(), script);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unknown_migration_is_reported() {
    let (ctx, _, _) = two_migrations();
    let err = ctx.script(Some("Missing"), None).unwrap_err();
    match err.downcast_ref::<MigrationError>() {
        Some(MigrationError::UnknownMigration { id }) => assert_eq!(id, "Missing"),
        other => panic!("expected unknown migration, got {other:?}"),
    }
}

#[test]
fn test_edited_snapshot_is_rejected() {
    let (ctx, _, email) = two_migrations();
    let path = ctx.project_dir.join(format!("snapshots/{email}.xml"));
    let edited = fs::read_to_string(&path)
        .unwrap()
        .replace("MaxLength=\"256\"", "MaxLength=\"512\"");
    fs::write(&path, edited).unwrap();

    let err = ctx.script(None, None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MigrationError>(),
        Some(MigrationError::SnapshotChecksumMismatch { .. })
    ));
}

#[test]
fn test_unsupported_change_fails_the_script() {
    let mut ctx = TestContext::new();
    ctx.add_migration("Initial", &people_model());
    let without_identity = ModelBuilder::new()
        .table("People", |t| {
            t.column("Id", LogicalType::Int32);
            t.column("Name", LogicalType::String).nullable();
            t.primary_key("PK_People", &["Id"]);
        })
        .build()
        .unwrap();
    ctx.add_migration("DropIdentity", &without_identity);

    let err = ctx.script(None, None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MigrationError>(),
        Some(MigrationError::UnsupportedAlteration { .. })
    ));
}
