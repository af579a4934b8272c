//! Scheduling of operations produced from whole models

use rust_sqlmigrate::diff::diff;
use rust_sqlmigrate::model::{LogicalType, ModelBuilder, SqlValue};
use rust_sqlmigrate::operations::Operation;
use rust_sqlmigrate::{schedule, SchemaModel};

use crate::common::blog_model;

fn position(operations: &[Operation], kind: &str, table: &str) -> usize {
    operations
        .iter()
        .position(|op| op.kind() == kind && op.table().map(|(_, name)| name) == Some(table))
        .unwrap_or_else(|| panic!("no {kind} for {table}"))
}

#[test]
fn test_principal_table_created_before_dependent() {
    let operations = schedule::order(diff(&SchemaModel::new(), &blog_model()).unwrap()).unwrap();

    let blogs = position(&operations, "CreateTable", "Blogs");
    let posts = position(&operations, "CreateTable", "Posts");
    assert!(blogs < posts);

    // Indexes and seed rows follow every table
    let index = position(&operations, "CreateIndex", "Posts");
    let seed = position(&operations, "InsertData", "Blogs");
    assert!(posts < index);
    assert!(posts < seed);
}

#[test]
fn test_dependent_table_dropped_before_principal() {
    let operations = schedule::order(diff(&blog_model(), &SchemaModel::new()).unwrap()).unwrap();
    let kinds: Vec<&str> = operations.iter().map(Operation::kind).collect();
    assert_eq!(kinds, vec!["DropTable", "DropTable"]);
    assert!(position(&operations, "DropTable", "Posts") < position(&operations, "DropTable", "Blogs"));
}

#[test]
fn test_mutual_foreign_keys_deferred_after_creation() {
    let target = ModelBuilder::new()
        .table("Authors", |t| {
            t.column("Id", LogicalType::Int32);
            t.column("FavoriteBookId", LogicalType::Int32).nullable();
            t.primary_key("PK_Authors", &["Id"]);
            t.foreign_key("FK_Authors_Books", &["FavoriteBookId"], "Books", &["Id"]);
        })
        .table("Books", |t| {
            t.column("Id", LogicalType::Int32);
            t.column("AuthorId", LogicalType::Int32);
            t.primary_key("PK_Books", &["Id"]);
            t.foreign_key("FK_Books_Authors", &["AuthorId"], "Authors", &["Id"]);
        })
        .build()
        .unwrap();

    let operations = schedule::order(diff(&SchemaModel::new(), &target).unwrap()).unwrap();
    let kinds: Vec<&str> = operations.iter().map(Operation::kind).collect();
    assert_eq!(kinds, vec!["CreateTable", "CreateTable", "AddForeignKey"]);
}

#[test]
fn test_seed_rows_deleted_before_columns_dropped() {
    let source = ModelBuilder::new()
        .table("Tags", |t| {
            t.column("Id", LogicalType::Int32);
            t.column("Legacy", LogicalType::String).nullable();
            t.primary_key("PK_Tags", &["Id"]);
            t.seed(&[("Id", SqlValue::Int(1))]);
            t.seed(&[("Id", SqlValue::Int(2))]);
        })
        .build()
        .unwrap();
    let target = ModelBuilder::new()
        .table("Tags", |t| {
            t.column("Id", LogicalType::Int32);
            t.primary_key("PK_Tags", &["Id"]);
            t.seed(&[("Id", SqlValue::Int(1))]);
        })
        .build()
        .unwrap();

    let operations = schedule::order(diff(&source, &target).unwrap()).unwrap();
    let kinds: Vec<&str> = operations.iter().map(Operation::kind).collect();
    assert_eq!(kinds, vec!["DeleteData", "DropColumn"]);
}

#[test]
fn test_memory_optimized_table_gets_its_own_batch() {
    let target = ModelBuilder::new()
        .table("Sessions", |t| {
            t.column("Id", LogicalType::Int32);
            t.primary_key("PK_Sessions", &["Id"]).clustered(false);
            t.memory_optimized();
        })
        .table("Users", |t| {
            t.column("Id", LogicalType::Int32);
            t.primary_key("PK_Users", &["Id"]);
        })
        .build()
        .unwrap();

    let batches = schedule::schedule(diff(&SchemaModel::new(), &target).unwrap()).unwrap();
    let isolated: Vec<&str> = batches
        .iter()
        .filter(|b| !b.transactional)
        .flat_map(|b| b.operations.iter().map(Operation::kind))
        .collect();
    assert_eq!(isolated, vec!["AlterDatabase", "CreateTable"]);
    assert!(batches.iter().all(|b| b.transactional || b.operations.len() == 1));
}
