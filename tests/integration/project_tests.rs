//! Migration projects checked into the fixtures directory

use rust_sqlmigrate::project::{discover_projects, parse_migproj};

use crate::common::TestContext;

#[test]
fn test_blog_project_parses() {
    let ctx = TestContext::with_fixture("blog");
    let project = parse_migproj(&ctx.project_path()).unwrap();

    assert_eq!(project.name, "project");
    assert_eq!(project.max_batch_size, 42);
    assert_eq!(project.product_version.as_deref(), Some("8.0.0"));
    let names: Vec<&str> = project.migrations.iter().map(|m| m.name()).collect();
    assert_eq!(names, vec!["Initial", "AddPosts"]);
    assert!(project.migrations[1].snapshot.ends_with("snapshots/add_posts.xml"));
}

#[test]
fn test_blog_snapshots_load() {
    let ctx = TestContext::with_fixture("blog");
    let project = parse_migproj(&ctx.project_path()).unwrap();
    let snapshots = project.load_snapshots().unwrap();

    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].tables.len(), 1);
    assert_eq!(snapshots[1].tables.len(), 2);
    assert_eq!(snapshots[1].default_schema.as_deref(), Some("dbo"));
}

#[test]
fn test_blog_script() {
    let ctx = TestContext::with_fixture("blog");
    let script = ctx.script_successfully(None, None);

    assert!(script.contains("CREATE SCHEMA [content]"));
    assert!(script.contains("CREATE TABLE [content].[Posts] ("));
    assert!(script.contains("REFERENCES [Blogs] ([Id]) ON DELETE CASCADE"));
    assert!(script.contains("CREATE INDEX [IX_Posts_BlogId] ON [content].[Posts] ([BlogId]);"));
    assert!(script.contains("VALUES (N'20240201000000_AddPosts', N'8.0.0');"));

    let blogs = script.find("CREATE TABLE [Blogs]").unwrap();
    let posts = script.find("CREATE TABLE [content].[Posts]").unwrap();
    assert!(blogs < posts);
}

#[test]
fn test_blog_revert_of_last_migration() {
    let ctx = TestContext::with_fixture("blog");
    let script = ctx.script_successfully(Some("AddPosts"), Some("Initial"));

    assert!(script.contains("DROP TABLE [content].[Posts];"));
    assert!(!script.contains("DROP TABLE [Blogs]"));
    assert!(script.contains("WHERE [MigrationId] = N'20240201000000_AddPosts';"));
}

#[test]
fn test_fixture_project_is_discovered() {
    let ctx = TestContext::with_fixture("blog");
    std::fs::create_dir_all(ctx.project_dir.join("bin")).unwrap();
    std::fs::write(ctx.project_dir.join("bin/copy.migproj"), "<MigrationsProject/>").unwrap();

    let projects = discover_projects(&ctx.project_dir);
    assert_eq!(projects, vec![ctx.project_path()]);
}
