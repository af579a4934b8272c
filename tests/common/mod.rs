//! Common test utilities for rust-sqlmigrate tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rust_sqlmigrate::model::{LogicalType, ModelBuilder, ReferentialAction, SqlValue};
use rust_sqlmigrate::{generate_script, snapshot, SchemaModel, ScriptOptions};
use tempfile::TempDir;

/// Test context with temporary directory for isolated test execution
pub struct TestContext {
    /// Kept to prevent temp directory cleanup until TestContext is dropped
    _temp_dir: TempDir,
    pub project_dir: PathBuf,
    /// Migrations written so far, as (id, snapshot file relative to the project)
    migrations: Vec<(String, String)>,
    /// Extra `<PropertyGroup>` content for the project file
    properties: String,
}

impl TestContext {
    /// Create an empty project in a temp directory
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let project_dir = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            project_dir,
            migrations: Vec::new(),
            properties: String::new(),
        }
    }

    /// Create a new test context by copying a fixture to a temp directory
    pub fn with_fixture(fixture_name: &str) -> Self {
        let ctx = Self::new();
        let fixture_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(fixture_name);
        copy_dir_recursive(&fixture_path, &ctx.project_dir).expect("Failed to copy fixture");
        ctx
    }

    /// Get the path to the .migproj file
    pub fn project_path(&self) -> PathBuf {
        self.project_dir.join("project.migproj")
    }

    /// Add a `<PropertyGroup>` entry, e.g. `("MaxBatchSize", "2")`
    pub fn property(&mut self, name: &str, value: &str) -> &mut Self {
        self.properties
            .push_str(&format!("    <{name}>{value}</{name}>\n"));
        self
    }

    /// Write a snapshot for a new migration and return its id.
    /// Ids are timestamped in the order migrations are added.
    pub fn add_migration(&mut self, name: &str, model: &SchemaModel) -> String {
        let id = format!("202401010000{:02}_{}", self.migrations.len() + 1, name);
        let relative = format!("snapshots/{id}.xml");
        let path = self.project_dir.join(&relative);
        fs::create_dir_all(path.parent().expect("snapshot has a parent directory"))
            .expect("Failed to create snapshot directory");
        snapshot::write_snapshot(model, &path).expect("Failed to write snapshot");
        self.migrations.push((id.clone(), relative));
        self.write_project();
        id
    }

    /// (Re)write the project file from the migrations added so far
    pub fn write_project(&self) {
        let mut xml = String::from("<MigrationsProject>\n  <PropertyGroup>\n");
        xml.push_str(&self.properties);
        xml.push_str("  </PropertyGroup>\n  <ItemGroup>\n");
        for (id, snapshot) in &self.migrations {
            xml.push_str(&format!(
                "    <Migration Include=\"{id}\" Snapshot=\"{snapshot}\" />\n"
            ));
        }
        xml.push_str("  </ItemGroup>\n</MigrationsProject>\n");
        fs::write(self.project_path(), xml).expect("Failed to write project file");
    }

    /// Script migrations of the project
    pub fn script(&self, from: Option<&str>, to: Option<&str>) -> anyhow::Result<String> {
        generate_script(ScriptOptions {
            project_path: self.project_path(),
            from: from.map(str::to_string),
            to: to.map(str::to_string),
            ..Default::default()
        })
    }

    /// Script migrations, panicking on failure
    pub fn script_successfully(&self, from: Option<&str>, to: Option<&str>) -> String {
        match self.script(from, to) {
            Ok(script) => script,
            Err(e) => panic!("Script generation failed: {e:?}"),
        }
    }
}

/// Recursively copy a directory
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

// ============================================================================
// Sample models
// ============================================================================

/// `People { Id int identity PK, Name nvarchar(max) NULL }`
pub fn people_model() -> SchemaModel {
    ModelBuilder::new()
        .table("People", |t| {
            t.column("Id", LogicalType::Int32).identity(1, 1);
            t.column("Name", LogicalType::String).nullable();
            t.primary_key("PK_People", &["Id"]);
        })
        .build()
        .expect("valid model")
}

/// Blogs and posts with a foreign key, an index and seed rows
pub fn blog_model() -> SchemaModel {
    ModelBuilder::new()
        .table("Blogs", |t| {
            t.column("Id", LogicalType::Int32).identity(1, 1);
            t.column("Url", LogicalType::String).max_length(200);
            t.primary_key("PK_Blogs", &["Id"]);
            t.index("IX_Blogs_Url", &["Url"]).unique();
            t.seed(&[("Id", SqlValue::Int(1)), ("Url", SqlValue::from("https://example.com"))]);
        })
        .table("Posts", |t| {
            t.column("Id", LogicalType::Int32).identity(1, 1);
            t.column("BlogId", LogicalType::Int32);
            t.column("Title", LogicalType::String).max_length(100);
            t.primary_key("PK_Posts", &["Id"]);
            t.foreign_key("FK_Posts_Blogs_BlogId", &["BlogId"], "Blogs", &["Id"])
                .on_delete(ReferentialAction::Cascade);
            t.index("IX_Posts_BlogId", &["BlogId"]);
        })
        .build()
        .expect("valid model")
}
