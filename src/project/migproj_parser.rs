//! Parser for .migproj files

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use roxmltree::Document;

use super::migration_id::is_valid_migration_id;
use crate::error::MigrationError;
use crate::sql::{GenerateOptions, HistoryTable, DEFAULT_HISTORY_TABLE, DEFAULT_MAX_BATCH_SIZE};

/// One migration listed in the project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationEntry {
    /// Timestamped identifier, e.g. `20240101000000_Initial`
    pub id: String,
    /// Snapshot of the schema after this migration, absolute
    pub snapshot: PathBuf,
}

impl MigrationEntry {
    /// Name part of the identifier (after the timestamp)
    pub fn name(&self) -> &str {
        self.id.split_once('_').map_or(self.id.as_str(), |(_, name)| name)
    }
}

/// Parsed migrations project
#[derive(Debug, Clone)]
pub struct MigrationsProject {
    /// Project name
    pub name: String,
    /// Project directory
    pub project_dir: PathBuf,
    /// Schema for snapshots that do not name one
    pub default_schema: String,
    pub history_table: HistoryTable,
    pub max_batch_size: usize,
    pub idempotent: bool,
    /// Recorded in the history table; defaults to this crate's version
    pub product_version: Option<String>,
    /// Migrations in application order
    pub migrations: Vec<MigrationEntry>,
}

impl MigrationsProject {
    /// Generation settings declared by the project
    pub fn generate_options(&self) -> GenerateOptions {
        let defaults = GenerateOptions::default();
        GenerateOptions {
            idempotent: self.idempotent,
            max_batch_size: self.max_batch_size,
            history_table: self.history_table.clone(),
            product_version: self
                .product_version
                .clone()
                .unwrap_or(defaults.product_version),
        }
    }

    /// Index of a migration, by full id or by name (case-insensitive)
    pub fn position(&self, id_or_name: &str) -> Option<usize> {
        self.migrations
            .iter()
            .position(|m| m.id == id_or_name)
            .or_else(|| {
                self.migrations
                    .iter()
                    .position(|m| m.name().eq_ignore_ascii_case(id_or_name))
            })
    }

    /// Like [`Self::position`], failing with `UnknownMigration`
    pub fn require_position(&self, id_or_name: &str) -> Result<usize, MigrationError> {
        self.position(id_or_name)
            .ok_or_else(|| MigrationError::UnknownMigration {
                id: id_or_name.to_string(),
            })
    }
}

/// Parse a .migproj file
pub fn parse_migproj(path: &Path) -> Result<MigrationsProject> {
    let content = std::fs::read_to_string(path).map_err(|e| MigrationError::ProjectReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let doc = Document::parse(&content).map_err(|e| MigrationError::ProjectParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let project_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

    let project_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Migrations")
        .to_string();

    let root = doc.root_element();
    if root.tag_name().name() != "MigrationsProject" {
        return Err(invalid(format!(
            "expected <MigrationsProject> root element, found <{}>",
            root.tag_name().name()
        ))
        .into());
    }

    let default_schema =
        find_property_value(&root, "DefaultSchema").unwrap_or_else(|| "dbo".to_string());

    let history_table = HistoryTable {
        name: find_property_value(&root, "HistoryTable")
            .unwrap_or_else(|| DEFAULT_HISTORY_TABLE.to_string()),
        schema: find_property_value(&root, "HistorySchema"),
    };

    let max_batch_size = match find_property_value(&root, "MaxBatchSize") {
        Some(value) => match value.parse::<usize>() {
            Ok(size) if size > 0 => size,
            _ => return Err(invalid(format!("MaxBatchSize must be a positive integer, found '{value}'")).into()),
        },
        None => DEFAULT_MAX_BATCH_SIZE,
    };

    let idempotent = find_property_value(&root, "Idempotent")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let product_version = find_property_value(&root, "ProductVersion");

    let migrations = find_migrations(&root, &project_dir)?;

    Ok(MigrationsProject {
        name: project_name,
        project_dir,
        default_schema,
        history_table,
        max_batch_size,
        idempotent,
        product_version,
        migrations,
    })
}

fn invalid(message: String) -> MigrationError {
    MigrationError::InvalidProjectFormat { message }
}

fn find_property_value(root: &roxmltree::Node, property_name: &str) -> Option<String> {
    root.descendants()
        .filter(|n| n.tag_name().name() == "PropertyGroup")
        .flat_map(|group| group.children())
        .find(|n| n.tag_name().name() == property_name)
        .and_then(|n| n.text())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn find_migrations(
    root: &roxmltree::Node,
    project_dir: &Path,
) -> Result<Vec<MigrationEntry>, MigrationError> {
    let mut migrations: Vec<MigrationEntry> = Vec::new();
    let mut seen = HashSet::new();

    for node in root
        .descendants()
        .filter(|n| n.tag_name().name() == "Migration")
    {
        let id = node
            .attribute("Include")
            .ok_or_else(|| invalid("<Migration> is missing the Include attribute".to_string()))?;
        if !is_valid_migration_id(id) {
            return Err(invalid(format!(
                "'{id}' is not a valid migration id (expected <14-digit timestamp>_<Name>)"
            )));
        }
        if !seen.insert(id.to_string()) {
            return Err(invalid(format!("migration '{id}' is listed twice")));
        }
        if let Some(previous) = migrations.last() {
            if previous.id.as_str() > id {
                return Err(invalid(format!(
                    "migration '{id}' is listed after the later migration '{}'",
                    previous.id
                )));
            }
        }
        let snapshot = node
            .attribute("Snapshot")
            .ok_or_else(|| invalid(format!("migration '{id}' has no Snapshot attribute")))?;
        migrations.push(MigrationEntry {
            id: id.to_string(),
            snapshot: project_dir.join(snapshot.replace('\\', "/")),
        });
    }

    Ok(migrations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_project(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("Blog.migproj");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_full_project() {
        let dir = TempDir::new().unwrap();
        let path = write_project(
            &dir,
            r#"<MigrationsProject>
                 <PropertyGroup>
                   <DefaultSchema>app</DefaultSchema>
                   <HistoryTable>Migrations</HistoryTable>
                   <HistorySchema>ops</HistorySchema>
                   <MaxBatchSize>10</MaxBatchSize>
                   <Idempotent>True</Idempotent>
                   <ProductVersion>8.0.0</ProductVersion>
                 </PropertyGroup>
                 <ItemGroup>
                   <Migration Include="20240101000000_Initial" Snapshot="snapshots\initial.xml" />
                   <Migration Include="20240201000000_AddBlog" Snapshot="snapshots/blog.xml" />
                 </ItemGroup>
               </MigrationsProject>"#,
        );
        let project = parse_migproj(&path).unwrap();
        assert_eq!(project.name, "Blog");
        assert_eq!(project.default_schema, "app");
        assert_eq!(project.history_table.schema.as_deref(), Some("ops"));
        assert_eq!(project.max_batch_size, 10);
        assert!(project.idempotent);
        assert_eq!(project.migrations.len(), 2);
        assert_eq!(
            project.migrations[0].snapshot,
            dir.path().join("snapshots/initial.xml")
        );

        let options = project.generate_options();
        assert_eq!(options.product_version, "8.0.0");
        assert_eq!(options.history_table.name, "Migrations");
    }

    #[test]
    fn test_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_project(&dir, "<MigrationsProject />");
        let project = parse_migproj(&path).unwrap();
        assert_eq!(project.default_schema, "dbo");
        assert_eq!(project.history_table, HistoryTable::default());
        assert_eq!(project.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
        assert!(!project.idempotent);
        assert!(project.migrations.is_empty());
    }

    #[test]
    fn test_position_by_id_or_name() {
        let dir = TempDir::new().unwrap();
        let path = write_project(
            &dir,
            r#"<MigrationsProject><ItemGroup>
                 <Migration Include="20240101000000_Initial" Snapshot="a.xml" />
                 <Migration Include="20240201000000_AddBlog" Snapshot="b.xml" />
               </ItemGroup></MigrationsProject>"#,
        );
        let project = parse_migproj(&path).unwrap();
        assert_eq!(project.position("20240201000000_AddBlog"), Some(1));
        assert_eq!(project.position("addblog"), Some(1));
        assert!(matches!(
            project.require_position("Missing"),
            Err(MigrationError::UnknownMigration { .. })
        ));
    }

    #[test]
    fn test_out_of_order_migrations_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_project(
            &dir,
            r#"<MigrationsProject><ItemGroup>
                 <Migration Include="20240201000000_B" Snapshot="b.xml" />
                 <Migration Include="20240101000000_A" Snapshot="a.xml" />
               </ItemGroup></MigrationsProject>"#,
        );
        let err = parse_migproj(&path).unwrap_err();
        assert!(err.to_string().contains("listed after"));
    }

    #[test]
    fn test_invalid_id_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_project(
            &dir,
            r#"<MigrationsProject><ItemGroup>
                 <Migration Include="Initial" Snapshot="a.xml" />
               </ItemGroup></MigrationsProject>"#,
        );
        assert!(parse_migproj(&path).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = parse_migproj(Path::new("/nonexistent/x.migproj")).unwrap_err();
        assert!(err.downcast_ref::<MigrationError>().is_some());
    }
}
