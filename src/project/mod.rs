//! Migrations project files and snapshot loading

mod migproj_parser;
mod migration_id;

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::info;

pub use migproj_parser::{parse_migproj, MigrationEntry, MigrationsProject};
pub use migration_id::{is_valid_migration_id, new_migration_id};

use crate::error::MigrationError;
use crate::model::SchemaModel;
use crate::snapshot;

/// Minimum number of snapshots to benefit from parallel loading
const PARALLEL_THRESHOLD: usize = 8;

impl MigrationsProject {
    /// Load the snapshot of every migration, in project order.
    ///
    /// Snapshots that do not name a default schema inherit the project's.
    pub fn load_snapshots(&self) -> Result<Vec<SchemaModel>, MigrationError> {
        let results: Vec<Result<SchemaModel, MigrationError>> =
            if self.migrations.len() >= PARALLEL_THRESHOLD {
                self.migrations
                    .par_iter()
                    .map(|m| snapshot::read_snapshot(&m.snapshot))
                    .collect()
            } else {
                self.migrations
                    .iter()
                    .map(|m| snapshot::read_snapshot(&m.snapshot))
                    .collect()
            };

        let mut models = Vec::with_capacity(results.len());
        for result in results {
            let mut model = result?;
            if model.default_schema.is_none() {
                model.default_schema = Some(self.default_schema.clone());
            }
            models.push(model);
        }

        info!(
            project = %self.name,
            snapshots = models.len(),
            "loaded migration snapshots"
        );
        Ok(models)
    }
}

/// Find .migproj files under `dir`, skipping bin and obj directories
pub fn discover_projects(dir: &Path) -> Vec<PathBuf> {
    let mut projects: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !(e.file_type().is_dir() && (name == "bin" || name == "obj"))
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "migproj"))
        .collect();
    projects.sort();
    projects
}
