//! rust-sqlmigrate: schema-migration diffing and T-SQL script generation
//!
//! This library compares schema snapshots, orders the resulting
//! operations so that every dependency is satisfied, and renders them as
//! SQL Server migration scripts.

pub mod diff;
pub mod error;
pub mod model;
pub mod operations;
pub mod project;
pub mod schedule;
pub mod snapshot;
pub mod sql;
pub mod util;

use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};

pub use error::MigrationError;
pub use model::{ModelBuilder, SchemaModel};
pub use operations::Operation;
pub use sql::{CommandBatch, GenerateOptions, HistoryTable};

use sql::{MigrationCommands, ScriptDirection, ScriptGenerator, SqlServerDialect};

/// Migration name that stands for the empty database
pub const INITIAL_MIGRATION: &str = "0";

/// Options for scripting migrations of a project
#[derive(Debug, Clone, Default)]
pub struct ScriptOptions {
    /// Path to the .migproj file
    pub project_path: PathBuf,
    /// Migration the database is at; defaults to the empty database
    pub from: Option<String>,
    /// Migration to end at; defaults to the last one
    pub to: Option<String>,
    /// Overrides the project's Idempotent setting when true
    pub idempotent: bool,
    /// Overrides the project's MaxBatchSize
    pub max_batch_size: Option<usize>,
    /// Write the script here instead of only returning it
    pub output_path: Option<PathBuf>,
}

/// Diff two models and schedule the resulting operations. Changes that
/// can lose data are reported with a warning.
pub fn plan_migration(
    source: &SchemaModel,
    target: &SchemaModel,
) -> Result<Vec<schedule::Batch>, MigrationError> {
    let operations = diff::diff(source, target)?;
    if diff::has_destructive_changes(&operations) {
        warn!(
            operations = operations.len(),
            "this migration may result in the loss of data"
        );
    }
    schedule::schedule(operations)
}

/// Diff two models and render the commands that migrate `source` to `target`
pub fn migration_commands(
    source: &SchemaModel,
    target: &SchemaModel,
    options: &GenerateOptions,
) -> Result<Vec<CommandBatch>, MigrationError> {
    let batches = plan_migration(source, target)?;
    sql::generate(&batches, options)
}

/// Generate the migration script for a project
pub fn generate_script(options: ScriptOptions) -> Result<String> {
    info!(project = %options.project_path.display(), "scripting migrations");

    // Step 1: Parse the project file
    let project = project::parse_migproj(&options.project_path)?;

    let mut generate_options = project.generate_options();
    generate_options.idempotent |= options.idempotent;
    if let Some(size) = options.max_batch_size {
        generate_options.max_batch_size = size.max(1);
    }

    // Step 2: Resolve the endpoints as states: None is the empty database,
    // Some(i) is the state after migration i
    let from = resolve_state(&project, options.from.as_deref())?;
    let to = match options.to.as_deref() {
        None => project.migrations.len().checked_sub(1),
        Some(name) => resolve_state(&project, Some(name))?,
    };

    // Step 3: Load every snapshot
    let snapshots = project.load_snapshots()?;
    let empty = SchemaModel::new();
    let state = |index: Option<usize>| index.map_or(&empty, |i| &snapshots[i]);

    // Step 4: Diff consecutive states in script order
    let direction = if to >= from {
        ScriptDirection::Up
    } else {
        ScriptDirection::Down
    };
    let steps: Vec<usize> = match direction {
        ScriptDirection::Up => (from.map_or(0, |f| f + 1)..to.map_or(0, |t| t + 1)).collect(),
        ScriptDirection::Down => (to.map_or(0, |t| t + 1)..from.map_or(0, |f| f + 1))
            .rev()
            .collect(),
    };

    let mut migrations = Vec::with_capacity(steps.len());
    for index in steps {
        let previous = index.checked_sub(1);
        let (source, target) = match direction {
            ScriptDirection::Up => (state(previous), state(Some(index))),
            ScriptDirection::Down => (state(Some(index)), state(previous)),
        };
        let commands = migration_commands(source, target, &generate_options)?;
        migrations.push(MigrationCommands {
            id: project.migrations[index].id.clone(),
            commands,
        });
    }

    info!(
        migrations = migrations.len(),
        direction = ?direction,
        "generated migration commands"
    );

    // Step 5: Assemble the script
    let script = ScriptGenerator::new(&SqlServerDialect, &generate_options)
        .generate(&migrations, direction);

    if let Some(output_path) = &options.output_path {
        std::fs::write(output_path, &script).map_err(|e| MigrationError::ScriptWriteError {
            path: output_path.clone(),
            source: e,
        })?;
        info!(output = %output_path.display(), "wrote migration script");
    }

    Ok(script)
}

fn resolve_state(
    project: &project::MigrationsProject,
    name: Option<&str>,
) -> Result<Option<usize>, MigrationError> {
    match name {
        None | Some(INITIAL_MIGRATION) => Ok(None),
        Some(name) => project.require_position(name).map(Some),
    }
}
