//! Schema differ
//!
//! Compares two [`SchemaModel`] snapshots and produces the unordered set of
//! operations that turns the source schema into the target schema.
//! Entities are correlated by their stable id, so a changed name becomes a
//! rename rather than a drop and add.
//!
//! Naming convention for the produced operations: operations that run
//! before renames (drops, disabling versioning, deleting seed rows) use
//! source names; everything else uses target names. The scheduler relies
//! on this when it orders drops ahead of renames.

mod correlate;
mod expr;
mod seed;
mod table;
mod temporal;

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::MigrationError;
use crate::model::{ForeignKey, Index, PrimaryKey, SchemaModel, Sequence, Table, UniqueConstraint};
use crate::operations::{
    AlterDatabaseOperation, AlterSequenceOperation, CreateSequenceOperation, DropSequenceOperation,
    EnsureSchemaOperation, ForeignKeyDefinition, IndexDefinition, KeyDefinition,
    MoveSequenceOperation, Operation, RenameSequenceOperation, RestartSequenceOperation,
    TemporalDefinition,
};

use correlate::correlate;

/// Schema that always exists and is never created
const DBO_SCHEMA: &str = "dbo";

/// Compute the operations needed to migrate `source` to `target`
pub fn diff(source: &SchemaModel, target: &SchemaModel) -> Result<Vec<Operation>, MigrationError> {
    Differ::new(source, target).run()
}

/// Whether any of the operations can lose data
pub fn has_destructive_changes(operations: &[Operation]) -> bool {
    operations.iter().any(Operation::is_destructive)
}

/// Stateful walk over two models collecting operations
pub(crate) struct Differ<'a> {
    source: &'a SchemaModel,
    target: &'a SchemaModel,
    operations: Vec<Operation>,
}

impl<'a> Differ<'a> {
    pub(crate) fn new(source: &'a SchemaModel, target: &'a SchemaModel) -> Self {
        Self {
            source,
            target,
            operations: Vec::new(),
        }
    }

    pub(crate) fn run(mut self) -> Result<Vec<Operation>, MigrationError> {
        self.diff_database();
        self.diff_schemas();
        self.diff_sequences()?;
        self.diff_tables()?;
        self.diff_seed_data()?;

        debug!(
            operations = self.operations.len(),
            destructive = has_destructive_changes(&self.operations),
            "diff complete"
        );
        Ok(self.operations)
    }

    fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    fn source_schema(&self, schema: Option<&str>) -> Option<String> {
        self.source.effective_schema(schema).map(str::to_string)
    }

    fn target_schema(&self, schema: Option<&str>) -> Option<String> {
        self.target.effective_schema(schema).map(str::to_string)
    }

    fn diff_database(&mut self) {
        let has_memory_optimized =
            |model: &SchemaModel| model.tables.iter().any(|t| t.memory_optimized);
        let memory_optimized = has_memory_optimized(self.target) && !has_memory_optimized(self.source);
        if self.source.collation != self.target.collation || memory_optimized {
            self.push(Operation::AlterDatabase(AlterDatabaseOperation {
                collation: self.target.collation.clone(),
                old_collation: self.source.collation.clone(),
                memory_optimized,
            }));
        }
    }

    fn diff_schemas(&mut self) {
        let existing = schema_names(self.source);
        for name in schema_names(self.target).difference(&existing) {
            if name.eq_ignore_ascii_case(DBO_SCHEMA) {
                continue;
            }
            self.push(Operation::EnsureSchema(EnsureSchemaOperation { name: name.clone() }));
        }
    }

    fn diff_sequences(&mut self) -> Result<(), MigrationError> {
        let sequences = correlate(
            "sequence",
            &self.source.sequences,
            &self.target.sequences,
            |s: &Sequence| s.id.as_str(),
            |s: &Sequence| s.name.as_str(),
        )?;

        for source in sequences.removed {
            self.push(Operation::DropSequence(DropSequenceOperation {
                schema: self.source_schema(source.schema.as_deref()),
                name: source.name.clone(),
            }));
        }

        for (source, target) in sequences.matched {
            let source_schema = self.source_schema(source.schema.as_deref());
            let target_schema = self.target_schema(target.schema.as_deref());

            if source.logical_type != target.logical_type {
                // Element type can only be changed by recreating the sequence
                self.push(Operation::DropSequence(DropSequenceOperation {
                    schema: source_schema,
                    name: source.name.clone(),
                }));
                self.push(Operation::CreateSequence(CreateSequenceOperation {
                    sequence: self.resolved_sequence(target),
                }));
                continue;
            }

            if source.name != target.name {
                self.push(Operation::RenameSequence(RenameSequenceOperation {
                    schema: source_schema.clone(),
                    name: source.name.clone(),
                    new_name: target.name.clone(),
                }));
            }
            if source_schema != target_schema {
                self.push(Operation::MoveSequence(MoveSequenceOperation {
                    schema: source_schema,
                    name: target.name.clone(),
                    new_schema: target_schema,
                }));
            }
            if source.increment != target.increment
                || source.min_value != target.min_value
                || source.max_value != target.max_value
                || source.cyclic != target.cyclic
            {
                self.push(Operation::AlterSequence(AlterSequenceOperation {
                    sequence: self.resolved_sequence(target),
                    old_sequence: source.clone(),
                }));
            }
            if source.start != target.start {
                self.push(Operation::RestartSequence(RestartSequenceOperation {
                    schema: self.target_schema(target.schema.as_deref()),
                    name: target.name.clone(),
                    start_value: target.start,
                }));
            }
        }

        for target in sequences.added {
            self.push(Operation::CreateSequence(CreateSequenceOperation {
                sequence: self.resolved_sequence(target),
            }));
        }
        Ok(())
    }

    /// Copy of a target sequence with its schema resolved for rendering
    fn resolved_sequence(&self, sequence: &Sequence) -> Sequence {
        Sequence {
            schema: self.target_schema(sequence.schema.as_deref()),
            ..sequence.clone()
        }
    }
}

/// Explicit schema names used by tables, history tables and sequences
fn schema_names(model: &SchemaModel) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for table in &model.tables {
        if let Some(schema) = model.effective_schema(table.schema.as_deref()) {
            names.insert(schema.to_string());
        }
        if let Some(temporal) = &table.temporal {
            if let Some(schema) = model.effective_schema(temporal.history_schema.as_deref()) {
                names.insert(schema.to_string());
            }
        }
    }
    for sequence in &model.sequences {
        if let Some(schema) = model.effective_schema(sequence.schema.as_deref()) {
            names.insert(schema.to_string());
        }
    }
    names
}

pub(crate) fn key_definition(table: &Table, key: &PrimaryKey) -> KeyDefinition {
    KeyDefinition {
        name: key.name.clone(),
        columns: table.column_names(&key.columns),
        clustered: key.clustered,
    }
}

pub(crate) fn unique_definition(table: &Table, key: &UniqueConstraint) -> KeyDefinition {
    KeyDefinition {
        name: key.name.clone(),
        columns: table.column_names(&key.columns),
        clustered: None,
    }
}

pub(crate) fn index_definition(table: &Table, index: &Index) -> IndexDefinition {
    IndexDefinition {
        name: index.name.clone(),
        columns: table.column_names(&index.columns),
        unique: index.unique,
        filter: index.filter.clone(),
        include: table.column_names(&index.include),
        clustered: index.clustered,
        fill_factor: index.fill_factor,
        online: index.online,
    }
}

pub(crate) fn foreign_key_definition(
    model: &SchemaModel,
    table: &Table,
    foreign_key: &ForeignKey,
) -> ForeignKeyDefinition {
    let principal = model.table(&foreign_key.principal_table);
    ForeignKeyDefinition {
        name: foreign_key.name.clone(),
        columns: table.column_names(&foreign_key.columns),
        principal_schema: principal
            .and_then(|p| model.effective_schema(p.schema.as_deref()))
            .map(str::to_string),
        principal_table: principal
            .map(|p| p.name.clone())
            .unwrap_or_else(|| foreign_key.principal_table.clone()),
        principal_columns: match principal {
            Some(p) => p.column_names(&foreign_key.principal_columns),
            None => foreign_key.principal_columns.clone(),
        },
        on_delete: foreign_key.on_delete,
    }
}

pub(crate) fn temporal_definition(model: &SchemaModel, table: &Table) -> Option<TemporalDefinition> {
    let temporal = table.temporal.as_ref()?;
    let name_of = |id: &String| {
        table
            .column(id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.clone())
    };
    Some(TemporalDefinition {
        history_table: temporal.history_table.clone(),
        history_schema: model
            .effective_schema(temporal.history_schema.as_deref())
            .map(str::to_string),
        period_start: name_of(&temporal.period_start),
        period_end: name_of(&temporal.period_end),
    })
}
