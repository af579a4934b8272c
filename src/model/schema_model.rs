//! Schema model representation

use std::collections::{BTreeMap, HashSet};

use super::{Sequence, Table};
use crate::error::MigrationError;

/// The complete schema of one database snapshot.
///
/// Built once (usually through [`super::ModelBuilder`]) and treated as
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaModel {
    /// Schema that unqualified objects live in (e.g. "dbo")
    pub default_schema: Option<String>,
    /// Database collation
    pub collation: Option<String>,
    pub tables: Vec<Table>,
    pub sequences: Vec<Sequence>,
}

/// Borrowed view of one schema and the objects it owns
#[derive(Debug)]
pub struct Schema<'a> {
    pub name: String,
    pub tables: Vec<&'a Table>,
    pub sequences: Vec<&'a Sequence>,
}

impl SchemaModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.sequences.is_empty()
    }

    pub fn table(&self, id: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.id == id)
    }

    pub fn sequence(&self, id: &str) -> Option<&Sequence> {
        self.sequences.iter().find(|s| s.id == id)
    }

    /// Schema of an object as seen by the differ: an object placed
    /// explicitly in the default schema counts as schema-less.
    pub fn effective_schema<'a>(&self, schema: Option<&'a str>) -> Option<&'a str> {
        match (schema, self.default_schema.as_deref()) {
            (Some(s), Some(default)) if s.eq_ignore_ascii_case(default) => None,
            (s, _) => s,
        }
    }

    /// Group tables and sequences by explicit schema name
    pub fn schemas(&self) -> Vec<Schema<'_>> {
        let mut by_name: BTreeMap<String, Schema<'_>> = BTreeMap::new();
        for table in &self.tables {
            if let Some(name) = self.effective_schema(table.schema.as_deref()) {
                by_name
                    .entry(name.to_string())
                    .or_insert_with(|| Schema {
                        name: name.to_string(),
                        tables: Vec::new(),
                        sequences: Vec::new(),
                    })
                    .tables
                    .push(table);
            }
        }
        for sequence in &self.sequences {
            if let Some(name) = self.effective_schema(sequence.schema.as_deref()) {
                by_name
                    .entry(name.to_string())
                    .or_insert_with(|| Schema {
                        name: name.to_string(),
                        tables: Vec::new(),
                        sequences: Vec::new(),
                    })
                    .sequences
                    .push(sequence);
            }
        }
        by_name.into_values().collect()
    }

    /// Check the structural invariants of the model
    pub fn validate(&self) -> Result<(), MigrationError> {
        let mut table_ids = HashSet::new();
        for table in &self.tables {
            if !table_ids.insert(table.id.as_str()) {
                return Err(MigrationError::invalid_model(format!(
                    "duplicate table id '{}'",
                    table.id
                )));
            }
            self.validate_table(table)?;
        }

        let mut sequence_ids = HashSet::new();
        for sequence in &self.sequences {
            if !sequence_ids.insert(sequence.id.as_str()) {
                return Err(MigrationError::invalid_model(format!(
                    "duplicate sequence id '{}'",
                    sequence.id
                )));
            }
            if sequence.increment == 0 {
                return Err(MigrationError::invalid_model(format!(
                    "sequence '{}' has a zero increment",
                    sequence.name
                )));
            }
        }
        Ok(())
    }

    fn validate_table(&self, table: &Table) -> Result<(), MigrationError> {
        let mut column_ids = HashSet::new();
        for column in &table.columns {
            if !column_ids.insert(column.id.as_str()) {
                return Err(MigrationError::invalid_model(format!(
                    "duplicate column id '{}' in table '{}'",
                    column.id, table.name
                )));
            }
            if column.is_identity() && column.default.is_some() {
                return Err(MigrationError::invalid_model(format!(
                    "identity column '{}.{}' cannot have a default",
                    table.name, column.name
                )));
            }
            if column.is_computed() && column.default.is_some() {
                return Err(MigrationError::invalid_model(format!(
                    "computed column '{}.{}' cannot have a default",
                    table.name, column.name
                )));
            }
            if column.is_computed() && column.is_identity() {
                return Err(MigrationError::invalid_model(format!(
                    "computed column '{}.{}' cannot be an identity column",
                    table.name, column.name
                )));
            }
        }

        let check_columns = |what: &str, name: &str, ids: &[String]| {
            if ids.is_empty() {
                return Err(MigrationError::invalid_model(format!(
                    "{} '{}' on table '{}' has no columns",
                    what, name, table.name
                )));
            }
            match ids.iter().find(|id| table.column(id).is_none()) {
                Some(missing) => Err(MigrationError::invalid_model(format!(
                    "{} '{}' references unknown column '{}' in table '{}'",
                    what, name, missing, table.name
                ))),
                None => Ok(()),
            }
        };

        if let Some(pk) = &table.primary_key {
            check_columns("primary key", &pk.name, &pk.columns)?;
        }
        for unique in &table.unique_constraints {
            check_columns("unique constraint", &unique.name, &unique.columns)?;
        }
        for index in &table.indexes {
            check_columns("index", &index.name, &index.columns)?;
            if let Some(missing) = index.include.iter().find(|id| table.column(id).is_none()) {
                return Err(MigrationError::invalid_model(format!(
                    "index '{}' includes unknown column '{}'",
                    index.name, missing
                )));
            }
        }
        for fk in &table.foreign_keys {
            check_columns("foreign key", &fk.name, &fk.columns)?;
            let principal = self.table(&fk.principal_table).ok_or_else(|| {
                MigrationError::invalid_model(format!(
                    "foreign key '{}' references unknown table '{}'",
                    fk.name, fk.principal_table
                ))
            })?;
            if fk.principal_columns.len() != fk.columns.len() {
                return Err(MigrationError::invalid_model(format!(
                    "foreign key '{}' has {} dependent but {} principal columns",
                    fk.name,
                    fk.columns.len(),
                    fk.principal_columns.len()
                )));
            }
            if let Some(missing) = fk
                .principal_columns
                .iter()
                .find(|id| principal.column(id).is_none())
            {
                return Err(MigrationError::invalid_model(format!(
                    "foreign key '{}' references unknown column '{}' in table '{}'",
                    fk.name, missing, principal.name
                )));
            }
        }
        if let Some(temporal) = &table.temporal {
            for period in [&temporal.period_start, &temporal.period_end] {
                if table.column(period).is_none() {
                    return Err(MigrationError::invalid_model(format!(
                        "temporal table '{}' references unknown period column '{}'",
                        table.name, period
                    )));
                }
            }
            if temporal.history_table.is_empty() {
                return Err(MigrationError::invalid_model(format!(
                    "temporal table '{}' has no history table",
                    table.name
                )));
            }
        }
        Ok(())
    }
}
