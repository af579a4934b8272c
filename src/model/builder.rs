//! Fluent construction of schema models
//!
//! ```ignore
//! let model = ModelBuilder::new()
//!     .default_schema("dbo")
//!     .table("People", |t| {
//!         t.column("Id", LogicalType::Int32).identity(1, 1);
//!         t.column("Name", LogicalType::String).nullable();
//!         t.primary_key("PK_People", &["Id"]);
//!     })
//!     .build()?;
//! ```
//!
//! Columns in key, index and foreign key lists are referenced by column id,
//! which is the column name unless overridden with `.id(..)`.

use std::collections::HashSet;

use super::{
    CheckConstraint, Column, ColumnDefault, ComputedColumn, ForeignKey, IdentitySpec, Index,
    LogicalType, PeriodBoundary, PrimaryKey, ReferentialAction, SchemaModel, SeedRow, Sequence,
    SqlValue, Table, TemporalTable, UniqueConstraint, ValueGeneration,
};
use crate::error::MigrationError;

/// Length given to string key columns without an explicit max length
const STRING_KEY_LENGTH: u32 = 450;
/// Length given to binary key columns without an explicit max length
const BINARY_KEY_LENGTH: u32 = 900;

/// Builder for a [`SchemaModel`]
#[derive(Debug, Default)]
pub struct ModelBuilder {
    model: SchemaModel,
    errors: Vec<String>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_schema(mut self, schema: impl Into<String>) -> Self {
        self.model.default_schema = Some(schema.into());
        self
    }

    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.model.collation = Some(collation.into());
        self
    }

    /// Add a table, configured by the closure
    pub fn table(mut self, name: &str, configure: impl FnOnce(&mut TableBuilder)) -> Self {
        let mut builder = TableBuilder {
            table: Table::new(name),
            errors: Vec::new(),
        };
        configure(&mut builder);
        self.errors.extend(builder.errors);
        self.model.tables.push(builder.table);
        self
    }

    /// Add a sequence, configured by the closure
    pub fn sequence(mut self, name: &str, configure: impl FnOnce(&mut SequenceBuilder)) -> Self {
        let mut builder = SequenceBuilder {
            sequence: Sequence::new(name),
        };
        configure(&mut builder);
        self.model.sequences.push(builder.sequence);
        self
    }

    /// Finish the model: materialize temporal period columns, apply key
    /// length facets and validate.
    pub fn build(mut self) -> Result<SchemaModel, MigrationError> {
        if let Some(message) = self.errors.into_iter().next() {
            return Err(MigrationError::InvalidModel { message });
        }
        for table in &mut self.model.tables {
            materialize_period_columns(table);
            apply_key_lengths(table);
        }
        self.model.validate()?;
        Ok(self.model)
    }
}

fn materialize_period_columns(table: &mut Table) {
    let Some(temporal) = table.temporal.clone() else {
        return;
    };
    for (id, boundary) in [
        (&temporal.period_start, PeriodBoundary::Start),
        (&temporal.period_end, PeriodBoundary::End),
    ] {
        match table.columns.iter_mut().find(|c| &c.id == id) {
            Some(column) => column.period = Some(boundary),
            None => {
                let mut column = Column::new(id.clone(), LogicalType::DateTime);
                column.value_generation = ValueGeneration::OnAddOrUpdate;
                column.period = Some(boundary);
                table.columns.push(column);
            }
        }
    }
}

fn apply_key_lengths(table: &mut Table) {
    let mut key_columns: HashSet<String> = HashSet::new();
    if let Some(pk) = &table.primary_key {
        key_columns.extend(pk.columns.iter().cloned());
    }
    for unique in &table.unique_constraints {
        key_columns.extend(unique.columns.iter().cloned());
    }
    for index in &table.indexes {
        key_columns.extend(index.columns.iter().cloned());
    }
    for fk in &table.foreign_keys {
        key_columns.extend(fk.columns.iter().cloned());
    }

    for column in &mut table.columns {
        if column.store_type.is_some() || column.max_length.is_some() {
            continue;
        }
        if !key_columns.contains(&column.id) {
            continue;
        }
        match column.logical_type {
            LogicalType::String => column.max_length = Some(STRING_KEY_LENGTH),
            LogicalType::Binary => column.max_length = Some(BINARY_KEY_LENGTH),
            _ => {}
        }
    }
}

/// Builder for one table
#[derive(Debug)]
pub struct TableBuilder {
    table: Table,
    errors: Vec<String>,
}

impl TableBuilder {
    /// Override the stable identity used to correlate the table across snapshots
    pub fn id(&mut self, id: &str) -> &mut Self {
        self.table.id = id.to_string();
        self
    }

    pub fn schema(&mut self, schema: &str) -> &mut Self {
        self.table.schema = Some(schema.to_string());
        self
    }

    pub fn comment(&mut self, comment: &str) -> &mut Self {
        self.table.comment = Some(comment.to_string());
        self
    }

    pub fn memory_optimized(&mut self) -> &mut Self {
        self.table.memory_optimized = true;
        self
    }

    pub fn column(&mut self, name: &str, logical_type: LogicalType) -> ColumnBuilder<'_> {
        self.table.columns.push(Column::new(name, logical_type));
        let len = self.table.columns.len();
        ColumnBuilder {
            column: &mut self.table.columns[len - 1],
        }
    }

    pub fn primary_key(&mut self, name: &str, columns: &[&str]) -> KeyBuilder<'_> {
        if self.table.primary_key.is_some() {
            self.errors.push(format!(
                "table '{}' already has a primary key",
                self.table.name
            ));
        }
        self.table.primary_key = Some(PrimaryKey {
            id: name.to_string(),
            name: name.to_string(),
            columns: to_strings(columns),
            clustered: None,
        });
        KeyBuilder {
            table: &mut self.table,
        }
    }

    pub fn unique(&mut self, name: &str, columns: &[&str]) -> &mut Self {
        self.table.unique_constraints.push(UniqueConstraint {
            id: name.to_string(),
            name: name.to_string(),
            columns: to_strings(columns),
        });
        self
    }

    pub fn check(&mut self, name: &str, sql: &str) -> &mut Self {
        self.table.check_constraints.push(CheckConstraint {
            id: name.to_string(),
            name: name.to_string(),
            sql: sql.to_string(),
        });
        self
    }

    pub fn index(&mut self, name: &str, columns: &[&str]) -> IndexBuilder<'_> {
        self.table.indexes.push(Index {
            id: name.to_string(),
            name: name.to_string(),
            columns: to_strings(columns),
            unique: false,
            filter: None,
            include: Vec::new(),
            clustered: None,
            fill_factor: None,
            online: false,
        });
        let len = self.table.indexes.len();
        IndexBuilder {
            index: &mut self.table.indexes[len - 1],
        }
    }

    pub fn foreign_key(
        &mut self,
        name: &str,
        columns: &[&str],
        principal_table: &str,
        principal_columns: &[&str],
    ) -> ForeignKeyBuilder<'_> {
        self.table.foreign_keys.push(ForeignKey {
            id: name.to_string(),
            name: name.to_string(),
            columns: to_strings(columns),
            principal_table: principal_table.to_string(),
            principal_columns: to_strings(principal_columns),
            on_delete: ReferentialAction::default(),
        });
        let len = self.table.foreign_keys.len();
        ForeignKeyBuilder {
            foreign_key: &mut self.table.foreign_keys[len - 1],
        }
    }

    /// Make the table system-versioned. Period columns that do not exist
    /// yet are added as `datetime2` columns when the model is built.
    pub fn temporal(
        &mut self,
        history_table: &str,
        period_start: &str,
        period_end: &str,
    ) -> TemporalBuilder<'_> {
        self.table.temporal = Some(TemporalTable {
            history_table: history_table.to_string(),
            history_schema: None,
            period_start: period_start.to_string(),
            period_end: period_end.to_string(),
        });
        TemporalBuilder {
            temporal: self.table.temporal.as_mut(),
        }
    }

    /// Add a seed row; values are keyed by column id
    pub fn seed(&mut self, values: &[(&str, SqlValue)]) -> &mut Self {
        let row: SeedRow = values
            .iter()
            .map(|(column, value)| (column.to_string(), value.clone()))
            .collect();
        self.table.seed_data.push(row);
        self
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Builder for a column
pub struct ColumnBuilder<'a> {
    column: &'a mut Column,
}

impl ColumnBuilder<'_> {
    pub fn id(self, id: &str) -> Self {
        self.column.id = id.to_string();
        self
    }

    pub fn nullable(self) -> Self {
        self.column.nullable = true;
        self
    }

    pub fn store_type(self, store_type: &str) -> Self {
        self.column.store_type = Some(store_type.to_string());
        self
    }

    pub fn max_length(self, max_length: u32) -> Self {
        self.column.max_length = Some(max_length);
        self
    }

    pub fn precision(self, precision: u8, scale: u8) -> Self {
        self.column.precision = Some(precision);
        self.column.scale = Some(scale);
        self
    }

    pub fn ansi(self) -> Self {
        self.column.unicode = Some(false);
        self
    }

    pub fn fixed_length(self) -> Self {
        self.column.fixed_length = true;
        self
    }

    pub fn default_value(self, value: impl Into<SqlValue>) -> Self {
        self.column.default = Some(ColumnDefault::Value(value.into()));
        self
    }

    pub fn default_sql(self, sql: &str) -> Self {
        self.column.default = Some(ColumnDefault::Sql(sql.to_string()));
        self
    }

    pub fn computed(self, sql: &str, stored: bool) -> Self {
        self.column.computed = Some(ComputedColumn {
            sql: sql.to_string(),
            stored,
        });
        self.column.value_generation = ValueGeneration::OnAddOrUpdate;
        self
    }

    pub fn identity(self, seed: i64, increment: i64) -> Self {
        self.column.identity = Some(IdentitySpec { seed, increment });
        self.column.value_generation = ValueGeneration::OnAdd;
        self
    }

    pub fn collation(self, collation: &str) -> Self {
        self.column.collation = Some(collation.to_string());
        self
    }

    pub fn comment(self, comment: &str) -> Self {
        self.column.comment = Some(comment.to_string());
        self
    }

    pub fn row_version(self) -> Self {
        self.column.is_row_version = true;
        self.column.value_generation = ValueGeneration::OnAddOrUpdate;
        self
    }

    pub fn sparse(self) -> Self {
        self.column.is_sparse = true;
        self
    }
}

/// Builder for a primary key
pub struct KeyBuilder<'a> {
    table: &'a mut Table,
}

impl KeyBuilder<'_> {
    pub fn id(self, id: &str) -> Self {
        if let Some(pk) = self.table.primary_key.as_mut() {
            pk.id = id.to_string();
        }
        self
    }

    pub fn clustered(self, clustered: bool) -> Self {
        if let Some(pk) = self.table.primary_key.as_mut() {
            pk.clustered = Some(clustered);
        }
        self
    }
}

/// Builder for an index
pub struct IndexBuilder<'a> {
    index: &'a mut Index,
}

impl IndexBuilder<'_> {
    pub fn id(self, id: &str) -> Self {
        self.index.id = id.to_string();
        self
    }

    pub fn unique(self) -> Self {
        self.index.unique = true;
        self
    }

    pub fn filter(self, sql: &str) -> Self {
        self.index.filter = Some(sql.to_string());
        self
    }

    pub fn include(self, columns: &[&str]) -> Self {
        self.index.include = to_strings(columns);
        self
    }

    pub fn clustered(self, clustered: bool) -> Self {
        self.index.clustered = Some(clustered);
        self
    }

    pub fn fill_factor(self, fill_factor: u8) -> Self {
        self.index.fill_factor = Some(fill_factor);
        self
    }

    pub fn online(self) -> Self {
        self.index.online = true;
        self
    }
}

/// Builder for a foreign key
pub struct ForeignKeyBuilder<'a> {
    foreign_key: &'a mut ForeignKey,
}

impl ForeignKeyBuilder<'_> {
    pub fn id(self, id: &str) -> Self {
        self.foreign_key.id = id.to_string();
        self
    }

    pub fn on_delete(self, action: ReferentialAction) -> Self {
        self.foreign_key.on_delete = action;
        self
    }
}

/// Builder for temporal table settings
pub struct TemporalBuilder<'a> {
    temporal: Option<&'a mut TemporalTable>,
}

impl TemporalBuilder<'_> {
    pub fn history_schema(mut self, schema: &str) -> Self {
        if let Some(temporal) = self.temporal.as_mut() {
            temporal.history_schema = Some(schema.to_string());
        }
        self
    }
}

/// Builder for a sequence
#[derive(Debug)]
pub struct SequenceBuilder {
    sequence: Sequence,
}

impl SequenceBuilder {
    pub fn id(&mut self, id: &str) -> &mut Self {
        self.sequence.id = id.to_string();
        self
    }

    pub fn schema(&mut self, schema: &str) -> &mut Self {
        self.sequence.schema = Some(schema.to_string());
        self
    }

    pub fn logical_type(&mut self, logical_type: LogicalType) -> &mut Self {
        self.sequence.logical_type = logical_type;
        self
    }

    pub fn start(&mut self, start: i64) -> &mut Self {
        self.sequence.start = start;
        self
    }

    pub fn increment(&mut self, increment: i64) -> &mut Self {
        self.sequence.increment = increment;
        self
    }

    pub fn min_value(&mut self, min_value: i64) -> &mut Self {
        self.sequence.min_value = Some(min_value);
        self
    }

    pub fn max_value(&mut self, max_value: i64) -> &mut Self {
        self.sequence.max_value = Some(max_value);
        self
    }

    pub fn cyclic(&mut self) -> &mut Self {
        self.sequence.cyclic = true;
        self
    }
}
