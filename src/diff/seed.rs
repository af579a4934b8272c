//! Seed data diffing, keyed by primary-key values

use std::collections::HashSet;

use super::Differ;
use crate::error::MigrationError;
use crate::model::{SchemaModel, SeedRow, SqlValue, Table};
use crate::operations::{DeleteDataOperation, InsertDataOperation, Operation, UpdateDataOperation};

impl<'a> Differ<'a> {
    /// Emit insert/update/delete operations for seed rows. Inserts follow
    /// foreign-key order (principal tables first); deletes run in reverse.
    pub(super) fn diff_seed_data(&mut self) -> Result<(), MigrationError> {
        let order = dependency_order(self.target);
        let mut deletes = Vec::new();

        for table in order {
            let source = self.source.table(&table.id);
            let source_rows: &[SeedRow] = source.map(|s| s.seed_data.as_slice()).unwrap_or(&[]);
            if table.seed_data.is_empty() && source_rows.is_empty() {
                continue;
            }
            let key = seed_key(table)?;

            let mut inserts: Vec<&SeedRow> = Vec::new();
            for row in &table.seed_data {
                let values = key_values(row, &key);
                match source_rows.iter().find(|r| key_values(r, &key) == values) {
                    Some(old) => self.update_row(table, &key, &values, old, row),
                    None => inserts.push(row),
                }
            }
            self.insert_rows(table, &inserts);

            if let Some(source) = source {
                let removed: Vec<Vec<SqlValue>> = source_rows
                    .iter()
                    .map(|r| key_values(r, &key))
                    .filter(|values| {
                        !table
                            .seed_data
                            .iter()
                            .any(|r| &key_values(r, &key) == values)
                    })
                    .collect();
                if !removed.is_empty() {
                    deletes.push(Operation::DeleteData(DeleteDataOperation {
                        schema: self.source_schema(source.schema.as_deref()),
                        table: source.name.clone(),
                        key_columns: source.column_names(&key),
                        key_values: removed,
                    }));
                }
            }
        }

        deletes.reverse();
        self.operations.extend(deletes);
        Ok(())
    }

    fn update_row(
        &mut self,
        table: &Table,
        key: &[String],
        key_values: &[SqlValue],
        old: &SeedRow,
        new: &SeedRow,
    ) {
        let changed: Vec<&String> = table
            .columns
            .iter()
            .map(|c| &c.id)
            .filter(|id| !key.contains(id))
            .filter(|id| new.get(*id) != old.get(*id))
            .collect();
        if changed.is_empty() {
            return;
        }
        let ids: Vec<String> = changed.iter().map(|id| id.to_string()).collect();
        self.push(Operation::UpdateData(UpdateDataOperation {
            schema: self.target_schema(table.schema.as_deref()),
            table: table.name.clone(),
            key_columns: table.column_names(key),
            key_values: vec![key_values.to_vec()],
            columns: table.column_names(&ids),
            values: vec![ids
                .iter()
                .map(|id| new.get(id).cloned().unwrap_or(SqlValue::Null))
                .collect()],
        }));
    }

    /// One insert per run of rows sharing the same column set
    fn insert_rows(&mut self, table: &Table, rows: &[&SeedRow]) {
        let mut current: Option<(Vec<String>, Vec<Vec<SqlValue>>)> = None;
        for row in rows {
            let ids: Vec<String> = table
                .columns
                .iter()
                .filter(|c| row.contains_key(&c.id))
                .map(|c| c.id.clone())
                .collect();
            let values: Vec<SqlValue> = ids
                .iter()
                .map(|id| row.get(id).cloned().unwrap_or(SqlValue::Null))
                .collect();
            let same_columns = matches!(&current, Some((columns, _)) if *columns == ids);
            if same_columns {
                if let Some((_, batch)) = current.as_mut() {
                    batch.push(values);
                }
                continue;
            }
            if let Some((columns, batch)) = current.take() {
                self.push_insert(table, &columns, batch);
            }
            current = Some((ids, vec![values]));
        }
        if let Some((columns, batch)) = current {
            self.push_insert(table, &columns, batch);
        }
    }

    fn push_insert(&mut self, table: &Table, ids: &[String], values: Vec<Vec<SqlValue>>) {
        let identity_insert = ids
            .iter()
            .any(|id| table.column(id).map(|c| c.is_identity()).unwrap_or(false));
        self.push(Operation::InsertData(InsertDataOperation {
            schema: self.target_schema(table.schema.as_deref()),
            table: table.name.clone(),
            columns: table.column_names(ids),
            values,
            identity_insert,
        }));
    }
}

fn seed_key(table: &Table) -> Result<Vec<String>, MigrationError> {
    table
        .primary_key
        .as_ref()
        .map(|pk| pk.columns.clone())
        .ok_or_else(|| {
            MigrationError::invalid_model(format!(
                "table '{}' has seed data but no primary key",
                table.name
            ))
        })
}

fn key_values(row: &SeedRow, key: &[String]) -> Vec<SqlValue> {
    key.iter()
        .map(|id| row.get(id).cloned().unwrap_or(SqlValue::Null))
        .collect()
}

/// Tables ordered so that principal tables precede their dependents.
/// Cycles are cut at the first revisited table.
fn dependency_order(model: &SchemaModel) -> Vec<&Table> {
    fn visit<'m>(
        model: &'m SchemaModel,
        table: &'m Table,
        visited: &mut HashSet<&'m str>,
        order: &mut Vec<&'m Table>,
    ) {
        if !visited.insert(table.id.as_str()) {
            return;
        }
        for fk in &table.foreign_keys {
            if fk.principal_table == table.id {
                continue;
            }
            if let Some(principal) = model.table(&fk.principal_table) {
                visit(model, principal, visited, order);
            }
        }
        order.push(table);
    }

    let mut visited = HashSet::new();
    let mut order = Vec::with_capacity(model.tables.len());
    for table in &model.tables {
        visit(model, table, &mut visited, &mut order);
    }
    order
}
