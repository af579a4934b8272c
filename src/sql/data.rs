//! Seed data: INSERT, UPDATE and DELETE

use super::builder::CommandListBuilder;
use super::generator::SqlGenerator;
use crate::model::SqlValue;
use crate::operations::{DeleteDataOperation, InsertDataOperation, UpdateDataOperation};

impl SqlGenerator<'_> {
    fn value_list(&self, values: &[SqlValue]) -> String {
        let literals: Vec<String> = values.iter().map(|v| self.dialect.literal(v, true)).collect();
        format!("({})", literals.join(", "))
    }

    fn where_clause(&self, columns: &[String], values: &[SqlValue]) -> String {
        let predicates: Vec<String> = columns
            .iter()
            .zip(values)
            .map(|(column, value)| {
                let column = self.dialect.delimit(column);
                if value.is_null() {
                    format!("{column} IS NULL")
                } else {
                    format!("{column} = {}", self.dialect.literal(value, true))
                }
            })
            .collect();
        format!("WHERE {}", predicates.join(" AND "))
    }

    fn identity_insert(&self, op: &InsertDataOperation, on: bool, b: &mut CommandListBuilder) {
        let table = self.dialect.qualify(&op.table, op.schema.as_deref());
        let names: Vec<String> = op.columns.iter().map(|c| self.literal(c)).collect();
        b.append_line(&format!(
            "IF EXISTS (SELECT * FROM [sys].[identity_columns] WHERE [name] IN ({}) AND [object_id] = OBJECT_ID({}))",
            names.join(", "),
            self.literal(&table)
        ))
        .increment_indent()
        .append_line(&format!(
            "SET IDENTITY_INSERT {table} {}{}",
            if on { "ON" } else { "OFF" },
            self.terminator()
        ))
        .decrement_indent();
    }

    /// One INSERT per `max_batch_size` rows
    pub(super) fn insert_data(&self, op: &InsertDataOperation, b: &mut CommandListBuilder) {
        if op.values.is_empty() {
            return;
        }
        if op.identity_insert {
            self.identity_insert(op, true, b);
        }
        let table = self.dialect.qualify(&op.table, op.schema.as_deref());
        let columns: Vec<String> = op.columns.iter().map(|c| self.dialect.delimit(c)).collect();
        for rows in op.values.chunks(self.options.max_batch_size.max(1)) {
            let values: Vec<String> = rows.iter().map(|row| self.value_list(row)).collect();
            let sql = format!(
                "INSERT INTO {table} ({})\nVALUES {}{}\n",
                columns.join(", "),
                values.join(",\n"),
                self.terminator()
            );
            self.append_exec_when_idempotent(&sql, b);
        }
        if op.identity_insert {
            self.identity_insert(op, false, b);
        }
    }

    pub(super) fn update_data(&self, op: &UpdateDataOperation, b: &mut CommandListBuilder) {
        let table = self.dialect.qualify(&op.table, op.schema.as_deref());
        for (keys, values) in op.key_values.iter().zip(&op.values) {
            let assignments: Vec<String> = op
                .columns
                .iter()
                .zip(values)
                .map(|(column, value)| {
                    format!(
                        "{} = {}",
                        self.dialect.delimit(column),
                        self.dialect.literal(value, true)
                    )
                })
                .collect();
            let sql = format!(
                "UPDATE {table} SET {}\n{}{}\n",
                assignments.join(", "),
                self.where_clause(&op.key_columns, keys),
                self.terminator()
            );
            self.append_exec_when_idempotent(&sql, b);
        }
    }

    pub(super) fn delete_data(&self, op: &DeleteDataOperation, b: &mut CommandListBuilder) {
        let table = self.dialect.qualify(&op.table, op.schema.as_deref());
        for keys in &op.key_values {
            let sql = format!(
                "DELETE FROM {table}\n{}{}\n",
                self.where_clause(&op.key_columns, keys),
                self.terminator()
            );
            self.append_exec_when_idempotent(&sql, b);
        }
    }
}
