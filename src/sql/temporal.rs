//! System-versioned (temporal) tables

use super::builder::CommandListBuilder;
use super::generator::SqlGenerator;
use crate::operations::{
    AddPeriodOperation, CreateTableOperation, EnableSystemVersioningOperation,
    SystemVersioningOperation, TemporalDefinition,
};

impl SqlGenerator<'_> {
    /// CREATE TABLE with versioning switched on. Without a history schema
    /// the history table lands in the caller's default schema, resolved at
    /// run time.
    pub(super) fn create_temporal_table(
        &self,
        op: &CreateTableOperation,
        temporal: &TemporalDefinition,
        b: &mut CommandListBuilder,
    ) {
        let mut head = CommandListBuilder::new();
        self.create_table_head(op, &mut head);
        let head = head.take_pending();

        match &temporal.history_schema {
            Some(history_schema) => {
                b.append(&head).append_line(&format!(
                    " WITH (SYSTEM_VERSIONING = ON (HISTORY_TABLE = {})){}",
                    self.dialect
                        .qualify(&temporal.history_table, Some(history_schema)),
                    self.terminator()
                ));
            }
            None => {
                b.append_line("DECLARE @historyTableSchema sysname = SCHEMA_NAME()")
                    .append("EXEC(N'")
                    .append(&head.replace('\'', "''"))
                    .append(" WITH (SYSTEM_VERSIONING = ON (HISTORY_TABLE = [' + @historyTableSchema + N'].")
                    .append(&self.dialect.delimit(&temporal.history_table).replace('\'', "''"))
                    .append("))')")
                    .append_line(self.terminator());
            }
        }
    }

    pub(super) fn disable_versioning(
        &self,
        op: &SystemVersioningOperation,
        b: &mut CommandListBuilder,
    ) {
        b.append_line(&format!(
            "ALTER TABLE {} SET (SYSTEM_VERSIONING = OFF){}",
            self.dialect.qualify(&op.table, op.schema.as_deref()),
            self.terminator()
        ));
    }

    pub(super) fn enable_versioning(
        &self,
        op: &EnableSystemVersioningOperation,
        b: &mut CommandListBuilder,
    ) {
        let table = self.dialect.qualify(&op.table, op.schema.as_deref());
        match &op.history_schema {
            Some(history_schema) => {
                b.append_line(&format!(
                    "ALTER TABLE {table} SET (SYSTEM_VERSIONING = ON (HISTORY_TABLE = {})){}",
                    self.dialect.qualify(&op.history_table, Some(history_schema)),
                    self.terminator()
                ));
            }
            None => {
                b.append_line("DECLARE @historyTableSchema sysname = SCHEMA_NAME()")
                    .append_line(&format!(
                        "EXEC(N'ALTER TABLE {} SET (SYSTEM_VERSIONING = ON (HISTORY_TABLE = [' + @historyTableSchema + '].{}))'){}",
                        table.replace('\'', "''"),
                        self.dialect.delimit(&op.history_table).replace('\'', "''"),
                        self.terminator()
                    ));
            }
        }
    }

    pub(super) fn add_period(&self, op: &AddPeriodOperation, b: &mut CommandListBuilder) {
        b.append_line(&format!(
            "ALTER TABLE {} ADD PERIOD FOR SYSTEM_TIME ({}, {}){}",
            self.dialect.qualify(&op.table, op.schema.as_deref()),
            self.dialect.delimit(&op.period_start),
            self.dialect.delimit(&op.period_end),
            self.terminator()
        ));
    }

    pub(super) fn drop_period(&self, op: &SystemVersioningOperation, b: &mut CommandListBuilder) {
        b.append_line(&format!(
            "ALTER TABLE {} DROP PERIOD FOR SYSTEM_TIME{}",
            self.dialect.qualify(&op.table, op.schema.as_deref()),
            self.terminator()
        ));
    }
}
