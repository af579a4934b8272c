//! System-versioning transitions of temporal tables
//!
//! Every change to a temporal table is bracketed by turning versioning off
//! and back on; the scheduler keeps the re-enable as the last operation
//! touching the table.

use super::table::{HistoryNames, TablePair};
use super::{temporal_definition, Differ};
use crate::operations::{
    AddPeriodOperation, DropTableOperation, EnableSystemVersioningOperation, MoveTableOperation,
    Operation, RenameTableOperation, SystemVersioningOperation,
};

impl<'a> Differ<'a> {
    /// Compose the versioning operations for one correlated table.
    ///
    /// `start` is the index of the first operation produced for the table
    /// and `mirrored` the column changes to replay on its history table.
    pub(super) fn diff_temporal(
        &mut self,
        pair: &TablePair<'_>,
        history: Option<&HistoryNames>,
        start: usize,
        mirrored: Vec<Operation>,
    ) {
        let (source, target) = (pair.source, pair.target);
        let source_temporal = temporal_definition(self.source, source);
        let target_temporal = temporal_definition(self.target, target);

        match (source_temporal, target_temporal) {
            (None, None) => {}
            (None, Some(temporal)) => {
                self.push(Operation::AddPeriod(AddPeriodOperation {
                    schema: pair.target_schema.clone(),
                    table: target.name.clone(),
                    period_start: temporal.period_start,
                    period_end: temporal.period_end,
                }));
                self.push(Operation::EnableSystemVersioning(
                    EnableSystemVersioningOperation {
                        schema: pair.target_schema.clone(),
                        table: target.name.clone(),
                        history_table: temporal.history_table,
                        history_schema: temporal.history_schema,
                    },
                ));
            }
            (Some(temporal), None) => {
                let versioning = SystemVersioningOperation {
                    schema: pair.source_schema.clone(),
                    table: source.name.clone(),
                };
                self.push(Operation::DisableSystemVersioning(versioning.clone()));
                self.push(Operation::DropPeriod(versioning));
                self.push(Operation::DropTable(DropTableOperation {
                    schema: temporal.history_schema,
                    name: temporal.history_table,
                    foreign_keys: Vec::new(),
                    memory_optimized: false,
                }));
            }
            (Some(_), Some(temporal)) => {
                let Some(history) = history else {
                    return;
                };
                let history_changed = self.diff_history_table(history);
                let structural = history_changed
                    || !mirrored.is_empty()
                    || self.operations[start..].iter().any(is_structural);
                if !structural {
                    return;
                }

                self.push(Operation::DisableSystemVersioning(SystemVersioningOperation {
                    schema: pair.source_schema.clone(),
                    table: source.name.clone(),
                }));
                self.operations.extend(mirrored);
                self.push(Operation::EnableSystemVersioning(
                    EnableSystemVersioningOperation {
                        schema: pair.target_schema.clone(),
                        table: target.name.clone(),
                        history_table: temporal.history_table,
                        history_schema: temporal.history_schema,
                    },
                ));
            }
        }
    }

    /// Rename or move the history table. Returns whether anything changed.
    fn diff_history_table(&mut self, history: &HistoryNames) -> bool {
        let mut changed = false;
        if history.source_name != history.target_name {
            self.push(Operation::RenameTable(RenameTableOperation {
                schema: history.source_schema.clone(),
                name: history.source_name.clone(),
                new_name: history.target_name.clone(),
            }));
            changed = true;
        }
        if history.source_schema != history.target_schema {
            self.push(Operation::MoveTable(MoveTableOperation {
                schema: history.source_schema.clone(),
                name: history.target_name.clone(),
                new_schema: history.target_schema.clone(),
            }));
            changed = true;
        }
        changed
    }
}

/// Changes SQL Server rejects while SYSTEM_VERSIONING is ON
fn is_structural(operation: &Operation) -> bool {
    matches!(
        operation,
        Operation::RenameTable(_)
            | Operation::MoveTable(_)
            | Operation::AddColumn(_)
            | Operation::DropColumn(_)
            | Operation::AlterColumn(_)
            | Operation::RenameColumn(_)
            | Operation::AddPrimaryKey(_)
            | Operation::DropPrimaryKey(_)
    )
}
