//! Coarse execution phases
//!
//! Operations are first ranked by phase; finer ordering inside the table,
//! foreign key and rename phases is done with a dependency graph.

use crate::operations::Operation;

/// Phases in execution order. Drops and renames that still use the source
/// names run before anything that uses the target names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Phase {
    CreateDatabase,
    DropForeignKeys,
    DisableVersioning,
    DropConstraints,
    DeleteData,
    DropColumns,
    DropTables,
    DropSequences,
    EnsureSchemas,
    RenameTables,
    RenameObjects,
    AlterDatabase,
    CreateSequences,
    AlterTables,
    Columns,
    ComputedColumns,
    AddDefaults,
    AlterConstraints,
    CreateTables,
    AddPeriods,
    Constraints,
    Data,
    EnableVersioning,
    DropSchemas,
    Other,
}

impl Phase {
    pub(crate) fn of(operation: &Operation) -> Phase {
        match operation {
            Operation::CreateDatabase(_) => Phase::CreateDatabase,
            Operation::DropForeignKey(_) => Phase::DropForeignKeys,
            Operation::DisableSystemVersioning(_) | Operation::DropPeriod(_) => {
                Phase::DisableVersioning
            }
            Operation::DropIndex(_)
            | Operation::DropPrimaryKey(_)
            | Operation::DropUniqueConstraint(_)
            | Operation::DropCheckConstraint(_)
            | Operation::DropDefaultConstraint(_) => Phase::DropConstraints,
            Operation::DeleteData(_) => Phase::DeleteData,
            Operation::DropColumn(_) => Phase::DropColumns,
            Operation::DropTable(_) => Phase::DropTables,
            Operation::DropSequence(_) => Phase::DropSequences,
            Operation::EnsureSchema(_) => Phase::EnsureSchemas,
            Operation::RenameTable(_) | Operation::MoveTable(_) => Phase::RenameTables,
            Operation::RenameColumn(_)
            | Operation::RenameIndex(_)
            | Operation::RenameSequence(_)
            | Operation::MoveSequence(_) => Phase::RenameObjects,
            Operation::AlterDatabase(_) => Phase::AlterDatabase,
            Operation::CreateSequence(_) => Phase::CreateSequences,
            Operation::AlterTable(_) => Phase::AlterTables,
            Operation::AddColumn(op) if op.column.is_computed() => Phase::ComputedColumns,
            Operation::AddColumn(_) | Operation::AlterColumn(_) => Phase::Columns,
            Operation::AddDefaultConstraint(_) => Phase::AddDefaults,
            Operation::AddPrimaryKey(_)
            | Operation::AddUniqueConstraint(_)
            | Operation::AlterSequence(_)
            | Operation::RestartSequence(_) => Phase::AlterConstraints,
            Operation::CreateTable(_) => Phase::CreateTables,
            Operation::AddPeriod(_) => Phase::AddPeriods,
            Operation::CreateIndex(_)
            | Operation::AddForeignKey(_)
            | Operation::AddCheckConstraint(_) => Phase::Constraints,
            Operation::InsertData(_) | Operation::UpdateData(_) => Phase::Data,
            Operation::EnableSystemVersioning(_) => Phase::EnableVersioning,
            Operation::DropSchema(_) => Phase::DropSchemas,
            Operation::DropDatabase(_) | Operation::Sql(_) => Phase::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{DropConstraintOperation, EnsureSchemaOperation};

    #[test]
    fn test_schema_before_renames_and_drops_first() {
        let ensure = Operation::EnsureSchema(EnsureSchemaOperation {
            name: "sales".to_string(),
        });
        let drop_fk = Operation::DropForeignKey(DropConstraintOperation {
            schema: None,
            table: "Orders".to_string(),
            name: "FK_Orders_Customers".to_string(),
        });
        assert!(Phase::of(&drop_fk) < Phase::of(&ensure));
        assert!(Phase::of(&ensure) < Phase::RenameTables);
        assert!(Phase::AddDefaults < Phase::Constraints);
    }
}
