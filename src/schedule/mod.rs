//! Operation scheduler
//!
//! Orders an unordered bag of operations into an executable sequence and
//! groups it into batches. Ordering is done in two steps: every operation
//! is ranked by [`Phase`], then the phases with internal dependencies
//! (table creation, table drops and renames) are sorted topologically.
//! Ties always keep the incoming order, so the same diff schedules the
//! same way every time.

mod graph;
mod phase;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::MigrationError;
use crate::operations::{AddForeignKeyOperation, DropConstraintOperation, Operation};

use graph::DependencyGraph;
pub(crate) use phase::Phase;

/// Consecutive operations executed together
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub operations: Vec<Operation>,
    /// Whether the batch may run inside a transaction
    pub transactional: bool,
}

impl Batch {
    fn transactional(operations: Vec<Operation>) -> Self {
        Self {
            operations,
            transactional: true,
        }
    }

    fn isolated(operation: Operation) -> Self {
        Self {
            operations: vec![operation],
            transactional: false,
        }
    }
}

/// Order the operations and group them into batches
pub fn schedule(operations: Vec<Operation>) -> Result<Vec<Batch>, MigrationError> {
    let ordered = order(operations)?;
    let batches = batch(ordered);
    debug!(batches = batches.len(), "scheduled operations");
    Ok(batches)
}

/// Put the operations in an order that satisfies every dependency.
///
/// Foreign keys that form a cycle between created tables are split out of
/// `CreateTable` and attached afterwards with `AddForeignKey`; the same
/// happens with `DropForeignKey` for cycles between dropped tables.
pub fn order(operations: Vec<Operation>) -> Result<Vec<Operation>, MigrationError> {
    let total = operations.len();
    let mut phases: BTreeMap<Phase, Vec<Operation>> = BTreeMap::new();
    for operation in operations {
        phases.entry(Phase::of(&operation)).or_default().push(operation);
    }

    if let Some(drops) = phases.remove(&Phase::DropTables) {
        let (drops, deferred) = order_drop_tables(drops)?;
        phases.entry(Phase::DropForeignKeys).or_default().extend(deferred);
        phases.insert(Phase::DropTables, drops);
    }
    if let Some(creates) = phases.remove(&Phase::CreateTables) {
        let (creates, deferred) = order_create_tables(creates)?;
        phases.entry(Phase::Constraints).or_default().extend(deferred);
        phases.insert(Phase::CreateTables, creates);
    }
    for phase in [Phase::RenameTables, Phase::RenameObjects] {
        if let Some(renames) = phases.remove(&phase) {
            phases.insert(phase, order_renames(renames)?);
        }
    }

    let ordered: Vec<Operation> = phases.into_values().flatten().collect();
    debug!(
        operations = total,
        ordered = ordered.len(),
        "ordered migration operations"
    );
    Ok(ordered)
}

/// Group already ordered operations into batches. Operations that cannot
/// run inside a transaction get a batch of their own.
pub fn batch(operations: Vec<Operation>) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut current = Vec::new();
    for operation in operations {
        if operation.suppresses_transaction() {
            if !current.is_empty() {
                batches.push(Batch::transactional(std::mem::take(&mut current)));
            }
            batches.push(Batch::isolated(operation));
        } else {
            current.push(operation);
        }
    }
    if !current.is_empty() {
        batches.push(Batch::transactional(current));
    }
    batches
}

fn table_key(schema: Option<&str>, name: &str) -> String {
    format!("{}.{}", schema.unwrap_or_default(), name).to_lowercase()
}

fn display_name(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) => format!("{schema}.{name}"),
        None => name.to_string(),
    }
}

fn operation_table_key(operation: &Operation) -> String {
    operation
        .table()
        .map(|(schema, name)| table_key(schema, name))
        .unwrap_or_default()
}

fn reorder(operations: Vec<Operation>, order: &[usize]) -> Vec<Operation> {
    let mut slots: Vec<Option<Operation>> = operations.into_iter().map(Some).collect();
    order.iter().filter_map(|&i| slots[i].take()).collect()
}

fn cycle_participants(operations: &[Operation], cycle: &[usize]) -> Vec<String> {
    cycle
        .iter()
        .filter_map(|&i| operations[i].table())
        .map(|(schema, name)| display_name(schema, name))
        .collect()
}

/// Pick the edge to cut in a cycle: the one entering the vertex with the
/// highest index, so the table that came last in the bag gets deferred.
fn edge_into_last(cycle: &[usize]) -> Option<(usize, usize)> {
    let (position, &vertex) = cycle.iter().enumerate().max_by_key(|(_, v)| **v)?;
    let previous = cycle[(position + cycle.len() - 1) % cycle.len()];
    Some((previous, vertex))
}

// ============================================================================
// Table creation
// ============================================================================

/// Principal tables are created before their dependents
fn order_create_tables(
    mut creates: Vec<Operation>,
) -> Result<(Vec<Operation>, Vec<Operation>), MigrationError> {
    let keys: Vec<String> = creates.iter().map(operation_table_key).collect();
    let mut graph = DependencyGraph::new(creates.len());
    for (dependent, operation) in creates.iter().enumerate() {
        let Operation::CreateTable(create) = operation else {
            continue;
        };
        for fk in &create.foreign_keys {
            let principal = table_key(fk.principal_schema.as_deref(), &fk.principal_table);
            if let Some(principal) = keys.iter().position(|k| *k == principal) {
                graph.add_edge(principal, dependent);
            }
        }
    }

    let mut deferred = Vec::new();
    loop {
        let cycle = match graph.sort() {
            Ok(order) => return Ok((reorder(creates, &order), deferred)),
            Err(cycle) => cycle,
        };
        let Some((principal, dependent)) = edge_into_last(&cycle) else {
            return Err(MigrationError::CyclicDependency {
                participants: cycle_participants(&creates, &cycle),
            });
        };
        let Operation::CreateTable(create) = &mut creates[dependent] else {
            return Err(MigrationError::CyclicDependency {
                participants: cycle_participants(&creates, &cycle),
            });
        };

        let (split, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut create.foreign_keys)
            .into_iter()
            .partition(|fk| {
                table_key(fk.principal_schema.as_deref(), &fk.principal_table) == keys[principal]
            });
        create.foreign_keys = kept;
        warn!(
            table = %display_name(create.schema.as_deref(), &create.name),
            foreign_keys = split.len(),
            "foreign key cycle between new tables; attaching keys after creation"
        );
        deferred.extend(split.into_iter().map(|foreign_key| {
            Operation::AddForeignKey(AddForeignKeyOperation {
                schema: create.schema.clone(),
                table: create.name.clone(),
                foreign_key,
            })
        }));
        graph.remove_edge(principal, dependent);
    }
}

// ============================================================================
// Table drops
// ============================================================================

/// Dependent tables are dropped before the tables they reference
fn order_drop_tables(
    mut drops: Vec<Operation>,
) -> Result<(Vec<Operation>, Vec<Operation>), MigrationError> {
    let keys: Vec<String> = drops.iter().map(operation_table_key).collect();
    let mut graph = DependencyGraph::new(drops.len());
    for (dependent, operation) in drops.iter().enumerate() {
        let Operation::DropTable(drop) = operation else {
            continue;
        };
        for fk in &drop.foreign_keys {
            let principal = table_key(fk.principal_schema.as_deref(), &fk.principal_table);
            if let Some(principal) = keys.iter().position(|k| *k == principal) {
                graph.add_edge(dependent, principal);
            }
        }
    }

    let mut deferred = Vec::new();
    loop {
        let cycle = match graph.sort() {
            Ok(order) => return Ok((reorder(drops, &order), deferred)),
            Err(cycle) => cycle,
        };
        let Some((dependent, principal)) = edge_into_last(&cycle) else {
            return Err(MigrationError::CyclicDependency {
                participants: cycle_participants(&drops, &cycle),
            });
        };
        let Operation::DropTable(drop) = &mut drops[dependent] else {
            return Err(MigrationError::CyclicDependency {
                participants: cycle_participants(&drops, &cycle),
            });
        };

        let (split, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut drop.foreign_keys)
            .into_iter()
            .partition(|fk| {
                table_key(fk.principal_schema.as_deref(), &fk.principal_table) == keys[principal]
            });
        drop.foreign_keys = kept;
        debug!(
            table = %display_name(drop.schema.as_deref(), &drop.name),
            "dropping foreign keys ahead of cyclic table drops"
        );
        deferred.extend(split.into_iter().map(|fk| {
            Operation::DropForeignKey(DropConstraintOperation {
                schema: drop.schema.clone(),
                table: drop.name.clone(),
                name: fk.name,
            })
        }));
        graph.remove_edge(dependent, principal);
    }
}

// ============================================================================
// Renames
// ============================================================================

/// A rename, or a rename followed by a move of the same object
struct RenameUnit {
    operations: Vec<Operation>,
    /// Name the object holds before the unit runs
    releases: String,
    /// Names the object holds while and after the unit runs
    claims: Vec<String>,
    label: String,
}

fn rename_keys(operation: &Operation) -> Option<(String, String, String)> {
    let object = |schema: Option<&str>, name: &str| format!("object:{}", table_key(schema, name));
    let member = |kind: &str, schema: Option<&str>, table: &str, name: &str| {
        format!("{kind}:{}.{}", table_key(schema, table), name.to_lowercase())
    };
    let keys = match operation {
        Operation::RenameTable(op) => (
            object(op.schema.as_deref(), &op.name),
            object(op.schema.as_deref(), &op.new_name),
            format!("{} -> {}", display_name(op.schema.as_deref(), &op.name), op.new_name),
        ),
        Operation::RenameSequence(op) => (
            object(op.schema.as_deref(), &op.name),
            object(op.schema.as_deref(), &op.new_name),
            format!("{} -> {}", display_name(op.schema.as_deref(), &op.name), op.new_name),
        ),
        Operation::MoveTable(op) => (
            object(op.schema.as_deref(), &op.name),
            object(op.new_schema.as_deref(), &op.name),
            format!(
                "{} -> {}",
                display_name(op.schema.as_deref(), &op.name),
                display_name(op.new_schema.as_deref(), &op.name)
            ),
        ),
        Operation::MoveSequence(op) => (
            object(op.schema.as_deref(), &op.name),
            object(op.new_schema.as_deref(), &op.name),
            format!(
                "{} -> {}",
                display_name(op.schema.as_deref(), &op.name),
                display_name(op.new_schema.as_deref(), &op.name)
            ),
        ),
        Operation::RenameColumn(op) => (
            member("column", op.schema.as_deref(), &op.table, &op.name),
            member("column", op.schema.as_deref(), &op.table, &op.new_name),
            format!("{}.{} -> {}", op.table, op.name, op.new_name),
        ),
        Operation::RenameIndex(op) => {
            let table = op.table.as_deref().unwrap_or_default();
            (
                member("index", op.schema.as_deref(), table, &op.name),
                member("index", op.schema.as_deref(), table, &op.new_name),
                format!("{} -> {}", op.name, op.new_name),
            )
        }
        _ => return None,
    };
    Some(keys)
}

fn is_move(operation: &Operation) -> bool {
    matches!(operation, Operation::MoveTable(_) | Operation::MoveSequence(_))
}

/// A rename that would take a name still held by another object waits for
/// that object to be renamed first. Swaps cannot be ordered and fail.
fn order_renames(renames: Vec<Operation>) -> Result<Vec<Operation>, MigrationError> {
    let mut units: Vec<RenameUnit> = Vec::with_capacity(renames.len());
    for operation in renames {
        let Some((releases, claims, label)) = rename_keys(&operation) else {
            units.push(RenameUnit {
                operations: vec![operation],
                releases: String::new(),
                claims: Vec::new(),
                label: String::new(),
            });
            continue;
        };
        if is_move(&operation) {
            if let Some(previous) = units.last_mut() {
                if previous.claims.last() == Some(&releases)
                    && previous.operations.iter().all(|op| !is_move(op))
                {
                    previous.claims.push(claims);
                    previous.label = format!("{} -> {}", previous.label, label);
                    previous.operations.push(operation);
                    continue;
                }
            }
        }
        units.push(RenameUnit {
            operations: vec![operation],
            releases,
            claims: vec![claims],
            label,
        });
    }

    let mut graph = DependencyGraph::new(units.len());
    for (x, unit) in units.iter().enumerate() {
        for claim in &unit.claims {
            for (y, other) in units.iter().enumerate() {
                if x != y && !other.releases.is_empty() && other.releases == *claim {
                    graph.add_edge(y, x);
                }
            }
        }
    }

    match graph.sort() {
        Ok(order) => {
            let mut slots: Vec<Option<RenameUnit>> = units.into_iter().map(Some).collect();
            Ok(order
                .iter()
                .filter_map(|&i| slots[i].take())
                .flat_map(|unit| unit.operations)
                .collect())
        }
        Err(cycle) => Err(MigrationError::CyclicDependency {
            participants: cycle.iter().map(|&i| units[i].label.clone()).collect(),
        }),
    }
}
