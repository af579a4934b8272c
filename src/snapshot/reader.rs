//! Snapshot XML reading

use std::path::Path;
use std::str::FromStr;

use roxmltree::{Document, Node};

use super::ROOT_ELEMENT;
use crate::error::MigrationError;
use crate::model::{
    CheckConstraint, Column, ColumnDefault, ComputedColumn, ForeignKey, IdentitySpec, Index,
    LogicalType, PeriodBoundary, PrimaryKey, ReferentialAction, SchemaModel, SeedRow, Sequence,
    SqlValue, Table, TemporalTable, UniqueConstraint, ValueGeneration,
};

fn invalid(message: impl Into<String>) -> MigrationError {
    MigrationError::InvalidSnapshotFormat {
        message: message.into(),
    }
}

fn required(node: &Node, name: &str) -> Result<String, MigrationError> {
    node.attribute(name).map(str::to_string).ok_or_else(|| {
        invalid(format!(
            "<{}> is missing attribute '{}'",
            node.tag_name().name(),
            name
        ))
    })
}

fn optional(node: &Node, name: &str) -> Option<String> {
    node.attribute(name).map(str::to_string)
}

fn flag(node: &Node, name: &str) -> bool {
    node.attribute(name)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn tri_state(node: &Node, name: &str) -> Option<bool> {
    node.attribute(name).map(|v| v.eq_ignore_ascii_case("true"))
}

fn number<T: FromStr>(node: &Node, name: &str) -> Result<Option<T>, MigrationError> {
    match node.attribute(name) {
        None => Ok(None),
        Some(text) => text.trim().parse().map(Some).map_err(|_| {
            invalid(format!(
                "<{}> attribute '{}' is not a valid number: '{}'",
                node.tag_name().name(),
                name,
                text
            ))
        }),
    }
}

fn children<'a, 'input: 'a>(
    node: &Node<'a, 'input>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == tag)
}

fn refs(node: &Node, tag: &'static str) -> Result<Vec<String>, MigrationError> {
    children(node, tag).map(|n| required(&n, "Id")).collect()
}

fn value(node: &Node) -> Result<SqlValue, MigrationError> {
    let kind = required(node, "Kind")?;
    let text = node.attribute("Value").unwrap_or("");
    SqlValue::from_raw(&kind, text).ok_or_else(|| invalid(format!("invalid {kind} value '{text}'")))
}

/// Parse a snapshot document into a model and the fingerprint it records
pub(super) fn read_document(
    xml: &str,
    path: &Path,
) -> Result<(SchemaModel, Option<String>), MigrationError> {
    let doc = Document::parse(xml).map_err(|e| MigrationError::SnapshotParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != ROOT_ELEMENT {
        return Err(invalid(format!(
            "expected <{}> root element, found <{}>",
            ROOT_ELEMENT,
            root.tag_name().name()
        )));
    }
    let fingerprint = optional(&root, "Fingerprint");
    let model_node = children(&root, "Model")
        .next()
        .ok_or_else(|| invalid("snapshot has no <Model> element"))?;

    let mut model = SchemaModel::new();
    model.default_schema = optional(&model_node, "DefaultSchema");
    model.collation = optional(&model_node, "Collation");
    for node in children(&model_node, "Table") {
        model.tables.push(read_table(&node)?);
    }
    for node in children(&model_node, "Sequence") {
        model.sequences.push(read_sequence(&node)?);
    }
    Ok((model, fingerprint))
}

fn read_table(node: &Node) -> Result<Table, MigrationError> {
    let mut table = Table::new(required(node, "Name")?);
    table.id = required(node, "Id")?;
    table.schema = optional(node, "Schema");
    table.comment = optional(node, "Comment");
    table.memory_optimized = flag(node, "MemoryOptimized");

    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "Column" => table.columns.push(read_column(&child)?),
            "PrimaryKey" => {
                table.primary_key = Some(PrimaryKey {
                    id: required(&child, "Id")?,
                    name: required(&child, "Name")?,
                    columns: refs(&child, "ColumnRef")?,
                    clustered: tri_state(&child, "Clustered"),
                })
            }
            "Unique" => table.unique_constraints.push(UniqueConstraint {
                id: required(&child, "Id")?,
                name: required(&child, "Name")?,
                columns: refs(&child, "ColumnRef")?,
            }),
            "Index" => table.indexes.push(Index {
                id: required(&child, "Id")?,
                name: required(&child, "Name")?,
                columns: refs(&child, "ColumnRef")?,
                unique: flag(&child, "Unique"),
                filter: optional(&child, "Filter"),
                include: refs(&child, "IncludeRef")?,
                clustered: tri_state(&child, "Clustered"),
                fill_factor: number(&child, "FillFactor")?,
                online: flag(&child, "Online"),
            }),
            "ForeignKey" => {
                let on_delete = required(&child, "OnDelete")?;
                table.foreign_keys.push(ForeignKey {
                    id: required(&child, "Id")?,
                    name: required(&child, "Name")?,
                    columns: refs(&child, "ColumnRef")?,
                    principal_table: required(&child, "PrincipalTable")?,
                    principal_columns: refs(&child, "PrincipalColumnRef")?,
                    on_delete: ReferentialAction::parse(&on_delete)
                        .ok_or_else(|| invalid(format!("unknown delete action '{on_delete}'")))?,
                });
            }
            "Check" => table.check_constraints.push(CheckConstraint {
                id: required(&child, "Id")?,
                name: required(&child, "Name")?,
                sql: required(&child, "Sql")?,
            }),
            "Temporal" => {
                table.temporal = Some(TemporalTable {
                    history_table: required(&child, "HistoryTable")?,
                    history_schema: optional(&child, "HistorySchema"),
                    period_start: required(&child, "PeriodStart")?,
                    period_end: required(&child, "PeriodEnd")?,
                })
            }
            "SeedRow" => {
                let mut row = SeedRow::new();
                for entry in children(&child, "Value") {
                    row.insert(required(&entry, "Column")?, value(&entry)?);
                }
                table.seed_data.push(row);
            }
            other => {
                return Err(invalid(format!(
                    "unexpected <{other}> in table '{}'",
                    table.name
                )))
            }
        }
    }
    Ok(table)
}

fn read_column(node: &Node) -> Result<Column, MigrationError> {
    let type_name = required(node, "Type")?;
    let logical_type = LogicalType::from_str(&type_name).map_err(invalid)?;
    let mut column = Column::new(required(node, "Name")?, logical_type);
    column.id = required(node, "Id")?;
    column.store_type = optional(node, "StoreType");
    column.nullable = flag(node, "Nullable");
    column.max_length = number(node, "MaxLength")?;
    column.precision = number(node, "Precision")?;
    column.scale = number(node, "Scale")?;
    column.unicode = tri_state(node, "Unicode");
    column.fixed_length = flag(node, "FixedLength");
    column.collation = optional(node, "Collation");
    column.comment = optional(node, "Comment");
    column.is_row_version = flag(node, "RowVersion");
    column.is_sparse = flag(node, "Sparse");
    if let Some(generation) = node.attribute("ValueGeneration") {
        column.value_generation = ValueGeneration::parse(generation)
            .ok_or_else(|| invalid(format!("unknown value generation '{generation}'")))?;
    }
    column.period = match node.attribute("Period") {
        None => None,
        Some("Start") => Some(PeriodBoundary::Start),
        Some("End") => Some(PeriodBoundary::End),
        Some(other) => return Err(invalid(format!("unknown period boundary '{other}'"))),
    };

    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "Default" => column.default = Some(ColumnDefault::Value(value(&child)?)),
            "DefaultSql" => column.default = Some(ColumnDefault::Sql(required(&child, "Sql")?)),
            "Computed" => {
                column.computed = Some(ComputedColumn {
                    sql: required(&child, "Sql")?,
                    stored: flag(&child, "Stored"),
                })
            }
            "Identity" => {
                column.identity = Some(IdentitySpec {
                    seed: number(&child, "Seed")?.unwrap_or(1),
                    increment: number(&child, "Increment")?.unwrap_or(1),
                })
            }
            other => {
                return Err(invalid(format!(
                    "unexpected <{other}> in column '{}'",
                    column.name
                )))
            }
        }
    }
    Ok(column)
}

fn read_sequence(node: &Node) -> Result<Sequence, MigrationError> {
    let mut sequence = Sequence::new(required(node, "Name")?);
    sequence.id = required(node, "Id")?;
    sequence.schema = optional(node, "Schema");
    if let Some(type_name) = node.attribute("Type") {
        sequence.logical_type = LogicalType::from_str(type_name).map_err(invalid)?;
    }
    sequence.start = number(node, "Start")?.unwrap_or(1);
    sequence.increment = number(node, "Increment")?.unwrap_or(1);
    sequence.min_value = number(node, "MinValue")?;
    sequence.max_value = number(node, "MaxValue")?;
    sequence.cyclic = flag(node, "Cyclic");
    Ok(sequence)
}
