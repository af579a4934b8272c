//! Snapshot XML writing

use std::borrow::Cow;
use std::io::Write;

use anyhow::Result;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Writer;
use sha2::{Digest, Sha256};

use super::{FORMAT_VERSION, ROOT_ELEMENT};
use crate::model::{
    Column, ColumnDefault, ForeignKey, Index, PeriodBoundary, PrimaryKey, SchemaModel, SeedRow,
    Sequence, SqlValue, Table, ValueGeneration,
};

/// Escape an attribute value, newlines and tabs included, so the reader
/// gets it back byte for byte.
fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\n' => escaped.push_str("&#xA;"),
            '\r' => escaped.push_str("&#xD;"),
            '\t' => escaped.push_str("&#x9;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn attr(element: &mut BytesStart<'_>, key: &'static str, value: &str) {
    element.push_attribute(Attribute {
        key: QName(key.as_bytes()),
        value: Cow::Owned(escape_attr(value).into_bytes()),
    });
}

fn opt_attr(element: &mut BytesStart<'_>, key: &'static str, value: Option<&str>) {
    if let Some(value) = value {
        attr(element, key, value);
    }
}

/// Boolean attributes are only written when set
fn flag(element: &mut BytesStart<'_>, key: &'static str, value: bool) {
    if value {
        attr(element, key, "true");
    }
}

fn write_refs<W: Write>(writer: &mut Writer<W>, tag: &'static str, ids: &[String]) -> Result<()> {
    for id in ids {
        let mut element = BytesStart::new(tag);
        attr(&mut element, "Id", id);
        writer.write_event(Event::Empty(element))?;
    }
    Ok(())
}

fn write_value_attrs(element: &mut BytesStart<'_>, value: &SqlValue) {
    attr(element, "Kind", value.kind());
    if !value.is_null() {
        attr(element, "Value", &value.raw_text());
    }
}

/// Write a complete snapshot document
pub(super) fn write_document<W: Write>(inner: W, model: &SchemaModel) -> Result<()> {
    let mut writer = Writer::new_with_indent(inner, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut root = BytesStart::new(ROOT_ELEMENT);
    attr(&mut root, "FormatVersion", FORMAT_VERSION);
    attr(&mut root, "Fingerprint", &fingerprint(model)?);
    writer.write_event(Event::Start(root))?;
    write_model(&mut writer, model)?;
    writer.write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))?;
    writer.get_mut().write_all(b"\n")?;
    Ok(())
}

/// SHA-256 over the unindented `<Model>` element, uppercase hex
pub fn fingerprint(model: &SchemaModel) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_model(&mut writer, model)?;
    let mut hasher = Sha256::new();
    hasher.update(writer.get_ref());
    Ok(format!("{:X}", hasher.finalize()))
}

fn write_model<W: Write>(writer: &mut Writer<W>, model: &SchemaModel) -> Result<()> {
    let mut element = BytesStart::new("Model");
    opt_attr(&mut element, "DefaultSchema", model.default_schema.as_deref());
    opt_attr(&mut element, "Collation", model.collation.as_deref());
    writer.write_event(Event::Start(element))?;
    for table in &model.tables {
        write_table(writer, table)?;
    }
    for sequence in &model.sequences {
        write_sequence(writer, sequence)?;
    }
    writer.write_event(Event::End(BytesEnd::new("Model")))?;
    Ok(())
}

fn write_table<W: Write>(writer: &mut Writer<W>, table: &Table) -> Result<()> {
    let mut element = BytesStart::new("Table");
    attr(&mut element, "Id", &table.id);
    attr(&mut element, "Name", &table.name);
    opt_attr(&mut element, "Schema", table.schema.as_deref());
    opt_attr(&mut element, "Comment", table.comment.as_deref());
    flag(&mut element, "MemoryOptimized", table.memory_optimized);
    writer.write_event(Event::Start(element))?;

    for column in &table.columns {
        write_column(writer, column)?;
    }
    if let Some(key) = &table.primary_key {
        write_primary_key(writer, key)?;
    }
    for unique in &table.unique_constraints {
        let mut element = BytesStart::new("Unique");
        attr(&mut element, "Id", &unique.id);
        attr(&mut element, "Name", &unique.name);
        writer.write_event(Event::Start(element))?;
        write_refs(writer, "ColumnRef", &unique.columns)?;
        writer.write_event(Event::End(BytesEnd::new("Unique")))?;
    }
    for index in &table.indexes {
        write_index(writer, index)?;
    }
    for foreign_key in &table.foreign_keys {
        write_foreign_key(writer, foreign_key)?;
    }
    for check in &table.check_constraints {
        let mut element = BytesStart::new("Check");
        attr(&mut element, "Id", &check.id);
        attr(&mut element, "Name", &check.name);
        attr(&mut element, "Sql", &check.sql);
        writer.write_event(Event::Empty(element))?;
    }
    if let Some(temporal) = &table.temporal {
        let mut element = BytesStart::new("Temporal");
        attr(&mut element, "HistoryTable", &temporal.history_table);
        opt_attr(&mut element, "HistorySchema", temporal.history_schema.as_deref());
        attr(&mut element, "PeriodStart", &temporal.period_start);
        attr(&mut element, "PeriodEnd", &temporal.period_end);
        writer.write_event(Event::Empty(element))?;
    }
    for row in &table.seed_data {
        write_seed_row(writer, row)?;
    }

    writer.write_event(Event::End(BytesEnd::new("Table")))?;
    Ok(())
}

fn write_column<W: Write>(writer: &mut Writer<W>, column: &Column) -> Result<()> {
    let mut element = BytesStart::new("Column");
    attr(&mut element, "Id", &column.id);
    attr(&mut element, "Name", &column.name);
    attr(&mut element, "Type", column.logical_type.as_str());
    opt_attr(&mut element, "StoreType", column.store_type.as_deref());
    flag(&mut element, "Nullable", column.nullable);
    if let Some(max_length) = column.max_length {
        attr(&mut element, "MaxLength", &max_length.to_string());
    }
    if let Some(precision) = column.precision {
        attr(&mut element, "Precision", &precision.to_string());
    }
    if let Some(scale) = column.scale {
        attr(&mut element, "Scale", &scale.to_string());
    }
    if let Some(unicode) = column.unicode {
        attr(&mut element, "Unicode", if unicode { "true" } else { "false" });
    }
    flag(&mut element, "FixedLength", column.fixed_length);
    opt_attr(&mut element, "Collation", column.collation.as_deref());
    opt_attr(&mut element, "Comment", column.comment.as_deref());
    flag(&mut element, "RowVersion", column.is_row_version);
    flag(&mut element, "Sparse", column.is_sparse);
    if column.value_generation != ValueGeneration::None {
        attr(&mut element, "ValueGeneration", column.value_generation.as_str());
    }
    match column.period {
        Some(PeriodBoundary::Start) => attr(&mut element, "Period", "Start"),
        Some(PeriodBoundary::End) => attr(&mut element, "Period", "End"),
        None => {}
    }

    let has_children =
        column.default.is_some() || column.computed.is_some() || column.identity.is_some();
    if !has_children {
        writer.write_event(Event::Empty(element))?;
        return Ok(());
    }

    writer.write_event(Event::Start(element))?;
    match &column.default {
        Some(ColumnDefault::Value(value)) => {
            let mut default = BytesStart::new("Default");
            write_value_attrs(&mut default, value);
            writer.write_event(Event::Empty(default))?;
        }
        Some(ColumnDefault::Sql(sql)) => {
            let mut default = BytesStart::new("DefaultSql");
            attr(&mut default, "Sql", sql);
            writer.write_event(Event::Empty(default))?;
        }
        None => {}
    }
    if let Some(computed) = &column.computed {
        let mut element = BytesStart::new("Computed");
        attr(&mut element, "Sql", &computed.sql);
        flag(&mut element, "Stored", computed.stored);
        writer.write_event(Event::Empty(element))?;
    }
    if let Some(identity) = &column.identity {
        let mut element = BytesStart::new("Identity");
        attr(&mut element, "Seed", &identity.seed.to_string());
        attr(&mut element, "Increment", &identity.increment.to_string());
        writer.write_event(Event::Empty(element))?;
    }
    writer.write_event(Event::End(BytesEnd::new("Column")))?;
    Ok(())
}

fn write_primary_key<W: Write>(writer: &mut Writer<W>, key: &PrimaryKey) -> Result<()> {
    let mut element = BytesStart::new("PrimaryKey");
    attr(&mut element, "Id", &key.id);
    attr(&mut element, "Name", &key.name);
    if let Some(clustered) = key.clustered {
        attr(&mut element, "Clustered", if clustered { "true" } else { "false" });
    }
    writer.write_event(Event::Start(element))?;
    write_refs(writer, "ColumnRef", &key.columns)?;
    writer.write_event(Event::End(BytesEnd::new("PrimaryKey")))?;
    Ok(())
}

fn write_index<W: Write>(writer: &mut Writer<W>, index: &Index) -> Result<()> {
    let mut element = BytesStart::new("Index");
    attr(&mut element, "Id", &index.id);
    attr(&mut element, "Name", &index.name);
    flag(&mut element, "Unique", index.unique);
    opt_attr(&mut element, "Filter", index.filter.as_deref());
    if let Some(clustered) = index.clustered {
        attr(&mut element, "Clustered", if clustered { "true" } else { "false" });
    }
    if let Some(fill_factor) = index.fill_factor {
        attr(&mut element, "FillFactor", &fill_factor.to_string());
    }
    flag(&mut element, "Online", index.online);
    writer.write_event(Event::Start(element))?;
    write_refs(writer, "ColumnRef", &index.columns)?;
    write_refs(writer, "IncludeRef", &index.include)?;
    writer.write_event(Event::End(BytesEnd::new("Index")))?;
    Ok(())
}

fn write_foreign_key<W: Write>(writer: &mut Writer<W>, foreign_key: &ForeignKey) -> Result<()> {
    let mut element = BytesStart::new("ForeignKey");
    attr(&mut element, "Id", &foreign_key.id);
    attr(&mut element, "Name", &foreign_key.name);
    attr(&mut element, "PrincipalTable", &foreign_key.principal_table);
    attr(&mut element, "OnDelete", foreign_key.on_delete.as_str());
    writer.write_event(Event::Start(element))?;
    write_refs(writer, "ColumnRef", &foreign_key.columns)?;
    write_refs(writer, "PrincipalColumnRef", &foreign_key.principal_columns)?;
    writer.write_event(Event::End(BytesEnd::new("ForeignKey")))?;
    Ok(())
}

fn write_seed_row<W: Write>(writer: &mut Writer<W>, row: &SeedRow) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("SeedRow")))?;
    for (column, value) in row {
        let mut element = BytesStart::new("Value");
        attr(&mut element, "Column", column);
        write_value_attrs(&mut element, value);
        writer.write_event(Event::Empty(element))?;
    }
    writer.write_event(Event::End(BytesEnd::new("SeedRow")))?;
    Ok(())
}

fn write_sequence<W: Write>(writer: &mut Writer<W>, sequence: &Sequence) -> Result<()> {
    let mut element = BytesStart::new("Sequence");
    attr(&mut element, "Id", &sequence.id);
    attr(&mut element, "Name", &sequence.name);
    opt_attr(&mut element, "Schema", sequence.schema.as_deref());
    attr(&mut element, "Type", sequence.logical_type.as_str());
    attr(&mut element, "Start", &sequence.start.to_string());
    attr(&mut element, "Increment", &sequence.increment.to_string());
    if let Some(min_value) = sequence.min_value {
        attr(&mut element, "MinValue", &min_value.to_string());
    }
    if let Some(max_value) = sequence.max_value {
        attr(&mut element, "MaxValue", &max_value.to_string());
    }
    flag(&mut element, "Cyclic", sequence.cyclic);
    writer.write_event(Event::Empty(element))?;
    Ok(())
}
