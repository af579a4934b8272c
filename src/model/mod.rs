//! Schema model: the declarative description of a database that the
//! differ compares

mod builder;
mod elements;
mod schema_model;
mod values;

pub use builder::{
    ColumnBuilder, ForeignKeyBuilder, IndexBuilder, KeyBuilder, ModelBuilder, SequenceBuilder,
    TableBuilder, TemporalBuilder,
};
pub use elements::*;
pub use schema_model::{Schema, SchemaModel};
pub use values::{LogicalType, SqlValue};
