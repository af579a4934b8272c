//! SQL generation
//!
//! Renders scheduled operations into Transact-SQL commands. The dialect
//! supplies quoting, store types and literals; everything else about the
//! statement shapes lives in the generator.

mod builder;
mod constraint;
mod data;
pub mod dialect;
mod generator;
pub mod history;
pub mod script;
pub mod separator;
mod table;
mod temporal;

pub use dialect::{Dialect, SqlServerDialect};
pub use generator::SqlGenerator;
pub use history::HistoryRepository;
pub use script::{MigrationCommands, ScriptDirection, ScriptGenerator};

use crate::error::MigrationError;
use crate::operations::Operation;
use crate::schedule::Batch;

/// Default name of the migration history table
pub const DEFAULT_HISTORY_TABLE: &str = "__EFMigrationsHistory";

/// Rows per INSERT statement when seeding data
pub const DEFAULT_MAX_BATCH_SIZE: usize = 42;

/// One command ready to send to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBatch {
    pub sql: String,
    /// Must run outside of any transaction
    pub suppress_transaction: bool,
}

/// Where the migration history lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTable {
    pub name: String,
    pub schema: Option<String>,
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self {
            name: DEFAULT_HISTORY_TABLE.to_string(),
            schema: None,
        }
    }
}

/// Options for SQL generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Guard statements so that re-running them is harmless
    pub idempotent: bool,
    /// Maximum rows per INSERT statement
    pub max_batch_size: usize,
    pub history_table: HistoryTable,
    /// Recorded with every applied migration
    pub product_version: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            idempotent: false,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            history_table: HistoryTable::default(),
            product_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Render scheduled batches with the SQL Server dialect
pub fn generate(
    batches: &[Batch],
    options: &GenerateOptions,
) -> Result<Vec<CommandBatch>, MigrationError> {
    SqlGenerator::new(&SqlServerDialect, options).generate(batches)
}

/// Render an explicit, already ordered list of operations
pub fn generate_operations(
    operations: &[Operation],
    options: &GenerateOptions,
) -> Result<Vec<CommandBatch>, MigrationError> {
    let batches = crate::schedule::batch(operations.to_vec());
    generate(&batches, options)
}
