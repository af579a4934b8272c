//! Schema model snapshots
//!
//! A snapshot is an XML document holding one [`SchemaModel`]. The root
//! carries a SHA-256 fingerprint of the model element; a snapshot whose
//! content no longer matches its fingerprint was edited by hand and is
//! rejected on read.
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <SchemaSnapshot FormatVersion="1" Fingerprint="…">
//!   <Model DefaultSchema="dbo">
//!     <Table Id="People" Name="People">
//!       <Column Id="Id" Name="Id" Type="Int32">
//!         <Identity Seed="1" Increment="1"/>
//!       </Column>
//!       <PrimaryKey Id="PK_People" Name="PK_People">
//!         <ColumnRef Id="Id"/>
//!       </PrimaryKey>
//!     </Table>
//!   </Model>
//! </SchemaSnapshot>
//! ```

mod reader;
mod writer;

use std::path::Path;

use anyhow::{Context, Result};

pub use writer::fingerprint;

use crate::error::MigrationError;
use crate::model::SchemaModel;
use crate::util::read_file_with_encoding_fallback;

pub(crate) const ROOT_ELEMENT: &str = "SchemaSnapshot";
pub(crate) const FORMAT_VERSION: &str = "1";

/// Serialize a model to snapshot XML
pub fn to_xml(model: &SchemaModel) -> Result<String> {
    let mut buffer = Vec::with_capacity(4096);
    writer::write_document(&mut buffer, model)?;
    Ok(String::from_utf8(buffer)?)
}

/// Write a model to a snapshot file
pub fn write_snapshot(model: &SchemaModel, path: &Path) -> Result<()> {
    let xml = to_xml(model)?;
    std::fs::write(path, xml)
        .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
    Ok(())
}

/// Parse snapshot XML. `path` only labels errors.
pub fn from_xml(xml: &str, path: &Path) -> Result<SchemaModel, MigrationError> {
    let (model, recorded) = reader::read_document(xml, path)?;
    if let Some(expected) = recorded {
        let actual = fingerprint(&model).map_err(|e| MigrationError::InvalidSnapshotFormat {
            message: e.to_string(),
        })?;
        if !expected.eq_ignore_ascii_case(&actual) {
            return Err(MigrationError::SnapshotChecksumMismatch {
                path: path.to_path_buf(),
                expected,
                actual,
            });
        }
    }
    model.validate()?;
    Ok(model)
}

/// Read and validate a snapshot file
pub fn read_snapshot(path: &Path) -> Result<SchemaModel, MigrationError> {
    let xml =
        read_file_with_encoding_fallback(path).map_err(|e| MigrationError::SnapshotReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
    from_xml(&xml, path)
}
