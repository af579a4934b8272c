//! Error types for rust-sqlmigrate

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while diffing, scheduling or generating migrations
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Unsupported alteration of {entity}: {reason}")]
    UnsupportedAlteration { entity: String, reason: String },

    #[error("Cyclic dependency between: {}", participants.join(", "))]
    CyclicDependency { participants: Vec<String> },

    #[error("Ambiguous {kind} correlation for '{key}': candidates {}", candidates.join(", "))]
    AmbiguousRename {
        kind: &'static str,
        key: String,
        candidates: Vec<String>,
    },

    #[error("{operation} for index '{index}' requires its table")]
    MissingTableForIndexOperation {
        index: String,
        operation: &'static str,
    },

    #[error("Invalid schema model: {message}")]
    InvalidModel { message: String },

    #[error("Failed to read snapshot file: {path}")]
    SnapshotReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse snapshot file: {path}")]
    SnapshotParseError {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("Invalid snapshot format: {message}")]
    InvalidSnapshotFormat { message: String },

    #[error("Snapshot fingerprint mismatch in {path}: expected {expected}, found {actual}")]
    SnapshotChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Failed to read migrations project: {path}")]
    ProjectReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse migrations project: {path}")]
    ProjectParseError {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("Invalid migrations project format: {message}")]
    InvalidProjectFormat { message: String },

    #[error("Unknown migration: {id}")]
    UnknownMigration { id: String },

    #[error("Failed to write script to {path}")]
    ScriptWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MigrationError {
    pub(crate) fn invalid_model(message: impl Into<String>) -> Self {
        MigrationError::InvalidModel {
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        MigrationError::UnsupportedAlteration {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}
