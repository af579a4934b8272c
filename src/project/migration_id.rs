//! Migration identifiers: `<yyyyMMddHHmmss>_<Name>`

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

static MIGRATION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{14}_[A-Za-z_][A-Za-z0-9_]*$").unwrap());

pub fn is_valid_migration_id(id: &str) -> bool {
    MIGRATION_ID.is_match(id)
}

/// Timestamped id for a new migration. Spaces and punctuation in `name`
/// become underscores.
pub fn new_migration_id(name: &str, now: DateTime<Utc>) -> String {
    let mut sanitized: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if sanitized.is_empty() || sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    format!("{}_{}", now.format("%Y%m%d%H%M%S"), sanitized)
}
