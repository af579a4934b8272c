//! Column references inside SQL fragments (index filters, computed columns)

use sqlparser::dialect::MsSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

use crate::util::contains_ci;

/// Whether `sql` mentions the column `name` as an identifier.
///
/// Falls back to a case-insensitive substring search when the fragment
/// cannot be tokenized.
pub(crate) fn references_column(sql: &str, name: &str) -> bool {
    let dialect = MsSqlDialect {};
    match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => tokens.iter().any(|token| match token {
            Token::Word(word) => word.value.eq_ignore_ascii_case(name),
            _ => false,
        }),
        Err(_) => contains_ci(sql, name),
    }
}
