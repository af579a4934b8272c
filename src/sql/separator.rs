//! Batch separator handling for free-form SQL
//!
//! A separator is a line holding only `GO`, optionally followed by a
//! repeat count. Lines inside string literals or block comments never
//! split, and neither does `GO` sharing a line with other text.

use std::sync::LazyLock;

use regex::Regex;

static SEPARATOR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*GO(?:[ \t]+([0-9]+))?\s*$").unwrap());

static LINE_CONTINUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\\r?\n").unwrap());

/// One server-side batch of a raw SQL script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlBatch {
    pub sql: String,
    /// How many times the batch runs (`GO 3`)
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Code,
    String,
    BlockComment(u32),
}

/// Carry the lexer state across one line
fn scan_line(line: &str, mut state: ScanState) -> ScanState {
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        state = match (state, ch) {
            (ScanState::Code, '\'') => ScanState::String,
            (ScanState::Code, '-') if chars.peek() == Some(&'-') => return ScanState::Code,
            (ScanState::Code, '/') if chars.peek() == Some(&'*') => {
                chars.next();
                ScanState::BlockComment(1)
            }
            (ScanState::String, '\'') => ScanState::Code,
            (ScanState::BlockComment(depth), '/') if chars.peek() == Some(&'*') => {
                chars.next();
                ScanState::BlockComment(depth + 1)
            }
            (ScanState::BlockComment(depth), '*') if chars.peek() == Some(&'/') => {
                chars.next();
                if depth == 1 {
                    ScanState::Code
                } else {
                    ScanState::BlockComment(depth - 1)
                }
            }
            (state, _) => state,
        };
    }
    state
}

/// Split a script on standalone separator lines. Blank batches are
/// dropped; `\` at the end of a line joins it with the next one.
pub fn split_batches(sql: &str) -> Vec<SqlBatch> {
    let sql = LINE_CONTINUATION.replace_all(sql, "");
    let mut batches = Vec::new();
    let mut current = String::new();
    let mut state = ScanState::Code;

    for line in sql.split_inclusive('\n') {
        if state == ScanState::Code {
            let bare = line.trim_end_matches(['\r', '\n']);
            if let Some(captures) = SEPARATOR_LINE.captures(bare) {
                let count = captures
                    .get(1)
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(1);
                push_batch(&mut batches, std::mem::take(&mut current), count);
                continue;
            }
        }
        state = scan_line(line, state);
        current.push_str(line);
    }
    push_batch(&mut batches, current, 1);
    batches
}

fn push_batch(batches: &mut Vec<SqlBatch>, sql: String, count: u32) {
    if sql.trim().is_empty() || count == 0 {
        return;
    }
    batches.push(SqlBatch { sql, count });
}
