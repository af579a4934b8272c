//! Accumulates SQL text into commands

use super::CommandBatch;

const INDENT: &str = "    ";

/// Line-oriented text builder that cuts its output into commands.
///
/// Indentation is applied to every line started while indented.
#[derive(Debug, Default)]
pub(crate) struct CommandListBuilder {
    commands: Vec<CommandBatch>,
    current: String,
    indent: usize,
}

impl CommandListBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn at_line_start(&self) -> bool {
        self.current.is_empty() || self.current.ends_with('\n')
    }

    pub(crate) fn append(&mut self, text: &str) -> &mut Self {
        let mut lines = text.split('\n').peekable();
        while let Some(line) = lines.next() {
            if !line.is_empty() && self.at_line_start() {
                for _ in 0..self.indent {
                    self.current.push_str(INDENT);
                }
            }
            self.current.push_str(line);
            if lines.peek().is_some() {
                self.current.push('\n');
            }
        }
        self
    }

    pub(crate) fn append_line(&mut self, text: &str) -> &mut Self {
        self.append(text);
        self.current.push('\n');
        self
    }

    pub(crate) fn increment_indent(&mut self) -> &mut Self {
        self.indent += 1;
        self
    }

    pub(crate) fn decrement_indent(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self
    }

    /// Take the pending text without ending a command
    pub(crate) fn take_pending(&mut self) -> String {
        std::mem::take(&mut self.current)
    }

    /// Close the current command. Empty commands are dropped.
    pub(crate) fn end_command(&mut self, suppress_transaction: bool) -> &mut Self {
        let sql = std::mem::take(&mut self.current);
        if !sql.trim().is_empty() {
            self.commands.push(CommandBatch {
                sql,
                suppress_transaction,
            });
        }
        self
    }

    pub(crate) fn into_commands(mut self) -> Vec<CommandBatch> {
        self.end_command(false);
        self.commands
    }
}

/// Indent every non-empty line of `text` by one level
pub(crate) fn indent_lines(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{INDENT}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
