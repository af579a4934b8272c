//! Keys, constraints, indexes and sequences

use super::builder::CommandListBuilder;
use super::generator::SqlGenerator;
use crate::error::MigrationError;
use crate::model::{ReferentialAction, Sequence};
use crate::operations::{
    AddCheckConstraintOperation, AddForeignKeyOperation, AddPrimaryKeyOperation,
    AddUniqueConstraintOperation, AlterSequenceOperation, CreateIndexOperation,
    CreateSequenceOperation, DropConstraintOperation, DropIndexOperation, DropSequenceOperation,
    ForeignKeyDefinition, KeyDefinition, RenameIndexOperation, RestartSequenceOperation,
};

fn index_table<'o>(
    table: &'o Option<String>,
    index: &str,
    operation: &'static str,
) -> Result<&'o str, MigrationError> {
    table
        .as_deref()
        .ok_or_else(|| MigrationError::MissingTableForIndexOperation {
            index: index.to_string(),
            operation,
        })
}

fn on_delete(action: ReferentialAction) -> Option<&'static str> {
    match action {
        ReferentialAction::NoAction => None,
        ReferentialAction::Restrict => Some("NO ACTION"),
        ReferentialAction::Cascade => Some("CASCADE"),
        ReferentialAction::SetNull => Some("SET NULL"),
        ReferentialAction::SetDefault => Some("SET DEFAULT"),
    }
}

impl SqlGenerator<'_> {
    /// `([a], [b])`
    pub(super) fn column_list(&self, columns: &[String]) -> String {
        let names: Vec<String> = columns.iter().map(|c| self.dialect.delimit(c)).collect();
        format!("({})", names.join(", "))
    }

    pub(super) fn foreign_key_clause(&self, foreign_key: &ForeignKeyDefinition) -> String {
        let mut clause = format!(
            "FOREIGN KEY {} REFERENCES {} {}",
            self.column_list(&foreign_key.columns),
            self.dialect.qualify(
                &foreign_key.principal_table,
                foreign_key.principal_schema.as_deref()
            ),
            self.column_list(&foreign_key.principal_columns)
        );
        if let Some(action) = on_delete(foreign_key.on_delete) {
            clause.push_str(" ON DELETE ");
            clause.push_str(action);
        }
        clause
    }

    fn add_constraint(
        &self,
        schema: Option<&str>,
        table: &str,
        name: &str,
        definition: &str,
        b: &mut CommandListBuilder,
    ) {
        b.append_line(&format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {}{}",
            self.dialect.qualify(table, schema),
            self.dialect.delimit(name),
            definition,
            self.terminator()
        ));
    }

    fn key_definition(&self, kind: &str, key: &KeyDefinition) -> String {
        let clustering = match key.clustered {
            Some(true) => "CLUSTERED ",
            Some(false) => "NONCLUSTERED ",
            None => "",
        };
        format!("{kind} {clustering}{}", self.column_list(&key.columns))
    }

    pub(super) fn add_primary_key(&self, op: &AddPrimaryKeyOperation, b: &mut CommandListBuilder) {
        let definition = self.key_definition("PRIMARY KEY", &op.key);
        self.add_constraint(op.schema.as_deref(), &op.table, &op.key.name, &definition, b);
    }

    pub(super) fn add_unique_constraint(
        &self,
        op: &AddUniqueConstraintOperation,
        b: &mut CommandListBuilder,
    ) {
        let definition = self.key_definition("UNIQUE", &op.key);
        self.add_constraint(op.schema.as_deref(), &op.table, &op.key.name, &definition, b);
    }

    pub(super) fn add_foreign_key(&self, op: &AddForeignKeyOperation, b: &mut CommandListBuilder) {
        let definition = self.foreign_key_clause(&op.foreign_key);
        self.add_constraint(
            op.schema.as_deref(),
            &op.table,
            &op.foreign_key.name,
            &definition,
            b,
        );
    }

    pub(super) fn add_check_constraint(
        &self,
        op: &AddCheckConstraintOperation,
        b: &mut CommandListBuilder,
    ) {
        let mut statement = CommandListBuilder::new();
        let definition = format!("CHECK ({})", op.check.sql);
        self.add_constraint(
            op.schema.as_deref(),
            &op.table,
            &op.check.name,
            &definition,
            &mut statement,
        );
        self.append_exec_when_idempotent(&statement.take_pending(), b);
    }

    pub(super) fn drop_constraint(&self, op: &DropConstraintOperation, b: &mut CommandListBuilder) {
        b.append_line(&format!(
            "ALTER TABLE {} DROP CONSTRAINT {}{}",
            self.dialect.qualify(&op.table, op.schema.as_deref()),
            self.dialect.delimit(&op.name),
            self.terminator()
        ));
    }

    // ========================================================================
    // Indexes
    // ========================================================================

    fn index_condition(&self, schema: Option<&str>, table: &str, name: &str, exists: bool) -> String {
        format!(
            "{}EXISTS (SELECT * FROM [sys].[indexes] WHERE [name] = {} AND [object_id] = OBJECT_ID({}))",
            if exists { "" } else { "NOT " },
            self.literal(name),
            self.literal(&self.dialect.qualify(table, schema))
        )
    }

    pub(super) fn create_index(
        &self,
        op: &CreateIndexOperation,
        b: &mut CommandListBuilder,
    ) -> Result<(), MigrationError> {
        let index = &op.index;
        let table = index_table(&op.table, &index.name, "CreateIndex")?;
        let schema = op.schema.as_deref();

        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        match index.clustered {
            Some(true) => sql.push_str("CLUSTERED "),
            Some(false) => sql.push_str("NONCLUSTERED "),
            None => {}
        }
        sql.push_str(&format!(
            "INDEX {} ON {} {}",
            self.dialect.delimit(&index.name),
            self.dialect.qualify(table, schema),
            self.column_list(&index.columns)
        ));
        if !index.include.is_empty() {
            sql.push_str(" INCLUDE ");
            sql.push_str(&self.column_list(&index.include));
        }
        if let Some(filter) = &index.filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        let mut options = Vec::new();
        if let Some(fill_factor) = index.fill_factor {
            options.push(format!("FILLFACTOR = {fill_factor}"));
        }
        if index.online {
            options.push("ONLINE = ON".to_string());
        }
        if !options.is_empty() {
            sql.push_str(&format!(" WITH ({})", options.join(", ")));
        }
        sql.push_str(self.terminator());
        sql.push('\n');

        let mut body = CommandListBuilder::new();
        if index.filter.is_some() {
            self.append_exec_when_idempotent(&sql, &mut body);
        } else {
            body.append(&sql);
        }
        let condition = self.index_condition(schema, table, &index.name, false);
        self.append_guarded(&condition, &body.take_pending(), b);
        Ok(())
    }

    pub(super) fn drop_index(
        &self,
        op: &DropIndexOperation,
        b: &mut CommandListBuilder,
    ) -> Result<(), MigrationError> {
        let table = index_table(&op.table, &op.name, "DropIndex")?;
        let schema = op.schema.as_deref();
        let sql = format!(
            "DROP INDEX {} ON {}{}\n",
            self.dialect.delimit(&op.name),
            self.dialect.qualify(table, schema),
            self.terminator()
        );
        let condition = self.index_condition(schema, table, &op.name, true);
        self.append_guarded(&condition, &sql, b);
        Ok(())
    }

    pub(super) fn rename_index(
        &self,
        op: &RenameIndexOperation,
        b: &mut CommandListBuilder,
    ) -> Result<(), MigrationError> {
        let table = index_table(&op.table, &op.name, "RenameIndex")?;
        let old = format!(
            "{}.{}",
            self.dialect.qualify(table, op.schema.as_deref()),
            self.dialect.delimit(&op.name)
        );
        self.rename(&old, &op.new_name, Some("INDEX"), b);
        Ok(())
    }

    // ========================================================================
    // Sequences
    // ========================================================================

    /// ` INCREMENT BY .. MINVALUE .. MAXVALUE .. CYCLE`
    fn sequence_options(&self, sequence: &Sequence) -> String {
        let mut sql = format!(" INCREMENT BY {}", sequence.increment);
        match sequence.min_value {
            Some(min) => sql.push_str(&format!(" MINVALUE {min}")),
            None => sql.push_str(" NO MINVALUE"),
        }
        match sequence.max_value {
            Some(max) => sql.push_str(&format!(" MAXVALUE {max}")),
            None => sql.push_str(" NO MAXVALUE"),
        }
        sql.push_str(if sequence.cyclic { " CYCLE" } else { " NO CYCLE" });
        sql
    }

    pub(super) fn create_sequence(&self, op: &CreateSequenceOperation, b: &mut CommandListBuilder) {
        let sequence = &op.sequence;
        let schema = sequence.schema.as_deref();
        let mut sql = format!("CREATE SEQUENCE {}", self.dialect.qualify(&sequence.name, schema));
        if let Some(store_type) = self.dialect.sequence_type(sequence.logical_type) {
            sql.push_str(" AS ");
            sql.push_str(&store_type);
        }
        sql.push_str(&format!(" START WITH {}", sequence.start));
        sql.push_str(&self.sequence_options(sequence));
        sql.push_str(self.terminator());
        sql.push('\n');
        let condition = self.object_missing(&sequence.name, schema);
        self.append_guarded(&condition, &sql, b);
    }

    pub(super) fn alter_sequence(&self, op: &AlterSequenceOperation, b: &mut CommandListBuilder) {
        let sequence = &op.sequence;
        b.append_line(&format!(
            "ALTER SEQUENCE {}{}{}",
            self.dialect.qualify(&sequence.name, sequence.schema.as_deref()),
            self.sequence_options(sequence),
            self.terminator()
        ));
    }

    pub(super) fn restart_sequence(
        &self,
        op: &RestartSequenceOperation,
        b: &mut CommandListBuilder,
    ) {
        b.append_line(&format!(
            "ALTER SEQUENCE {} RESTART WITH {}{}",
            self.dialect.qualify(&op.name, op.schema.as_deref()),
            op.start_value,
            self.terminator()
        ));
    }

    pub(super) fn drop_sequence(&self, op: &DropSequenceOperation, b: &mut CommandListBuilder) {
        let sql = format!(
            "DROP SEQUENCE {}{}\n",
            self.dialect.qualify(&op.name, op.schema.as_deref()),
            self.terminator()
        );
        let condition = self.object_exists(&op.name, op.schema.as_deref());
        self.append_guarded(&condition, &sql, b);
    }
}
