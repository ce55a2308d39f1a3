//! Modification plans: which spans of a query touch encrypted columns.
//!
//! Each statement kind has its own extractor. Extractors only read the
//! parsed statement; the resulting plan records byte ranges of the
//! original query text for the rewriters to wrap.

mod delete;
mod insert;
mod select;
mod update;

use std::collections::HashMap;
use std::ops::{ControlFlow, Range};

use serde::Serialize;
use sqlparser::ast::{
    visit_expressions, Expr, ObjectName, ObjectNamePart, TableFactor, TableWithJoins, Visit,
};

use crate::collector::{EncryptedColumn, EncryptedColumns, Qualifier};
use crate::error::InterceptError;
use crate::parser::{ColumnRef, ParsedQuery, StatementKind};
use crate::predicate;

pub use delete::extract_delete;
pub use insert::extract_insert;
pub use select::extract_select;
pub use update::extract_update;

/// A projected or returned column to decrypt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectColumn {
    /// Referenced table with its first character upper-cased.
    pub table: String,
    pub column: String,
    pub encryption_key: String,
    /// Every reference to this column in the statement, in source order.
    pub references: Vec<Range<usize>>,
}

/// Right-hand side of a leaf comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "value")]
pub enum Operand {
    Parameter(String),
    Literal(String),
}

/// A WHERE leaf comparison on an encrypted column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhereParameter {
    pub table: String,
    pub column: String,
    pub operand: Operand,
    pub encryption_key: String,
    /// The compared column reference.
    pub reference: Range<usize>,
}

/// An inserted bound value to encrypt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueParameter {
    pub parameter: String,
    pub encryption_key: String,
    pub placeholder: Range<usize>,
}

/// A SET assignment to encrypt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateColumn {
    pub table: String,
    pub column: String,
    pub parameter: String,
    pub encryption_key: String,
    pub placeholder: Range<usize>,
    /// WHERE-side references to the same column.
    pub where_references: Vec<Range<usize>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectPlan {
    pub columns: Vec<SelectColumn>,
    pub wheres: Vec<WhereParameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InsertPlan {
    pub values: Vec<ValueParameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdatePlan {
    pub columns: Vec<UpdateColumn>,
    pub wheres: Vec<WhereParameter>,
    /// Encrypted columns in the RETURNING list.
    pub returning: Vec<SelectColumn>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletePlan {
    pub wheres: Vec<WhereParameter>,
    pub returning: Vec<SelectColumn>,
}

/// The plan for one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum ModificationPlan {
    Select(SelectPlan),
    Insert(InsertPlan),
    Update(UpdatePlan),
    Delete(DeletePlan),
    Passthrough,
}

impl ModificationPlan {
    /// Whether applying the plan would leave the query unchanged.
    pub fn is_empty(&self) -> bool {
        match self {
            ModificationPlan::Select(plan) => plan.columns.is_empty() && plan.wheres.is_empty(),
            ModificationPlan::Insert(plan) => plan.values.is_empty(),
            ModificationPlan::Update(plan) => {
                plan.columns.is_empty() && plan.wheres.is_empty() && plan.returning.is_empty()
            }
            ModificationPlan::Delete(plan) => plan.wheres.is_empty() && plan.returning.is_empty(),
            ModificationPlan::Passthrough => true,
        }
    }
}

/// Build the plan for a parsed query.
pub fn extract(
    parsed: &ParsedQuery<'_>,
    columns: &EncryptedColumns,
) -> Result<ModificationPlan, InterceptError> {
    let plan = match parsed.kind() {
        StatementKind::Select(select) => {
            ModificationPlan::Select(extract_select(parsed, select, columns)?)
        }
        StatementKind::Insert(insert) => {
            ModificationPlan::Insert(extract_insert(parsed, insert, columns)?)
        }
        StatementKind::Update(update) => {
            ModificationPlan::Update(extract_update(parsed, update, columns)?)
        }
        StatementKind::Delete(delete) => {
            ModificationPlan::Delete(extract_delete(parsed, delete, columns)?)
        }
        StatementKind::Other => ModificationPlan::Passthrough,
    };
    Ok(plan)
}

/// Table names and aliases declared by a statement's FROM list.
#[derive(Debug, Clone, Default)]
pub(crate) struct TableScope {
    /// Lowercased alias or table name -> table name.
    tables: HashMap<String, String>,
    /// Tables in declaration order.
    order: Vec<String>,
}

impl TableScope {
    pub(crate) fn from_tables<'a>(tables: impl IntoIterator<Item = &'a TableWithJoins>) -> Self {
        let mut scope = Self::default();
        for table in tables {
            scope.add_factor(&table.relation);
            for join in &table.joins {
                scope.add_factor(&join.relation);
            }
        }
        scope
    }

    /// Scope of a statement that targets exactly one named table.
    pub(crate) fn single_table(name: &ObjectName) -> Self {
        let mut scope = Self::default();
        if let Some(table) = last_name(name) {
            scope.tables.insert(table.to_ascii_lowercase(), table.clone());
            scope.order.push(table);
        }
        scope
    }

    fn add_factor(&mut self, factor: &TableFactor) {
        let TableFactor::Table { name, alias, .. } = factor else {
            return;
        };
        let Some(table) = last_name(name) else {
            return;
        };
        if let Some(alias) = alias {
            self.tables
                .insert(alias.name.value.to_ascii_lowercase(), table.clone());
        }
        self.tables.insert(table.to_ascii_lowercase(), table.clone());
        self.order.push(table);
    }

    fn resolve(&self, qualifier: &str) -> Option<&str> {
        self.tables
            .get(&qualifier.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The table of a single-table statement.
    pub(crate) fn single(&self) -> Option<&str> {
        match self.order.as_slice() {
            [table] => Some(table.as_str()),
            _ => None,
        }
    }
}

pub(crate) fn last_name(name: &ObjectName) -> Option<String> {
    name.0
        .last()
        .and_then(ObjectNamePart::as_ident)
        .map(|ident| ident.value.clone())
}

/// Resolves column references against the encrypted set.
pub(crate) struct Resolver<'p, 'q> {
    parsed: &'p ParsedQuery<'q>,
    columns: &'p EncryptedColumns,
    scope: TableScope,
}

/// A column reference matched to its descriptor.
pub(crate) struct Resolved<'p> {
    pub reference: ColumnRef,
    pub descriptor: &'p EncryptedColumn,
}

impl<'p, 'q> Resolver<'p, 'q> {
    pub(crate) fn new(
        parsed: &'p ParsedQuery<'q>,
        columns: &'p EncryptedColumns,
        scope: TableScope,
    ) -> Self {
        Self {
            parsed,
            columns,
            scope,
        }
    }

    /// Resolve an expression that should be a column reference.
    pub(crate) fn resolve(&self, expr: &Expr) -> Result<Option<Resolved<'p>>, InterceptError> {
        let Some(reference) = self.parsed.column_ref(expr) else {
            return Ok(None);
        };
        if !self.columns.contains_name(&reference.name) {
            return Ok(None);
        }

        let name = reference.name.as_str();
        let descriptor = match reference.qualifier.as_deref() {
            Some(qualifier) => match self.columns.lookup(name, Qualifier::Explicit(qualifier))? {
                Some(found) => Some(found),
                // an SQL alias from the FROM list
                None => match self.scope.resolve(qualifier) {
                    Some(table) => self.columns.lookup(name, Qualifier::Explicit(table))?,
                    None => None,
                },
            },
            None => self.lookup_unqualified(name)?,
        };

        Ok(descriptor.map(|descriptor| Resolved {
            reference,
            descriptor,
        }))
    }

    /// Look up a bare column name, using the statement's single table as
    /// the implicit qualifier when there is one.
    pub(crate) fn lookup_unqualified(
        &self,
        name: &str,
    ) -> Result<Option<&'p EncryptedColumn>, InterceptError> {
        match self.scope.single() {
            Some(table) => self.columns.lookup(name, Qualifier::Implicit(table)),
            None => self.columns.lookup(name, Qualifier::None),
        }
    }

    /// Every column reference in `node` that resolves to an encrypted
    /// column, in visiting order.
    pub(crate) fn references<V: Visit>(
        &self,
        node: &V,
    ) -> Result<Vec<Resolved<'p>>, InterceptError> {
        let mut found = Vec::new();
        let flow = visit_expressions(node, |expr| {
            if !matches!(expr, Expr::Identifier(_) | Expr::CompoundIdentifier(_)) {
                return ControlFlow::Continue(());
            }
            match self.resolve(expr) {
                Ok(Some(resolved)) => found.push(resolved),
                Ok(None) => {}
                Err(err) => return ControlFlow::Break(err),
            }
            ControlFlow::Continue(())
        });
        match flow {
            ControlFlow::Break(err) => Err(err),
            ControlFlow::Continue(()) => Ok(found),
        }
    }

    /// Operand of a leaf comparison.
    pub(crate) fn operand(&self, expr: &Expr) -> Operand {
        match self.parsed.bound_parameter(expr) {
            Some(parameter) => Operand::Parameter(parameter.name),
            None => Operand::Literal(expr.to_string()),
        }
    }

    /// Flatten a WHERE tree into leaves on encrypted columns.
    ///
    /// `table` overrides the table recorded on each leaf; otherwise the
    /// leaf's own qualifier (or the descriptor's table) is used.
    pub(crate) fn wheres(
        &self,
        selection: &Expr,
        table: Option<&str>,
    ) -> Result<Vec<(WhereParameter, &'p EncryptedColumn)>, InterceptError> {
        let mut wheres = Vec::new();
        for comparison in predicate::flatten(selection) {
            let Some(resolved) = self.resolve(comparison.column)? else {
                continue;
            };
            let leaf_table = match (table, resolved.reference.qualifier.as_deref()) {
                (Some(table), _) => table.to_string(),
                (None, Some(qualifier)) => qualifier.to_string(),
                (None, None) => resolved.descriptor.table.clone(),
            };
            wheres.push((
                WhereParameter {
                    table: leaf_table,
                    column: resolved.reference.name,
                    operand: self.operand(comparison.operand),
                    encryption_key: resolved.descriptor.encryption_key.clone(),
                    reference: resolved.reference.range,
                },
                resolved.descriptor,
            ));
        }
        Ok(wheres)
    }
}

/// Decrypted columns grouped by descriptor.
#[derive(Default)]
pub(crate) struct DecryptedColumns<'p> {
    columns: Vec<SelectColumn>,
    descriptors: Vec<&'p EncryptedColumn>,
}

impl<'p> DecryptedColumns<'p> {
    /// Record a reference, starting a new column for an unseen descriptor.
    pub(crate) fn add(&mut self, resolved: Resolved<'p>) {
        if let Some(index) = self.position(resolved.descriptor) {
            self.push_reference(index, resolved.reference.range);
            return;
        }
        let table = resolved
            .reference
            .qualifier
            .as_deref()
            .unwrap_or(&resolved.descriptor.table);
        self.columns.push(SelectColumn {
            table: display_table(table),
            column: resolved.reference.name,
            encryption_key: resolved.descriptor.encryption_key.clone(),
            references: vec![resolved.reference.range],
        });
        self.descriptors.push(resolved.descriptor);
    }

    /// Record references to descriptors that already have a column.
    pub(crate) fn extend_existing(&mut self, resolved: impl IntoIterator<Item = Resolved<'p>>) {
        for resolved in resolved {
            if let Some(index) = self.position(resolved.descriptor) {
                self.push_reference(index, resolved.reference.range);
            }
        }
    }

    pub(crate) fn contains(&self, descriptor: &EncryptedColumn) -> bool {
        self.position(descriptor).is_some()
    }

    pub(crate) fn into_columns(mut self) -> Vec<SelectColumn> {
        for column in &mut self.columns {
            column.references.sort_by_key(|range| range.start);
        }
        self.columns
    }

    fn position(&self, descriptor: &EncryptedColumn) -> Option<usize> {
        self.descriptors.iter().position(|d| *d == descriptor)
    }

    fn push_reference(&mut self, index: usize, range: Range<usize>) {
        let references = &mut self.columns[index].references;
        if !references.contains(&range) {
            references.push(range);
        }
    }
}

/// Upper-case the first character, as the query builder does for aliases.
pub(crate) fn display_table(table: &str) -> String {
    let mut chars = table.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
