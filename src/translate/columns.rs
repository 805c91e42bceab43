//! Column inference. Anti joins are the only operator whose SQL depends on
//!  the columns of its operands, and those have to be worked out from the
//!  catalog and the operators in between.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::BuildHasher;

use tracing::trace;

use super::{ExprTree, NodeId, Operands};
use crate::{
    error::{Error, Result},
    lex::{Token, TokenKind},
    to_sql::PrinterConfig,
};

/// Column names, kept sorted so generated SQL is deterministic.
pub type ColumnSet = BTreeSet<String>;

/// Read-only source of table schemas.
pub trait ColumnCatalog {
    /// The columns of `table`, or None if there is no such table.
    fn get_columns(&self, table: &str) -> Option<ColumnSet>;
}

impl<S: BuildHasher> ColumnCatalog for HashMap<String, ColumnSet, S> {
    fn get_columns(&self, table: &str) -> Option<ColumnSet> {
        self.get(table).cloned()
    }
}

impl ColumnCatalog for BTreeMap<String, ColumnSet> {
    fn get_columns(&self, table: &str) -> Option<ColumnSet> {
        self.get(table).cloned()
    }
}

/// A catalog backed by a closure, for schemas that live somewhere else.
pub struct LookupCatalog<F>
where
    F: Fn(&str) -> Option<ColumnSet>,
{
    pub column_lookup: F,
}

impl<F> ColumnCatalog for LookupCatalog<F>
where
    F: Fn(&str) -> Option<ColumnSet>,
{
    fn get_columns(&self, table: &str) -> Option<ColumnSet> {
        (self.column_lookup)(table)
    }
}

/// Knows no tables. Enough for anything without an anti join.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCatalog;

impl ColumnCatalog for EmptyCatalog {
    fn get_columns(&self, _table: &str) -> Option<ColumnSet> {
        None
    }
}

/// Columns shared by both operands of the binary operator at `id`.
pub fn common_columns<C: ColumnCatalog + ?Sized>(
    tree: &ExprTree<'_>,
    id: NodeId,
    catalog: &C,
) -> Result<ColumnSet> {
    let Operands::Two(left, right) = tree.node(id).operands else {
        return Err(Error::ill_formed(format!(
            "operator {} needs two operands",
            tree.node(id).token.literal
        )));
    };
    let left = relation_columns(tree, left, catalog)?;
    let right = relation_columns(tree, right, catalog)?;
    let common: ColumnSet = left.intersection(&right).cloned().collect();
    trace!(?common, "common columns");
    Ok(common)
}

/// Columns of the relation produced by the subtree at `root`.
///
/// The subtree is a contiguous run of postfix tokens, so this is a plain
///  stack evaluation over that run with column sets as values.
pub fn relation_columns<C: ColumnCatalog + ?Sized>(
    tree: &ExprTree<'_>,
    root: NodeId,
    catalog: &C,
) -> Result<ColumnSet> {
    let mut stack: Vec<ColumnSet> = Vec::new();
    for id in tree.subtree(root) {
        let token = tree.node(id).token;
        let columns = match token.kind {
            TokenKind::Ident => catalog
                .get_columns(&token.literal)
                .ok_or_else(|| Error::UnknownTable(token.literal.clone()))?,
            TokenKind::Projection => {
                pop(&mut stack, token)?;
                token
                    .attributes
                    .as_ref()
                    .map(|a| a.bare_column_names().into_iter().collect::<ColumnSet>())
                    .unwrap_or_default()
            }
            TokenKind::Select | TokenKind::Rename => pop(&mut stack, token)?,
            kind => {
                let right = pop(&mut stack, token)?;
                let left = pop(&mut stack, token)?;
                combine(kind, left, right, token)?
            }
        };
        stack.push(columns);
    }
    stack
        .pop()
        .ok_or_else(|| Error::ill_formed("empty relational algebra expression"))
}

fn pop(stack: &mut Vec<ColumnSet>, token: &Token) -> Result<ColumnSet> {
    stack.pop().ok_or_else(|| {
        Error::ill_formed(format!("operator {} is missing operands", token.literal))
    })
}

fn combine(kind: TokenKind, left: ColumnSet, right: ColumnSet, token: &Token) -> Result<ColumnSet> {
    match kind {
        _ if kind.is_set_operation() => {
            if left.len() != right.len() {
                return Err(Error::ill_formed(format!(
                    "operands of {} have {} and {} columns",
                    token.literal,
                    left.len(),
                    right.len()
                )));
            }
            Ok(left)
        }
        TokenKind::NaturalJoin | TokenKind::AntiJoin => {
            Ok(left.intersection(&right).cloned().collect())
        }
        TokenKind::Division => {
            if !right.is_subset(&left) {
                return Err(Error::ill_formed(format!(
                    "the columns of the divisor of {} must all appear in the dividend",
                    token.literal
                )));
            }
            Ok(left.difference(&right).cloned().collect())
        }
        _ => Ok(left.union(&right).cloned().collect()),
    }
}

/// `alias."a" = null and alias."b" = null `, in column order.
pub fn null_conditions(columns: &ColumnSet, alias: &str, conf: &PrinterConfig) -> String {
    let last = columns.len().saturating_sub(1);
    let mut out = String::new();
    for (i, column) in columns.iter().enumerate() {
        out.push_str(alias);
        out.push('.');
        out.push_str(&conf.context.quote_identifier(column));
        out.push_str(if i == last { " = null " } else { " = null and " });
    }
    out
}
