//! Translates relational algebra expressions into SQL.
//!
//! Translation runs in three stages, each usable on its own:
//!  [lex::tokenize] turns text into tokens, [parser::parse] orders them
//!  postfix, and [translate::transform] generates the query.
//!
//! ```
//! # use ra2sql::translate::columns::EmptyCatalog;
//! let query = ra2sql::translate("σ ProductID > 2 (sales)", &EmptyCatalog).unwrap();
//! assert_eq!(query.sql_text(), r#"select * from sales where "ProductID">2;"#);
//! ```

pub mod ast;
pub mod error;
pub mod fuzz_helper;
pub mod lex;
pub mod parser;
pub mod to_sql;
pub mod translate;

#[cfg(test)]
mod tests;

use error::Result;
use to_sql::PrinterConfig;
use translate::{Query, columns::ColumnCatalog};

/// Runs the whole pipeline on `text`, generating Postgres flavoured SQL.
pub fn translate<C: ColumnCatalog + ?Sized>(text: &str, catalog: &C) -> Result<Query> {
    translate_with(text, catalog, &PrinterConfig::default())
}

pub fn translate_with<C: ColumnCatalog + ?Sized>(
    text: &str,
    catalog: &C,
    conf: &PrinterConfig,
) -> Result<Query> {
    let postfix = parser::parse(lex::tokenize(text)?)?;
    translate::transform_with(&postfix, catalog, conf)
}
