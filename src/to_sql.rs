use std::sync::LazyLock;

use regex::Regex;

use crate::ast::unqualified;

/// Dialect hooks used while printing SQL. Only identifier quoting differs
///  between the supported databases; the query shapes are the same.
pub trait PrinterContext: std::fmt::Debug + Send + Sync {
    fn quote_identifier(&self, name: &str) -> String;
    fn box_clone(&self) -> Box<dyn PrinterContext>;
}

impl Clone for Box<dyn PrinterContext> {
    fn clone(&self) -> Box<dyn PrinterContext> {
        self.box_clone()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PostgresPrinterContext;

impl PrinterContext for PostgresPrinterContext {
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
    fn box_clone(&self) -> Box<dyn PrinterContext> {
        Box::new(*self)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SqlitePrinterContext;

impl PrinterContext for SqlitePrinterContext {
    fn quote_identifier(&self, name: &str) -> String {
        // SQLite accepts the standard double quotes
        PostgresPrinterContext.quote_identifier(name)
    }
    fn box_clone(&self) -> Box<dyn PrinterContext> {
        Box::new(*self)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MssqlPrinterContext;

impl PrinterContext for MssqlPrinterContext {
    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }
    fn box_clone(&self) -> Box<dyn PrinterContext> {
        Box::new(*self)
    }
}

#[derive(Debug, Clone)]
pub struct PrinterConfig {
    pub context: Box<dyn PrinterContext>,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            context: Box::new(PostgresPrinterContext),
        }
    }
}

impl PrinterConfig {
    pub fn new(context: impl PrinterContext + 'static) -> Self {
        Self {
            context: Box::new(context),
        }
    }

    /// `name` => `"name"`, `t.name` => `t."name"`
    pub fn quote_column(&self, name: &str) -> String {
        match name.rsplit_once('.') {
            Some((table, column)) => format!("{table}.{}", self.context.quote_identifier(column)),
            None => self.context.quote_identifier(name),
        }
    }

    /// Quoted, comma separated projection list.
    pub fn column_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|name| self.quote_column(name))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Quotes every reference to one of `columns` in condition text.
    ///
    /// Only whole (possibly qualified) names are touched and single-quoted
    ///  literals are copied through untouched. A qualified reference keeps its
    ///  table (`sales.ProductID` => `sales."ProductID"`); an unqualified one
    ///  gets `qualifier` if there is one (`ProductID` => `q0."ProductID"`).
    pub fn quote_condition(&self, text: &str, columns: &[String], qualifier: Option<&str>) -> String {
        static NAME_OR_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"'[^']*'|[\p{L}_][\p{L}\p{N}_]*(?:\.[\p{L}_][\p{L}\p{N}_]*)*")
                .unwrap_or_else(|e| unreachable!("invalid name pattern: {e}"))
        });

        let mut out = String::with_capacity(text.len() + columns.len() * 2);
        let mut copied = 0;
        for m in NAME_OR_LITERAL.find_iter(text) {
            let found = m.as_str();
            if found.starts_with('\'') {
                continue;
            }
            let column = unqualified(found);
            if !columns.iter().any(|c| unqualified(c) == column) {
                continue;
            }

            out.push_str(&text[copied..m.start()]);
            let quoted = self.context.quote_identifier(column);
            match (found.len() > column.len(), qualifier) {
                (true, _) => {
                    // keep the table part, `sales.` in `sales.ProductID`
                    out.push_str(&found[..found.len() - column.len()]);
                    out.push_str(&quoted);
                }
                (false, Some(alias)) => {
                    out.push_str(alias);
                    out.push('.');
                    out.push_str(&quoted);
                }
                (false, None) => out.push_str(&quoted),
            }
            copied = m.end();
        }
        out.push_str(&text[copied..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn quote_identifiers() {
        let conf = PrinterConfig::default();
        assert_eq!(conf.quote_column("ProductID"), r#""ProductID""#);
        assert_eq!(conf.quote_column("sales.ProductID"), r#"sales."ProductID""#);
        assert_eq!(conf.quote_column(r#"odd"name"#), r#""odd""name""#);

        let conf = PrinterConfig::new(MssqlPrinterContext);
        assert_eq!(conf.quote_column("ProductID"), "[ProductID]");
        assert_eq!(conf.clone().quote_column("a]b"), "[a]]b]");
    }

    #[test]
    fn quote_column_lists() {
        let conf = PrinterConfig::default();
        assert_eq!(
            conf.column_list(&columns(&["variety", "petal_width"])),
            r#""variety","petal_width""#
        );
    }

    #[test]
    fn quote_conditions() {
        let conf = PrinterConfig::default();
        assert_eq!(
            conf.quote_condition("ProductID>2", &columns(&["ProductID"]), None),
            r#""ProductID">2"#
        );
        assert_eq!(
            conf.quote_condition(
                "sales.ProductID=products.ProductID",
                &columns(&["sales.ProductID"]),
                None
            ),
            r#"sales."ProductID"=products."ProductID""#
        );
        // Whole names only, never inside literals
        assert_eq!(
            conf.quote_condition("id=1 and idx='id'", &columns(&["id"]), None),
            r#""id"=1 and idx='id'"#
        );
    }

    #[test]
    fn qualify_conditions() {
        let conf = PrinterConfig::default();
        assert_eq!(
            conf.quote_condition("petal_width>0.1", &columns(&["petal_width"]), Some("q0")),
            r#"q0."petal_width">0.1"#
        );
        // Already qualified references keep their table
        assert_eq!(
            conf.quote_condition("s.a=1 or a=2", &columns(&["s.a", "a"]), Some("q3")),
            r#"s."a"=1 or q3."a"=2"#
        );
    }
}
