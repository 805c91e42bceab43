use std::collections::{BTreeSet, HashMap};

use crate::{
    to_sql::{MssqlPrinterContext, PrinterConfig},
    translate::columns::ColumnSet,
};

fn catalog() -> HashMap<String, ColumnSet> {
    let columns = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();
    HashMap::from([
        ("A".to_string(), columns(&["id", "a"])),
        ("B".to_string(), columns(&["id", "b"])),
        ("sales".to_string(), columns(&["ProductID", "Quantity"])),
        ("products".to_string(), columns(&["ProductID", "Name"])),
    ])
}

/// Drives the whole pipeline; errors are fine, panics are not.
pub fn translate_expr(expr: &str) {
    let catalog = catalog();
    _ = crate::translate(expr, &catalog);
    _ = crate::translate_with(expr, &catalog, &PrinterConfig::new(MssqlPrinterContext));
}
