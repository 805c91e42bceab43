//! Reads relational algebra expressions from stdin, one per line, and prints
//!  the SQL for each.
//!
//! ```bash
//! echo "σ ProductID > 2 (sales)" | ra2sql
//! # Tables for anti joins come from the headers of a directory of CSV files
//! echo "(sales) ▷ (products)" | ra2sql --tables ./data
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use csv::ReaderBuilder;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ra2sql::{
    to_sql::{MssqlPrinterContext, PostgresPrinterContext, PrinterConfig, SqlitePrinterContext},
    translate::columns::ColumnSet,
};

#[derive(Parser, Debug)]
#[command(name = "ra2sql", version, about = "Translate relational algebra into SQL")]
struct Args {
    /// Directory of CSV files; each file's stem names a table and its header
    ///  row lists the table's columns
    #[arg(short, long)]
    tables: Option<PathBuf>,

    /// Identifier quoting style
    #[arg(short, long, value_enum, default_value_t = Dialect::Postgres)]
    dialect: Dialect,

    /// Print the translation time before each query
    #[arg(long)]
    timing: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Dialect {
    Postgres,
    Sqlite,
    Mssql,
}

impl From<Dialect> for PrinterConfig {
    fn from(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Postgres => PrinterConfig::new(PostgresPrinterContext),
            Dialect::Sqlite => PrinterConfig::new(SqlitePrinterContext),
            Dialect::Mssql => PrinterConfig::new(MssqlPrinterContext),
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let catalog = match &args.tables {
        Some(dir) => load_catalog(dir)?,
        None => HashMap::new(),
    };
    let conf = PrinterConfig::from(args.dialect);

    for line in std::io::stdin().lines() {
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let now = std::time::Instant::now();
        let res = ra2sql::translate_with(&line, &catalog, &conf);
        if args.timing {
            print!("[in {}μs] ", now.elapsed().as_micros());
        }
        // A bad expression doesn't stop the ones after it
        match res {
            Ok(query) => println!("{query}"),
            Err(e) => println!("Error translating {line:?}: {e}"),
        }
    }
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Builds the table catalog from the header rows of `dir/*.csv`.
fn load_catalog(dir: &Path) -> Result<HashMap<String, ColumnSet>> {
    let mut catalog = HashMap::new();
    let entries = std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
            continue;
        }
        let Some(table) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        let columns: ColumnSet = rdr
            .headers()
            .with_context(|| format!("reading the header of {}", path.display()))?
            .iter()
            .map(str::to_string)
            .collect();

        debug!(table, columns = columns.len(), "loaded table");
        catalog.insert(table.to_string(), columns);
    }
    Ok(catalog)
}
