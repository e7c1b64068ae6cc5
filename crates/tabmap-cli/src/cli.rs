//! CLI argument definitions for `tabmap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use tabmap_model::{Authority, Category, EntityType};

#[derive(Parser)]
#[command(
    name = "tabmap",
    version,
    about = "Classify spreadsheet columns and map them onto entity fields",
    long_about = "Classify the columns of a CSV tab, pick key columns, map entity \
                  columns onto schema fields and commit the result.\n\n\
                  Work in progress is kept as a draft between invocations."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Configuration file (default: platform config folder).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding drafts and committed mappings.
    #[arg(long = "state-dir", value_name = "DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// JSON field schema (default: built-in schema).
    #[arg(long = "schema", value_name = "PATH", global = true)]
    pub schema: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the current classification of a tab.
    Show(TabArgs),

    /// Set the category of one or more columns.
    Categorize(CategorizeArgs),

    /// Toggle the key flag of an entity column.
    Key(ColumnArgs),

    /// Set or clear the target field of an entity column.
    Field(FieldArgs),

    /// Mark a column as source of truth or reference.
    Authority(AuthorityArgs),

    /// Re-read the columns from a different header row.
    HeaderRow(HeaderRowArgs),

    /// Move to the next phase (preview, classify, map).
    Advance(TabArgs),

    /// Return from field mapping to classification.
    Back(TabArgs),

    /// Commit the mapping and discard the draft.
    Commit(TabArgs),

    /// List the fields of the schema.
    Fields(FieldsArgs),
}

#[derive(Args)]
pub struct TabArgs {
    /// CSV file holding the tab; its name without extension is the tab name.
    #[arg(value_name = "CSV")]
    pub csv: PathBuf,

    /// Source identifier (default: name of the folder holding the CSV).
    #[arg(long = "source-id", value_name = "ID")]
    pub source_id: Option<String>,
}

#[derive(Args)]
pub struct ColumnArgs {
    #[command(flatten)]
    pub tab: TabArgs,

    /// Column position, starting at 0.
    #[arg(long = "column", short = 'c', value_name = "N")]
    pub column: usize,
}

#[derive(Args)]
pub struct CategorizeArgs {
    #[command(flatten)]
    pub tab: TabArgs,

    /// Column positions, comma separated.
    #[arg(
        long = "column",
        short = 'c',
        value_name = "N",
        value_delimiter = ',',
        required = true
    )]
    pub columns: Vec<usize>,

    /// partner, staff, asin, weekly, computed, skip or unclassified.
    #[arg(value_name = "CATEGORY")]
    pub category: Category,
}

#[derive(Args)]
pub struct FieldArgs {
    #[command(flatten)]
    pub column: ColumnArgs,

    /// Schema field name; omit to clear.
    #[arg(value_name = "FIELD")]
    pub field: Option<String>,
}

#[derive(Args)]
pub struct AuthorityArgs {
    #[command(flatten)]
    pub column: ColumnArgs,

    /// source-of-truth or reference.
    #[arg(value_name = "AUTHORITY")]
    pub authority: Authority,
}

#[derive(Args)]
pub struct HeaderRowArgs {
    #[command(flatten)]
    pub tab: TabArgs,

    /// Row position of the header, starting at 0.
    #[arg(value_name = "ROW")]
    pub row: usize,
}

#[derive(Args)]
pub struct FieldsArgs {
    /// Only list fields of this entity.
    #[arg(long = "entity", value_name = "ENTITY")]
    pub entity: Option<EntityType>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
