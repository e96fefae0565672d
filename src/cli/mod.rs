//! CLI definitions using clap.

use crate::config::CONFIG_DIR_ENV;
use crate::insert::InputFormat;
use crate::output::OutputFormat;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;

/// A client CLI utility for Datasette instances
#[derive(Parser, Debug)]
#[command(name = "dclient", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration directory (default: platform config dir for io.datasette.dclient)
    #[arg(long, global = true, env = CONFIG_DIR_ENV)]
    pub config_dir: Option<PathBuf>,

    /// Increase logging verbosity (-v requests, -vv bodies)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Name of the hidden subcommand that runs bare SQL.
pub const DEFAULT_QUERY_COMMAND: &str = "default-query";

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a SQL query against a Datasette database
    Query(QueryArgs),

    /// Run a SQL query against the default instance and database
    #[command(name = "default-query", hide = true)]
    DefaultQuery(DefaultQueryArgs),

    /// Browse rows in a table with filters, sorting and pagination
    Rows(RowsArgs),

    /// List databases on an instance
    Databases {
        #[command(flatten)]
        conn: InstanceArgs,

        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },

    /// List tables in a database
    Tables(TablesArgs),

    /// Show SQL schema for a database or specific table
    Schema {
        /// Table to show (default: the whole database)
        table: Option<String>,

        #[command(flatten)]
        conn: DatabaseArgs,

        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },

    /// List installed plugins on an instance
    Plugins {
        #[command(flatten)]
        conn: InstanceArgs,

        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the actor represented by an API token
    Actor {
        #[command(flatten)]
        conn: InstanceArgs,
    },

    /// Make an authenticated GET request to a Datasette instance
    Get {
        /// Path under the instance, e.g. /-/plugins.json
        path: String,

        #[command(flatten)]
        conn: InstanceArgs,
    },

    /// Insert data into a remote Datasette instance
    Insert(InsertArgs),

    /// Upsert data into a remote Datasette instance
    Upsert(UpsertArgs),

    /// Update a single row by primary key
    Update(UpdateArgs),

    /// Delete a single row by primary key
    Delete {
        /// Database name or full database URL
        database: String,
        table: String,
        /// Primary key (comma-separated for compound keys)
        pk: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,

        #[command(flatten)]
        conn: InstanceArgs,
    },

    /// Drop a table
    Drop {
        /// Database name or full database URL
        database: String,
        table: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,

        #[command(flatten)]
        conn: InstanceArgs,
    },

    /// Create a new empty table with an explicit schema
    CreateTable(CreateTableArgs),

    /// List known instances from the config
    Instances {
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage aliases for different instances
    Alias {
        #[command(subcommand)]
        command: AliasCommands,
    },

    /// Manage default instance and database
    Default {
        #[command(subcommand)]
        command: DefaultCommands,
    },

    /// Manage authentication for different instances
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Authenticate with a Datasette instance using the OAuth device flow
    Login {
        /// Instance URL or alias (prompted for when omitted)
        alias_or_url: Option<String>,

        /// JSON scope array to request
        #[arg(long)]
        scope: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Shared argument groups
// ============================================================================

/// Which instance to talk to and how to authenticate.
#[derive(Args, Debug, Clone, Default)]
pub struct InstanceArgs {
    /// Datasette instance URL or alias
    #[arg(short, long)]
    pub instance: Option<String>,

    /// API token
    #[arg(long)]
    pub token: Option<String>,
}

/// Instance plus database selection.
#[derive(Args, Debug, Clone, Default)]
pub struct DatabaseArgs {
    #[command(flatten)]
    pub instance: InstanceArgs,

    /// Database name
    #[arg(short, long)]
    pub database: Option<String>,
}

/// Output format flags (default: JSON).
#[derive(Args, Debug, Clone, Copy, Default)]
#[group(multiple = false)]
pub struct OutputArgs {
    /// Output as CSV
    #[arg(long)]
    pub csv: bool,

    /// Output as TSV
    #[arg(long)]
    pub tsv: bool,

    /// Output as newline-delimited JSON
    #[arg(long)]
    pub nl: bool,

    /// Output as a plain-text table
    #[arg(short = 't', long)]
    pub table: bool,
}

impl OutputArgs {
    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        if self.csv {
            OutputFormat::Csv
        } else if self.tsv {
            OutputFormat::Tsv
        } else if self.nl {
            OutputFormat::Nl
        } else if self.table {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    }
}

// ============================================================================
// Query commands
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Database name or full database URL
    pub database: String,

    /// SQL query to run
    pub sql: String,

    #[command(flatten)]
    pub conn: InstanceArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct DefaultQueryArgs {
    /// SQL query to run
    pub sql: String,

    #[command(flatten)]
    pub conn: DatabaseArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RowsArgs {
    /// `[DATABASE] TABLE` - the database defaults to the configured one
    #[arg(required = true, num_args = 1..=2, value_names = ["DATABASE", "TABLE"])]
    pub target: Vec<String>,

    /// Filter: column, operation (eq, gt, contains, ...) and value
    #[arg(short = 'f', long = "filter", num_args = 3, value_names = ["COLUMN", "OP", "VALUE"])]
    pub filters: Vec<String>,

    /// Raw SQL WHERE fragment
    #[arg(long = "where")]
    pub where_clauses: Vec<String>,

    /// Full-text search query
    #[arg(long)]
    pub search: Option<String>,

    /// Sort by column ascending
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort by column descending
    #[arg(long)]
    pub sort_desc: Option<String>,

    /// Only return these columns
    #[arg(long)]
    pub col: Vec<String>,

    /// Exclude these columns
    #[arg(long)]
    pub nocol: Vec<String>,

    /// Facet by column
    #[arg(long)]
    pub facet: Vec<String>,

    /// Rows per page
    #[arg(long)]
    pub size: Option<u32>,

    /// Maximum number of rows to return
    #[arg(long)]
    pub limit: Option<usize>,

    /// Follow pagination to fetch every page
    #[arg(long)]
    pub all: bool,

    #[command(flatten)]
    pub conn: InstanceArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TablesArgs {
    #[command(flatten)]
    pub conn: DatabaseArgs,

    /// Include views
    #[arg(long)]
    pub views: bool,

    /// Only show views
    #[arg(long)]
    pub views_only: bool,

    /// Include hidden tables
    #[arg(long)]
    pub hidden: bool,

    /// Output raw JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Write commands
// ============================================================================

/// Input format flags (default: sniffed from the file).
#[derive(Args, Debug, Clone, Copy, Default)]
#[group(multiple = false)]
pub struct InputFormatArgs {
    /// Input is CSV
    #[arg(long)]
    pub csv: bool,

    /// Input is TSV
    #[arg(long)]
    pub tsv: bool,

    /// Input is JSON
    #[arg(long)]
    pub json: bool,

    /// Input is newline-delimited JSON
    #[arg(long)]
    pub nl: bool,
}

impl InputFormatArgs {
    #[must_use]
    pub const fn format(&self) -> Option<InputFormat> {
        if self.csv {
            Some(InputFormat::Csv)
        } else if self.tsv {
            Some(InputFormat::Tsv)
        } else if self.json {
            Some(InputFormat::Json)
        } else if self.nl {
            Some(InputFormat::Nl)
        } else {
            None
        }
    }
}

/// Options shared by `insert` and `upsert`.
#[derive(Args, Debug, Clone)]
pub struct WriteRowsArgs {
    /// Database name or full database URL
    pub database: String,

    /// Table to write to
    pub table: String,

    /// File to read rows from, or - for standard input
    pub file: String,

    #[command(flatten)]
    pub format: InputFormatArgs,

    /// Character encoding for CSV/TSV
    #[arg(long)]
    pub encoding: Option<String>,

    /// Don't detect column types for CSV/TSV
    #[arg(long)]
    pub no_detect_types: bool,

    /// Alter table to add any missing columns
    #[arg(long)]
    pub alter: bool,

    /// Columns to use as the primary key when creating the table
    #[arg(long = "pk")]
    pub pks: Vec<String>,

    /// Send rows in batches of this size
    #[arg(long, default_value_t = crate::insert::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Send a batch at least every this many seconds
    #[arg(long, default_value_t = 10.0)]
    pub interval: f64,

    /// Don't output progress
    #[arg(long)]
    pub silent: bool,

    #[command(flatten)]
    pub conn: InstanceArgs,
}

#[derive(Args, Debug, Clone)]
pub struct InsertArgs {
    #[command(flatten)]
    pub rows: WriteRowsArgs,

    /// Replace rows with a matching primary key
    #[arg(long, conflicts_with = "ignore")]
    pub replace: bool,

    /// Ignore rows with a matching primary key
    #[arg(long)]
    pub ignore: bool,

    /// Create the table if it does not exist
    #[arg(long)]
    pub create: bool,
}

#[derive(Args, Debug, Clone)]
pub struct UpsertArgs {
    #[command(flatten)]
    pub rows: WriteRowsArgs,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    /// Database name or full database URL
    pub database: String,

    pub table: String,

    /// Primary key (comma-separated for compound keys)
    pub pk: String,

    /// Values to set, as COLUMN=VALUE
    #[arg(required = true, value_name = "COLUMN=VALUE")]
    pub values: Vec<String>,

    /// Alter table to add any missing columns
    #[arg(long)]
    pub alter: bool,

    #[command(flatten)]
    pub conn: InstanceArgs,
}

#[derive(Args, Debug, Clone)]
pub struct CreateTableArgs {
    /// Database name or full database URL
    pub database: String,

    /// Name of the new table
    pub table: String,

    /// Column definition: name and type (text, integer, float, blob)
    #[arg(short = 'c', long = "column", num_args = 2, value_names = ["NAME", "TYPE"])]
    pub columns: Vec<String>,

    /// Primary key column(s)
    #[arg(long = "pk")]
    pub pks: Vec<String>,

    #[command(flatten)]
    pub conn: InstanceArgs,
}

// ============================================================================
// Config commands
// ============================================================================

#[derive(Subcommand, Debug, Clone)]
pub enum AliasCommands {
    /// List aliases
    List {
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Add an alias for a Datasette instance
    Add {
        /// Alias name
        name: String,
        /// Instance URL
        url: String,
    },

    /// Remove an alias
    Remove {
        /// Alias name
        name: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum DefaultCommands {
    /// Set or show the default instance
    Instance {
        /// Alias or instance URL (omit to show the current default)
        alias_or_url: Option<String>,

        /// Clear the default instance
        #[arg(long, conflicts_with = "alias_or_url")]
        clear: bool,
    },

    /// Set or show the default database for an instance
    Database {
        /// Alias or instance URL
        alias_or_url: String,

        /// Database name (omit to show the current default)
        db: Option<String>,

        /// Clear the default database for this instance
        #[arg(long, conflicts_with = "db")]
        clear: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AuthCommands {
    /// Add an authentication token for an alias or URL
    Add {
        /// Alias or URL the token applies to
        alias_or_url: String,

        /// Token (prompted for when omitted)
        #[arg(long)]
        token: Option<String>,
    },

    /// List stored API tokens
    List,

    /// Remove the API token for an alias or URL
    Remove {
        /// Alias or URL
        alias_or_url: String,
    },

    /// Verify authentication by calling /-/actor.json
    Status {
        #[command(flatten)]
        conn: InstanceArgs,
    },
}

// ============================================================================
// Argument preprocessing
// ============================================================================

/// Route bare SQL to the hidden default-query subcommand.
///
/// `dclient "select 1"` becomes `dclient default-query "select 1"`. Global
/// flags before the SQL are left where they are; anything that already names
/// a subcommand, or starts with `-`, is left alone.
pub fn insert_default_query(args: impl IntoIterator<Item = String>) -> Vec<String> {
    const GLOBAL_FLAGS: &[&str] = &["--no-color", "--verbose"];
    const GLOBAL_FLAGS_WITH_VALUE: &[&str] = &["--config-dir"];

    let command = Cli::command();
    let is_subcommand = |name: &str| {
        name == "help"
            || command
                .get_subcommands()
                .any(|sc| sc.get_name() == name || sc.get_all_aliases().any(|a| a == name))
    };

    let mut args: Vec<String> = args.into_iter().collect();
    let mut i = 1;
    while i < args.len() {
        let arg = args[i].as_str();
        if GLOBAL_FLAGS_WITH_VALUE.contains(&arg) {
            i += 2;
        } else if GLOBAL_FLAGS.contains(&arg)
            || GLOBAL_FLAGS_WITH_VALUE
                .iter()
                .any(|f| arg.starts_with(&format!("{f}=")))
            || (arg.len() > 1 && arg.starts_with('-') && arg[1..].chars().all(|c| c == 'v'))
        {
            i += 1;
        } else {
            if !arg.starts_with('-') && !is_subcommand(arg) {
                args.insert(i, DEFAULT_QUERY_COMMAND.to_string());
            }
            break;
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_insert_default_query() {
        assert_eq!(
            insert_default_query(args(&["dclient", "select 1"])),
            args(&["dclient", "default-query", "select 1"])
        );
        assert_eq!(
            insert_default_query(args(&["dclient", "-v", "--config-dir", "/tmp/x", "select 1", "-t"])),
            args(&["dclient", "-v", "--config-dir", "/tmp/x", "default-query", "select 1", "-t"])
        );
    }

    #[test]
    fn test_insert_default_query_leaves_commands_alone() {
        for list in [
            &["dclient", "query", "data", "select 1"][..],
            &["dclient", "--no-color", "alias", "list"][..],
            &["dclient", "--help"][..],
            &["dclient", "help"][..],
            &["dclient"][..],
        ] {
            assert_eq!(insert_default_query(args(list)), args(list));
        }
    }

    #[test]
    fn test_parse_rows_filters() {
        let cli = Cli::try_parse_from([
            "dclient", "rows", "fixtures", "dogs", "-f", "name", "eq", "Cleo", "-f", "age", "gt", "3",
            "--col", "name", "--col", "age", "--csv",
        ])
        .unwrap();
        let Commands::Rows(rows) = cli.command else {
            panic!("expected rows");
        };
        assert_eq!(rows.target, vec!["fixtures", "dogs"]);
        assert_eq!(rows.filters, vec!["name", "eq", "Cleo", "age", "gt", "3"]);
        assert_eq!(rows.col, vec!["name", "age"]);
        assert_eq!(rows.output.format(), OutputFormat::Csv);
    }

    #[test]
    fn test_output_flags_are_exclusive() {
        let result = Cli::try_parse_from(["dclient", "query", "data", "select 1", "--csv", "--nl"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_create_table_columns() {
        let cli = Cli::try_parse_from([
            "dclient", "create-table", "data", "cats", "--column", "id", "integer", "-c", "name",
            "text", "--pk", "id",
        ])
        .unwrap();
        let Commands::CreateTable(args) = cli.command else {
            panic!("expected create-table");
        };
        assert_eq!(args.columns, vec!["id", "integer", "name", "text"]);
        assert_eq!(args.pks, vec!["id"]);
    }

    #[test]
    fn test_insert_defaults() {
        let cli = Cli::try_parse_from(["dclient", "insert", "data", "dogs", "dogs.csv"]).unwrap();
        let Commands::Insert(args) = cli.command else {
            panic!("expected insert");
        };
        assert_eq!(args.rows.batch_size, 100);
        assert!((args.rows.interval - 10.0).abs() < f64::EPSILON);
        assert_eq!(args.rows.format.format(), None);
    }
}
