//! dclient CLI entry point.

use clap::Parser;
use dclient::cli::commands::{self, Context};
use dclient::cli::{insert_default_query, Cli, Commands};
use dclient::config::{migrate_v1_to_v2, ConfigLocation, Environment};
use dclient::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_from(insert_default_query(std::env::args()));

    if cli.no_color {
        colored::control::set_override(false);
    }
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(hint) = e.hint() {
                eprintln!("Error: {e}\n  Hint: {hint}");
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,hyper=info,reqwest=info,rustls=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli) -> Result<(), Error> {
    // These never touch the config directory
    match &cli.command {
        Commands::Version => {
            commands::version::execute();
            return Ok(());
        }
        Commands::Completions { shell } => return commands::completions::execute(*shell),
        _ => {}
    }

    let location = ConfigLocation::discover(cli.config_dir.as_deref())?;
    migrate_v1_to_v2(&location)?;
    let ctx = Context::new(location, Environment::from_process());

    match &cli.command {
        // Queries
        Commands::Query(args) => commands::query::execute(args, &ctx),
        Commands::DefaultQuery(args) => commands::query::execute_default(args, &ctx),
        Commands::Rows(args) => commands::rows::execute(args, &ctx),

        // Introspection
        Commands::Databases { conn, json } => {
            commands::introspect::execute_databases(conn, *json, &ctx)
        }
        Commands::Tables(args) => commands::introspect::execute_tables(args, &ctx),
        Commands::Schema { table, conn, json } => {
            commands::introspect::execute_schema(table.as_deref(), conn, *json, &ctx)
        }
        Commands::Plugins { conn, json } => commands::introspect::execute_plugins(conn, *json, &ctx),
        Commands::Actor { conn } => commands::introspect::execute_actor(conn, &ctx),
        Commands::Get { path, conn } => commands::get::execute(path, conn, &ctx),

        // Writes
        Commands::Insert(args) => commands::insert::execute_insert(args, &ctx),
        Commands::Upsert(args) => commands::insert::execute_upsert(args, &ctx),
        Commands::Update(args) => commands::write::execute_update(args, &ctx),
        Commands::Delete {
            database,
            table,
            pk,
            yes,
            conn,
        } => commands::write::execute_delete(database, table, pk, *yes, conn, &ctx),
        Commands::Drop {
            database,
            table,
            yes,
            conn,
        } => commands::write::execute_drop(database, table, *yes, conn, &ctx),
        Commands::CreateTable(args) => commands::write::execute_create_table(args, &ctx),

        // Configuration
        Commands::Instances { json } => commands::alias::execute_instances(*json, &ctx),
        Commands::Alias { command } => commands::alias::execute(command, &ctx),
        Commands::Default { command } => commands::default::execute(command, &ctx),
        Commands::Auth { command } => commands::auth::execute(command, &ctx),
        Commands::Login {
            alias_or_url,
            scope,
        } => commands::login::execute(alias_or_url.as_deref(), scope.as_deref(), &ctx),

        Commands::Version | Commands::Completions { .. } => Ok(()),
    }
}
