//! Bulk `insert` and `upsert` commands.

use super::Context;
use crate::cli::{InsertArgs, UpsertArgs, WriteRowsArgs};
use crate::error::{Error, Result};
use crate::insert::{
    open_rows, BulkInsert, Encoding, InputSource, InsertOptions, Progress, SystemClock, WriteMode,
};
use std::time::Duration;
use tracing::info;

/// `dclient insert DATABASE TABLE FILE`
///
/// # Errors
///
/// Returns an error if the input cannot be read or any batch is rejected.
pub fn execute_insert(args: &InsertArgs, ctx: &Context) -> Result<()> {
    let mut options = InsertOptions::new(&args.rows.table, WriteMode::Insert);
    options.replace = args.replace;
    options.ignore = args.ignore;
    options.create = args.create;
    run(&args.rows, options, ctx)
}

/// `dclient upsert DATABASE TABLE FILE`
///
/// # Errors
///
/// Returns an error if the input cannot be read or any batch is rejected.
pub fn execute_upsert(args: &UpsertArgs, ctx: &Context) -> Result<()> {
    let options = InsertOptions::new(&args.rows.table, WriteMode::Upsert);
    run(&args.rows, options, ctx)
}

fn run(args: &WriteRowsArgs, mut options: InsertOptions, ctx: &Context) -> Result<()> {
    options.alter = args.alter;
    options.pks.clone_from(&args.pks);

    let bulk = configure(args, options)?;
    let encoding = args
        .encoding
        .as_deref()
        .map(str::parse::<Encoding>)
        .transpose()?
        .unwrap_or_default();

    let (client, target) = ctx.database_client(Some(&args.database), &args.conn)?;
    let source = open_rows(&InputSource::from(args.file.as_str()), args.format.format(), encoding)?;
    info!(database = %target.database, table = %bulk.options.table, format = %source.format, "Inserting rows");

    // JSON input already carries types
    let bulk = BulkInsert {
        detect_types: bulk.detect_types && !source.format.is_json(),
        ..bulk
    };
    let progress = Progress::for_source(&source, args.silent);

    bulk.run(source.rows, SystemClock, &progress, |request| {
        client.post_json(&request.path(), &request.body()).map(drop)
    })?;
    Ok(())
}

/// Validate the batching flags.
fn configure(args: &WriteRowsArgs, options: InsertOptions) -> Result<BulkInsert> {
    if args.batch_size == 0 {
        return Err(Error::InvalidArgument(
            "--batch-size must be at least 1".to_string(),
        ));
    }
    let interval = Duration::try_from_secs_f64(args.interval).map_err(|_| {
        Error::InvalidArgument(format!(
            "--interval must be a non-negative number of seconds, got {}",
            args.interval
        ))
    })?;

    Ok(BulkInsert {
        batch_size: args.batch_size,
        interval: Some(interval),
        detect_types: !args.no_detect_types,
        ..BulkInsert::new(options)
    })
}
