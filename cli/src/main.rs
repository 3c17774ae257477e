mod args;
mod uri;

use std::process::ExitCode;

use clap::Parser;
use tokio_stream::StreamExt;

use rdiff_adapter::contract::DatabaseAdapter;
use rdiff_common::config::{read_config, to_string_pretty, DifferConfig, Format};
use rdiff_common::err::{CResult, ReError};
use rdiff_common::log::TracingFactory;
use rdiff_common::types::Sign;
use rdiff_engine::TableDiffer;
use rdiff_segment::{KeyKind, TableSegment};

use args::CliArgs;
use uri::{build_adapter, parse_table_uri};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    TracingFactory::init_log(args.debug);

    match run(args).await {
        Ok(true) => ExitCode::from(1),
        Ok(false) => ExitCode::from(0),
        Err(e) => {
            eprintln!("rdiff: {e}");
            ExitCode::from(2)
        }
    }
}

/// Runs one diff to completion. Returns `true` if any difference was
/// found, matching the exit-code contract in spec.md §6.
async fn run(args: CliArgs) -> CResult<bool> {
    let format = parse_format(&args.format);
    let key_kind = parse_key_kind(&args.key_kind)?;

    let mut config = match args.config.as_ref() {
        Some(path) => read_config(path)?,
        None => DifferConfig::default(),
    };
    config.source_uri = args.source.clone();
    config.target_uri = args.target.clone();
    if let Some(factor) = args.bisection_factor {
        config.bisection_factor = factor;
    }
    if let Some(threshold) = args.bisection_threshold {
        config.bisection_threshold = threshold;
    }
    if let Some(threads) = args.threads {
        config.max_threadpool_size = threads;
    }

    if args.debug {
        eprintln!("config:\n{}", to_string_pretty(format, &config));
    }

    let source = parse_table_uri(&config.source_uri)?;
    let target = parse_table_uri(&config.target_uri)?;

    let source_adapter = build_adapter(&source, &args.default_schema, args.interactive)?;
    let target_adapter = build_adapter(&target, &args.default_schema, args.interactive)?;
    source_adapter.connect().await?;
    target_adapter.connect().await?;

    let seg_a = TableSegment::new(
        source_adapter.clone(),
        source.table,
        args.key.clone(),
        key_kind,
        args.update_column.clone(),
        args.columns.clone(),
        args.case_sensitive,
    );
    let seg_b = TableSegment::new(
        target_adapter.clone(),
        target.table,
        args.key.clone(),
        key_kind,
        args.update_column.clone(),
        args.columns.clone(),
        args.case_sensitive,
    );

    let differ = TableDiffer::new(config.bisection_factor, config.bisection_threshold, config.max_threadpool_size)?;
    let (mut stream, stats) = differ.diff_tables(seg_a, seg_b);

    let mut found_diff = false;
    while let Some(record) = stream.next().await {
        let record = record?;
        found_diff = true;
        println!("{} {}", sign_marker(record.sign), record.row.join(", "));
    }

    source_adapter.close().await?;
    target_adapter.close().await?;

    eprintln!("stats:\n{}", to_string_pretty(format, &stats.snapshot()));

    Ok(found_diff)
}

fn sign_marker(sign: Sign) -> &'static str {
    match sign {
        Sign::Minus => "-",
        Sign::Plus => "+",
    }
}

fn parse_format(raw: &str) -> Format {
    match raw.to_lowercase().as_str() {
        "json" => Format::Json,
        "yaml" | "yml" => Format::Yaml,
        _ => Format::None,
    }
}

fn parse_key_kind(raw: &str) -> CResult<KeyKind> {
    match raw.to_lowercase().as_str() {
        "integer" | "int" => Ok(KeyKind::Integer),
        "uuid" => Ok(KeyKind::Uuid),
        other => Err(ReError::ValueError(format!("unrecognized --key-kind {other:?}, expected integer or uuid"))),
    }
}
