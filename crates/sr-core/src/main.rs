//! schema-relay command line.
//!
//! - `schema`: print the inferred schema of a JSON payload
//! - `track`: track one payload through a configured inspector and flush
//! - `queue`: report what is waiting in the durable queue

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use sr_common::Error;
use sr_config::{resolve_config, InspectorConfig};
use sr_core::exit_codes::ExitCode;
use sr_core::input::read_payload;
use sr_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use sr_core::{Inspector, QueueReport};
use sr_telemetry::SchemaExtractor;
use tracing::error;

/// schema-relay - event schema inference and delivery
#[derive(Parser)]
#[command(name = "schema-relay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to the options file
    #[arg(long, global = true, env = "SR_CONFIG")]
    config: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format on stderr (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the inferred schema of a JSON payload
    Schema(SchemaArgs),

    /// Track one payload and deliver it before exiting
    Track(TrackArgs),

    /// Show the persisted queue
    Queue,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Payload file, or - for stdin
    input: PathBuf,

    /// Maximum nesting depth
    #[arg(long)]
    max_depth: Option<usize>,
}

#[derive(Args, Debug)]
struct TrackArgs {
    /// Event name
    #[arg(long, short = 'e')]
    event: String,

    /// Payload file, or - for stdin
    input: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env(cli.global.log_level, cli.global.log_format);
    init_logging(&log_config);

    let exit_code = match build_runtime() {
        Ok(runtime) => runtime.block_on(async {
            match &cli.command {
                Commands::Schema(args) => run_schema(args),
                Commands::Track(args) => run_track(&cli.global, args).await,
                Commands::Queue => run_queue(&cli.global).await,
            }
        }),
        Err(e) => {
            eprintln!("schema-relay: cannot start async runtime: {}", e);
            ExitCode::InternalError
        }
    };

    std::process::exit(exit_code.as_i32());
}

fn build_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
}

/// Log an error and print it for humans, returning its exit code.
fn fail(err: Error) -> ExitCode {
    let code = ExitCode::from(&err);
    error!(code = err.code(), exit = %code, error = %err, "command failed");
    eprintln!("{}", err.format_human());
    code
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(out) => {
            println!("{}", out);
            ExitCode::Clean
        }
        Err(e) => fail(e.into()),
    }
}

fn load_config(global: &GlobalOpts) -> Result<InspectorConfig, Error> {
    Ok(resolve_config(global.config.as_deref())?)
}

fn run_schema(args: &SchemaArgs) -> ExitCode {
    let payload = match read_payload(&args.input) {
        Ok(v) => v,
        Err(e) => return fail(e),
    };
    let extractor = args
        .max_depth
        .map(SchemaExtractor::new)
        .unwrap_or_default();
    match extractor.extract(&payload) {
        Ok(schema) => print_json(&schema),
        Err(e) => fail(e.into()),
    }
}

async fn run_track(global: &GlobalOpts, args: &TrackArgs) -> ExitCode {
    let payload = match read_payload(&args.input) {
        Ok(v) => v,
        Err(e) => return fail(e),
    };
    let config = match load_config(global) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let inspector = match Inspector::from_config(config).await {
        Ok(i) => i,
        Err(e) => return fail(e),
    };

    let schema = inspector.track_schema_from_event(&args.event, &payload);
    let session_id = inspector.session_id();
    match inspector.shutdown().await {
        Ok(delivered) => print_json(&json!({
            "event": args.event,
            "schema": schema,
            "session_id": session_id,
            "delivered": delivered,
        })),
        Err(e) => fail(e),
    }
}

async fn run_queue(global: &GlobalOpts) -> ExitCode {
    let config = match load_config(global) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let report = QueueReport::load(&config.storage_dir).await;
    print_json(&report)
}
