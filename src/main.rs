//! op-deadline: inspect and exercise operation deadline contexts.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──▶ config ──▶ TimeoutOptions ──▶ context factory
//!                                                     │
//!                                   ┌─────────────────┴───────────────┐
//!                                   ▼                                 ▼
//!                         Unified (one deadline)          PerStep (legacy timeouts)
//!                                   │                                 │
//!                                   └───────────────┬─────────────────┘
//!                                                   ▼
//!        retry executor ──▶ select_server ──▶ pool checkout ──▶ write ──▶ read
//! ```

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use op_deadline::config::loader::load_config;
use op_deadline::config::ProbeConfig;
use op_deadline::context::{create_deadline_context, SharedDeadlineContext, TimeoutOptions};
use op_deadline::observability::{logging, metrics};
use op_deadline::operation::{CommandOptions, OperationRunner, SimulatedTransport};
use op_deadline::pool::ConnectionPool;
use op_deadline::resilience::RetryExecutor;
use op_deadline::Command;

#[derive(Parser)]
#[command(name = "op-deadline")]
#[command(about = "Inspect and simulate operation deadline contexts", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured log level
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the delays each phase receives from a fresh context
    Inspect,
    /// Run one operation against a simulated server
    Simulate {
        /// Server selection latency in milliseconds
        #[arg(long, default_value_t = 5)]
        selection_ms: u64,

        /// Socket write latency in milliseconds
        #[arg(long, default_value_t = 5)]
        write_ms: u64,

        /// Socket read latency in milliseconds
        #[arg(long, default_value_t = 20)]
        read_ms: u64,

        /// Number of reads that fail with a connection reset
        #[arg(long, default_value_t = 0)]
        fail_first: u32,

        /// Print the Prometheus metrics snapshot after the report
        #[arg(long)]
        metrics: bool,
    },
}

#[derive(Serialize)]
struct InspectReport {
    mode: &'static str,
    remaining_ms: Option<u64>,
    server_selection_ms: Option<u64>,
    connection_checkout_ms: Option<u64>,
    socket_write_ms: Option<u64>,
    socket_read_ms: Option<u64>,
    request_budget_ms: Option<u64>,
    socket_timeout_ms: u64,
}

#[derive(Serialize)]
struct SimulationReport {
    mode: &'static str,
    retry_policy: &'static str,
    success: bool,
    attempts: u32,
    elapsed_ms: u64,
    reply: Option<serde_json::Value>,
    error: Option<String>,
    sent: Vec<Command>,
}

fn mode(ctx: &SharedDeadlineContext) -> &'static str {
    if ctx.lock().uses_operation_deadline() {
        "unified"
    } else {
        "per_step"
    }
}

fn millis(duration: Option<Duration>) -> Option<u64> {
    duration.map(|d| d.as_millis() as u64)
}

fn inspect(config: &ProbeConfig) -> Result<InspectReport, Box<dyn std::error::Error>> {
    let options = TimeoutOptions::try_from(&config.timeouts)?;
    let ctx = create_deadline_context(&options)?;
    let mode = mode(&ctx);
    let mut guard = ctx.lock();

    let selection = guard.selection_delay();
    let checkout = guard.checkout_delay()?;
    let report = InspectReport {
        mode,
        remaining_ms: guard.remaining().as_millis(),
        server_selection_ms: millis(selection.as_ref().map(|d| d.duration())),
        connection_checkout_ms: millis(checkout.as_ref().map(|d| d.duration())),
        socket_write_ms: millis(guard.socket_write_delay().map(|d| d.duration())),
        socket_read_ms: millis(guard.socket_read_delay().map(|d| d.duration())),
        request_budget_ms: millis(guard.per_command_budget()),
        socket_timeout_ms: guard.socket_side_timeout().as_millis() as u64,
    };
    guard.clear();
    Ok(report)
}

struct Latencies {
    selection: Duration,
    write: Duration,
    read: Duration,
    fail_first: u32,
}

async fn simulate(
    config: &ProbeConfig,
    latencies: Latencies,
) -> Result<SimulationReport, Box<dyn std::error::Error>> {
    let options = TimeoutOptions::try_from(&config.timeouts)?;
    let ctx = create_deadline_context(&options)?;
    let runner = OperationRunner::new(
        ConnectionPool::new(&config.pool),
        SimulatedTransport::new(latencies.write, latencies.read).failing_first(latencies.fail_first),
    );
    let executor = RetryExecutor::new(config.retries.clone());

    let selection_latency = latencies.selection;
    let started = tokio::time::Instant::now();
    let mut attempts = 0;
    let outcome = executor
        .execute(&ctx, |attempt_ctx, attempt| {
            attempts = attempt;
            let runner = &runner;
            async move {
                runner
                    .run(
                        &attempt_ctx,
                        tokio::time::sleep(selection_latency),
                        Command::new("ping"),
                        CommandOptions::default(),
                    )
                    .await
            }
        })
        .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let (reply, error) = match outcome {
        Ok(reply) => (Some(reply), None),
        Err(err) => {
            tracing::error!(error = %err, attempts, "Simulated operation failed");
            (None, Some(err.to_string()))
        }
    };

    Ok(SimulationReport {
        mode: mode(&ctx),
        retry_policy: config.retries.deadline.as_str(),
        success: error.is_none(),
        attempts,
        elapsed_ms,
        reply,
        error,
        sent: runner.transport().sent(),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProbeConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    logging::init_logging(&config.observability)?;

    tracing::info!(
        timeout_ms = ?config.timeouts.timeout_ms,
        server_selection_timeout_ms = ?config.timeouts.server_selection_timeout_ms,
        wait_queue_timeout_ms = ?config.timeouts.wait_queue_timeout_ms,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Inspect => {
            let report = inspect(&config)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Simulate {
            selection_ms,
            write_ms,
            read_ms,
            fail_first,
            metrics: print_metrics,
        } => {
            let handle = if print_metrics || config.observability.metrics_enabled {
                Some(metrics::install_prometheus()?)
            } else {
                None
            };
            let latencies = Latencies {
                selection: Duration::from_millis(selection_ms),
                write: Duration::from_millis(write_ms),
                read: Duration::from_millis(read_ms),
                fail_first,
            };

            tokio::select! {
                report = simulate(&config, latencies) => {
                    println!("{}", serde_json::to_string_pretty(&report?)?);
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("Simulation interrupted");
                    return Ok(());
                }
            }

            if let Some(handle) = handle.filter(|_| print_metrics) {
                println!("{}", handle.render());
            }
        }
    }

    Ok(())
}
