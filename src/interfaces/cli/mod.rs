/// CLI Interface Module
///
/// Runs the matching engine as a standalone process fed by a
/// newline-delimited JSON stream of commands (see [`replay`]).
///
/// ## Responsibilities
/// - Parse command-line arguments
/// - Initialize logging
/// - Wire repository, event bus, mirror, orchestrator and dispatcher
/// - Optionally expose metrics/health over HTTP
/// - Replay the input, wait for matching to settle, print bookings

pub mod replay;

use crate::application::ports::{BookMirror, OrderRepository};
use crate::application::services::{BookRegistry, MatchingService, PartitionConfig, PartitionedDispatcher};
use crate::application::use_cases::{CompleteBookingUseCase, CreateOrderUseCase};
use crate::domain::ids::SequenceGenerator;
use crate::infrastructure::eventbus::InMemoryEventBus;
use crate::infrastructure::mirror::{InMemorySortedSetMirror, NoopMirror};
use crate::infrastructure::observability::ObservabilityServer;
use crate::infrastructure::persistence::InMemoryOrderRepository;
use crate::shared::health::HealthChecker;
use clap::Parser;
use replay::{ReplayError, ReplayStats, Replayer};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncWriteExt, BufReader};
use tracing::{error, info};

/// Pickup matching engine command line configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "pickup-matching")]
#[command(version)]
#[command(about = "Airport pickup order-book matching engine", long_about = None)]
pub struct CliConfig {
    /// Worker partitions (0 = number of CPU cores)
    #[arg(short = 'n', long, default_value_t = 0)]
    pub partitions: usize,

    /// Queue capacity per partition
    #[arg(short = 'q', long, default_value_t = 1024)]
    pub queue_capacity: usize,

    /// Log level, overridden by RUST_LOG
    #[arg(short = 'l', long, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: String,

    /// Newline-delimited JSON commands; `-` reads stdin
    #[arg(short, long, default_value = "-")]
    pub input: PathBuf,

    /// Port of the metrics/health server (0 disables it)
    #[arg(short = 'm', long, default_value_t = 0)]
    pub metrics_port: u16,

    /// Do not mirror the books
    #[arg(long, default_value_t = false)]
    pub no_mirror: bool,

    /// Number bookings `booking-1`, `booking-2`, ... instead of random ids
    #[arg(long, default_value_t = false)]
    pub sequential_ids: bool,

    /// Only print the configuration
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

impl CliConfig {
    pub fn partition_config(&self) -> PartitionConfig {
        let defaults = PartitionConfig::default();
        PartitionConfig {
            partition_count: if self.partitions == 0 {
                defaults.partition_count
            } else {
                self.partitions
            },
            queue_capacity: self.queue_capacity,
        }
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot open input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error("cannot write output: {0}")]
    Output(#[source] std::io::Error),
}

/// Runs the CLI application
pub async fn run() -> Result<(), CliError> {
    let config = CliConfig::parse();
    init_logging(&config.log_level);

    let partitions = config.partition_config();
    info!(
        partitions = partitions.partition_count,
        queue_capacity = partitions.queue_capacity,
        input = %config.input.display(),
        metrics_port = config.metrics_port,
        mirror = !config.no_mirror,
        "pickup matching engine starting"
    );

    if config.dry_run {
        println!("{config:#?}");
        return Ok(());
    }

    let input = open_input(&config).await?;
    let stats = if config.no_mirror {
        serve(&config, Arc::new(NoopMirror), input).await?
    } else {
        serve(&config, Arc::new(InMemorySortedSetMirror::new()), input).await?
    };

    info!(
        commands = stats.commands,
        rejected = stats.rejected,
        bookings = stats.bookings,
        "replay finished"
    );
    Ok(())
}

async fn open_input(config: &CliConfig) -> Result<Box<dyn AsyncBufRead + Unpin + Send>, CliError> {
    if config.input.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(&config.input)
        .await
        .map_err(|source| CliError::Input {
            path: config.input.clone(),
            source,
        })?;
    Ok(Box::new(BufReader::new(file)))
}

async fn serve<M>(
    config: &CliConfig,
    mirror: Arc<M>,
    input: Box<dyn AsyncBufRead + Unpin + Send>,
) -> Result<ReplayStats, CliError>
where
    M: BookMirror + 'static,
{
    let repository = Arc::new(InMemoryOrderRepository::new());
    // nothing reads the publish history in a running process
    let bus = Arc::new(InMemoryEventBus::with_history(0));
    let books = Arc::new(BookRegistry::new());
    let health = Arc::new(HealthChecker::default());

    let mut service = MatchingService::new(repository.clone(), bus.clone(), mirror)
        .with_books(books.clone())
        .with_health(health.clone());
    if config.sequential_ids {
        service = service.with_id_generator(Arc::new(SequenceGenerator::new("booking")));
    }

    if config.metrics_port != 0 {
        let server = ObservabilityServer::new(config.metrics_port, books.clone(), health.clone());
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!(error = %e, "observability server stopped");
            }
        });
    }

    let dispatcher = PartitionedDispatcher::new(Arc::new(service), config.partition_config());
    let handle = dispatcher.spawn(bus.subscribe());

    let replayer = Replayer::new(
        CreateOrderUseCase::new(repository.clone(), bus.clone()),
        CompleteBookingUseCase::new(repository.clone(), bus.clone()),
        bus.clone(),
    );
    let stats = replayer.run(input).await?;

    bus.wait_idle().await;
    bus.close();
    handle.join().await;

    for depth in books.snapshot() {
        info!(
            market = %format!("{}:{}", depth.airport_code, depth.vehicle_type),
            requests = depth.depth.requests,
            offers = depth.depth.offers,
            "resting"
        );
    }

    let bookings = repository.list_bookings().await.map_err(ReplayError::from)?;
    let mut stdout = tokio::io::stdout();
    for booking in &bookings {
        let mut line = serde_json::to_string(booking).map_err(ReplayError::from)?;
        line.push('\n');
        stdout.write_all(line.as_bytes()).await.map_err(CliError::Output)?;
    }
    stdout.flush().await.map_err(CliError::Output)?;

    Ok(ReplayStats {
        bookings: bookings.len(),
        ..stats
    })
}

/// Initializes the tracing subscriber; `RUST_LOG` wins over `level`
fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_config_default() {
        let config = CliConfig::parse_from(["pickup-matching"]);
        assert_eq!(config.partitions, 0);
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.input, PathBuf::from("-"));
        assert_eq!(config.metrics_port, 0);
        assert!(!config.no_mirror);
        assert!(!config.sequential_ids);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_cli_config_custom() {
        let config = CliConfig::parse_from([
            "pickup-matching",
            "--partitions", "8",
            "--queue-capacity", "2048",
            "--log-level", "debug",
            "--input", "events.jsonl",
            "--metrics-port", "9090",
            "--no-mirror",
            "--sequential-ids",
            "--dry-run",
        ]);

        assert_eq!(config.partitions, 8);
        assert_eq!(config.queue_capacity, 2048);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.input, PathBuf::from("events.jsonl"));
        assert_eq!(config.metrics_port, 9090);
        assert!(config.no_mirror);
        assert!(config.sequential_ids);
        assert!(config.dry_run);
    }

    #[test]
    fn test_cli_config_short_flags() {
        let config = CliConfig::parse_from(["pickup-matching", "-n", "4", "-q", "512", "-l", "warn", "-i", "x.jsonl"]);
        assert_eq!(config.partitions, 4);
        assert_eq!(config.queue_capacity, 512);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.input, PathBuf::from("x.jsonl"));
    }

    #[test]
    fn test_partition_config_auto_detects_cpus() {
        let config = CliConfig::parse_from(["pickup-matching"]);
        assert_eq!(config.partition_config().partition_count, num_cpus::get());

        let config = CliConfig::parse_from(["pickup-matching", "-n", "3"]);
        assert_eq!(config.partition_config().partition_count, 3);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        assert!(CliConfig::try_parse_from(["pickup-matching", "-l", "loud"]).is_err());
    }
}
