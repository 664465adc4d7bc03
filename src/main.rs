use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use oxidized_pharma::{
    agents::AgentContext,
    analysis_registry::AnalysisRegistry,
    config::Config,
    llm::{agent_service_from_config, AgentService},
    queue::{self, EventStream},
    routes::create_router,
    trials::{AgentCoordinator, EventConsumer, EventProducer},
    types::{AppError, AppResult},
    utils::init_logger,
    AppState,
};

#[derive(Parser)]
#[command(name = "oxidized-pharma", version, about = "Clinical trial agent pipeline and pharma AI agent services")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Also consume trial events in this process
        #[arg(long)]
        with_consumer: bool,
    },
    /// Publish one synthetic trial event per interval
    Produce {
        /// Seconds between events (defaults to PRODUCER_INTERVAL_SECS)
        #[arg(long)]
        interval: Option<u64>,
        /// Stop after this many events
        #[arg(long)]
        max_events: Option<u64>,
    },
    /// Analyze trial events from the consumer group
    Consume,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    let _log_guard = init_logger(&config.logging);
    info!("Configuration loaded: {:?}", config.server);

    match cli.command.unwrap_or(Command::Serve { with_consumer: false }) {
        Command::Serve { with_consumer } => serve(config, with_consumer).await,
        Command::Produce { interval, max_events } => produce(config, interval, max_events).await,
        Command::Consume => consume(config).await,
    }
}

async fn serve(config: Config, with_consumer: bool) -> anyhow::Result<()> {
    let service = agent_service_from_config(&config.agents)?;
    info!(backend = service.backend_name(), model = %config.agents.model, "Agent service ready");

    // The API runs without a stream; simulate then reports the configuration error.
    let stream = match queue::connect(&config.stream).await {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!(error = %e, "Event stream unavailable, simulation disabled");
            None
        }
    };

    let analyses = AnalysisRegistry::default();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let consumer_task = if with_consumer {
        let stream = stream
            .clone()
            .ok_or_else(|| anyhow::anyhow!("--with-consumer requires a configured event stream"))?;
        let consumer = build_consumer(&config, stream, service.clone(), analyses.clone());
        let mut shutdown_rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.changed().await;
            };
            consumer.start(shutdown).await
        }))
    } else {
        None
    };

    // Create shared state
    let state = AppState {
        config: config.clone(),
        agents: AgentContext::new(service, &config.agents.model)
            .with_search_connection(config.agents.search_connection_id.clone()),
        producer: stream.map(EventProducer::new),
        analyses,
    };

    // Create router
    let app = create_router(state);

    // Start server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    let mut stop_rx = shutdown_rx;
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
                _ = stop_rx.wait_for(|stop| *stop) => {}
            }
        })
        .into_future();

    match consumer_task {
        Some(task) => supervise(server, task, shutdown_tx).await,
        None => server.await.map_err(|e| anyhow::anyhow!("Server error: {}", e)),
    }
}

/// Runs the API next to the embedded consumer. A consumer failure stops the
/// server and is returned, so the process exits non-zero.
async fn supervise<S>(
    server: S,
    mut consumer: JoinHandle<AppResult<()>>,
    shutdown_tx: watch::Sender<bool>,
) -> anyhow::Result<()>
where
    S: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(server);
    tokio::select! {
        served = &mut server => {
            let _ = shutdown_tx.send(true);
            served.map_err(|e| anyhow::anyhow!("Server error: {}", e))?;
            consumer.await??;
            Ok(())
        }
        consumed = &mut consumer => {
            let outcome = match consumed? {
                Ok(()) => anyhow::anyhow!("Embedded consumer stopped"),
                Err(e) => {
                    error!(error = %e, "Embedded consumer failed, shutting down");
                    e.into()
                }
            };
            let _ = shutdown_tx.send(true);
            server.await.map_err(|e| anyhow::anyhow!("Server error: {}", e))?;
            Err(outcome)
        }
    }
}

async fn produce(config: Config, interval: Option<u64>, max_events: Option<u64>) -> anyhow::Result<()> {
    let stream = queue::connect(&config.stream).await?;
    let producer = EventProducer::new(stream);
    let interval = Duration::from_secs(interval.unwrap_or(config.stream.producer_interval_secs));

    let published = producer
        .run_continuous(interval, max_events, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    info!(published, "Producer finished");
    Ok(())
}

async fn consume(config: Config) -> anyhow::Result<()> {
    let stream = queue::connect(&config.stream).await?;
    let service = agent_service_from_config(&config.agents)?;
    let consumer = build_consumer(&config, stream, service, AnalysisRegistry::default());

    consumer
        .start(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

fn build_consumer(
    config: &Config,
    stream: Arc<dyn EventStream>,
    service: Arc<dyn AgentService>,
    analyses: AnalysisRegistry,
) -> EventConsumer {
    let coordinator = AgentCoordinator::new(service, &config.agents.model)
        .with_leader_review(config.agents.team_leader_review);
    EventConsumer::new(
        stream,
        Arc::new(coordinator),
        analyses,
        config.stream.consumer_group.clone(),
        config.stream.consumer_name.clone(),
    )
}
