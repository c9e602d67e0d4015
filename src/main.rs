//! Archive Fever: a continuous philosophical stream with observers

use anyhow::Context;
use archivefever_core::{BindMode, Broadcaster, GatewayConfig, ThoughtOrigin};
use archivefever_discovery::{default_providers, HttpFetcher, PassageReader, ReadingQueue, ReadingWorker, TextDiscovery};
use archivefever_gateway::{start_gateway, AppState};
use archivefever_llm::AnthropicProvider;
use archivefever_store::{MemoryStore, ResilientStore, SqliteStore, Store};
use archivefever_stream::{
    ArchiveConfig, CompletionGateway, Crystallizer, DisabledPublisher, EmailPublisher, Publisher,
    ReactionDispatcher, ResearchDesk, Scheduler, Secrets, ThoughtEngine, TOPICS,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "archivefever", about = "Archive Fever - a continuous philosophical stream")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (TOML)
    #[arg(short, long, global = true, default_value = "archivefever.toml")]
    config: PathBuf,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the stream and serve observers (default)
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
        #[arg(short, long)]
        bind: Option<String>,
        /// SQLite database path
        #[arg(long)]
        database: Option<PathBuf>,
        /// Keep everything in memory
        #[arg(long)]
        memory: bool,
        /// Serve without the timer; thoughts only on request
        #[arg(long)]
        no_scheduler: bool,
    },
    /// Run one thought cycle and print it as JSON
    Think {
        /// Context for the cycle (default: the first topic)
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        database: Option<PathBuf>,
        #[arg(long)]
        memory: bool,
    },
    /// Print the effective configuration
    DumpConfig,
    /// Show version
    Version,
}

fn init_tracing(log_file: Option<&Path>, json: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "archivefever=info,tower_http=info".into());
    let console = if json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path.file_name().context("--log-file needs a file name")?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();
    Ok(guard)
}

fn open_store(config: &ArchiveConfig) -> anyhow::Result<Arc<dyn Store>> {
    if config.storage.backend == "memory" {
        info!("Using in-memory store; nothing survives a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let path = &config.storage.database_path;
    let sqlite = SqliteStore::open(path).with_context(|| format!("opening {}", path.display()))?;
    info!("Using SQLite store at {}", path.display());
    Ok(Arc::new(ResilientStore::with_capacity(
        Arc::new(sqlite),
        config.storage.cache_capacity,
    )))
}

fn publisher(config: &ArchiveConfig, secrets: &Secrets) -> Arc<dyn Publisher> {
    let Some((user, password, to)) = secrets.email_credentials() else {
        info!("Email credentials not set; crystallized works will not be emailed");
        return Arc::new(DisabledPublisher);
    };
    match EmailPublisher::new(
        &config.publication.smtp_host,
        config.publication.smtp_port,
        user,
        password,
        to,
    ) {
        Ok(publisher) => Arc::new(publisher),
        Err(e) => {
            warn!("Email publisher unavailable: {}", e);
            Arc::new(DisabledPublisher)
        }
    }
}

/// Everything a running stream needs, wired once.
struct Stack {
    engine: Arc<ThoughtEngine>,
    store: Arc<dyn Store>,
    discovery: Arc<TextDiscovery>,
    broadcaster: Broadcaster,
    worker: ReadingWorker,
}

fn build_stack(config: &ArchiveConfig, secrets: &Secrets) -> anyhow::Result<Stack> {
    let api_key = secrets
        .anthropic_api_key
        .clone()
        .context("ANTHROPIC_API_KEY not set")?;
    let provider = AnthropicProvider::new(api_key)
        .with_base_url(&config.models.api_url)
        .with_timeout(Duration::from_secs(config.models.timeout_secs));

    let store = open_store(config)?;
    let broadcaster = Broadcaster::new(config.server.broadcast_capacity);
    let (readings, worker) = ReadingQueue::channel();

    let discovery = Arc::new(TextDiscovery::new(
        default_providers(&config.discovery.gutendex_url, &config.discovery.archive_url),
        Arc::new(HttpFetcher::with_timeout(Duration::from_secs(
            config.discovery.fetch_timeout_secs,
        ))),
        store.clone(),
        broadcaster.clone(),
        readings,
        config.discovery_config(),
    ));

    let gateway = Arc::new(CompletionGateway::new(
        Arc::new(provider),
        store.clone(),
        config.models.clone(),
        config.context.clone(),
    ));
    let crystallizer = Crystallizer::new(
        gateway.clone(),
        store.clone(),
        broadcaster.clone(),
        publisher(config, secrets),
        config.publication.publication_url.clone(),
    );
    let dispatcher = ReactionDispatcher::new(discovery.clone(), crystallizer, store.clone(), broadcaster.clone());
    let engine = Arc::new(ThoughtEngine::new(gateway, store.clone(), broadcaster.clone(), dispatcher));

    Ok(Stack {
        engine,
        store,
        discovery,
        broadcaster,
        worker,
    })
}

fn apply_storage_flags(config: &mut ArchiveConfig, database: Option<PathBuf>, memory: bool) {
    if let Some(path) = database {
        config.storage.backend = "sqlite".into();
        config.storage.database_path = path;
    }
    if memory {
        config.storage.backend = "memory".into();
    }
}

async fn serve(config: ArchiveConfig, secrets: Secrets) -> anyhow::Result<()> {
    let stack = build_stack(&config, &secrets)?;
    let shutdown = CancellationToken::new();

    let reader: Arc<dyn PassageReader> = stack.engine.clone();
    let worker = tokio::spawn(stack.worker.run(reader, shutdown.clone()));

    let (min, max) = config.scheduler.interval_range();
    let scheduler = Arc::new(
        Scheduler::new(stack.engine.clone(), min, max)
            .with_startup_delay(Duration::from_secs(config.scheduler.startup_delay_secs)),
    );
    if config.scheduler.enabled {
        scheduler.start();
    } else {
        info!("Scheduler disabled; thoughts only on request");
    }

    let state = Arc::new(AppState {
        engine: stack.engine.clone(),
        store: stack.store.clone(),
        scheduler: scheduler.clone(),
        desk: Arc::new(ResearchDesk::new(stack.store.clone(), stack.discovery.clone())),
        broadcaster: stack.broadcaster.clone(),
        initial_stream_len: config.server.initial_stream_len,
        started_at: Instant::now(),
    });

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        signal.cancel();
    });

    let gateway = GatewayConfig {
        port: config.server.port,
        bind: config.server.bind.clone(),
    };
    let result = start_gateway(gateway, state, shutdown.clone()).await;

    scheduler.stop();
    shutdown.cancel();
    if let Err(e) = worker.await {
        warn!("Reading worker ended abnormally: {}", e);
    }
    result
}

async fn think(config: ArchiveConfig, secrets: Secrets, context: Option<String>) -> anyhow::Result<()> {
    let stack = build_stack(&config, &secrets)?;
    let context = context.unwrap_or_else(|| TOPICS[0].to_string());
    let thought = stack
        .engine
        .run_cycle(&context, ThoughtOrigin::Spontaneous)
        .await
        .context("thought cycle failed")?;
    println!("{}", serde_json::to_string_pretty(&thought)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref(), cli.json_logs)?;

    let secrets = Secrets::from_env();
    let mut config = ArchiveConfig::load(&cli.config);
    config.apply_env(&secrets);

    match cli.command {
        None => serve(config, secrets).await?,

        Some(Commands::Serve {
            port,
            bind,
            database,
            memory,
            no_scheduler,
        }) => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(bind) = bind {
                config.server.bind = BindMode::parse(&bind);
            }
            apply_storage_flags(&mut config, database, memory);
            if no_scheduler {
                config.scheduler.enabled = false;
            }
            serve(config, secrets).await?;
        }

        Some(Commands::Think {
            context,
            database,
            memory,
        }) => {
            apply_storage_flags(&mut config, database, memory);
            think(config, secrets, context).await?;
        }

        Some(Commands::DumpConfig) => {
            print!("{}", config.to_toml());
        }

        Some(Commands::Version) => {
            println!("archivefever v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
