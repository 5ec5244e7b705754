use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use url_shortener::admin::handlers::router;
use url_shortener::admin::launcher::{CommandLauncher, Launcher, NoopLauncher};
use url_shortener::admin::service::{AdminConfig, AdminService};
use url_shortener::balancer::service::{BalancerConfig, LoadBalancer};
use url_shortener::cluster::config::ClusterConfig;
use url_shortener::cluster::server::{DEFAULT_WORKERS, LineServer, ServerConfig};
use url_shortener::routing::service::RoutingNode;
use url_shortener::storage::service::StorageShard;
use url_shortener::storage::store::{FileStore, MemoryStore, UrlStore};

#[derive(Debug, Parser)]
#[command(name = "url-shortener", about = "Distributed URL shortener")]
struct Cli {
    #[command(subcommand)]
    tier: TierCommand,
}

#[derive(Debug, Subcommand)]
enum TierCommand {
    /// Client-facing load balancer
    Lb(CommonArgs),
    /// Routing node
    Node(CommonArgs),
    /// Storage shard
    Db(DbArgs),
    /// Control plane with its HTTP control surface
    Admin(AdminArgs),
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// Address to listen on
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Static cluster file
    #[arg(long, default_value = "config")]
    config: PathBuf,

    /// Connection worker pool size
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Log at debug level
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Args)]
struct DbArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// File holding this shard's URL pairs
    #[arg(long, default_value = "data/urls.json")]
    data_file: PathBuf,

    /// Keep pairs in memory only
    #[arg(long, conflicts_with = "data_file")]
    in_memory: bool,
}

#[derive(Debug, Args)]
struct AdminArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Shell command used to (re)start a server; `{host}`, `{port}` and `{tier}` are substituted
    #[arg(long)]
    launch_cmd: Option<String>,
}

impl CommonArgs {
    fn server_config(&self, default_port: u16) -> ServerConfig {
        let bind = self
            .bind
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], default_port)));
        ServerConfig::new(bind).with_workers(self.workers)
    }

    fn cluster(&self) -> anyhow::Result<ClusterConfig> {
        ClusterConfig::load(&self.config)
            .with_context(|| format!("reading cluster file {}", self.config.display()))
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.tier {
        TierCommand::Lb(args) => run_balancer(args).await,
        TierCommand::Node(args) => run_node(args).await,
        TierCommand::Db(args) => run_shard(args).await,
        TierCommand::Admin(args) => run_admin(args).await,
    }
}

async fn run_balancer(args: CommonArgs) -> anyhow::Result<()> {
    init_logging(args.verbose);
    let cluster = args.cluster()?;

    let balancer = LoadBalancer::new(BalancerConfig::default(), cluster.nodes);
    balancer.start_sweeper();

    let server = LineServer::bind(args.server_config(8080)).await?;
    server.run(balancer).await
}

async fn run_node(args: CommonArgs) -> anyhow::Result<()> {
    init_logging(args.verbose);
    let cluster = args.cluster()?;

    let node = RoutingNode::new(cluster.databases);
    let server = LineServer::bind(args.server_config(8888)).await?;
    server.run(node).await
}

async fn run_shard(args: DbArgs) -> anyhow::Result<()> {
    init_logging(args.common.verbose);

    let store: Arc<dyn UrlStore> = if args.in_memory {
        tracing::info!("Using in-memory URL store");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileStore::open(&args.data_file)?)
    };

    let server = LineServer::bind(args.common.server_config(7777)).await?;
    let shard = StorageShard::new(store, server.handle());
    server.run(shard).await
}

async fn run_admin(args: AdminArgs) -> anyhow::Result<()> {
    init_logging(args.common.verbose);
    let cluster = args.common.cluster()?;

    let launcher: Arc<dyn Launcher> = match args.launch_cmd {
        Some(template) => Arc::new(CommandLauncher::new(template)),
        None => Arc::new(NoopLauncher),
    };
    let service = AdminService::new(AdminConfig::default(), &cluster, launcher);
    let app = router(service);

    let bind = args.common.server_config(8800).bind_addr;
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Admin control surface listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
