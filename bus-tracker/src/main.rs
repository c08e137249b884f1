use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bus_tracker::config::AppConfig;
use bus_tracker::domain::RouteKey;
use bus_tracker::graph::{CoordinateBackfill, GraphBuilder, store};
use bus_tracker::live::{CachedLiveSource, CandidateSelector};
use bus_tracker::predict::{Predictor, Tracker};
use bus_tracker::upstream::{MockUpstream, Upstream, UpstreamClient};
use bus_tracker::watch::Watcher;
use bus_tracker::web::{AppState, LiveTracker, create_router};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Live bus arrivals for the Macau DSAT network", long_about = None)]
struct Args {
    /// JSON config file (defaults apply when omitted)
    #[arg(long, env = "BUS_TRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// Serve recorded responses from this directory instead of the portal
    #[arg(long)]
    mock: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape every catalog route and write the stop graph
    BuildGraph {
        /// Output path (defaults to graph.path from the config)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Only these routes, comma separated
        #[arg(long, value_delimiter = ',')]
        routes: Vec<String>,
    },
    /// Fill stop coordinates in an existing graph from the location endpoint
    BackfillCoords {
        #[arg(long)]
        graph: Option<PathBuf>,
    },
    /// Print the arrival board for a stop
    Arrivals {
        /// Station code, any spelling (T308/1, t308_1, T308)
        stop: String,
        /// Keep polling and print every refresh
        #[arg(long)]
        watch: bool,
    },
    /// Print every stop of a route-direction with live buses and ETAs
    Timeline {
        /// Route-direction key, e.g. 33_0
        route: RouteKey,
        /// Keep polling and print every refresh
        #[arg(long)]
        watch: bool,
    },
    /// Run the JSON API
    Serve {
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
}

fn upstream(config: &AppConfig) -> Result<Upstream, BoxError> {
    match &config.mock_dir {
        Some(dir) => {
            let mock = MockUpstream::new(dir)?;
            info!(
                dir = %dir.display(),
                routes = mock.route_keys().len(),
                "using recorded upstream data"
            );
            Ok(Upstream::Mock(mock))
        }
        None => Ok(Upstream::Http(UpstreamClient::new(config.upstream.clone())?)),
    }
}

fn tracker(config: &AppConfig) -> Result<Arc<LiveTracker>, BoxError> {
    let graph = store::load(&config.graph.path)?;
    info!(
        stops = graph.stops.len(),
        routes = graph.routes.len(),
        located = graph.located_stop_count(),
        "loaded stop graph"
    );

    let source = CachedLiveSource::new(upstream(config)?, &config.live.cache_config());
    Ok(Arc::new(Tracker::new(
        Arc::new(graph),
        source,
        CandidateSelector::new(config.live.strategies()),
        Predictor::new(config.predict.clone()),
    )))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if args.mock.is_some() {
        config.mock_dir = args.mock.clone();
    }

    match args.command {
        Command::BuildGraph { output, routes } => {
            if !routes.is_empty() {
                config.routes = routes;
            }
            let output = output.unwrap_or_else(|| config.graph.path.clone());

            let (graph, report) = GraphBuilder::new(config.build_config()?)
                .build(&upstream(&config)?)
                .await;
            if let Err(e) = graph.check_consistency() {
                warn!(error = %e, "graph is inconsistent");
            }
            store::save(&graph, &output)?;

            info!(
                path = %output.display(),
                stops = graph.meta.stop_count,
                routes = graph.meta.route_count,
                failures = report.failures,
                "graph written"
            );
        }
        Command::BackfillCoords { graph } => {
            let path = graph.unwrap_or_else(|| config.graph.path.clone());
            let mut graph = store::load(&path)?;

            let report = CoordinateBackfill::new(config.catalog()?)
                .with_delay(config.graph.delay())
                .run(&mut graph, &upstream(&config)?)
                .await;
            store::save(&graph, &path)?;

            info!(
                path = %path.display(),
                updated = report.updated_count(),
                unmatched = report.unmatched,
                failures = report.failures,
                "coordinates backfilled"
            );
        }
        Command::Arrivals { stop, watch } => {
            let tracker = tracker(&config)?;
            if watch {
                let watcher =
                    Watcher::new(tracker).with_interval(config.live.poll_interval());
                let mut observation = watcher.observe(&stop)?;
                while let Some(board) = observation.next().await {
                    println!("{}", serde_json::to_string_pretty(&*board)?);
                }
            } else {
                let board = tracker.stop_board(&stop).await?;
                println!("{}", serde_json::to_string_pretty(&board)?);
            }
        }
        Command::Timeline { route, watch } => {
            let tracker = tracker(&config)?;
            if watch {
                let watcher =
                    Watcher::new(tracker).with_interval(config.live.poll_interval());
                let mut observation = watcher.observe_route(&route)?;
                while let Some(timeline) = observation.next().await {
                    println!("{}", serde_json::to_string_pretty(&*timeline)?);
                }
            } else {
                let timeline = tracker.route_timeline(&route).await?;
                println!("{}", serde_json::to_string_pretty(&timeline)?);
            }
        }
        Command::Serve { bind } => {
            let addr = bind.unwrap_or(config.server.bind);
            let app = create_router(AppState::new(tracker(&config)?));

            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!(%addr, "bus tracker listening");
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
