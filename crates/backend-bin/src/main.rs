use anyhow::{Context, Result};
use backend_lib::{
    auth::JwtAuth,
    bookings::InMemoryBookingDirectory,
    config::{Settings, StorageBackend},
    storage::{spawn_expiry_sweeper, FlatFileLocationStore, LocationStore, MemoryLocationStore},
    ws_router, AppState,
};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use trip_client::{
    publisher, viewer, HttpLocationApi, ReplaySource, Session, TripPublisher, TripViewer,
    WatchOptions, WsRelayLink,
};

#[derive(Parser)]
#[command(name = "triptrack", version, about = "Live trip-location relay")]
struct Cli {
    /// Config file; `config/default.toml` is used when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay and location history server
    Serve,

    /// Mint a bearer token for a user id
    IssueToken { user_id: String },

    /// Share a position for a booking, replayed from a route file
    Publish {
        #[arg(long)]
        booking: String,
        /// JSON array of `{"lat": .., "lng": ..}` points
        #[arg(long)]
        route: PathBuf,
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        #[command(flatten)]
        remote: Remote,
    },

    /// Follow the live position of a booking
    Watch {
        #[arg(long)]
        booking: String,
        #[command(flatten)]
        remote: Remote,
    },
}

#[derive(clap::Args)]
struct Remote {
    /// Server root URL
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Session token
    #[arg(long, env = "TRIPTRACK_TOKEN")]
    token: Option<String>,
}

impl Remote {
    /// WebSocket endpoint matching `server`
    fn relay_url(&self) -> String {
        let root = self.server.trim_end_matches('/');
        let root = if let Some(rest) = root.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = root.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            root.to_string()
        };
        format!("{root}/ws")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Settings::load()?,
    };
    init_tracing(&settings.log_level, cli.log_json);

    match cli.command {
        Command::Serve => serve(settings).await,
        Command::IssueToken { user_id } => {
            let auth = JwtAuth::new(&settings.auth.jwt_secret, settings.token_ttl());
            println!("{}", auth.issue(&user_id)?);
            Ok(())
        },
        Command::Publish {
            booking,
            route,
            interval_ms,
            remote,
        } => publish(booking, route, Duration::from_millis(interval_ms), remote).await,
        Command::Watch { booking, remote } => watch(booking, remote).await,
    }
}

fn init_tracing(default_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
}

async fn serve(settings: Settings) -> Result<()> {
    if settings.auth.jwt_secret == "change-me" {
        tracing::warn!("using the default JWT secret; set TRIPTRACK__AUTH__JWT_SECRET");
    }

    let auth = Arc::new(JwtAuth::new(&settings.auth.jwt_secret, settings.token_ttl()));
    let bookings = Arc::new(InMemoryBookingDirectory::from_json_file(&settings.bookings.path)?);

    match settings.storage.backend {
        StorageBackend::File => {
            let store = FlatFileLocationStore::new(&settings.storage.path, settings.retention())?;
            run_server(store, auth, bookings, settings).await
        },
        StorageBackend::Memory => {
            let store = MemoryLocationStore::new(settings.retention());
            run_server(store, auth, bookings, settings).await
        },
    }
}

async fn run_server<S: LocationStore + Clone + 'static>(
    store: S,
    auth: Arc<JwtAuth>,
    bookings: Arc<InMemoryBookingDirectory>,
    settings: Settings,
) -> Result<()> {
    let sweeper = spawn_expiry_sweeper(store.clone(), settings.sweep_interval());
    let addr = settings.server.bind_addr;

    let state = Arc::new(AppState::new(store, auth, bookings, settings));
    let app = ws_router::create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    tracing::info!("server stopped");
    Ok(())
}

async fn publish(booking: String, route: PathBuf, interval: Duration, remote: Remote) -> Result<()> {
    let session = Session::require(remote.token.clone(), publisher::LOGIN_REQUIRED)?;
    let source = ReplaySource::from_json_file(&route, interval)
        .with_context(|| format!("reading route {}", route.display()))?;

    let api = Arc::new(HttpLocationApi::new(&remote.server, session.clone())?);
    let link = WsRelayLink::connect(&remote.relay_url(), &session).await?;

    let publisher = TripPublisher::new(booking, link, api);
    let mut status = publisher.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            println!("Status: {}", *status.borrow_and_update());
            if status.changed().await.is_err() {
                break;
            }
        }
    });

    let summary = publisher
        .run(&source, WatchOptions::default(), shutdown_signal())
        .await?;
    let _ = printer.await;

    println!(
        "sent {} of {} fixes live, stored {} ({} failed)",
        summary.live_sent, summary.fixes, summary.stored, summary.store_failed
    );
    Ok(())
}

async fn watch(booking: String, remote: Remote) -> Result<()> {
    let session = Session::require(remote.token.clone(), viewer::LOGIN_REQUIRED)?;

    let api = Arc::new(HttpLocationApi::new(&remote.server, session.clone())?);
    let link = WsRelayLink::connect(&remote.relay_url(), &session).await?;

    let viewer = TripViewer::new(booking, link, api);
    let mut view = viewer.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            let state = *view.borrow_and_update();
            match state.position {
                Some(at) => println!("Status: {} ({:.6}, {:.6})", state.status, at.lat, at.lng),
                None => println!("Status: {}", state.status),
            }
            if view.changed().await.is_err() {
                break;
            }
        }
    });

    let last = viewer.run(shutdown_signal()).await?;
    let _ = printer.await;

    if let Some(at) = last.position {
        println!("last known position: {:.6}, {:.6}", at.lat, at.lng);
    }
    Ok(())
}
