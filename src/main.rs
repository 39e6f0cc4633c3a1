use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use easy_slide::api::{self, ProxyState, StaticState};
use easy_slide::config::{ListenArgs, ProxyArgs, StaticArgs, DEFAULT_LOG_FILTER};
use easy_slide::proxy::UpstreamProxy;
use easy_slide::store::SlideStore;
use easy_slide::supervisor::Supervisor;

#[derive(Parser)]
#[command(name = "easy-slide")]
#[command(about = "Upload a markdown file, get a reveal.js slide deck")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Options for the default (static) mode when no subcommand is given
    #[command(flatten)]
    static_args: StaticArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Render uploads in-process and serve the generated page (default)
    Static(StaticArgs),
    /// Run an external rendering server and proxy to it
    Proxy(ProxyArgs),
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}

async fn serve_static(args: StaticArgs) -> anyhow::Result<()> {
    let state = StaticState {
        store: SlideStore::new(&args.dir),
        segmenter: args.segmenter(),
        renderer: args.renderer()?,
    };
    state.prepare()?;

    let app = api::create_static_router(state);
    serve(&args.listen, app).await
}

async fn serve_proxy(args: ProxyArgs) -> anyhow::Result<()> {
    let store = SlideStore::new(&args.dir);
    let supervisor = Supervisor::new(args.supervisor_config(store.document_path()));
    let proxy = UpstreamProxy::local(args.renderer_port)?;
    let state = ProxyState::new(store, supervisor.clone(), proxy);

    let document = state.prepare()?;
    let renderer = supervisor.config();
    tracing::info!(
        "Serving {} through {} on port {}",
        document.display(),
        renderer.program,
        renderer.port
    );
    if let Err(e) = supervisor.start().await {
        // Stay up: the next upload retries the start.
        tracing::error!("Renderer failed to start: {}", e);
    }

    let app = api::create_proxy_router(state);
    let result = serve(&args.listen, app).await;

    if let Err(e) = supervisor.shutdown().await {
        tracing::warn!("Renderer did not stop cleanly: {}", e);
    }
    result
}

async fn serve(listen: &ListenArgs, app: axum::Router) -> anyhow::Result<()> {
    let addr = listen.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Slide generation service listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Static(args)) => serve_static(args).await,
        Some(Commands::Proxy(args)) => serve_proxy(args).await,
        None => serve_static(cli.static_args).await,
    }
}
