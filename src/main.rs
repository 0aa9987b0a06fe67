//! Local invoke tool.
//!
//! Feeds one event JSON document through the bridge into a small demo axum
//! app and prints the outbound response JSON, the way the platform would
//! receive it.
//!
//! ```text
//!     event file / stdin
//!         → ContainerHandler::proxy_stream
//!             → TowerContainer (demo Router + TraceLayer)
//!         → response JSON on stdout, logs on stderr
//! ```

use std::io;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use axum::extract::Extension;
use axum::routing::{any, get};
use axum::Router;
use clap::Parser;
use tokio::fs::File;
use tokio::io::AsyncRead;
use tower_http::trace::TraceLayer;

use serverless_bridge::config::{load_config, ContainerConfig};
use serverless_bridge::observability::init_logging;
use serverless_bridge::{
    AsyncInitializer, ContainerHandler, Initializer, InvocationContext, SecurityContext,
    TowerContainer,
};

#[derive(Parser)]
#[command(name = "serverless-bridge")]
#[command(about = "Invoke the bridge locally with an event document", long_about = None)]
struct Cli {
    /// Event JSON file; read from stdin when omitted
    #[arg(short, long)]
    event: Option<PathBuf>,

    /// Bridge configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Request id for the invocation; generated when omitted
    #[arg(long)]
    request_id: Option<String>,

    /// Bootstrap the app on a background worker
    #[arg(long)]
    async_init: bool,

    /// Simulated bootstrap time of the demo app, in milliseconds
    #[arg(long, default_value_t = 0)]
    boot_delay_ms: u64,
}

fn demo_app() -> Router {
    Router::new()
        .route("/ping", get(|| async { "pong" }))
        .route("/echo", any(|body: String| async move { body }))
        .route(
            "/whoami",
            get(|Extension(security): Extension<SecurityContext>| async move {
                security
                    .user_principal()
                    .unwrap_or_else(|| "anonymous".to_string())
            }),
        )
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let started = SystemTime::now();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ContainerConfig::default(),
    };
    init_logging(&config.logging);

    tracing::info!("serverless-bridge v0.1.0 starting");

    let boot_delay = Duration::from_millis(cli.boot_delay_ms);
    let container = TowerContainer::new(move || async move {
        tokio::time::sleep(boot_delay).await;
        Ok::<_, io::Error>(demo_app())
    });

    let initializer = if cli.async_init {
        Initializer::Asynchronous(AsyncInitializer::with_start_time(started, &config.cold_start))
    } else {
        Initializer::from_environment(&config.cold_start)
    };

    let mut handler = ContainerHandler::new(container, config);
    handler.start(initializer).await?;

    let input: Box<dyn AsyncRead + Unpin + Send> = match &cli.event {
        Some(path) => Box::new(File::open(path).await?),
        None => Box::new(tokio::io::stdin()),
    };
    let ctx = match cli.request_id {
        Some(id) => InvocationContext::new(id),
        None => InvocationContext::generated(),
    };

    handler.proxy_stream(input, tokio::io::stdout(), &ctx).await?;
    println!();

    tracing::info!("Invocation complete");
    Ok(())
}
