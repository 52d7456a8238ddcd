//! Demo HTTP server: assemble the platform with the bundled mock vendors
//! and serve the command map under `/api/v1`.
//!
//! Compiled behind the `mock-providers` feature; real deployments assemble
//! their own [`agora::Application`] and mount [`agora_server::router`] into
//! their stack.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use agora::{AgoraError, Application, Command, Router};
use agora_core::ProviderExtension;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agora-serve", about = "Serve the agora HTTP surface")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8000")]
    listen: SocketAddr,

    /// Verbose diagnostics.
    #[arg(long, short)]
    verbose: bool,
}

fn demo_router() -> Result<Router, AgoraError> {
    let price = Router::new().command(
        Command::new("/historical/", "EquityHistorical")?
            .with_example("/equity/price/historical/?symbol=ACME"),
    );
    let equity = Router::new()
        .command(
            Command::new("/foo/", "Foo")?
                .with_example("/equity/foo/?symbol=ACME&provider=alpha"),
        )
        .mount("/price", price);
    Ok(Router::new().mount("/equity", equity))
}

fn assemble() -> Result<Application, AgoraError> {
    Application::builder()
        .schemas(agora_mock::standard_models()?)
        .with_extension(Arc::new(agora_mock::alpha()) as Arc<dyn ProviderExtension>)
        .with_extension(Arc::new(agora_mock::beta()) as Arc<dyn ProviderExtension>)
        .with_extension(Arc::new(agora_mock::delta()) as Arc<dyn ProviderExtension>)
        .router(demo_router()?)
        .build()
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let app = match assemble() {
        Ok(app) => Arc::new(app),
        Err(err) => {
            eprintln!("assembly failed: {err}");
            return ExitCode::from(1);
        }
    };

    let routes = agora_server::router(Arc::clone(&app));
    let listener = match tokio::net::TcpListener::bind(args.listen).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("cannot bind {}: {err}", args.listen);
            return ExitCode::from(1);
        }
    };
    tracing::info!(addr = %args.listen, commands = app.commands().len(), "listening");
    if let Err(err) = axum::serve(listener, routes).await {
        eprintln!("server error: {err}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}
