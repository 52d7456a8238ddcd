//! Builder CLI: assemble the platform with the bundled mock vendors and
//! generate the typed static façade.
//!
//! Compiled behind the `mock-providers` feature; real deployments assemble
//! their own [`agora::Application`] and call [`agora::PackageBuilder`]
//! directly.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use agora::{AgoraError, Application, Command, PackageBuilder, Router};
use agora_core::ProviderExtension;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agora-build", about = "Generate the agora typed static façade")]
struct Args {
    /// Restrict the build to these top-level modules.
    #[arg(long, value_delimiter = ',')]
    modules: Vec<String>,

    /// Skip the post-build lint pass.
    #[arg(long)]
    no_lint: bool,

    /// Verbose diagnostics.
    #[arg(long, short)]
    verbose: bool,

    /// Output directory; defaults to the configured build directory or
    /// `./agora_build`.
    #[arg(long)]
    out: Option<PathBuf>,
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

fn main() -> ExitCode {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let schemas = match agora_mock::standard_models() {
        Ok(schemas) => schemas,
        Err(err) => {
            eprintln!("schema registration failed: {err}");
            return ExitCode::from(1);
        }
    };

    let router = match demo_router() {
        Ok(router) => router,
        Err(err) => {
            eprintln!("router registration failed: {err}");
            return ExitCode::from(1);
        }
    };
    let app = Application::builder()
        .schemas(schemas)
        .with_extension(Arc::new(agora_mock::alpha()) as Arc<dyn ProviderExtension>)
        .with_extension(Arc::new(agora_mock::beta()) as Arc<dyn ProviderExtension>)
        .with_extension(Arc::new(agora_mock::delta()) as Arc<dyn ProviderExtension>)
        .router(router);
    let app = match app.build() {
        Ok(app) => app,
        Err(err) => {
            eprintln!("build failed: {err}");
            return ExitCode::from(1);
        }
    };

    let out = args
        .out
        .or_else(|| {
            app.settings()
                .preferences
                .build_directory
                .clone()
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from("agora_build"));

    let builder = PackageBuilder::new(&app);
    match builder.write_modules(&out, &args.modules) {
        Ok(changed) => {
            if changed {
                println!("wrote static façade to {}", out.display());
            } else {
                println!("static façade at {} is current", out.display());
            }
        }
        Err(err) => {
            eprintln!("build failed: {err}");
            return ExitCode::from(1);
        }
    }

    if !args.no_lint {
        for finding in builder.lint() {
            eprintln!("lint: {finding}");
        }
    }
    ExitCode::SUCCESS
}
