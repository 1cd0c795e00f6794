use clap::Parser;
use std::path::PathBuf;
use tollgate_api::ClientConfigOverrides;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod notify;

use commands::Commands;

#[derive(Parser, Debug)]
#[command(name = "tollgate")]
#[command(about = "Authenticated client for the admin API", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file path (default: ~/.tollgate/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long = "base-url", global = true)]
    base_url: Option<String>,

    /// Override the request timeout in seconds
    #[arg(long = "timeout", global = true)]
    timeout_secs: Option<u64>,

    /// Enable debug output
    #[arg(long = "debug", global = true, default_value_t = false)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long = "log-json", global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.debug, cli.log_json);

    let overrides = ClientConfigOverrides {
        base_url: cli.base_url,
        timeout_secs: cli.timeout_secs,
    };

    if let Err(e) = cli.command.run(cli.config.as_deref(), &overrides).await {
        eprintln!("Ops! something went wrong: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(debug: bool, json: bool) {
    let default_filter = if debug {
        "error,tollgate=debug,tollgate_api=debug,tollgate_shared=debug"
    } else {
        "error,tollgate=info,tollgate_api=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}
