use anyhow::Context;
use clap::{Parser, Subcommand};
use danubedata_config::ProviderConfig;
use danubedata_core::Registry;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pulumi-resource-danubedata")]
#[command(about = "DanubeData resource provider plugin", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the plugin protocol on stdin/stdout (default)
    Serve,
    /// Print the package schema as JSON
    Schema,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .init();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Schema => {
            let schema = Registry::builtin().package_schema(env!("CARGO_PKG_VERSION"));
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
        Commands::Serve => {
            let config = ProviderConfig::load().context("loading provider configuration")?;
            tracing::debug!("Initial configuration: {:?}", config);
            danubedata_plugin::run_server(config).await
        }
    }
}
