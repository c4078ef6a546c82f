use clap::{Parser, Subcommand};
use logship::config::resolve_config_path;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logship")]
#[command(about = "Ships appended log lines into monthly search indices", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        /// Keep shipped lines in memory instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logship=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Some(Commands::Run { dry_run }) => logship::cli::run::run(config_path, dry_run)
            .await
            .map_err(Into::into),
        None => logship::cli::run::run(config_path, false)
            .await
            .map_err(Into::into),
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => logship::cli::config::init(stdout),
            ConfigAction::Validate => logship::cli::config::validate(config_path),
        },
    };

    if let Err(e) = result {
        error!(error = %e, "Fatal error");
        std::process::exit(1);
    }
}
