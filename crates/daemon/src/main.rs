mod config;
mod ctl;
mod runner;
mod scheduler;
mod sms;
mod state;
mod status;

use clap::{Parser, Subcommand};
use tracing::error;

#[derive(Parser)]
#[command(
    name = "gitsms",
    about = "Relay a GitHub-hosted queue file of phone,message lines to SMS"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay daemon in the foreground
    Run,

    /// Start the relay daemon in the background
    Start,

    /// Stop the background daemon
    Stop,

    /// Ask the running daemon for an immediate check
    RunNow,

    /// Show daemon status, countdown to the next run, and recent activity
    Status {
        /// Redraw the countdown every second
        #[arg(long)]
        watch: bool,
    },

    /// Show or set configuration
    Config {
        /// Set the GitHub file URL (blob or raw form)
        #[arg(long)]
        file_url: Option<String>,

        /// Set the GitHub token (or export GITSMS_TOKEN instead)
        #[arg(long)]
        token: Option<String>,

        /// Set the check interval in minutes (minimum 1)
        #[arg(long)]
        interval: Option<u64>,

        /// Set the SMS gateway URL
        #[arg(long)]
        gateway_url: Option<String>,

        /// Set the SMS gateway API key
        #[arg(long)]
        gateway_api_key: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gitsms=info".parse().unwrap())
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run => scheduler::run_daemon().await,
        Commands::Start => ctl::daemon_start(),
        Commands::Stop => ctl::daemon_stop(),
        Commands::RunNow => ctl::daemon_run_now(),
        Commands::Status { watch } => status::run_status(watch).await,
        Commands::Config {
            file_url,
            token,
            interval,
            gateway_url,
            gateway_api_key,
        } => {
            if file_url.is_none()
                && token.is_none()
                && interval.is_none()
                && gateway_url.is_none()
                && gateway_api_key.is_none()
            {
                config::show_config()
            } else {
                config::set_config(file_url, token, interval, gateway_url, gateway_api_key)
            }
        }
    };

    if let Err(e) = result {
        error!("{e:#}");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
