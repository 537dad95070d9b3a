mod args;
mod commands;
mod machine;

use args::OutscaleArgs;
use clap::{Parser, Subcommand};
use colored::Colorize;
use machineflow_cloud::{CancellationToken, MachineStore};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "machineflow")]
#[command(about = "Provision and manage Docker hosts on Outscale", long_about = None)]
struct Cli {
    /// Directory holding machine records and SSH keys
    #[arg(long, global = true, env = "MACHINEFLOW_STORAGE_PATH")]
    storage_path: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'D', long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a machine
    Create {
        /// Machine name
        name: String,
        #[command(flatten)]
        outscale: OutscaleArgs,
    },
    /// Start a stopped machine
    Start {
        /// Machine name
        name: String,
    },
    /// Stop a machine gracefully
    Stop {
        /// Machine name
        name: String,
    },
    /// Force stop a machine
    Kill {
        /// Machine name
        name: String,
    },
    /// Reboot a machine
    Restart {
        /// Machine name
        name: String,
    },
    /// Remove a machine and every resource created for it
    Rm {
        /// Machine name
        name: String,
        /// Forget the local record even when teardown is incomplete
        #[arg(short, long)]
        force: bool,
    },
    /// Show the state of a machine
    Status {
        /// Machine name
        name: String,
    },
    /// Print the public IP address of a machine
    Ip {
        /// Machine name
        name: String,
    },
    /// Print the Docker daemon URL of a machine
    Url {
        /// Machine name
        name: String,
    },
    /// Print the stored record of a machine as JSON
    Inspect {
        /// Machine name
        name: String,
    },
    /// List machines
    Ls,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.debug);

    // No storage needed for the version
    if matches!(cli.command, Commands::Version) {
        println!("machineflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let store = MachineStore::new(machine::storage_root(cli.storage_path)?);
    let cancel = cancel_on_ctrl_c();

    match cli.command {
        Commands::Create { name, outscale } => {
            commands::create::handle(&store, name, outscale.into(), cancel).await?;
        }
        Commands::Start { name } => {
            commands::lifecycle::handle(&store, name, commands::lifecycle::Action::Start, cancel)
                .await?;
        }
        Commands::Stop { name } => {
            commands::lifecycle::handle(&store, name, commands::lifecycle::Action::Stop, cancel)
                .await?;
        }
        Commands::Kill { name } => {
            commands::lifecycle::handle(&store, name, commands::lifecycle::Action::Kill, cancel)
                .await?;
        }
        Commands::Restart { name } => {
            commands::lifecycle::handle(
                &store,
                name,
                commands::lifecycle::Action::Restart,
                cancel,
            )
            .await?;
        }
        Commands::Rm { name, force } => {
            commands::rm::handle(&store, name, force, cancel).await?;
        }
        Commands::Status { name } => {
            commands::inspect::handle_status(&store, name, cancel).await?;
        }
        Commands::Ip { name } => {
            commands::inspect::handle_ip(&store, name).await?;
        }
        Commands::Url { name } => {
            commands::inspect::handle_url(&store, name).await?;
        }
        Commands::Inspect { name } => {
            commands::inspect::handle_inspect(&store, name).await?;
        }
        Commands::Ls => {
            commands::ls::handle(&store).await?;
        }
        Commands::Version => unreachable!(),
    }

    Ok(())
}

/// Logs go to stderr so `ip` and `url` stay scriptable
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// First Ctrl-C cancels the running operation, the second one exits
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!(
            "{}",
            "Interrupted, cleaning up (press Ctrl-C again to abort)".yellow()
        );
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    cancel
}
