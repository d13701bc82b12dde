//! parcel-track: entry point.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use parcel_track::Tracker;
use parcel_track_cli::commands;
use parcel_track_cli::config::{load_config, resolve_config_path};

#[derive(Parser)]
#[command(
    name = "parcel-track",
    about = "Track parcels across UPS, Truline and Yodel",
    version
)]
struct Cli {
    /// Path to the JSON config file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up one or more tracking references.
    Track {
        /// Tracking references.
        #[arg(required = true)]
        refs: Vec<String>,

        /// Include every scan, not only the latest.
        #[arg(long)]
        history: bool,

        /// Always produce batch output, even for one reference.
        #[arg(long)]
        batch: bool,

        /// Print compact JSON.
        #[arg(long)]
        compact: bool,
    },

    /// Show which courier owns each reference, without looking it up.
    Identify {
        #[arg(required = true)]
        refs: Vec<String>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   parcel-track completions bash > ~/.local/share/bash-completion/completions/parcel-track
    ///   parcel-track completions zsh > ~/.zfunc/_parcel-track
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = run(cli).await {
        println!("{}", commands::render(&commands::error_document(&e), false));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Track {
            refs,
            history,
            batch,
            compact,
        } => {
            let tracker = tracker(cli.config.as_deref())?;
            let doc = commands::track(&tracker, refs, history, batch).await?;
            println!("{}", commands::render(&doc, compact));
        }

        Commands::Identify { refs } => {
            let tracker = tracker(cli.config.as_deref())?;
            println!("{}", commands::render(&commands::identify(&tracker, &refs), false));
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "parcel-track", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn tracker(config: Option<&str>) -> anyhow::Result<Tracker> {
    let path = resolve_config_path(config);
    tracing::debug!(config = %path.display(), "loading config");
    let config = load_config(&path)?;
    Ok(Tracker::from_config(&config)?)
}
