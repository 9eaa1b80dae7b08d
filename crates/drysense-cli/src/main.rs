use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "drysense", version, about = "Laundry drying estimator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Session(commands::session::SessionCommand),
    /// Run the tick scheduler in the foreground
    Watch {
        /// Stop after this many scheduler rounds
        #[arg(long)]
        rounds: Option<u32>,
    },
    /// Completed drying sessions
    History {
        #[arg(long, default_value = "10")]
        limit: usize,
        /// Print aggregate statistics instead of the list
        #[arg(long)]
        stats: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Sensor readings written by the host bridge
    Sensor {
        #[command(subcommand)]
        action: commands::sensor::SensorAction,
    },
}

fn init_tracing() {
    let debug = drysense_core::Config::load()
        .map(|cfg| cfg.debug)
        .unwrap_or(false);
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Session(command) => commands::session::run(command),
        Commands::Watch { rounds } => commands::session::watch(rounds),
        Commands::History { limit, stats } => commands::history::run(limit, stats),
        Commands::Config { action } => commands::config::run(action),
        Commands::Sensor { action } => commands::sensor::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
