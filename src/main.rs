use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use commands::{
    AddCommand, ConfigCommand, ListCommand, LiveCommand, RemoveCommand, ShowCommand,
    StoreCommand, TableCommand, ToggleCommand,
};
use config::Config;
use todosync_core::{RestClient, SupabaseStore};

#[derive(Parser)]
#[command(name = "todosync")]
#[command(version)]
#[command(
    about = "Keeps a todo list in sync between a REST collection and a hosted table store",
    long_about = None
)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log lifecycle events to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the working set
    List(ListCommand),

    /// Show a single todo
    Show(ShowCommand),

    /// Add a todo
    Add(AddCommand),

    /// Flip a todo between done and not done
    Toggle(ToggleCommand),

    /// Remove a todo
    Remove(RemoveCommand),

    /// Watch the list and edit it interactively
    Live(LiveCommand),

    /// Table store maintenance
    Store(StoreCommand),

    /// Show raw rows from a store table
    Table(TableCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "todosync=info,todosync_core=info"
    } else {
        "todosync=warn,todosync_core=warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cli_config_path = cli.config.clone();
    let config = Config::load(cli.config)?;

    let command = match cli.command {
        Some(Commands::Config(cmd)) => return cmd.run(&config, cli_config_path),
        Some(command) => command,
        None => {
            println!("Use --help to see available commands");
            return Ok(());
        }
    };

    let credentials = config.credentials().map_err(|e| {
        tracing::error!("{}", e);
        e
    })?;
    let collection = RestClient::new(config.rest_url.value.clone());
    let store = SupabaseStore::new(credentials).with_table(config.table.value.clone());

    match command {
        Commands::List(cmd) => cmd.run(&collection, &store).await?,
        Commands::Show(cmd) => cmd.run(&collection, &store).await?,
        Commands::Add(cmd) => cmd.run(&collection, &store).await?,
        Commands::Toggle(cmd) => cmd.run(&collection, &store).await?,
        Commands::Remove(cmd) => cmd.run(&collection, &store).await?,
        Commands::Live(cmd) => cmd.run(&collection, &store).await?,
        Commands::Store(cmd) => cmd.run(&collection, &store).await?,
        Commands::Table(cmd) => cmd.run(&store).await?,
        Commands::Config(cmd) => cmd.run(&config, cli_config_path)?,
    }

    Ok(())
}
