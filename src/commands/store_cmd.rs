use clap::{Args, Subcommand};
use std::io::{self, Write};

use todosync_core::{
    check_table, clear_store, sync_to_store, OperationOutcome, TableStore, TodoCollection,
    INITIAL_LOAD_LIMIT,
};

use super::{parse_limit, OutputFormat};

/// Table store maintenance
#[derive(Args)]
pub struct StoreCommand {
    #[command(subcommand)]
    command: StoreSubcommand,
}

#[derive(Subcommand)]
enum StoreSubcommand {
    /// Copy REST todos the store does not have yet
    Sync {
        /// Number of REST items to consider
        #[arg(long, short = 'n', value_parser = parse_limit, default_value_t = INITIAL_LOAD_LIMIT)]
        limit: usize,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete every row from the store table
    Clear {
        /// Skip confirmation prompt
        #[arg(long, short)]
        yes: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Check that the store table exists and is readable
    Check {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl StoreCommand {
    pub async fn run<C, S>(&self, collection: &C, store: &S) -> Result<(), Box<dyn std::error::Error>>
    where
        C: TodoCollection,
        S: TableStore,
    {
        match &self.command {
            StoreSubcommand::Sync { limit, format } => {
                let outcome = sync_to_store(collection, store, *limit).await;
                report(&outcome, *format)
            }

            StoreSubcommand::Clear { yes, format } => {
                if !yes {
                    print!("Clear all todos from the table store? [y/N] ");
                    io::stdout().flush()?;

                    let mut input = String::new();
                    io::stdin().read_line(&mut input)?;

                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Clear cancelled.");
                        return Ok(());
                    }
                }

                let outcome = clear_store(store).await;
                report(&outcome, *format)
            }

            StoreSubcommand::Check { format } => {
                let outcome = check_table(store).await;
                report(&outcome, *format)
            }
        }
    }
}

/// Prints the outcome; failures become the command's error.
fn report(outcome: &OperationOutcome, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Text if outcome.success => {
            println!("✓ {}", outcome.summary());
            if let Some(existing) = outcome.existing_count {
                println!("  {} already in store", existing);
            }
        }
        OutputFormat::Text => {}
    }

    if outcome.success {
        Ok(())
    } else {
        Err(outcome.summary().into())
    }
}
