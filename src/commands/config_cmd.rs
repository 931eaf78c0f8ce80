use clap::{Args, Subcommand};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use super::OutputFormat;
use crate::config::{Config, ConfigValue};

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

const DEFAULT_CONFIG: &str = r#"# todosync configuration

# REST collection the todos come from
# rest_url: https://jsonplaceholder.typicode.com/todos

# Hosted table store (can also be set with SUPABASE_URL / SUPABASE_ANON_KEY)
store:
  # url: https://your-project.supabase.co
  # anon_key: your-anon-key
  table: todos
"#;

impl ConfigCommand {
    pub fn run(
        &self,
        config: &Config,
        cli_config_path: Option<PathBuf>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            let path = cli_config_path.unwrap_or_else(Config::default_config_path);
                            println!("Config file: {} (not found)", path.display());
                        }
                        println!();

                        println!("rest_url: {}", config.rest_url.value);
                        println!("  source: {}", config.rest_url.source);
                        println!();

                        print_optional("store.url", &config.store_url, false);
                        print_optional("store.anon_key", &config.anon_key, true);

                        println!("store.table: {}", config.table.value);
                        println!("  source: {}", config.table.source);
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = cli_config_path.unwrap_or_else(Config::default_config_path);

                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'todosync config show' to view current configuration.");
                    return Ok(());
                }

                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let mut file = fs::File::create(&config_path)?;
                file.write_all(DEFAULT_CONFIG.as_bytes())?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to add your table store credentials.");
                Ok(())
            }
        }
    }
}

fn print_optional(name: &str, value: &ConfigValue<Option<String>>, secret: bool) {
    match &value.value {
        Some(_) if secret => println!("{}: (set)", name),
        Some(v) => println!("{}: {}", name, v),
        None => println!("{}: (not set)", name),
    }
    println!("  source: {}", value.source);
    println!();
}
