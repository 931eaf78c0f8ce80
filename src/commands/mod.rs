use clap::ValueEnum;

mod config_cmd;
mod live;
mod store_cmd;
mod table;
mod todo;

pub use config_cmd::ConfigCommand;
pub use live::LiveCommand;
pub use store_cmd::StoreCommand;
pub use table::TableCommand;
pub use todo::{AddCommand, ListCommand, RemoveCommand, ShowCommand, ToggleCommand};

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Parses a row limit. Zero would read nothing from the store and make a
/// populated table look empty.
pub(crate) fn parse_limit(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("limit must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}
