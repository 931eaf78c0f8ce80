use clap::Args;
use serde_json::Value;

use todosync_core::SupabaseStore;

use super::{parse_limit, OutputFormat};

/// Longest cell shown before truncation.
const MAX_CELL_WIDTH: usize = 40;

/// Show raw rows from any store table
#[derive(Args)]
pub struct TableCommand {
    /// Table to read (defaults to the configured todos table)
    name: Option<String>,

    /// Maximum number of rows
    #[arg(long, short = 'n', value_parser = parse_limit, default_value_t = 100)]
    limit: usize,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl TableCommand {
    pub async fn run(&self, store: &SupabaseStore) -> Result<(), Box<dyn std::error::Error>> {
        let name = self.name.as_deref().unwrap_or_else(|| store.table());
        let rows = store.select_rows(name, self.limit).await?;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
            OutputFormat::Text => {
                if rows.is_empty() {
                    println!("No data found in table {}", name);
                } else {
                    print!("{}", render_table(&rows));
                    println!("\n{} row(s) from {}", rows.len(), name);
                }
            }
        }
        Ok(())
    }
}

/// Renders rows as aligned columns. Columns come from the first row's keys.
fn render_table(rows: &[Value]) -> String {
    let columns: Vec<&str> = match rows.first().and_then(Value::as_object) {
        Some(first) => first.keys().map(String::as_str).collect(),
        None => return String::new(),
    };

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| render_cell(row.get(*column)))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(column.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(column, width)| format!("{:<width$}", column.to_uppercase(), width = width))
        .collect();
    out.push_str(header.join("  ").trim_end());
    out.push('\n');

    let total: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    out.push_str(&"-".repeat(total));
    out.push('\n');

    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

/// Strings print bare, nested values as JSON.
fn render_cell(value: Option<&Value>) -> String {
    let text = match value {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    if text.chars().count() > MAX_CELL_WIDTH {
        let cut: String = text.chars().take(MAX_CELL_WIDTH - 3).collect();
        format!("{}...", cut)
    } else {
        text
    }
}
