//! One-shot todo commands. Each loads the working set first so mutations are
//! mirrored to the store whenever the store was reachable.

use clap::Args;

use todosync_core::{
    BackfillOutcome, LiveTodos, Reconciliation, TableStore, Todo, TodoCollection,
    WorkingSetSource, INITIAL_LOAD_LIMIT,
};

use super::{parse_limit, OutputFormat};

/// List the working set
#[derive(Args)]
pub struct ListCommand {
    /// Number of items to load
    #[arg(long, short = 'n', value_parser = parse_limit, default_value_t = INITIAL_LOAD_LIMIT)]
    limit: usize,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl ListCommand {
    pub async fn run<C, S>(&self, collection: &C, store: &S) -> Result<(), Box<dyn std::error::Error>>
    where
        C: TodoCollection,
        S: TableStore,
    {
        let mut live = LiveTodos::new(collection, store).with_limit(self.limit);
        let reconciliation = live.load().await?;

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(live.todos())?);
            }
            OutputFormat::Text => {
                if live.todos().is_empty() {
                    println!("No todos found");
                } else {
                    print_todos(live.todos());
                }
                println!();
                println!("{}", describe_load(&reconciliation));
            }
        }
        Ok(())
    }
}

/// Show a single todo
#[derive(Args)]
pub struct ShowCommand {
    /// Todo ID
    id: i64,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl ShowCommand {
    pub async fn run<C, S>(&self, collection: &C, store: &S) -> Result<(), Box<dyn std::error::Error>>
    where
        C: TodoCollection,
        S: TableStore,
    {
        let mut live = LiveTodos::new(collection, store);
        live.load().await?;

        // Items outside the loaded window still exist in the collection.
        let todo = match live.get(self.id) {
            Some(todo) => todo.clone(),
            None => collection.get(self.id).await?,
        };

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&todo)?),
            OutputFormat::Text => {
                println!("ID:        {}", todo.id);
                println!("Title:     {}", todo.title);
                println!("Completed: {}", if todo.completed { "yes" } else { "no" });
            }
        }
        Ok(())
    }
}

/// Add a todo
#[derive(Args)]
pub struct AddCommand {
    /// Title of the new todo
    #[arg(required = true, num_args = 1..)]
    title: Vec<String>,
}

impl AddCommand {
    pub async fn run<C, S>(&self, collection: &C, store: &S) -> Result<(), Box<dyn std::error::Error>>
    where
        C: TodoCollection,
        S: TableStore,
    {
        let title = self.title.join(" ");
        let title = title.trim();
        if title.is_empty() {
            return Err("Title cannot be empty".into());
        }

        let mut live = LiveTodos::new(collection, store);
        live.load().await?;
        let todo = live.add_todo(title).await?;

        println!("Added todo {}: {}", todo.id, todo.title);
        Ok(())
    }
}

/// Flip a todo between done and not done
#[derive(Args)]
pub struct ToggleCommand {
    /// Todo ID
    id: i64,
}

impl ToggleCommand {
    pub async fn run<C, S>(&self, collection: &C, store: &S) -> Result<(), Box<dyn std::error::Error>>
    where
        C: TodoCollection,
        S: TableStore,
    {
        let mut live = LiveTodos::new(collection, store);
        live.load().await?;

        let completed = match live.get(self.id) {
            Some(todo) => todo.completed,
            None => collection.get(self.id).await?.completed,
        };
        live.toggle_todo(self.id, !completed).await?;

        println!(
            "Marked todo {} as {}",
            self.id,
            if completed { "not done" } else { "done" }
        );
        Ok(())
    }
}

/// Remove a todo
#[derive(Args)]
pub struct RemoveCommand {
    /// Todo ID
    id: i64,
}

impl RemoveCommand {
    pub async fn run<C, S>(&self, collection: &C, store: &S) -> Result<(), Box<dyn std::error::Error>>
    where
        C: TodoCollection,
        S: TableStore,
    {
        let mut live = LiveTodos::new(collection, store);
        live.load().await?;
        live.remove_todo(self.id).await?;

        println!("Removed todo {}", self.id);
        Ok(())
    }
}

pub(crate) fn print_todos(todos: &[Todo]) {
    for todo in todos {
        println!("{}", todo);
    }
    println!("\nTotal: {} todo(s)", todos.len());
}

/// One line describing where the working set came from.
pub(crate) fn describe_load(reconciliation: &Reconciliation) -> String {
    let source = match reconciliation.source {
        WorkingSetSource::Rest => "REST collection",
        WorkingSetSource::Store => "table store",
    };
    let store = if reconciliation.store_reachable {
        "store reachable"
    } else {
        "store unreachable"
    };

    match &reconciliation.backfill {
        BackfillOutcome::NotAttempted => format!("Loaded from {} ({})", source, store),
        BackfillOutcome::Inserted(n) => {
            format!("Loaded from {} ({}, backfilled {} row(s))", source, store, n)
        }
        BackfillOutcome::Failed(e) => {
            format!("Loaded from {} ({}, backfill failed: {})", source, store, e)
        }
    }
}
