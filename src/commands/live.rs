//! Interactive shell: keeps the working set open, applies pushed changes as
//! they arrive and accepts commands on stdin.

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use todosync_core::{ChannelMessage, LiveTodos, TableStore, TodoCollection, INITIAL_LOAD_LIMIT};

use super::parse_limit;
use super::todo::{describe_load, print_todos};

/// Watch the list and edit it interactively
#[derive(Args)]
pub struct LiveCommand {
    /// Number of items to load
    #[arg(long, short = 'n', value_parser = parse_limit, default_value_t = INITIAL_LOAD_LIMIT)]
    limit: usize,
}

/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ShellCommand {
    List,
    Add(String),
    Toggle(i64),
    Remove(i64),
    Status,
    Help,
    Quit,
}

impl ShellCommand {
    fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_lowercase().as_str() {
            "list" | "ls" => ShellCommand::List,
            "add" if rest.is_empty() => return Err("Usage: add <title>".to_string()),
            "add" => ShellCommand::Add(rest.to_string()),
            "toggle" | "t" => ShellCommand::Toggle(parse_id(rest)?),
            "remove" | "rm" | "delete" => ShellCommand::Remove(parse_id(rest)?),
            "status" => ShellCommand::Status,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" | "q" => ShellCommand::Quit,
            other => return Err(format!("Unknown command: {} (type 'help')", other)),
        };
        Ok(Some(command))
    }
}

fn parse_id(arg: &str) -> Result<i64, String> {
    arg.parse()
        .map_err(|_| format!("Expected a todo id, got '{}'", arg))
}

enum Input {
    Channel(Option<ChannelMessage>),
    Line(Option<String>),
    Interrupt,
}

const HELP: &str = "Commands:
  list              show the todos
  add <title>       add a todo
  toggle <id>       flip done / not done
  remove <id>       delete a todo
  status            show connection state
  quit              leave";

impl LiveCommand {
    pub async fn run<C, S>(&self, collection: &C, store: &S) -> Result<(), Box<dyn std::error::Error>>
    where
        C: TodoCollection,
        S: TableStore,
    {
        let mut live = LiveTodos::new(collection, store).with_limit(self.limit);

        println!("Loading todos...");
        let reconciliation = live.load().await?;
        print_todos(live.todos());
        println!("{}", describe_load(&reconciliation));

        live.mount().await;
        println!("\n{}\n", HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let input = tokio::select! {
                message = live.next_message(), if live.is_mounted() => Input::Channel(message),
                line = lines.next_line() => Input::Line(line?),
                _ = tokio::signal::ctrl_c() => Input::Interrupt,
            };

            match input {
                Input::Channel(Some(message)) => {
                    print_message(&message);
                    live.apply_message(message);
                }
                Input::Channel(None) => {
                    println!("Change subscription ended; edits are no longer pushed.");
                }
                Input::Line(None) | Input::Interrupt => break,
                Input::Line(Some(line)) => match ShellCommand::parse(&line) {
                    Ok(Some(ShellCommand::Quit)) => break,
                    Ok(Some(command)) => execute(&mut live, command).await,
                    Ok(None) => {}
                    Err(message) => println!("{}", message),
                },
            }
        }

        live.unmount();
        println!("Bye.");
        Ok(())
    }
}

async fn execute<C, S>(live: &mut LiveTodos<'_, C, S>, command: ShellCommand)
where
    C: TodoCollection,
    S: TableStore,
{
    match command {
        ShellCommand::List => print_todos(live.todos()),
        ShellCommand::Add(title) => match live.add_todo(&title).await {
            Ok(todo) => println!("Added todo {}: {}", todo.id, todo.title),
            Err(e) => println!("✗ {}", e),
        },
        ShellCommand::Toggle(id) => {
            let Some(completed) = live.get(id).map(|t| t.completed) else {
                println!("No todo with id {}", id);
                return;
            };
            match live.toggle_todo(id, !completed).await {
                Ok(_) => println!(
                    "Marked todo {} as {}",
                    id,
                    if completed { "not done" } else { "done" }
                ),
                Err(e) => println!("✗ {}", e),
            }
        }
        ShellCommand::Remove(id) => match live.remove_todo(id).await {
            Ok(()) => println!("Removed todo {}", id),
            Err(e) => println!("✗ {}", e),
        },
        ShellCommand::Status => {
            println!("Subscription: {}", live.connection());
            println!(
                "Store:        {}",
                if live.store_connected() { "connected" } else { "not connected" }
            );
            if let Some(e) = live.error() {
                println!("Last error:   {}", e);
            }
        }
        ShellCommand::Help => println!("{}", HELP),
        ShellCommand::Quit => {}
    }
}

fn print_message(message: &ChannelMessage) {
    match message {
        ChannelMessage::Status(status) => println!("[channel] {}", status),
        ChannelMessage::Change(event) => println!("[change] {} id={}", event.kind(), event.id()),
    }
}
