mod todo;

pub use todo::{NewTodo, Todo, TodoPatch};
