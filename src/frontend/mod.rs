// User-facing answers: text rendering and the tool registry

pub mod text;
pub mod tools;

pub use tools::{QueryContext, ToolArgs, ToolRegistry};
