mod traits;
pub mod tools;

pub use traits::*;
pub use tools::{builtin_tools, ToolDefinition};
