//! Tools module - callables an agent can expose to the model
//!
//! Contains the `Tool` value with its typed builder and the tool registry.

pub mod registry;
pub mod tool;

pub use registry::{render_output, ToolRegistry};
pub use tool::{ParamType, Tool, ToolArgs, ToolBuilder};
