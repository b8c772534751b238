//! Troupe - plan-then-execute collaboration for hosted LLM agents
//!
//! A convenience layer over the OpenAI and Anthropic chat APIs: agents with
//! bounded memory and typed tools, and a collaboration that asks the model
//! for a plan and runs it across a roster of agents.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Provider abstraction, OpenAI/Anthropic clients (plain and
//!   streamed), `ModelClient`
//! - **Tools**: Typed tool builder and registry
//! - **Agent**: Tool-calling chat cycle with bounded memory
//! - **Collaborate**: Planning, plan repair, and step execution
//! - **CLI**: Roster files and subcommands for the binary
//!
//! # Usage
//!
//! ```rust,no_run
//! use serde_json::json;
//! use troupe::{Agent, Collaboration, Config, ModelClient, Tool};
//!
//! #[tokio::main]
//! async fn main() -> troupe::Result<()> {
//!     let client = ModelClient::from_config(Config::load())?;
//!
//!     let add = Tool::builder("add")
//!         .description("Add two integers")
//!         .param::<i64>("a")
//!         .param::<i64>("b")
//!         .handler(|args| Ok(json!(args.get::<i64>("a")? + args.get::<i64>("b")?)))
//!         .build()?;
//!
//!     let analyst = Agent::builder()
//!         .name("Analyst")
//!         .system_prompt("You analyse numbers.")
//!         .tool(add)
//!         .build(client.clone())?;
//!     let writer = Agent::builder()
//!         .name("Writer")
//!         .system_prompt("You write short reports.")
//!         .build(client.clone())?;
//!
//!     let collaboration = Collaboration::new(vec![analyst, writer], client)?;
//!     let result = collaboration.execute("Report the sum of 2 and 3").await?;
//!     for step in &result.results {
//!         println!("{} ({:?}): {}", step.agent, step.status, step.output);
//!     }
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod collaborate;
pub mod core;
pub mod llm;
pub mod telemetry;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used items
pub use agent::{Agent, AgentBuilder, Memory, MemoryEntry};
pub use collaborate::{
    Collaboration, CollaborationBuilder, ExecutionResult, PlanStep, StepResult, StepStatus,
};
pub use crate::core::{Config, ProviderKind, Result, TroupeError};
pub use llm::{LLMProvider, LLMResponse, ModelClient, TextStream};
pub use tools::{Tool, ToolArgs, ToolRegistry};
