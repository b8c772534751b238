//! CLI commands
//!
//! Roster files and the `run`, `plan` and `chat` subcommands. A roster is a
//! TOML file listing the agents of a collaboration:
//!
//! ```toml
//! shared_memory = true
//! planning_prompt = "Plan a short research report."
//!
//! [[agents]]
//! name = "Researcher"
//! system_prompt = "You research topics thoroughly."
//!
//! [[agents]]
//! name = "Writer"
//! system_prompt = "You write clear summaries."
//! use_memory = false
//! ```

use futures::StreamExt;
use serde::Deserialize;
use std::io::Write;
use std::path::Path;

use crate::agent::Agent;
use crate::collaborate::{Collaboration, ExecutionResult, PlanStep};
use crate::core::{Message, Result, TroupeError};
use crate::llm::ModelClient;

/// One agent entry of a roster file
#[derive(Debug, Clone, Deserialize)]
pub struct AgentEntry {
    pub name: Option<String>,
    pub system_prompt: Option<String>,
    #[serde(default = "default_true")]
    pub use_memory: bool,
    pub memory_size: Option<usize>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// Agents plus collaboration settings
#[derive(Debug, Clone, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub agents: Vec<AgentEntry>,
    pub shared_memory: Option<bool>,
    pub memory_size: Option<usize>,
    pub planning_model: Option<String>,
    pub planning_prompt: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Roster {
    /// Parse a roster from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read a roster file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TroupeError::config(format!("Cannot read roster {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Build the agents, all bound to `client`
    pub fn build_agents(&self, client: &ModelClient) -> Result<Vec<Agent>> {
        self.agents
            .iter()
            .map(|entry| {
                let mut builder = Agent::builder().use_memory(entry.use_memory);
                if let Some(ref name) = entry.name {
                    builder = builder.name(name);
                }
                if let Some(ref prompt) = entry.system_prompt {
                    builder = builder.system_prompt(prompt);
                }
                if let Some(size) = entry.memory_size {
                    builder = builder.memory_size(size);
                }
                if let Some(ref model) = entry.model {
                    builder = builder.model(model);
                }
                if let Some(temperature) = entry.temperature {
                    builder = builder.temperature(temperature);
                }
                builder.build(client.clone())
            })
            .collect()
    }

    /// Build the collaboration described by this roster
    pub fn build_collaboration(&self, client: &ModelClient) -> Result<Collaboration> {
        let mut builder = Collaboration::builder(self.build_agents(client)?);
        if let Some(shared) = self.shared_memory {
            builder = builder.shared_memory(shared);
        }
        if let Some(size) = self.memory_size {
            builder = builder.memory_size(size);
        }
        if let Some(ref model) = self.planning_model {
            builder = builder.planning_model(model);
        }
        if let Some(ref prompt) = self.planning_prompt {
            builder = builder.planning_prompt(prompt);
        }
        builder.build(client.clone())
    }
}

/// Plan and execute a task with the roster's agents
pub async fn run(client: &ModelClient, roster: &Path, task: &str) -> Result<ExecutionResult> {
    let collaboration = Roster::load(roster)?.build_collaboration(client)?;
    collaboration.execute(task).await
}

/// Produce the validated plan without executing it
pub async fn plan(client: &ModelClient, roster: &Path, task: &str) -> Result<Vec<PlanStep>> {
    let collaboration = Roster::load(roster)?.build_collaboration(client)?;
    Ok(collaboration.plan(task).await)
}

/// One round-trip with a single agent
pub async fn chat(
    client: &ModelClient,
    system_prompt: Option<&str>,
    message: &str,
) -> Result<String> {
    let mut builder = Agent::builder().use_memory(false);
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    builder.build(client.clone())?.chat(message).await
}

/// One plain round-trip, written to `out` chunk by chunk as it arrives.
///
/// No tools are offered. Returns the full reply.
pub async fn chat_stream<W: Write>(
    client: &ModelClient,
    system_prompt: Option<&str>,
    message: &str,
    out: &mut W,
) -> Result<String> {
    client.ensure_ready()?;

    let system_prompt = system_prompt.unwrap_or(&client.config().agent.system_prompt);
    let messages = [Message::system(system_prompt), Message::user(message)];

    let mut stream = client.stream(&messages, None, None).await?;
    let mut reply = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        out.write_all(chunk.as_bytes())?;
        out.flush()?;
        reply.push_str(&chunk);
    }
    writeln!(out)?;

    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMResponse;
    use crate::test_support::{client_for, ScriptedProvider};

    const ROSTER: &str = r#"
        shared_memory = false

        [[agents]]
        name = "Researcher"
        system_prompt = "You research."

        [[agents]]
        system_prompt = "You write."
        use_memory = false
        memory_size = 3
    "#;

    #[test]
    fn test_roster_parsing() {
        let roster = Roster::from_toml(ROSTER).unwrap();
        assert_eq!(roster.agents.len(), 2);
        assert!(roster.agents[0].use_memory);
        assert!(!roster.agents[1].use_memory);
        assert_eq!(roster.shared_memory, Some(false));
    }

    #[test]
    fn test_roster_builds_collaboration() {
        let client = client_for(ScriptedProvider::queue(vec![]));
        let collab = Roster::from_toml(ROSTER)
            .unwrap()
            .build_collaboration(&client)
            .unwrap();

        assert_eq!(collab.agent_names(), vec!["Researcher", "Agent2"]);
        assert_eq!(collab.memory_stats().max_entries, 0);
        assert!(!collab.agents()[1].uses_memory());
    }

    #[test]
    fn test_empty_roster_is_rejected() {
        let client = client_for(ScriptedProvider::queue(vec![]));
        let err = Roster::from_toml("")
            .unwrap()
            .build_collaboration(&client)
            .unwrap_err();
        assert!(matches!(err, TroupeError::NoAgents));
    }

    #[tokio::test]
    async fn test_chat_command() {
        let provider = ScriptedProvider::queue(vec![LLMResponse::text("pong")]);
        let reply = chat(&client_for(provider.clone()), Some("Be terse."), "ping")
            .await
            .unwrap();
        assert_eq!(reply, "pong");
        assert_eq!(provider.requests()[0].system_text(), "Be terse.");
    }

    #[tokio::test]
    async fn test_chat_stream_writes_reply() {
        let provider = ScriptedProvider::queue(vec![LLMResponse::text("streamed pong")]);
        let mut out = Vec::new();

        let reply = chat_stream(&client_for(provider.clone()), None, "ping", &mut out)
            .await
            .unwrap();

        assert_eq!(reply, "streamed pong");
        assert_eq!(String::from_utf8(out).unwrap(), "streamed pong\n");
        let request = &provider.requests()[0];
        assert!(request.tools.is_empty());
        assert_eq!(request.system_text(), "You are a helpful AI assistant.");
    }
}
