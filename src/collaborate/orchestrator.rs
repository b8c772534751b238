//! Collaboration orchestrator
//!
//! Plans a task across a fixed roster of agents, then runs the plan step by
//! step. Each step sees a running context of earlier outputs and, when
//! enabled, the shared memory. Planning failures degrade to the fallback
//! plan and step failures are recorded, so `execute` always returns partial
//! results instead of failing halfway.

use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::agent::{Agent, Memory, MemoryEntry};
use crate::collaborate::grouping::{GroupingStrategy, Sequential};
use crate::collaborate::plan::{fallback_plan, plan_from_response, planning_prompt, PlanStep};
use crate::core::runtime::blocking_runtime;
use crate::core::text::preview;
use crate::core::{Message, Result, TroupeError};
use crate::llm::ModelClient;

/// Where a collaboration is in its current run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaborationPhase {
    Idle,
    Planning,
    Executing,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Error,
}

/// Outcome of one plan step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub step: u32,
    pub agent: String,
    pub action: String,
    pub status: StepStatus,
    /// Agent reply, or the error text
    pub output: String,
}

impl StepResult {
    fn success(step: &PlanStep, output: String) -> Self {
        Self {
            step: step.step,
            agent: step.agent.clone(),
            action: step.action.clone(),
            status: StepStatus::Success,
            output,
        }
    }

    fn error(step: &PlanStep, output: String) -> Self {
        Self {
            status: StepStatus::Error,
            ..Self::success(step, output)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

/// Everything one `execute` run produced
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub task: String,
    pub plan: Vec<PlanStep>,
    pub results: Vec<StepResult>,
    /// Shared memory after the run; empty when shared memory is off
    pub memory: Vec<MemoryEntry>,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

/// Shared memory statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollaborationMemoryStats {
    pub entries: usize,
    pub max_entries: usize,
    pub agent_contributions: BTreeMap<String, usize>,
}

/// Coordinates a roster of agents through a planned task
pub struct Collaboration {
    agents: Vec<Agent>,
    client: ModelClient,
    shared_memory: bool,
    memory: Mutex<Memory>,
    planning_model: Option<String>,
    planning_temperature: f32,
    planning_prompt: Option<String>,
    preview_chars: usize,
    grouping: Box<dyn GroupingStrategy>,
    phase: Mutex<CollaborationPhase>,
}

/// Builder for creating Collaborations
pub struct CollaborationBuilder {
    agents: Vec<Agent>,
    shared_memory: Option<bool>,
    memory_size: Option<usize>,
    planning_model: Option<String>,
    planning_temperature: Option<f32>,
    planning_prompt: Option<String>,
    preview_chars: Option<usize>,
    grouping: Box<dyn GroupingStrategy>,
}

impl CollaborationBuilder {
    pub fn new(agents: Vec<Agent>) -> Self {
        Self {
            agents,
            shared_memory: None,
            memory_size: None,
            planning_model: None,
            planning_temperature: None,
            planning_prompt: None,
            preview_chars: None,
            grouping: Box::new(Sequential),
        }
    }

    /// Share step outputs between agents
    pub fn shared_memory(mut self, enabled: bool) -> Self {
        self.shared_memory = Some(enabled);
        self
    }

    pub fn memory_size(mut self, size: usize) -> Self {
        self.memory_size = Some(size);
        self
    }

    /// Model used for the planning call
    pub fn planning_model(mut self, model: impl Into<String>) -> Self {
        self.planning_model = Some(model.into());
        self
    }

    pub fn planning_temperature(mut self, temperature: f32) -> Self {
        self.planning_temperature = Some(temperature);
        self
    }

    /// Replace the default planning instructions
    pub fn planning_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.planning_prompt = Some(prompt.into());
        self
    }

    /// Characters of earlier outputs carried into later prompts
    pub fn preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = Some(chars);
        self
    }

    /// Grouping used by `execute_grouped`
    pub fn grouping(mut self, strategy: Box<dyn GroupingStrategy>) -> Self {
        self.grouping = strategy;
        self
    }

    /// Build the Collaboration.
    ///
    /// Agents still carrying the default name become `Agent1`, `Agent2`, ...
    /// by position.
    pub fn build(self, client: ModelClient) -> Result<Collaboration> {
        client.ensure_ready()?;
        if self.agents.is_empty() {
            return Err(TroupeError::NoAgents);
        }

        let defaults = &client.config().collaboration;
        let shared_memory = self.shared_memory.unwrap_or(defaults.shared_memory);
        let memory = if shared_memory {
            Memory::new(self.memory_size.unwrap_or(defaults.memory_size))
        } else {
            Memory::disabled()
        };

        let mut agents = self.agents;
        for (i, agent) in agents.iter_mut().enumerate() {
            if agent.has_default_name() {
                agent.set_name(format!("Agent{}", i + 1));
            }
        }
        for (i, agent) in agents.iter().enumerate() {
            if agents[..i].iter().any(|a| a.name() == agent.name()) {
                tracing::warn!(agent = agent.name(), "Duplicate agent name in roster");
            }
        }

        tracing::info!(
            agents = agents.len(),
            shared_memory,
            grouping = self.grouping.name(),
            "Collaboration initialized"
        );

        Ok(Collaboration {
            planning_model: self.planning_model.or_else(|| defaults.planning_model.clone()),
            planning_temperature: self
                .planning_temperature
                .unwrap_or(defaults.planning_temperature),
            planning_prompt: self.planning_prompt,
            preview_chars: self.preview_chars.unwrap_or(defaults.preview_chars),
            agents,
            shared_memory,
            memory: Mutex::new(memory),
            grouping: self.grouping,
            phase: Mutex::new(CollaborationPhase::Idle),
            client,
        })
    }
}

impl Collaboration {
    pub fn builder(agents: Vec<Agent>) -> CollaborationBuilder {
        CollaborationBuilder::new(agents)
    }

    /// Collaboration with the configured defaults
    pub fn new(agents: Vec<Agent>, client: ModelClient) -> Result<Self> {
        CollaborationBuilder::new(agents).build(client)
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Agent with exactly this name
    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.name() == name)
    }

    pub fn agent_names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn phase(&self) -> CollaborationPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: CollaborationPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// Ask the model for a plan and repair it against the roster.
    ///
    /// Never fails: transport errors and unusable responses both produce the
    /// fallback plan.
    pub async fn plan(&self, task: &str) -> Vec<PlanStep> {
        let names = self.agent_names();
        let prompt = planning_prompt(task, &self.agents, self.planning_prompt.as_deref());

        tracing::debug!(task = preview(task, 200), "Creating execution plan");
        let response = self
            .client
            .send(
                &[Message::user(prompt)],
                &[],
                self.planning_model.as_deref(),
                Some(self.planning_temperature),
            )
            .await;

        let plan = match response {
            Ok(response) => plan_from_response(&response.content, &names, task),
            Err(e) => {
                tracing::error!(error = %e, "Planning failed, using fallback plan");
                fallback_plan(&names, task)
            }
        };
        tracing::debug!(steps = plan.len(), "Created plan");
        plan
    }

    /// Plan and run a task one step at a time
    pub async fn execute(&self, task: &str) -> Result<ExecutionResult> {
        self.client.ensure_ready()?;

        self.set_phase(CollaborationPhase::Planning);
        let plan = self.plan(task).await;

        self.set_phase(CollaborationPhase::Executing);
        let mut context = initial_context(task);
        let mut results = Vec::with_capacity(plan.len());
        for step in &plan {
            let result = self.run_step(step, &context).await;
            self.record(&result, &mut context);
            results.push(result);
        }

        Ok(self.complete(task, plan, results))
    }

    /// Plan and run a task group by group.
    ///
    /// Steps in one group run concurrently against the same context; the
    /// default `Sequential` grouping makes this equivalent to `execute`.
    pub async fn execute_grouped(&self, task: &str) -> Result<ExecutionResult> {
        self.client.ensure_ready()?;

        self.set_phase(CollaborationPhase::Planning);
        let plan = self.plan(task).await;

        self.set_phase(CollaborationPhase::Executing);
        let mut context = initial_context(task);
        let mut results = Vec::with_capacity(plan.len());
        for group in self.grouping.group(&plan) {
            let group_context = context.clone();
            let outcomes =
                join_all(group.iter().map(|step| self.run_step(step, &group_context))).await;
            for result in outcomes {
                self.record(&result, &mut context);
                results.push(result);
            }
        }

        Ok(self.complete(task, plan, results))
    }

    /// `execute` for synchronous callers.
    ///
    /// Returns a `Config` error when called from inside an async context.
    pub fn execute_blocking(&self, task: &str) -> Result<ExecutionResult> {
        blocking_runtime()?.block_on(self.execute(task))
    }

    pub fn clear_memory(&self) {
        self.memory().clear();
        tracing::debug!("Collaboration memory cleared");
    }

    /// Shared `(agent, output)` entries, oldest first
    pub fn memory_snapshot(&self) -> Vec<MemoryEntry> {
        self.memory().snapshot()
    }

    pub fn memory_stats(&self) -> CollaborationMemoryStats {
        let memory = self.memory();
        let mut agent_contributions = BTreeMap::new();
        for entry in memory.iter() {
            *agent_contributions.entry(entry.label.clone()).or_insert(0) += 1;
        }
        CollaborationMemoryStats {
            entries: memory.len(),
            max_entries: memory.capacity(),
            agent_contributions,
        }
    }

    async fn run_step(&self, step: &PlanStep, context: &str) -> StepResult {
        let Some(agent) = self.agent(&step.agent) else {
            tracing::error!(step = step.step, agent = %step.agent, "Agent not found");
            return StepResult::error(step, format!("Agent '{}' not found", step.agent));
        };

        let message = self.step_message(step, context);
        match agent.chat(&message).await {
            Ok(output) => {
                tracing::info!(step = step.step, agent = %step.agent, "Step completed");
                StepResult::success(step, output)
            }
            Err(e) => {
                tracing::error!(step = step.step, agent = %step.agent, error = %e, "Step failed");
                StepResult::error(step, e.to_string())
            }
        }
    }

    fn step_message(&self, step: &PlanStep, context: &str) -> String {
        let mut message = format!(
            "{}Step {}: {}\n\nInstructions: {}",
            context, step.step, step.action, step.instructions
        );

        let memory = self.memory();
        if self.shared_memory && !memory.is_empty() {
            message.push_str("\n\nShared Memory:\n");
            for entry in memory.iter() {
                message.push_str(&format!(
                    "- {}: {}...\n",
                    entry.label,
                    preview(&entry.value, self.preview_chars)
                ));
            }
        }
        message
    }

    /// Fold a finished step into shared memory and the running context
    fn record(&self, result: &StepResult, context: &mut String) {
        if !result.is_success() {
            return;
        }
        if self.shared_memory {
            self.memory().push(&result.agent, &result.output);
        }
        context.push_str(&format!(
            "Step {} ({}): {}...\n\n",
            result.step,
            result.agent,
            preview(&result.output, self.preview_chars)
        ));
    }

    fn complete(
        &self,
        task: &str,
        plan: Vec<PlanStep>,
        results: Vec<StepResult>,
    ) -> ExecutionResult {
        self.set_phase(CollaborationPhase::Completed);
        tracing::info!(
            steps = results.len(),
            failed = results.iter().filter(|r| !r.is_success()).count(),
            "Collaboration completed"
        );

        ExecutionResult {
            task: task.to_string(),
            plan,
            results,
            memory: if self.shared_memory {
                self.memory_snapshot()
            } else {
                Vec::new()
            },
        }
    }

    fn memory(&self) -> MutexGuard<'_, Memory> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Collaboration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaboration")
            .field("agents", &self.agent_names())
            .field("shared_memory", &self.shared_memory)
            .finish()
    }
}

fn initial_context(task: &str) -> String {
    format!("Original task: {}\n\n", task)
}
