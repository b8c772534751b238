//! Execution plans
//!
//! Builds the planning prompt, decodes whatever the model sent back and
//! repairs agent references against the roster. Nothing here fails: any
//! response that cannot be turned into at least one step yields the fallback
//! plan (one step per agent, in roster order).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::Agent;

/// One step of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// 1-based, advisory only
    pub step: u32,
    pub agent: String,
    pub action: String,
    pub instructions: String,
}

impl PlanStep {
    pub fn new(
        step: u32,
        agent: impl Into<String>,
        action: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            step,
            agent: agent.into(),
            action: action.into(),
            instructions: instructions.into(),
        }
    }
}

/// Shape of a decoded planning response
#[derive(Debug, Clone, PartialEq)]
pub enum RawPlan {
    /// A JSON array; each element is a candidate step
    PlanArray(Vec<Value>),
    /// A lone object carrying `step` and `agent`
    SingleStep(Map<String, Value>),
    Unrecognized,
}

impl RawPlan {
    pub fn classify(value: Value) -> Self {
        match value {
            Value::Array(items) => RawPlan::PlanArray(items),
            Value::Object(map) if map.contains_key("step") && map.contains_key("agent") => {
                RawPlan::SingleStep(map)
            }
            _ => RawPlan::Unrecognized,
        }
    }

    /// Candidate steps, or `None` when the shape is not a plan
    pub fn into_steps(self) -> Option<Vec<Value>> {
        match self {
            RawPlan::PlanArray(items) => Some(items),
            RawPlan::SingleStep(map) => Some(vec![Value::Object(map)]),
            RawPlan::Unrecognized => None,
        }
    }
}

/// How a step's agent reference was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Exact,
    CaseInsensitive,
    RoundRobin,
}

/// Maps agent references onto roster names.
///
/// The round-robin cursor lives for one validation pass and only moves when
/// a reference cannot be resolved.
pub struct RosterResolver<'a> {
    names: &'a [String],
    cursor: usize,
}

impl<'a> RosterResolver<'a> {
    pub fn new(names: &'a [String]) -> Self {
        Self { names, cursor: 0 }
    }

    /// Resolve a reference; `None` means it was not a string at all.
    ///
    /// Returns `None` only when the roster is empty.
    pub fn resolve(&mut self, reference: Option<&str>) -> Option<(String, Resolution)> {
        if self.names.is_empty() {
            return None;
        }

        if let Some(reference) = reference {
            if let Some(name) = self.names.iter().find(|n| n.as_str() == reference) {
                return Some((name.clone(), Resolution::Exact));
            }
            let lowered = reference.to_lowercase();
            if let Some(name) = self.names.iter().find(|n| n.to_lowercase() == lowered) {
                return Some((name.clone(), Resolution::CaseInsensitive));
            }
        }

        let name = self.names[self.cursor % self.names.len()].clone();
        self.cursor += 1;
        Some((name, Resolution::RoundRobin))
    }
}

/// One step per agent, each handling a numbered part of the task
pub fn fallback_plan(names: &[String], task: &str) -> Vec<PlanStep> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            PlanStep::new(
                i as u32 + 1,
                name,
                format!("Handle part {} of the task: {}", i + 1, task),
                task,
            )
        })
        .collect()
}

/// Turn candidate steps into a plan whose agents all exist in `names`.
///
/// Non-object steps and steps without an `agent` field are dropped. Falls
/// back when nothing survives.
pub fn validate_steps(raw: Vec<Value>, names: &[String], task: &str) -> Vec<PlanStep> {
    let mut resolver = RosterResolver::new(names);
    let mut plan = Vec::with_capacity(raw.len());

    for (i, value) in raw.into_iter().enumerate() {
        let Value::Object(fields) = value else {
            tracing::warn!(step = i + 1, "Plan step is not an object, skipping");
            continue;
        };
        let Some(reference) = fields.get("agent") else {
            tracing::warn!(step = i + 1, "Plan step has no agent, skipping");
            continue;
        };

        let Some((agent, resolution)) = resolver.resolve(reference.as_str()) else {
            break;
        };
        match resolution {
            Resolution::Exact => {}
            Resolution::CaseInsensitive => tracing::debug!(
                step = i + 1,
                from = %reference,
                to = %agent,
                "Fixed agent name case"
            ),
            Resolution::RoundRobin => tracing::warn!(
                step = i + 1,
                requested = %reference,
                assigned = %agent,
                "Unknown agent in plan, reassigned"
            ),
        }

        plan.push(PlanStep {
            step: step_number(fields.get("step")).unwrap_or(plan.len() as u32 + 1),
            agent,
            action: text_field(fields.get("action")),
            instructions: text_field(fields.get("instructions")),
        });
    }

    if plan.is_empty() {
        tracing::warn!("No usable plan steps, using fallback plan");
        return fallback_plan(names, task);
    }

    tracing::info!(steps = plan.len(), "Validated plan");
    plan
}

/// Build a validated plan from a raw planning response
pub fn plan_from_response(response: &str, names: &[String], task: &str) -> Vec<PlanStep> {
    let Some(value) = decode_json(response) else {
        tracing::warn!(
            response = crate::core::text::preview(response, 500),
            "Planning response is not JSON, using fallback plan"
        );
        return fallback_plan(names, task);
    };

    match RawPlan::classify(value).into_steps() {
        Some(steps) => validate_steps(steps, names, task),
        None => {
            tracing::warn!("Planning response has no plan structure, using fallback plan");
            fallback_plan(names, task)
        }
    }
}

/// Decode model output as JSON, tolerating prose, code fences and raw
/// control characters inside strings.
pub fn decode_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    parse_repairing(trimmed).or_else(|| extract_json(trimmed).and_then(parse_repairing))
}

fn parse_repairing(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok().or_else(|| {
        let repaired = escape_control_chars(text);
        let value = serde_json::from_str(&repaired).ok();
        if value.is_some() {
            tracing::debug!("Parsed JSON after escaping control characters");
        }
        value
    })
}

/// First `[...]` or `{...}` slice in `text`, whichever opens first.
///
/// Only the opening bracket kind is counted, so brackets inside strings can
/// confuse it; the slice is parsed afterwards anyway.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    let (open, close) = if text[start..].starts_with('[') {
        ('[', ']')
    } else {
        ('{', '}')
    };

    let mut depth = 0usize;
    for (offset, c) in text[start..].char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(&text[start..start + offset + c.len_utf8()]);
            }
        }
    }
    None
}

/// Escape newline, carriage return, tab, backspace and form feed appearing
/// raw inside JSON string literals.
pub fn escape_control_chars(json: &str) -> String {
    let mut out = String::with_capacity(json.len() + 16);
    let mut in_string = false;
    let mut escaped = false;

    for c in json.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '\u{8}' => out.push_str("\\b"),
                '\u{c}' => out.push_str("\\f"),
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }
    out
}

fn step_number(value: Option<&Value>) -> Option<u32> {
    match value? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Description of one agent for the planner
fn describe_agent(agent: &Agent) -> String {
    let mut description = format!(
        "{}:\n  System Prompt: {}\n",
        agent.name(),
        agent.system_prompt()
    );
    if !agent.tools().is_empty() {
        description.push_str("  Tools:\n");
        let tools: Vec<String> = agent
            .tools()
            .tools()
            .iter()
            .map(|t| format!("    - {}: {}", t.name(), t.description()))
            .collect();
        description.push_str(&tools.join("\n"));
    }
    description
}

/// Prompt asking the model for a JSON plan over `agents`.
///
/// A custom preamble replaces the default instructions; the roster and the
/// naming rules are appended either way.
pub fn planning_prompt(task: &str, agents: &[Agent], custom: Option<&str>) -> String {
    let descriptions: Vec<String> = agents.iter().map(describe_agent).collect();
    let descriptions = descriptions.join("\n");
    let names: Vec<&str> = agents.iter().map(Agent::name).collect();
    let roster = names.join(", ");

    if let Some(preamble) = custom {
        return format!(
            "{preamble}\n\nTask: {task}\n\nAvailable Agents:\n{descriptions}\n\n\
             CRITICAL: You must ONLY use these exact agent names in your plan:\n{roster}\n\n\
             Do NOT create new agent names. Use only: {roster}"
        );
    }

    let example_agent = names.first().copied().unwrap_or("Agent1");
    format!(
        r#"You are a task planner coordinating multiple AI agents.

Task: {task}

Available Agents:
{descriptions}

CRITICAL: You must ONLY use these exact agent names in your plan:
{roster}

Create a step-by-step execution plan. For each step, specify:
1. Which agent should handle it
2. What the agent should do
3. Any specific instructions

Return the plan as a JSON array with this structure:
[
    {{
        "step": 1,
        "agent": "{example_agent}",
        "action": "Description of what the agent should do",
        "instructions": "Specific instructions for the agent"
    }},
    ...
]

CRITICAL RULES:
- ONLY use agent names from this list: {roster}
- Do NOT create new agent names
- Do NOT use role-based names like "Researcher" or "Planner"
- Use the exact names provided above
- Create a logical sequence of steps
- Consider agent capabilities and tools"#
    )
}
