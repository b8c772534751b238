//! Collaborate module - plan-then-execute over a roster of agents
//!
//! Contains plan decoding and repair, step grouping, and the orchestrator.

pub mod grouping;
pub mod orchestrator;
pub mod plan;

pub use grouping::{GroupingStrategy, Sequential};
pub use orchestrator::{
    Collaboration, CollaborationBuilder, CollaborationMemoryStats, CollaborationPhase,
    ExecutionResult, StepResult, StepStatus,
};
pub use plan::{PlanStep, RawPlan};
