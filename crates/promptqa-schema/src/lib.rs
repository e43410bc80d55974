//! Shared boundary data model for PromptQA.
//!
//! Every type that crosses a component boundary (planner output, driver
//! observation, evaluator verdict, final report) lives here, with a
//! hand-rolled `validate()` enforcing each type's invariants.
//! This crate has no I/O and no LLM or driver dependency.

pub mod agent;
pub mod capture;
pub mod errors;
pub mod results;
pub mod selector;
pub mod snapshot;
pub mod step;

pub use agent::{AgentFinalEvaluation, AgentStepResponse};
pub use capture::{CaptureFrame, ConsoleEntry, ConsoleLevel, NetworkFailure, PageError};
pub use errors::SchemaError;
pub use results::{
    truncate_observation, ActionHistoryEntry, BugReport, EvaluationResult, RunSummary, Severity,
    StepExecutionResult, Verdict,
};
pub use selector::{SelectorHint, SelectorStrategy};
pub use snapshot::{InteractiveElement, PageSnapshot, MAX_VISIBLE_TEXT_CHARS};
pub use step::{Step, StepKind};
