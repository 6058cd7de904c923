//! Workflow variants and the shared query-generation stage

pub mod generation;
pub mod kind;
pub mod stage;

pub use generation::{GenerationResult, QueryEntry};
pub use kind::{UnknownWorkflowType, WorkflowKind};
pub use stage::{StageOutcome, WorkflowStage};
