//! Ad-graph query router
//!
//! Classifies a natural-language question about advertising performance data
//! and dispatches it to the insight or optimization query-generation workflow,
//! streaming typed progress events back to the caller.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use adgraph_router::{Router, RouterConfig};
//! use futures::StreamExt;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let router = Router::from_config(&RouterConfig::from_env()?)?;
//! let mut events = router.run("Which ad groups have the highest cost per click?", "user-1");
//! while let Some(event) = events.next().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

pub mod config;

// Event wire model and stream plumbing
pub mod events;

// Collaborators
pub mod agentic;
pub mod graph;

// Orchestration
pub mod router;
pub mod workflow;

pub use config::RouterConfig;
pub use error::PipelineError;
pub use events::{EventStream, GeneratedQuery, Phase, RouterEvent, Step};
pub use router::{Router, RouterBuilder, RunState};
pub use workflow::WorkflowKind;
