//! Router event infrastructure
//!
//! - [`types`]: the tagged event union and its JSON wire shape
//! - [`stream`]: the lazy, cancellable channel that carries events to the caller

pub mod stream;
pub mod types;

pub use stream::{ConsumerGone, EventSink, EventStream};
pub use types::{GeneratedQuery, Phase, RouterEvent, Step};
