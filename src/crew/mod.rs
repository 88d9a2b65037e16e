// Crew - the developer/debugger iteration loop and the types it streams

pub mod context;
pub mod events;
pub mod runner;
pub mod verdict;

pub use context::{compose_revision_prompt, IterationContext};
pub use events::{EventStatus, LoopResult, ProgressEvent};
pub use runner::{DevelopmentLoop, LoopConfig};
pub use verdict::Verdict;
