//! Batch workflow: generate every combination, gate it through QA, and
//! distribute what passes.

pub mod analyzer;
pub mod error;
pub mod memory;
pub mod orchestrator;

pub use analyzer::{ContentAnalyzer, NoopAnalyzer};
pub use error::{Stage, WorkflowError};
pub use memory::InMemoryRepository;
pub use orchestrator::{WorkflowOrchestrator, WorkflowResult, CANCELLED_REASON};
