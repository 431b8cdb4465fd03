//! Automated quality gate for generated content, plus the human re-review
//! that can override it.

pub mod checks;
pub mod engine;

pub use checks::CheckResult;
pub use engine::{gate, GateDecision, QaEngine};
