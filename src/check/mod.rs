// src/check/mod.rs
mod evaluator;
mod types;

pub use evaluator::{evaluate, Evaluation, RecordKind};
pub use types::{CheckResult, CheckSpec, Outcome};
