//! Diagnosis Runtime - rule-grounded LLM orchestration
//!
//! This crate turns a clinical record plus its time markers into a
//! chronotherapy recommendation:
//! 1. **Rules** (`rules`) - Load the ruleset once and serve it from memory
//! 2. **Prompting** (`prompt`) - Compose the deterministic system/user pair
//! 3. **Completion** (`llm`) - One call to an OpenAI-compatible endpoint
//! 4. **Parsing** (`parse`) - Structured result, pass-through JSON, or raw text
//!
//! `DiagnosisRuntime` (see `runtime`) sequences the four and wraps every
//! outcome in the `{ success, data, error }` envelope.
//!
//! # Safety Principle
//!
//! The model output is advisory text for a practitioner. Field values are
//! never reinterpreted or rejected here; only the shape is checked.

pub mod llm;
pub mod parse;
pub mod prompt;
pub mod rules;
pub mod runtime;

pub use llm::{LlmClient, OpenAiCompatibleClient};
pub use rules::{FileRuleRepository, RuleSource, StaticRuleSource};
pub use runtime::{DiagnosisReply, DiagnosisRuntime, Envelope};
