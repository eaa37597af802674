//! Generative text wrapper for diet suggestions.
//!
//! This crate turns a structured patient profile (measurements plus the
//! calculator output) into a prompt, sends it to an OpenAI-compatible chat
//! completions endpoint and hands back the free-text narrative.

pub mod generation;
pub mod prompts;

pub use generation::*;
pub use prompts::*;
