//! Nutrition metrics and input vocabulary.
//!
//! Pipeline: raw request strings → Normalizer → MetricInput → compute()

mod calculator;
mod normalizer;

pub use calculator::*;
pub use normalizer::*;
