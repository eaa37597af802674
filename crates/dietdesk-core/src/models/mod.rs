//! Domain models for the practice dashboard.

mod appointment;
mod doctor;
mod patient;
mod plan;
mod visit;

pub use appointment::*;
pub use doctor::*;
pub use patient::*;
pub use plan::*;
pub use visit::*;
