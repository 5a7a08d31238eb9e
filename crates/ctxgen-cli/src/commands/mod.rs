//! CLI Command Implementations
//!
//! - [`generate`]: Sharded feature generation
//! - [`verify`]: Artifact verification
//! - [`inspect`]: Dataset summary

mod generate;
mod inspect;
mod verify;

pub use generate::{CurrentEventArg, GenerateCommand, ScopeArg};
pub use inspect::InspectCommand;
pub use verify::VerifyCommand;
