//! # toolloop Core
//!
//! Domain types, traits, and error definitions for the toolloop agent runtime.
//! This crate has **no framework dependencies**. It defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the agent loop is a trait here (`Tool`,
//! `ModelClient`). Implementations live in their respective crates, so the
//! loop can be exercised with scripted stand-ins in tests and pointed at
//! real backends in production.

pub mod action;
pub mod agent;
pub mod error;
pub mod model;
pub mod run;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use action::{ActionDecision, Arguments, ParsedAction, FINAL_ANSWER_ACTION};
pub use agent::AgentConfig;
pub use error::{RunError, ToolError, TransportError};
pub use model::ModelClient;
pub use run::{Run, RunId, RunStatus, Scratchpad, Step};
pub use tool::{Parameter, ParameterKind, ParameterSchema, Tool, ToolDescription, ToolOutput, ToolRegistry};
