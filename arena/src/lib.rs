//! Multi-party AI debate arena.
//!
//! This library orchestrates live debates between AI personas over a
//! client-supplied topic:
//! - A generated cast of debaters split across both sides of the topic,
//!   plus one swing participant, plus an optional secretly biased arbiter
//! - A round-robin main loop with probabilistic arbiter interjections
//! - A bounded prompt window over an append-only session history
//! - An event protocol for driving a real-time client, with mid-session
//!   observer messages and fabricated-evidence claim injection
//! - A connection-scoped archive of completed debates
//!
//! The entry point is [`gateway::Gateway`], which serves one control loop
//! per connection and spawns a [`session::SessionRunner`] per debate. Text
//! generation is abstracted behind [`generate::Generate`], with
//! [`client::ChatClient`] as the live implementation.

pub mod archive;
pub mod client;
pub mod config;
pub mod events;
pub mod gateway;
pub mod generate;
pub mod history;
pub mod prompt;
pub mod roster;
pub mod scheduler;
pub mod session;
pub mod stance;

// Re-export the protocol surface
pub use events::{ArenaEvent, ControlMessage};
pub use gateway::Gateway;

// Re-export key session types
pub use archive::{ArchivedDebate, ArchiveSummary, ConnectionRegistry, SharedRegistry};
pub use client::ChatClient;
pub use config::DebateSettings;
pub use generate::{Generate, GenerateError};
pub use session::{GroupMeta, SessionPhase, Winner};
