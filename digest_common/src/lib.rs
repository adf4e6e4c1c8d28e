//!
//! Common types and utilities of the crypto digest agent.
//!
//! This crate aggregates:
//! - `error`: unified error type `AgentError` used across the workspace.
//! - `result`: handy `Result<T, AgentError>` alias.
//! - `entity`: ranking rows fetched from the market data provider.
//! - `destination`: delivery targets (conversations and channels).
//! - `command`: structured chat commands and their text parser.
//! - `provider`: selectable market data providers.
//! - `format`: digest rendering.
//! - `net`: endpoints, ports and timing constants.
#![warn(missing_docs)]
pub mod command;
pub mod destination;
pub mod entity;
pub mod error;
pub mod format;
pub mod net;
pub mod provider;
pub mod result;

pub use command::{CommandEvent, CommandKind};
pub use destination::Destination;
pub use entity::Entity;
pub use error::AgentError;
pub use result::Result;
