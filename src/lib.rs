//! wabot library root.

pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod lookup;
pub mod probe;
pub mod reply;
pub mod router;
pub mod session;
pub mod task;
pub mod transport;

pub use commands::CommandHandler;
pub use config::{load_settings, Settings};
pub use engine::Engine;
pub use error::{Error, Result};
pub use reply::{Outbound, OutboundContent, ReplyChannel};
pub use router::{CommandRouter, ParsedCommand};
pub use session::{Phase, Session};
pub use task::{TaskDescriptor, TaskRunner};
