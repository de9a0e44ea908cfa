//! Command routing: parse `.name argument` messages and look up a handler.

use std::collections::HashMap;
use std::sync::Arc;

use crate::commands::CommandHandler;
use crate::transport::InboundMessage;

/// Prefix that marks a message as a command.
pub const COMMAND_PREFIX: char = '.';

/// A command name and its optional argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub argument: Option<String>,
}

impl ParsedCommand {
    /// Parse a message body. Returns `None` unless the body starts with the
    /// command prefix followed by a non-empty name.
    pub fn parse(body: &str) -> Option<Self> {
        let rest = body.strip_prefix(COMMAND_PREFIX)?;
        // The name must follow the prefix directly: ". alive" is plain text.
        if rest.starts_with(char::is_whitespace) {
            return None;
        }

        let mut parts = rest.split_whitespace();
        let name = parts.next()?;

        Some(Self {
            name: name.to_string(),
            argument: parts.next().map(ToString::to_string),
        })
    }
}

/// A matched command, ready to execute.
pub struct HandlerInvocation {
    pub handler: Arc<dyn CommandHandler>,
    pub command: ParsedCommand,
    pub origin: String,
}

impl std::fmt::Debug for HandlerInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerInvocation")
            .field("handler", &self.handler.name())
            .field("command", &self.command)
            .field("origin", &self.origin)
            .finish()
    }
}

/// Registry of command handlers keyed by command name.
#[derive(Default, Clone)]
pub struct CommandRouter {
    handlers: HashMap<&'static str, Arc<dyn CommandHandler>>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own name, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) -> &mut Self {
        let name = handler.name();
        if self.handlers.insert(name, handler).is_some() {
            tracing::warn!("Replaced handler for command .{}", name);
        }
        self
    }

    /// Registered command names, sorted.
    pub fn command_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Select a handler for `message`. `None` means no registered command
    /// matched, which is not an error.
    pub fn route(&self, message: &InboundMessage) -> Option<HandlerInvocation> {
        let command = ParsedCommand::parse(&message.body)?;
        let handler = self.handlers.get(command.name.as_str())?.clone();

        tracing::info!(
            origin = %message.origin,
            command = %command.name,
            argument = command.argument.as_deref().unwrap_or(""),
            "Dispatching command"
        );

        Some(HandlerInvocation {
            handler,
            command,
            origin: message.origin.clone(),
        })
    }
}
