//! `.alive`: report that the bot is up.

use async_trait::async_trait;

use super::CommandHandler;
use crate::reply::ReplyChannel;

pub struct AliveCommand {
    message: String,
}

impl AliveCommand {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl CommandHandler for AliveCommand {
    fn name(&self) -> &'static str {
        "alive"
    }

    async fn execute(&self, _argument: Option<String>, reply: ReplyChannel) {
        reply.text(self.message.clone()).await;
    }
}
