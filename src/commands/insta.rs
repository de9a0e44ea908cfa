//! `.insta <url>`: resolve an Instagram post to its video URL.

use async_trait::async_trait;
use std::sync::Arc;

use super::CommandHandler;
use crate::lookup::MetadataResolver;
use crate::reply::ReplyChannel;

pub const MISSING_URL: &str =
    "Please provide an Instagram URL, e.g., `.insta https://www.instagram.com/reel/...`";
pub const LOOKUP_FAILED: &str = "Failed to download Instagram video.";

pub struct InstaCommand {
    resolver: Arc<dyn MetadataResolver>,
}

impl InstaCommand {
    pub fn new(resolver: Arc<dyn MetadataResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl CommandHandler for InstaCommand {
    fn name(&self) -> &'static str {
        "insta"
    }

    async fn execute(&self, argument: Option<String>, reply: ReplyChannel) {
        let Some(url) = argument else {
            reply.text(MISSING_URL).await;
            return;
        };

        match self.resolver.resolve_video(&url).await {
            Ok(video_url) => reply.text(format!("Here is your video: {}", video_url)).await,
            Err(e) => {
                tracing::warn!(url = %url, "Instagram lookup failed: {}", e);
                reply.text(LOOKUP_FAILED).await;
            }
        }
    }
}
