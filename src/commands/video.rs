//! `.video <url>`: download a YouTube video at the best available quality and
//! send it back as a document.

use async_trait::async_trait;

use super::{is_youtube_url, CommandHandler, MediaJobs, INVALID_YOUTUBE_URL};
use crate::reply::ReplyChannel;
use crate::task::{MediaKind, TaskDescriptor, TaskError};

pub const IN_PROGRESS: &str = "Your video is being downloaded and will be sent shortly.";
pub const DONE: &str = "Your video has been downloaded.";
pub const UNAVAILABLE: &str = "This video is no longer available.";
pub const FAILED: &str = "Failed to download video from YouTube.";

pub struct VideoCommand {
    media: MediaJobs,
}

impl VideoCommand {
    pub fn new(media: MediaJobs) -> Self {
        Self { media }
    }
}

#[async_trait]
impl CommandHandler for VideoCommand {
    fn name(&self) -> &'static str {
        "video"
    }

    async fn execute(&self, argument: Option<String>, reply: ReplyChannel) {
        let Some(url) = argument.filter(|u| is_youtube_url(u)) else {
            reply.text(INVALID_YOUTUBE_URL).await;
            return;
        };

        reply.text(IN_PROGRESS).await;

        let descriptor = TaskDescriptor::media(
            &self.media.tool,
            MediaKind::Video,
            &url,
            &self.media.download_dir,
        );
        match self.media.runner.spawn(descriptor).wait().await {
            Ok(output) => {
                reply.text(DONE).await;
                reply.media(output.artifact, true).await;
            }
            Err(TaskError::Unavailable(detail)) => {
                tracing::info!(url = %url, "Video unavailable: {}", detail);
                reply.text(UNAVAILABLE).await;
            }
            Err(e) => {
                tracing::warn!(url = %url, "Video download failed: {}", e);
                reply.text(FAILED).await;
            }
        }
    }
}
