//! `.song <url>`: download a YouTube video's audio as MP3.

use async_trait::async_trait;

use super::{is_youtube_url, CommandHandler, MediaJobs, INVALID_YOUTUBE_URL};
use crate::reply::ReplyChannel;
use crate::task::{MediaKind, TaskDescriptor};

pub const IN_PROGRESS: &str = "Your MP3 is being downloaded and will be sent shortly.";
pub const DONE: &str = "Your MP3 is ready.";

pub struct SongCommand {
    media: MediaJobs,
}

impl SongCommand {
    pub fn new(media: MediaJobs) -> Self {
        Self { media }
    }
}

#[async_trait]
impl CommandHandler for SongCommand {
    fn name(&self) -> &'static str {
        "song"
    }

    async fn execute(&self, argument: Option<String>, reply: ReplyChannel) {
        let Some(url) = argument.filter(|u| is_youtube_url(u)) else {
            reply.text(INVALID_YOUTUBE_URL).await;
            return;
        };

        // Ack first so it always precedes the result.
        reply.text(IN_PROGRESS).await;

        let descriptor = TaskDescriptor::media(
            &self.media.tool,
            MediaKind::Audio,
            &url,
            &self.media.download_dir,
        );
        match self.media.runner.spawn(descriptor).wait().await {
            Ok(output) => {
                reply.text(DONE).await;
                reply.media(output.artifact, true).await;
            }
            Err(e) => {
                reply
                    .text(format!("Failed to download audio from YouTube: {}", e))
                    .await;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::reply::testing::RecordingOutbound;
    use crate::reply::OutboundContent;
    use crate::task::TaskRunner;
    use std::time::Duration;
    use tempfile::TempDir;

    const URL: &str = "https://youtu.be/dQw4w9WgXcQ";

    /// A fake download tool: a shell script that receives yt-dlp's arguments.
    fn fake_tool(dir: &TempDir, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("fake-yt-dlp");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn media(dir: &TempDir, tool: String) -> MediaJobs {
        MediaJobs {
            runner: TaskRunner::new(0, Duration::from_secs(10)),
            tool,
            download_dir: dir.path().join("downloads"),
        }
    }

    /// Writes `<template minus %(ext)s>.mp3`; the template follows `-o`.
    const WRITE_MP3: &str = r#"while [ "$1" != "-o" ]; do shift; done
out=$(printf '%s' "$2" | sed 's/%(ext)s$/mp3/')
printf data > "$out""#;

    #[tokio::test]
    async fn test_ack_then_artifact() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(&dir, WRITE_MP3);
        let outbound = RecordingOutbound::new();

        SongCommand::new(media(&dir, tool))
            .execute(Some(URL.to_string()), ReplyChannel::new("o", outbound.clone()))
            .await;

        let sent = outbound.sent().await;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].1, OutboundContent::Text(IN_PROGRESS.to_string()));
        assert_eq!(sent[1].1, OutboundContent::Text(DONE.to_string()));
        match &sent[2].1 {
            OutboundContent::Media {
                path,
                send_as_document,
            } => {
                assert!(path.exists());
                assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mp3"));
                assert!(*send_as_document);
            }
            other => panic!("expected media, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_carries_classified_error() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(&dir, "echo 'ERROR: Sign in to confirm your age' >&2; exit 1");
        let outbound = RecordingOutbound::new();

        SongCommand::new(media(&dir, tool))
            .execute(Some(URL.to_string()), ReplyChannel::new("o", outbound.clone()))
            .await;

        let texts = outbound.texts().await;
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], IN_PROGRESS);
        assert_eq!(
            texts[1],
            "Failed to download audio from YouTube: ERROR: Sign in to confirm your age"
        );
    }

    #[tokio::test]
    async fn test_sub_second_timeout_is_reported_precisely() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(&dir, "sleep 5");
        let outbound = RecordingOutbound::new();
        let media = MediaJobs {
            runner: TaskRunner::new(0, Duration::from_millis(250)),
            ..media(&dir, tool)
        };

        SongCommand::new(media)
            .execute(Some(URL.to_string()), ReplyChannel::new("o", outbound.clone()))
            .await;

        assert_eq!(
            outbound.texts().await,
            vec![
                IN_PROGRESS,
                "Failed to download audio from YouTube: timed out after 250ms"
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_url_spawns_nothing() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("ran");
        let tool = fake_tool(&dir, &format!("touch {}", marker.display()));
        let outbound = RecordingOutbound::new();
        let cmd = SongCommand::new(media(&dir, tool));

        cmd.execute(None, ReplyChannel::new("o", outbound.clone())).await;
        cmd.execute(
            Some("https://vimeo.com/1".to_string()),
            ReplyChannel::new("o", outbound.clone()),
        )
        .await;

        assert_eq!(outbound.texts().await, vec![INVALID_YOUTUBE_URL, INVALID_YOUTUBE_URL]);
        assert!(!marker.exists());
    }
}
