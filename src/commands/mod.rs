//! Chat command handlers.
//!
//! Each handler owns its collaborators and turns every failure into a reply:
//! a matched command always answers.

use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use crate::lookup::MetadataResolver;
use crate::probe::ReachabilityProbe;
use crate::reply::ReplyChannel;
use crate::router::CommandRouter;
use crate::task::TaskRunner;

pub mod alive;
pub mod insta;
pub mod ping;
pub mod song;
pub mod video;

pub use alive::AliveCommand;
pub use insta::InstaCommand;
pub use ping::PingCommand;
pub use song::SongCommand;
pub use video::VideoCommand;

pub const INVALID_YOUTUBE_URL: &str = "Invalid YouTube URL.";

#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Command name without the leading `.`.
    fn name(&self) -> &'static str;

    /// Run the command, replying through `reply`. Never fails.
    async fn execute(&self, argument: Option<String>, reply: ReplyChannel);
}

/// Media download settings shared by `.song` and `.video`.
#[derive(Clone)]
pub struct MediaJobs {
    pub runner: TaskRunner,
    pub tool: String,
    pub download_dir: PathBuf,
}

/// Everything the built-in commands need.
pub struct HandlerDeps {
    pub alive_message: String,
    pub probe: Arc<dyn ReachabilityProbe>,
    pub resolver: Arc<dyn MetadataResolver>,
    pub media: MediaJobs,
}

/// Router with `.alive`, `.ping`, `.insta`, `.song` and `.video`.
pub fn default_router(deps: HandlerDeps) -> CommandRouter {
    let mut router = CommandRouter::new();
    router
        .register(Arc::new(AliveCommand::new(deps.alive_message)))
        .register(Arc::new(PingCommand::new(deps.probe)))
        .register(Arc::new(InstaCommand::new(deps.resolver)))
        .register(Arc::new(SongCommand::new(deps.media.clone())))
        .register(Arc::new(VideoCommand::new(deps.media)));
    router
}

/// Whether `url` points at a single YouTube video: `youtu.be/<id>` or a
/// `youtube.com` watch/shorts/embed/live link with an 11-character id.
pub fn is_youtube_url(url: &str) -> bool {
    static VIDEO_ID: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(id_pattern) = VIDEO_ID
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").ok())
        .as_ref()
    else {
        return false;
    };

    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let id: Option<String> = match host {
        "youtu.be" => segments.first().map(|s| s.to_string()),
        "youtube.com" | "www.youtube.com" | "m.youtube.com" | "music.youtube.com" => {
            match segments.as_slice() {
                ["watch"] => parsed
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                ["shorts" | "embed" | "live" | "v", id] => Some(id.to_string()),
                _ => None,
            }
        }
        _ => None,
    };

    id.is_some_and(|id| id_pattern.is_match(&id))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_urls() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?v=dQw4w9WgXcQ&t=42",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "http://music.youtube.com/watch?v=dQw4w9WgXcQ",
        ] {
            assert!(is_youtube_url(url), "{url}");
        }
    }

    #[test]
    fn test_non_youtube_urls() {
        for url in [
            "",
            "not a url",
            "https://vimeo.com/123456",
            "https://www.youtube.com/",
            "https://www.youtube.com/watch?v=short",
            "https://www.youtube.com/channel/UCabc",
            "https://youtu.be/",
            "ftp://youtu.be/dQw4w9WgXcQ",
            "https://youtube.com.evil.example/watch?v=dQw4w9WgXcQ",
        ] {
            assert!(!is_youtube_url(url), "{url}");
        }
    }
}
