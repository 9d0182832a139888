use url::Url;

use super::domain::Platform;
use super::error::SubmissionError;

/// Post identifier and (when the URL carries it) the creator handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReference {
    pub post_id: String,
    pub handle: String,
}

impl PostReference {
    fn new(post_id: &str, handle: &str) -> Self {
        Self {
            post_id: post_id.to_string(),
            handle: handle.to_string(),
        }
    }
}

/// Extract the post reference from a platform URL.
pub fn parse_post_url(platform: Platform, raw_url: &str) -> Result<PostReference, SubmissionError> {
    let parsed = Url::parse(raw_url.trim()).map_err(|_| SubmissionError::InvalidSubmissionUrl)?;
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|parts| parts.map(str::trim).filter(|part| !part.is_empty()).collect())
        .unwrap_or_default();

    let reference = match platform {
        Platform::TikTok => tiktok(&host, &segments),
        Platform::Instagram => instagram(&host, &segments),
        Platform::YouTube => {
            let video = parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.trim().to_string())
                .filter(|value| !value.is_empty());
            youtube(&host, video.as_deref(), &segments)
        }
        Platform::X => x(&host, &segments),
    };

    reference.ok_or(SubmissionError::InvalidSubmissionUrl)
}

fn tiktok(host: &str, segments: &[&str]) -> Option<PostReference> {
    if !host.contains("tiktok.com") {
        return None;
    }
    match segments {
        [handle, "video", id, ..] if handle.starts_with('@') => Some(PostReference::new(id, handle)),
        [id, ..] if host.contains("vm.tiktok.com") => Some(PostReference::new(id, "")),
        _ => None,
    }
}

fn instagram(host: &str, segments: &[&str]) -> Option<PostReference> {
    if !host.contains("instagram.com") {
        return None;
    }
    match segments {
        ["p" | "reel", id, ..] => Some(PostReference::new(id, "")),
        _ => None,
    }
}

fn youtube(host: &str, video: Option<&str>, segments: &[&str]) -> Option<PostReference> {
    if host.contains("youtu.be") {
        return segments.first().map(|id| PostReference::new(id, ""));
    }
    if !host.contains("youtube.com") {
        return None;
    }
    if let Some(id) = video {
        return Some(PostReference::new(id, ""));
    }
    match segments {
        ["shorts", id, ..] => Some(PostReference::new(id, "")),
        _ => None,
    }
}

fn x(host: &str, segments: &[&str]) -> Option<PostReference> {
    if !host.contains("x.com") && !host.contains("twitter.com") {
        return None;
    }
    match segments {
        [handle, "status", id, ..] => Some(PostReference::new(id, handle)),
        _ => None,
    }
}
