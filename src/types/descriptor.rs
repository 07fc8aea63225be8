use std::{fmt::Display, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::io::sanitize_title;

/// Extension of every staged video file
pub const VIDEO_EXTENSION: &str = "mp4";

/// One video and where it can be downloaded from.
///
/// Created by the resolver with an empty transcript. The transcript is the only
/// field filled in afterwards, before the descriptor is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    #[serde(rename = "video_id")]
    pub id: String,
    pub title: String,
    /// Direct media locations, most preferred first
    #[serde(rename = "url")]
    pub candidate_urls: Vec<String>,
    pub local_filename: String,
    pub transcript: Option<String>,
}

impl VideoDescriptor {
    pub fn new(id: String, title: String, candidate_urls: Vec<String>) -> Self {
        let local_filename = Self::local_filename_for(&title, &id);
        Self {
            id,
            title,
            candidate_urls,
            local_filename,
            transcript: None,
        }
    }

    /// The staged file name of a video: `<title>_<id>.mp4`.
    ///
    /// Only depends on its inputs, so the same video always maps to the same file.
    pub fn local_filename_for(title: &str, id: &str) -> String {
        let title = sanitize_title(title);
        let id = sanitize_title(id);
        if title.is_empty() {
            format!("{id}.{VIDEO_EXTENSION}")
        } else {
            format!("{title}_{id}.{VIDEO_EXTENSION}")
        }
    }

    pub fn with_transcript(mut self, transcript: Option<String>) -> Self {
        self.transcript = transcript;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Completed,
    SkippedAlreadyExists,
    Failed(String),
}

impl Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadStatus::Completed => write!(f, "completed"),
            DownloadStatus::SkippedAlreadyExists => write!(f, "skipped (already exists)"),
            DownloadStatus::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Outcome of one download. Never mutated once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub descriptor: VideoDescriptor,
    pub local_path: PathBuf,
    pub status: DownloadStatus,
}

impl DownloadResult {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, DownloadStatus::Failed(_))
    }
}

/// Descriptors of a run, in the order the resolver discovered them
pub type RunMetadata = Vec<VideoDescriptor>;

/// The still frames sampled from one video file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSet {
    pub video: PathBuf,
    pub dir: PathBuf,
    pub frames: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_filename_is_deterministic() {
        let a = VideoDescriptor::new("abc".into(), "My video".into(), vec![]);
        let b = VideoDescriptor::new("abc".into(), "My video".into(), vec!["u".into()]);
        assert_eq!(a.local_filename, "My video_abc.mp4");
        assert_eq!(a.local_filename, b.local_filename);
    }

    #[test]
    fn local_filename_strips_path_separators() {
        let d = VideoDescriptor::new("x1".into(), "AC/DC: \"Live\" | 1991".into(), vec![]);
        assert!(!d.local_filename.contains('/'));
        assert!(!d.local_filename.contains('|'));
        assert_eq!(d.local_filename, "AC DC Live 1991_x1.mp4");
    }

    #[test]
    fn local_filename_without_title_uses_id() {
        assert_eq!(VideoDescriptor::local_filename_for("///", "id9"), "id9.mp4");
    }

    #[test]
    fn descriptor_serializes_with_upstream_field_names() {
        let d = VideoDescriptor::new("a".into(), "t".into(), vec!["http://x".into()]);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["video_id"], "a");
        assert_eq!(json["url"][0], "http://x");
        assert!(json["transcript"].is_null());
    }
}
