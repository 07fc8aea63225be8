use std::{
    ffi::OsStr,
    path::Path,
    process::{Command, Output},
};

use serde::Deserialize;
use tracing::debug;

use super::command::{assert_success_command, run_command, Capture, YT_DL, YT_DLP};
use crate::{
    io::list_files,
    result::{Error, Result},
    types::SourceSpec,
};

/// One video as listed by the provider
#[derive(Debug, Clone, PartialEq)]
pub struct VideoEntry {
    pub id: String,
    pub title: String,
    /// Known when the listing already had to fetch the video details
    pub formats: Option<Vec<StreamFormat>>,
}

/// One downloadable rendition of a video
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamFormat {
    pub url: Option<String>,
    pub ext: Option<String>,
    pub format_note: Option<String>,
    pub height: Option<u32>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub protocol: Option<String>,
}

impl StreamFormat {
    /// The quality label of the rendition, e.g. "360p"
    pub fn quality_label(&self) -> Option<String> {
        self.format_note
            .clone()
            .filter(|note| note.ends_with('p'))
            .or_else(|| self.height.map(|h| format!("{h}p")))
    }

    /// Whether the rendition is a single http(s) file with both audio and video
    pub fn is_progressive(&self) -> bool {
        let has = |codec: &Option<String>| codec.as_deref().is_some_and(|c| c != "none");
        let is_http = self
            .protocol
            .as_deref()
            .map_or(true, |p| p == "https" || p == "http");

        has(&self.vcodec) && has(&self.acodec) && is_http && self.url.is_some()
    }
}

/// Interface for listing videos and their renditions
pub trait VideoProvider: Sync {
    /// List the videos of the source, in the provider order
    fn list(&self, source: &SourceSpec) -> Result<Vec<VideoEntry>>;

    /// Get every rendition of the video
    fn formats(&self, video_id: &str) -> Result<Vec<StreamFormat>>;
}

/// Interface for getting the spoken text of a video
pub trait TranscriptSource: Sync {
    /// Return the concatenated transcript text, or None if the video has none
    fn transcript(&self, video_id: &str) -> Result<Option<String>>;
}

/// Interface for the [yt-dlp](https://github.com/yt-dlp/yt-dlp) program
#[derive(Debug)]
pub struct Ytdl {
    program: &'static str,
    socket_timeout_secs: u64,
    search_limit: usize,
}

impl Ytdl {
    /// Verify that the `yt-dlp` or `youtube-dl` binaries are reachable
    pub fn new(socket_timeout_secs: u64, search_limit: usize) -> Result<Self> {
        let program = if assert_success_command(YT_DLP, |cmd| cmd.arg("--version")).is_ok() {
            YT_DLP
        } else if assert_success_command(YT_DL, |cmd| cmd.arg("--version")).is_ok() {
            YT_DL
        } else {
            return Err(Error::command(YT_DLP, "neither yt-dlp nor youtube-dl found"));
        };

        Ok(Self {
            program,
            socket_timeout_secs,
            search_limit,
        })
    }

    /// Run the command and check if it failed with saying the stream is unavailable.
    /// In that case, return [`Error::Unavailable`].
    ///
    /// Other failures return [`Error::Command`], successes the output handle.
    fn run_checked<F>(&self, f: F, capture: Capture) -> Result<Output>
    where
        F: FnOnce(&mut Command) -> &mut Command,
    {
        let timeout = self.socket_timeout_secs.to_string();
        let res = run_command(
            self.program,
            |cmd| f(cmd.args(["--socket-timeout", timeout.as_str()])),
            capture | Capture::STDERR,
        )?;

        let stderr = String::from_utf8_lossy(&res.stderr);
        if let Some(line) = stderr
            .lines()
            .find(|line| line.starts_with("ERROR:") && line.to_lowercase().contains("unavailable"))
        {
            return Err(Error::Unavailable(line.to_owned()));
        }

        if res.status.success() {
            Ok(res)
        } else {
            Err(Error::command(self.program, stderr.trim().to_owned()))
        }
    }

    fn dump_json(&self, target: &str, flat: bool) -> Result<String> {
        let res = self.run_checked(
            |cmd| {
                let cmd = cmd.arg("-q").arg("-J");
                let cmd = if flat {
                    cmd.arg("--flat-playlist")
                } else {
                    cmd.arg("--no-playlist")
                };
                cmd.arg("--").arg(target)
            },
            Capture::STDOUT,
        )?;

        Ok(String::from_utf8_lossy(&res.stdout).into_owned())
    }
}

impl VideoProvider for Ytdl {
    fn list(&self, source: &SourceSpec) -> Result<Vec<VideoEntry>> {
        let json = match source {
            SourceSpec::Search(term) => {
                self.dump_json(&format!("ytsearch{}:{term}", self.search_limit), true)?
            }
            SourceSpec::Playlist(url) => self.dump_json(url, true)?,
            SourceSpec::SingleVideo(url) => self.dump_json(url, false)?,
        };

        parse_listing(&json)
    }

    fn formats(&self, video_id: &str) -> Result<Vec<StreamFormat>> {
        let json = self.dump_json(video_id, false)?;
        let info: InfoJson = serde_json::from_str(&json)?;
        Ok(info.formats.unwrap_or_default())
    }
}

impl TranscriptSource for Ytdl {
    fn transcript(&self, video_id: &str) -> Result<Option<String>> {
        let dir = tempfile::tempdir()?;
        let template = dir.path().join("%(id)s.%(ext)s");

        self.run_checked(
            |cmd| {
                cmd.arg("-q")
                    .arg("--skip-download")
                    .arg("--write-subs")
                    .arg("--write-auto-subs")
                    .args(["--sub-langs", "en.*,en"])
                    .args(["--sub-format", "json3"])
                    .args([OsStr::new("-o"), template.as_os_str()])
                    .arg("--")
                    .arg(video_id)
            },
            Capture::empty(),
        )?;

        match pick_caption_file(dir.path())? {
            Some(file) => {
                debug!("Using caption file {}", file.display());
                let content = std::fs::read_to_string(file)?;
                parse_json3(&content)
            }
            None => Ok(None),
        }
    }
}

/// The subset of the yt-dlp info JSON that is used
#[derive(Debug, Deserialize)]
struct InfoJson {
    id: Option<String>,
    title: Option<String>,
    entries: Option<Vec<InfoJson>>,
    formats: Option<Vec<StreamFormat>>,
}

/// Parse the info JSON of a playlist, a search or a single video
fn parse_listing(json: &str) -> Result<Vec<VideoEntry>> {
    let info: InfoJson = serde_json::from_str(json)?;

    let to_entry = |info: InfoJson| {
        info.id.map(|id| VideoEntry {
            title: info.title.unwrap_or_else(|| id.clone()),
            id,
            formats: info.formats,
        })
    };

    match info.entries {
        Some(entries) => Ok(entries.into_iter().filter_map(to_entry).collect()),
        None => Ok(to_entry(info).into_iter().collect()),
    }
}

/// Choose the caption file to read, preferring plain English over its variants
fn pick_caption_file(dir: &Path) -> Result<Option<std::path::PathBuf>> {
    let captions: Vec<_> = list_files(dir)?
        .into_iter()
        .filter(|p| p.extension().is_some_and(|ext| ext == "json3"))
        .collect();

    let plain = captions.iter().find(|p| {
        p.file_stem()
            .and_then(|stem| Path::new(stem).extension())
            .is_some_and(|lang| lang == "en")
    });

    Ok(plain.or(captions.first()).cloned())
}

#[derive(Debug, Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(default)]
    segs: Vec<Json3Segment>,
}

#[derive(Debug, Deserialize)]
struct Json3Segment {
    #[serde(default)]
    utf8: String,
}

/// Join every caption event of a json3 caption file with single spaces
fn parse_json3(content: &str) -> Result<Option<String>> {
    let captions: Json3 = serde_json::from_str(content)?;

    let lines: Vec<String> = captions
        .events
        .iter()
        .map(|event| event.segs.iter().map(|seg| seg.utf8.as_str()).collect::<String>())
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect();

    Ok((!lines.is_empty()).then(|| lines.join(" ")))
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn listing_of_playlist_keeps_order() {
        let json = indoc! {r#"
            {
                "id": "PL123",
                "title": "My playlist",
                "entries": [
                    {"id": "b", "title": "Second"},
                    {"id": "a", "title": null},
                    {"title": "no id"}
                ]
            }
        "#};

        let entries = parse_listing(json).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "b");
        assert_eq!(entries[0].title, "Second");
        assert_eq!(entries[1].title, "a");
        assert!(entries[0].formats.is_none());
    }

    #[test]
    fn listing_of_single_video_carries_formats() {
        let json = indoc! {r#"
            {
                "id": "v1",
                "title": "Solo",
                "formats": [
                    {"url": "https://cdn/18", "format_note": "360p", "vcodec": "avc1", "acodec": "mp4a", "protocol": "https"}
                ]
            }
        "#};

        let entries = parse_listing(json).unwrap();
        assert_eq!(entries.len(), 1);
        let formats = entries[0].formats.as_ref().unwrap();
        assert_eq!(formats[0].quality_label().as_deref(), Some("360p"));
        assert!(formats[0].is_progressive());
    }

    #[test]
    fn quality_label_falls_back_to_height() {
        let format = StreamFormat {
            format_note: Some("medium".into()),
            height: Some(720),
            ..Default::default()
        };
        assert_eq!(format.quality_label().as_deref(), Some("720p"));
    }

    #[test]
    fn video_only_or_hls_renditions_are_not_progressive() {
        let video_only = StreamFormat {
            url: Some("https://x".into()),
            vcodec: Some("vp9".into()),
            acodec: Some("none".into()),
            ..Default::default()
        };
        let hls = StreamFormat {
            url: Some("https://x".into()),
            vcodec: Some("avc1".into()),
            acodec: Some("mp4a".into()),
            protocol: Some("m3u8_native".into()),
            ..Default::default()
        };
        assert!(!video_only.is_progressive());
        assert!(!hls.is_progressive());
    }

    #[test]
    fn json3_events_are_joined_with_spaces() {
        let json = indoc! {r#"
            {"events": [
                {"tStartMs": 0},
                {"segs": [{"utf8": "hello"}, {"utf8": " there"}]},
                {"segs": [{"utf8": "\n"}]},
                {"segs": [{"utf8": "general  kenobi"}]}
            ]}
        "#};

        assert_eq!(
            parse_json3(json).unwrap().as_deref(),
            Some("hello there general kenobi")
        );
    }

    #[test]
    fn empty_json3_is_no_transcript() {
        assert_eq!(parse_json3(r#"{"events": []}"#).unwrap(), None);
    }

    #[test]
    fn plain_english_captions_are_preferred() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("id.en-GB.json3"), "{}").unwrap();
        std::fs::write(dir.path().join("id.en.json3"), "{}").unwrap();
        std::fs::write(dir.path().join("id.en.vtt"), "").unwrap();

        let file = pick_caption_file(dir.path()).unwrap().unwrap();
        assert_eq!(file.file_name().unwrap(), "id.en.json3");
    }
}
