//! In-memory stand-ins for the external programs and servers.

use std::{
    collections::{HashMap, HashSet},
    io::{Cursor, ErrorKind, Read},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use crate::{
    outside::{FrameSampler, MediaSource, StreamFormat, TranscriptSource, VideoEntry, VideoProvider},
    pool::CancelToken,
    result::{Error, Result},
    types::{CaptureRate, ImageFormat, SourceSpec},
    utils::MutexUtils,
};

pub fn progressive(url: &str, label: &str) -> StreamFormat {
    StreamFormat {
        url: Some(url.to_owned()),
        ext: Some("mp4".to_owned()),
        format_note: Some(label.to_owned()),
        height: None,
        vcodec: Some("avc1".to_owned()),
        acodec: Some("mp4a".to_owned()),
        protocol: Some("https".to_owned()),
    }
}

#[derive(Debug, Default)]
pub struct FakeProvider {
    pub ids: Vec<String>,
    pub fail_listing: bool,
    pub failing_formats: HashSet<String>,
    formats_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn with_ids(ids: &[&str]) -> Self {
        Self {
            ids: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing_listing() -> Self {
        Self {
            fail_listing: true,
            ..Self::default()
        }
    }

    /// Number of renditions lookups made
    pub fn formats_calls(&self) -> usize {
        self.formats_calls.load(Ordering::SeqCst)
    }

    /// The 360p rendition served for a video
    pub fn url_of(id: &str) -> String {
        format!("https://media.test/{id}.mp4")
    }
}

impl VideoProvider for FakeProvider {
    fn list(&self, _source: &SourceSpec) -> Result<Vec<VideoEntry>> {
        if self.fail_listing {
            return Err(Error::TransientNetwork("listing refused".to_owned()));
        }

        Ok(self
            .ids
            .iter()
            .map(|id| VideoEntry {
                id: id.clone(),
                title: format!("Title {id}"),
                formats: None,
            })
            .collect())
    }

    fn formats(&self, video_id: &str) -> Result<Vec<StreamFormat>> {
        self.formats_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_formats.contains(video_id) {
            return Err(Error::Unavailable(video_id.to_owned()));
        }

        let url = Self::url_of(video_id);
        Ok(vec![
            progressive(&format!("{url}?low"), "144p"),
            progressive(&url, "360p"),
            progressive(&format!("{url}?hd"), "720p"),
        ])
    }
}

#[derive(Debug, Default)]
pub struct FakeTranscripts {
    failing: HashSet<String>,
}

impl FakeTranscripts {
    pub fn failing_for(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|id| id.to_string()).collect(),
        }
    }
}

impl TranscriptSource for FakeTranscripts {
    fn transcript(&self, video_id: &str) -> Result<Option<String>> {
        if self.failing.contains(video_id) {
            Err(Error::TransientNetwork("too many requests".to_owned()))
        } else {
            Ok(Some(format!("transcript of {video_id}")))
        }
    }
}

#[derive(Debug, Clone)]
pub enum MediaBehavior {
    Bytes(Vec<u8>),
    NotFound,
    TransportError,
    /// Serve this many bytes then fail
    BreaksAfter(usize),
    /// Cancel the token once the first count of bytes is served, out of the second count
    CancelsAfter(usize, CancelToken, usize),
}

#[derive(Debug, Default)]
pub struct FakeMedia {
    routes: Mutex<HashMap<String, MediaBehavior>>,
    opened: AtomicUsize,
    max_latency_ms: u64,
}

impl FakeMedia {
    pub fn serve(&self, url: &str, behavior: MediaBehavior) {
        self.routes
            .with_lock(|mut routes| routes.insert(url.to_owned(), behavior));
    }

    /// Wait up to this long before answering each request
    pub fn random_latency(&mut self, max_ms: u64) {
        self.max_latency_ms = max_ms;
    }

    /// Number of requests made
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl MediaSource for FakeMedia {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>> {
        if self.max_latency_ms > 0 {
            std::thread::sleep(Duration::from_millis(fastrand::u64(0..=self.max_latency_ms)));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);

        let behavior = self.routes.with_lock(|routes| routes.get(url).cloned());
        match behavior {
            Some(MediaBehavior::Bytes(bytes)) => Ok(Box::new(Cursor::new(bytes))),
            Some(MediaBehavior::TransportError) => {
                Err(Error::TransientNetwork(format!("{url}: connection refused")))
            }
            Some(MediaBehavior::BreaksAfter(remaining)) => Ok(Box::new(BrokenReader { remaining })),
            Some(MediaBehavior::CancelsAfter(after, token, total)) => Ok(Box::new(CancellingReader {
                sent: 0,
                after,
                total,
                token,
            })),
            Some(MediaBehavior::NotFound) | None => {
                Err(Error::ResourceNotFound(format!("{url} answered 404")))
            }
        }
    }
}

struct BrokenReader {
    remaining: usize,
}

impl Read for BrokenReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.remaining == 0 {
            return Err(std::io::Error::new(ErrorKind::ConnectionReset, "connection reset"));
        }
        let len = buf.len().min(self.remaining);
        buf[..len].fill(0);
        self.remaining -= len;
        Ok(len)
    }
}

struct CancellingReader {
    sent: usize,
    after: usize,
    total: usize,
    token: CancelToken,
}

impl Read for CancellingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let len = buf.len().min(self.total - self.sent);
        buf[..len].fill(1);
        self.sent += len;
        if self.sent >= self.after {
            self.token.cancel();
        }
        Ok(len)
    }
}

/// Writes placeholder frames, fails on any video whose name contains "corrupt"
#[derive(Debug)]
pub struct FakeSampler {
    frames: usize,
}

impl FakeSampler {
    pub fn new(frames: usize) -> Self {
        Self { frames }
    }
}

impl FrameSampler for FakeSampler {
    fn sample(
        &self,
        video: &Path,
        out_dir: &Path,
        _rate: CaptureRate,
        format: ImageFormat,
    ) -> Result<Vec<PathBuf>> {
        if video.to_string_lossy().contains("corrupt") {
            return Err(Error::Extraction {
                path: video.to_path_buf(),
                reason: "invalid data found when processing input".to_owned(),
            });
        }

        (1..=self.frames)
            .map(|idx| {
                let frame = out_dir.join(format!("frame_{idx:05}.{}", format.with_no_dot()));
                std::fs::write(&frame, idx.to_le_bytes())?;
                Ok(frame)
            })
            .collect()
    }
}
