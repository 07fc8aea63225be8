mod command;
mod ffmpeg;
mod http;
mod ytdl;

pub use ffmpeg::{Ffmpeg, FrameSampler};
pub use http::{HttpClient, MediaSource};
pub use ytdl::{StreamFormat, TranscriptSource, VideoEntry, VideoProvider, Ytdl};
