mod capture_rate;
mod descriptor;
mod image_format;
mod source;

pub use capture_rate::CaptureRate;
pub use descriptor::{DownloadResult, DownloadStatus, FrameSet, RunMetadata, VideoDescriptor};
pub use image_format::ImageFormat;
pub use source::SourceSpec;
