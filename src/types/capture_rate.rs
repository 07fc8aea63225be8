use std::{fmt::Display, str::FromStr};

use serde::Deserialize;

/// How often a still frame is sampled from a video.
///
/// Written `<n>fps` for a number of frames per second (e.g. `0.5fps`)
/// or `every<n>` to keep one frame out of every `n` decoded frames.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub enum CaptureRate {
    PerSecond(f64),
    EveryNthFrame(u32),
}

impl FromStr for CaptureRate {
    type Err = Box<dyn std::error::Error + Sync + Send>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if let Some(num_prefix) = s.strip_suffix("fps") {
            let fps: f64 = num_prefix.trim().parse()?;
            if !fps.is_finite() || fps <= 0.0 {
                return Err(Box::from("Frames per second must be positive"));
            }
            Ok(Self::PerSecond(fps))
        } else if let Some(num_suffix) = s.strip_prefix("every") {
            let n: u32 = num_suffix.trim().parse()?;
            if n == 0 {
                return Err(Box::from("Frame interval must be at least 1"));
            }
            Ok(Self::EveryNthFrame(n))
        } else {
            Err(Box::from(
                "Capture rate must look like '<n>fps' or 'every<n>'",
            ))
        }
    }
}

impl TryFrom<String> for CaptureRate {
    type Error = Box<dyn std::error::Error + Sync + Send>;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Display for CaptureRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureRate::PerSecond(fps) => write!(f, "{fps}fps"),
            CaptureRate::EveryNthFrame(n) => write!(f, "every{n}"),
        }
    }
}
