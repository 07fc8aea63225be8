use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use crate::{
    io::list_files,
    result::{Error, Result},
    types::{CaptureRate, ImageFormat},
};

use super::command::{assert_success_command, FFMPEG, FFXXX_DEFAULT_ARGS};

/// Name pattern of the sampled frames, the index is filled in by the sampler
const FRAME_PATTERN: &str = "frame_%05d";

pub trait FrameSampler: Sync {
    /// Sample still frames of the video into the output directory, which must exist
    /// and hold no previous frames.
    ///
    /// Return the paths of the written frames, sorted by frame index.
    fn sample(
        &self,
        video: &Path,
        out_dir: &Path,
        rate: CaptureRate,
        format: ImageFormat,
    ) -> Result<Vec<PathBuf>>;
}

/// Interface for the [ffmpeg](https://ffmpeg.org) program
#[derive(Debug)]
pub struct Ffmpeg;

impl Ffmpeg {
    /// Verify that the `ffmpeg` binary is reachable
    pub fn new() -> Result<Self> {
        assert_success_command(FFMPEG, |cmd| cmd.arg("-version"))?;

        Ok(Self)
    }
}

impl FrameSampler for Ffmpeg {
    fn sample(
        &self,
        video: &Path,
        out_dir: &Path,
        rate: CaptureRate,
        format: ImageFormat,
    ) -> Result<Vec<PathBuf>> {
        let output = out_dir.join(format!("{FRAME_PATTERN}.{}", format.with_no_dot()));

        assert_success_command(FFMPEG, |cmd| {
            cmd.args(FFXXX_DEFAULT_ARGS)
                .arg("-y")
                .args([OsStr::new("-i"), video.as_os_str()])
                .args(filter_args(rate))
                .arg(output.as_os_str())
        })
        .map_err(|err| Error::Extraction {
            path: video.to_path_buf(),
            reason: err.to_string(),
        })?;

        let frames: Vec<PathBuf> = list_files(out_dir)?
            .into_iter()
            .filter(|p| ImageFormat::from_path(p) == Some(format))
            .collect();

        if frames.is_empty() {
            return Err(Error::Extraction {
                path: video.to_path_buf(),
                reason: "no frame was produced".to_owned(),
            });
        }

        Ok(frames)
    }
}

/// The ffmpeg arguments selecting which frames are kept
fn filter_args(rate: CaptureRate) -> Vec<String> {
    match rate {
        CaptureRate::PerSecond(fps) => vec!["-vf".to_owned(), format!("fps={fps}")],
        CaptureRate::EveryNthFrame(n) => vec![
            "-vf".to_owned(),
            format!("select=not(mod(n\\,{n}))"),
            "-vsync".to_owned(),
            "vfr".to_owned(),
        ],
    }
}
