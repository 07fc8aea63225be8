use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::{
    io::list_files,
    outside::FrameSampler,
    pool::run_ordered,
    result::{Error, Result},
    types::{CaptureRate, FrameSet, ImageFormat},
};

/// Samples still frames out of every video file of a directory
pub struct FrameExtractor<'a> {
    sampler: &'a dyn FrameSampler,
    out_root: &'a Path,
    rate: CaptureRate,
    format: ImageFormat,
    workers: usize,
}

#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// One per successfully processed video, sorted by video file name
    pub frame_sets: Vec<FrameSet>,
    pub failures: Vec<Error>,
}

impl<'a> FrameExtractor<'a> {
    pub fn new(
        sampler: &'a dyn FrameSampler,
        out_root: &'a Path,
        rate: CaptureRate,
        format: ImageFormat,
        workers: usize,
    ) -> Self {
        Self {
            sampler,
            out_root,
            rate,
            format,
            workers,
        }
    }

    /// The folder receiving the frames of a video: named after the video file
    pub fn frames_dir_of(&self, video: &Path) -> PathBuf {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_owned());
        self.out_root.join(stem)
    }

    /// Extract the frames of every file of the directory, in parallel.
    ///
    /// A file that cannot be processed is reported and does not stop the others.
    pub fn extract_dir(&self, videos_dir: &Path) -> ExtractionReport {
        let videos = match list_files(videos_dir) {
            Ok(videos) => videos,
            Err(err) => {
                error!("Could not list the videos of '{}': {err}", videos_dir.display());
                return ExtractionReport {
                    frame_sets: vec![],
                    failures: vec![Error::Extraction {
                        path: videos_dir.to_path_buf(),
                        reason: err.to_string(),
                    }],
                };
            }
        };

        info!(
            "Extracting frames of {} videos at {} as {}",
            videos.len(),
            self.rate,
            self.format.with_no_dot()
        );

        let results = run_ordered("frames", self.workers, videos, |_, video| {
            self.extract_file(&video)
        });

        let mut report = ExtractionReport::default();
        for res in results {
            match res {
                Ok(set) => report.frame_sets.push(set),
                Err(err) => {
                    error!("{err}");
                    report.failures.push(err);
                }
            }
        }
        report
    }

    fn extract_file(&self, video: &Path) -> Result<FrameSet> {
        let dir = self.frames_dir_of(video);
        std::fs::create_dir_all(&dir).map_err(|err| Error::Extraction {
            path: video.to_path_buf(),
            reason: format!("could not create '{}': {err}", dir.display()),
        })?;
        clear_frames(&dir).map_err(|err| Error::Extraction {
            path: video.to_path_buf(),
            reason: format!("could not clear '{}': {err}", dir.display()),
        })?;

        let frames = self.sampler.sample(video, &dir, self.rate, self.format)?;
        info!("{} frames extracted from '{}'", frames.len(), video.display());

        Ok(FrameSet {
            video: video.to_path_buf(),
            dir,
            frames,
        })
    }
}

/// Remove the images left in a frames folder by a previous extraction
fn clear_frames(dir: &Path) -> Result<()> {
    let stale: Vec<PathBuf> = list_files(dir)?
        .into_iter()
        .filter(|p| ImageFormat::from_path(p).is_some())
        .collect();

    if !stale.is_empty() {
        debug!("Removing {} previous frames from '{}'", stale.len(), dir.display());
    }
    for frame in stale {
        std::fs::remove_file(frame)?;
    }
    Ok(())
}
