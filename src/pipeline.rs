//! The run of one source, from listing its videos to cleaning up their files.
//!
//! ```text
//! Init -> Resolving -> Fetching -> AwaitingAll -> Extracting -> Persisting -> Cleanup -> Done
//!            \____________________________________________________/
//!                                     |
//!                                   Failed
//! ```
//!
//! Only a resolver or a persistence failure goes to `Failed`. Every other
//! failure belongs to one video and is kept in its result.

use std::{fmt::Display, path::Path};

use tracing::{debug, error, info, warn};

use crate::{
    config::Settings,
    database::DocumentStore,
    download::DownloadWorker,
    frames::{ExtractionReport, FrameExtractor},
    outside::{FrameSampler, MediaSource, TranscriptSource, VideoProvider},
    pool::{run_ordered, CancelToken},
    resolver::Resolver,
    result::{Error, Result},
    sink::MetadataSink,
    transcript::TranscriptFetcher,
    types::{DownloadResult, DownloadStatus, RunMetadata, SourceSpec, VideoDescriptor},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Resolving,
    Fetching,
    AwaitingAll,
    Extracting,
    Persisting,
    Cleanup,
    Done,
    Failed,
}

impl Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Init => "init",
            RunState::Resolving => "resolving",
            RunState::Fetching => "fetching",
            RunState::AwaitingAll => "awaiting all",
            RunState::Extracting => "extracting",
            RunState::Persisting => "persisting",
            RunState::Cleanup => "cleanup",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The external capabilities a run is made of
pub struct Collaborators<'a> {
    pub provider: &'a dyn VideoProvider,
    pub transcripts: &'a dyn TranscriptSource,
    pub media: &'a dyn MediaSource,
    pub sampler: &'a dyn FrameSampler,
    pub sinks: Vec<&'a dyn MetadataSink>,
    /// Receives the sampled frames, if any
    pub store: Option<&'a dyn DocumentStore>,
}

pub struct Pipeline<'a> {
    collaborators: Collaborators<'a>,
    settings: &'a Settings,
    cancel: CancelToken,
}

/// Everything a run produced
#[derive(Debug)]
pub struct RunReport {
    pub metadata: RunMetadata,
    /// One per descriptor of the metadata, in the same order
    pub downloads: Vec<DownloadResult>,
    pub extraction: ExtractionReport,
    pub cancelled: bool,
    /// Every state the run went through
    pub states: Vec<RunState>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub videos: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub frame_sets: usize,
    pub frames: usize,
    pub extraction_failures: usize,
}

impl RunReport {
    pub fn summary(&self) -> Summary {
        let count = |f: fn(&DownloadStatus) -> bool| {
            self.downloads.iter().filter(|d| f(&d.status)).count()
        };

        Summary {
            videos: self.metadata.len(),
            completed: count(|s| *s == DownloadStatus::Completed),
            skipped: count(|s| *s == DownloadStatus::SkippedAlreadyExists),
            failed: self.downloads.iter().filter(|d| d.is_failed()).count(),
            frame_sets: self.extraction.frame_sets.len(),
            frames: self.extraction.frame_sets.iter().map(|s| s.frames.len()).sum(),
            extraction_failures: self.extraction.failures.len(),
        }
    }

    /// The failed downloads with their reason
    pub fn failed_downloads(&self) -> impl Iterator<Item = (&VideoDescriptor, &str)> {
        self.downloads.iter().filter_map(|d| match &d.status {
            DownloadStatus::Failed(reason) => Some((&d.descriptor, reason.as_str())),
            _ => None,
        })
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} videos: {} downloaded, {} already present, {} failed; \
            {} frames from {} videos, {} extraction failures",
            self.videos,
            self.completed,
            self.skipped,
            self.failed,
            self.frames,
            self.frame_sets,
            self.extraction_failures
        )
    }
}

impl<'a> Pipeline<'a> {
    pub fn new(
        collaborators: Collaborators<'a>,
        settings: &'a Settings,
        cancel: CancelToken,
    ) -> Self {
        Self {
            collaborators,
            settings,
            cancel,
        }
    }

    /// Run the whole pipeline for the source.
    ///
    /// Return an error only if the source could not be resolved or the results
    /// could not be persisted. Failures of single videos are in the report.
    pub fn run(&self, source: &SourceSpec, run_name: &str) -> Result<RunReport> {
        let mut states = vec![RunState::Init];
        let res = self.run_states(source, run_name, &mut states);

        match res {
            Ok(mut report) => {
                enter(&mut states, RunState::Done);
                report.states = states;
                Ok(report)
            }
            Err(err) => {
                let failed_in = states.last().copied().unwrap_or(RunState::Init);
                error!("Run failed while {failed_in}");
                enter(&mut states, RunState::Failed);
                Err(err)
            }
        }
    }

    fn run_states(
        &self,
        source: &SourceSpec,
        run_name: &str,
        states: &mut Vec<RunState>,
    ) -> Result<RunReport> {
        let staging_dir = self.settings.staging_dir.as_path();

        enter(states, RunState::Resolving);
        let resolver = Resolver::new(self.collaborators.provider, &self.settings.quality);
        let resolution = resolver.resolve(source)?;
        if resolution.is_empty() {
            warn!("No video listed for {source}");
        }

        enter(states, RunState::Fetching);
        let descriptors = self.collect_descriptors(resolution.descriptors());
        if descriptors.len() < resolution.len() {
            info!("Only {} of {} videos to fetch", descriptors.len(), resolution.len());
        }
        let downloads = self.fetch_all(descriptors, staging_dir);

        enter(states, RunState::AwaitingAll);
        let metadata: RunMetadata = downloads.iter().map(|d| d.descriptor.clone()).collect();
        info!("All {} videos reached a terminal state", downloads.len());
        let cancelled = self.cancel.is_cancelled();

        enter(states, RunState::Extracting);
        let extraction = if cancelled {
            warn!("Run cancelled, skipping frame extraction");
            ExtractionReport::default()
        } else {
            FrameExtractor::new(
                self.collaborators.sampler,
                &self.settings.frames_dir,
                self.settings.capture_rate,
                self.settings.image_format,
                self.settings.workers(),
            )
            .extract_dir(staging_dir)
        };

        enter(states, RunState::Persisting);
        for sink in &self.collaborators.sinks {
            sink.persist(run_name, &metadata)?;
        }
        if self.settings.store_frames {
            if let Some(store) = self.collaborators.store {
                store_frames(store, &downloads, &extraction)?;
            }
        }

        enter(states, RunState::Cleanup);
        if cancelled || self.settings.keep_videos {
            debug!("Keeping the staged videos in '{}'", staging_dir.display());
        } else {
            remove_staging(staging_dir);
        }

        Ok(RunReport {
            metadata,
            downloads,
            extraction,
            cancelled,
            states: vec![],
        })
    }

    /// Collect the descriptors until the run is cancelled
    fn collect_descriptors(
        &self,
        descriptors: impl Iterator<Item = VideoDescriptor>,
    ) -> Vec<VideoDescriptor> {
        let mut collected = Vec::new();
        for descriptor in descriptors {
            if self.cancel.is_cancelled() {
                warn!("Run cancelled, not resolving the remaining videos");
                break;
            }
            collected.push(descriptor);
        }
        collected
    }

    /// Fetch the transcript and download every video on the worker pool.
    ///
    /// Return once every download reached a terminal state, in descriptor order.
    fn fetch_all(
        &self,
        descriptors: Vec<VideoDescriptor>,
        staging_dir: &Path,
    ) -> Vec<DownloadResult> {
        let transcripts = TranscriptFetcher::new(self.collaborators.transcripts);
        let worker = DownloadWorker::new(self.collaborators.media, staging_dir, self.cancel.clone());
        let total = descriptors.len();

        let mut units: Vec<(usize, VideoDescriptor)> =
            descriptors.into_iter().enumerate().collect();
        if self.settings.shuffle {
            debug!("Shuffling the videos download order");
            fastrand::shuffle(&mut units);
        }

        let workers = self.settings.workers();
        let mut results = run_ordered("unit", workers, units, |_, (order, descriptor)| {
            if self.cancel.is_cancelled() {
                let local_path = staging_dir.join(&descriptor.local_filename);
                return (
                    order,
                    DownloadResult {
                        descriptor,
                        local_path,
                        status: DownloadStatus::Failed(Error::Cancelled.to_string()),
                    },
                );
            }

            info!("Processing video {} of {total}: {}", order + 1, descriptor.title);
            let transcript = transcripts.fetch(&descriptor.id);
            (order, worker.download(descriptor.with_transcript(transcript)))
        });

        // Back to the discovery order if the dispatch was shuffled
        results.sort_by_key(|(order, _)| *order);
        results.into_iter().map(|(_, res)| res).collect()
    }
}

fn enter(states: &mut Vec<RunState>, state: RunState) {
    debug!("Run state: {state}");
    states.push(state);
}

/// Store the frames of every video of this run, replacing the ones of its previous runs
fn store_frames(
    store: &dyn DocumentStore,
    downloads: &[DownloadResult],
    extraction: &ExtractionReport,
) -> Result<()> {
    let mut stored = 0;
    for set in &extraction.frame_sets {
        let Some(download) = downloads.iter().find(|d| d.local_path == set.video) else {
            debug!("'{}' is not part of this run, frames not stored", set.video.display());
            continue;
        };

        let images = set
            .frames
            .iter()
            .map(|frame| -> Result<(String, Vec<u8>)> {
                let name = frame
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let image = std::fs::read(frame).map_err(|err| {
                    Error::Persistence(format!("could not read frame '{}': {err}", frame.display()))
                })?;
                Ok((name, image))
            })
            .collect::<Result<Vec<_>>>()?;

        let video_id = &download.descriptor.id;
        store.replace_images(video_id, &images).map_err(|err| {
            Error::Persistence(format!("could not store the frames of video {video_id}: {err}"))
        })?;
        stored += images.len();
    }

    info!("{stored} frames stored");
    Ok(())
}

/// Remove the raw videos. They would have to be downloaded again to extract new frames.
fn remove_staging(staging_dir: &Path) {
    if !staging_dir.exists() {
        return;
    }

    match std::fs::remove_dir_all(staging_dir) {
        Ok(()) => info!("Staged videos removed from '{}'", staging_dir.display()),
        Err(err) => warn!("Could not remove '{}': {err}", staging_dir.display()),
    }
}
