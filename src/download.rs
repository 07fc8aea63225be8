use std::{
    io::{ErrorKind, Read, Write},
    path::Path,
};

use tracing::{debug, info, warn};

use crate::{
    io::{partial_file_in, sync_file},
    outside::MediaSource,
    pool::CancelToken,
    result::{Error, Result},
    types::{DownloadResult, DownloadStatus, VideoDescriptor},
};

/// Size of the chunks streamed to disk
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Makes sure the file of a video exists in the destination directory
pub struct DownloadWorker<'a> {
    media: &'a dyn MediaSource,
    dest: &'a Path,
    cancel: CancelToken,
}

impl<'a> DownloadWorker<'a> {
    pub fn new(media: &'a dyn MediaSource, dest: &'a Path, cancel: CancelToken) -> Self {
        Self {
            media,
            dest,
            cancel,
        }
    }

    /// Download the video unless its file already exists.
    ///
    /// Failures are reported in the result status, never returned.
    /// The target file only appears once it has been fully written.
    pub fn download(&self, descriptor: VideoDescriptor) -> DownloadResult {
        let local_path = self.dest.join(&descriptor.local_filename);

        if local_path.exists() {
            info!("'{}' already exists, skipping it", descriptor.local_filename);
            return DownloadResult {
                descriptor,
                local_path,
                status: DownloadStatus::SkippedAlreadyExists,
            };
        }

        info!("Downloading video {} into '{}'", descriptor.id, descriptor.local_filename);
        let status = match self.fetch(&descriptor, &local_path) {
            Ok(bytes) => {
                info!("'{}' downloaded ({bytes} bytes)", descriptor.local_filename);
                DownloadStatus::Completed
            }
            Err(err) => {
                warn!("Could not download video {}: {err}", descriptor.id);
                DownloadStatus::Failed(err.to_string())
            }
        };

        DownloadResult {
            descriptor,
            local_path,
            status,
        }
    }

    /// Stream the first reachable candidate to the target path
    fn fetch(&self, descriptor: &VideoDescriptor, target: &Path) -> Result<u64> {
        std::fs::create_dir_all(self.dest)?;

        let mut last_err = None;
        for url in &descriptor.candidate_urls {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            match self.media.open(url) {
                Ok(reader) => return self.stream_to(reader, target),
                Err(err) if err.is_recoverable_by_next_candidate() => {
                    debug!("Candidate {url} unreachable, trying the next one: {err}");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::ResourceNotFound(format!("no rendition of video {} to download", descriptor.id))
        }))
    }

    /// Write the stream into a hidden partial file, renamed to the target once complete.
    ///
    /// The partial file is removed on any failure on the way.
    fn stream_to(&self, mut reader: Box<dyn Read + Send>, target: &Path) -> Result<u64> {
        let mut partial = partial_file_in(self.dest)?;
        let mut chunk = vec![0; CHUNK_SIZE];
        let mut written = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let len = read_chunk(&mut reader, &mut chunk)
                .map_err(|err| Error::TransientNetwork(format!("stream interrupted: {err}")))?;
            if len == 0 {
                break;
            }

            partial.write_all(&chunk[..len])?;
            written += len as u64;
        }

        partial.flush()?;
        sync_file(partial.as_file())?;
        partial.persist(target).map_err(|err| Error::Io(err.error))?;

        Ok(written)
    }
}

/// Fill the buffer from the reader, stopping early only at the end of the stream.
/// Return the number of bytes read.
fn read_chunk(reader: &mut dyn Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        io::list_files,
        testing::{FakeMedia, MediaBehavior},
    };

    fn descriptor(id: &str, urls: &[&str]) -> VideoDescriptor {
        VideoDescriptor::new(
            id.into(),
            format!("Title {id}"),
            urls.iter().map(|u| u.to_string()).collect(),
        )
    }

    #[test]
    fn second_download_is_skipped_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let media = FakeMedia::default();
        media.serve("https://v/a", MediaBehavior::Bytes(vec![7; 3 * CHUNK_SIZE + 5]));
        let worker = DownloadWorker::new(&media, dir.path(), CancelToken::new());

        let first = worker.download(descriptor("a", &["https://v/a"]));
        assert_eq!(first.status, DownloadStatus::Completed);
        let size = std::fs::metadata(&first.local_path).unwrap().len();
        assert_eq!(size, 3 * CHUNK_SIZE as u64 + 5);
        assert_eq!(media.opened(), 1);

        let second = worker.download(descriptor("a", &["https://v/a"]));
        assert_eq!(second.status, DownloadStatus::SkippedAlreadyExists);
        assert_eq!(second.local_path, first.local_path);
        assert_eq!(media.opened(), 1);
        assert_eq!(std::fs::metadata(&second.local_path).unwrap().len(), size);
    }

    #[test]
    fn missing_candidate_falls_through_to_the_next() {
        let dir = tempfile::tempdir().unwrap();
        let media = FakeMedia::default();
        media.serve("https://v/gone", MediaBehavior::NotFound);
        media.serve("https://v/ok", MediaBehavior::Bytes(b"video".to_vec()));
        let worker = DownloadWorker::new(&media, dir.path(), CancelToken::new());

        let res = worker.download(descriptor("a", &["https://v/gone", "https://v/ok"]));
        assert_eq!(res.status, DownloadStatus::Completed);
        assert_eq!(std::fs::read(&res.local_path).unwrap(), b"video");
    }

    #[test]
    fn interrupted_stream_fails_and_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let media = FakeMedia::default();
        media.serve("https://v/a", MediaBehavior::BreaksAfter(CHUNK_SIZE + 10));
        let worker = DownloadWorker::new(&media, dir.path(), CancelToken::new());

        let res = worker.download(descriptor("a", &["https://v/a"]));
        assert!(res.is_failed());
        assert!(!res.local_path.exists());
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn no_candidate_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let media = FakeMedia::default();
        let worker = DownloadWorker::new(&media, dir.path(), CancelToken::new());

        let res = worker.download(descriptor("a", &[]));
        assert!(matches!(res.status, DownloadStatus::Failed(_)));
        assert_eq!(media.opened(), 0);
    }

    #[test]
    fn cancelled_download_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let media = FakeMedia::default();
        media.serve("https://v/a", MediaBehavior::Bytes(vec![1; 2 * CHUNK_SIZE]));
        let cancel = CancelToken::new();
        cancel.cancel();
        let worker = DownloadWorker::new(&media, dir.path(), cancel);

        let res = worker.download(descriptor("a", &["https://v/a"]));
        assert_eq!(res.status, DownloadStatus::Failed(Error::Cancelled.to_string()));
        assert!(list_files(dir.path()).unwrap().is_empty());
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn cancellation_is_checked_between_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let media = FakeMedia::default();
        let cancel = CancelToken::new();
        media.serve(
            "https://v/a",
            MediaBehavior::CancelsAfter(CHUNK_SIZE, cancel.clone(), 4 * CHUNK_SIZE),
        );
        let worker = DownloadWorker::new(&media, dir.path(), cancel);

        let res = worker.download(descriptor("a", &["https://v/a"]));
        assert_eq!(res.status, DownloadStatus::Failed(Error::Cancelled.to_string()));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn parent_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("deep").join("er");
        let media = FakeMedia::default();
        media.serve("https://v/a", MediaBehavior::Bytes(b"x".to_vec()));
        let worker = DownloadWorker::new(&media, &dest, CancelToken::new());

        let res = worker.download(descriptor("a", &["https://v/a"]));
        assert_eq!(res.status, DownloadStatus::Completed);
        assert!(dest.join("Title a_a.mp4").exists());
    }
}
