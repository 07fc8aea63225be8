use tracing::{debug, warn};

use crate::outside::TranscriptSource;

/// Fetch transcripts without ever failing.
///
/// Any error of the source is logged and the transcript stored as absent.
pub struct TranscriptFetcher<'a> {
    source: &'a dyn TranscriptSource,
}

impl<'a> TranscriptFetcher<'a> {
    pub fn new(source: &'a dyn TranscriptSource) -> Self {
        Self { source }
    }

    pub fn fetch(&self, video_id: &str) -> Option<String> {
        match self.source.transcript(video_id) {
            Ok(Some(text)) => {
                debug!("Transcript of {video_id} is {} bytes long", text.len());
                Some(text)
            }
            Ok(None) => {
                debug!("No transcript available for {video_id}");
                None
            }
            Err(err) => {
                warn!("Could not fetch the transcript of {video_id}: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTranscripts;

    #[test]
    fn source_errors_become_absent() {
        let source = FakeTranscripts::failing_for(&["a"]);
        let fetcher = TranscriptFetcher::new(&source);
        assert_eq!(fetcher.fetch("a"), None);
    }

    #[test]
    fn available_transcript_is_returned() {
        let source = FakeTranscripts::default();
        let fetcher = TranscriptFetcher::new(&source);
        assert_eq!(fetcher.fetch("b").as_deref(), Some("transcript of b"));
    }
}
