use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::{
    outside::{StreamFormat, VideoEntry, VideoProvider},
    result::{Error, Result},
    types::{SourceSpec, VideoDescriptor},
};

/// Turns a source into the descriptors of its videos
pub struct Resolver<'a> {
    provider: &'a dyn VideoProvider,
    quality: &'a str,
}

/// The videos listed for a source.
///
/// Descriptors are built lazily, one provider call per video, and
/// [`Resolution::descriptors`] can be called again to restart from the first one.
pub struct Resolution<'a> {
    resolver: &'a Resolver<'a>,
    entries: Vec<VideoEntry>,
}

impl<'a> Resolver<'a> {
    pub fn new(provider: &'a dyn VideoProvider, quality: &'a str) -> Self {
        Self { provider, quality }
    }

    /// List the videos of the source.
    ///
    /// Failing to list the source is fatal and returned as [`Error::Resolver`].
    /// A video listed several times is only kept at its first position.
    pub fn resolve(&'a self, source: &SourceSpec) -> Result<Resolution<'a>> {
        info!("Listing the videos of {source}");
        let mut entries = self
            .provider
            .list(source)
            .map_err(|err| Error::resolver(source.to_string(), err))?;

        if matches!(source, SourceSpec::SingleVideo(_)) && entries.len() != 1 {
            return Err(Error::resolver(
                source.to_string(),
                Error::ResourceNotFound(format!("expected one video, found {}", entries.len())),
            ));
        }

        let mut seen = HashSet::new();
        entries.retain(|entry| {
            let first = seen.insert(entry.id.clone());
            if !first {
                debug!("Video {} listed twice, keeping the first one", entry.id);
            }
            first
        });

        info!("{} videos found", entries.len());
        Ok(Resolution {
            resolver: self,
            entries,
        })
    }

    fn describe(&self, entry: &VideoEntry) -> VideoDescriptor {
        let candidate_urls = match &entry.formats {
            Some(formats) => select_candidates(formats, self.quality),
            None => match self.provider.formats(&entry.id) {
                Ok(formats) => select_candidates(&formats, self.quality),
                Err(err) => {
                    // The download will report the video as failed
                    warn!("Could not get the renditions of video {}: {err}", entry.id);
                    vec![]
                }
            },
        };

        debug!(
            "Video {} has {} candidate(s) at {}",
            entry.id,
            candidate_urls.len(),
            self.quality
        );
        VideoDescriptor::new(entry.id.clone(), entry.title.clone(), candidate_urls)
    }
}

impl Resolution<'_> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The descriptors, in the provider order
    pub fn descriptors(&self) -> impl Iterator<Item = VideoDescriptor> + '_ {
        self.entries
            .iter()
            .map(|entry| self.resolver.describe(entry))
    }
}

/// The URLs of the progressive renditions matching the quality label,
/// in the provider order
pub fn select_candidates(formats: &[StreamFormat], quality: &str) -> Vec<String> {
    formats
        .iter()
        .filter(|f| f.is_progressive())
        .filter(|f| f.quality_label().is_some_and(|label| label == quality))
        .filter_map(|f| f.url.clone())
        .collect()
}
