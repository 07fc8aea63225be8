use std::fmt::Display;

use crate::result::{Error, Result};

/// Where the videos of a run come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Search(String),
    Playlist(String),
    SingleVideo(String),
}

impl SourceSpec {
    /// Build the source from the mutually exclusive inputs.
    ///
    /// Exactly one input must be given and it must not be blank.
    pub fn from_options(
        search: Option<String>,
        playlist: Option<String>,
        single_video: Option<String>,
    ) -> Result<Self> {
        let given: Vec<SourceSpec> = [
            search.map(SourceSpec::Search),
            playlist.map(SourceSpec::Playlist),
            single_video.map(SourceSpec::SingleVideo),
        ]
        .into_iter()
        .flatten()
        .collect();

        match given.as_slice() {
            [] => Err(Error::InvalidSource("no source given".to_owned())),
            [source] if source.value().trim().is_empty() => {
                Err(Error::InvalidSource(format!("empty {}", source.kind())))
            }
            [source] => Ok(source.clone()),
            many => Err(Error::InvalidSource(format!(
                "ambiguous sources: {}",
                many.iter().map(|s| s.kind()).collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SourceSpec::Search(_) => "search term",
            SourceSpec::Playlist(_) => "playlist",
            SourceSpec::SingleVideo(_) => "video",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            SourceSpec::Search(v) | SourceSpec::Playlist(v) | SourceSpec::SingleVideo(v) => v,
        }
    }
}

impl Display for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}'", self.kind(), self.value())
    }
}
