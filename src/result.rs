use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// Zero, several or malformed video sources were given
    #[error("Invalid source: {0}")]
    #[diagnostic(
        code(framehaul::invalid_source),
        help("Give exactly one of --search, --playlist or --youtube")
    )]
    InvalidSource(String),

    /// The metadata name of the run is not a plain file name
    #[error("Invalid output name: {0}")]
    #[diagnostic(
        code(framehaul::invalid_output),
        help("Give a file name without directories or extension, e.g. --output cats")
    )]
    InvalidOutput(String),

    /// The provider could not list the videos of the source.
    /// This aborts the whole run.
    #[error("Could not resolve the videos of {source_desc}")]
    #[diagnostic(code(framehaul::resolver))]
    Resolver {
        source_desc: String,
        #[source]
        cause: Box<Error>,
    },

    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// The upstream provider reported the video as unavailable
    #[error("Unavailable stream: {0}")]
    Unavailable(String),

    /// An external program ran but did not succeed
    #[error("{program} did run but was not successful: {message}")]
    Command { program: String, message: String },

    #[error("Could not extract frames from '{}': {reason}", path.display())]
    Extraction { path: PathBuf, reason: String },

    #[error("Could not persist the run results: {0}")]
    #[diagnostic(code(framehaul::persistence))]
    Persistence(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    #[diagnostic(code(framehaul::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(code(framehaul::database))]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    #[diagnostic(code(framehaul::config))]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Wrap a provider failure into the fatal resolver error
    pub fn resolver(source_desc: impl Into<String>, cause: Error) -> Self {
        Error::Resolver {
            source_desc: source_desc.into(),
            cause: Box::new(cause),
        }
    }

    pub fn command(program: &str, message: impl Into<String>) -> Self {
        Error::Command {
            program: program.to_owned(),
            message: message.into(),
        }
    }

    /// Whether the next candidate of a download may still succeed
    pub fn is_recoverable_by_next_candidate(&self) -> bool {
        matches!(self, Error::ResourceNotFound(_) | Error::TransientNetwork(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
