use std::{io::Read, time::Duration};

use tracing::debug;

use crate::result::{Error, Result};

/// Interface for opening a remote media file as a byte stream
pub trait MediaSource: Sync {
    /// Open the URL for reading.
    ///
    /// Return [`Error::ResourceNotFound`] if the server no longer serves it
    /// and [`Error::TransientNetwork`] for any other failure.
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>>;
}

/// Blocking HTTP client with bounded connect and read times
#[derive(Debug)]
pub struct HttpClient {
    agent: ureq::Agent,
}

impl HttpClient {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .build();

        Self { agent }
    }
}

impl MediaSource for HttpClient {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>> {
        debug!("GET {url}");
        match self.agent.get(url).call() {
            Ok(response) => Ok(Box::new(response.into_reader())),
            Err(err) => Err(classify(url, err)),
        }
    }
}

fn classify(url: &str, err: ureq::Error) -> Error {
    match err {
        ureq::Error::Status(code @ (403 | 404 | 410), _) => {
            Error::ResourceNotFound(format!("{url} answered {code}"))
        }
        ureq::Error::Status(code, _) => {
            Error::TransientNetwork(format!("{url} answered {code}"))
        }
        ureq::Error::Transport(transport) => {
            Error::TransientNetwork(format!("{url}: {transport}"))
        }
    }
}
