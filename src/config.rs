use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::{
    pool::default_workers,
    result::Result,
    types::{CaptureRate, ImageFormat},
};

/// Prefix of the environment variables overriding the settings
pub const ENV_PREFIX: &str = "FRAMEHAUL";

/// Configuration file read when none is given and it exists
pub const DEFAULT_CONFIG_FILE: &str = "framehaul.toml";

/// Everything a run can be tuned with.
///
/// Built once at startup from, by increasing priority, the defaults,
/// the configuration file and the `FRAMEHAUL_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the raw videos are staged, removed at the end of a run
    pub staging_dir: PathBuf,
    pub frames_dir: PathBuf,
    pub metadata_dir: PathBuf,
    /// The document store file
    pub database: PathBuf,
    /// Quality label of the rendition to download, e.g. "360p"
    pub quality: String,
    pub capture_rate: CaptureRate,
    pub image_format: ImageFormat,
    /// Number of concurrent units, 0 to use the available parallelism
    pub workers: usize,
    /// Number of videos listed for a search
    pub search_limit: usize,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub socket_timeout_secs: u64,
    /// Cancel the run after this many seconds
    pub run_timeout_secs: Option<u64>,
    pub keep_videos: bool,
    pub store_frames: bool,
    /// Randomize the order in which the videos are downloaded
    pub shuffle: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("./output"),
            frames_dir: PathBuf::from("./frames"),
            metadata_dir: PathBuf::from("./metadata"),
            database: PathBuf::from("./framehaul.db"),
            quality: "360p".to_owned(),
            capture_rate: CaptureRate::PerSecond(1.0),
            image_format: ImageFormat::Jpg,
            workers: 0,
            search_limit: 20,
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            socket_timeout_secs: 30,
            run_timeout_secs: None,
            keep_videos: false,
            store_frames: true,
            shuffle: false,
        }
    }
}

impl Settings {
    /// Load the settings from the configuration file and the environment.
    ///
    /// An explicitly given file must exist, the default one is optional.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let file = match config_file {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
        };

        let settings = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    pub fn workers(&self) -> usize {
        if self.workers == 0 {
            default_workers()
        } else {
            self.workers
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}
