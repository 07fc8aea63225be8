use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

use crate::{
    result::{Error, Result},
    types::SourceSpec,
};

macro_rules! arg_env {
    ($v:literal) => {
        concat!("FRAMEHAUL_", $v)
    };
}

/// Fetch web videos with their metadata and transcripts, sample still frames out of them
/// and store everything for later curation.
///
/// Exactly one of `--search`, `--playlist` and `--youtube` must be given.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// The search term whose first results are fetched
    #[arg(long)]
    pub search: Option<String>,

    /// The URL of the playlist whose videos are fetched
    #[arg(long)]
    pub playlist: Option<String>,

    /// The URL of the single video to fetch
    #[arg(long)]
    pub youtube: Option<String>,

    /// The name of the metadata file of the run, without extension
    #[arg(long, default_value = "metadata")]
    pub output: String,

    /// The TOML configuration file. `framehaul.toml` is read if it exists
    #[arg(long, env=arg_env!("CONFIG"))]
    pub config: Option<PathBuf>,

    /// The most verbose level of the logged messages
    #[arg(long, default_value_t = Level::INFO, env=arg_env!("LOG_LEVEL"))]
    pub log_level: Level,

    /// Randomize the order in which the videos are downloaded.
    /// Do not influence the order of the written metadata.
    #[arg(long)]
    pub shuffle: bool,
}

impl Args {
    /// The validated source of the run
    pub fn source(&self) -> Result<SourceSpec> {
        SourceSpec::from_options(
            self.search.clone(),
            self.playlist.clone(),
            self.youtube.clone(),
        )
    }

    /// The validated name of the metadata file, which must stay in the metadata directory
    pub fn run_name(&self) -> Result<&str> {
        let name = self.output.trim();
        if name.is_empty() || name == "." || name == ".." {
            return Err(Error::InvalidOutput(format!("'{}'", self.output)));
        }
        if name.contains(['/', '\\']) || name.contains("..") {
            return Err(Error::InvalidOutput(format!(
                "'{}' must not contain a path separator or '..'",
                self.output
            )));
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("framehaul").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&["--search", "cats"]);
        assert_eq!(args.output, "metadata");
        assert_eq!(args.log_level, Level::INFO);
        assert!(!args.shuffle);
        assert_eq!(args.source().unwrap(), SourceSpec::Search("cats".into()));
    }

    #[test]
    fn every_source_flag_maps_to_its_variant() {
        let args = parse(&["--playlist", "https://host/list", "--output", "run"]);
        assert_eq!(args.source().unwrap(), SourceSpec::Playlist("https://host/list".into()));
        assert_eq!(args.output, "run");

        let args = parse(&["--youtube", "https://host/v", "--log-level", "debug"]);
        assert_eq!(args.source().unwrap(), SourceSpec::SingleVideo("https://host/v".into()));
        assert_eq!(args.log_level, Level::DEBUG);
    }

    #[test]
    fn several_sources_are_rejected() {
        let args = parse(&["--search", "cats", "--youtube", "https://host/v"]);
        assert!(matches!(args.source(), Err(Error::InvalidSource(_))));
    }

    #[test]
    fn no_source_is_rejected() {
        assert!(matches!(parse(&[]).source(), Err(Error::InvalidSource(_))));
    }

    #[test]
    fn output_is_a_plain_name() {
        assert_eq!(parse(&["--output", "cats-2024"]).run_name().unwrap(), "cats-2024");
        assert_eq!(parse(&[]).run_name().unwrap(), "metadata");

        for bad in ["../x", "a/b", "a\\b", "..", ".", "", "  "] {
            let err = parse(&["--output", bad]).run_name().unwrap_err();
            assert!(matches!(err, Error::InvalidOutput(_)), "{bad:?} was accepted");
        }
    }

    #[test]
    fn unknown_log_level_is_a_parse_error() {
        assert!(Args::try_parse_from(["framehaul", "--log-level", "loud"]).is_err());
    }
}
