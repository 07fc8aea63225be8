mod cli;
mod config;
mod database;
mod download;
mod frames;
mod io;
mod logging;
mod outside;
mod pipeline;
mod pool;
mod resolver;
mod result;
mod sink;
#[cfg(test)]
mod testing;
mod transcript;
mod types;
mod utils;

use clap::Parser;
use miette::{IntoDiagnostic, WrapErr};
use tracing::{debug, info};

use crate::{
    cli::Args,
    config::Settings,
    database::{DocumentStore, Sqlite},
    logging::init_logging,
    outside::{Ffmpeg, HttpClient, Ytdl},
    pipeline::{Collaborators, Pipeline, RunReport},
    pool::CancelToken,
    result::Result,
    sink::{JsonFileSink, MetadataSink, StoreSink},
};

fn main() -> miette::Result<()> {
    let args = Args::parse();
    init_logging(args.log_level)?;

    // Nothing is started for an invalid source or output
    let source = args.source()?;
    let run_name = args.run_name()?;

    let mut settings = Settings::load(args.config.as_deref())
        .wrap_err("Could not load the configuration")?;
    settings.shuffle |= args.shuffle;
    debug!("{settings:?}");

    let (ytdl, ffmpeg) = load_external_components(&settings)?;
    let http = HttpClient::new(settings.connect_timeout(), settings.read_timeout());

    if let Some(p) = settings.database.parent() {
        std::fs::create_dir_all(p)
            .into_diagnostic()
            .wrap_err("Could not create the database parent directories")?;
    }
    let store = Sqlite::open(&settings.database).wrap_err("Could not open the document store")?;
    let json_sink = JsonFileSink::new(&settings.metadata_dir);
    let store_sink = StoreSink::new(&store);

    let cancel = CancelToken::new();
    if let Some(deadline) = settings.run_timeout() {
        info!("The run will be cancelled after {}s", deadline.as_secs());
        cancel.cancel_after(deadline);
    }

    let collaborators = Collaborators {
        provider: &ytdl,
        transcripts: &ytdl,
        media: &http,
        sampler: &ffmpeg,
        sinks: vec![&json_sink as &dyn MetadataSink, &store_sink],
        store: Some(&store),
    };

    let report = Pipeline::new(collaborators, &settings, cancel).run(&source, run_name)?;
    print_report(&report);

    info!("All tasks completed");
    Ok(())
}

/// Load the external components
fn load_external_components(settings: &Settings) -> Result<(Ytdl, Ffmpeg)> {
    // Construct the handles concurrently as executing an external program
    // is not instantaneous. That way we can avoid adding the costs
    let (socket_timeout, search_limit) = (settings.socket_timeout_secs, settings.search_limit);
    let ytdl_thread = std::thread::spawn(move || Ytdl::new(socket_timeout, search_limit));
    let ffmpeg_thread = std::thread::spawn(Ffmpeg::new);

    let ytdl = ytdl_thread.join().expect("Could not join thread")?;
    let ffmpeg = ffmpeg_thread.join().expect("Could not join thread")?;

    Ok((ytdl, ffmpeg))
}

/// Print the summary of the run followed by every failure
fn print_report(report: &RunReport) {
    if report.cancelled {
        println!("Run cancelled before completion");
    }
    println!("{}", report.summary());

    for (descriptor, reason) in report.failed_downloads() {
        println!("  download of {} ({}): {reason}", descriptor.id, descriptor.title);
    }
    for err in &report.extraction.failures {
        println!("  {err}");
    }
}
