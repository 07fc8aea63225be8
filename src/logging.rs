use miette::{IntoDiagnostic, Result, WrapErr};
use owo_colors::OwoColorize;
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime, UtcOffset};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{format, FmtContext, FormatEvent, FormatFields},
    registry::LookupSpan,
    FmtSubscriber,
};

const TIME_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

/// Initialize the logging system, writing to the standard error.
///
/// Must be called before any thread is spawned for the local time offset to be known.
pub fn init_logging(level: Level) -> Result<()> {
    // The offset cannot be read safely once other threads run
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    let subscriber = FmtSubscriber::builder()
        .event_format(LineFormat { offset })
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .into_diagnostic()
        .wrap_err("Setting default subscriber failed")
}

/// One line per event: `HH:MM:SS LEVEL thread message`
struct LineFormat {
    offset: UtcOffset,
}

impl LineFormat {
    fn level_colored(level: Level) -> String {
        match level {
            Level::ERROR => level.red().to_string(),
            Level::WARN => level.yellow().to_string(),
            Level::DEBUG => level.blue().to_string(),
            Level::TRACE => level.purple().to_string(),
            _ => level.green().to_string(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let level = *event.metadata().level();

        let now = OffsetDateTime::now_utc()
            .to_offset(self.offset)
            .time()
            .format(TIME_FORMAT)
            .map_err(|_| std::fmt::Error)?;
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("worker");

        if writer.has_ansi_escapes() {
            write!(
                &mut writer,
                "{} {:>5} {} ",
                now.dimmed(),
                Self::level_colored(level),
                thread_name.yellow(),
            )?;
        } else {
            write!(&mut writer, "{now} {level:>5} {thread_name} ")?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}
