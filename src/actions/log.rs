//! Tracing output as workflow commands
//!
//! The runner turns `::error::` and `::warning::` lines into annotations and
//! shows `::debug::` lines only when step debug logging is enabled. Info
//! events are printed as plain log lines.

use super::command::escape_data;
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;

/// Event formatter emitting one workflow command per event
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowCommandFormat;

impl WorkflowCommandFormat {
    /// Render a message for the given level
    pub fn render(level: &Level, message: &str) -> String {
        match *level {
            Level::ERROR => format!("::error::{}", escape_data(message)),
            Level::WARN => format!("::warning::{}", escape_data(message)),
            Level::INFO => message.to_string(),
            _ => format!("::debug::{}", escape_data(message)),
        }
    }
}

impl<S, N> FormatEvent<S, N> for WorkflowCommandFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut message = String::new();
        ctx.format_fields(format::Writer::new(&mut message), event)?;

        writeln!(writer, "{}", Self::render(event.metadata().level(), &message))
    }
}
