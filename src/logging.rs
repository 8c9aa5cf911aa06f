//! A `tracing-subscriber` formatting layer rendering the fixed
//! `<app-name>: [<LEVEL>] <message>` line shape the original tool wrote
//! to syslog, so operators grepping logs see the same visual shape
//! after the rewrite (SPEC_FULL.md §6).

use std::fmt;

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::docker::APP_NAME;

pub struct SyslogStyleFormat;

impl<S, N> FormatEvent<S, N> for SyslogStyleFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{APP_NAME}: [{}] ", event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

pub fn init(debug: bool) {
    let default_directive = if debug {
        format!("{APP_NAME}=debug")
    } else {
        format!("{APP_NAME}=info")
    };

    tracing_subscriber::fmt()
        .event_format(SyslogStyleFormat)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .init();
}
