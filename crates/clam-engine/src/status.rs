//! Operator-facing status channel.
//!
//! Build failures, build warnings, snapshot mismatches, NaN pixel counts and
//! capture progress are reported through a [`StatusSink`]. Where the text ends
//! up (console, overlay, test recorder) is up to the sink.

/// One status report.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Status<'a> {
    /// Plain progress text ("Rendering screenshot").
    Info(&'a str),
    /// Capture completion in percent, `0..=100`.
    Progress(u32),
    /// Something the operator must look at, e.g. a failed build log.
    Alert(&'a str),
    /// Non-fatal anomaly: build warnings, unknown snapshot keys, NaN pixels.
    Warning(&'a str),
}

/// Receiver for [`Status`] reports.
///
/// Sinks are shared between a kernel and the session that renders with it,
/// possibly across threads.
pub trait StatusSink: Send + Sync {
    fn report(&self, status: Status<'_>);
}

/// Forwards every report to the `log` facade.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn report(&self, status: Status<'_>) {
        match status {
            Status::Info(text) => log::info!("{text}"),
            Status::Progress(percent) => log::info!("screenshot {percent}% done"),
            Status::Alert(text) => log::error!("{text}"),
            Status::Warning(text) => log::warn!("{text}"),
        }
    }
}
