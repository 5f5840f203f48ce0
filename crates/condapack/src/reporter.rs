use std::path::Path;

/// Destination for the warnings and progress emitted while loading and
/// packing an environment.
///
/// The loader and packer never print on their own; they hand every message
/// to the reporter owned by the caller. Library consumers can use
/// [`TracingReporter`] to forward everything to the `tracing` channels, a
/// CLI will typically substitute an implementation that writes to standard
/// error and drives a progress bar.
pub trait Reporter {
    /// A non-fatal problem the user should know about.
    fn warn(&self, message: &str);

    /// Informational output, emitted when verbose packing is requested.
    fn log(&self, message: &str);

    /// Called once per file after its archive entry has been written.
    fn file_written(&self, _target: &Path) {}
}

/// A [`Reporter`] forwarding messages to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn log(&self, message: &str) {
        tracing::info!("{message}");
    }
}
