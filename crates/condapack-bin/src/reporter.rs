use std::path::Path;

use condapack::Reporter;
use indicatif::{ProgressBar, ProgressStyle};

/// Reporter wiring the library's messages to the terminal: warnings and logs
/// go to standard error, per-file progress drives an indicatif bar.
pub struct ConsoleReporter {
    bar: ProgressBar,
}

impl ConsoleReporter {
    /// A reporter without a visible bar, for the discovery phase.
    pub fn plain() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// A reporter drawing a bar over `total` files.
    pub fn with_progress(total: u64) -> Self {
        let bar = ProgressBar::new(total).with_style(
            ProgressStyle::with_template("[{bar:40}] {pos}/{len} {wide_msg}")
                .expect("progress template is well-formed")
                .progress_chars("=> "),
        );
        Self { bar }
    }

    /// Removes the bar from the terminal once packing is done.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Reporter for ConsoleReporter {
    fn warn(&self, message: &str) {
        self.bar.suspend(|| eprintln!("{message}"));
    }

    fn log(&self, message: &str) {
        self.bar.suspend(|| eprintln!("{message}"));
    }

    fn file_written(&self, target: &Path) {
        self.bar.set_message(target.display().to_string());
        self.bar.inc(1);
    }
}
