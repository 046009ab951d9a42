//! Terminal rendering of a grab: percent bar on stderr, resume hints on stdout.

use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use pagegrab_core::{ProgressSink, RunReporter};

/// Percent bar, drawn from the first known percentage on. Unknown-length
/// transfers never show one.
#[derive(Default)]
pub struct BarProgress {
    bar: Option<ProgressBar>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn bar(&mut self) -> &ProgressBar {
        self.bar.get_or_insert_with(|| {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {elapsed_precise}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("━━╌"),
            );
            bar
        })
    }
}

impl ProgressSink for BarProgress {
    fn start(&mut self) {
        // a resumed run starts a new bar
        if let Some(old) = self.bar.take() {
            old.finish_and_clear();
        }
    }

    fn update(&mut self, percent: u8) {
        self.bar().set_position(u64::from(percent));
    }

    fn finish(&mut self) {
        if let Some(bar) = &self.bar {
            if bar.position() >= 100 {
                bar.finish();
            } else {
                bar.abandon();
            }
        }
    }
}

/// Prints what an operator needs to retry by hand.
pub struct ConsoleReporter;

impl RunReporter for ConsoleReporter {
    fn resolved(&mut self, content_url: &str) {
        println!("{}", content_url);
    }

    fn temp_file(&mut self, path: &Path) {
        println!("temporary file: {}", path.display());
    }
}
