//! Run progress: monotone percentage with a throughput-based ETA.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress over the pass-1 workload, measured in bytes so large files
/// weigh what they cost. The reported percentage never decreases.
pub struct ProgressReporter {
    bar: ProgressBar,
    started: Instant,
    total_bytes: u64,
    processed_bytes: u64,
    reported_pct: u64,
}

impl ProgressReporter {
    pub fn new(total_files: usize, total_bytes: u64) -> Self {
        let bar = ProgressBar::new(total_bytes.max(1));
        let style = ProgressStyle::with_template(
            "{bar:40.cyan/blue} {percent:>3}% {msg} (eta {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message(format!("0/{total_files} files"));
        Self {
            bar,
            started: Instant::now(),
            total_bytes: total_bytes.max(1),
            processed_bytes: 0,
            reported_pct: 0,
        }
    }

    /// Invisible reporter for library use and tests.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            started: Instant::now(),
            total_bytes: 1,
            processed_bytes: 0,
            reported_pct: 0,
        }
    }

    pub fn file_done(&mut self, bytes: u64, files_done: usize, total_files: usize) {
        self.processed_bytes = (self.processed_bytes + bytes).min(self.total_bytes);
        let pct = self.processed_bytes * 100 / self.total_bytes;
        // monotone: a re-walked file never moves the bar backwards
        if pct > self.reported_pct {
            self.reported_pct = pct;
            self.bar.set_position(self.processed_bytes);
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            let rate = self.processed_bytes as f64 / elapsed;
            self.bar.set_message(format!(
                "{files_done}/{total_files} files, {:.0} KiB/s",
                rate / 1024.0
            ));
        }
    }

    pub fn percent(&self) -> u64 {
        self.reported_pct
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_monotone_and_capped() {
        let mut progress = ProgressReporter::hidden();
        // hidden reporter normalizes to a 1-byte total
        progress.file_done(1, 1, 2);
        assert_eq!(progress.percent(), 100);
        progress.file_done(5, 2, 2);
        assert_eq!(progress.percent(), 100);
    }
}
