//! Coarse progress and timing reports.

use std::time::Duration;

use tracing::info;

/// Receives notifications while a product is streamed. Purely
/// observational; nothing reported here affects the output.
pub trait ProgressObserver {
    fn started(&mut self, _product: &str, _blocks: usize) {}

    /// `percent` is a multiple of the product's cadence.
    fn progress(&mut self, product: &str, percent: u32);

    fn finished(&mut self, _product: &str, _elapsed: Duration) {}

    fn skipped(&mut self, _product: &str) {}
}

/// Logs every notification through `tracing`.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn started(&mut self, product: &str, blocks: usize) {
        info!("Processing {} ({} blocks)", product, blocks);
    }

    fn progress(&mut self, product: &str, percent: u32) {
        info!("{}: {}% complete", product, percent);
    }

    fn finished(&mut self, product: &str, elapsed: Duration) {
        info!("{} completed (elapsed time: {})", product, format_elapsed(elapsed));
    }

    fn skipped(&mut self, product: &str) {
        info!("{} already complete, skipping", product);
    }
}

/// Discards every notification.
#[derive(Debug, Default)]
pub struct Silent;

impl ProgressObserver for Silent {
    fn progress(&mut self, _product: &str, _percent: u32) {}
}

/// Block counter that fires once each time another `cadence` percent of the
/// blocks is done.
#[derive(Debug, Clone)]
pub struct Progress {
    total: usize,
    cadence: u32,
    done: usize,
    reported: u32,
}

impl Progress {
    pub fn new(total: usize, cadence: u32) -> Self {
        Self {
            total,
            cadence: cadence.clamp(1, 100),
            done: 0,
            reported: 0,
        }
    }

    /// Counts one finished block. Returns the percentage to report when a
    /// cadence step was crossed.
    pub fn tick(&mut self) -> Option<u32> {
        self.done += 1;
        if self.total == 0 {
            return None;
        }
        let percent = (self.done.min(self.total) * 100 / self.total) as u32;
        let step = percent / self.cadence * self.cadence;
        if step > self.reported {
            self.reported = step;
            Some(step)
        } else {
            None
        }
    }
}

/// `H:MM:SS` for log lines.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_percent_cadence_over_uneven_blocks() {
        let mut progress = Progress::new(7, 10);
        let reported: Vec<u32> = (0..7).filter_map(|_| progress.tick()).collect();
        // 14, 28, 42, 57, 71, 85, 100
        assert_eq!(reported, vec![10, 20, 40, 50, 70, 80, 100]);
        assert_eq!(progress.tick(), None);
    }

    #[test]
    fn fine_cadence_reports_each_step_once() {
        let mut progress = Progress::new(200, 1);
        let reported: Vec<u32> = (0..200).filter_map(|_| progress.tick()).collect();
        assert_eq!(reported.len(), 100);
        assert_eq!(reported.last(), Some(&100));
    }

    #[test]
    fn empty_product_reports_nothing() {
        let mut progress = Progress::new(0, 10);
        assert_eq!(progress.tick(), None);
    }

    #[test]
    fn elapsed_is_formatted_as_clock_time() {
        assert_eq!(format_elapsed(Duration::from_secs(5)), "0:00:05");
        assert_eq!(format_elapsed(Duration::from_secs(3725)), "1:02:05");
    }
}
