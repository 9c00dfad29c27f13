//! Step-by-step progress lines for long pipelines.

use std::time::Instant;

use tracing::info;

pub struct ProgressLogger {
    start: Instant,
    total: usize,
    current: usize,
}

impl ProgressLogger {
    pub fn new(total: usize) -> Self {
        Self {
            start: Instant::now(),
            total,
            current: 0,
        }
    }

    fn line(&self, name: &str) -> String {
        let percent = if self.total == 0 {
            100
        } else {
            self.current * 100 / self.total
        };
        format!(
            "[{}/{}] ({percent}%) {name} - elapsed {:.1}s",
            self.current,
            self.total,
            self.start.elapsed().as_secs_f64()
        )
    }

    pub fn step(&mut self, name: &str) {
        self.current += 1;
        info!("{}", self.line(name));
    }

    pub fn complete(&self) {
        info!(
            "Finished {} steps in {:.1}s",
            self.current,
            self.start.elapsed().as_secs_f64()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_line_format() {
        let mut progress = ProgressLogger::new(4);
        progress.step("fetch");
        let line = progress.line("fetch");
        assert!(line.starts_with("[1/4] (25%) fetch - elapsed "));
        assert!(line.ends_with('s'));
    }

    #[test]
    fn test_zero_total_reports_full() {
        let progress = ProgressLogger::new(0);
        assert!(progress.line("x").starts_with("[0/0] (100%) x"));
    }
}
