use std::convert::TryInto;
use std::time::{Duration, Instant};

/// Accumulates the CPU time spent on a repeated unit of work, like one discovery scan.
#[derive(Clone, Debug, Default)]
pub struct WorkTimer {
    total_cpu_time: Duration,
    items_completed: u32,
}

impl WorkTimer {
    pub fn start() -> Self {
        Self {
            total_cpu_time: Duration::new(0, 0),
            items_completed: 0,
        }
    }

    pub fn total_cpu_time(&self) -> Duration {
        self.total_cpu_time
    }

    pub fn items_completed(&self) -> u32 {
        self.items_completed
    }

    pub fn complete_item(&mut self, d: Duration) {
        self.total_cpu_time += d;
        self.items_completed = self.items_completed.saturating_add(1);
    }

    /// Runs `work` and records its duration as one completed item.
    pub fn time<R>(&mut self, work: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let result = work();
        self.complete_item(start.elapsed());
        result
    }

    pub fn average_cpu_time_us(&self) -> u32 {
        let total_cpu_time_us: u32 = self
            .total_cpu_time
            .as_micros()
            .try_into()
            .unwrap_or(u32::MAX);

        total_cpu_time_us / self.items_completed.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_completed_items() {
        let mut timer = WorkTimer::start();
        assert_eq!(timer.average_cpu_time_us(), 0);

        timer.complete_item(Duration::from_micros(100));
        timer.complete_item(Duration::from_micros(300));
        assert_eq!(timer.items_completed(), 2);
        assert_eq!(timer.total_cpu_time(), Duration::from_micros(400));
        assert_eq!(timer.average_cpu_time_us(), 200);
    }

    #[test]
    fn timed_work_counts_as_one_item() {
        let mut timer = WorkTimer::start();
        let answer = timer.time(|| 6 * 7);
        assert_eq!(answer, 42);
        assert_eq!(timer.items_completed(), 1);
    }
}
