use std::time::{Duration, Instant};

use log::info;
use sysinfo::{ProcessExt, System, SystemExt};

/// Resident memory of this process in bytes, if the OS reports it.
pub fn monitor_memory() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = System::new();
    system.refresh_process(pid);
    system.process(pid).map(|process| process.memory())
}

/// Wall-clock and memory bookkeeping around one command.
pub struct RunStats {
    label: String,
    start_time: Instant,
    start_memory: Option<u64>,
}

impl RunStats {
    pub fn start(label: &str) -> RunStats {
        RunStats {
            label: label.to_string(),
            start_time: Instant::now(),
            start_memory: monitor_memory(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finish(self) {
        let duration = self.elapsed();
        match (self.start_memory, monitor_memory()) {
            (Some(start), Some(end)) => info!(
                "{}: time elapsed {:?}, memory {} -> {} KiB",
                self.label,
                duration,
                start / 1024,
                end / 1024
            ),
            _ => info!("{}: time elapsed {:?}", self.label, duration),
        }
    }
}
