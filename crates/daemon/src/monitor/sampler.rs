//! /proc-based resource sampling for the supervised child.

use std::path::PathBuf;
use std::time::Instant;

/// Linux USER_HZ. Fixed at 100 on every supported kernel configuration.
const CLOCK_TICKS_PER_SEC: f64 = 100.0;

/// One resource sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    pub cpu_percent: f64,
    pub fd_count: usize,
    pub socket_count: usize,
}

/// Tracks CPU time between ticks to produce a rolling CPU percentage.
#[derive(Debug)]
pub struct ProcSampler {
    pid: u32,
    last: Option<(Instant, u64)>,
}

impl ProcSampler {
    pub fn new(pid: u32) -> Self {
        Self { pid, last: None }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Sample the child. Returns `None` when the process is gone.
    pub fn sample(&mut self) -> Option<ResourceSample> {
        let ticks = read_cpu_ticks(self.pid)?;
        let now = Instant::now();
        let cpu_percent = match self.last {
            Some((prev_at, prev_ticks)) => {
                let elapsed = now.duration_since(prev_at).as_secs_f64();
                if elapsed > 0.0 {
                    let delta = ticks.saturating_sub(prev_ticks) as f64;
                    (delta / CLOCK_TICKS_PER_SEC / elapsed * 100.0).min(400.0)
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.last = Some((now, ticks));

        let (fd_count, socket_count) = count_fds(self.pid);
        Some(ResourceSample { cpu_percent, fd_count, socket_count })
    }
}

/// utime + stime in clock ticks from /proc/<pid>/stat, robust against
/// parentheses in the comm field.
fn read_cpu_ticks(pid: u32) -> Option<u64> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // Fields after the last ')' are fixed-position; utime and stime are the
    // 12th and 13th fields past it.
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(utime + stime)
}

/// (total fds, socket fds) for the child; best-effort.
fn count_fds(pid: u32) -> (usize, usize) {
    let dir = PathBuf::from(format!("/proc/{pid}/fd"));
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return (0, 0);
    };
    let mut total = 0;
    let mut sockets = 0;
    for entry in entries.flatten() {
        total += 1;
        if let Ok(target) = std::fs::read_link(entry.path()) {
            if target.to_string_lossy().starts_with("socket:") {
                sockets += 1;
            }
        }
    }
    (total, sockets)
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
