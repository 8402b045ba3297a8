use std::sync::Arc;
use std::time::{Duration, Instant};

const UNIT: u64 = 1024;
const PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

/// A progress snapshot for one transfer session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    /// Average speed since the session started, in bytes/second.
    pub speed: f64,
}

impl TransferProgress {
    /// Percentage string, e.g. `"42.00%"`.
    pub fn percent(&self) -> String {
        format_progress(self.bytes_transferred, self.total_bytes)
    }
}

/// Callback invoked with progress after every chunk.
pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Per-session progress state. Owned by exactly one session task.
pub struct ProgressReporter {
    started: Instant,
    total: u64,
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub fn new(total: u64, callback: Option<ProgressCallback>) -> Self {
        Self {
            started: Instant::now(),
            total,
            callback,
        }
    }

    /// Builds a snapshot for `bytes` done so far.
    pub fn snapshot(&self, bytes: u64) -> TransferProgress {
        TransferProgress {
            bytes_transferred: bytes,
            total_bytes: self.total,
            speed: calculate_speed(bytes, self.started.elapsed()),
        }
    }

    /// Invokes the callback, if any, with a fresh snapshot.
    pub fn report(&self, bytes: u64) {
        if let Some(cb) = &self.callback {
            cb(self.snapshot(bytes));
        }
    }
}

/// Average speed in bytes/second; 0 when no time has elapsed.
pub fn calculate_speed(bytes: u64, elapsed: Duration) -> f64 {
    if elapsed.is_zero() {
        return 0.0;
    }
    bytes as f64 / elapsed.as_secs_f64()
}

/// Human-readable size with binary (1024) steps: `"512 B"`, `"1.5 KB"`.
pub fn format_file_size(size: u64) -> String {
    if size < UNIT {
        return format!("{size} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = size / UNIT;
    while n >= UNIT && exp < PREFIXES.len() - 1 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}B", size as f64 / div as f64, PREFIXES[exp])
}

/// Human-readable speed: `"100.00 B/s"`, `"1.50 KB/s"`.
pub fn format_speed(speed: f64) -> String {
    let unit = UNIT as f64;
    if speed < unit {
        return format!("{speed:.2} B/s");
    }
    let mut div = unit;
    let mut exp = 0;
    let mut n = speed / unit;
    while n >= unit && exp < PREFIXES.len() - 1 {
        div *= unit;
        exp += 1;
        n /= unit;
    }
    format!("{:.2} {}B/s", speed / div, PREFIXES[exp])
}

/// Completion percentage with two decimals; `"0.00%"` when `total` is 0.
pub fn format_progress(done: u64, total: u64) -> String {
    if total == 0 {
        return "0.00%".to_string();
    }
    format!("{:.2}%", done as f64 / total as f64 * 100.0)
}
