//! Heartbeat payloads and best-effort process metrics.

use std::time::Duration;

use crate::message::Payload;

/// Point-in-time process metrics. Absent values mean the platform gave
/// no answer, which is not an error.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSample {
    /// 1-minute load average.
    pub system_load: Option<f64>,
    /// Resident set size in megabytes.
    pub memory_mb: Option<f64>,
}

/// Sample load and memory from `/proc`. Returns defaults on platforms
/// without it.
pub fn sample() -> MetricsSample {
    MetricsSample {
        system_load: system_load(),
        memory_mb: resident_memory_mb(),
    }
}

/// Build the heartbeat body for a daemon that has been up for `uptime`.
pub fn heartbeat_payload(uptime: Duration) -> Payload {
    let metrics = sample();
    Payload::Heartbeat {
        system_load: metrics.system_load,
        memory_mb: metrics.memory_mb,
        uptime_secs: uptime.as_secs_f64(),
    }
}

fn system_load() -> Option<f64> {
    std::fs::read_to_string("/proc/loadavg")
        .ok()
        .and_then(|s| {
            s.split_whitespace()
                .next()
                .and_then(|avg| avg.parse().ok())
        })
}

fn resident_memory_mb() -> Option<f64> {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|s| {
            s.lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<f64>().ok())
        })
        .map(|kb| kb / 1024.0)
}
