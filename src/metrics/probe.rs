//! Resident-memory sampling.

use crate::error::{Error, Result};

/// Source of "current resident memory of this process, in MB".
pub trait MemoryProbe: Send + Sync {
    fn resident_mb(&self) -> Result<f64>;
}

/// Reads RSS of the current process from the OS.
///
/// Linux: `VmRSS` from `/proc/self/status`. Elsewhere: `ps -o rss=`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessMemoryProbe;

impl MemoryProbe for ProcessMemoryProbe {
    fn resident_mb(&self) -> Result<f64> {
        read_rss_kb().map(|kb| kb as f64 / 1024.0)
    }
}

#[cfg(target_os = "linux")]
fn read_rss_kb() -> Result<u64> {
    let status = std::fs::read_to_string("/proc/self/status")
        .map_err(|e| Error::Probe(format!("reading /proc/self/status: {e}")))?;
    parse_vm_rss(&status).ok_or_else(|| Error::Probe("VmRSS not found in /proc/self/status".into()))
}

#[cfg(not(target_os = "linux"))]
fn read_rss_kb() -> Result<u64> {
    let output = std::process::Command::new("ps")
        .args(["-o", "rss=", "-p"])
        .arg(std::process::id().to_string())
        .output()
        .map_err(|e| Error::Probe(format!("running ps: {e}")))?;
    let text = String::from_utf8_lossy(&output.stdout);
    text.trim()
        .parse::<u64>()
        .map_err(|_| Error::Probe(format!("unexpected ps output: {:?}", text.trim())))
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_rss(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|value| value.split_whitespace().next())
        .and_then(|raw| raw.parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vm_rss_line() {
        let status = "Name:\tmemhealth\nVmPeak:\t  300000 kB\nVmRSS:\t  153600 kB\nThreads:\t4\n";
        assert_eq!(parse_vm_rss(status), Some(153_600));
        assert_eq!(parse_vm_rss("Name:\tx\n"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn live_probe_reports_positive_rss() {
        let mb = ProcessMemoryProbe.resident_mb().unwrap();
        assert!(mb > 0.0);
    }
}
