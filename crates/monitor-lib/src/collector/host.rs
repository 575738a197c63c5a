//! Node-level counter collection
//!
//! Reads the four host counter sources:
//! - cpu,cpuacct controller for cumulative CPU time
//! - the host meminfo table for memory occupancy
//! - the per-interface network device statistics table
//! - the blkio controller service-bytes table for block I/O

use super::{SourceReport, SourceStatus};
use crate::models::{DiskStats, MemoryStats, NetworkStats, NodeSample};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::warn;

/// Samples host-wide counters from kernel pseudo-files
pub struct HostSampler {
    /// Root path for cgroup v1 controllers (typically /sys/fs/cgroup)
    cgroup_root: PathBuf,
    /// Path to the proc filesystem (the host mount when containerized)
    proc_root: PathBuf,
    /// Identity stamped on every emitted sample
    node_name: String,
}

impl HostSampler {
    /// Create a sampler reading the default kernel mount points
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            cgroup_root: PathBuf::from("/sys/fs/cgroup"),
            proc_root: PathBuf::from("/proc"),
            node_name: node_name.into(),
        }
    }

    /// Create a sampler with custom mount points (host mounts, or testing)
    pub fn with_roots(
        node_name: impl Into<String>,
        cgroup_root: impl Into<PathBuf>,
        proc_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cgroup_root: cgroup_root.into(),
            proc_root: proc_root.into(),
            node_name: node_name.into(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Assemble one node sample from all four sources.
    ///
    /// Source failures are isolated: a failed read leaves its field unset
    /// and is reported per source, and the sample is emitted regardless.
    pub async fn sample_node(&self) -> (NodeSample, SourceReport) {
        let mut report = SourceReport::default();

        let cpu_accumulated_ns = match self.read_cpu_accumulated().await {
            Ok(value) => {
                report.cpu = SourceStatus::Ok;
                Some(value)
            }
            Err(e) => {
                warn!(error = %e, source = "cpu", "Counter source unavailable");
                None
            }
        };

        let memory = match self.read_memory().await {
            Ok(stats) => {
                report.memory = SourceStatus::Ok;
                Some(stats)
            }
            Err(e) => {
                warn!(error = %e, source = "memory", "Counter source unavailable");
                None
            }
        };

        let network = match self.read_network().await {
            Ok(stats) => {
                report.network = SourceStatus::Ok;
                Some(stats)
            }
            Err(e) => {
                warn!(error = %e, source = "network", "Counter source unavailable");
                None
            }
        };

        let disk = match self.read_disk().await {
            Ok(stats) => {
                report.disk = SourceStatus::Ok;
                Some(stats)
            }
            Err(e) => {
                warn!(error = %e, source = "disk", "Counter source unavailable");
                None
            }
        };

        let sample = NodeSample {
            timestamp: chrono::Utc::now(),
            node: self.node_name.clone(),
            // Rate derivation over consecutive cumulative counters is a
            // downstream responsibility; the sampler reports raw values.
            cpu_usage: None,
            cpu_accumulated_ns,
            memory,
            network,
            disk,
        };

        (sample, report)
    }

    /// Read cumulative CPU time in nanoseconds from cpuacct.usage
    async fn read_cpu_accumulated(&self) -> Result<u64> {
        let path = self.cgroup_root.join("cpu,cpuacct/cpuacct.usage");
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        content
            .trim()
            .parse()
            .with_context(|| "Failed to parse cpuacct.usage")
    }

    async fn read_memory(&self) -> Result<MemoryStats> {
        let path = self.proc_root.join("meminfo");
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Ok(Self::parse_meminfo(&content))
    }

    async fn read_network(&self) -> Result<NetworkStats> {
        let path = self.proc_root.join("net/dev");
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Ok(Self::parse_net_dev(&content))
    }

    async fn read_disk(&self) -> Result<DiskStats> {
        let path = self.cgroup_root.join("blkio/blkio.throttle.io_service_bytes");
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Ok(Self::parse_blkio(&content))
    }

    /// Parse the meminfo table into memory occupancy.
    ///
    /// Values are kibibytes as the kernel reports them;
    /// `used = total - free - buffers - cached`. Lines that do not fit the
    /// `Key: value [kB]` shape are skipped.
    pub fn parse_meminfo(content: &str) -> MemoryStats {
        let mut table: HashMap<&str, u64> = HashMap::new();

        for line in content.lines() {
            if let Some((key, rest)) = line.split_once(':') {
                if let Some(first) = rest.split_whitespace().next() {
                    if let Ok(value) = first.parse::<u64>() {
                        table.insert(key.trim(), value);
                    }
                }
            }
        }

        let total = table.get("MemTotal").copied().unwrap_or(0);
        let free = table.get("MemFree").copied().unwrap_or(0);
        let buffers = table.get("Buffers").copied().unwrap_or(0);
        let cached = table.get("Cached").copied().unwrap_or(0);
        let used = total
            .saturating_sub(free)
            .saturating_sub(buffers)
            .saturating_sub(cached);

        MemoryStats {
            total_kb: total,
            used_kb: used,
            free_kb: free,
        }
    }

    /// Parse the network device statistics table, summing receive and
    /// transmit bytes across all interfaces.
    ///
    /// The table has a fixed two-line header. Each data line is
    /// `iface: rx_bytes rx_packets ... tx_bytes ...` with rx bytes in
    /// column 1 and tx bytes in column 9 after the interface name; short or
    /// malformed lines are skipped individually.
    pub fn parse_net_dev(content: &str) -> NetworkStats {
        let mut rx = 0u64;
        let mut tx = 0u64;

        for line in content.lines().skip(2) {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 10 {
                continue;
            }
            if let (Ok(r), Ok(t)) = (parts[1].parse::<u64>(), parts[9].parse::<u64>()) {
                rx += r;
                tx += t;
            }
        }

        NetworkStats {
            rx_bytes: rx,
            tx_bytes: tx,
        }
    }

    /// Parse the blkio service-bytes table, accumulating Read and Write
    /// byte totals across all block devices.
    ///
    /// Data lines are `major:minor Op bytes`; other operation types and
    /// unparseable lines (including the trailing `Total` row) are skipped.
    pub fn parse_blkio(content: &str) -> DiskStats {
        let mut read = 0u64;
        let mut write = 0u64;

        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                continue;
            }
            match parts[1] {
                "Read" => read += parts[2].parse::<u64>().unwrap_or(0),
                "Write" => write += parts[2].parse::<u64>().unwrap_or(0),
                _ => {}
            }
        }

        DiskStats {
            read_bytes: read,
            write_bytes: write,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meminfo_derives_used() {
        let content = r#"MemTotal:        2048000 kB
MemFree:          512000 kB
MemAvailable:    1024000 kB
Buffers:          128000 kB
Cached:           256000 kB
SwapCached:            0 kB"#;

        let stats = HostSampler::parse_meminfo(content);
        assert_eq!(stats.total_kb, 2048000);
        assert_eq!(stats.free_kb, 512000);
        assert_eq!(stats.used_kb, 2048000 - 512000 - 128000 - 256000);
    }

    #[test]
    fn test_parse_meminfo_garbage_yields_zeroes() {
        let stats = HostSampler::parse_meminfo("not a meminfo table\nat: all kB");
        assert_eq!(stats.total_kb, 0);
        assert_eq!(stats.used_kb, 0);
        assert_eq!(stats.free_kb, 0);
    }

    #[test]
    fn test_parse_net_dev_sums_interfaces_and_skips_header() {
        let content = r#"Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:  123456     100    0    0    0     0          0         0   123456     100    0    0    0     0       0          0
  eth0: 1000000    2000    0    0    0     0          0         0   500000    1500    0    0    0     0       0          0"#;

        let stats = HostSampler::parse_net_dev(content);
        assert_eq!(stats.rx_bytes, 123456 + 1000000);
        assert_eq!(stats.tx_bytes, 123456 + 500000);
    }

    #[test]
    fn test_parse_net_dev_skips_malformed_lines() {
        let content = "header one\nheader two\nshort line\n  eth0: 100 1 0 0 0 0 0 0 200 1 0 0 0 0 0 0\n  bad: x 1 0 0 0 0 0 0 y 1 0 0 0 0 0 0";

        let stats = HostSampler::parse_net_dev(content);
        assert_eq!(stats.rx_bytes, 100);
        assert_eq!(stats.tx_bytes, 200);
    }

    #[test]
    fn test_parse_blkio_accumulates_per_op() {
        let content = r#"8:0 Read 135245
8:0 Write 24621
8:0 Sync 100
8:16 Read 1000
8:16 Write 2000
Total 162966"#;

        let stats = HostSampler::parse_blkio(content);
        assert_eq!(stats.read_bytes, 135245 + 1000);
        assert_eq!(stats.write_bytes, 24621 + 2000);
    }

    #[test]
    fn test_parse_blkio_skips_unparseable_lines() {
        let content = "garbage\n8:0 Read notanumber\n8:0 Write 50";

        let stats = HostSampler::parse_blkio(content);
        assert_eq!(stats.read_bytes, 0);
        assert_eq!(stats.write_bytes, 50);
    }
}
