//! Sample types for the four tracked entity kinds
//!
//! Every resource counter is an explicit optional field: not all kernel
//! subsystems are available on every host, and a sample with a missing
//! counter group is still a valid sample.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Memory occupancy derived from the host meminfo table (kibibytes, as the
/// kernel reports them)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_kb: u64,
    pub used_kb: u64,
    pub free_kb: u64,
}

/// Memory occupancy of a single workload scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeMemoryStats {
    pub used_bytes: u64,
}

/// Cumulative network byte counters summed across all interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Cumulative block I/O byte counters summed across all devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskStats {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Node-level usage sample, one per node per collection tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSample {
    pub timestamp: DateTime<Utc>,
    pub node: String,
    /// CPU usage ratio. Left unset by the sampler; rate derivation from the
    /// cumulative counter is a downstream concern over two consecutive samples.
    pub cpu_usage: Option<f64>,
    /// Cumulative CPU time in nanoseconds from cgroup CPU accounting
    pub cpu_accumulated_ns: Option<u64>,
    pub memory: Option<MemoryStats>,
    pub network: Option<NetworkStats>,
    pub disk: Option<DiskStats>,
}

/// Workload-level usage sample, one per discovered scope per tick
///
/// Node, namespace and deployment assignment arrive already stamped by the
/// producing side; the store never performs topology lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodSample {
    pub timestamp: DateTime<Utc>,
    pub node: String,
    pub namespace: String,
    pub deployment: Option<String>,
    pub pod: String,
    pub cpu_usage: Option<f64>,
    pub cpu_accumulated_ns: Option<u64>,
    pub memory: Option<ScopeMemoryStats>,
    pub network: Option<NetworkStats>,
    pub disk: Option<DiskStats>,
}

/// Namespace-level usage sample, produced by an external aggregating producer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceSample {
    pub timestamp: DateTime<Utc>,
    pub namespace: String,
    pub cpu_usage: Option<f64>,
    pub memory_bytes: Option<u64>,
    pub disk_read_bytes: Option<u64>,
    pub disk_write_bytes: Option<u64>,
    pub network_rx_bytes: Option<u64>,
    pub network_tx_bytes: Option<u64>,
}

/// Deployment-level usage sample, produced by an external aggregating producer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSample {
    pub timestamp: DateTime<Utc>,
    pub namespace: String,
    pub deployment: String,
    pub cpu_usage: Option<f64>,
    pub memory_bytes: Option<u64>,
    pub disk_read_bytes: Option<u64>,
    pub disk_write_bytes: Option<u64>,
    pub network_rx_bytes: Option<u64>,
    pub network_tx_bytes: Option<u64>,
}

/// Compose the store key for a deployment.
///
/// Deployment names are only unique within a namespace, so the key is the
/// composite `"{namespace}/{deployment}"`. Node, pod and namespace keys are
/// flat names.
pub fn deployment_key(namespace: &str, deployment: &str) -> String {
    format!("{}/{}", namespace, deployment)
}
