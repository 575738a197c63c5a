//! Agent configuration

use anyhow::Result;
use serde::Deserialize;

/// Per-node agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Identity stamped on every sample this agent emits
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Aggregator base URL samples are delivered to
    #[serde(default = "default_aggregator_url")]
    pub aggregator_url: String,

    /// Collection tick interval in seconds
    #[serde(default = "default_collect_interval")]
    pub collect_interval_secs: u64,

    /// Root of the cgroup controller hierarchy
    #[serde(default = "default_cgroup_root")]
    pub cgroup_root: String,

    /// Proc filesystem path (the host mount when containerized)
    #[serde(default = "default_proc_root")]
    pub proc_root: String,

    /// Whether to enumerate and sample workload scopes
    #[serde(default = "default_collect_pods")]
    pub collect_pods: bool,

    /// Namespace assumed for scopes without a registered assignment
    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    /// Optional JSON file mapping pod names to their namespace and
    /// deployment, loaded into the scope registry at startup
    #[serde(default)]
    pub scope_assignments_path: Option<String>,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown-node".to_string())
}

fn default_aggregator_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_collect_interval() -> u64 {
    5
}

fn default_cgroup_root() -> String {
    "/sys/fs/cgroup".to_string()
}

fn default_proc_root() -> String {
    "/proc".to_string()
}

fn default_collect_pods() -> bool {
    true
}

fn default_namespace() -> String {
    "default".to_string()
}

impl AgentConfig {
    /// Load configuration from the environment (`AGENT_` prefix)
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("AGENT"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| AgentConfig {
            node_name: default_node_name(),
            aggregator_url: default_aggregator_url(),
            collect_interval_secs: default_collect_interval(),
            cgroup_root: default_cgroup_root(),
            proc_root: default_proc_root(),
            collect_pods: default_collect_pods(),
            default_namespace: default_namespace(),
            scope_assignments_path: None,
        }))
    }
}
