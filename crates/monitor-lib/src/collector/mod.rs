//! Host and workload usage sampling
//!
//! Translates kernel-exposed counters (cgroup CPU accounting, host meminfo,
//! per-interface network statistics, cgroup block I/O accounting) into
//! structured samples, one per tracked entity per tick. Every counter
//! source can be missing or malformed on a given host; a source failure is
//! isolated to its field and never aborts the tick.

mod host;
mod pods;
mod r#loop;

#[cfg(test)]
mod tests;

pub use host::HostSampler;
pub use pods::{PodSampler, ScopeMetadata, ScopeRegistry};
pub use r#loop::{SampleSink, SamplerConfig, SamplerLoop, TickReport};

pub use async_trait::async_trait;

/// Outcome of one counter source read within a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceStatus {
    /// The source was read and parsed
    Ok,
    /// The source was missing, unreadable or unparseable this tick; the
    /// corresponding sample field is left unset
    #[default]
    Unavailable,
}

/// Per-source outcomes for one node sample
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceReport {
    pub cpu: SourceStatus,
    pub memory: SourceStatus,
    pub network: SourceStatus,
    pub disk: SourceStatus,
}

impl SourceReport {
    /// At least one source failed this tick
    pub fn degraded(&self) -> bool {
        [self.cpu, self.memory, self.network, self.disk]
            .iter()
            .any(|s| *s == SourceStatus::Unavailable)
    }

    /// Every source failed this tick
    pub fn all_unavailable(&self) -> bool {
        [self.cpu, self.memory, self.network, self.disk]
            .iter()
            .all(|s| *s == SourceStatus::Unavailable)
    }
}
