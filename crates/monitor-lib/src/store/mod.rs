//! In-memory metrics store
//!
//! Retains per-entity sample series in arrival order across four entity
//! kinds (node, pod, namespace, deployment) and serves latest-value and
//! time-windowed queries. Backed by sharded concurrent maps so that appends
//! for one key never block operations on unrelated keys, and a series is
//! created exactly once even under racing first writes.


use crate::error::StoreError;
use crate::models::{
    deployment_key, DeploymentSample, NamespaceSample, NodeSample, PodSample,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::Duration;

/// Per-series retention limits, applied at append time.
///
/// Disabled by default: the store retains every sample for the process
/// lifetime, matching upstream behavior. Production deployments can bound
/// growth per series by age, count, or both.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionPolicy {
    /// Drop samples older than this relative to the append instant
    pub max_age: Option<Duration>,
    /// Keep at most this many samples per series
    pub max_samples: Option<usize>,
}

impl RetentionPolicy {
    /// Retain everything forever
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Keep at most `max` samples per series
    pub fn max_samples(max: usize) -> Self {
        Self {
            max_age: None,
            max_samples: Some(max),
        }
    }

    /// Drop samples older than `age` at append time
    pub fn max_age(age: Duration) -> Self {
        Self {
            max_age: Some(age),
            max_samples: None,
        }
    }

    fn apply<T: Timestamped>(&self, series: &mut Vec<T>) {
        if let Some(max) = self.max_samples {
            if series.len() > max {
                let excess = series.len() - max;
                series.drain(..excess);
            }
        }
        if let Some(age) = self.max_age {
            // An age beyond the representable time range never expires anything.
            if let Some(delta) = checked_seconds(age.as_secs()) {
                let cutoff = Utc::now() - delta;
                let keep_from = series
                    .iter()
                    .position(|s| s.timestamp() >= cutoff)
                    .unwrap_or(series.len());
                series.drain(..keep_from);
            }
        }
    }
}

/// Second counts come in as caller-supplied `u64`s; chrono durations top
/// out well below that. `None` means the count exceeds the representable
/// range, which every caller treats as "wider than any sample's age".
fn checked_seconds(secs: u64) -> Option<ChronoDuration> {
    i64::try_from(secs).ok().and_then(ChronoDuration::try_seconds)
}

/// Capture-time accessor shared by all sample kinds
trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timestamped for NodeSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for PodSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for NamespaceSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for DeploymentSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// One entity kind's key -> series mapping
///
/// Appends and scans hold only the shard lock for the touched key; nothing
/// slower than a clone happens inside a locked section.
struct SeriesMap<T> {
    series: DashMap<String, Vec<T>>,
    retention: RetentionPolicy,
}

impl<T: Clone + Timestamped> SeriesMap<T> {
    fn new(retention: RetentionPolicy) -> Self {
        Self {
            series: DashMap::new(),
            retention,
        }
    }

    /// Append in arrival order, creating the series lazily.
    /// The entry API guarantees exactly one series backs each key even when
    /// two first writes race.
    fn append(&self, key: String, sample: T) {
        let mut entry = self.series.entry(key).or_default();
        entry.push(sample);
        self.retention.apply(&mut entry);
    }

    fn latest(&self, key: &str) -> Result<T, StoreError> {
        self.series
            .get(key)
            .and_then(|s| s.last().cloned())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// All samples within `window_secs` of the current instant, arrival
    /// order preserved. The cutoff is wall-clock now, never the newest
    /// sample's timestamp: a stalled producer yields an empty result, not
    /// silently stale data.
    fn window(&self, key: &str, window_secs: u64) -> Result<Vec<T>, StoreError> {
        if window_secs == 0 {
            return Err(StoreError::InvalidArgument(
                "window must be a positive number of seconds".to_string(),
            ));
        }
        let series = self
            .series
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        // A window wider than the representable time range covers every
        // sample, so it degrades to the full-history result instead of
        // overflowing the cutoff arithmetic.
        let cutoff = match checked_seconds(window_secs) {
            Some(delta) => Utc::now() - delta,
            None => return Ok(series.value().clone()),
        };
        Ok(series
            .iter()
            .filter(|s| s.timestamp() >= cutoff)
            .cloned()
            .collect())
    }

    /// Full-history dump for one key (the explicit no-window contract)
    fn full(&self, key: &str) -> Result<Vec<T>, StoreError> {
        self.series
            .get(key)
            .map(|s| s.value().clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Latest sample per non-empty series. Empty series stay invisible.
    fn latest_each(&self) -> HashMap<String, T> {
        self.series
            .iter()
            .filter_map(|entry| {
                entry
                    .value()
                    .last()
                    .cloned()
                    .map(|s| (entry.key().clone(), s))
            })
            .collect()
    }

    /// Full-history dump per non-empty series (debug/enumeration path)
    fn all(&self) -> HashMap<String, Vec<T>> {
        self.series
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

/// Queryable per-entity retention of usage samples
///
/// Constructed explicitly and injected into every handler and collector
/// entry point; there is no ambient singleton. Samples are appended exactly
/// once, never mutated or removed (unless a retention policy is enabled),
/// and served back by latest-value, windowed, or full-history queries.
pub struct MetricsStore {
    nodes: SeriesMap<NodeSample>,
    pods: SeriesMap<PodSample>,
    namespaces: SeriesMap<NamespaceSample>,
    deployments: SeriesMap<DeploymentSample>,
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsStore {
    /// Create a store that retains every sample for the process lifetime
    pub fn new() -> Self {
        Self::with_retention(RetentionPolicy::unbounded())
    }

    /// Create a store with a per-series retention policy
    pub fn with_retention(retention: RetentionPolicy) -> Self {
        Self {
            nodes: SeriesMap::new(retention),
            pods: SeriesMap::new(retention),
            namespaces: SeriesMap::new(retention),
            deployments: SeriesMap::new(retention),
        }
    }

    // ----- node series -----

    /// Append a node sample under its declared key
    pub fn add_node(&self, node_name: &str, sample: NodeSample) -> Result<(), StoreError> {
        if sample.node.is_empty() {
            return Err(StoreError::Validation(
                "node identity must be non-empty".to_string(),
            ));
        }
        if sample.node != node_name {
            return Err(StoreError::Validation(format!(
                "sample declares node {:?} but was posted under {:?}",
                sample.node, node_name
            )));
        }
        self.nodes.append(sample.node.clone(), sample);
        Ok(())
    }

    pub fn latest_node(&self, node: &str) -> Result<NodeSample, StoreError> {
        self.nodes.latest(node)
    }

    pub fn query_node(&self, node: &str, window_secs: u64) -> Result<Vec<NodeSample>, StoreError> {
        self.nodes.window(node, window_secs)
    }

    pub fn node_series(&self, node: &str) -> Result<Vec<NodeSample>, StoreError> {
        self.nodes.full(node)
    }

    pub fn latest_nodes(&self) -> HashMap<String, NodeSample> {
        self.nodes.latest_each()
    }

    pub fn all_nodes(&self) -> HashMap<String, Vec<NodeSample>> {
        self.nodes.all()
    }

    // ----- pod series -----

    /// Append a pod sample under its declared key.
    ///
    /// The pod key is the bare pod name, kept flat for compatibility with
    /// upstream producers even though it collides across namespaces; see
    /// [`Self::latest_pod_in_namespace`] for the composite lookup.
    pub fn add_pod(&self, pod_name: &str, sample: PodSample) -> Result<(), StoreError> {
        if sample.pod.is_empty() || sample.namespace.is_empty() || sample.node.is_empty() {
            return Err(StoreError::Validation(
                "pod identity requires non-empty pod, namespace and node".to_string(),
            ));
        }
        if sample.pod != pod_name {
            return Err(StoreError::Validation(format!(
                "sample declares pod {:?} but was posted under {:?}",
                sample.pod, pod_name
            )));
        }
        self.pods.append(sample.pod.clone(), sample);
        Ok(())
    }

    pub fn latest_pod(&self, pod: &str) -> Result<PodSample, StoreError> {
        self.pods.latest(pod)
    }

    /// Namespace-scoped pod lookup, added alongside the flat key scheme as
    /// a non-breaking alternative
    pub fn latest_pod_in_namespace(
        &self,
        namespace: &str,
        pod: &str,
    ) -> Result<PodSample, StoreError> {
        let sample = self.pods.latest(pod)?;
        if sample.namespace == namespace {
            Ok(sample)
        } else {
            Err(StoreError::NotFound(format!("{}/{}", namespace, pod)))
        }
    }

    pub fn query_pod(&self, pod: &str, window_secs: u64) -> Result<Vec<PodSample>, StoreError> {
        self.pods.window(pod, window_secs)
    }

    pub fn pod_series(&self, pod: &str) -> Result<Vec<PodSample>, StoreError> {
        self.pods.full(pod)
    }

    pub fn latest_pods(&self) -> HashMap<String, PodSample> {
        self.pods.latest_each()
    }

    pub fn all_pods(&self) -> HashMap<String, Vec<PodSample>> {
        self.pods.all()
    }

    // ----- namespace series -----

    pub fn add_namespace(
        &self,
        ns_name: &str,
        sample: NamespaceSample,
    ) -> Result<(), StoreError> {
        if sample.namespace.is_empty() {
            return Err(StoreError::Validation(
                "namespace identity must be non-empty".to_string(),
            ));
        }
        if sample.namespace != ns_name {
            return Err(StoreError::Validation(format!(
                "sample declares namespace {:?} but was posted under {:?}",
                sample.namespace, ns_name
            )));
        }
        self.namespaces.append(sample.namespace.clone(), sample);
        Ok(())
    }

    pub fn latest_namespace(&self, ns: &str) -> Result<NamespaceSample, StoreError> {
        self.namespaces.latest(ns)
    }

    pub fn query_namespace(
        &self,
        ns: &str,
        window_secs: u64,
    ) -> Result<Vec<NamespaceSample>, StoreError> {
        self.namespaces.window(ns, window_secs)
    }

    pub fn namespace_series(&self, ns: &str) -> Result<Vec<NamespaceSample>, StoreError> {
        self.namespaces.full(ns)
    }

    pub fn latest_namespaces(&self) -> HashMap<String, NamespaceSample> {
        self.namespaces.latest_each()
    }

    pub fn all_namespaces(&self) -> HashMap<String, Vec<NamespaceSample>> {
        self.namespaces.all()
    }

    // ----- deployment series -----

    /// Append a deployment sample under its declared composite key
    pub fn add_deployment(
        &self,
        ns_name: &str,
        dp_name: &str,
        sample: DeploymentSample,
    ) -> Result<(), StoreError> {
        if sample.namespace.is_empty() || sample.deployment.is_empty() {
            return Err(StoreError::Validation(
                "deployment identity requires non-empty namespace and deployment".to_string(),
            ));
        }
        if sample.namespace != ns_name || sample.deployment != dp_name {
            return Err(StoreError::Validation(format!(
                "sample declares deployment {:?} but was posted under {:?}",
                deployment_key(&sample.namespace, &sample.deployment),
                deployment_key(ns_name, dp_name)
            )));
        }
        let key = deployment_key(&sample.namespace, &sample.deployment);
        self.deployments.append(key, sample);
        Ok(())
    }

    pub fn latest_deployment(
        &self,
        ns: &str,
        dp: &str,
    ) -> Result<DeploymentSample, StoreError> {
        self.deployments.latest(&deployment_key(ns, dp))
    }

    pub fn query_deployment(
        &self,
        ns: &str,
        dp: &str,
        window_secs: u64,
    ) -> Result<Vec<DeploymentSample>, StoreError> {
        self.deployments.window(&deployment_key(ns, dp), window_secs)
    }

    pub fn deployment_series(
        &self,
        ns: &str,
        dp: &str,
    ) -> Result<Vec<DeploymentSample>, StoreError> {
        self.deployments.full(&deployment_key(ns, dp))
    }

    pub fn latest_deployments(&self) -> HashMap<String, DeploymentSample> {
        self.deployments.latest_each()
    }

    pub fn all_deployments(&self) -> HashMap<String, Vec<DeploymentSample>> {
        self.deployments.all()
    }

    // ----- hierarchical filters -----
    //
    // Read-only derived views over the latest-per-entity snapshot, computed
    // per call, O(number of entities of that kind).

    /// Latest sample of every pod currently assigned to `node`
    pub fn pods_by_node(&self, node: &str) -> HashMap<String, PodSample> {
        self.pods
            .latest_each()
            .into_iter()
            .filter(|(_, s)| s.node == node)
            .collect()
    }

    /// Latest sample of every pod in `namespace`
    pub fn pods_by_namespace(&self, namespace: &str) -> HashMap<String, PodSample> {
        self.pods
            .latest_each()
            .into_iter()
            .filter(|(_, s)| s.namespace == namespace)
            .collect()
    }

    /// Latest sample of every pod belonging to a deployment
    pub fn pods_by_deployment(
        &self,
        namespace: &str,
        deployment: &str,
    ) -> HashMap<String, PodSample> {
        self.pods
            .latest_each()
            .into_iter()
            .filter(|(_, s)| {
                s.namespace == namespace && s.deployment.as_deref() == Some(deployment)
            })
            .collect()
    }

    /// Latest sample of every deployment in `namespace`, keyed by the
    /// composite deployment key
    pub fn deployments_by_namespace(
        &self,
        namespace: &str,
    ) -> HashMap<String, DeploymentSample> {
        self.deployments
            .latest_each()
            .into_iter()
            .filter(|(_, s)| s.namespace == namespace)
            .collect()
    }
}
