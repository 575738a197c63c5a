//! Integration tests for host and workload sampling
//!
//! These tests run against a mock procfs/cgroup tree so parsing and
//! per-source failure isolation can be exercised without a real kernel
//! counter hierarchy.

#[cfg(test)]
mod mock_host_tests {
    use crate::collector::{
        HostSampler, PodSampler, SampleSink, SamplerConfig, SamplerLoop, ScopeMetadata,
        ScopeRegistry, SourceStatus,
    };
    use crate::models::{NodeSample, PodSample};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tokio::fs;

    /// Helper to create a mock cgroup controller tree
    async fn create_mock_cgroup(temp_dir: &TempDir) -> PathBuf {
        let cgroup_root = temp_dir.path().join("cgroup");

        let cpuacct = cgroup_root.join("cpu,cpuacct");
        fs::create_dir_all(&cpuacct).await.unwrap();
        fs::write(cpuacct.join("cpuacct.usage"), "1234567890\n")
            .await
            .unwrap();

        let blkio = cgroup_root.join("blkio");
        fs::create_dir_all(&blkio).await.unwrap();
        let service_bytes = r#"8:0 Read 135245
8:0 Write 24621
8:0 Sync 100
Total 160000
"#;
        fs::write(blkio.join("blkio.throttle.io_service_bytes"), service_bytes)
            .await
            .unwrap();

        cgroup_root
    }

    /// Helper to create a mock proc tree
    async fn create_mock_proc(temp_dir: &TempDir) -> PathBuf {
        let proc_root = temp_dir.path().join("proc");
        fs::create_dir_all(proc_root.join("net")).await.unwrap();

        let meminfo = r#"MemTotal:        2048000 kB
MemFree:         1024000 kB
Buffers:          128000 kB
Cached:           256000 kB
"#;
        fs::write(proc_root.join("meminfo"), meminfo).await.unwrap();

        let net_dev = r#"Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
  eth0:  123456     100    0    0    0     0          0         0   223344     150    0    0    0     0       0          0
"#;
        fs::write(proc_root.join("net/dev"), net_dev).await.unwrap();

        proc_root
    }

    /// Helper to add one workload scope to the mock cgroup tree
    async fn add_mock_scope(cgroup_root: &PathBuf, scope: &str) {
        let cpu_dir = cgroup_root.join("cpu,cpuacct").join(scope);
        fs::create_dir_all(&cpu_dir).await.unwrap();
        fs::write(cpu_dir.join("cpuacct.usage"), "555000000\n")
            .await
            .unwrap();

        let mem_dir = cgroup_root.join("memory").join(scope);
        fs::create_dir_all(&mem_dir).await.unwrap();
        fs::write(mem_dir.join("memory.usage_in_bytes"), "134217728\n")
            .await
            .unwrap();

        let blkio_dir = cgroup_root.join("blkio").join(scope);
        fs::create_dir_all(&blkio_dir).await.unwrap();
        fs::write(
            blkio_dir.join("blkio.throttle.io_service_bytes"),
            "8:0 Read 1024\n8:0 Write 2048\n",
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_sample_node_with_all_sources() {
        let temp_dir = TempDir::new().unwrap();
        let cgroup_root = create_mock_cgroup(&temp_dir).await;
        let proc_root = create_mock_proc(&temp_dir).await;

        let sampler = HostSampler::with_roots("test-node", &cgroup_root, &proc_root);
        let (sample, report) = sampler.sample_node().await;

        assert_eq!(sample.node, "test-node");
        assert_eq!(sample.cpu_accumulated_ns, Some(1234567890));
        assert!(sample.cpu_usage.is_none());

        let memory = sample.memory.unwrap();
        assert_eq!(memory.total_kb, 2048000);
        assert_eq!(memory.free_kb, 1024000);
        assert_eq!(memory.used_kb, 2048000 - 1024000 - 128000 - 256000);

        let network = sample.network.unwrap();
        assert_eq!(network.rx_bytes, 123456);
        assert_eq!(network.tx_bytes, 223344);

        let disk = sample.disk.unwrap();
        assert_eq!(disk.read_bytes, 135245);
        assert_eq!(disk.write_bytes, 24621);

        assert!(!report.degraded());
    }

    #[tokio::test]
    async fn test_sample_node_tolerates_missing_meminfo() {
        let temp_dir = TempDir::new().unwrap();
        let cgroup_root = create_mock_cgroup(&temp_dir).await;
        let proc_root = create_mock_proc(&temp_dir).await;
        fs::remove_file(proc_root.join("meminfo")).await.unwrap();

        let sampler = HostSampler::with_roots("test-node", &cgroup_root, &proc_root);
        let (sample, report) = sampler.sample_node().await;

        // The failed source stays absent; the other three still populate
        assert!(sample.memory.is_none());
        assert!(sample.cpu_accumulated_ns.is_some());
        assert!(sample.network.is_some());
        assert!(sample.disk.is_some());

        assert_eq!(report.memory, SourceStatus::Unavailable);
        assert_eq!(report.cpu, SourceStatus::Ok);
        assert!(report.degraded());
        assert!(!report.all_unavailable());
    }

    #[tokio::test]
    async fn test_sample_node_with_no_sources_at_all() {
        let temp_dir = TempDir::new().unwrap();

        let sampler = HostSampler::with_roots(
            "bare-node",
            temp_dir.path().join("missing-cgroup"),
            temp_dir.path().join("missing-proc"),
        );
        let (sample, report) = sampler.sample_node().await;

        // Still a valid sample carrying identity and capture time
        assert_eq!(sample.node, "bare-node");
        assert!(sample.cpu_accumulated_ns.is_none());
        assert!(sample.memory.is_none());
        assert!(sample.network.is_none());
        assert!(sample.disk.is_none());
        assert!(report.all_unavailable());
    }

    #[tokio::test]
    async fn test_discover_scopes_finds_pod_directories() {
        let temp_dir = TempDir::new().unwrap();
        let cgroup_root = create_mock_cgroup(&temp_dir).await;

        add_mock_scope(&cgroup_root, "mypod-1.scope").await;
        add_mock_scope(&cgroup_root, "kubepods-pod2.slice").await;
        fs::create_dir_all(cgroup_root.join("cpu,cpuacct/system.slice"))
            .await
            .unwrap();

        let sampler = PodSampler::new("test-node", &cgroup_root);
        let mut scopes = sampler.discover_scopes().await.unwrap();
        scopes.sort();

        assert_eq!(scopes, vec!["kubepods-pod2.slice", "mypod-1.scope"]);
    }

    #[tokio::test]
    async fn test_sample_scope_reads_counters_and_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let cgroup_root = create_mock_cgroup(&temp_dir).await;
        add_mock_scope(&cgroup_root, "web-12345.scope").await;

        let registry = ScopeRegistry::new("default");
        registry.annotate(
            "web-12345",
            ScopeMetadata {
                namespace: "prod".to_string(),
                deployment: Some("web".to_string()),
            },
        );

        let sampler = PodSampler::new("test-node", &cgroup_root);
        let sample = sampler.sample_scope("web-12345.scope", &registry).await;

        assert_eq!(sample.pod, "web-12345");
        assert_eq!(sample.node, "test-node");
        assert_eq!(sample.namespace, "prod");
        assert_eq!(sample.deployment.as_deref(), Some("web"));
        assert_eq!(sample.cpu_accumulated_ns, Some(555000000));
        assert_eq!(sample.memory.unwrap().used_bytes, 134217728);
        assert_eq!(sample.disk.unwrap().read_bytes, 1024);
    }

    #[tokio::test]
    async fn test_sample_scope_tolerates_missing_controllers() {
        let temp_dir = TempDir::new().unwrap();
        let cgroup_root = create_mock_cgroup(&temp_dir).await;
        // Scope exists in the CPU hierarchy only
        let cpu_dir = cgroup_root.join("cpu,cpuacct/lonely-pod.scope");
        fs::create_dir_all(&cpu_dir).await.unwrap();
        fs::write(cpu_dir.join("cpuacct.usage"), "42\n").await.unwrap();

        let registry = ScopeRegistry::new("default");
        let sampler = PodSampler::new("test-node", &cgroup_root);
        let sample = sampler.sample_scope("lonely-pod.scope", &registry).await;

        assert_eq!(sample.cpu_accumulated_ns, Some(42));
        assert!(sample.memory.is_none());
        assert!(sample.disk.is_none());
    }

    /// Sink that records every delivered sample
    #[derive(Default)]
    struct RecordingSink {
        nodes: Mutex<Vec<NodeSample>>,
        pods: Mutex<Vec<PodSample>>,
    }

    #[async_trait]
    impl SampleSink for RecordingSink {
        async fn deliver_node(&self, sample: &NodeSample) -> Result<()> {
            self.nodes.lock().unwrap().push(sample.clone());
            Ok(())
        }

        async fn deliver_pod(&self, sample: &PodSample) -> Result<()> {
            self.pods.lock().unwrap().push(sample.clone());
            Ok(())
        }
    }

    /// Sink whose transport always fails
    struct FailingSink;

    #[async_trait]
    impl SampleSink for FailingSink {
        async fn deliver_node(&self, _sample: &NodeSample) -> Result<()> {
            anyhow::bail!("connection refused")
        }

        async fn deliver_pod(&self, _sample: &PodSample) -> Result<()> {
            anyhow::bail!("connection refused")
        }
    }

    fn build_loop(
        cgroup_root: &PathBuf,
        proc_root: &PathBuf,
        sink: Arc<dyn SampleSink>,
    ) -> SamplerLoop {
        SamplerLoop::new(
            HostSampler::with_roots("test-node", cgroup_root, proc_root),
            PodSampler::new("test-node", cgroup_root),
            Arc::new(ScopeRegistry::new("default")),
            sink,
            SamplerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_tick_delivers_node_and_pod_samples() {
        let temp_dir = TempDir::new().unwrap();
        let cgroup_root = create_mock_cgroup(&temp_dir).await;
        let proc_root = create_mock_proc(&temp_dir).await;
        add_mock_scope(&cgroup_root, "mypod-1.scope").await;

        let sink = Arc::new(RecordingSink::default());
        let sampler_loop = build_loop(&cgroup_root, &proc_root, sink.clone());

        let report = sampler_loop.tick().await;

        assert_eq!(report.pods_sampled, 1);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.delivery_failures, 0);
        assert_eq!(sink.nodes.lock().unwrap().len(), 1);
        assert_eq!(sink.pods.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tick_survives_delivery_failure() {
        let temp_dir = TempDir::new().unwrap();
        let cgroup_root = create_mock_cgroup(&temp_dir).await;
        let proc_root = create_mock_proc(&temp_dir).await;
        add_mock_scope(&cgroup_root, "mypod-1.scope").await;

        let sampler_loop = build_loop(&cgroup_root, &proc_root, Arc::new(FailingSink));

        // No retry within the tick; the failures are counted and the tick
        // completes normally
        let report = sampler_loop.tick().await;
        assert_eq!(report.delivered, 0);
        assert_eq!(report.delivery_failures, 2);

        // The next tick re-samples and re-attempts
        let report = sampler_loop.tick().await;
        assert_eq!(report.delivery_failures, 2);
    }

    #[tokio::test]
    async fn test_tick_survives_total_source_loss() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("gone");

        let sink = Arc::new(RecordingSink::default());
        let sampler_loop = build_loop(&missing, &missing, sink.clone());

        let report = sampler_loop.tick().await;

        // Sources gone, scope enumeration gone, but the node sample is
        // still emitted and delivered
        assert!(report.sources.all_unavailable());
        assert_eq!(report.pods_sampled, 0);
        assert_eq!(report.delivered, 1);
        assert_eq!(sink.nodes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_loop_stops_on_shutdown_signal() {
        let temp_dir = TempDir::new().unwrap();
        let cgroup_root = create_mock_cgroup(&temp_dir).await;
        let proc_root = create_mock_proc(&temp_dir).await;

        let sink = Arc::new(RecordingSink::default());
        let sampler_loop = build_loop(&cgroup_root, &proc_root, sink.clone());

        let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
        let handle = tokio::spawn(sampler_loop.run(shutdown_rx));

        // First tick fires immediately; give it a moment, then stop
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(!sink.nodes.lock().unwrap().is_empty());
    }
}
