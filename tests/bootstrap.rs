use std::sync::Arc;
use std::time::Duration;

use committee_bootstrap::address::{AddressScheme, KeyAddress};
use committee_bootstrap::audit;
use committee_bootstrap::config::{BootstrapConfig, CommitteeConfig, DialConfig, NodeEndpoint};
use committee_bootstrap::dkg::{DkgError, DkgRound};
use committee_bootstrap::events::WaitMode;
use committee_bootstrap::ledger::{LedgerError, MemoryLedger, RequestArgs};
use committee_bootstrap::node::{http, FaultyNode, LocalNode, Method, RecordStore};
use committee_bootstrap::protocol::bootstrap::BootstrapFailure;
use committee_bootstrap::registry::{CommitteeRegistry, NodeRole};
use committee_bootstrap::rpc::{NodeApi, NodeError};
use committee_bootstrap::{BootstrapParams, BootstrapState, ChainBootstrap};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config() -> BootstrapConfig {
    BootstrapConfig {
        rpc_timeout_ms: 3_000,
        event_timeout_ms: 3_000,
        ledger_timeout_ms: 2_000,
        dial: DialConfig {
            max_attempts: 3,
            initial_backoff_ms: 20,
            max_backoff_ms: 100,
            connect_timeout_ms: 500,
        },
        ..BootstrapConfig::default()
    }
}

/// In-process committee. Every node is reached through a `FaultyNode`.
struct Committee {
    nodes: Vec<Arc<LocalNode>>,
    faults: Vec<Arc<FaultyNode>>,
    access: Vec<Arc<LocalNode>>,
    access_faults: Vec<Arc<FaultyNode>>,
    registry: Arc<CommitteeRegistry>,
}

async fn local_node() -> Arc<LocalNode> {
    Arc::new(LocalNode::bind("127.0.0.1:0", RecordStore::in_memory()).await.unwrap())
}

async fn committee(n: usize, access: usize) -> Committee {
    let mut registry = CommitteeRegistry::new();
    let (mut nodes, mut faults) = (Vec::new(), Vec::new());
    for i in 0..n {
        let node = local_node().await;
        let faulty = Arc::new(FaultyNode::new(node.clone()));
        registry = registry.with_committee_node(format!("node-{}", i), node.event_addr().to_string(), faulty.clone());
        nodes.push(node);
        faults.push(faulty);
    }
    let (mut access_nodes, mut access_faults) = (Vec::new(), Vec::new());
    for i in 0..access {
        let node = local_node().await;
        let faulty = Arc::new(FaultyNode::new(node.clone()));
        registry = registry.with_access_node(format!("access-{}", i), node.event_addr().to_string(), faulty.clone());
        access_nodes.push(node);
        access_faults.push(faulty);
    }
    Committee {
        nodes,
        faults,
        access: access_nodes,
        access_faults,
        registry: Arc::new(registry),
    }
}

fn params() -> BootstrapParams {
    BootstrapParams::new("owner-1", 3)
        .with_description("test chain")
        .with_args(RequestArgs::new().with_int("fee", 10))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bootstrap_reaches_confirmed() {
    init_logging();
    let c = committee(4, 1).await;
    let ledger = Arc::new(MemoryLedger::new(Duration::from_millis(20)));
    let bootstrap = ChainBootstrap::new(c.registry.clone(), ledger.clone(), config());

    let outcome = bootstrap.bootstrap(&params()).await.unwrap();
    assert_eq!(outcome.address.scheme(), AddressScheme::Threshold);
    assert!(outcome.access_failures.is_none());
    assert_eq!(ledger.anchored(&outcome.address), Some(outcome.anchor.clone()));

    let chain_id = outcome.address.to_string();
    assert_eq!(outcome.record.chain_id, chain_id);
    assert_eq!(outcome.record.derived_color, outcome.anchor.color);
    assert_eq!(outcome.record.committee_nodes, c.registry.committee_api_addresses());
    for node in c.nodes.iter().chain(c.access.iter()) {
        let stored = node.record(&chain_id).unwrap();
        assert_eq!(stored, outcome.record);
        assert_eq!(stored.address().unwrap(), outcome.address);
    }
    for node in &c.nodes {
        assert!(node.is_active(&chain_id));
        assert!(node.keys().has_key(&outcome.address));
    }

    let keys = audit::check_committee(&c.registry, &outcome.address, Duration::from_secs(2)).await;
    assert!(keys.passed, "{}", keys);
    let records = audit::check_records(&c.registry, &chain_id, Duration::from_secs(2)).await;
    assert!(records.passed, "{}", records);
    assert_eq!(records.entries.len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unreachable_node_aborts_replication_and_resumes() {
    init_logging();
    let c = committee(4, 0).await;
    let ledger = Arc::new(MemoryLedger::default());
    let bootstrap = ChainBootstrap::new(c.registry.clone(), ledger.clone(), config());

    c.faults[3].fail_with(Method::PutCommitteeRecord, NodeError::Unreachable("connection refused".into()));
    let err = bootstrap.bootstrap(&params()).await.unwrap_err();

    assert_eq!(err.last_state(), BootstrapState::LedgerAnchored);
    assert_eq!(err.target, BootstrapState::ConfigReplicated);
    assert_eq!(err.failed_nodes(), vec![3]);
    match &err.failure {
        BootstrapFailure::Nodes(failure) => {
            assert_eq!(failure.failures.len(), 1);
            assert_eq!(failure.failures[0].role, NodeRole::Committee);
            assert_eq!(failure.failures[0].address, "node-3");
            assert!(failure.failures[0].error.is_transient());
        }
        other => panic!("unexpected failure {:?}", other),
    }
    let address = err.progress.address.unwrap();
    assert!(c.nodes[3].record(&address.to_string()).is_none());

    // Resume without repeating key generation or anchoring.
    c.faults[3].heal();
    let outcome = bootstrap.resume(&params(), err.progress).await.unwrap();
    assert_eq!(outcome.address, address);
    assert_eq!(ledger.anchor_count(), 1);
    for node in &c.nodes {
        assert_eq!(node.record(&address.to_string()), Some(outcome.record.clone()));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mismatched_commit_address_fails() {
    init_logging();
    let c = committee(4, 0).await;
    let ledger = Arc::new(MemoryLedger::default());
    let bootstrap = ChainBootstrap::new(c.registry.clone(), ledger.clone(), config());

    let forged = KeyAddress::new(AddressScheme::Threshold, [7u8; 32]);
    c.faults[2].override_commit_address(forged.to_string());
    let err = bootstrap.bootstrap(&params()).await.unwrap_err();

    assert_eq!(err.last_state(), BootstrapState::Idle);
    assert!(err.progress.address.is_none());
    assert_eq!(err.failed_nodes(), vec![2]);
    assert!(matches!(
        err.failure,
        BootstrapFailure::Dkg(DkgError::ProtocolViolation { round: DkgRound::Commit, node: 2, .. })
    ));
    assert_eq!(ledger.anchor_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_non_threshold_address_rejected() {
    init_logging();
    let c = committee(3, 0).await;
    let bootstrap = ChainBootstrap::new(c.registry.clone(), Arc::new(MemoryLedger::default()), config());

    let single = KeyAddress::new(AddressScheme::Single, [1u8; 32]);
    for faulty in &c.faults {
        faulty.override_commit_address(single.to_string());
    }
    let err = bootstrap.bootstrap(&BootstrapParams::new("owner", 2)).await.unwrap_err();
    match err.failure {
        BootstrapFailure::Dkg(DkgError::ProtocolViolation { round, node, reason }) => {
            assert_eq!(round, DkgRound::Commit);
            assert_eq!(node, 0);
            assert!(reason.contains("not a threshold key"), "{}", reason);
        }
        other => panic!("unexpected failure {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dkg_round_failure_is_fatal() {
    init_logging();
    let c = committee(4, 0).await;
    let bootstrap = ChainBootstrap::new(c.registry.clone(), Arc::new(MemoryLedger::default()), config());

    c.faults[1].fail(Method::AggregateKey);
    let err = bootstrap.bootstrap(&params()).await.unwrap_err();
    assert_eq!(err.last_state(), BootstrapState::Idle);
    assert_eq!(err.failed_nodes(), vec![1]);
    assert!(matches!(
        err.failure,
        BootstrapFailure::Dkg(DkgError::RoundFailed { round: DkgRound::Aggregation, .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_node_times_out_round() {
    init_logging();
    let c = committee(3, 0).await;
    let config = BootstrapConfig { rpc_timeout_ms: 200, ..config() };
    let bootstrap = ChainBootstrap::new(c.registry.clone(), Arc::new(MemoryLedger::default()), config);

    c.faults[0].set_delay(Some(Duration::from_millis(600)));
    let err = bootstrap.bootstrap(&BootstrapParams::new("owner", 2)).await.unwrap_err();
    match err.failure {
        BootstrapFailure::Dkg(DkgError::RoundFailed { round, failures }) => {
            assert_eq!(round, DkgRound::ShareGeneration);
            assert_eq!(failures.failures.len(), 1);
            assert_eq!(failures.failures[0].index, 0);
            assert_eq!(failures.failures[0].error, NodeError::Timeout);
        }
        other => panic!("unexpected failure {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ledger_rejection_then_resume() {
    init_logging();
    let c = committee(4, 0).await;
    let ledger = Arc::new(MemoryLedger::default());
    let bootstrap = ChainBootstrap::new(c.registry.clone(), ledger.clone(), config());

    ledger.set_reject(true);
    let err = bootstrap.bootstrap(&params()).await.unwrap_err();
    assert_eq!(err.last_state(), BootstrapState::KeysGenerated);
    assert!(matches!(err.failure, BootstrapFailure::Ledger(LedgerError::Rejected(_))));
    let address = err.progress.address.unwrap();

    ledger.set_reject(false);
    let outcome = bootstrap.resume(&params(), err.progress).await.unwrap();
    assert_eq!(outcome.address, address);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_access_node_failure_is_not_fatal() {
    init_logging();
    let c = committee(4, 2).await;
    let bootstrap = ChainBootstrap::new(c.registry.clone(), Arc::new(MemoryLedger::default()), config());

    c.access_faults[1].set_unreachable(true);
    let outcome = bootstrap.bootstrap(&params()).await.unwrap();

    let failures = outcome.access_failures.unwrap();
    assert_eq!(failures.failed_indices(NodeRole::Access), vec![1]);
    assert!(failures.failed_indices(NodeRole::Committee).is_empty());
    let chain_id = outcome.address.to_string();
    assert!(c.access[0].record(&chain_id).is_some());
    assert!(c.access[1].record(&chain_id).is_none());

    // The unreachable replica is reported but does not fail the audit.
    let records = audit::check_records(&c.registry, &chain_id, Duration::from_secs(2)).await;
    assert!(records.passed, "{}", records);
    assert_eq!(records.unreachable().count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_replication_is_idempotent() {
    init_logging();
    let c = committee(4, 0).await;
    let bootstrap = ChainBootstrap::new(c.registry.clone(), Arc::new(MemoryLedger::default()), config());
    let outcome = bootstrap.bootstrap(&params()).await.unwrap();
    let chain_id = outcome.address.to_string();

    for (node, faulty) in c.nodes.iter().zip(&c.faults) {
        let before = serde_json::to_vec(&node.record(&chain_id).unwrap()).unwrap();
        faulty.put_committee_record(outcome.record.clone()).await.unwrap();
        let after = serde_json::to_vec(&node.record(&chain_id).unwrap()).unwrap();
        assert_eq!(before, after);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_silent_node_blocks_confirmation() {
    init_logging();
    let mut registry = CommitteeRegistry::new();
    let mut nodes = Vec::new();
    for i in 0..3 {
        let delay = if i == 1 { Duration::from_secs(30) } else { Duration::from_millis(20) };
        let node = Arc::new(
            LocalNode::bind("127.0.0.1:0", RecordStore::in_memory())
                .await
                .unwrap()
                .with_activation_delay(delay),
        );
        registry = registry.with_committee_node(format!("node-{}", i), node.event_addr().to_string(), node.clone());
        nodes.push(node);
    }
    let registry = Arc::new(registry);
    let config = BootstrapConfig { event_timeout_ms: 500, ..config() };
    let bootstrap = ChainBootstrap::new(registry.clone(), Arc::new(MemoryLedger::default()), config.clone());

    let err = bootstrap.bootstrap(&BootstrapParams::new("owner", 2)).await.unwrap_err();
    assert_eq!(err.last_state(), BootstrapState::Activated);
    assert_eq!(err.target, BootstrapState::Confirmed);
    assert_eq!(err.failed_nodes(), vec![1]);

    // Two of three is a quorum.
    let quorum = BootstrapConfig { confirm_mode: WaitMode::Quorum, ..config };
    let bootstrap = ChainBootstrap::new(registry, Arc::new(MemoryLedger::default()), quorum);
    let outcome = bootstrap.resume(&BootstrapParams::new("owner", 2), err.progress).await.unwrap();
    assert!(nodes[0].is_active(&outcome.address.to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bootstrap_over_http() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let mut nodes = Vec::new();
    let mut servers = Vec::new();
    let mut endpoints = Vec::new();
    for i in 0..4 {
        let store = RecordStore::open(dir.path().join(format!("node-{}", i))).unwrap();
        let node = Arc::new(LocalNode::bind("127.0.0.1:0", store).await.unwrap());
        let (api_addr, server) = http::bind("127.0.0.1:0", node.clone()).await.unwrap();
        endpoints.push(NodeEndpoint {
            api: format!("http://{}", api_addr),
            events: node.event_addr().to_string(),
        });
        nodes.push(node);
        servers.push(server);
    }
    let committee = CommitteeConfig { nodes: endpoints, access_nodes: Vec::new() };
    let config = config();
    let registry = Arc::new(CommitteeRegistry::connect_http(&committee, config.rpc_timeout()).unwrap());
    let bootstrap = ChainBootstrap::new(registry.clone(), Arc::new(MemoryLedger::default()), config);

    let outcome = bootstrap.bootstrap(&params()).await.unwrap();
    let chain_id = outcome.address.to_string();
    for node in &nodes {
        assert_eq!(node.record(&chain_id), Some(outcome.record.clone()));
    }
    assert_eq!(outcome.record.committee_nodes[0], committee.nodes[0].api);

    // Records survive a restart of the store.
    let reopened = RecordStore::open(dir.path().join("node-2")).unwrap();
    assert_eq!(reopened.get(&chain_id), Some(outcome.record.clone()));

    let report = audit::check_committee(&registry, &outcome.address, Duration::from_secs(2)).await;
    assert!(report.passed, "{}", report);

    for server in servers {
        server.abort();
    }
}
