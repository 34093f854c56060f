//! # Replication End-to-End Tests
//!
//! Drives `ReplicatedStore` against a `MockChain` and wiremock-backed
//! providers that actually keep what they are sent.
//!
//! ## Test Categories
//! - A. Round trip and key table
//! - B. Placement and fallback
//! - C. Blacklist
//! - D. Retrieval order
//! - E. Cancellation, timeouts, and serialization

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use pinset_chain::MockChain;
use pinset_common::{ContentRoot, ReplicationConfig};
use pinset_replicator::{
    KvStore, ProviderRegistry, ReplicatedStore, ReplicationError, StoreError,
    CAPACITY_REJECTION_MARKER,
};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

// ════════════════════════════════════════════════════════════════════════════
// TEST HELPERS
// ════════════════════════════════════════════════════════════════════════════

type Blobs = Arc<Mutex<HashMap<String, Vec<u8>>>>;

#[derive(Clone, Copy)]
enum Behavior {
    Accept,
    AcceptSlowly(Duration),
    Capacity,
    Broken,
    WrongNetwork,
}

/// A provider node: health endpoint, storing upload endpoint, download endpoint.
struct FakeProvider {
    server: MockServer,
    blobs: Blobs,
}

impl FakeProvider {
    async fn start(behavior: Behavior) -> Self {
        let server = MockServer::start().await;
        let blobs: Blobs = Arc::new(Mutex::new(HashMap::new()));

        let network = match behavior {
            Behavior::WrongNetwork => "lupulella-2",
            _ => "jackal-1",
        };
        Mock::given(method("GET"))
            .and(path("/version"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!(r#"{{"chain-id":"{network}","version":"1.0"}}"#)),
            )
            .mount(&server)
            .await;

        let upload = Mock::given(method("POST")).and(path("/upload"));
        match behavior {
            Behavior::Accept | Behavior::WrongNetwork => {
                upload
                    .respond_with(StoreUpload { blobs: blobs.clone(), delay: Duration::ZERO })
                    .mount(&server)
                    .await
            }
            Behavior::AcceptSlowly(delay) => {
                upload
                    .respond_with(StoreUpload { blobs: blobs.clone(), delay })
                    .mount(&server)
                    .await
            }
            Behavior::Capacity => {
                upload
                    .respond_with(ResponseTemplate::new(500).set_body_string(format!(
                        r#"{{"error":"{}"}}"#,
                        CAPACITY_REJECTION_MARKER
                    )))
                    .mount(&server)
                    .await
            }
            Behavior::Broken => {
                upload
                    .respond_with(
                        ResponseTemplate::new(500).set_body_string(r#"{"error":"disk failure"}"#),
                    )
                    .mount(&server)
                    .await
            }
        }

        Mock::given(method("GET"))
            .and(path_regex("^/download/[0-9a-f]{64}$"))
            .respond_with(ServeDownload { blobs: blobs.clone() })
            .mount(&server)
            .await;

        Self { server, blobs }
    }

    fn uri(&self) -> String {
        self.server.uri()
    }

    fn holds(&self, root: &ContentRoot) -> bool {
        self.blobs.lock().contains_key(&root.to_hex())
    }

    async fn count(&self, verb: &str, prefix: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == verb && r.url.path().starts_with(prefix))
            .count()
    }

    async fn uploads(&self) -> usize {
        self.count("POST", "/upload").await
    }

    async fn downloads(&self) -> usize {
        self.count("GET", "/download/").await
    }
}

/// Accepts a multipart upload and keeps the file part under its filename.
struct StoreUpload {
    blobs: Blobs,
    delay: Duration,
}

impl Respond for StoreUpload {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let boundary = request
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .and_then(|ct| ct.split("boundary=").nth(1))
            .map(|b| b.trim_matches('"').to_string())
            .unwrap_or_default();

        match file_part(&request.body, &boundary) {
            Some((name, data)) => {
                self.blobs.lock().insert(name.clone(), data);
                ResponseTemplate::new(200)
                    .set_body_string(format!(r#"{{"cid":"cid-{}"}}"#, &name[..12]))
                    .set_delay(self.delay)
            }
            None => ResponseTemplate::new(400).set_body_string(r#"{"error":"no file part"}"#),
        }
    }
}

/// Serves whatever was uploaded under the requested root.
struct ServeDownload {
    blobs: Blobs,
}

impl Respond for ServeDownload {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let root = request.url.path().trim_start_matches("/download/");
        match self.blobs.lock().get(root) {
            Some(data) => ResponseTemplate::new(200).set_body_bytes(data.clone()),
            None => ResponseTemplate::new(404),
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Extracts `(filename, bytes)` of the `file` part of a multipart body.
fn file_part(body: &[u8], boundary: &str) -> Option<(String, Vec<u8>)> {
    let header = find(body, b"name=\"file\"")?;
    let rest = &body[header..];
    let name_at = find(rest, b"filename=\"")? + "filename=\"".len();
    let name_len = find(&rest[name_at..], b"\"")?;
    let name = String::from_utf8(rest[name_at..name_at + name_len].to_vec()).ok()?;

    let data_at = find(rest, b"\r\n\r\n")? + 4;
    let closing = format!("\r\n--{boundary}");
    let data_len = find(&rest[data_at..], closing.as_bytes())?;
    Some((name, rest[data_at..data_at + data_len].to_vec()))
}

fn config() -> ReplicationConfig {
    ReplicationConfig {
        shuffle_seed: Some(42),
        request_timeout_ms: 10_000,
        health_timeout_ms: 1_000,
        ..Default::default()
    }
}

fn start_store(chain: &Arc<MockChain>, registry: Arc<ProviderRegistry>) -> ReplicatedStore {
    ReplicatedStore::start(chain.clone(), chain.clone(), registry, config()).expect("start store")
}

fn random_payload(len: usize, seed: u64) -> Bytes {
    let mut buf = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut buf);
    Bytes::from(buf)
}

fn publish(chain: &MockChain, providers: &[&FakeProvider]) {
    for (i, p) in providers.iter().enumerate() {
        chain.add_provider(format!("jkl1provider{i}"), p.uri());
    }
}

// ════════════════════════════════════════════════════════════════════════════
// A. ROUND TRIP AND KEY TABLE
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_put_then_get_returns_identical_bytes() {
    let providers = [
        FakeProvider::start(Behavior::Accept).await,
        FakeProvider::start(Behavior::Accept).await,
        FakeProvider::start(Behavior::Accept).await,
    ];
    let chain = Arc::new(MockChain::new());
    publish(&chain, &providers.iter().collect::<Vec<_>>());
    let store = start_store(&chain, Arc::new(ProviderRegistry::new()));

    let payload = random_payload(1024 * 1024, 7);
    let receipt = store.store(b"a", payload.clone()).await.expect("put");
    assert_eq!(receipt.accepted.len(), 3);
    assert!(!receipt.is_partial());
    assert!(receipt.cid.starts_with("cid-"));
    assert_eq!(receipt.deal.size, 1024 * 1024);
    assert_eq!(store.root_for(b"a"), Some(receipt.root));
    assert!(providers.iter().all(|p| p.holds(&receipt.root)));

    chain.set_hosting(receipt.root, providers.iter().map(FakeProvider::uri).collect());
    let back = store.get(b"a").await.expect("get");
    assert_eq!(back, payload);
}

#[tokio::test]
async fn test_same_payload_under_two_keys_shares_root() {
    let provider = FakeProvider::start(Behavior::Accept).await;
    let chain = Arc::new(MockChain::new());
    publish(&chain, &[&provider]);
    let store = start_store(&chain, Arc::new(ProviderRegistry::new()));

    let payload = random_payload(10_000, 3);
    store.put(b"first", payload.clone()).await.expect("put first");
    store.put(b"second", payload).await.expect("put second");

    assert_eq!(store.len(), 2);
    assert_eq!(store.root_for(b"first"), store.root_for(b"second"));
    assert_eq!(chain.submitted().len(), 2);
}

#[tokio::test]
async fn test_reput_overwrites_key() {
    let provider = FakeProvider::start(Behavior::Accept).await;
    let chain = Arc::new(MockChain::new());
    publish(&chain, &[&provider]);
    let store = start_store(&chain, Arc::new(ProviderRegistry::new()));

    let old = store.store(b"k", random_payload(500, 1)).await.expect("put old");
    let new = store.store(b"k", random_payload(500, 2)).await.expect("put new");
    assert_ne!(old.root, new.root);
    assert_eq!(store.len(), 1);
    assert_eq!(store.root_for(b"k"), Some(new.root));
}

#[tokio::test]
async fn test_unknown_key_makes_no_network_call() {
    let provider = FakeProvider::start(Behavior::Accept).await;
    let chain = Arc::new(MockChain::new());
    publish(&chain, &[&provider]);
    let store = start_store(&chain, Arc::new(ProviderRegistry::new()));

    let err = store.get(b"never-stored").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(chain.find_calls(), 0);
    assert_eq!(provider.downloads().await, 0);
}

// ════════════════════════════════════════════════════════════════════════════
// B. PLACEMENT AND FALLBACK
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_capacity_rejections_fall_back_to_directory() {
    let assigned = [
        FakeProvider::start(Behavior::Capacity).await,
        FakeProvider::start(Behavior::Capacity).await,
        FakeProvider::start(Behavior::Capacity).await,
    ];
    let spare = FakeProvider::start(Behavior::Accept).await;

    let chain = Arc::new(MockChain::new());
    chain.set_assigned_providers(assigned.iter().map(FakeProvider::uri).collect());
    publish(&chain, &[&spare]);
    let registry = Arc::new(ProviderRegistry::new());
    let store = start_store(&chain, registry.clone());

    let receipt = store.store(b"k", random_payload(4096, 9)).await.expect("put");
    assert_eq!(receipt.accepted.len(), 1);
    assert_eq!(receipt.accepted[0].endpoint, spare.uri());
    assert!(receipt.is_partial());
    for p in &assigned {
        assert_eq!(p.uploads().await, 1);
    }
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_uploads_stop_at_replica_target() {
    let mut providers = Vec::new();
    for _ in 0..6 {
        providers.push(FakeProvider::start(Behavior::Accept).await);
    }
    let chain = Arc::new(MockChain::new());
    publish(&chain, &providers.iter().collect::<Vec<_>>());
    let store = start_store(&chain, Arc::new(ProviderRegistry::new()));

    let receipt = store.store(b"k", random_payload(2048, 4)).await.expect("put");
    assert_eq!(receipt.accepted.len(), 3);

    let mut total = 0;
    for p in &providers {
        total += p.uploads().await;
    }
    assert_eq!(total, 3);
}

#[tokio::test]
async fn test_no_acceptance_is_an_error() {
    let providers = [
        FakeProvider::start(Behavior::Capacity).await,
        FakeProvider::start(Behavior::WrongNetwork).await,
    ];
    let chain = Arc::new(MockChain::new());
    publish(&chain, &providers.iter().collect::<Vec<_>>());
    let store = start_store(&chain, Arc::new(ProviderRegistry::new()));

    let err = store.put(b"k", random_payload(100, 5)).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Replication(ReplicationError::NoProviderAccepted { attempted: 2, .. })
    ));
    assert_eq!(store.root_for(b"k"), None);
}

// ════════════════════════════════════════════════════════════════════════════
// C. BLACKLIST
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_failed_provider_is_never_targeted_again() {
    let broken = FakeProvider::start(Behavior::Broken).await;
    let good = FakeProvider::start(Behavior::Accept).await;
    let chain = Arc::new(MockChain::new());
    publish(&chain, &[&broken, &good]);
    let registry = Arc::new(ProviderRegistry::new());
    let store = start_store(&chain, registry.clone());

    store.put(b"one", random_payload(300, 1)).await.expect("first put");
    assert!(registry.is_blacklisted("jkl1provider0"));
    assert!(!registry.is_blacklisted("jkl1provider1"));
    assert_eq!(broken.uploads().await, 1);

    for i in 0..3u64 {
        store
            .put(format!("more-{i}").as_bytes(), random_payload(300, 10 + i))
            .await
            .expect("later put");
    }
    assert_eq!(broken.uploads().await, 1);
    assert_eq!(good.uploads().await, 4);
}

#[tokio::test]
async fn test_health_check_failure_is_not_penalized() {
    let stranger = FakeProvider::start(Behavior::WrongNetwork).await;
    let good = FakeProvider::start(Behavior::Accept).await;
    let chain = Arc::new(MockChain::new());
    publish(&chain, &[&stranger, &good]);
    let registry = Arc::new(ProviderRegistry::new());
    let store = start_store(&chain, registry.clone());

    store.put(b"k", random_payload(300, 8)).await.expect("put");
    assert!(registry.is_empty());
    assert_eq!(stranger.uploads().await, 0);
}

#[tokio::test]
async fn test_blacklist_shared_across_stores() {
    let broken = FakeProvider::start(Behavior::Broken).await;
    let good = FakeProvider::start(Behavior::Accept).await;
    let chain = Arc::new(MockChain::new());
    publish(&chain, &[&broken, &good]);
    let registry = Arc::new(ProviderRegistry::new());

    let first = start_store(&chain, registry.clone());
    first.put(b"k", random_payload(64, 1)).await.expect("put");
    first.shutdown().await;

    let second = start_store(&chain, registry.clone());
    second.put(b"k", random_payload(64, 2)).await.expect("put");
    assert_eq!(broken.uploads().await, 1);
}

// ════════════════════════════════════════════════════════════════════════════
// D. RETRIEVAL ORDER
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_get_tries_hosts_in_chain_order_and_stops_at_first_success() {
    let uploader = FakeProvider::start(Behavior::Accept).await;
    let chain = Arc::new(MockChain::new());
    publish(&chain, &[&uploader]);
    let store = start_store(&chain, Arc::new(ProviderRegistry::new()));

    let payload = random_payload(5000, 6);
    let receipt = store.store(b"k", payload.clone()).await.expect("put");

    let empty = FakeProvider::start(Behavior::Accept).await;
    let later = FakeProvider::start(Behavior::Accept).await;
    later.blobs.lock().insert(receipt.root.to_hex(), payload.to_vec());
    chain.set_hosting(receipt.root, vec![empty.uri(), uploader.uri(), later.uri()]);

    let back = store.get(b"k").await.expect("get");
    assert_eq!(back, payload);
    assert_eq!(empty.downloads().await, 1);
    assert_eq!(uploader.downloads().await, 1);
    assert_eq!(later.downloads().await, 0);
}

#[tokio::test]
async fn test_get_with_no_reachable_host_is_exhaustion() {
    let provider = FakeProvider::start(Behavior::Accept).await;
    let chain = Arc::new(MockChain::new());
    publish(&chain, &[&provider]);
    let store = start_store(&chain, Arc::new(ProviderRegistry::new()));

    let receipt = store.store(b"k", random_payload(100, 1)).await.expect("put");
    let empty = FakeProvider::start(Behavior::Accept).await;
    chain.set_hosting(receipt.root, vec![empty.uri()]);

    let err = store.get(b"k").await.unwrap_err();
    assert!(!err.is_not_found());
    assert!(err.to_string().contains("unreachable"));
}

// ════════════════════════════════════════════════════════════════════════════
// E. CANCELLATION, TIMEOUTS, AND SERIALIZATION
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_cancel_aborts_in_flight_upload() {
    let slow = FakeProvider::start(Behavior::AcceptSlowly(Duration::from_secs(5))).await;
    let chain = Arc::new(MockChain::new());
    publish(&chain, &[&slow]);
    let store = start_store(&chain, Arc::new(ProviderRegistry::new()));

    let token = store.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });

    let started = std::time::Instant::now();
    let err = store.put(b"k", random_payload(100, 1)).await.unwrap_err();
    assert!(matches!(err, StoreError::Replication(ReplicationError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(store.root_for(b"k"), None);
}

#[tokio::test]
async fn test_hung_upload_times_out_and_is_blacklisted() {
    let hung = FakeProvider::start(Behavior::AcceptSlowly(Duration::from_secs(30))).await;
    let good = FakeProvider::start(Behavior::Accept).await;
    let chain = Arc::new(MockChain::new());
    publish(&chain, &[&hung, &good]);
    let registry = Arc::new(ProviderRegistry::new());
    let store = ReplicatedStore::start(
        chain.clone(),
        chain.clone(),
        registry.clone(),
        ReplicationConfig {
            replica_target: 2,
            request_timeout_ms: 500,
            ..config()
        },
    )
    .expect("start store");

    let started = std::time::Instant::now();
    let receipt = store.store(b"k", random_payload(100, 4)).await.expect("put");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(receipt.is_partial());
    assert_eq!(receipt.accepted.len(), 1);
    assert_eq!(receipt.accepted[0].address, "jkl1provider1");
    assert!(registry.is_blacklisted("jkl1provider0"));
    assert!(!registry.is_blacklisted("jkl1provider1"));
    assert_eq!(store.root_for(b"k"), Some(receipt.root));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_puts_serialize_deal_submission() {
    let provider = FakeProvider::start(Behavior::Accept).await;
    let chain = Arc::new(MockChain::new());
    chain.set_broadcast_delay(Duration::from_millis(10));
    publish(&chain, &[&provider]);
    let store = Arc::new(start_store(&chain, Arc::new(ProviderRegistry::new())));

    let tasks: Vec<_> = (0..8u64)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .put(format!("key-{i}").as_bytes(), random_payload(256, i))
                    .await
            })
        })
        .collect();
    for t in tasks {
        t.await.expect("join").expect("put");
    }

    assert_eq!(chain.submitted().len(), 8);
    assert_eq!(chain.max_in_flight(), 1);
    assert_eq!(store.len(), 8);
}
