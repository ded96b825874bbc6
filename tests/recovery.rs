//! End-to-end routing and recovery scenarios against an in-memory cluster.
//!
//! The mock connector hands out channels whose behavior is scripted per
//! endpoint, which is enough to exercise leader moves, coordinator
//! discovery, broker loss, fan-out and bootstrap failure without a real
//! cluster. Tests run with a paused clock so retry backoffs cost nothing.

use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use bytes::Bytes;

use kaflink::backoff::RetryPolicy;
use kaflink::connection::{
    BrokerChannel, ChanError, Channel, ConnectContext, Connector, EndPoint,
};
use kaflink::protocol::api_key::ApiKey;
use kaflink::protocol::api_version::ApiVersion;
use kaflink::protocol::error::ErrorCode;
use kaflink::protocol::messages::*;
use kaflink::{Client, ClientBuilder, Error};

type Handler = Arc<dyn Fn(&RequestMessage) -> Result<ResponseMessage, ChanError> + Send + Sync>;

/// Scripted per-endpoint broker behaviors.
#[derive(Default)]
struct MockCluster {
    handlers: Mutex<HashMap<EndPoint, Handler>>,
    connect_attempts: AtomicU32,
    metadata_requests: AtomicU32,
}

impl std::fmt::Debug for MockCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCluster").finish_non_exhaustive()
    }
}

impl MockCluster {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn serve<F>(&self, tail: u8, handler: F)
    where
        F: Fn(&RequestMessage) -> Result<ResponseMessage, ChanError> + Send + Sync + 'static,
    {
        self.handlers.lock().unwrap().insert(ep(tail), Arc::new(handler));
    }
}

fn connector(cluster: &Arc<MockCluster>) -> Arc<dyn Connector> {
    Arc::new(MockConnector {
        cluster: Arc::clone(cluster),
    })
}

#[derive(Debug)]
struct MockConnector {
    cluster: Arc<MockCluster>,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _ctx: &ConnectContext,
        endpoint: EndPoint,
    ) -> Result<BrokerChannel, ChanError> {
        self.cluster.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.cluster.handlers.lock().unwrap().contains_key(&endpoint) {
            return Err(ChanError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(Arc::new(MockChannel {
            endpoint,
            cluster: Arc::clone(&self.cluster),
            open: AtomicBool::new(true),
        }))
    }
}

#[derive(Debug)]
struct MockChannel {
    endpoint: EndPoint,
    cluster: Arc<MockCluster>,
    open: AtomicBool,
}

#[async_trait]
impl Channel for MockChannel {
    async fn send(&self, request: RequestMessage) -> Result<ResponseMessage, ChanError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(ChanError::Closed);
        }
        if matches!(request, RequestMessage::Metadata(_)) {
            self.cluster.metadata_requests.fetch_add(1, Ordering::SeqCst);
        }
        let handler = self
            .cluster
            .handlers
            .lock()
            .unwrap()
            .get(&self.endpoint)
            .cloned();
        match handler {
            Some(handler) => handler(&request),
            None => Err(ChanError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            ))),
        }
    }

    async fn ensure_open(&self) -> Result<(), ChanError> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ChanError::Closed)
        }
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn endpoint(&self) -> EndPoint {
        self.endpoint
    }
}

fn ep(tail: u8) -> EndPoint {
    EndPoint(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, tail), 9092))
}

fn host(tail: i32) -> String {
    format!("10.0.0.{tail}")
}

fn metadata_response(broker_ids: &[i32], leaders: &[(&str, i32, i32)]) -> ResponseMessage {
    let mut topics: Vec<MetadataResponseTopic> = Vec::new();
    for (name, partition_index, leader_id) in leaders {
        let partition = MetadataResponsePartition {
            error_code: None,
            partition_index: *partition_index,
            leader_id: *leader_id,
        };
        match topics.iter_mut().find(|t| t.name == *name) {
            Some(topic) => topic.partitions.push(partition),
            None => topics.push(MetadataResponseTopic {
                error_code: None,
                name: name.to_string(),
                partitions: vec![partition],
            }),
        }
    }
    ResponseMessage::Metadata(MetadataResponse {
        throttle_time_ms: None,
        brokers: broker_ids
            .iter()
            .map(|id| MetadataResponseBroker {
                node_id: *id,
                host: host(*id),
                port: 9092,
            })
            .collect(),
        controller_id: None,
        topics,
    })
}

fn fetch_request(parts: &[(&str, i32)]) -> RequestMessage {
    let mut topics: Vec<FetchRequestTopic> = Vec::new();
    for (name, partition) in parts {
        let partition = FetchRequestPartition {
            partition: *partition,
            fetch_offset: 0,
            partition_max_bytes: 1024 * 1024,
        };
        match topics.last_mut() {
            Some(last) if last.topic == *name => last.partitions.push(partition),
            _ => topics.push(FetchRequestTopic {
                topic: name.to_string(),
                partitions: vec![partition],
            }),
        }
    }
    RequestMessage::Fetch(FetchRequest {
        replica_id: -1,
        max_wait_ms: 500,
        min_bytes: 1,
        max_bytes: None,
        topics,
    })
}

/// Answers a fetch with one record batch per requested partition.
fn fetch_ok(request: &RequestMessage) -> Result<ResponseMessage, ChanError> {
    let RequestMessage::Fetch(fetch) = request else {
        panic!("expected a fetch request, got {:?}", request.api_key());
    };
    Ok(ResponseMessage::Fetch(FetchResponse {
        throttle_time_ms: None,
        responses: fetch
            .topics
            .iter()
            .map(|topic| FetchResponseTopic {
                topic: topic.topic.clone(),
                partitions: topic
                    .partitions
                    .iter()
                    .map(|partition| FetchResponsePartition {
                        partition_index: partition.partition,
                        error_code: None,
                        high_watermark: 100,
                        records: Bytes::from_static(b"records"),
                    })
                    .collect(),
            })
            .collect(),
    }))
}

fn fetch_not_leader(request: &RequestMessage) -> Result<ResponseMessage, ChanError> {
    let RequestMessage::Fetch(fetch) = request else {
        panic!("expected a fetch request, got {:?}", request.api_key());
    };
    Ok(ResponseMessage::Fetch(FetchResponse {
        throttle_time_ms: None,
        responses: fetch
            .topics
            .iter()
            .map(|topic| FetchResponseTopic {
                topic: topic.topic.clone(),
                partitions: topic
                    .partitions
                    .iter()
                    .map(|partition| FetchResponsePartition {
                        partition_index: partition.partition,
                        error_code: Some(ErrorCode::NotLeaderForPartition),
                        high_watermark: -1,
                        records: Bytes::new(),
                    })
                    .collect(),
            })
            .collect(),
    }))
}

fn fetched_parts(response: &ResponseMessage) -> Vec<(String, i32)> {
    let ResponseMessage::Fetch(fetch) = response else {
        panic!("expected a fetch response, got {:?}", response.api_key());
    };
    let mut parts: Vec<(String, i32)> = fetch
        .responses
        .iter()
        .flat_map(|topic| {
            topic
                .partitions
                .iter()
                .map(|p| (topic.topic.clone(), p.partition_index))
        })
        .collect();
    parts.sort();
    parts
}

async fn connect(cluster: &Arc<MockCluster>, bootstrap: &[&str]) -> Client {
    ClientBuilder::new(
        bootstrap.iter().map(|s| s.to_string()).collect(),
        connector(&cluster),
    )
    .auto_api_versions(false)
    .bootstrap_retry_policy(RetryPolicy::constant_bounded_ms(100, 2))
    .request_retry_policy(RetryPolicy::constant_bounded_ms(100, 5))
    .connect()
    .await
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn happy_produce_routes_to_the_partition_leader() {
    let cluster = MockCluster::new();
    cluster.serve(1, |request| match request {
        RequestMessage::Metadata(_) => Ok(metadata_response(&[1], &[("orders", 0, 1)])),
        RequestMessage::Produce(produce) => {
            assert_eq!(produce.required_acks, 1);
            Ok(ResponseMessage::Produce(ProduceResponse {
                throttle_time_ms: None,
                topics: vec![ProduceResponseTopic {
                    name: "orders".to_owned(),
                    partitions: vec![ProduceResponsePartition {
                        partition_index: 0,
                        error_code: None,
                        base_offset: 42,
                    }],
                }],
            }))
        }
        other => panic!("unexpected request {:?}", other.api_key()),
    });

    let client = connect(&cluster, &["10.0.0.1:9092"]).await;
    client.get_metadata(&["orders".to_owned()]).await.unwrap();

    let response = client
        .send(RequestMessage::Produce(ProduceRequest {
            required_acks: 1,
            timeout_ms: 10_000,
            topics: vec![ProduceRequestTopic {
                name: "orders".to_owned(),
                partitions: vec![ProduceRequestPartition {
                    partition_index: 0,
                    records: Bytes::from_static(b"batch"),
                }],
            }],
        }))
        .await
        .unwrap();

    assert_matches!(response, ResponseMessage::Produce(r) => {
        assert_eq!(r.topics[0].name, "orders");
        assert_eq!(r.topics[0].partitions[0].base_offset, 42);
    });
    client.close().await;
}

#[tokio::test(start_paused = true)]
async fn leader_move_refreshes_metadata_and_retries() {
    let cluster = MockCluster::new();
    let metadata_calls = Arc::new(AtomicU32::new(0));
    {
        let metadata_calls = Arc::clone(&metadata_calls);
        cluster.serve(1, move |request| match request {
            RequestMessage::Metadata(_) => {
                // The leader of (logs, 0) moves from broker 1 to broker 2
                // after the first fetch.
                let leader = if metadata_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    1
                } else {
                    2
                };
                Ok(metadata_response(&[1, 2], &[("logs", 0, leader)]))
            }
            RequestMessage::Fetch(_) => fetch_not_leader(request),
            other => panic!("unexpected request {:?}", other.api_key()),
        });
    }
    cluster.serve(2, |request| match request {
        RequestMessage::Fetch(_) => fetch_ok(request),
        other => panic!("unexpected request {:?}", other.api_key()),
    });

    let client = connect(&cluster, &["10.0.0.1:9092"]).await;
    client.get_metadata(&["logs".to_owned()]).await.unwrap();

    let response = client.send(fetch_request(&[("logs", 0)])).await.unwrap();
    assert_eq!(fetched_parts(&response), vec![("logs".to_owned(), 0)]);

    // One refresh beyond the priming fetch: the stale attempt plus the retry.
    assert_eq!(metadata_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn unknown_coordinator_is_discovered_through_bootstrap() {
    let cluster = MockCluster::new();
    cluster.serve(1, |request| match request {
        RequestMessage::Metadata(_) => Ok(metadata_response(&[1, 3], &[])),
        RequestMessage::FindCoordinator(find) => {
            assert_eq!(find.key, "g1");
            Ok(ResponseMessage::FindCoordinator(FindCoordinatorResponse {
                throttle_time_ms: None,
                error_code: None,
                node_id: 3,
                host: host(3),
                port: 9092,
            }))
        }
        other => panic!("unexpected request {:?}", other.api_key()),
    });
    cluster.serve(3, |request| match request {
        RequestMessage::JoinGroup(join) => {
            assert_eq!(join.group_id, "g1");
            Ok(ResponseMessage::JoinGroup(JoinGroupResponse {
                throttle_time_ms: None,
                error_code: None,
                generation_id: 1,
                protocol_name: "range".to_owned(),
                leader: "m-1".to_owned(),
                member_id: "m-1".to_owned(),
                members: vec![],
            }))
        }
        other => panic!("unexpected request {:?}", other.api_key()),
    });

    let client = connect(&cluster, &["10.0.0.1:9092"]).await;

    // No coordinator is known for g1; the engine discovers it on the fly.
    let response = client
        .send(RequestMessage::JoinGroup(JoinGroupRequest {
            group_id: "g1".to_owned(),
            session_timeout_ms: 10_000,
            rebalance_timeout_ms: 60_000,
            member_id: String::new(),
            protocol_type: "consumer".to_owned(),
            protocols: vec![],
        }))
        .await
        .unwrap();

    assert_matches!(response, ResponseMessage::JoinGroup(r) => {
        assert_eq!(r.member_id, "m-1");
    });
}

#[tokio::test(start_paused = true)]
async fn channel_drop_in_fanout_retries_only_the_affected_sub_request() {
    let cluster = MockCluster::new();
    let metadata_calls = Arc::new(AtomicU32::new(0));
    let b1_fetches = Arc::new(AtomicU32::new(0));
    {
        let metadata_calls = Arc::clone(&metadata_calls);
        let b1_fetches = Arc::clone(&b1_fetches);
        cluster.serve(1, move |request| match request {
            RequestMessage::Metadata(_) => {
                // Broker 2 dies between the two metadata fetches; broker 3
                // inherits its partition.
                if metadata_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(metadata_response(&[1, 2], &[("logs", 0, 1), ("logs", 1, 2)]))
                } else {
                    Ok(metadata_response(&[1, 3], &[("logs", 0, 1), ("logs", 1, 3)]))
                }
            }
            RequestMessage::Fetch(_) => {
                b1_fetches.fetch_add(1, Ordering::SeqCst);
                fetch_ok(request)
            }
            other => panic!("unexpected request {:?}", other.api_key()),
        });
    }
    cluster.serve(2, |_request| {
        Err(ChanError::Io(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )))
    });
    cluster.serve(3, |request| match request {
        RequestMessage::Fetch(fetch) => {
            // Only the partition broker 2 failed to serve lands here.
            let parts: Vec<_> = fetch
                .topics
                .iter()
                .flat_map(|t| t.partitions.iter().map(|p| (t.topic.as_str(), p.partition)))
                .collect();
            assert_eq!(parts, vec![("logs", 1)]);
            fetch_ok(request)
        }
        other => panic!("unexpected request {:?}", other.api_key()),
    });

    let client = connect(&cluster, &["10.0.0.1:9092"]).await;
    client.get_metadata(&["logs".to_owned()]).await.unwrap();

    let response = client
        .send(fetch_request(&[("logs", 0), ("logs", 1)]))
        .await
        .unwrap();

    // Gather preserved the full set of requested partitions.
    assert_eq!(
        fetched_parts(&response),
        vec![("logs".to_owned(), 0), ("logs".to_owned(), 1)]
    );
    // Broker 1's half was not resent.
    assert_eq!(b1_fetches.load(Ordering::SeqCst), 1);
    // The dead broker is gone from the known set.
    assert!(!client.brokers().iter().any(|b| b.node_id == 2));
}

#[tokio::test(start_paused = true)]
async fn bootstrap_exhaustion_after_the_configured_attempts() {
    let cluster = MockCluster::new();

    let result = ClientBuilder::new(vec!["10.9.9.9:9092".to_owned()], connector(&cluster))
        .auto_api_versions(false)
        .bootstrap_retry_policy(RetryPolicy::constant_bounded_ms(100, 2))
        .connect()
        .await;

    assert_matches!(result, Err(Error::BootstrapExhausted { attempts: 2 }));
    assert_eq!(cluster.connect_attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn empty_bootstrap_list_fails_without_io() {
    let cluster = MockCluster::new();

    let result = ClientBuilder::new(vec![], connector(&cluster))
        .auto_api_versions(false)
        .connect()
        .await;

    assert_matches!(result, Err(Error::BootstrapExhausted { attempts: 0 }));
    assert_eq!(cluster.connect_attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn thundering_herd_coalesces_into_one_refresh() {
    let cluster = MockCluster::new();
    let metadata_calls = Arc::new(AtomicU32::new(0));
    {
        let metadata_calls = Arc::clone(&metadata_calls);
        cluster.serve(1, move |request| match request {
            RequestMessage::Metadata(_) => {
                let leader = if metadata_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    1
                } else {
                    2
                };
                Ok(metadata_response(&[1, 2], &[("logs", 0, leader)]))
            }
            RequestMessage::Fetch(_) => fetch_not_leader(request),
            other => panic!("unexpected request {:?}", other.api_key()),
        });
    }
    cluster.serve(2, |request| match request {
        RequestMessage::Fetch(_) => fetch_ok(request),
        other => panic!("unexpected request {:?}", other.api_key()),
    });

    let client = Arc::new(connect(&cluster, &["10.0.0.1:9092"]).await);
    client.get_metadata(&["logs".to_owned()]).await.unwrap();

    let tasks: Vec<_> = (0..100)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.send(fetch_request(&[("logs", 0)])).await })
        })
        .collect();
    for task in tasks {
        let response = task.await.unwrap().unwrap();
        assert_eq!(fetched_parts(&response), vec![("logs".to_owned(), 0)]);
    }

    // All 100 callers saw the same stale leader; the queued recoveries
    // collapsed into a single refresh beyond the priming fetch.
    assert_eq!(metadata_calls.load(Ordering::SeqCst), 2);
    assert_eq!(cluster.metadata_requests.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn membership_errors_are_delivered_not_absorbed() {
    let cluster = MockCluster::new();
    cluster.serve(1, |request| match request {
        RequestMessage::Metadata(_) => Ok(metadata_response(&[1], &[])),
        RequestMessage::FindCoordinator(_) => {
            Ok(ResponseMessage::FindCoordinator(FindCoordinatorResponse {
                throttle_time_ms: None,
                error_code: None,
                node_id: 1,
                host: host(1),
                port: 9092,
            }))
        }
        RequestMessage::Heartbeat(_) => Ok(ResponseMessage::Heartbeat(HeartbeatResponse {
            throttle_time_ms: None,
            error_code: Some(ErrorCode::UnknownMemberId),
        })),
        other => panic!("unexpected request {:?}", other.api_key()),
    });

    let client = connect(&cluster, &["10.0.0.1:9092"]).await;
    let coordinator = client.get_group_coordinator("g1").await.unwrap();
    assert_eq!(coordinator.node_id, 1);

    let response = client
        .send(RequestMessage::Heartbeat(HeartbeatRequest {
            group_id: "g1".to_owned(),
            generation_id: 7,
            member_id: "stale".to_owned(),
        }))
        .await
        .unwrap();

    assert_matches!(response, ResponseMessage::Heartbeat(r) => {
        assert_eq!(r.error_code, Some(ErrorCode::UnknownMemberId));
    });
}

#[tokio::test(start_paused = true)]
async fn unabsorbable_errors_escalate_with_broker_context() {
    let cluster = MockCluster::new();
    cluster.serve(1, |request| match request {
        RequestMessage::Metadata(_) => Ok(metadata_response(&[1], &[])),
        RequestMessage::ListGroups(_) => Ok(ResponseMessage::ListGroups(ListGroupsResponse {
            throttle_time_ms: None,
            error_code: Some(ErrorCode::InvalidMessage),
            groups: vec![],
        })),
        other => panic!("unexpected request {:?}", other.api_key()),
    });

    let client = connect(&cluster, &["10.0.0.1:9092"]).await;
    client.get_metadata(&[]).await.unwrap();

    let error = client
        .send(RequestMessage::ListGroups(ListGroupsRequest {}))
        .await
        .unwrap_err();

    assert_matches!(error, Error::Escalated { error_code, broker, api_key, .. } => {
        assert_eq!(error_code, ErrorCode::InvalidMessage);
        assert_eq!(api_key, ApiKey::ListGroups);
        assert_eq!(broker, "10.0.0.1:9092");
    });
}

#[tokio::test(start_paused = true)]
async fn fatal_channel_errors_propagate_without_eviction() {
    let cluster = MockCluster::new();
    cluster.serve(1, |request| match request {
        RequestMessage::Metadata(_) => Ok(metadata_response(&[1], &[("logs", 0, 1)])),
        RequestMessage::Fetch(_) => Err(ChanError::Decode("truncated record batch".to_owned())),
        other => panic!("unexpected request {:?}", other.api_key()),
    });

    let client = connect(&cluster, &["10.0.0.1:9092"]).await;
    client.get_metadata(&["logs".to_owned()]).await.unwrap();

    let error = client.send(fetch_request(&[("logs", 0)])).await.unwrap_err();

    assert_matches!(error, Error::Channel(ChanError::Decode(_)));
    // The broker itself was not blamed for a poisoned request.
    assert!(client.brokers().iter().any(|b| b.node_id == 1));
}

#[tokio::test(start_paused = true)]
async fn persistent_staleness_exhausts_the_retry_budget() {
    let cluster = MockCluster::new();
    cluster.serve(1, |request| match request {
        // Metadata keeps naming broker 1 the leader while broker 1 keeps
        // disagreeing; the engine must give up after the budget.
        RequestMessage::Metadata(_) => Ok(metadata_response(&[1], &[("logs", 0, 1)])),
        RequestMessage::Fetch(_) => fetch_not_leader(request),
        other => panic!("unexpected request {:?}", other.api_key()),
    });

    let client = ClientBuilder::new(vec!["10.0.0.1:9092".to_owned()], connector(&cluster))
        .auto_api_versions(false)
        .request_retry_policy(RetryPolicy::constant_bounded_ms(100, 3))
        .connect()
        .await
        .unwrap();
    client.get_metadata(&["logs".to_owned()]).await.unwrap();

    let error = client.send(fetch_request(&[("logs", 0)])).await.unwrap_err();
    assert_matches!(error, Error::RetryExhausted { attempts: 3, last_request, last_response, .. } => {
        assert_eq!(last_request.api_key(), ApiKey::Fetch);
        // The budget ran out on a response error, so the response is kept.
        assert_matches!(last_response.as_deref(), Some(ResponseMessage::Fetch(_)));
    });
}

#[tokio::test(start_paused = true)]
async fn unroutable_topic_surfaces_as_missing_route() {
    let cluster = MockCluster::new();
    cluster.serve(1, |request| match request {
        RequestMessage::Metadata(_) => Ok(metadata_response(&[1], &[])),
        other => panic!("unexpected request {:?}", other.api_key()),
    });

    let client = ClientBuilder::new(vec!["10.0.0.1:9092".to_owned()], connector(&cluster))
        .auto_api_versions(false)
        .request_retry_policy(RetryPolicy::constant_bounded_ms(100, 3))
        .connect()
        .await
        .unwrap();

    let error = client.send(fetch_request(&[("nope", 0)])).await.unwrap_err();
    assert_matches!(error, Error::MissingRoute { route, attempts: 3, last_request } => {
        assert_eq!(route.to_string(), r#"topics ["nope"]"#);
        assert_eq!(last_request.api_key(), ApiKey::Fetch);
    });
}

#[tokio::test(start_paused = true)]
async fn api_versions_are_negotiated_on_connect() {
    let cluster = MockCluster::new();
    cluster.serve(1, |request| match request {
        RequestMessage::ApiVersions(_) => {
            Ok(ResponseMessage::ApiVersions(ApiVersionsResponse {
                error_code: None,
                api_keys: vec![
                    ApiVersionsResponseKey {
                        api_key: ApiKey::Fetch.into(),
                        min_version: 0,
                        max_version: 2,
                    },
                    ApiVersionsResponseKey {
                        api_key: ApiKey::Produce.into(),
                        min_version: 0,
                        max_version: 7,
                    },
                ],
            }))
        }
        other => panic!("unexpected request {:?}", other.api_key()),
    });

    let client = ClientBuilder::new(vec!["10.0.0.1:9092".to_owned()], connector(&cluster))
        .connect()
        .await
        .unwrap();

    // Broker capped Fetch below our default; Produce stays at our maximum.
    assert_eq!(client.api_version(ApiKey::Fetch), Some(ApiVersion(2)));
    assert_eq!(client.api_version(ApiKey::Produce), Some(ApiVersion(2)));
    // The broker never advertised FindCoordinator.
    assert_eq!(client.api_version(ApiKey::FindCoordinator), None);
}

#[tokio::test(start_paused = true)]
async fn closed_handles_reject_new_sends() {
    let cluster = MockCluster::new();
    cluster.serve(1, |request| match request {
        RequestMessage::Metadata(_) => Ok(metadata_response(&[1], &[])),
        other => panic!("unexpected request {:?}", other.api_key()),
    });

    let client = connect(&cluster, &["10.0.0.1:9092"]).await;
    let mut shutdown = client.shutdown_signal();
    assert!(!*shutdown.borrow());

    client.close().await;

    assert!(shutdown.changed().await.is_ok());
    assert!(*shutdown.borrow());
    assert_matches!(
        client.send(fetch_request(&[("logs", 0)])).await,
        Err(Error::Closed)
    );
}
