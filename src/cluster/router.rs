//! Pure routing of requests onto brokers.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::cluster::state::{Broker, ClusterState};
use crate::protocol::messages::{
    FetchRequest, FetchRequestTopic, ListOffsetsRequest, ListOffsetsRequestTopic, ProduceRequest,
    ProduceRequestTopic, RequestMessage,
};

/// Why a request could not be routed on the current state, which doubles as
/// the recovery the engine must run before trying again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteType {
    /// No bootstrap broker is installed yet.
    Bootstrap,

    /// Leaders for these topics are unknown.
    Topic(Vec<String>),

    /// The coordinator for this group is unknown.
    Group(String),

    /// No brokers are known at all.
    AllBrokers,
}

impl Display for RouteType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bootstrap => write!(f, "bootstrap broker"),
            Self::Topic(topics) => write!(f, "topics {topics:?}"),
            Self::Group(group_id) => write!(f, "group '{group_id}'"),
            Self::AllBrokers => write!(f, "all brokers"),
        }
    }
}

impl RouteType {
    /// The route a request would have taken, derived from its kind alone.
    ///
    /// Used when a channel fails mid-flight and the engine has to decide
    /// which discovery repairs the route.
    pub fn of_request(request: &RequestMessage) -> Self {
        match request {
            RequestMessage::Metadata(_)
            | RequestMessage::ApiVersions(_)
            | RequestMessage::FindCoordinator(_) => Self::Bootstrap,

            RequestMessage::DescribeGroups(_) | RequestMessage::ListGroups(_) => Self::AllBrokers,

            RequestMessage::OffsetCommit(r) => Self::Group(r.group_id.clone()),
            RequestMessage::OffsetFetch(r) => Self::Group(r.group_id.clone()),
            RequestMessage::JoinGroup(r) => Self::Group(r.group_id.clone()),
            RequestMessage::SyncGroup(r) => Self::Group(r.group_id.clone()),
            RequestMessage::Heartbeat(r) => Self::Group(r.group_id.clone()),
            RequestMessage::LeaveGroup(r) => Self::Group(r.group_id.clone()),

            RequestMessage::Produce(r) => {
                Self::Topic(r.topics.iter().map(|t| t.name.clone()).collect())
            }
            RequestMessage::Fetch(r) => {
                Self::Topic(r.topics.iter().map(|t| t.topic.clone()).collect())
            }
            RequestMessage::ListOffsets(r) => {
                Self::Topic(r.topics.iter().map(|t| t.name.clone()).collect())
            }
        }
    }
}

/// Routes a request to the broker(s) that must serve it.
///
/// Topic-routed requests are split per partition leader; everything else maps
/// to a single broker or fans out to all of them. Never returns `Ok` with an
/// empty route list.
pub fn route(
    state: &ClusterState,
    request: &RequestMessage,
) -> Result<Vec<(RequestMessage, Broker)>, RouteType> {
    match request {
        RequestMessage::Metadata(_)
        | RequestMessage::ApiVersions(_)
        | RequestMessage::FindCoordinator(_) => match state.bootstrap_broker() {
            Some(broker) => Ok(vec![(request.clone(), broker.clone())]),
            None => Err(RouteType::Bootstrap),
        },

        RequestMessage::DescribeGroups(_) | RequestMessage::ListGroups(_) => {
            let brokers = state.brokers();
            if brokers.is_empty() {
                return Err(RouteType::AllBrokers);
            }
            Ok(brokers
                .into_iter()
                .map(|broker| (request.clone(), broker))
                .collect())
        }

        RequestMessage::OffsetCommit(r) => route_group(state, request, &r.group_id),
        RequestMessage::OffsetFetch(r) => route_group(state, request, &r.group_id),
        RequestMessage::JoinGroup(r) => route_group(state, request, &r.group_id),
        RequestMessage::SyncGroup(r) => route_group(state, request, &r.group_id),
        RequestMessage::Heartbeat(r) => route_group(state, request, &r.group_id),
        RequestMessage::LeaveGroup(r) => route_group(state, request, &r.group_id),

        RequestMessage::Produce(r) => split_produce(state, r),
        RequestMessage::Fetch(r) => split_fetch(state, r),
        RequestMessage::ListOffsets(r) => split_list_offsets(state, r),
    }
}

fn route_group(
    state: &ClusterState,
    request: &RequestMessage,
    group_id: &str,
) -> Result<Vec<(RequestMessage, Broker)>, RouteType> {
    match state.group_coordinator(group_id) {
        Some(broker) => Ok(vec![(request.clone(), broker.clone())]),
        None => Err(RouteType::Group(group_id.to_owned())),
    }
}

/// Accumulates per-broker topic lists while preserving request order.
struct Split<T> {
    by_broker: BTreeMap<i32, (Broker, Vec<T>)>,
    missing: Vec<String>,
}

impl<T> Split<T> {
    fn new() -> Self {
        Self {
            by_broker: BTreeMap::new(),
            missing: Vec::new(),
        }
    }

    fn miss(&mut self, topic: &str) {
        if !self.missing.iter().any(|t| t == topic) {
            self.missing.push(topic.to_owned());
        }
    }

    fn assign(&mut self, broker: &Broker) -> &mut Vec<T> {
        &mut self
            .by_broker
            .entry(broker.node_id)
            .or_insert_with(|| (broker.clone(), Vec::new()))
            .1
    }

    /// Builds the final routes; any missing leader fails the whole split.
    fn finish(
        self,
        build: impl Fn(Vec<T>) -> RequestMessage,
    ) -> Result<Vec<(RequestMessage, Broker)>, RouteType> {
        if !self.missing.is_empty() || self.by_broker.is_empty() {
            return Err(RouteType::Topic(self.missing));
        }
        Ok(self
            .by_broker
            .into_values()
            .map(|(broker, topics)| (build(topics), broker))
            .collect())
    }
}

fn split_produce(
    state: &ClusterState,
    request: &ProduceRequest,
) -> Result<Vec<(RequestMessage, Broker)>, RouteType> {
    let mut split = Split::new();
    for topic in &request.topics {
        for partition in &topic.partitions {
            match state.try_find_topic_partition_broker(&topic.name, partition.partition_index) {
                None => split.miss(&topic.name),
                Some(broker) => {
                    let topics = split.assign(broker);
                    push_partition(topics, &topic.name, partition.clone(), |name| {
                        ProduceRequestTopic {
                            name,
                            partitions: Vec::new(),
                        }
                    });
                }
            }
        }
    }
    split.finish(|topics| {
        RequestMessage::Produce(ProduceRequest {
            required_acks: request.required_acks,
            timeout_ms: request.timeout_ms,
            topics,
        })
    })
}

fn split_fetch(
    state: &ClusterState,
    request: &FetchRequest,
) -> Result<Vec<(RequestMessage, Broker)>, RouteType> {
    let mut split = Split::new();
    for topic in &request.topics {
        for partition in &topic.partitions {
            match state.try_find_topic_partition_broker(&topic.topic, partition.partition) {
                None => split.miss(&topic.topic),
                Some(broker) => {
                    let topics = split.assign(broker);
                    push_partition(topics, &topic.topic, partition.clone(), |name| {
                        FetchRequestTopic {
                            topic: name,
                            partitions: Vec::new(),
                        }
                    });
                }
            }
        }
    }
    split.finish(|topics| {
        RequestMessage::Fetch(FetchRequest {
            replica_id: request.replica_id,
            max_wait_ms: request.max_wait_ms,
            min_bytes: request.min_bytes,
            max_bytes: request.max_bytes,
            topics,
        })
    })
}

fn split_list_offsets(
    state: &ClusterState,
    request: &ListOffsetsRequest,
) -> Result<Vec<(RequestMessage, Broker)>, RouteType> {
    let mut split = Split::new();
    for topic in &request.topics {
        for partition in &topic.partitions {
            match state.try_find_topic_partition_broker(&topic.name, partition.partition_index) {
                None => split.miss(&topic.name),
                Some(broker) => {
                    let topics = split.assign(broker);
                    push_partition(topics, &topic.name, partition.clone(), |name| {
                        ListOffsetsRequestTopic {
                            name,
                            partitions: Vec::new(),
                        }
                    });
                }
            }
        }
    }
    split.finish(|topics| {
        RequestMessage::ListOffsets(ListOffsetsRequest {
            replica_id: request.replica_id,
            topics,
        })
    })
}

/// Appends a partition to the trailing topic entry, opening a new one when
/// the topic changes. Input iteration is topic-by-topic, so entries for one
/// topic stay contiguous.
fn push_partition<T, P>(
    topics: &mut Vec<T>,
    name: &str,
    partition: P,
    new_topic: impl FnOnce(String) -> T,
) where
    T: TopicEntry<P>,
{
    match topics.last_mut() {
        Some(last) if last.name() == name => last.partitions_mut().push(partition),
        _ => {
            let mut topic = new_topic(name.to_owned());
            topic.partitions_mut().push(partition);
            topics.push(topic);
        }
    }
}

trait TopicEntry<P> {
    fn name(&self) -> &str;
    fn partitions_mut(&mut self) -> &mut Vec<P>;
}

impl TopicEntry<crate::protocol::messages::ProduceRequestPartition> for ProduceRequestTopic {
    fn name(&self) -> &str {
        &self.name
    }
    fn partitions_mut(&mut self) -> &mut Vec<crate::protocol::messages::ProduceRequestPartition> {
        &mut self.partitions
    }
}

impl TopicEntry<crate::protocol::messages::FetchRequestPartition> for FetchRequestTopic {
    fn name(&self) -> &str {
        &self.topic
    }
    fn partitions_mut(&mut self) -> &mut Vec<crate::protocol::messages::FetchRequestPartition> {
        &mut self.partitions
    }
}

impl TopicEntry<crate::protocol::messages::ListOffsetsRequestPartition> for ListOffsetsRequestTopic {
    fn name(&self) -> &str {
        &self.name
    }
    fn partitions_mut(
        &mut self,
    ) -> &mut Vec<crate::protocol::messages::ListOffsetsRequestPartition> {
        &mut self.partitions
    }
}
