//! Immutable snapshots of the known cluster topology.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};

use tracing::{debug, info};

use crate::connection::{BrokerChannel, EndPoint};
use crate::protocol::messages::MetadataResponseBroker;

/// Node id used for the bootstrap entry before the cluster has assigned us
/// real broker ids. Real assignments are non-negative.
pub const BOOTSTRAP_NODE_ID: i32 = -2;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Broker {
    /// Broker ID from the topology metadata, negative for bootstrap-only
    /// entries.
    pub node_id: i32,
    pub host: String,
    pub port: u16,
}

impl Display for Broker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl<'a> From<&'a MetadataResponseBroker> for Broker {
    fn from(b: &'a MetadataResponseBroker) -> Self {
        Self {
            node_id: b.node_id,
            host: b.host.clone(),
            port: b.port as u16,
        }
    }
}

impl Broker {
    pub fn is_bootstrap(&self) -> bool {
        self.node_id < 0
    }
}

/// One immutable snapshot of everything the client knows about the cluster.
///
/// Mutation happens only through the pure operations below, each of which
/// yields a new snapshot with `version + 1`; the committed snapshot lives in
/// the [`StateCell`](crate::cluster::cell::StateCell).
#[derive(Debug, Clone, Default)]
pub struct ClusterState {
    /// The broker that supplied initial metadata, if bootstrap succeeded.
    bootstrap_broker: Option<Broker>,

    brokers_by_node_id: HashMap<i32, Broker>,

    /// Current partition leaders. Ordered so routing and gather iteration
    /// are deterministic.
    brokers_by_topic_partition: BTreeMap<(String, i32), Broker>,

    /// Group coordinators.
    brokers_by_group: HashMap<String, Broker>,

    chans_by_node_id: HashMap<i32, BrokerChannel>,
    chans_by_endpoint: HashMap<EndPoint, BrokerChannel>,

    version: u64,
}

impl ClusterState {
    /// Monotonic across every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn bootstrap_broker(&self) -> Option<&Broker> {
        self.bootstrap_broker.as_ref()
    }

    /// All known brokers in node-id order.
    pub fn brokers(&self) -> Vec<Broker> {
        let mut brokers: Vec<_> = self.brokers_by_node_id.values().cloned().collect();
        brokers.sort_by_key(|b| b.node_id);
        brokers
    }

    pub fn try_find_topic_partition_broker(&self, topic: &str, partition: i32) -> Option<&Broker> {
        self.brokers_by_topic_partition
            .get(&(topic.to_owned(), partition))
    }

    pub fn group_coordinator(&self, group_id: &str) -> Option<&Broker> {
        self.brokers_by_group.get(group_id)
    }

    pub fn channel_for(&self, broker: &Broker) -> Option<BrokerChannel> {
        self.chans_by_node_id.get(&broker.node_id).cloned()
    }

    pub fn channel_for_endpoint(&self, endpoint: &EndPoint) -> Option<BrokerChannel> {
        self.chans_by_endpoint.get(endpoint).cloned()
    }

    pub fn channels(&self) -> Vec<BrokerChannel> {
        self.chans_by_endpoint.values().cloned().collect()
    }

    /// Projection of the partition map to topic -> known partitions.
    pub fn topic_partitions(&self) -> BTreeMap<String, Vec<i32>> {
        let mut topics: BTreeMap<String, Vec<i32>> = BTreeMap::new();
        for (topic, partition) in self.brokers_by_topic_partition.keys() {
            topics.entry(topic.clone()).or_default().push(*partition);
        }
        topics
    }

    /// True iff at least one partition is known for every given topic.
    pub fn contains_topic_metadata(&self, topics: &[String]) -> bool {
        topics.iter().all(|topic| {
            self.brokers_by_topic_partition
                .range((topic.clone(), i32::MIN)..=(topic.clone(), i32::MAX))
                .next()
                .is_some()
        })
    }

    /// Rebuilds the broker set and applies partition leadership.
    ///
    /// A leader id below zero means the partition is currently leaderless;
    /// its entry is removed so routing reports the topic as missing instead
    /// of targeting a stale leader. Entries pointing at brokers that left the
    /// cluster are dropped along with them.
    pub fn update_metadata(
        &self,
        brokers: Vec<Broker>,
        leaders: &[(String, i32, i32)],
    ) -> Self {
        let mut next = self.clone();

        let brokers_by_node_id: HashMap<i32, Broker> =
            brokers.into_iter().map(|b| (b.node_id, b)).collect();
        for (node_id, broker) in &brokers_by_node_id {
            match self.brokers_by_node_id.get(node_id) {
                Some(current) if current == broker => {}
                Some(current) => {
                    info!(broker = node_id, current = %current, new = %broker, "Broker update");
                }
                None => {
                    info!(broker = node_id, new = %broker, "New broker");
                }
            }
        }
        next.brokers_by_node_id = brokers_by_node_id;

        for (topic, partition, leader_id) in leaders {
            let key = (topic.clone(), *partition);
            if *leader_id < 0 {
                next.brokers_by_topic_partition.remove(&key);
            } else if let Some(broker) = next.brokers_by_node_id.get(leader_id) {
                next.brokers_by_topic_partition.insert(key, broker.clone());
            } else {
                debug!(
                    topic = topic.as_str(),
                    partition, leader = leader_id,
                    "Leader not in broker set, leaving mapping unchanged",
                );
            }
        }

        next.brokers_by_topic_partition.retain(|_, broker| {
            broker.is_bootstrap() || next.brokers_by_node_id.contains_key(&broker.node_id)
        });
        next.brokers_by_group.retain(|_, broker| {
            broker.is_bootstrap() || next.brokers_by_node_id.contains_key(&broker.node_id)
        });
        // Refresh stale broker records still referenced by leaders and
        // coordinators (host or port moved under an unchanged node id).
        for broker in next.brokers_by_topic_partition.values_mut() {
            if let Some(current) = next.brokers_by_node_id.get(&broker.node_id) {
                *broker = current.clone();
            }
        }
        for broker in next.brokers_by_group.values_mut() {
            if let Some(current) = next.brokers_by_node_id.get(&broker.node_id) {
                *broker = current.clone();
            }
        }

        next.version += 1;
        next
    }

    pub fn update_group_coordinator(&self, broker: Broker, group_id: String) -> Self {
        let mut next = self.clone();
        info!(group = group_id.as_str(), coordinator = %broker, "Group coordinator");
        if !broker.is_bootstrap() {
            next.brokers_by_node_id
                .insert(broker.node_id, broker.clone());
        }
        next.brokers_by_group.insert(group_id, broker);
        next.version += 1;
        next
    }

    pub fn update_bootstrap_broker(&self, broker: Broker) -> Self {
        let mut next = self.clone();
        next.bootstrap_broker = Some(broker);
        next.version += 1;
        next
    }

    pub fn add_channel(&self, broker: &Broker, chan: BrokerChannel) -> Self {
        let mut next = self.clone();
        next.chans_by_endpoint.insert(chan.endpoint(), chan.clone());
        next.chans_by_node_id.insert(broker.node_id, chan);
        next.version += 1;
        next
    }

    /// Drops the broker and everything routed through it.
    ///
    /// Returns the evicted channel, if any, for the caller to close; the
    /// snapshot itself no longer references it.
    pub fn remove_broker(&self, broker: &Broker) -> (Self, Option<BrokerChannel>) {
        let mut next = self.clone();

        let chan = next.chans_by_node_id.remove(&broker.node_id);
        if let Some(chan) = &chan {
            next.chans_by_endpoint.remove(&chan.endpoint());
        }
        next.brokers_by_node_id.remove(&broker.node_id);
        next.brokers_by_topic_partition
            .retain(|_, b| b.node_id != broker.node_id);
        next.brokers_by_group.retain(|_, b| b.node_id != broker.node_id);
        if next.bootstrap_broker.as_ref() == Some(broker) {
            next.bootstrap_broker = None;
        }

        next.version += 1;
        (next, chan)
    }
}
