use bytes::Bytes;

use crate::protocol::error::ErrorCode;

#[derive(Debug, Clone, PartialEq)]
pub struct ProduceRequest {
    /// The number of acknowledgments the producer requires the leader to have
    /// received before considering a request complete.
    ///
    /// Allowed values: 0 for no acknowledgments, 1 for only the leader and -1
    /// for the full ISR.
    pub required_acks: i16,

    /// The timeout to await a response in milliseconds.
    pub timeout_ms: i32,

    /// Each topic to produce to.
    pub topics: Vec<ProduceRequestTopic>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProduceRequestTopic {
    /// The topic name
    pub name: String,

    /// Each partition to produce to.
    pub partitions: Vec<ProduceRequestPartition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProduceRequestPartition {
    /// The partition index
    pub partition_index: i32,

    /// The record batch, opaque to the routing core.
    pub records: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceResponse {
    pub throttle_time_ms: Option<i32>,

    /// Each produce response
    pub topics: Vec<ProduceResponseTopic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceResponseTopic {
    /// The topic name
    pub name: String,

    /// Each partition that we produced to within the topic.
    pub partitions: Vec<ProduceResponsePartition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceResponsePartition {
    /// The partition index
    pub partition_index: i32,

    /// The partition error if any.
    ///
    /// The producer layer interprets these; the routing core passes them
    /// through untouched.
    pub error_code: Option<ErrorCode>,

    /// The base offset of the appended batch.
    pub base_offset: i64,
}
