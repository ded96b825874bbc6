use bytes::Bytes;

use crate::protocol::error::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// The broker ID of the follower, or -1 if this request is from a
    /// consumer.
    pub replica_id: i32,

    /// The maximum time in milliseconds to wait for the response.
    pub max_wait_ms: i32,

    /// The minimum bytes to accumulate in the response.
    pub min_bytes: i32,

    /// The maximum bytes to fetch.
    pub max_bytes: Option<i32>,

    /// The topics to fetch.
    pub topics: Vec<FetchRequestTopic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequestTopic {
    /// The name of the topic to fetch.
    pub topic: String,

    /// The partitions to fetch.
    pub partitions: Vec<FetchRequestPartition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequestPartition {
    /// The partition index.
    pub partition: i32,

    /// The message offset.
    pub fetch_offset: i64,

    /// The maximum bytes to fetch from this partition.
    pub partition_max_bytes: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    /// The duration in milliseconds for which the request was throttled due
    /// to a quota violation, or zero if the request did not violate any
    /// quota.
    pub throttle_time_ms: Option<i32>,

    /// The response topics.
    pub responses: Vec<FetchResponseTopic>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponseTopic {
    /// The topic name.
    pub topic: String,

    /// The topic partitions.
    pub partitions: Vec<FetchResponsePartition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponsePartition {
    /// The partition index.
    pub partition_index: i32,

    /// The partition error if any.
    pub error_code: Option<ErrorCode>,

    /// The current high water mark.
    pub high_watermark: i64,

    /// The fetched record batch, opaque to the routing core.
    pub records: Bytes,
}
