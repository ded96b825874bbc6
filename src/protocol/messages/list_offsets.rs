use crate::protocol::error::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsRequest {
    /// The broker ID of the requester, or -1 if this request is from a
    /// consumer.
    pub replica_id: i32,

    /// Each topic to list offsets for.
    pub topics: Vec<ListOffsetsRequestTopic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsRequestTopic {
    /// The topic name.
    pub name: String,

    /// Each partition to list offsets for.
    pub partitions: Vec<ListOffsetsRequestPartition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsRequestPartition {
    /// The partition index.
    pub partition_index: i32,

    /// The current timestamp, -1 for the latest offset, -2 for the earliest.
    pub timestamp: i64,

    /// The maximum number of offsets to report.
    pub max_num_offsets: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsResponse {
    pub throttle_time_ms: Option<i32>,

    /// Each topic in the response.
    pub topics: Vec<ListOffsetsResponseTopic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsResponseTopic {
    /// The topic name.
    pub name: String,

    /// Each partition in the response.
    pub partitions: Vec<ListOffsetsResponsePartition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsResponsePartition {
    /// The partition index.
    pub partition_index: i32,

    /// The partition error if any.
    pub error_code: Option<ErrorCode>,

    /// The result offsets.
    pub offsets: Vec<i64>,
}
