use crate::protocol::error::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionCommit {
    /// The partition index.
    pub partition_index: i32,

    /// The message offset to be committed.
    pub committed_offset: i64,

    /// Any associated metadata the client wants to keep.
    pub committed_metadata: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicCommit {
    /// The topic name.
    pub name: String,

    /// Each partition to commit offsets for.
    pub partitions: Vec<PartitionCommit>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetCommitRequest {
    /// The unique group identifier.
    pub group_id: String,

    /// The generation of the group.
    pub generation_id: i32,

    /// The member ID assigned by the group coordinator.
    pub member_id: String,

    /// The time period in ms to retain the offset.
    pub retention_time_ms: i64,

    /// The topics to commit offsets for.
    pub topics: Vec<TopicCommit>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionCommitResult {
    /// The partition index.
    pub partition_index: i32,

    /// The commit error if any.
    pub error_code: Option<ErrorCode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicCommitResult {
    /// The topic name.
    pub name: String,

    /// The responses for each partition in the topic.
    pub partitions: Vec<PartitionCommitResult>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetCommitResponse {
    pub throttle_time_ms: Option<i32>,

    /// The responses for each topic.
    pub topics: Vec<TopicCommitResult>,
}
