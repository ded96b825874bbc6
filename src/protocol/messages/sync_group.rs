use bytes::Bytes;

use crate::protocol::error::ErrorCode;

#[derive(Debug, Clone, PartialEq)]
pub struct SyncGroupRequest {
    /// The group identifier.
    pub group_id: String,

    /// The generation of the group.
    pub generation_id: i32,

    /// The member ID assigned by the group.
    pub member_id: String,

    /// Each assignment, set only by the group leader.
    pub assignments: Vec<SyncGroupRequestAssignment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncGroupRequestAssignment {
    /// The ID of the member to assign.
    pub member_id: String,

    /// The member assignment, opaque to the routing core.
    pub assignment: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncGroupResponse {
    pub throttle_time_ms: Option<i32>,

    /// The error if any.
    pub error_code: Option<ErrorCode>,

    /// This member's assignment.
    pub assignment: Bytes,
}
