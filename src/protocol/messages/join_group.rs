use bytes::Bytes;

use crate::protocol::error::ErrorCode;

#[derive(Debug, Clone, PartialEq)]
pub struct JoinGroupRequest {
    /// The group identifier.
    pub group_id: String,

    /// The coordinator considers the consumer dead if it receives no
    /// heartbeat after this timeout in milliseconds.
    pub session_timeout_ms: i32,

    /// The maximum time in milliseconds that the coordinator will wait for
    /// each member to rejoin when rebalancing the group.
    pub rebalance_timeout_ms: i32,

    /// The member id assigned by the group coordinator, empty on first join.
    pub member_id: String,

    /// The unique name the for class of protocols implemented by the group.
    pub protocol_type: String,

    /// The list of protocols that the member supports.
    pub protocols: Vec<JoinGroupProtocol>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinGroupProtocol {
    /// The protocol name.
    pub name: String,

    /// The protocol metadata, opaque to the routing core.
    pub metadata: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinGroupResponse {
    pub throttle_time_ms: Option<i32>,

    /// The error if any.
    pub error_code: Option<ErrorCode>,

    /// The generation ID of the group.
    pub generation_id: i32,

    /// The group protocol selected by the coordinator.
    pub protocol_name: String,

    /// The leader of the group.
    pub leader: String,

    /// The member ID assigned by the group coordinator.
    pub member_id: String,

    /// The group members, only populated for the leader.
    pub members: Vec<JoinGroupResponseMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinGroupResponseMember {
    /// The group member ID.
    pub member_id: String,

    /// The group member metadata.
    pub metadata: Bytes,
}
