//! Protocol error codes carried inside otherwise-successful responses.
//!
//! # References
//! - <https://kafka.apache.org/protocol#protocol_error_codes>

use thiserror::Error;

/// A non-zero error code from a response.
///
/// Code 0 (`NONE`) is represented as the absence of an error, so response
/// structs carry `Option<ErrorCode>` and [`ErrorCode::new`] returns `None`
/// for it.
#[derive(Debug, Error, PartialEq, Eq, Hash, Clone, Copy)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum ErrorCode {
    #[error("Unknown server error")]
    UnknownServerError,

    #[error("The requested offset is not within the range of offsets maintained by the server")]
    OffsetOutOfRange,

    #[error("The message failed its checksum or is otherwise corrupt")]
    InvalidMessage,

    #[error("This server does not host this topic-partition")]
    UnknownTopicOrPartition,

    #[error("There is no leader for this topic-partition, a leader election is underway")]
    LeaderNotAvailable,

    #[error("This broker is not the leader for that topic-partition")]
    NotLeaderForPartition,

    #[error("The request timed out")]
    RequestTimedOut,

    #[error("Messages are rejected since there are fewer in-sync replicas than required")]
    NotEnoughReplicas,

    #[error("Messages are written to the log, but to fewer in-sync replicas than required")]
    NotEnoughReplicasAfterAppend,

    #[error("The group coordinator is loading and cannot process requests")]
    GroupLoadInProgress,

    #[error("The group coordinator is not available")]
    GroupCoordinatorNotAvailable,

    #[error("This broker is not the coordinator for that group")]
    NotCoordinatorForGroup,

    #[error("The generation id in the request is not the current generation")]
    IllegalGeneration,

    #[error("The coordinator does not know this member id")]
    UnknownMemberId,

    #[error("The group is rebalancing, the member should rejoin")]
    RebalanceInProgress,

    #[error("Unknown error code {0}")]
    Unknown(i16),
}

impl ErrorCode {
    /// Converts a wire error code, `None` meaning success.
    pub fn new(code: i16) -> Option<Self> {
        match code {
            0 => None,
            code => Some(Self::from(code)),
        }
    }

    /// Whether the broker advertises this condition as transient.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::InvalidMessage
                | Self::UnknownTopicOrPartition
                | Self::LeaderNotAvailable
                | Self::NotLeaderForPartition
                | Self::RequestTimedOut
                | Self::NotEnoughReplicas
                | Self::NotEnoughReplicasAfterAppend
                | Self::GroupLoadInProgress
                | Self::GroupCoordinatorNotAvailable
                | Self::NotCoordinatorForGroup
        )
    }
}

impl From<i16> for ErrorCode {
    fn from(code: i16) -> Self {
        match code {
            -1 => Self::UnknownServerError,
            1 => Self::OffsetOutOfRange,
            2 => Self::InvalidMessage,
            3 => Self::UnknownTopicOrPartition,
            5 => Self::LeaderNotAvailable,
            6 => Self::NotLeaderForPartition,
            7 => Self::RequestTimedOut,
            14 => Self::GroupLoadInProgress,
            15 => Self::GroupCoordinatorNotAvailable,
            16 => Self::NotCoordinatorForGroup,
            19 => Self::NotEnoughReplicas,
            20 => Self::NotEnoughReplicasAfterAppend,
            22 => Self::IllegalGeneration,
            25 => Self::UnknownMemberId,
            27 => Self::RebalanceInProgress,
            _ => Self::Unknown(code),
        }
    }
}

impl From<ErrorCode> for i16 {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::UnknownServerError => -1,
            ErrorCode::OffsetOutOfRange => 1,
            ErrorCode::InvalidMessage => 2,
            ErrorCode::UnknownTopicOrPartition => 3,
            ErrorCode::LeaderNotAvailable => 5,
            ErrorCode::NotLeaderForPartition => 6,
            ErrorCode::RequestTimedOut => 7,
            ErrorCode::GroupLoadInProgress => 14,
            ErrorCode::GroupCoordinatorNotAvailable => 15,
            ErrorCode::NotCoordinatorForGroup => 16,
            ErrorCode::NotEnoughReplicas => 19,
            ErrorCode::NotEnoughReplicasAfterAppend => 20,
            ErrorCode::IllegalGeneration => 22,
            ErrorCode::UnknownMemberId => 25,
            ErrorCode::RebalanceInProgress => 27,
            ErrorCode::Unknown(code) => code,
        }
    }
}
