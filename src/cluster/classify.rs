//! Translation of protocol error codes into recovery actions.

use crate::protocol::error::ErrorCode;
use crate::protocol::messages::ResponseMessage;

/// What the engine must do about an error code found in a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Routing state for these topics is stale; refresh and re-route.
    RefreshMetadata(Vec<String>),

    /// The fault is transient on the broker side; back off and resend.
    WaitAndRetry,

    /// Deliver the response as-is; a higher layer owns this error.
    PassThru,

    /// The core refuses to absorb this; fail the request.
    Escalate,
}

/// Finds the first error in a response and maps it to a recovery action.
///
/// Scan order is the received order, topics outermost. Returns `None` when
/// the response carries no error anywhere the core looks.
pub fn classify(response: &ResponseMessage) -> Option<(ErrorCode, RecoveryAction)> {
    use ResponseMessage::*;

    match response {
        // The producer layer interprets per-partition produce results.
        Produce(_) => None,

        Metadata(r) => r.topics.iter().find_map(|topic| {
            topic
                .error_code
                .map(|code| (code, topic_action(code, &topic.name)))
                .or_else(|| {
                    topic.partitions.iter().find_map(|partition| {
                        partition
                            .error_code
                            .map(|code| (code, topic_action(code, &topic.name)))
                    })
                })
        }),

        Fetch(r) => r.responses.iter().find_map(|topic| {
            topic.partitions.iter().find_map(|partition| {
                partition
                    .error_code
                    .map(|code| (code, topic_action(code, &topic.topic)))
            })
        }),

        ListOffsets(r) => r.topics.iter().find_map(|topic| {
            topic.partitions.iter().find_map(|partition| {
                partition
                    .error_code
                    .map(|code| (code, topic_action(code, &topic.name)))
            })
        }),

        OffsetCommit(r) => {
            let topics: Vec<String> = r.topics.iter().map(|t| t.name.clone()).collect();
            r.topics.iter().find_map(|topic| {
                topic.partitions.iter().find_map(|partition| {
                    partition
                        .error_code
                        .map(|code| (code, group_topic_action(code, &topics)))
                })
            })
        }

        OffsetFetch(r) => {
            let topics: Vec<String> = r.topics.iter().map(|t| t.name.clone()).collect();
            r.topics.iter().find_map(|topic| {
                topic.partitions.iter().find_map(|partition| {
                    partition
                        .error_code
                        .map(|code| (code, group_topic_action(code, &topics)))
                })
            })
        }

        Heartbeat(r) => r.error_code.map(|code| (code, member_action(code))),
        SyncGroup(r) => r.error_code.map(|code| (code, member_action(code))),

        JoinGroup(r) => r.error_code.map(|code| {
            let action = match code {
                ErrorCode::UnknownMemberId => RecoveryAction::PassThru,
                code => base_action(code),
            };
            (code, action)
        }),

        LeaveGroup(r) => r.error_code.map(|code| (code, base_action(code))),
        FindCoordinator(r) => r.error_code.map(|code| (code, base_action(code))),
        ApiVersions(r) => r.error_code.map(|code| (code, base_action(code))),
        ListGroups(r) => r.error_code.map(|code| (code, base_action(code))),

        DescribeGroups(r) => r
            .groups
            .iter()
            .find_map(|group| group.error_code.map(|code| (code, base_action(code)))),
    }
}

/// The top-level rule table, applied where no nested override matches.
fn base_action(code: ErrorCode) -> RecoveryAction {
    use ErrorCode::*;

    match code {
        LeaderNotAvailable | RequestTimedOut | GroupLoadInProgress
        | GroupCoordinatorNotAvailable | NotEnoughReplicas | NotEnoughReplicasAfterAppend => {
            RecoveryAction::WaitAndRetry
        }

        NotCoordinatorForGroup | IllegalGeneration | OffsetOutOfRange | UnknownMemberId => {
            RecoveryAction::PassThru
        }

        // UnknownTopicOrPartition, InvalidMessage and anything unrecognized.
        _ => RecoveryAction::Escalate,
    }
}

/// Override for errors nested under a topic in Metadata/Fetch/ListOffsets:
/// stale-leader signals refresh that topic instead of escalating.
fn topic_action(code: ErrorCode, topic: &str) -> RecoveryAction {
    match code {
        ErrorCode::UnknownTopicOrPartition | ErrorCode::NotLeaderForPartition => {
            RecoveryAction::RefreshMetadata(vec![topic.to_owned()])
        }
        code => base_action(code),
    }
}

/// Override for the offset-management responses, which carry both group and
/// topic context: membership errors belong to the consumer layer, moved
/// coordinators refresh the affected topics.
fn group_topic_action(code: ErrorCode, topics: &[String]) -> RecoveryAction {
    use ErrorCode::*;

    match code {
        UnknownMemberId | IllegalGeneration | RebalanceInProgress => RecoveryAction::PassThru,
        NotCoordinatorForGroup | GroupCoordinatorNotAvailable => {
            RecoveryAction::RefreshMetadata(topics.to_vec())
        }
        code => base_action(code),
    }
}

/// Override for the topic-less group-protocol responses.
fn member_action(code: ErrorCode) -> RecoveryAction {
    use ErrorCode::*;

    match code {
        UnknownMemberId | IllegalGeneration | RebalanceInProgress => RecoveryAction::PassThru,
        code => base_action(code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;

    use crate::protocol::messages::*;

    fn fetch_response(errors: &[(&str, &[Option<ErrorCode>])]) -> ResponseMessage {
        ResponseMessage::Fetch(FetchResponse {
            throttle_time_ms: None,
            responses: errors
                .iter()
                .map(|(topic, partitions)| FetchResponseTopic {
                    topic: topic.to_string(),
                    partitions: partitions
                        .iter()
                        .enumerate()
                        .map(|(i, error_code)| FetchResponsePartition {
                            partition_index: i as i32,
                            error_code: *error_code,
                            high_watermark: 0,
                            records: Bytes::new(),
                        })
                        .collect(),
                })
                .collect(),
        })
    }

    #[test]
    fn clean_responses_classify_to_none() {
        assert_eq!(classify(&fetch_response(&[("t", &[None, None])])), None);

        let heartbeat = ResponseMessage::Heartbeat(HeartbeatResponse {
            throttle_time_ms: None,
            error_code: None,
        });
        assert_eq!(classify(&heartbeat), None);
    }

    #[test]
    fn produce_responses_always_pass_through_unclassified() {
        let response = ResponseMessage::Produce(ProduceResponse {
            throttle_time_ms: None,
            topics: vec![ProduceResponseTopic {
                name: "t".to_owned(),
                partitions: vec![ProduceResponsePartition {
                    partition_index: 0,
                    error_code: Some(ErrorCode::NotLeaderForPartition),
                    base_offset: -1,
                }],
            }],
        });

        assert_eq!(classify(&response), None);
    }

    #[test]
    fn stale_leader_in_fetch_refreshes_that_topic() {
        let response = fetch_response(&[
            ("a", &[None]),
            ("b", &[None, Some(ErrorCode::NotLeaderForPartition)]),
            ("c", &[Some(ErrorCode::UnknownTopicOrPartition)]),
        ]);

        // First erroring entry wins, in received order.
        assert_eq!(
            classify(&response),
            Some((
                ErrorCode::NotLeaderForPartition,
                RecoveryAction::RefreshMetadata(vec!["b".to_owned()])
            ))
        );
    }

    #[test]
    fn unknown_topic_nested_refreshes_but_top_level_escalates() {
        let nested = fetch_response(&[("t", &[Some(ErrorCode::UnknownTopicOrPartition)])]);
        assert_eq!(
            classify(&nested),
            Some((
                ErrorCode::UnknownTopicOrPartition,
                RecoveryAction::RefreshMetadata(vec!["t".to_owned()])
            ))
        );

        let top_level = ResponseMessage::ListGroups(ListGroupsResponse {
            throttle_time_ms: None,
            error_code: Some(ErrorCode::UnknownTopicOrPartition),
            groups: vec![],
        });
        assert_eq!(
            classify(&top_level),
            Some((ErrorCode::UnknownTopicOrPartition, RecoveryAction::Escalate))
        );
    }

    #[test]
    fn transient_broker_faults_wait_and_retry() {
        for code in [
            ErrorCode::LeaderNotAvailable,
            ErrorCode::RequestTimedOut,
            ErrorCode::GroupLoadInProgress,
            ErrorCode::GroupCoordinatorNotAvailable,
            ErrorCode::NotEnoughReplicas,
            ErrorCode::NotEnoughReplicasAfterAppend,
        ] {
            let response = ResponseMessage::FindCoordinator(FindCoordinatorResponse {
                throttle_time_ms: None,
                error_code: Some(code),
                node_id: -1,
                host: String::new(),
                port: -1,
            });
            assert_eq!(classify(&response), Some((code, RecoveryAction::WaitAndRetry)));

            // Backing off only makes sense for faults the broker itself
            // advertises as transient.
            assert!(code.is_retriable(), "{code:?}");
        }
    }

    #[test]
    fn membership_errors_pass_through_to_the_group_layer() {
        for code in [
            ErrorCode::UnknownMemberId,
            ErrorCode::IllegalGeneration,
            ErrorCode::RebalanceInProgress,
        ] {
            let heartbeat = ResponseMessage::Heartbeat(HeartbeatResponse {
                throttle_time_ms: None,
                error_code: Some(code),
            });
            assert_eq!(classify(&heartbeat), Some((code, RecoveryAction::PassThru)));

            let sync = ResponseMessage::SyncGroup(SyncGroupResponse {
                throttle_time_ms: None,
                error_code: Some(code),
                assignment: Bytes::new(),
            });
            assert_eq!(classify(&sync), Some((code, RecoveryAction::PassThru)));
        }

        let join = ResponseMessage::JoinGroup(JoinGroupResponse {
            throttle_time_ms: None,
            error_code: Some(ErrorCode::UnknownMemberId),
            generation_id: -1,
            protocol_name: String::new(),
            leader: String::new(),
            member_id: String::new(),
            members: vec![],
        });
        assert_eq!(
            classify(&join),
            Some((ErrorCode::UnknownMemberId, RecoveryAction::PassThru))
        );
    }

    #[test]
    fn moved_coordinator_with_topic_context_refreshes_those_topics() {
        let response = ResponseMessage::OffsetCommit(OffsetCommitResponse {
            throttle_time_ms: None,
            topics: vec![
                TopicCommitResult {
                    name: "a".to_owned(),
                    partitions: vec![PartitionCommitResult {
                        partition_index: 0,
                        error_code: None,
                    }],
                },
                TopicCommitResult {
                    name: "b".to_owned(),
                    partitions: vec![PartitionCommitResult {
                        partition_index: 0,
                        error_code: Some(ErrorCode::NotCoordinatorForGroup),
                    }],
                },
            ],
        });

        assert_eq!(
            classify(&response),
            Some((
                ErrorCode::NotCoordinatorForGroup,
                RecoveryAction::RefreshMetadata(vec!["a".to_owned(), "b".to_owned()])
            ))
        );
    }

    #[test]
    fn moved_coordinator_without_topic_context_passes_through() {
        let heartbeat = ResponseMessage::Heartbeat(HeartbeatResponse {
            throttle_time_ms: None,
            error_code: Some(ErrorCode::NotCoordinatorForGroup),
        });
        assert_eq!(
            classify(&heartbeat),
            Some((ErrorCode::NotCoordinatorForGroup, RecoveryAction::PassThru))
        );
    }

    #[test]
    fn unrecognized_codes_escalate() {
        let response = ResponseMessage::ListGroups(ListGroupsResponse {
            throttle_time_ms: None,
            error_code: Some(ErrorCode::Unknown(87)),
            groups: vec![],
        });
        assert_eq!(
            classify(&response),
            Some((ErrorCode::Unknown(87), RecoveryAction::Escalate))
        );
    }

    #[test]
    fn metadata_topic_error_checked_before_partitions() {
        let response = ResponseMessage::Metadata(MetadataResponse {
            throttle_time_ms: None,
            brokers: vec![],
            controller_id: None,
            topics: vec![MetadataResponseTopic {
                error_code: Some(ErrorCode::UnknownTopicOrPartition),
                name: "t".to_owned(),
                partitions: vec![MetadataResponsePartition {
                    error_code: Some(ErrorCode::LeaderNotAvailable),
                    partition_index: 0,
                    leader_id: -1,
                }],
            }],
        });

        assert_eq!(
            classify(&response),
            Some((
                ErrorCode::UnknownTopicOrPartition,
                RecoveryAction::RefreshMetadata(vec!["t".to_owned()])
            ))
        );
    }
}
