//! Cluster topology: state snapshots, routing, error classification and the
//! single-writer cell that serializes recovery.

pub mod cell;
pub mod classify;
pub mod router;
pub mod state;

pub use cell::StateCell;
pub use classify::{classify, RecoveryAction};
pub use router::{route, RouteType};
pub use state::{Broker, ClusterState, BOOTSTRAP_NODE_ID};
