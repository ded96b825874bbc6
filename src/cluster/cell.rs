//! Single-writer cell holding the committed cluster state.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::cluster::state::ClusterState;

/// The sole mutation point for [`ClusterState`].
///
/// Writers are serialized behind one async mutex; readers take lock-free
/// snapshots of the last committed state. Concurrent callers that detect the
/// same fault all enqueue here, and the later ones observe the state already
/// repaired by the first, so a fault storm costs one recovery round-trip.
#[derive(Debug, Default)]
pub struct StateCell {
    committed: RwLock<Arc<ClusterState>>,
    writer: Mutex<()>,
}

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking read of the last committed snapshot.
    pub fn peek(&self) -> Arc<ClusterState> {
        self.committed.read().clone()
    }

    /// Applies `f` to the committed state and commits the result.
    pub async fn update<F>(&self, f: F) -> Arc<ClusterState>
    where
        F: FnOnce(&ClusterState) -> ClusterState,
    {
        let _writer = self.writer.lock().await;
        let current = self.peek();
        let next = Arc::new(f(&current));
        *self.committed.write() = Arc::clone(&next);
        next
    }

    /// As [`update`](Self::update), handing a result back to the submitting
    /// caller.
    pub async fn update_with_result<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ClusterState) -> (ClusterState, R),
    {
        let _writer = self.writer.lock().await;
        let current = self.peek();
        let (next, result) = f(&current);
        *self.committed.write() = Arc::new(next);
        result
    }

    /// Holds the writer slot for the duration of `f`; other updaters queue.
    ///
    /// Nothing is committed when `f` fails.
    pub async fn update_async<F, Fut, R, E>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(Arc<ClusterState>) -> Fut,
        Fut: Future<Output = Result<(Arc<ClusterState>, R), E>>,
    {
        let _writer = self.writer.lock().await;
        let current = self.peek();
        let (next, result) = f(current).await?;
        *self.committed.write() = next;
        Ok(result)
    }

    /// Closes every channel in the committed snapshot.
    pub async fn dispose(&self) {
        let _writer = self.writer.lock().await;
        let state = self.peek();
        for chan in state.channels() {
            chan.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn updates_are_serialized() {
        let cell = Arc::new(StateCell::new());

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let cell = Arc::clone(&cell);
                tokio::spawn(async move {
                    cell.update(|state| {
                        state.update_bootstrap_broker(crate::cluster::state::Broker {
                            node_id: crate::cluster::state::BOOTSTRAP_NODE_ID,
                            host: "seed".to_owned(),
                            port: 9092,
                        })
                    })
                    .await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        // Every update committed exactly once, none lost to a race.
        assert_eq!(cell.peek().version(), 32);
    }

    #[tokio::test]
    async fn update_async_holds_the_writer_slot() {
        let cell = Arc::new(StateCell::new());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let slow = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move {
                cell.update_async(|state| async move {
                    started_tx.send(()).unwrap();
                    release_rx.await.unwrap();
                    Ok::<_, ()>((
                        Arc::new(state.update_bootstrap_broker(
                            crate::cluster::state::Broker {
                                node_id: crate::cluster::state::BOOTSTRAP_NODE_ID,
                                host: "first".to_owned(),
                                port: 9092,
                            },
                        )),
                        (),
                    ))
                })
                .await
            })
        };

        // Enqueue a second updater only once the first holds the slot.
        started_rx.await.unwrap();
        let queued = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move {
                cell.update_with_result(|state| {
                    // By the time this runs the slow updater has committed.
                    let observed = state.bootstrap_broker().map(|b| b.host.clone());
                    (state.clone(), observed)
                })
                .await
            })
        };

        tokio::task::yield_now().await;
        release_tx.send(()).unwrap();

        slow.await.unwrap().unwrap();
        let observed = queued.await.unwrap();
        assert_eq!(observed.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn failed_update_commits_nothing() {
        let cell = StateCell::new();
        let result: Result<(), &str> = cell
            .update_async(|state| async move {
                let next = state.update_bootstrap_broker(crate::cluster::state::Broker {
                    node_id: crate::cluster::state::BOOTSTRAP_NODE_ID,
                    host: "seed".to_owned(),
                    port: 9092,
                });
                let _ = next;
                Err("refresh failed")
            })
            .await;

        assert!(result.is_err());
        assert_eq!(cell.peek().version(), 0);
        assert!(cell.peek().bootstrap_broker().is_none());
    }
}
