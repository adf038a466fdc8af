//! Feed registry: a single owner task serialising register/unregister/fan-out
//! so that fan-out iteration always sees a stable snapshot, without holding a
//! lock across the `.await` points of per-session enqueue.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::feed_policy::FeedPolicy;
use crate::message_id::MessageId;

/// A session's handle in the registry: enough to push a sync-queue entry and
/// to check whether its feed policy allows a newsgroup.
#[derive(Clone)]
pub struct FeedHandle {
    pub session_id: u64,
    pub policy: FeedPolicy,
    pub sync_tx: mpsc::Sender<MessageId>,
}

enum RegistryMessage {
    Register(FeedHandle),
    Unregister(u64),
    FanOut { msgid: MessageId, newsgroup: String },
    Snapshot(oneshot::Sender<Vec<u64>>),
}

/// Handle to the running registry task. Cloning is cheap; every clone shares
/// the same underlying task.
#[derive(Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryMessage>,
}

impl RegistryHandle {
    pub async fn register(&self, handle: FeedHandle) {
        let _ = self.tx.send(RegistryMessage::Register(handle)).await;
    }

    pub async fn unregister(&self, session_id: u64) {
        let _ = self.tx.send(RegistryMessage::Unregister(session_id)).await;
    }

    /// Fans `msgid` out to every registered session whose policy allows
    /// `newsgroup`. Per-session enqueue is non-blocking with drop-oldest on a
    /// full sync queue (§5); this call itself never blocks on a slow peer.
    pub async fn fan_out(&self, msgid: MessageId, newsgroup: String) {
        let _ = self
            .tx
            .send(RegistryMessage::FanOut { msgid, newsgroup })
            .await;
    }

    /// Returns the set of currently registered session ids. Used by tests
    /// and diagnostics.
    pub async fn snapshot_ids(&self) -> Vec<u64> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(RegistryMessage::Snapshot(reply_tx)).await.is_err() {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }
}

/// Spawns the registry's owner task, returning a cloneable handle to it.
pub fn spawn() -> RegistryHandle {
    let (tx, mut rx) = mpsc::channel(256);
    tokio::spawn(async move {
        let mut sessions: HashMap<u64, FeedHandle> = HashMap::new();
        while let Some(msg) = rx.recv().await {
            match msg {
                RegistryMessage::Register(handle) => {
                    debug!(session_id = handle.session_id, "feed registered");
                    sessions.insert(handle.session_id, handle);
                }
                RegistryMessage::Unregister(id) => {
                    debug!(session_id = id, "feed unregistered");
                    sessions.remove(&id);
                }
                RegistryMessage::FanOut { msgid, newsgroup } => {
                    for handle in sessions.values() {
                        if !handle.policy.allows_newsgroup(&newsgroup) {
                            continue;
                        }
                        if let Err(e) = handle.sync_tx.try_send(msgid.clone()) {
                            match e {
                                mpsc::error::TrySendError::Full(_) => {
                                    tracing::warn!(
                                        session_id = handle.session_id,
                                        "sync queue full, dropping fan-out enqueue"
                                    );
                                }
                                mpsc::error::TrySendError::Closed(_) => {}
                            }
                        }
                    }
                }
                RegistryMessage::Snapshot(reply) => {
                    let _ = reply.send(sessions.keys().copied().collect());
                }
            }
        }
    });
    RegistryHandle { tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedPolicyConfig;

    fn policy(include: &[&str]) -> FeedPolicy {
        FeedPolicy::from_config(&FeedPolicyConfig {
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: vec![],
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_register_then_snapshot() {
        let registry = spawn();
        let (tx, _rx) = mpsc::channel(8);
        registry
            .register(FeedHandle {
                session_id: 1,
                policy: policy(&["overchan.*"]),
                sync_tx: tx,
            })
            .await;
        assert_eq!(registry.snapshot_ids().await, vec![1]);
    }

    #[tokio::test]
    async fn test_unregister_removes_session() {
        let registry = spawn();
        let (tx, _rx) = mpsc::channel(8);
        registry
            .register(FeedHandle {
                session_id: 1,
                policy: policy(&["overchan.*"]),
                sync_tx: tx,
            })
            .await;
        registry.unregister(1).await;
        assert!(registry.snapshot_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_fan_out_respects_policy() {
        let registry = spawn();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        registry
            .register(FeedHandle {
                session_id: 1,
                policy: policy(&["overchan.*"]),
                sync_tx: tx1,
            })
            .await;
        registry
            .register(FeedHandle {
                session_id: 2,
                policy: policy(&["ctl"]),
                sync_tx: tx2,
            })
            .await;
        let msgid = MessageId::parse("<a1$1@host.example>").unwrap();
        registry
            .fan_out(msgid.clone(), "overchan.random".to_string())
            .await;
        // The registry task drains its channel in order, so by the time this
        // snapshot reply arrives the fan-out above has already been applied.
        registry.snapshot_ids().await;
        assert_eq!(rx1.try_recv().unwrap(), msgid);
        assert!(rx2.try_recv().is_err());
    }
}
