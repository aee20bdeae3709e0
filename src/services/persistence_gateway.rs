//! Request/reply bridge between the group store and the storage backend.
//!
//! A single worker task owns the backend and serves requests strictly in the
//! order they were sent. Each request carries its own completion handle, so a
//! reply can only ever reach the caller that issued the request.

use std::sync::Arc;

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        group_store::GroupBackend,
        storage::{StorageError, StorageResult},
    },
    dto::ipc::{GatewayReply, GatewayRequest, ReplyStatus},
    state::groups::GroupCollection,
};

/// Identifier attached to every gateway request.
pub type RequestId = Uuid;

const QUEUE_CAPACITY: usize = 32;

struct Envelope {
    id: RequestId,
    request: GatewayRequest,
    reply: oneshot::Sender<GatewayReply>,
}

/// Cloneable handle used to talk to the persistence worker.
#[derive(Clone)]
pub struct PersistenceGateway {
    tx: mpsc::Sender<Envelope>,
}

impl PersistenceGateway {
    /// Spawn the worker task serving `backend` and return a handle to it.
    ///
    /// The worker stops once every handle has been dropped.
    pub fn spawn(backend: Arc<dyn GroupBackend>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let worker = tokio::spawn(run_worker(backend, rx));
        (Self { tx }, worker)
    }

    /// `get-options`: read the whole persisted collection.
    ///
    /// A backend that cannot read its storage answers `error`, which is
    /// returned as an error rather than as an empty collection.
    pub async fn get_options(&self) -> StorageResult<GroupCollection> {
        match self.request(GatewayRequest::GetOptions).await? {
            GatewayReply::Options(groups) => Ok(groups),
            GatewayReply::Status(ReplyStatus::Error) => Err(StorageError::Rejected {
                message: "backend could not read the stored groups".into(),
            }),
            GatewayReply::Status(ReplyStatus::Success) => Err(StorageError::Rejected {
                message: "unexpected success reply to get-options".into(),
            }),
        }
    }

    /// `save-options`: replace the persisted collection with `groups`.
    pub async fn save_options(&self, groups: GroupCollection) -> StorageResult<()> {
        match self.request(GatewayRequest::SaveOptions(groups)).await? {
            GatewayReply::Status(ReplyStatus::Success) => Ok(()),
            GatewayReply::Status(ReplyStatus::Error) => Err(StorageError::Rejected {
                message: "backend reported an error".into(),
            }),
            GatewayReply::Options(_) => Err(StorageError::Rejected {
                message: "unexpected options reply to save-options".into(),
            }),
        }
    }

    async fn request(&self, request: GatewayRequest) -> StorageResult<GatewayReply> {
        let id = Uuid::new_v4();
        let channel = request.channel();
        let (reply_tx, reply_rx) = oneshot::channel();

        debug!(request_id = %id, channel, "sending gateway request");
        self.tx
            .send(Envelope {
                id,
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| StorageError::GatewayClosed)?;

        reply_rx.await.map_err(|_| StorageError::GatewayClosed)
    }
}

async fn run_worker(backend: Arc<dyn GroupBackend>, mut rx: mpsc::Receiver<Envelope>) {
    info!("persistence gateway started");

    while let Some(Envelope { id, request, reply }) = rx.recv().await {
        let channel = request.channel();
        let response = match request {
            GatewayRequest::GetOptions => match backend.load_groups().await {
                Ok(groups) => GatewayReply::Options(groups),
                Err(err) => {
                    error!(request_id = %id, error = %err, "loading groups failed");
                    GatewayReply::Status(ReplyStatus::Error)
                }
            },
            GatewayRequest::SaveOptions(groups) => match backend.save_groups(groups).await {
                Ok(()) => GatewayReply::Status(ReplyStatus::Success),
                Err(err) => {
                    error!(request_id = %id, error = %err, "saving groups failed");
                    GatewayReply::Status(ReplyStatus::Error)
                }
            },
        };

        if reply.send(response).is_err() {
            warn!(request_id = %id, channel, "requester went away before the reply");
        } else {
            debug!(request_id = %id, channel, "gateway reply sent");
        }
    }

    info!("persistence gateway stopped");
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::dao::group_store::memory::MemoryGroupStore;

    fn single(name: &str) -> GroupCollection {
        let mut raw = IndexMap::new();
        raw.insert(name.to_string(), Vec::new());
        GroupCollection::from(raw)
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let backend = MemoryGroupStore::new();
        let (gateway, _worker) = PersistenceGateway::spawn(Arc::new(backend.clone()));

        gateway.save_options(single("a")).await.unwrap();

        assert_eq!(gateway.get_options().await.unwrap(), single("a"));
    }

    #[tokio::test]
    async fn failed_save_maps_to_error_reply() {
        let backend = MemoryGroupStore::new();
        backend.fail_next_saves(1);
        let (gateway, _worker) = PersistenceGateway::spawn(Arc::new(backend.clone()));

        let err = gateway.save_options(single("a")).await.unwrap_err();

        assert!(matches!(err, StorageError::Rejected { .. }));
    }

    #[tokio::test]
    async fn failed_load_is_an_error_not_an_empty_collection() {
        let backend = MemoryGroupStore::with_groups(single("a"));
        backend.set_unavailable(true);
        let (gateway, _worker) = PersistenceGateway::spawn(Arc::new(backend.clone()));

        let err = gateway.get_options().await.unwrap_err();
        assert!(matches!(err, StorageError::Rejected { .. }));

        backend.set_unavailable(false);
        assert_eq!(gateway.get_options().await.unwrap(), single("a"));
    }

    #[tokio::test]
    async fn concurrent_saves_are_applied_in_send_order() {
        let backend = MemoryGroupStore::new();
        let (gateway, _worker) = PersistenceGateway::spawn(Arc::new(backend.clone()));

        let first = gateway.save_options(single("first"));
        let second = gateway.save_options(single("second"));
        let third = gateway.save_options(single("third"));
        let (a, b, c) = tokio::join!(first, second, third);
        a.unwrap();
        b.unwrap();
        c.unwrap();

        let names: Vec<String> = backend
            .history()
            .await
            .iter()
            .flat_map(|groups| groups.names().map(str::to_string).collect::<Vec<_>>())
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(backend.stored().await, single("third"));
    }

    #[tokio::test]
    async fn closed_worker_is_reported() {
        let backend = MemoryGroupStore::new();
        let (gateway, worker) = PersistenceGateway::spawn(Arc::new(backend));
        worker.abort();
        let _ = worker.await;

        let err = gateway.get_options().await.unwrap_err();

        assert!(matches!(err, StorageError::GatewayClosed));
    }
}
