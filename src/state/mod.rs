/// Broadcast of application events.
pub mod events;
/// Group collection and its store.
pub mod groups;
/// Spin session state machine.
pub mod spin_machine;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    dao::group_store::GroupBackend,
    engine::SelectionEngine,
    presentation::WheelSurface,
    services::persistence_gateway::PersistenceGateway,
};

pub use self::events::{AppEvent, EventHub};
use self::groups::GroupStore;

/// Capacity of the application event channel.
const EVENT_CAPACITY: usize = 64;

/// Central application state owned by the controller and passed to every handler.
pub struct AppState {
    store: GroupStore,
    engine: SelectionEngine,
    events: EventHub,
    selected: Option<String>,
    gateway_task: Option<JoinHandle<()>>,
}

impl AppState {
    /// Start the persistence gateway, load the persisted groups and build the engine.
    pub async fn bootstrap(
        config: &AppConfig,
        backend: Arc<dyn GroupBackend>,
        surface: Arc<dyn WheelSurface>,
    ) -> Self {
        if let Err(err) = backend.health_check().await {
            warn!(error = %err, "storage backend reports a problem; changes may not be durable");
        }

        let (gateway, gateway_task) = PersistenceGateway::spawn(backend);
        let store = GroupStore::load(gateway, config.retry_policy()).await;
        let events = EventHub::new(EVENT_CAPACITY);
        let engine = SelectionEngine::new(config.spin_settings().clone(), surface, events.clone());
        info!(groups = store.group_names().len(), "application state ready");

        Self {
            store,
            engine,
            events,
            selected: None,
            gateway_task: Some(gateway_task),
        }
    }

    /// Customise the selection engine, e.g. to inject a seeded RNG or a fake clock.
    pub fn configure_engine(self, f: impl FnOnce(SelectionEngine) -> SelectionEngine) -> Self {
        let Self {
            store,
            engine,
            events,
            selected,
            gateway_task,
        } = self;
        Self {
            store,
            engine: f(engine),
            events,
            selected,
            gateway_task,
        }
    }

    /// Read access to the group store.
    pub fn store(&self) -> &GroupStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut GroupStore {
        &mut self.store
    }

    /// Read access to the selection engine.
    pub fn engine(&self) -> &SelectionEngine {
        &self.engine
    }

    pub(crate) fn engine_mut(&mut self) -> &mut SelectionEngine {
        &mut self.engine
    }

    /// Broadcast hub for application events.
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Currently selected group, if any.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Change the selection and notify observers when it actually changes.
    pub(crate) fn set_selected(&mut self, group: Option<String>) {
        if self.selected == group {
            return;
        }
        debug!(group = ?group, "selection changed");
        self.selected = group.clone();
        self.events.broadcast(AppEvent::SelectionChanged { group });
    }

    /// Whether `group` is frozen by the active spin session.
    pub fn is_locked(&self, group: &str) -> bool {
        self.engine.active_group().as_deref() == Some(group)
    }

    /// Stop any spin and wait for pending persistence requests to drain.
    pub async fn shutdown(self) {
        let Self {
            store,
            mut engine,
            gateway_task,
            ..
        } = self;
        engine.shutdown().await;
        if !store.is_durable() {
            warn!(
                revision = store.revision(),
                "shutting down with changes that were never saved"
            );
        }
        drop(store);
        if let Some(task) = gateway_task {
            if let Err(err) = task.await {
                warn!(error = %err, "persistence gateway ended abnormally");
            }
        }
        info!("application state shut down");
    }
}
