pub mod hub;

use std::sync::Arc;

use crate::{
    cache::Cache,
    config::AppConfig,
    dao::store::Store,
    services::{
        access::AccessGuard, attachments::AttachmentStore, issue_service::IssueService,
        room_service::RoomService, ticket::TicketBridge,
    },
};

pub use self::hub::{Broadcaster, RoomHub};

pub type SharedState = Arc<AppState>;

/// Central application state holding the wired services and the realtime hub.
pub struct AppState {
    store: Arc<dyn Store>,
    hub: Arc<RoomHub>,
    guard: AccessGuard,
    rooms: RoomService,
    issues: IssueService,
}

impl AppState {
    /// Wire the services over the given collaborators and wrap the result in an [`Arc`].
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
        bridge: Arc<dyn TicketBridge>,
        attachments: Arc<dyn AttachmentStore>,
    ) -> SharedState {
        let config = Arc::new(config);
        let hub = Arc::new(RoomHub::new());
        let guard = AccessGuard::new(store.clone());

        let rooms = RoomService::new(
            store.clone(),
            cache.clone(),
            hub.clone(),
            guard.clone(),
            config.clone(),
        );
        let issues = IssueService::new(
            store.clone(),
            cache,
            hub.clone(),
            bridge,
            attachments,
            guard.clone(),
            config,
        );

        Arc::new(Self {
            store,
            hub,
            guard,
            rooms,
            issues,
        })
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Room-keyed multicast feeding realtime connections.
    pub fn hub(&self) -> &RoomHub {
        &self.hub
    }

    pub fn guard(&self) -> &AccessGuard {
        &self.guard
    }

    pub fn rooms(&self) -> &RoomService {
        &self.rooms
    }

    pub fn issues(&self) -> &IssueService {
        &self.issues
    }
}
