//! Shared application state, constructed once in `main` and injected
//! everywhere via axum state. No hidden statics.

use std::sync::Arc;

use crate::blob::BlobStore;
use crate::config::Config;
use crate::registry::RoomRegistry;
use crate::transport::Transport;

pub struct AppState {
    pub rooms: RoomRegistry,
    pub transport: Transport,
    pub store: Arc<dyn BlobStore>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn BlobStore>, config: Config) -> Self {
        Self {
            rooms: RoomRegistry::new(),
            transport: Transport::new(),
            store,
            config,
        }
    }
}
