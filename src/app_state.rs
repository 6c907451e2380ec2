//! Shared handles axum extracts into every route.
//!
//! Grounded on the teacher's `src/app_state.rs`, trimmed to the handles this
//! engine actually needs: store, queue, peer client, live-download registry,
//! config.

use std::sync::Arc;

use crate::{config::Config, live::LiveRegistry, peer_client::PeerClient, queue::Queue, store::Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub queue: Arc<Queue>,
    pub peer_client: Arc<PeerClient>,
    pub live: Arc<LiveRegistry>,
    pub config: Arc<Config>,
}
