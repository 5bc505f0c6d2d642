// Application state for HTTP handlers

use crate::application::pipeline::DashboardPipeline;
use crate::application::user_service::UserService;
use crate::infrastructure::live_feed::FeedState;
use crate::infrastructure::store::KvStore;
use crate::presentation::auth::SessionStore;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub struct AppState {
    pub pipeline: Mutex<DashboardPipeline>,
    pub store: Arc<dyn KvStore>,
    pub users: UserService,
    pub sessions: SessionStore,
    pub feed_state: watch::Receiver<FeedState>,
    pub control_url: String,
}

impl AppState {
    /// Lock the pipeline, recovering from a poisoned lock rather than
    /// propagating the panic.
    pub fn pipeline(&self) -> std::sync::MutexGuard<'_, DashboardPipeline> {
        self.pipeline
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
