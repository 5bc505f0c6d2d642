// Main entry point - wiring and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::application::pipeline::DashboardPipeline;
use crate::application::user_service::UserService;
use crate::domain::threshold::{default_thresholds, ThresholdBook};
use crate::infrastructure::config::load_settings;
use crate::infrastructure::store::{get_value, keys, FileStore, KvStore};
use crate::infrastructure::user_store::JsonUserRepository;
use crate::infrastructure::{control_feed, live_feed};
use crate::presentation::app_state::AppState;
use crate::presentation::auth::SessionStore;
use crate::presentation::handlers::{
    clear_alert_history, create_user, dashboard, dashboard_history, delete_user,
    get_alert_history, get_settings, get_thresholds, health_check, list_users, login, logout,
    put_settings, put_thresholds, update_user,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let settings = load_settings()?;

    // Persistence gateway (infrastructure layer)
    let store: Arc<dyn KvStore> = Arc::new(FileStore::new(&settings.storage.data_dir));

    // Reload persisted state: thresholds fall back to the factory set,
    // alert history to empty.
    let thresholds =
        get_value(store.as_ref(), keys::THRESHOLDS).unwrap_or_else(default_thresholds);
    let history = get_value(store.as_ref(), keys::ALERT_HISTORY).unwrap_or_default();
    let book = ThresholdBook::new(thresholds, settings.thresholds.unknown_tag_policy);

    // Live feed adapter
    let (frame_tx, mut frame_rx) = mpsc::channel(64);
    let feed = live_feed::spawn(settings.feed.live_url.clone(), frame_tx);

    // Application state
    let users = UserService::new(Arc::new(JsonUserRepository::new(store.clone())));
    let sessions = SessionStore::new(Duration::from_secs(
        settings.auth.session_idle_minutes * 60,
    ));
    let state = Arc::new(AppState {
        pipeline: Mutex::new(DashboardPipeline::new(book, history)),
        store: store.clone(),
        users,
        sessions,
        feed_state: feed.state_receiver(),
        control_url: settings.feed.control_url.clone(),
    });

    // Ingest task: one synchronous pipeline turn per inbound frame.
    {
        let state = state.clone();
        tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                let outcome = state.pipeline().ingest(&frame, state.store.as_ref());
                if !outcome.new_entries.is_empty() {
                    tracing::info!("{} new alert(s) recorded", outcome.new_entries.len());
                }
            }
        });
    }

    // One-shot historical backfill.
    {
        let state = state.clone();
        let control_url = settings.feed.control_url.clone();
        tokio::spawn(async move {
            match control_feed::fetch_history(&control_url).await {
                Ok(frames) => state.pipeline().apply_backfill(&frames),
                Err(e) => tracing::warn!("historical backfill unavailable: {e}"),
            }
        });
    }

    // Asynchronous threshold pushes from the gateway.
    {
        let state = state.clone();
        let (patch_tx, mut patch_rx) = mpsc::channel(8);
        control_feed::spawn_threshold_listener(settings.feed.control_url.clone(), patch_tx);
        tokio::spawn(async move {
            while let Some(patch) = patch_rx.recv().await {
                let status = state
                    .pipeline()
                    .apply_threshold_patch(&patch, state.store.as_ref());
                tracing::info!(
                    "applied threshold push for {} tag(s) (persisted: {})",
                    patch.len(),
                    status.is_persisted()
                );
            }
        });
    }

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/auth/login", axum::routing::post(login))
        .route("/auth/logout", axum::routing::post(logout))
        .route("/dashboard", get(dashboard))
        .route("/dashboard/history", get(dashboard_history))
        .route("/thresholds", get(get_thresholds).put(put_thresholds))
        .route("/settings", get(get_settings).put(put_settings))
        .route(
            "/alerts/history",
            get(get_alert_history).delete(clear_alert_history),
        )
        .route(
            "/users",
            get(list_users)
                .post(create_user)
                .put(update_user)
                .delete(delete_user),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = settings.server.bind.parse()?;
    tracing::info!("starting opcua-dashboard service on {addr}");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // Tear down the feed before exiting so no reconnect timer outlives us.
    feed.close().await;

    Ok(())
}
