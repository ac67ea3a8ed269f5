//! Knowledge mirror routes and the periodic refresh task.

use crate::{ErrorBody, SharedState};
use axum::{Json, extract::State, http::StatusCode};
use nexus_knowledge::{KnowledgeMirror, SyncAction, SyncStatus};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
pub struct KnowledgeStatusResponse {
    pub path: String,
    pub remote: String,
    pub present: bool,
    pub context_file: String,
    pub context_file_present: bool,
    pub last_sync: SyncStatus,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<SyncAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

pub(crate) async fn status_handler(State(state): State<SharedState>) -> Json<KnowledgeStatusResponse> {
    let source = state.pipeline.extractor().source_path();
    Json(KnowledgeStatusResponse {
        path: state.mirror.path().display().to_string(),
        remote: state.mirror.remote_url().to_string(),
        present: state.mirror.is_present(),
        context_file: source.display().to_string(),
        context_file_present: source.is_file(),
        last_sync: state.mirror.status(),
    })
}

/// External sync trigger. Queues behind a sync already running in this
/// process; one held by another process answers 502 with the busy error.
pub(crate) async fn sync_handler(
    State(state): State<SharedState>,
) -> (StatusCode, Json<SyncResponse>) {
    match state.mirror.sync().await {
        Ok(action) => (
            StatusCode::OK,
            Json(SyncResponse {
                ok: true,
                action: Some(action),
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(SyncResponse {
                ok: false,
                action: None,
                error: Some(ErrorBody {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                }),
            }),
        ),
    }
}

/// Re-sync `mirror` every `every`, starting one period from now.
///
/// Failures are already logged and recorded by the mirror; the task keeps
/// running until the runtime shuts down.
pub fn spawn_refresh(mirror: Arc<KnowledgeMirror>, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), mirror = %mirror.path().display(), "Periodic knowledge refresh enabled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            debug!("Periodic knowledge refresh");
            let _ = mirror.sync().await;
        }
    })
}
