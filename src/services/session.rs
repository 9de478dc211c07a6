// Session Controller Service
// Orchestrates the broadcast session lifecycle and owns the session snapshot

use chrono::Utc;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{
    Advance, PlatformConfigUpdate, PlaylistPlayback, RemoteHealth, SessionKind, SessionSnapshot,
};
use crate::services::api_client::{
    ApiError, PlaybackOptions, StartStreamRequest, StopStreamRequest, StreamApi,
};
use crate::services::connector::{
    ConnectorResult, PlatformConnector, PlatformIntegration, StubIntegration,
};
use crate::services::events::{
    emit_event, EventSink, NoopEventSink, EVENT_STREAM_STARTED, EVENT_STREAM_STOPPED,
    EVENT_VIDEO_CHANGED,
};
use crate::services::reconciler::Reconciler;

/// Bitrate reported while waiting for the first authoritative poll, in kbps
const NOMINAL_START_BITRATE: u64 = 2500;

/// Errors surfaced by session commands
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Playlist {0} not found")]
    PlaylistNotFound(i64),

    #[error("Playlist {0} has no videos")]
    EmptyPlaylist(i64),

    #[error("Stream start rejected: {0}")]
    StartRejected(String),

    #[error("Stream stop failed: {0}")]
    StopFailed(String),

    #[error("Session changed while the command was in flight")]
    Superseded,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// The session controller: single owner of the [`SessionSnapshot`].
///
/// Commands mutate the snapshot through one write-lock merge apiece, taken
/// after any remote round trip, so an operation resuming from an await always
/// merges against the current state rather than a stale capture. A monotonic
/// generation counter is bumped on every transition to idle; start responses
/// that resumed after such a bump are discarded instead of resurrecting a
/// session the user already stopped.
pub struct SessionController {
    state: Arc<RwLock<SessionSnapshot>>,
    api: Arc<dyn StreamApi>,
    connector: PlatformConnector,
    events: Arc<dyn EventSink>,
    generation: Arc<AtomicU64>,
    reconciler: Reconciler,
}

impl SessionController {
    /// Controller with the stub platform integration and no event sink
    pub fn new(api: Arc<dyn StreamApi>) -> Self {
        Self::with_collaborators(api, Arc::new(StubIntegration), Arc::new(NoopEventSink))
    }

    /// Controller with explicit collaborators (tests, real integrations)
    pub fn with_collaborators(
        api: Arc<dyn StreamApi>,
        integration: Arc<dyn PlatformIntegration>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let state = Arc::new(RwLock::new(SessionSnapshot::idle()));
        let generation = Arc::new(AtomicU64::new(0));
        let connector = PlatformConnector::new(state.clone(), integration, events.clone());
        let reconciler = Reconciler::new(state.clone(), api.clone(), events.clone(), generation.clone());
        Self {
            state,
            api,
            connector,
            events,
            generation,
            reconciler,
        }
    }

    /// Clone of the current read model
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.read().await.clone()
    }

    /// Process-start probe: one immediate status poll regardless of live
    /// state. If the server reports an ongoing transmission the session is
    /// adopted and the recurring timers begin tracking it.
    pub async fn bootstrap(&self) {
        self.refresh_stream_status().await;
    }

    /// Start a playlist-backed session.
    ///
    /// Fetches the playlist and its videos, shuffles once when requested,
    /// and asks the server to start the transmission. The snapshot is only
    /// touched after the server accepts.
    pub async fn start_playlist_session(
        &self,
        playlist_id: i64,
        options: PlaybackOptions,
    ) -> Result<(), SessionError> {
        let generation = self.generation.load(Ordering::SeqCst);

        let playlist = self.api.get_playlist(playlist_id).await.map_err(|e| match e {
            ApiError::NotFound => SessionError::PlaylistNotFound(playlist_id),
            other => SessionError::Api(other),
        })?;

        let videos = self.api.get_playlist_videos(playlist_id).await?;
        if videos.is_empty() {
            return Err(SessionError::EmptyPlaylist(playlist_id));
        }

        let playback = PlaylistPlayback::new(
            playlist_id,
            playlist.nome.clone(),
            videos,
            options.looping,
            options.shuffle,
        );

        let response = self
            .api
            .start_stream(StartStreamRequest {
                playlist_id,
                titulo: playlist.nome.clone(),
                videos: playback.videos.clone(),
                options,
            })
            .await
            .map_err(|e| SessionError::StartRejected(e.to_string()))?;

        if !response.success {
            let reason = response
                .error
                .unwrap_or_else(|| "server rejected start".to_string());
            log::warn!("Stream start rejected for playlist {}: {}", playlist_id, reason);
            return Err(SessionError::StartRejected(reason));
        }

        {
            let mut state = self.state.write().await;
            if self.generation.load(Ordering::SeqCst) != generation {
                log::warn!(
                    "Discarding stale start response for playlist {}; session changed while in flight",
                    playlist_id
                );
                return Err(SessionError::Superseded);
            }
            state.is_live = true;
            state.kind = SessionKind::Playlist;
            state.start_time = Some(Utc::now());
            state.viewers = 0;
            state.bitrate = NOMINAL_START_BITRATE;
            state.uptime = "00:00:00".to_string();
            state.duration_seconds = 0;
            state.remote_health = RemoteHealth::Online;
            state.title = playlist.nome.clone();
            state.stream_url = response.stream_url.unwrap_or_default();
            state.stream_name = response.stream_name.unwrap_or_default();
            state.playback = Some(playback);
        }

        self.reconciler.start();
        log::info!(
            "Playlist session started (playlist {}, '{}')",
            playlist_id,
            playlist.nome
        );
        emit_event(
            self.events.as_ref(),
            EVENT_STREAM_STARTED,
            &json!({ "playlistId": playlist_id }),
        );
        Ok(())
    }

    /// Stop the current session. On failure the snapshot keeps its
    /// last-known-good value and the caller may retry.
    pub async fn stop_stream(&self) -> Result<(), SessionError> {
        let kind = self.state.read().await.kind;

        let response = self
            .api
            .stop_stream(StopStreamRequest {
                stream_type: kind.as_wire_str().to_string(),
            })
            .await
            .map_err(|e| SessionError::StopFailed(e.to_string()))?;

        if !response.success {
            let reason = response
                .error
                .unwrap_or_else(|| "server rejected stop".to_string());
            log::warn!("Stream stop failed: {}", reason);
            return Err(SessionError::StopFailed(reason));
        }

        self.reconciler.stop();
        {
            let mut state = self.state.write().await;
            // Invalidate any start still awaiting its response
            self.generation.fetch_add(1, Ordering::SeqCst);
            state.reset_to_idle();
        }
        log::info!("Session stopped");
        emit_event(
            self.events.as_ref(),
            EVENT_STREAM_STOPPED,
            &json!({ "reason": "command" }),
        );
        Ok(())
    }

    /// Idempotent on-demand poll of the authoritative server. Also restarts
    /// the recurring timers when a live transmission is (re-)discovered.
    pub async fn refresh_stream_status(&self) {
        self.reconciler.poll_once().await;
        let live = self.state.read().await.is_live;
        if live && !self.reconciler.is_running() {
            self.reconciler.start();
        }
    }

    /// Merge a partial update into the matching platform; unknown ids are
    /// ignored so stale UI rows cannot fail a save.
    pub async fn update_platform_config(&self, platform_id: &str, update: PlatformConfigUpdate) {
        let mut state = self.state.write().await;
        let Some(target) = state.platforms.iter_mut().find(|t| t.id == platform_id) else {
            log::debug!("Ignoring config update for unknown platform '{}'", platform_id);
            return;
        };
        if let Some(enabled) = update.enabled {
            target.enabled = enabled;
        }
        if let Some(name) = update.name {
            target.name = name;
        }
        if let Some(rtmp_url) = update.rtmp_url {
            target.rtmp_url = Some(rtmp_url);
        }
        if let Some(stream_key) = update.stream_key {
            target.stream_key = Some(stream_key);
        }
    }

    /// Connect a fan-out platform (disconnected -> connecting -> connected)
    pub async fn connect_platform(&self, platform_id: &str) -> ConnectorResult<()> {
        self.connector.connect(platform_id).await
    }

    /// Disconnect a fan-out platform
    pub async fn disconnect_platform(&self, platform_id: &str) -> ConnectorResult<()> {
        self.connector.disconnect(platform_id).await
    }

    /// Move playlist playback to the next video. Wraps when looping; at the
    /// end of a non-looping playlist the whole session is stopped instead.
    /// No-op without playback state.
    pub async fn advance_video(&self) -> Result<(), SessionError> {
        let moved = {
            let mut state = self.state.write().await;
            let Some(playback) = state.playback.as_mut() else {
                return Ok(());
            };
            match playback.advance_index() {
                Advance::Moved(next) => {
                    playback.current_index = next;
                    Some(next)
                }
                Advance::Ended => None,
            }
        };

        match moved {
            Some(index) => {
                self.emit_video_changed(index).await;
                Ok(())
            }
            None => {
                log::info!("Playlist finished; stopping session");
                self.stop_stream().await
            }
        }
    }

    /// Move playlist playback to the previous video; always wraps from the
    /// first video to the last. No-op without playback state.
    pub async fn previous_video(&self) {
        let moved = {
            let mut state = self.state.write().await;
            let Some(playback) = state.playback.as_mut() else {
                return;
            };
            let prev = playback.retreat_index();
            playback.current_index = prev;
            prev
        };
        self.emit_video_changed(moved).await;
    }

    /// Jump to a specific video. Out-of-range indices are ignored, which
    /// absorbs clicks against a stale UI listing. No-op without playback
    /// state.
    pub async fn seek_video(&self, index: usize) {
        let applied = {
            let mut state = self.state.write().await;
            let Some(playback) = state.playback.as_mut() else {
                return;
            };
            if !playback.is_valid_index(index) {
                return;
            }
            playback.current_index = index;
            index
        };
        self.emit_video_changed(applied).await;
    }

    /// Flip the play/pause flag; the current video is untouched. No-op
    /// without playback state.
    pub async fn toggle_play_pause(&self) {
        let mut state = self.state.write().await;
        if let Some(playback) = state.playback.as_mut() {
            playback.is_playing = !playback.is_playing;
        }
    }

    /// Cancel both recurring timers; call on application teardown.
    pub fn shutdown(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.reconciler.stop();
    }

    async fn emit_video_changed(&self, index: usize) {
        let state = self.state.read().await;
        if let Some(playback) = &state.playback {
            emit_event(
                self.events.as_ref(),
                EVENT_VIDEO_CHANGED,
                &json!({
                    "index": index,
                    "videoId": playback.current_video().id,
                }),
            );
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.reconciler.stop();
    }
}
