// Stream API Client Service
// Manages communication with the remote streaming control server

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::VideoRef;

const DEFAULT_API_URL: &str = "http://127.0.0.1:3001";
const REQUEST_TIMEOUT_SECS: u64 = 5;

/// Errors from the remote streaming API
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found")]
    NotFound,

    #[error("Server returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Playlist metadata as the server reports it
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistInfo {
    #[serde(default)]
    pub id: i64,
    pub nome: String,
}

/// The playlist-videos endpoint wraps every entry in a `videos` object
#[derive(Debug, Clone, Deserialize)]
struct PlaylistVideoRow {
    videos: VideoRef,
}

/// Playback options carried by the start request
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlaybackOptions {
    #[serde(rename = "loop")]
    pub looping: bool,
    pub shuffle: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            looping: true,
            shuffle: false,
        }
    }
}

/// Body for POST /api/streaming/start-internal
#[derive(Debug, Clone, Serialize)]
pub struct StartStreamRequest {
    pub playlist_id: i64,
    pub titulo: String,
    pub videos: Vec<VideoRef>,
    pub options: PlaybackOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartStreamResponse {
    pub success: bool,
    #[serde(default)]
    pub stream_url: Option<String>,
    #[serde(default)]
    pub stream_name: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body for POST /api/streaming/stop-internal
#[derive(Debug, Clone, Serialize)]
pub struct StopStreamRequest {
    pub stream_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopStreamResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Server-side transmission statistics
#[derive(Debug, Clone, Deserialize)]
pub struct TransmissionStats {
    #[serde(default)]
    pub viewers: u64,
    #[serde(default)]
    pub bitrate: u64,
    #[serde(default)]
    pub uptime: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransmissionInfo {
    #[serde(default)]
    pub titulo: String,
    pub stats: TransmissionStats,
}

/// Response from GET /api/streaming/status
#[derive(Debug, Clone, Deserialize)]
pub struct StreamStatusResponse {
    pub success: bool,
    #[serde(default)]
    pub is_live: bool,
    #[serde(default)]
    pub transmission: Option<TransmissionInfo>,
}

/// Remote collaborator contract consumed by the session controller
#[async_trait]
pub trait StreamApi: Send + Sync {
    /// Look up playlist metadata; non-2xx means the playlist does not exist
    async fn get_playlist(&self, id: i64) -> Result<PlaylistInfo, ApiError>;

    /// Fetch the ordered video list of a playlist
    async fn get_playlist_videos(&self, id: i64) -> Result<Vec<VideoRef>, ApiError>;

    /// Ask the server to start an internal (playlist) transmission
    async fn start_stream(
        &self,
        request: StartStreamRequest,
    ) -> Result<StartStreamResponse, ApiError>;

    /// Ask the server to stop the current transmission
    async fn stop_stream(&self, request: StopStreamRequest) -> Result<StopStreamResponse, ApiError>;

    /// Poll the authoritative transmission status
    async fn get_status(&self) -> Result<StreamStatusResponse, ApiError>;
}

/// HTTP implementation of [`StreamApi`] against the control server
pub struct HttpStreamApi {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpStreamApi {
    /// Create a client for the default local server URL
    pub fn new(token: String) -> Self {
        Self::with_url(DEFAULT_API_URL.to_string(), token)
    }

    /// Create a client for a custom server URL
    pub fn with_url(base_url: String, token: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            token,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn playlist_url(&self, id: i64) -> String {
        format!("{}/api/playlists/{}", self.base_url, id)
    }

    fn playlist_videos_url(&self, id: i64) -> String {
        format!("{}/api/playlists/{}/videos", self.base_url, id)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http { status, body });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http { status, body });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl StreamApi for HttpStreamApi {
    async fn get_playlist(&self, id: i64) -> Result<PlaylistInfo, ApiError> {
        match self.get_json::<PlaylistInfo>(&self.playlist_url(id)).await {
            Ok(info) => Ok(info),
            // The playlist endpoint reports any non-2xx as not-found
            Err(ApiError::Http { .. }) => Err(ApiError::NotFound),
            Err(e) => Err(e),
        }
    }

    async fn get_playlist_videos(&self, id: i64) -> Result<Vec<VideoRef>, ApiError> {
        let rows: Vec<PlaylistVideoRow> =
            self.get_json(&self.playlist_videos_url(id)).await?;
        Ok(rows.into_iter().map(|row| row.videos).collect())
    }

    async fn start_stream(
        &self,
        request: StartStreamRequest,
    ) -> Result<StartStreamResponse, ApiError> {
        let url = format!("{}/api/streaming/start-internal", self.base_url);
        log::info!(
            "Requesting stream start for playlist {} ({} videos)",
            request.playlist_id,
            request.videos.len()
        );
        self.post_json(&url, &request).await
    }

    async fn stop_stream(&self, request: StopStreamRequest) -> Result<StopStreamResponse, ApiError> {
        let url = format!("{}/api/streaming/stop-internal", self.base_url);
        log::info!("Requesting stream stop (type: {})", request.stream_type);
        self.post_json(&url, &request).await
    }

    async fn get_status(&self) -> Result<StreamStatusResponse, ApiError> {
        let url = format!("{}/api/streaming/status", self.base_url);
        self.get_json(&url).await
    }
}
