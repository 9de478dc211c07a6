// SessionSnapshot Model
// The single read model for the broadcast session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{default_targets, PlatformTarget, PlaylistPlayback};

/// What kind of content source feeds the live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// External live encoder feed (OBS or similar pushing to ingest)
    LiveEncoder,
    /// Internally sequenced pre-recorded playlist
    Playlist,
    /// No active session
    None,
}

impl SessionKind {
    /// Wire form used by the stop endpoint's `stream_type` field
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            SessionKind::LiveEncoder => "live",
            SessionKind::Playlist => "playlist",
            SessionKind::None => "none",
        }
    }
}

/// Outcome of the most recent status poll, distinct from `is_live`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteHealth {
    Online,
    Offline,
    Error,
}

/// Aggregate session state.
///
/// This is the sole owned mutable state of the controller; every component
/// reads and writes it through the controller's merge points, never directly.
///
/// Invariants: `playback` is present iff `kind == Playlist`; `start_time` is
/// present iff `is_live`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub is_live: bool,

    pub stream_url: String,

    pub title: String,

    /// Current viewer count, server-reported
    pub viewers: u64,

    /// Current bitrate in kbps
    pub bitrate: u64,

    /// Elapsed time, formatted HH:MM:SS
    pub uptime: String,

    /// Elapsed time in whole seconds
    pub duration_seconds: u64,

    /// When the session went live
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    pub application_name: String,

    pub stream_name: String,

    pub kind: SessionKind,

    pub remote_health: RemoteHealth,

    pub platforms: Vec<PlatformTarget>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback: Option<PlaylistPlayback>,
}

impl SessionSnapshot {
    /// Idle baseline with the full platform catalog
    pub fn idle() -> Self {
        Self {
            is_live: false,
            stream_url: String::new(),
            title: String::new(),
            viewers: 0,
            bitrate: 0,
            uptime: "00:00:00".to_string(),
            duration_seconds: 0,
            start_time: None,
            application_name: "live".to_string(),
            stream_name: String::new(),
            kind: SessionKind::None,
            remote_health: RemoteHealth::Offline,
            platforms: default_targets(),
            playback: None,
        }
    }

    /// Reset the live fields to the idle baseline.
    /// Platform configuration survives; platform statuses drop back to
    /// disconnected.
    pub fn reset_to_idle(&mut self) {
        self.is_live = false;
        self.stream_url.clear();
        self.title.clear();
        self.viewers = 0;
        self.bitrate = 0;
        self.uptime = "00:00:00".to_string();
        self.duration_seconds = 0;
        self.start_time = None;
        self.stream_name.clear();
        self.kind = SessionKind::None;
        self.remote_health = RemoteHealth::Offline;
        self.playback = None;
        for platform in &mut self.platforms {
            platform.reset_status();
        }
    }
}

/// Format whole seconds as HH:MM:SS (hours may exceed 99)
pub fn format_uptime(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
