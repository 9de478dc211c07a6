// PlatformTarget Model
// Fan-out destination configuration and connection status

use serde::{Deserialize, Serialize};

/// Connection status of a fan-out platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// A distribution target the broadcast can be relayed to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformTarget {
    /// Stable identifier (e.g., "youtube")
    pub id: String,

    /// Display name
    pub name: String,

    /// Whether this target participates in fan-out
    pub enabled: bool,

    /// RTMP ingest URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtmp_url: Option<String>,

    /// Stream key (authentication)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_key: Option<String>,

    /// Current connection status
    pub status: PlatformStatus,
}

impl PlatformTarget {
    fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            enabled: false,
            rtmp_url: None,
            stream_key: None,
            status: PlatformStatus::Disconnected,
        }
    }

    /// Drop back to the disconnected baseline, keeping configuration
    pub fn reset_status(&mut self) {
        self.status = PlatformStatus::Disconnected;
    }
}

/// Partial update for a platform target; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfigUpdate {
    pub enabled: Option<bool>,
    pub name: Option<String>,
    pub rtmp_url: Option<String>,
    pub stream_key: Option<String>,
}

/// The fixed catalog of known fan-out targets.
/// Targets are created once at controller construction and never removed;
/// only their configuration and status change afterwards.
pub fn default_targets() -> Vec<PlatformTarget> {
    vec![
        PlatformTarget::new("youtube", "YouTube"),
        PlatformTarget::new("facebook", "Facebook Live"),
        PlatformTarget::new("twitch", "Twitch"),
        PlatformTarget::new("instagram", "Instagram Live"),
        PlatformTarget::new("tiktok", "TikTok Live"),
        PlatformTarget::new("kick", "Kick"),
        PlatformTarget::new("vimeo", "Vimeo"),
        PlatformTarget::new("rumble", "Rumble"),
        PlatformTarget::new("trovo", "Trovo"),
        PlatformTarget::new("dlive", "DLive"),
    ]
}
