// Castway Session Core
// Client-side session controller for multi-platform live broadcasts:
// tracks the live session snapshot, fan-out platform statuses, and playlist
// playback, reconciling against the authoritative control server.

pub mod models;
pub mod services;

pub use models::{
    format_uptime, Advance, PlatformConfigUpdate, PlatformStatus, PlatformTarget,
    PlaylistPlayback, RemoteHealth, SessionKind, SessionSnapshot, VideoRef,
};
pub use services::{
    ApiError, ConnectorError, EventSink, HttpStreamApi, NoopEventSink, PlaybackOptions,
    PlatformIntegration, SessionController, SessionError, StreamApi, StubIntegration,
};
