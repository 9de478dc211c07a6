// Event Sink Service
// Notification seam between the session core and a UI layer

use serde::Serialize;
use serde_json::Value;

/// Emitted when a session goes live
pub const EVENT_STREAM_STARTED: &str = "stream-started";
/// Emitted when a session returns to idle
pub const EVENT_STREAM_STOPPED: &str = "stream-stopped";
/// Emitted when a platform's connection status changes
pub const EVENT_PLATFORM_STATUS: &str = "platform-status";
/// Emitted when playlist playback moves to another video
pub const EVENT_VIDEO_CHANGED: &str = "video-changed";

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &str, payload: Value);
}

/// Sink that drops every event; for consumers without a UI layer
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &str, _payload: Value) {}
}

pub fn emit_event<T: Serialize>(sink: &dyn EventSink, event: &str, payload: &T) {
    if let Ok(value) = serde_json::to_value(payload) {
        sink.emit(event, value);
    }
}
