// Platform Connector Service
// Drives a single fan-out platform through its connection lifecycle

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::models::{PlatformStatus, PlatformTarget, SessionSnapshot};
use crate::services::events::{emit_event, EventSink, EVENT_PLATFORM_STATUS};

/// Result type for connector operations
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Errors that can occur while connecting to or disconnecting from a platform
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Platform '{0}' has no ingest credentials configured")]
    MissingCredentials(String),

    #[error("Integration error: {0}")]
    Integration(String),
}

/// Platform-specific integration that performs the actual relay handshake.
/// The session core only records the resulting status; the RTMP plumbing
/// behind this trait is out of scope here.
#[async_trait]
pub trait PlatformIntegration: Send + Sync {
    async fn connect(&self, target: &PlatformTarget) -> ConnectorResult<()>;
    async fn disconnect(&self, target: &PlatformTarget) -> ConnectorResult<()>;
}

/// Stand-in integration used until a real relay backend is wired up.
/// Simulates the round-trip delay and rejects targets without an ingest URL.
pub struct StubIntegration;

#[async_trait]
impl PlatformIntegration for StubIntegration {
    async fn connect(&self, target: &PlatformTarget) -> ConnectorResult<()> {
        if target.rtmp_url.as_deref().unwrap_or("").is_empty() {
            return Err(ConnectorError::MissingCredentials(target.id.clone()));
        }
        tokio::time::sleep(Duration::from_millis(800)).await;
        Ok(())
    }

    async fn disconnect(&self, _target: &PlatformTarget) -> ConnectorResult<()> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(())
    }
}

/// Walks a platform's status through the connect/disconnect state machine.
///
/// Transitions are applied to the shared snapshot one at a time, so observers
/// always see the intermediate `Connecting` state, and a failed transition
/// always lands on `Error`, never on the prior status.
pub struct PlatformConnector {
    state: Arc<RwLock<SessionSnapshot>>,
    integration: Arc<dyn PlatformIntegration>,
    events: Arc<dyn EventSink>,
}

impl PlatformConnector {
    pub fn new(
        state: Arc<RwLock<SessionSnapshot>>,
        integration: Arc<dyn PlatformIntegration>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            state,
            integration,
            events,
        }
    }

    /// Connect a platform: disconnected/error -> connecting -> connected.
    /// Connecting an already connected platform is a no-op.
    pub async fn connect(&self, platform_id: &str) -> ConnectorResult<()> {
        // Mark connecting before the integration round trip
        let target = {
            let mut state = self.state.write().await;
            let target = Self::find_target(&mut state, platform_id)?;
            if target.status == PlatformStatus::Connected {
                return Ok(());
            }
            target.status = PlatformStatus::Connecting;
            target.clone()
        };
        self.emit_status(&target.id, PlatformStatus::Connecting);
        log::info!("Connecting to platform '{}'", platform_id);

        let outcome = self.integration.connect(&target).await;

        // The snapshot may have changed while the handshake ran; re-resolve
        let status = match &outcome {
            Ok(()) => PlatformStatus::Connected,
            Err(_) => PlatformStatus::Error,
        };
        {
            let mut state = self.state.write().await;
            if let Ok(target) = Self::find_target(&mut state, platform_id) {
                target.status = status;
            }
        }
        self.emit_status(platform_id, status);

        match outcome {
            Ok(()) => {
                log::info!("Platform '{}' connected", platform_id);
                Ok(())
            }
            Err(e) => {
                log::warn!("Platform '{}' connect failed: {}", platform_id, e);
                Err(e)
            }
        }
    }

    /// Disconnect a platform: connected/error -> disconnected, or error on
    /// failure. Disconnecting an already disconnected platform is a no-op.
    pub async fn disconnect(&self, platform_id: &str) -> ConnectorResult<()> {
        let target = {
            let mut state = self.state.write().await;
            let target = Self::find_target(&mut state, platform_id)?;
            if target.status == PlatformStatus::Disconnected {
                return Ok(());
            }
            target.clone()
        };
        log::info!("Disconnecting from platform '{}'", platform_id);

        let outcome = self.integration.disconnect(&target).await;

        let status = match &outcome {
            Ok(()) => PlatformStatus::Disconnected,
            Err(_) => PlatformStatus::Error,
        };
        {
            let mut state = self.state.write().await;
            if let Ok(target) = Self::find_target(&mut state, platform_id) {
                target.status = status;
            }
        }
        self.emit_status(platform_id, status);

        outcome.map_err(|e| {
            log::warn!("Platform '{}' disconnect failed: {}", platform_id, e);
            e
        })
    }

    fn find_target<'a>(
        state: &'a mut SessionSnapshot,
        platform_id: &str,
    ) -> ConnectorResult<&'a mut PlatformTarget> {
        state
            .platforms
            .iter_mut()
            .find(|t| t.id == platform_id)
            .ok_or_else(|| ConnectorError::UnknownPlatform(platform_id.to_string()))
    }

    fn emit_status(&self, platform_id: &str, status: PlatformStatus) {
        emit_event(
            self.events.as_ref(),
            EVENT_PLATFORM_STATUS,
            &json!({ "platformId": platform_id, "status": status }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::events::NoopEventSink;
    use std::sync::Mutex;

    /// Integration double that records calls and fails on demand
    struct FakeIntegration {
        fail_connect: bool,
        fail_disconnect: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeIntegration {
        fn new(fail_connect: bool, fail_disconnect: bool) -> Self {
            Self {
                fail_connect,
                fail_disconnect,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PlatformIntegration for FakeIntegration {
        async fn connect(&self, target: &PlatformTarget) -> ConnectorResult<()> {
            self.calls.lock().unwrap().push(format!("connect:{}", target.id));
            if self.fail_connect {
                Err(ConnectorError::Integration("handshake refused".into()))
            } else {
                Ok(())
            }
        }

        async fn disconnect(&self, target: &PlatformTarget) -> ConnectorResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("disconnect:{}", target.id));
            if self.fail_disconnect {
                Err(ConnectorError::Integration("teardown failed".into()))
            } else {
                Ok(())
            }
        }
    }

    /// Sink that records every status the platform passes through
    struct StatusRecorder(Mutex<Vec<String>>);

    impl EventSink for StatusRecorder {
        fn emit(&self, event: &str, payload: serde_json::Value) {
            if event == EVENT_PLATFORM_STATUS {
                self.0
                    .lock()
                    .unwrap()
                    .push(payload["status"].as_str().unwrap_or("?").to_string());
            }
        }
    }

    fn make_connector(
        integration: Arc<dyn PlatformIntegration>,
        events: Arc<dyn EventSink>,
    ) -> (PlatformConnector, Arc<RwLock<SessionSnapshot>>) {
        let state = Arc::new(RwLock::new(SessionSnapshot::idle()));
        (
            PlatformConnector::new(state.clone(), integration, events),
            state,
        )
    }

    async fn status_of(state: &Arc<RwLock<SessionSnapshot>>, id: &str) -> PlatformStatus {
        state
            .read()
            .await
            .platforms
            .iter()
            .find(|t| t.id == id)
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn test_connect_walks_connecting_then_connected() {
        let recorder = Arc::new(StatusRecorder(Mutex::new(Vec::new())));
        let (connector, state) =
            make_connector(Arc::new(FakeIntegration::new(false, false)), recorder.clone());

        connector.connect("youtube").await.unwrap();

        assert_eq!(status_of(&state, "youtube").await, PlatformStatus::Connected);
        let seen = recorder.0.lock().unwrap().clone();
        assert_eq!(seen, vec!["connecting", "connected"]);
    }

    #[tokio::test]
    async fn test_connect_failure_lands_on_error() {
        let (connector, state) = make_connector(
            Arc::new(FakeIntegration::new(true, false)),
            Arc::new(NoopEventSink),
        );

        let result = connector.connect("twitch").await;
        assert!(result.is_err());
        assert_eq!(status_of(&state, "twitch").await, PlatformStatus::Error);
    }

    #[tokio::test]
    async fn test_disconnect_from_error_recovers_to_disconnected() {
        let (connector, state) = make_connector(
            Arc::new(FakeIntegration::new(true, false)),
            Arc::new(NoopEventSink),
        );

        let _ = connector.connect("kick").await;
        assert_eq!(status_of(&state, "kick").await, PlatformStatus::Error);

        connector.disconnect("kick").await.unwrap();
        assert_eq!(status_of(&state, "kick").await, PlatformStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_failure_lands_on_error() {
        let (connector, state) = make_connector(
            Arc::new(FakeIntegration::new(false, true)),
            Arc::new(NoopEventSink),
        );

        connector.connect("trovo").await.unwrap();
        let result = connector.disconnect("trovo").await;
        assert!(result.is_err());
        assert_eq!(status_of(&state, "trovo").await, PlatformStatus::Error);
    }

    #[tokio::test]
    async fn test_unknown_platform_is_rejected() {
        let (connector, _) = make_connector(
            Arc::new(FakeIntegration::new(false, false)),
            Arc::new(NoopEventSink),
        );

        let result = connector.connect("myspace").await;
        assert!(matches!(result, Err(ConnectorError::UnknownPlatform(_))));
    }

    #[tokio::test]
    async fn test_connect_when_connected_is_noop() {
        let integration = Arc::new(FakeIntegration::new(false, false));
        let (connector, state) = make_connector(integration.clone(), Arc::new(NoopEventSink));

        connector.connect("youtube").await.unwrap();
        connector.connect("youtube").await.unwrap();

        assert_eq!(status_of(&state, "youtube").await, PlatformStatus::Connected);
        // Second connect never reached the integration
        assert_eq!(integration.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stub_rejects_missing_credentials() {
        let state = Arc::new(RwLock::new(SessionSnapshot::idle()));
        let connector = PlatformConnector::new(
            state.clone(),
            Arc::new(StubIntegration),
            Arc::new(NoopEventSink),
        );

        let result = connector.connect("youtube").await;
        assert!(matches!(result, Err(ConnectorError::MissingCredentials(_))));
        assert_eq!(status_of(&state, "youtube").await, PlatformStatus::Error);
    }
}
