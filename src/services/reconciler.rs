// Reconciliation Loop Service
// Keeps the local session snapshot aligned with the authoritative server

use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::models::{format_uptime, RemoteHealth, SessionKind, SessionSnapshot};
use crate::services::api_client::{StreamApi, StreamStatusResponse};
use crate::services::events::{emit_event, EventSink, EVENT_STREAM_STOPPED};
use tokio::sync::RwLock;

/// Local elapsed-time recomputation period
const TICK_INTERVAL: Duration = Duration::from_secs(1);
/// Remote status poll period
const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Owns the two recurring tasks of the session: the 1s elapsed-time ticker
/// and the 10s status poller. Both run only while a session is live; both are
/// cancelled synchronously when the session returns to idle.
pub struct Reconciler {
    state: Arc<RwLock<SessionSnapshot>>,
    api: Arc<dyn StreamApi>,
    events: Arc<dyn EventSink>,
    generation: Arc<AtomicU64>,
    ticker_running: Arc<AtomicBool>,
    poller_running: Arc<AtomicBool>,
    ticker_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    poller_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Reconciler {
    pub fn new(
        state: Arc<RwLock<SessionSnapshot>>,
        api: Arc<dyn StreamApi>,
        events: Arc<dyn EventSink>,
        generation: Arc<AtomicU64>,
    ) -> Self {
        Self {
            state,
            api,
            events,
            generation,
            ticker_running: Arc::new(AtomicBool::new(false)),
            poller_running: Arc::new(AtomicBool::new(false)),
            ticker_handle: Arc::new(Mutex::new(None)),
            poller_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start both recurring tasks. Already-running tasks are left alone.
    pub fn start(&self) {
        self.start_ticker();
        self.start_poller();
    }

    /// Cancel both tasks. No tick or poll fires after this returns.
    pub fn stop(&self) {
        self.ticker_running.store(false, Ordering::SeqCst);
        self.poller_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.ticker_handle.lock().unwrap().take() {
            handle.abort();
        }
        if let Some(handle) = self.poller_handle.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Whether either recurring task is currently scheduled
    pub fn is_running(&self) -> bool {
        self.ticker_running.load(Ordering::SeqCst) || self.poller_running.load(Ordering::SeqCst)
    }

    /// One status poll against the remote server, applied to the snapshot.
    /// Never fails: degraded polls mark `remote_health` and keep going.
    pub async fn poll_once(&self) {
        poll_step(
            &self.state,
            self.api.as_ref(),
            self.events.as_ref(),
            &self.generation,
            &self.ticker_running,
            &self.poller_running,
            &self.ticker_handle,
        )
        .await;
    }

    fn start_ticker(&self) {
        if self.ticker_running.swap(true, Ordering::SeqCst) {
            return;
        }

        let running = self.ticker_running.clone();
        let state = self.state.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(TICK_INTERVAL);
            // First tick fires immediately; skip it so uptime starts at zero
            ticker.tick().await;

            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let mut state = state.write().await;
                let start_time = match (state.is_live, state.start_time) {
                    (true, Some(start)) => start,
                    _ => break,
                };
                let elapsed = (chrono::Utc::now() - start_time).num_seconds().max(0) as u64;
                state.duration_seconds = elapsed;
                state.uptime = format_uptime(elapsed);
            }
            running.store(false, Ordering::SeqCst);
        });

        *self.ticker_handle.lock().unwrap() = Some(handle);
    }

    fn start_poller(&self) {
        if self.poller_running.swap(true, Ordering::SeqCst) {
            return;
        }

        let running = self.poller_running.clone();
        let state = self.state.clone();
        let api = self.api.clone();
        let events = self.events.clone();
        let generation = self.generation.clone();
        let ticker_running = self.ticker_running.clone();
        let ticker_handle = self.ticker_handle.clone();

        let handle = tokio::spawn(async move {
            let mut poller = interval(POLL_INTERVAL);
            poller.tick().await;

            while running.load(Ordering::SeqCst) {
                poller.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let went_idle = poll_step(
                    &state,
                    api.as_ref(),
                    events.as_ref(),
                    &generation,
                    &ticker_running,
                    &running,
                    &ticker_handle,
                )
                .await;
                if went_idle {
                    break;
                }
            }
            running.store(false, Ordering::SeqCst);
        });

        *self.poller_handle.lock().unwrap() = Some(handle);
    }
}

/// Run one poll round trip and merge the outcome into the snapshot.
/// Returns true when the server reported not-live for a locally live session,
/// in which case both recurring tasks have been asked to stop.
async fn poll_step(
    state: &Arc<RwLock<SessionSnapshot>>,
    api: &dyn StreamApi,
    events: &dyn EventSink,
    generation: &AtomicU64,
    ticker_running: &AtomicBool,
    poller_running: &AtomicBool,
    ticker_handle: &Mutex<Option<JoinHandle<()>>>,
) -> bool {
    match api.get_status().await {
        Ok(status) => {
            let went_idle = {
                let mut state = state.write().await;
                apply_status(&mut state, &status)
            };
            if went_idle {
                // Remote says the session ended; tear the loop down and make
                // sure a stale in-flight start cannot resurrect it
                generation.fetch_add(1, Ordering::SeqCst);
                ticker_running.store(false, Ordering::SeqCst);
                poller_running.store(false, Ordering::SeqCst);
                if let Some(handle) = ticker_handle.lock().unwrap().take() {
                    handle.abort();
                }
                log::info!("Remote reports not live; session reset to idle");
                emit_event(events, EVENT_STREAM_STOPPED, &json!({ "reason": "remote" }));
            }
            went_idle
        }
        Err(e) => {
            log::warn!("Status poll failed: {}", e);
            let mut state = state.write().await;
            state.remote_health = RemoteHealth::Error;
            false
        }
    }
}

/// Merge one status response into the snapshot. The server is authoritative:
/// its transmission stats overwrite locally derived values, and a not-live
/// report forces the session back to idle. Returns true when a live session
/// was torn down.
pub(crate) fn apply_status(state: &mut SessionSnapshot, status: &StreamStatusResponse) -> bool {
    if !status.success {
        state.remote_health = RemoteHealth::Error;
        return false;
    }

    if status.is_live {
        if let Some(tx) = &status.transmission {
            state.viewers = tx.stats.viewers;
            state.bitrate = tx.stats.bitrate;
            if !tx.stats.uptime.is_empty() {
                state.uptime = tx.stats.uptime.clone();
                if let Some(secs) = parse_uptime(&tx.stats.uptime) {
                    state.duration_seconds = secs;
                }
            }
            if !tx.titulo.is_empty() {
                state.title = tx.titulo.clone();
            }
        }
        if !state.is_live {
            // A transmission started outside this controller (external
            // encoder feed); adopt it so the snapshot reflects reality
            state.is_live = true;
            if state.kind == SessionKind::None {
                state.kind = SessionKind::LiveEncoder;
            }
            if state.start_time.is_none() {
                let elapsed = chrono::Duration::seconds(state.duration_seconds as i64);
                state.start_time = Some(chrono::Utc::now() - elapsed);
            }
        }
        state.remote_health = RemoteHealth::Online;
        return false;
    }

    // Not live
    let was_live = state.is_live;
    if was_live {
        state.reset_to_idle();
    } else {
        state.viewers = 0;
        state.bitrate = 0;
        state.uptime = "00:00:00".to_string();
        state.duration_seconds = 0;
        state.remote_health = RemoteHealth::Offline;
    }
    was_live
}

/// Parse HH:MM:SS into whole seconds
fn parse_uptime(uptime: &str) -> Option<u64> {
    let parts: Vec<&str> = uptime.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: u64 = parts[0].parse().ok()?;
    let minutes: u64 = parts[1].parse().ok()?;
    let seconds: u64 = parts[2].parse().ok()?;
    Some(hours * 3600 + minutes * 60 + seconds)
}
