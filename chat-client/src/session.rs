//! Per-session state machine of the chat client.
//!
//! `Idle -> Sending -> {Idle | Suspended}`, and `Suspended -> Idle` when the
//! short retry countdown runs out. Only one request is ever in flight. A quota
//! answer additionally starts (or resumes) the persisted daily quota window,
//! which any later successful reply clears.

use crate::api::{ChatReply, ChatTransport};
use crate::countdown::{Countdown, CountdownHandle, CountdownSlot};
use crate::error::ClientError;
use crate::history::{ConversationHistory, HistoryEntry};
use crate::quota_window::{format_hms, now_millis, QuotaWindow};
use crate::store::{LocalStore, API_ENDPOINT_KEY};
use crate::view::ChatView;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Input enabled, ready to send.
    Idle,
    /// One request in flight; further sends are ignored.
    Sending,
    /// Quota reported; input disabled until the retry countdown ends.
    Suspended,
}

struct SessionState {
    phase: SessionPhase,
    in_flight: bool,
    quota_notice_shown: bool,
    endpoint: String,
    history: ConversationHistory,
    retry_countdown: CountdownSlot,
    quota_countdown: CountdownSlot,
}

struct Inner {
    transport: Arc<dyn ChatTransport>,
    view: Arc<dyn ChatView>,
    store: Arc<dyn LocalStore>,
    state: Mutex<SessionState>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared handle to one chat session.
///
/// Clones refer to the same session. Countdown callbacks only hold a weak
/// reference, so dropping the last clone tears the timers down.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<Inner>,
}

impl ChatSession {
    /// Create the session and resume any persisted quota window.
    ///
    /// A saved endpoint in `store` wins over `default_endpoint`. Must be
    /// called inside a tokio runtime.
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        view: Arc<dyn ChatView>,
        store: Arc<dyn LocalStore>,
        default_endpoint: impl Into<String>,
    ) -> Self {
        let endpoint = match store.get(API_ENDPOINT_KEY) {
            Ok(Some(saved)) if !saved.trim().is_empty() => saved,
            Ok(_) => default_endpoint.into(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read saved endpoint");
                default_endpoint.into()
            }
        };

        let session = Self {
            inner: Arc::new(Inner {
                transport,
                view,
                store,
                state: Mutex::new(SessionState {
                    phase: SessionPhase::Idle,
                    in_flight: false,
                    quota_notice_shown: false,
                    endpoint,
                    history: ConversationHistory::new(),
                    retry_countdown: CountdownSlot::new(),
                    quota_countdown: CountdownSlot::new(),
                }),
            }),
        };

        session.restore_quota_window();
        session
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.state().phase
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner.state().in_flight
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.state().history.entries().to_vec()
    }

    pub fn endpoint(&self) -> String {
        self.inner.state().endpoint.clone()
    }

    /// Switch to another relay and remember it for the next start.
    pub fn set_endpoint(&self, url: &str) -> Result<(), ClientError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ClientError::Config("endpoint must not be empty".to_string()));
        }

        self.inner.state().endpoint = url.to_string();
        self.inner.store.set(API_ENDPOINT_KEY, url)?;

        tracing::info!(endpoint = %url, "API endpoint updated");
        Ok(())
    }

    /// Send one message. Blank input and sends while busy are ignored.
    ///
    /// Never fails: every outcome is reported through the view, and the
    /// in-flight guard is released on every path.
    pub async fn send_message(&self, text: &str) {
        let message = text.trim();
        if message.is_empty() {
            return;
        }

        let (endpoint, history) = {
            let mut state = self.inner.state();
            if state.in_flight || state.phase != SessionPhase::Idle {
                tracing::debug!(phase = ?state.phase, "Ignoring send while busy");
                return;
            }
            state.in_flight = true;
            state.phase = SessionPhase::Sending;
            (state.endpoint.clone(), state.history.entries().to_vec())
        };
        let _in_flight = InFlightGuard { session: self };

        let view = &self.inner.view;
        view.show_user_message(message);
        view.set_input_enabled(false);
        view.show_typing();

        let result = self.inner.transport.send(&endpoint, message, &history).await;
        view.hide_typing();

        match result {
            Ok(ChatReply::Reply { response, .. }) => {
                view.show_bot_message(&response);
                self.inner.state().history.push_exchange(message, &response);
                self.clear_quota_window();
            }
            Ok(ChatReply::Quota {
                retry_after,
                message: notice,
            }) => self.suspend(retry_after, &notice),
            Ok(ChatReply::Error { message: error }) => {
                tracing::warn!(error = %error, "Relay returned an error");
                view.show_error(&error);
            }
            Err(e) => {
                tracing::warn!(error = %e, endpoint = %endpoint, "Chat request failed");
                view.show_error(&format!(
                    "Failed to get response. Please check if the backend is running at {}",
                    endpoint
                ));
            }
        }
    }

    /// Persist `now + 24h` unless a live window exists, and show its countdown.
    pub fn start_persistent_quota_timer(&self) {
        let now = now_millis();
        let store = self.inner.store.as_ref();

        let window = match QuotaWindow::load(store) {
            Ok(Some(window)) if window.is_active(now) => window,
            loaded => {
                if let Err(e) = loaded {
                    tracing::warn!(error = %e, "Failed to read quota window");
                }
                let window = QuotaWindow::starting_at(now);
                if let Err(e) = window.save(store) {
                    tracing::warn!(error = %e, "Failed to persist quota window");
                }
                window
            }
        };

        self.run_quota_countdown(window.remaining_seconds(now));
    }

    /// Resume a persisted window that is still running; forget an expired one.
    pub fn restore_quota_window(&self) {
        let now = now_millis();
        let store = self.inner.store.as_ref();

        match QuotaWindow::load(store) {
            Ok(Some(window)) if window.is_active(now) => {
                let remaining = window.remaining_seconds(now);
                tracing::info!(remaining_secs = remaining, "Resuming daily quota countdown");
                self.run_quota_countdown(remaining);
            }
            Ok(Some(_)) => {
                if let Err(e) = QuotaWindow::clear(store) {
                    tracing::warn!(error = %e, "Failed to clear expired quota window");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to read quota window"),
        }
    }

    /// Stop the daily countdown and forget the persisted window.
    pub fn clear_quota_window(&self) {
        self.inner.state().quota_countdown.clear();

        if let Err(e) = QuotaWindow::clear(self.inner.store.as_ref()) {
            tracing::warn!(error = %e, "Failed to clear quota window");
        }
        self.inner.view.hide_quota_timer();
    }

    fn suspend(&self, retry_after: u64, notice: &str) {
        tracing::warn!(retry_after_secs = retry_after, "Relay reported quota exhaustion");
        self.inner.view.show_quota_notice(notice);

        {
            let mut state = self.inner.state();
            state.quota_notice_shown = true;
            state.phase = SessionPhase::Suspended;
            let handle = self.retry_countdown(retry_after);
            state.retry_countdown.replace(handle);
        }

        self.start_persistent_quota_timer();
    }

    fn retry_countdown(&self, seconds: u64) -> CountdownHandle {
        let view = self.inner.view.clone();
        let session = Arc::downgrade(&self.inner);

        Countdown::start(
            seconds,
            move |left| view.show_retry_countdown(left),
            move || {
                if let Some(inner) = session.upgrade() {
                    ChatSession { inner }.resume();
                }
            },
        )
    }

    fn run_quota_countdown(&self, seconds: u64) {
        let view = self.inner.view.clone();
        let session = Arc::downgrade(&self.inner);

        let handle = Countdown::start(
            seconds,
            move |left| view.show_quota_timer(&format_hms(left)),
            move || {
                if let Some(inner) = session.upgrade() {
                    ChatSession { inner }.clear_quota_window();
                }
            },
        );
        self.inner.state().quota_countdown.replace(handle);
    }

    /// Retry countdown ran out: re-enable input without announcing anything.
    fn resume(&self) {
        {
            let mut state = self.inner.state();
            state.retry_countdown.clear();
            state.quota_notice_shown = false;
            if !state.in_flight {
                state.phase = SessionPhase::Idle;
            }
        }

        self.inner.view.clear_retry_countdown();
        self.inner.view.set_input_enabled(true);
    }

    fn finish_send(&self) {
        let enable_input = {
            let mut state = self.inner.state();
            state.in_flight = false;
            if state.quota_notice_shown {
                false
            } else {
                state.phase = SessionPhase::Idle;
                true
            }
        };

        if enable_input {
            self.inner.view.set_input_enabled(true);
        }
    }
}

/// Releases the in-flight flag however `send_message` ends.
struct InFlightGuard<'a> {
    session: &'a ChatSession,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.session.finish_send();
    }
}
