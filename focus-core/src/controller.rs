use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::FocusConfig;
use crate::context::SessionContext;
use crate::error::FocusError;
use crate::interceptor::InterceptionHandler;
use crate::page::Countdown;
use crate::proxy::Transport;
use crate::system_proxy::SystemProxy;
use crate::Result;

/// A running focus session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    Idle,
    Active(ActiveSession),
}

/// Result of `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { ends_at: DateTime<Utc> },
    /// A session is already running; nothing was changed
    AlreadyActive { ends_at: DateTime<Utc> },
}

/// Result of `stop`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotActive,
}

/// Snapshot for the `status` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Active {
        ends_at: DateTime<Utc>,
        remaining: Countdown,
    },
}

/// Lifecycle notifications, e.g. for telling the user a session expired
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started { id: Uuid, ends_at: DateTime<Utc> },
    Stopped { id: Uuid },
    Expired { id: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    Stopped,
    Expired,
    Shutdown,
}

struct ControllerInner {
    state: SessionState,
    transport: Box<dyn Transport>,
    timer: Option<JoinHandle<()>>,
}

/// Owns the focus session state machine (Idle/Active), the deadline timer, the
/// transport and the OS proxy registration.
///
/// Every transition goes through one mutex. The deadline timer and an explicit
/// `stop` both call `teardown`, which only acts on the session it was armed for,
/// so at most one of them tears a session down.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Mutex<ControllerInner>>,
    context: Arc<SessionContext>,
    system_proxy: Arc<dyn SystemProxy>,
    listen_addr: SocketAddr,
    proxy_server: String,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(
        config: &FocusConfig,
        context: Arc<SessionContext>,
        transport: Box<dyn Transport>,
        system_proxy: Arc<dyn SystemProxy>,
    ) -> Result<Self> {
        let (events, _) = broadcast::channel(16);
        Ok(Self {
            inner: Arc::new(Mutex::new(ControllerInner {
                state: SessionState::Idle,
                transport,
                timer: None,
            })),
            context,
            system_proxy,
            listen_addr: config.listen_addr()?,
            proxy_server: config.proxy_server(),
            events,
        })
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Start a session of `minutes` minutes.
    ///
    /// While a session is active this is a no-op returning `AlreadyActive`. If the
    /// transport cannot start, the system proxy registration is rolled back and the
    /// controller stays idle.
    pub async fn start(&self, minutes: u32) -> Result<StartOutcome> {
        let mut inner = self.inner.lock().await;

        if let SessionState::Active(session) = &inner.state {
            info!("Focus session {} already active", session.id);
            return Ok(StartOutcome::AlreadyActive {
                ends_at: session.ends_at,
            });
        }
        if minutes == 0 {
            return Err(FocusError::InvalidDuration);
        }

        let length = Duration::from_secs(u64::from(minutes) * 60);
        let started_at = Utc::now();
        let ends_at = started_at + chrono::Duration::minutes(i64::from(minutes));

        if let Err(e) = self.system_proxy.enable(&self.proxy_server) {
            warn!(
                "Failed to register {} as system proxy ({}): {}",
                self.proxy_server,
                self.system_proxy.name(),
                e
            );
        }

        let handler = InterceptionHandler::new(self.context.clone(), ends_at);
        if let Err(e) = inner.transport.start(self.listen_addr, handler).await {
            error!("Failed to start interception proxy: {}", e);
            if let Err(e) = self.system_proxy.disable() {
                warn!("Failed to roll back system proxy: {}", e);
            }
            return Err(e);
        }

        let id = Uuid::new_v4();
        inner.timer = Some(self.arm_timer(id, length));
        self.context.reset_activity();
        inner.state = SessionState::Active(ActiveSession {
            id,
            started_at,
            ends_at,
        });

        info!("Focus session {} started, ends at {}", id, ends_at);
        let _ = self.events.send(SessionEvent::Started { id, ends_at });
        Ok(StartOutcome::Started { ends_at })
    }

    /// Stop the active session. Returns `NotActive` without side effects when idle.
    pub async fn stop(&self) -> StopOutcome {
        match self.teardown(None, EndReason::Stopped).await {
            Some(_) => StopOutcome::Stopped,
            None => StopOutcome::NotActive,
        }
    }

    /// Process-exit cleanup: stops an active session, never fails
    pub async fn shutdown(&self) {
        if self.teardown(None, EndReason::Shutdown).await.is_some() {
            info!("Focus session ended at shutdown");
        }
    }

    pub async fn status(&self) -> SessionStatus {
        match &self.inner.lock().await.state {
            SessionState::Idle => SessionStatus::Idle,
            SessionState::Active(session) => SessionStatus::Active {
                ends_at: session.ends_at,
                remaining: Countdown::between(Utc::now(), session.ends_at),
            },
        }
    }

    pub async fn is_active(&self) -> bool {
        matches!(self.inner.lock().await.state, SessionState::Active(_))
    }

    pub async fn active_session(&self) -> Option<ActiveSession> {
        match &self.inner.lock().await.state {
            SessionState::Active(session) => Some(session.clone()),
            SessionState::Idle => None,
        }
    }

    fn arm_timer(&self, id: Uuid, length: Duration) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(length).await;
            if controller.teardown(Some(id), EndReason::Expired).await.is_some() {
                info!("Focus session {} complete", id);
            }
        })
    }

    /// Tear down the active session if it is `expected` (or any session when `None`).
    /// Returns the id of the session that ended.
    async fn teardown(&self, expected: Option<Uuid>, reason: EndReason) -> Option<Uuid> {
        let mut inner = self.inner.lock().await;

        let id = match &inner.state {
            SessionState::Active(session) if expected.map_or(true, |id| id == session.id) => {
                session.id
            }
            _ => return None,
        };

        if let Some(timer) = inner.timer.take() {
            // The expiry path runs inside the timer task itself
            if reason != EndReason::Expired {
                timer.abort();
            }
        }

        inner.transport.stop().await;
        if let Err(e) = self.system_proxy.disable() {
            warn!("Failed to disable system proxy: {}", e);
        }
        inner.state = SessionState::Idle;

        let event = match reason {
            EndReason::Expired => SessionEvent::Expired { id },
            EndReason::Stopped | EndReason::Shutdown => SessionEvent::Stopped { id },
        };
        let _ = self.events.send(event);
        Some(id)
    }
}
