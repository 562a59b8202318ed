use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tokenlink_core::{Eip1193Provider, PortError, RemoteSessionConnector};

use crate::{Eip1193Adapter, WidgetConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Proposed,
    Approved,
    Rejected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Approve,
    Reject,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub topic: String,
    pub status: SessionStatus,
}

#[derive(Debug)]
struct RemoteSession {
    status: SessionStatus,
    wallet: Eip1193Adapter,
    /// Connect checks left before a proposed session is approved by the peer.
    checks_until_ready: Option<u32>,
}

/// Remote wallet sessions keyed by pairing topic.
#[derive(Debug, Clone)]
pub struct WalletConnectAdapter {
    inner: Arc<Mutex<WalletConnectState>>,
    policy_error: Option<String>,
    /// Identifies this dapp to paired wallets.
    client_id: Option<String>,
}

#[derive(Debug, Default)]
struct WalletConnectState {
    sessions: BTreeMap<String, RemoteSession>,
    connect_attempts: u32,
}

impl WalletConnectAdapter {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(WalletConnectState::default())),
            policy_error: None,
            client_id: None,
        }
    }

    pub fn with_config(config: &WidgetConfig) -> Self {
        let mut adapter = Self::in_memory();
        if config.strict_runtime_required() && config.walletconnect_project_id.is_none() {
            adapter.policy_error = Some(
                "WalletConnect project id not configured in production runtime profile".to_owned(),
            );
        }
        adapter.client_id = config.client_id.clone();
        adapter
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, WalletConnectState>, PortError> {
        self.inner
            .lock()
            .map_err(|e| PortError::Transport(format!("wc lock poisoned: {e}")))
    }

    pub fn insert_session(
        &self,
        topic: impl Into<String>,
        wallet: Eip1193Adapter,
        status: SessionStatus,
    ) -> Result<(), PortError> {
        self.lock()?.sessions.insert(
            topic.into(),
            RemoteSession {
                status,
                wallet,
                checks_until_ready: None,
            },
        );
        Ok(())
    }

    /// Inserts a proposed session the peer approves on the `checks`-th connect attempt.
    pub fn insert_pending_session(
        &self,
        topic: impl Into<String>,
        wallet: Eip1193Adapter,
        checks: u32,
    ) -> Result<(), PortError> {
        self.lock()?.sessions.insert(
            topic.into(),
            RemoteSession {
                status: SessionStatus::Proposed,
                wallet,
                checks_until_ready: Some(checks),
            },
        );
        Ok(())
    }

    pub fn session_action(&self, topic: &str, action: SessionAction) -> Result<(), PortError> {
        let mut g = self.lock()?;
        let session = g
            .sessions
            .get_mut(topic)
            .ok_or_else(|| PortError::NotFound(format!("wc session missing: {topic}")))?;
        session.status = match action {
            SessionAction::Approve => SessionStatus::Approved,
            SessionAction::Reject => SessionStatus::Rejected,
            SessionAction::Disconnect => SessionStatus::Disconnected,
        };
        session.checks_until_ready = None;
        if action == SessionAction::Disconnect {
            session.wallet.debug_inject_disconnected();
        }
        Ok(())
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionInfo>, PortError> {
        let g = self.lock()?;
        Ok(g.sessions
            .iter()
            .map(|(topic, s)| SessionInfo {
                topic: topic.clone(),
                status: s.status,
            })
            .collect())
    }

    pub fn connect_attempts(&self) -> u32 {
        self.inner.lock().map(|g| g.connect_attempts).unwrap_or(0)
    }
}

#[async_trait]
impl RemoteSessionConnector for WalletConnectAdapter {
    async fn connect(&self) -> Result<Arc<dyn Eip1193Provider>, PortError> {
        if let Some(reason) = &self.policy_error {
            return Err(PortError::Policy(reason.clone()));
        }
        let mut g = self.lock()?;
        g.connect_attempts = g.connect_attempts.saturating_add(1);
        debug!(
            attempt = g.connect_attempts,
            client_id = self.client_id.as_deref().unwrap_or("anonymous"),
            "requesting remote session"
        );
        for (topic, session) in g.sessions.iter_mut() {
            if session.status != SessionStatus::Proposed {
                continue;
            }
            if let Some(left) = session.checks_until_ready.as_mut() {
                *left = left.saturating_sub(1);
                if *left == 0 {
                    info!(topic = %topic, "remote session approved by peer");
                    session.status = SessionStatus::Approved;
                    session.checks_until_ready = None;
                }
            }
        }
        let approved = g
            .sessions
            .iter()
            .find(|(_, s)| s.status == SessionStatus::Approved);
        match approved {
            Some((topic, session)) => {
                debug!(topic = %topic, "using remote session");
                Ok(Arc::new(session.wallet.clone()))
            }
            None => Err(PortError::Transport(
                "no approved WalletConnect session".to_owned(),
            )),
        }
    }

    async fn disconnect(&self) -> Result<(), PortError> {
        let mut g = self.lock()?;
        for session in g.sessions.values_mut() {
            if session.status == SessionStatus::Approved {
                session.status = SessionStatus::Disconnected;
            }
        }
        info!("remote sessions disconnected");
        Ok(())
    }
}
