//! # Anonymizing Transport
//!
//! Owns the onion daemon and routes every request through its SOCKS proxy.
//!
//! ## State Machine
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        TRANSPORT STATE MACHINE                          │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │                 start()                  bootstrap done                 │
//! │  Disconnected ──────────► Connecting ──────────────────► Connected      │
//! │       ▲                      │                              │           │
//! │       │                      │ auth failure                 │ daemon    │
//! │       │                      │ daemon error                 │ exited    │
//! │       │                      │ attempts exhausted           ▼           │
//! │       │                      └──────────────────────────► Failed        │
//! │       │                                                     │           │
//! │       │             stop() from any state                   │ start()   │
//! │       └─────────────────────────────────────────────────────┘ retries   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `start()` while Connecting or Connected reports the current state and
//! launches nothing. `stop()` is safe mid-bootstrap: every transition is
//! tagged with an epoch, and a bootstrap that finds the epoch moved on tears
//! down what it built instead of publishing it.
//!
//! `dispatch()` fails with [`Error::NotConnected`] outside Connected; there
//! is no implicit start.

mod control;
mod daemon;
#[cfg(test)]
pub(crate) mod fakes;
mod http;

pub use control::{
    parse_bootstrap_phase, BootstrapStatus, ControlAuth, ControlChannel, ControlConnector,
    ProtocolInfo, TcpControlConnector, TorController,
};
pub use daemon::{daemon_arguments, DaemonHandle, DaemonLauncher, ExitSignal, TorDaemon, TorLauncher};
pub use http::{HttpDispatcher, HttpRequest, SocksHttpClient, REFERRER_POLICY};

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::timeout;

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::logging::RedactedUrl;

/// Connection state of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No daemon
    Disconnected,
    /// Daemon launched, circuit not yet established
    Connecting,
    /// Circuit established; requests allowed
    Connected,
    /// Bootstrap failed or the daemon died
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

struct Lifecycle {
    state: ConnectionState,
    epoch: u64,
    daemon: Option<Box<dyn DaemonHandle>>,
    control: Option<Box<dyn ControlChannel>>,
}

struct Inner {
    config: TransportConfig,
    launcher: Arc<dyn DaemonLauncher>,
    connector: Arc<dyn ControlConnector>,
    http: Arc<dyn HttpDispatcher>,
    lifecycle: Mutex<Lifecycle>,
    state_tx: watch::Sender<ConnectionState>,
}

enum Bootstrap {
    Connected,
    Cancelled,
}

/// Onion transport; cheap to clone, all clones share one daemon
#[derive(Clone)]
pub struct AnonymizingTransport {
    inner: Arc<Inner>,
}

impl AnonymizingTransport {
    /// Transport backed by the real daemon, control port and SOCKS client
    pub fn new(config: TransportConfig) -> Result<Self> {
        let http = SocksHttpClient::new(&config)?;
        Ok(Self::with_components(
            config,
            Arc::new(TorLauncher),
            Arc::new(TcpControlConnector),
            Arc::new(http),
        ))
    }

    /// Transport with substituted collaborators
    pub fn with_components(
        config: TransportConfig,
        launcher: Arc<dyn DaemonLauncher>,
        connector: Arc<dyn ControlConnector>,
        http: Arc<dyn HttpDispatcher>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                config,
                launcher,
                connector,
                http,
                lifecycle: Mutex::new(Lifecycle {
                    state: ConnectionState::Disconnected,
                    epoch: 0,
                    daemon: None,
                    control: None,
                }),
                state_tx,
            }),
        }
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.inner.lifecycle.lock().state
    }

    /// Whether requests may be dispatched
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Transport configuration
    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    fn set_state(&self, lifecycle: &mut Lifecycle, state: ConnectionState) {
        if lifecycle.state != state {
            tracing::info!(from = %lifecycle.state, to = %state, "Transport state changed");
        }
        lifecycle.state = state;
        self.inner.state_tx.send_replace(state);
    }

    fn epoch_is(&self, epoch: u64) -> bool {
        self.inner.lifecycle.lock().epoch == epoch
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Launch the daemon and wait for the circuit.
    ///
    /// Returns the resulting state. A no-op returning the current state when
    /// already Connecting or Connected. Returns `Disconnected` if `stop()`
    /// interrupted the bootstrap.
    pub async fn start(&self) -> Result<ConnectionState> {
        let epoch = {
            let mut lifecycle = self.inner.lifecycle.lock();
            match lifecycle.state {
                ConnectionState::Connecting | ConnectionState::Connected => {
                    tracing::debug!(state = %lifecycle.state, "start() ignored");
                    return Ok(lifecycle.state);
                }
                ConnectionState::Disconnected | ConnectionState::Failed => {}
            }
            lifecycle.epoch += 1;
            self.set_state(&mut lifecycle, ConnectionState::Connecting);
            lifecycle.epoch
        };

        match self.bootstrap(epoch).await {
            Ok(Bootstrap::Connected) => Ok(ConnectionState::Connected),
            Ok(Bootstrap::Cancelled) => Ok(self.state()),
            Err(e) => {
                if self.fail(epoch).await {
                    tracing::warn!("Transport failed to start: {}", e);
                    Err(e)
                } else {
                    Ok(self.state())
                }
            }
        }
    }

    async fn bootstrap(&self, epoch: u64) -> Result<Bootstrap> {
        let config = &self.inner.config;
        let daemon = self.inner.launcher.launch(config).await?;
        let exit = daemon.exit_signal();

        let orphan = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.epoch == epoch {
                lifecycle.daemon = Some(daemon);
                None
            } else {
                Some(daemon)
            }
        };
        if let Some(daemon) = orphan {
            shutdown_daemon(daemon).await;
            return Ok(Bootstrap::Cancelled);
        }

        let addr = config.control_addr();
        let password = config.control_password.as_deref();
        let interval = Duration::from_millis(config.poll_interval_ms);
        let limit = Duration::from_millis(config.control_timeout_ms);
        let mut control: Option<Box<dyn ControlChannel>> = None;

        // A control call that outlives `limit` costs one attempt and the connection
        for attempt in 1..=config.bootstrap_attempts {
            if !self.epoch_is(epoch) {
                close_control(control).await;
                return Ok(Bootstrap::Cancelled);
            }
            let exited = exit.borrow().clone();
            if let Some(reason) = exited {
                close_control(control).await;
                return Err(Error::DaemonFailed(reason));
            }

            if control.is_none() {
                match timeout(limit, self.inner.connector.connect(&addr)).await {
                    Ok(Ok(mut channel)) => match timeout(limit, channel.authenticate(password)).await {
                        Ok(Ok(())) => control = Some(channel),
                        Ok(Err(e)) => {
                            close_control(Some(channel)).await;
                            return Err(e);
                        }
                        Err(_) => {
                            tracing::debug!(attempt, "Control authentication timed out");
                            close_control(Some(channel)).await;
                        }
                    },
                    Ok(Err(e)) => tracing::debug!(attempt, "Control port not ready: {}", e),
                    Err(_) => tracing::debug!(attempt, "Control connect timed out"),
                }
            }

            if let Some(channel) = control.as_mut() {
                match timeout(limit, channel.bootstrap_status()).await {
                    Ok(Ok(status)) if status.is_done() => {
                        return Ok(self.publish_connected(epoch, control, exit).await);
                    }
                    Ok(Ok(status)) if status.is_error() => {
                        close_control(control).await;
                        return Err(Error::BootstrapFailed(
                            status.summary.unwrap_or(status.tag),
                        ));
                    }
                    Ok(Ok(status)) => {
                        tracing::debug!(attempt, progress = status.progress, tag = %status.tag, "Bootstrapping")
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(attempt, "Bootstrap query failed: {}", e);
                        close_control(control.take()).await;
                    }
                    Err(_) => {
                        tracing::debug!(attempt, "Bootstrap query timed out");
                        close_control(control.take()).await;
                    }
                }
            }

            if attempt < config.bootstrap_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        close_control(control).await;
        Err(Error::BootstrapTimeout {
            attempts: config.bootstrap_attempts,
        })
    }

    async fn publish_connected(
        &self,
        epoch: u64,
        control: Option<Box<dyn ControlChannel>>,
        exit: ExitSignal,
    ) -> Bootstrap {
        let rejected = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.epoch == epoch {
                lifecycle.control = control;
                self.set_state(&mut lifecycle, ConnectionState::Connected);
                None
            } else {
                Some(control)
            }
        };
        match rejected {
            Some(control) => {
                close_control(control).await;
                Bootstrap::Cancelled
            }
            None => {
                self.watch_daemon(epoch, exit);
                Bootstrap::Connected
            }
        }
    }

    /// Move to Failed unless `stop()` already moved on; true if it did fail
    async fn fail(&self, epoch: u64) -> bool {
        let (control, daemon) = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.epoch != epoch {
                return false;
            }
            self.set_state(&mut lifecycle, ConnectionState::Failed);
            (lifecycle.control.take(), lifecycle.daemon.take())
        };
        close_control(control).await;
        if let Some(daemon) = daemon {
            shutdown_daemon(daemon).await;
        }
        true
    }

    fn watch_daemon(&self, epoch: u64, mut exit: ExitSignal) {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let reason = exit
                .wait_for(Option::is_some)
                .await
                .map(|r| r.clone().unwrap_or_default())
                .unwrap_or_else(|_| "supervisor gone".to_string());
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let transport = AnonymizingTransport { inner };
            let connected = {
                let lifecycle = transport.inner.lifecycle.lock();
                lifecycle.epoch == epoch && lifecycle.state == ConnectionState::Connected
            };
            if connected && transport.fail(epoch).await {
                tracing::warn!("Onion daemon {} while connected", reason);
            }
        });
    }

    /// Tear down the control connection and daemon; always ends Disconnected
    pub async fn stop(&self) {
        let (control, daemon) = {
            let mut lifecycle = self.inner.lifecycle.lock();
            lifecycle.epoch += 1;
            self.set_state(&mut lifecycle, ConnectionState::Disconnected);
            (lifecycle.control.take(), lifecycle.daemon.take())
        };
        close_control(control).await;
        if let Some(daemon) = daemon {
            shutdown_daemon(daemon).await;
        }
        tracing::info!("Transport stopped");
    }

    /// `stop()` then `start()`
    pub async fn restart(&self) -> Result<ConnectionState> {
        self.stop().await;
        self.start().await
    }

    // ========================================================================
    // REQUESTS
    // ========================================================================

    /// Send a request through the circuit.
    ///
    /// Fails with `NotConnected` outside Connected and `InvalidUrl` for an
    /// unparsable URL; neither touches the network.
    pub async fn dispatch(
        &self,
        method: &str,
        url: &str,
        body: Option<Vec<u8>>,
        headers: Vec<(String, String)>,
    ) -> Result<Vec<u8>> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        reqwest::Url::parse(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        tracing::debug!(method, url = %RedactedUrl(url), "Dispatching request");
        self.inner
            .http
            .send(HttpRequest {
                method: method.to_string(),
                url: url.to_string(),
                body,
                headers,
            })
            .await
    }
}

/// Upper bound on the goodbye to a control connection
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

async fn close_control(control: Option<Box<dyn ControlChannel>>) {
    if let Some(mut control) = control {
        if timeout(CLOSE_TIMEOUT, control.close()).await.is_err() {
            tracing::debug!("Control connection did not close in time");
        }
    }
}

async fn shutdown_daemon(mut daemon: Box<dyn DaemonHandle>) {
    if let Err(e) = daemon.shutdown().await {
        tracing::warn!("Daemon shutdown failed: {}", e);
    }
}
