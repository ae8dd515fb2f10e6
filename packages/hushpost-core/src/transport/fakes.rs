//! In-process stand-ins for the daemon, control port and HTTP client.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{
    AnonymizingTransport, BootstrapStatus, ControlChannel, ControlConnector, DaemonHandle,
    DaemonLauncher, ExitSignal, HttpDispatcher, HttpRequest,
};
use crate::config::TransportConfig;
use crate::error::{Error, Result};

/// Millisecond polling, five attempts, 20 ms control calls
pub(crate) fn fast_config() -> TransportConfig {
    TransportConfig {
        poll_interval_ms: 1,
        bootstrap_attempts: 5,
        control_timeout_ms: 20,
        ..Default::default()
    }
}

/// Transport wired to fakes, plus handles to inspect them
pub(crate) fn fake_transport(
    mode: ControlMode,
    config: TransportConfig,
) -> (AnonymizingTransport, Arc<FakeLauncher>, Arc<RecordingHttp>) {
    let launcher = FakeLauncher::new();
    let http = RecordingHttp::echo();
    let transport = AnonymizingTransport::with_components(
        config,
        launcher.clone(),
        FakeConnector::new(mode),
        http.clone(),
    );
    (transport, launcher, http)
}

// ============================================================================
// DAEMON
// ============================================================================

pub(crate) struct FakeLauncher {
    fail: bool,
    launches: AtomicUsize,
    shutdowns: Arc<AtomicUsize>,
    exits: Mutex<Vec<Arc<watch::Sender<Option<String>>>>>,
}

impl FakeLauncher {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            launches: AtomicUsize::new(0),
            shutdowns: Arc::new(AtomicUsize::new(0)),
            exits: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            launches: AtomicUsize::new(0),
            shutdowns: Arc::new(AtomicUsize::new(0)),
            exits: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub(crate) fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Make the most recently launched daemon exit on its own
    pub(crate) fn crash_latest(&self, reason: &str) {
        if let Some(exit) = self.exits.lock().last() {
            exit.send_replace(Some(reason.to_string()));
        }
    }
}

#[async_trait]
impl DaemonLauncher for FakeLauncher {
    async fn launch(&self, _config: &TransportConfig) -> Result<Box<dyn DaemonHandle>> {
        if self.fail {
            return Err(Error::DaemonFailed("no such binary".into()));
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = watch::channel(None);
        let tx = Arc::new(tx);
        self.exits.lock().push(tx.clone());
        Ok(Box::new(FakeDaemon {
            exit_tx: tx,
            exit_rx: rx,
            shutdowns: self.shutdowns.clone(),
        }))
    }
}

struct FakeDaemon {
    exit_tx: Arc<watch::Sender<Option<String>>>,
    exit_rx: ExitSignal,
    shutdowns: Arc<AtomicUsize>,
}

#[async_trait]
impl DaemonHandle for FakeDaemon {
    fn pid(&self) -> Option<u32> {
        None
    }

    fn exit_signal(&self) -> ExitSignal {
        self.exit_rx.clone()
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.exit_tx.send_replace(Some("stopped".into()));
        Ok(())
    }
}

// ============================================================================
// CONTROL PORT
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub(crate) enum ControlMode {
    /// Bootstrap reports done on the given poll
    ReadyAfter(usize),
    /// AUTHENTICATE is rejected
    RejectAuth,
    /// Progress never reaches 100
    NeverReady,
    /// Connections are refused
    Refuse,
    /// Connections open but status queries never answer
    Silent,
    /// Connections open but AUTHENTICATE never answers
    SilentAuth,
}

pub(crate) struct FakeConnector {
    mode: ControlMode,
    connects: AtomicUsize,
}

impl FakeConnector {
    pub(crate) fn new(mode: ControlMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            connects: AtomicUsize::new(0),
        })
    }

    /// Connections handed out so far
    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ControlConnector for FakeConnector {
    async fn connect(&self, _addr: &str) -> Result<Box<dyn ControlChannel>> {
        if let ControlMode::Refuse = self.mode {
            return Err(Error::Io("connection refused".into()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeChannel {
            mode: self.mode,
            polls: 0,
        }))
    }
}

struct FakeChannel {
    mode: ControlMode,
    polls: usize,
}

#[async_trait]
impl ControlChannel for FakeChannel {
    async fn authenticate(&mut self, _password: Option<&str>) -> Result<()> {
        match self.mode {
            ControlMode::RejectAuth => Err(Error::ControlAuthFailed("515 Authentication failed".into())),
            ControlMode::SilentAuth => std::future::pending().await,
            _ => Ok(()),
        }
    }

    async fn bootstrap_status(&mut self) -> Result<BootstrapStatus> {
        if let ControlMode::Silent = self.mode {
            return std::future::pending().await;
        }
        self.polls += 1;
        let done = matches!(self.mode, ControlMode::ReadyAfter(n) if self.polls >= n);
        Ok(BootstrapStatus {
            severity: "NOTICE".into(),
            progress: if done { 100 } else { 50 },
            tag: if done { "done".into() } else { "loading_descriptors".into() },
            summary: None,
        })
    }

    async fn close(&mut self) {}
}

// ============================================================================
// HTTP
// ============================================================================

type Responder = Box<dyn Fn(&HttpRequest) -> Result<Vec<u8>> + Send + Sync>;

/// Records every request and answers with a closure
pub(crate) struct RecordingHttp {
    requests: Mutex<Vec<HttpRequest>>,
    respond: Responder,
}

impl RecordingHttp {
    pub(crate) fn new(
        respond: impl Fn(&HttpRequest) -> Result<Vec<u8>> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    /// Answers `echo:` followed by the request body
    pub(crate) fn echo() -> Arc<Self> {
        Self::new(|request| {
            let mut reply = b"echo:".to_vec();
            reply.extend_from_slice(request.body.as_deref().unwrap_or_default());
            Ok(reply)
        })
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpDispatcher for RecordingHttp {
    async fn send(&self, request: HttpRequest) -> Result<Vec<u8>> {
        let reply = (self.respond)(&request);
        self.requests.lock().push(request);
        reply
    }
}
