//! Onion daemon process management.
//!
//! The daemon is launched with a fixed argument list built from
//! [`TransportConfig`]; nothing is negotiated at runtime. A supervisor task
//! owns the child process and publishes its exit on a watch channel so the
//! transport can notice a daemon that dies after bootstrap.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::{oneshot, watch};

use crate::config::TransportConfig;
use crate::error::{Error, Result};

/// Receiver that flips to `Some(reason)` once the daemon has exited
pub type ExitSignal = watch::Receiver<Option<String>>;

/// Starts the daemon process
#[async_trait]
pub trait DaemonLauncher: Send + Sync {
    /// Launch a daemon configured from `config`
    async fn launch(&self, config: &TransportConfig) -> Result<Box<dyn DaemonHandle>>;
}

/// A running daemon
#[async_trait]
pub trait DaemonHandle: Send + Sync {
    /// OS process id, if known
    fn pid(&self) -> Option<u32>;

    /// Exit notification
    fn exit_signal(&self) -> ExitSignal;

    /// Stop the daemon and wait for it to go away
    async fn shutdown(&mut self) -> Result<()>;
}

/// Command-line arguments for the daemon.
///
/// Client-only, no torrc, local SOCKS/control/DNS/transparent ports, and
/// exactly one obfuscated bridge.
pub fn daemon_arguments(config: &TransportConfig) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--allow-missing-torrc".into(),
        "--ignore-missing-torrc".into(),
        "--client-only".into(),
        "1".into(),
        "--SocksPort".into(),
        config.socks_port.to_string(),
        "--ControlPort".into(),
        config.control_port.to_string(),
        "--DNSPort".into(),
        config.dns_port.to_string(),
        "--TransPort".into(),
        config.trans_port.to_string(),
        "--DataDirectory".into(),
        config.data_dir.display().to_string(),
        "--ClientTransportPlugin".into(),
        config.transport_plugin.clone(),
        "--UseBridges".into(),
        "1".into(),
        "--Bridge".into(),
        config.bridge.clone(),
    ];
    if config.control_password.is_none() {
        args.push("--CookieAuthentication".into());
        args.push("0".into());
    }
    args
}

// ============================================================================
// PROCESS LAUNCHER
// ============================================================================

/// Launches the daemon binary named in the config
#[derive(Debug, Default, Clone, Copy)]
pub struct TorLauncher;

#[async_trait]
impl DaemonLauncher for TorLauncher {
    async fn launch(&self, config: &TransportConfig) -> Result<Box<dyn DaemonHandle>> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(|e| Error::DaemonFailed(format!("data directory: {}", e)))?;

        let mut child = Command::new(&config.tor_binary)
            .args(daemon_arguments(config))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::DaemonFailed(format!("failed to spawn {}: {}", config.tor_binary.display(), e))
            })?;

        let pid = child.id();
        let (exit_tx, exit_rx) = watch::channel(None);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                _ = stop_rx => None,
            };
            let reason = match exited {
                Some(Ok(status)) => format!("exited with {}", status),
                Some(Err(e)) => format!("wait failed: {}", e),
                None => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!("Failed to kill daemon: {}", e);
                    }
                    "stopped".to_string()
                }
            };
            tracing::debug!(pid = ?pid, "Daemon {}", reason);
            let _ = exit_tx.send(Some(reason));
        });

        tracing::info!(pid = ?pid, "Launched onion daemon");

        Ok(Box::new(TorDaemon {
            pid,
            stop: Some(stop_tx),
            exited: exit_rx,
        }))
    }
}

/// Supervised daemon process
pub struct TorDaemon {
    pid: Option<u32>,
    stop: Option<oneshot::Sender<()>>,
    exited: ExitSignal,
}

#[async_trait]
impl DaemonHandle for TorDaemon {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn exit_signal(&self) -> ExitSignal {
        self.exited.clone()
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let mut exited = self.exited.clone();
        // Sender dropped means the supervisor is already gone
        let _ = exited.wait_for(|reason| reason.is_some()).await;
        Ok(())
    }
}
