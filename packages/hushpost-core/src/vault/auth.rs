//! User-presence authentication.
//!
//! The platform challenge (Face ID, fingerprint, device passcode) is a
//! blocking host call. [`authenticate`] runs it on tokio's blocking pool and
//! resumes the caller's task with the outcome, so the interaction context
//! never waits on the prompt.
//!
//! Two failure families stay distinct:
//!
//! | Situation | Error |
//! |-----------|-------|
//! | mode not enrolled / no hardware | `Error::AuthUnavailable` |
//! | user dismissed the prompt | `Error::AuthCancelled` |
//! | user failed the prompt | `Error::AuthFailed` |

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which credentials the challenge may accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Biometrics only
    Biometric,
    /// Biometrics, falling back to the device passcode
    PasscodeOrBiometric,
}

/// What the platform reported after showing the challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// User presence confirmed
    Passed,
    /// User dismissed the prompt
    Cancelled,
    /// User attempted and failed
    Failed(String),
}

/// Platform hook for presence challenges
pub trait PresenceAuthenticator: Send + Sync {
    /// `Err(reason)` when `mode` cannot be offered on this device
    fn availability(&self, mode: AuthMode) -> std::result::Result<(), String>;

    /// Show the challenge and block until the user responds
    fn challenge(&self, reason: &str, mode: AuthMode) -> ChallengeOutcome;
}

/// Authenticator used until the host registers one
pub struct UnsupportedAuthenticator;

impl PresenceAuthenticator for UnsupportedAuthenticator {
    fn availability(&self, _mode: AuthMode) -> std::result::Result<(), String> {
        Err("no platform authenticator registered".into())
    }

    fn challenge(&self, _reason: &str, _mode: AuthMode) -> ChallengeOutcome {
        ChallengeOutcome::Failed("no platform authenticator registered".into())
    }
}

/// Gate an operation behind user presence.
pub async fn authenticate(
    authenticator: Arc<dyn PresenceAuthenticator>,
    reason: &str,
    mode: AuthMode,
) -> Result<()> {
    if let Err(why) = authenticator.availability(mode) {
        tracing::info!("Authentication mode {:?} unavailable: {}", mode, why);
        return Err(Error::AuthUnavailable(why));
    }

    let reason = reason.to_string();
    let outcome = tokio::task::spawn_blocking(move || authenticator.challenge(&reason, mode))
        .await
        .map_err(|e| Error::Internal(format!("authentication task: {}", e)))?;

    match outcome {
        ChallengeOutcome::Passed => {
            tracing::debug!("Presence challenge passed");
            Ok(())
        }
        ChallengeOutcome::Cancelled => Err(Error::AuthCancelled),
        ChallengeOutcome::Failed(why) => Err(Error::AuthFailed(why)),
    }
}
