//! # Host Presence Hooks
//!
//! The platform's biometric/passcode prompt lives in Swift/Kotlin. The host
//! registers two callbacks; [`HostAuthenticator`] adapts them to
//! [`PresenceAuthenticator`] so the vault runs the challenge on a blocking
//! worker and never on the caller's thread.
//!
//! Mode codes: `0` biometric, `1` passcode or biometric.
//! Challenge result codes: `0` passed, `1` cancelled, anything else failed.

use std::ffi::CString;
use std::os::raw::c_char;
use std::sync::OnceLock;

use crate::vault::{AuthMode, ChallengeOutcome, PresenceAuthenticator};

/// `0` when `mode` can be offered
pub type AuthAvailableCallback = extern "C" fn(mode: i32) -> i32;

/// Shows the prompt; blocks until the user responds
pub type AuthChallengeCallback = extern "C" fn(reason: *const c_char, mode: i32) -> i32;

static AUTH_CB: OnceLock<(AuthAvailableCallback, AuthChallengeCallback)> = OnceLock::new();

/// Register the platform presence prompt. Only the first registration counts.
#[no_mangle]
pub extern "C" fn hushpost_register_auth_callbacks(
    available: AuthAvailableCallback,
    challenge: AuthChallengeCallback,
) {
    let _ = AUTH_CB.set((available, challenge));
}

fn mode_code(mode: AuthMode) -> i32 {
    match mode {
        AuthMode::Biometric => 0,
        AuthMode::PasscodeOrBiometric => 1,
    }
}

/// Presence authenticator backed by the registered host callbacks
pub struct HostAuthenticator;

impl PresenceAuthenticator for HostAuthenticator {
    fn availability(&self, mode: AuthMode) -> Result<(), String> {
        let (available, _) = AUTH_CB
            .get()
            .ok_or_else(|| "no platform authenticator registered".to_string())?;
        match available(mode_code(mode)) {
            0 => Ok(()),
            code => Err(format!("{:?} unavailable on this device (code {})", mode, code)),
        }
    }

    fn challenge(&self, reason: &str, mode: AuthMode) -> ChallengeOutcome {
        let Some((_, challenge)) = AUTH_CB.get() else {
            return ChallengeOutcome::Failed("no platform authenticator registered".into());
        };
        let Ok(reason) = CString::new(reason) else {
            return ChallengeOutcome::Failed("reason contains a NUL byte".into());
        };
        match challenge(reason.as_ptr(), mode_code(mode)) {
            0 => ChallengeOutcome::Passed,
            1 => ChallengeOutcome::Cancelled,
            code => ChallengeOutcome::Failed(format!("challenge failed (code {})", code)),
        }
    }
}
