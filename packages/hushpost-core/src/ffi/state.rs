//! # Shared FFI State
//!
//! Global runtime and client context shared between `c_api.rs` and
//! `dispatcher.rs`.

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

use crate::context::ClientContext;
use crate::error::{Error, Result};

// ============================================================================
// RUNTIME
// ============================================================================

/// Global async runtime for FFI calls
static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// Global state
static STATE: OnceCell<Arc<RwLock<FfiState>>> = OnceCell::new();

/// C callback type for pushing events to Swift/Kotlin
pub type EventCallback =
    extern "C" fn(event_type: *const std::os::raw::c_char, data: *const std::os::raw::c_char);

/// FFI state holding the client
#[derive(Default)]
pub(crate) struct FfiState {
    pub context: Option<Arc<ClientContext>>,
    /// Forwards transport state changes to the event callback
    pub state_forwarder: Option<JoinHandle<()>>,
}

pub(crate) fn get_runtime() -> Result<&'static Runtime> {
    RUNTIME.get_or_try_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("hushpost-core")
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create Tokio runtime: {}", e)))
    })
}

pub(crate) fn get_state() -> Arc<RwLock<FfiState>> {
    STATE.get_or_init(|| Arc::new(RwLock::new(FfiState::default()))).clone()
}

/// Initialized client, or [`Error::NotInitialized`]
pub(crate) fn context() -> Result<Arc<ClientContext>> {
    get_state().read().context.clone().ok_or(Error::NotInitialized)
}
